//! Filepath: src/core/index.rs
//! Whole-repository source index, rebuilt from the filesystem on
//! every top-level query.
//!
//! The index owns one `SourceFile` per successfully parsed file and
//! acts as the per-scan parse cache: nothing is persisted across
//! independent queries, so staleness is impossible by construction.
//! Parse failures are typed, logged with the offending path, and
//! skipped — one broken file never aborts a scan.

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

use anyhow::Result;
use rayon::prelude::*;
use thiserror::Error;
use tracing::warn;

use crate::infra::walk::SourceWalker;
use crate::parsers::python_ast::{self, ClassDef, FunctionDef, Module, PyNode};

/// Why a file was skipped during indexing.
#[derive(Debug, Error)]
pub enum ParseError {
    /// The file could not be read at all.
    #[error("failed to read {path}: {source}")]
    Unreadable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The file was read but is not valid Python.
    #[error("syntax error in {path}")]
    Syntax { path: PathBuf },
}

/// A parsed source file plus the derived class→method map.
#[derive(Debug)]
pub struct SourceFile {
    /// Path as yielded by the walker.
    pub path: PathBuf,
    /// Raw file text; function body slices borrow from this.
    pub text: String,
    /// Lowered module tree.
    pub module: Module,
    /// Class name → directly declared method names. No inheritance
    /// resolution; only methods written in the class body count.
    pub class_methods: BTreeMap<String, BTreeSet<String>>,
}

impl SourceFile {
    /// Every function definition in the file, in tree walk order.
    /// Walk order is what makes "first match wins" reproducible.
    pub fn functions(&self) -> Vec<&FunctionDef> {
        let mut out = Vec::new();
        python_ast::walk(&self.module.items, &mut |node| {
            if let PyNode::FunctionDef(def) = node {
                out.push(def);
            }
        });
        out
    }

    /// First class whose declared methods contain `name`, if any.
    /// Attribution is name-only, like everything else here.
    pub fn owning_class(&self, name: &str) -> Option<&str> {
        self.class_methods
            .iter()
            .find(|(_, methods)| methods.contains(name))
            .map(|(class, _)| class.as_str())
    }

    /// True when `name` is declared as a method of any class here.
    pub fn is_method_name(&self, name: &str) -> bool {
        self.class_methods
            .values()
            .any(|methods| methods.contains(name))
    }
}

/// Index over every parseable Python file under one root.
#[derive(Debug, Default)]
pub struct SourceIndex {
    /// Parsed files, sorted by path.
    files: Vec<SourceFile>,
    /// Files the scan gave up on, with the reason.
    skipped: Vec<ParseError>,
}

impl SourceIndex {
    /// Scan `root` and parse every eligible file. Parsing runs on
    /// the rayon pool; results are accumulated per worker and
    /// merged in walk order, so the outcome matches a sequential
    /// scan exactly.
    pub fn build(root: &Path, walker: &SourceWalker) -> Result<Self> {
        let paths = walker.walk_files(root);

        let outcomes: Vec<Result<SourceFile, ParseError>> =
            paths.par_iter().map(|path| parse_file(path)).collect();

        let mut files = Vec::with_capacity(outcomes.len());
        let mut skipped = Vec::new();
        for outcome in outcomes {
            match outcome {
                Ok(file) => files.push(file),
                Err(err) => {
                    warn!("skipping file: {err}");
                    skipped.push(err);
                }
            }
        }

        Ok(Self { files, skipped })
    }

    /// Parsed files in sorted-path order.
    pub fn files(&self) -> &[SourceFile] {
        &self.files
    }

    /// Look up a parsed file by exact path.
    pub fn file(&self, path: &Path) -> Option<&SourceFile> {
        self.files.iter().find(|f| f.path == path)
    }

    /// Files skipped during the scan.
    pub fn skipped(&self) -> &[ParseError] {
        &self.skipped
    }
}

/// Read and lower a single file into a `SourceFile`.
pub fn parse_file(path: &Path) -> Result<SourceFile, ParseError> {
    let text = std::fs::read_to_string(path).map_err(|source| ParseError::Unreadable {
        path: path.to_path_buf(),
        source,
    })?;

    let module = python_ast::parse_module(&text).map_err(|_| ParseError::Syntax {
        path: path.to_path_buf(),
    })?;

    let class_methods = class_method_map(&module);

    Ok(SourceFile {
        path: path.to_path_buf(),
        text,
        module,
        class_methods,
    })
}

/// One entry per class (any nesting depth), listing only the
/// methods declared directly in its body.
pub fn class_method_map(module: &Module) -> BTreeMap<String, BTreeSet<String>> {
    let mut map = BTreeMap::new();
    python_ast::walk(&module.items, &mut |node| {
        if let PyNode::ClassDef(class) = node {
            map.entry(class.name.clone())
                .or_insert_with(BTreeSet::new)
                .extend(direct_methods(class));
        }
    });
    map
}

/// Methods appearing directly in the class body (not nested in
/// conditionals or inner functions).
fn direct_methods(class: &ClassDef) -> BTreeSet<String> {
    class
        .body
        .iter()
        .filter_map(|node| match node {
            PyNode::FunctionDef(def) => Some(def.name.clone()),
            _ => None,
        })
        .collect()
}
