//! Filepath: src/core/locate.rs
//! Repository-wide symbol location with pluggable resolution.
//!
//! Resolution is name-only: a function matches by simple name plus an
//! optional class qualifier checked against the declared-method map.
//! Overloads across files are resolved first-match-wins over the
//! sorted file order, so repeated queries always land on the same
//! definition.

use rayon::prelude::*;
use tracing::debug;

use crate::core::index::{SourceFile, SourceIndex};
use crate::parsers::python_ast::FunctionDef;

/// A located function definition, borrowing from the index.
#[derive(Debug, Clone, Copy)]
pub struct Located<'a> {
    pub file: &'a SourceFile,
    pub func: &'a FunctionDef,
}

impl Located<'_> {
    /// Full function text: reconstructed signature line followed by
    /// the body slice from the original source.
    pub fn function_text(&self) -> String {
        let body = self.func.body_text(&self.file.text);
        format!("{}\n{}", self.func.signature(), body)
    }
}

/// How a (name, class) query is matched against a candidate
/// definition. The baseline is name-only; callers with richer
/// resolution (imports, aliasing) implement this themselves.
pub trait ResolveStrategy {
    fn matches(&self, file: &SourceFile, func: &FunctionDef, name: &str, class: Option<&str>)
    -> bool;
}

/// Name-only resolution:
/// - with a class qualifier, the name must be a declared method of
///   exactly that class in the candidate file;
/// - without one, the name must not be a declared method of any
///   class there (free functions only).
#[derive(Debug, Default, Clone, Copy)]
pub struct NameOnly;

impl ResolveStrategy for NameOnly {
    fn matches(
        &self,
        file: &SourceFile,
        func: &FunctionDef,
        name: &str,
        class: Option<&str>,
    ) -> bool {
        if func.name != name {
            return false;
        }
        match class {
            Some(class) => file
                .class_methods
                .get(class)
                .is_some_and(|methods| methods.contains(name)),
            None => !file.is_method_name(name),
        }
    }
}

/// Locate `name` (optionally qualified by `class`) in the index.
///
/// Files are searched in sorted order and definitions within a file
/// in tree walk order; the first match wins. When the same name is
/// defined more than once the survivor is the leftmost one, which is
/// deterministic but arbitrary.
pub fn locate<'a>(index: &'a SourceIndex, name: &str, class: Option<&str>) -> Option<Located<'a>> {
    locate_with(index, &NameOnly, name, class)
}

/// `locate` with an explicit resolution strategy.
pub fn locate_with<'a, S: ResolveStrategy>(
    index: &'a SourceIndex,
    strategy: &S,
    name: &str,
    class: Option<&str>,
) -> Option<Located<'a>> {
    let found = index.files().iter().find_map(|file| {
        file.functions()
            .into_iter()
            .find(|func| strategy.matches(file, func, name, class))
            .map(|func| Located { file, func })
    });

    if found.is_none() {
        debug!(name, ?class, "symbol not found in index");
    }
    found
}

/// Parallel variant of [`locate`]. `find_map_first` keeps the
/// leftmost match, so the result is identical to the sequential
/// search whenever the query is unambiguous.
pub fn locate_parallel<'a, S: ResolveStrategy + Sync>(
    index: &'a SourceIndex,
    strategy: &S,
    name: &str,
    class: Option<&str>,
) -> Option<Located<'a>> {
    index.files().par_iter().find_map_first(|file| {
        file.functions()
            .into_iter()
            .find(|func| strategy.matches(file, func, name, class))
            .map(|func| Located { file, func })
    })
}
