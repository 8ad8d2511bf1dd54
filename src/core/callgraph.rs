//! Filepath: src/core/callgraph.rs
//! Downstream/upstream call extraction over the lowered module tree.
//!
//! All resolution is by simple name: `self.helper()` and
//! `other.helper()` both count as calls to `helper`, and a call is
//! linked to every same-named definition in the repository. That
//! over-approximates real bindings, which is the intended trade-off
//! for a pipeline that re-validates every candidate downstream.

use std::collections::HashSet;
use std::fmt;
use std::path::PathBuf;

use indexmap::IndexSet;

use crate::core::index::SourceIndex;
use crate::parsers::python_ast::{self, Callee, FunctionDef, PyNode};

/// A function reference discovered by graph traversal.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CallRef {
    /// File the referenced definition lives in.
    pub file: PathBuf,
    /// Owning class when the definition is a declared method.
    pub class: Option<String>,
    /// Simple function name.
    pub name: String,
}

impl fmt::Display for CallRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}::{}", self.file.display(), self.name)
    }
}

/// Simple names of every call inside `func`, first-occurrence order,
/// deduplicated. Attribute calls contribute only the attribute name.
pub fn call_names(func: &FunctionDef) -> Vec<String> {
    let mut seen: IndexSet<String> = IndexSet::new();
    python_ast::walk(&func.body, &mut |node| {
        if let PyNode::Call(call) = node {
            match &call.callee {
                Callee::Name(name) => {
                    seen.insert(name.clone());
                }
                Callee::Attribute { attr, .. } => {
                    seen.insert(attr.clone());
                }
                Callee::Opaque => {}
            }
        }
    });
    seen.into_iter().collect()
}

/// Like [`call_names`] but attribute calls with a simple receiver
/// keep the `receiver.method` spelling, so `self.save` and
/// `db.save` stay distinguishable for display purposes.
pub fn call_names_detailed(func: &FunctionDef) -> Vec<String> {
    let mut seen: IndexSet<String> = IndexSet::new();
    python_ast::walk(&func.body, &mut |node| {
        if let PyNode::Call(call) = node {
            match &call.callee {
                Callee::Name(name) => {
                    seen.insert(name.clone());
                }
                Callee::Attribute {
                    receiver: Some(receiver),
                    attr,
                } => {
                    seen.insert(format!("{receiver}.{attr}"));
                }
                Callee::Attribute {
                    receiver: None,
                    attr,
                } => {
                    seen.insert(attr.clone());
                }
                Callee::Opaque => {}
            }
        }
    });
    seen.into_iter().collect()
}

/// [`call_names`] restricted to an allow-list of known definitions.
/// Filters out builtins and library calls the caller has no
/// definition for.
pub fn call_names_filtered(func: &FunctionDef, allow: &HashSet<String>) -> Vec<String> {
    call_names(func)
        .into_iter()
        .filter(|name| allow.contains(name))
        .collect()
}

/// Resolve the calls made by `func` against every definition in the
/// repository. One call name can yield several refs when the name is
/// defined in more than one place; files are visited in sorted
/// order, so output order is stable.
pub fn downstream_refs(index: &SourceIndex, func: &FunctionDef) -> Vec<CallRef> {
    let mut refs = Vec::new();
    for name in call_names(func) {
        for file in index.files() {
            for def in file.functions() {
                if def.name == name {
                    refs.push(CallRef {
                        file: file.path.clone(),
                        class: file.owning_class(&def.name).map(str::to_string),
                        name: def.name.clone(),
                    });
                }
            }
        }
    }
    refs
}

/// Every function in the repository that calls `target_name`. A
/// self-recursive target reports itself as its own caller.
pub fn upstream_refs(index: &SourceIndex, target_name: &str) -> Vec<CallRef> {
    let mut refs = Vec::new();
    for file in index.files() {
        for def in file.functions() {
            if call_names(def).iter().any(|name| name == target_name) {
                refs.push(CallRef {
                    file: file.path.clone(),
                    class: file.owning_class(&def.name).map(str::to_string),
                    name: def.name.clone(),
                });
            }
        }
    }
    refs
}

#[cfg(test)]
mod tests {
    use std::fs;
    use std::path::Path;

    use anyhow::Result;
    use tempfile::TempDir;

    use super::*;
    use crate::core::locate::locate;
    use crate::infra::walk::SourceWalker;
    use crate::parsers::python_ast::parse_module;

    fn write(root: &Path, rel: &str, contents: &str) {
        let path = root.join(rel);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(path, contents).unwrap();
    }

    fn only_function(src: &str) -> FunctionDef {
        let module = parse_module(src).unwrap();
        let mut found = None;
        python_ast::walk(&module.items, &mut |node| {
            if let PyNode::FunctionDef(def) = node
                && found.is_none()
            {
                found = Some(def.clone());
            }
        });
        found.expect("source should contain a function")
    }

    #[test]
    fn call_names_dedupe_in_first_occurrence_order() {
        let func = only_function(
            "def f(x):\n    a = helper(x)\n    b = helper(a)\n    log(b)\n    return other(a, b)\n",
        );
        assert_eq!(call_names(&func), vec!["helper", "log", "other"]);
    }

    #[test]
    fn attribute_calls_collapse_to_method_name() {
        let func = only_function("def f(self):\n    self.save()\n    db.save()\n    load()\n");
        assert_eq!(call_names(&func), vec!["save", "load"]);
        assert_eq!(
            call_names_detailed(&func),
            vec!["self.save", "db.save", "load"]
        );
    }

    #[test]
    fn filtered_names_drop_unknown_callees() {
        let func = only_function("def f(x):\n    print(x)\n    helper(x)\n    len(x)\n");
        let allow: HashSet<String> = ["helper".to_string()].into();
        assert_eq!(call_names_filtered(&func, &allow), vec!["helper"]);
    }

    #[test]
    fn nested_call_arguments_are_visited() {
        let func = only_function("def f(x):\n    return outer(inner(x), deep(more(x)))\n");
        assert_eq!(call_names(&func), vec!["outer", "inner", "deep", "more"]);
    }

    #[test]
    fn downstream_refs_resolve_across_files() -> Result<()> {
        let tmp = TempDir::new()?;
        write(
            tmp.path(),
            "main.py",
            "def entry():\n    helper()\n    util()\n",
        );
        write(tmp.path(), "lib.py", "def helper():\n    pass\n");
        write(
            tmp.path(),
            "svc.py",
            "class Service:\n    def util(self):\n        pass\n",
        );

        let walker = SourceWalker::new(&[])?;
        let index = SourceIndex::build(tmp.path(), &walker)?;
        let entry = locate(&index, "entry", None).expect("entry");

        let refs = downstream_refs(&index, entry.func);
        let summary: Vec<(Option<&str>, &str)> = refs
            .iter()
            .map(|r| (r.class.as_deref(), r.name.as_str()))
            .collect();

        assert_eq!(summary, vec![(None, "helper"), (Some("Service"), "util")]);
        Ok(())
    }

    #[test]
    fn upstream_refs_find_callers_including_recursion() -> Result<()> {
        let tmp = TempDir::new()?;
        write(
            tmp.path(),
            "a.py",
            "def caller():\n    target()\n\ndef bystander():\n    pass\n",
        );
        write(
            tmp.path(),
            "b.py",
            "def target(n):\n    if n:\n        target(n - 1)\n",
        );

        let walker = SourceWalker::new(&[])?;
        let index = SourceIndex::build(tmp.path(), &walker)?;

        let refs = upstream_refs(&index, "target");
        let names: Vec<&str> = refs.iter().map(|r| r.name.as_str()).collect();

        assert_eq!(names, vec!["caller", "target"]);
        Ok(())
    }

    #[test]
    fn call_ref_display_is_path_and_name() {
        let r = CallRef {
            file: PathBuf::from("pkg/mod.py"),
            class: Some("C".to_string()),
            name: "run".to_string(),
        };
        assert_eq!(r.to_string(), "pkg/mod.py::run");
    }
}
