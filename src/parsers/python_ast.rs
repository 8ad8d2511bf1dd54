//! Filepath: src/parsers/python_ast.rs
//! ------------------------------------------------------------------
//! Python source lowering built on Tree-sitter 0.25.x.
//! Goals:
//!   - Parse once per file, then lower the CST into a small closed
//!     node model that the index/call-graph layers can walk without
//!     holding Tree-sitter lifetimes.
//!   - Keep only what name-based call resolution needs: function
//!     definitions, class definitions, call expressions, and an
//!     opaque "other" bucket that preserves nesting.
//!   - Tolerate broken files: a tree containing ERROR nodes is
//!     reported as a syntax failure, never a panic.
//!
//! Notes:
//!   - We walk the CST with named children rather than queries; the
//!     node kinds we rely on ("function_definition",
//!     "class_definition", "call", "attribute") are stable across
//!     grammar minor versions.
//!   - Byte spans are kept on function definitions so the locator
//!     can slice signature/body text out of the raw source later.
//! ------------------------------------------------------------------

use anyhow::{Context, Result, anyhow};
use tree_sitter::{Node, Parser};

/// A lowered Python module: the top-level statement list.
#[derive(Debug, Clone, PartialEq)]
pub struct Module {
    /// Top-level nodes in source order.
    pub items: Vec<PyNode>,
}

/// Closed node model for the constructs call analysis cares about.
/// Everything else collapses into `Other`, which only preserves
/// nested occurrences of the interesting variants.
#[derive(Debug, Clone, PartialEq)]
pub enum PyNode {
    /// `def name(params): ...` at any nesting depth.
    FunctionDef(FunctionDef),
    /// `class Name: ...` with its lowered body.
    ClassDef(ClassDef),
    /// A call expression with its resolvable callee form.
    Call(CallExpr),
    /// Any other construct; children are lowered recursively.
    Other(Vec<PyNode>),
}

/// A function definition with enough span information to recover
/// its signature and body text from the raw source.
#[derive(Debug, Clone, PartialEq)]
pub struct FunctionDef {
    /// Declared simple name.
    pub name: String,
    /// Parameter names in declaration order (no annotations).
    pub params: Vec<String>,
    /// Start byte of the whole `def` statement.
    pub byte_start: usize,
    /// End byte of the whole `def` statement (exclusive).
    pub byte_end: usize,
    /// Start byte of the first body statement, when present.
    pub body_byte_start: Option<usize>,
    /// 1-based start line.
    pub start_line: usize,
    /// 1-based end line.
    pub end_line: usize,
    /// Lowered body nodes.
    pub body: Vec<PyNode>,
}

/// A class definition; only the name and lowered body matter here.
#[derive(Debug, Clone, PartialEq)]
pub struct ClassDef {
    /// Declared class name.
    pub name: String,
    /// Lowered body nodes (methods appear as `FunctionDef`).
    pub body: Vec<PyNode>,
}

/// A call expression. `inner` holds lowered nodes from the callee
/// object and the argument list, so nested calls stay reachable.
#[derive(Debug, Clone, PartialEq)]
pub struct CallExpr {
    /// The callee shape used for name-based resolution.
    pub callee: Callee,
    /// Lowered subtrees of the callee object and arguments.
    pub inner: Vec<PyNode>,
}

/// Resolvable callee forms. Resolution is name-only by design:
/// `Name` covers direct calls, `Attribute` method-style calls.
#[derive(Debug, Clone, PartialEq)]
pub enum Callee {
    /// `foo(...)` — a bare name.
    Name(String),
    /// `recv.attr(...)`; `receiver` is kept only when the object is
    /// a simple name (the detail-preserving variant needs it).
    Attribute {
        receiver: Option<String>,
        attr: String,
    },
    /// Anything else (`f()()`, subscripts, lambdas).
    Opaque,
}

impl FunctionDef {
    /// Reconstruct a plain `def name(a, b):` signature.
    pub fn signature(&self) -> String {
        format!("def {}({}):", self.name, self.params.join(", "))
    }

    /// Slice the body source text out of the file content this
    /// definition was lowered from.
    pub fn body_text<'a>(&self, source: &'a str) -> &'a str {
        match self.body_byte_start {
            Some(start) if start < self.byte_end && self.byte_end <= source.len() => {
                &source[start..self.byte_end]
            }
            _ => "",
        }
    }
}

/// Visit `nodes` depth-first, calling `f` on every node.
pub fn walk<'a>(nodes: &'a [PyNode], f: &mut impl FnMut(&'a PyNode)) {
    for node in nodes {
        f(node);
        match node {
            PyNode::FunctionDef(def) => walk(&def.body, f),
            PyNode::ClassDef(class) => walk(&class.body, f),
            PyNode::Call(call) => walk(&call.inner, f),
            PyNode::Other(children) => walk(children, f),
        }
    }
}

/// Parse Python source and lower it into the closed node model.
///
/// Returns an error when the parser produces no tree or the tree
/// contains ERROR nodes; callers treat that as a per-file syntax
/// failure and skip the file.
pub fn parse_module(content: &str) -> Result<Module> {
    let mut parser = Parser::new();
    parser
        .set_language(&tree_sitter_python::LANGUAGE.into())
        .context("set Python language")?;

    let tree = parser
        .parse(content, None)
        .ok_or_else(|| anyhow!("Failed to parse Python source"))?;

    let root = tree.root_node();
    if root.has_error() {
        return Err(anyhow!("syntax error in Python source"));
    }

    let bytes = content.as_bytes();
    let mut items = Vec::new();
    lower_children(root, bytes, &mut items);
    Ok(Module { items })
}

/// Lower all named children of `node` into `out`.
fn lower_children(node: Node, bytes: &[u8], out: &mut Vec<PyNode>) {
    for i in 0..node.named_child_count() {
        let Some(child) = node.named_child(i) else {
            continue;
        };
        match child.kind() {
            "function_definition" => {
                if let Some(def) = lower_function(child, bytes) {
                    out.push(PyNode::FunctionDef(def));
                }
            }
            "class_definition" => {
                if let Some(class) = lower_class(child, bytes) {
                    out.push(PyNode::ClassDef(class));
                }
            }
            "call" => out.push(PyNode::Call(lower_call(child, bytes))),
            "comment" => {}
            _ => {
                let mut inner = Vec::new();
                lower_children(child, bytes, &mut inner);
                if !inner.is_empty() {
                    out.push(PyNode::Other(inner));
                }
            }
        }
    }
}

/// Lower a `function_definition` node; None if the name is missing.
fn lower_function(node: Node, bytes: &[u8]) -> Option<FunctionDef> {
    let name = node
        .child_by_field_name("name")
        .and_then(|n| n.utf8_text(bytes).ok())
        .map(|s| s.to_string())?;

    let params = node
        .child_by_field_name("parameters")
        .map(|p| lower_params(p, bytes))
        .unwrap_or_default();

    let mut body = Vec::new();
    let mut body_byte_start = None;
    if let Some(block) = node.child_by_field_name("body") {
        body_byte_start = block.named_child(0).map(|first| first.start_byte());
        lower_children(block, bytes, &mut body);
    }

    Some(FunctionDef {
        name,
        params,
        byte_start: node.start_byte(),
        byte_end: node.end_byte(),
        body_byte_start,
        start_line: node.start_position().row + 1,
        end_line: node.end_position().row + 1,
        body,
    })
}

/// Lower a `class_definition` node; None if the name is missing.
fn lower_class(node: Node, bytes: &[u8]) -> Option<ClassDef> {
    let name = node
        .child_by_field_name("name")
        .and_then(|n| n.utf8_text(bytes).ok())
        .map(|s| s.to_string())?;

    let mut body = Vec::new();
    if let Some(block) = node.child_by_field_name("body") {
        lower_children(block, bytes, &mut body);
    }

    Some(ClassDef { name, body })
}

/// Lower a `call` node: classify the callee, then lower the callee
/// object and argument subtrees so nested calls remain visible.
fn lower_call(node: Node, bytes: &[u8]) -> CallExpr {
    let mut inner = Vec::new();

    let callee = match node.child_by_field_name("function") {
        Some(func) if func.kind() == "identifier" => func
            .utf8_text(bytes)
            .ok()
            .map(|s| Callee::Name(s.to_string()))
            .unwrap_or(Callee::Opaque),
        Some(func) if func.kind() == "attribute" => {
            let attr = func
                .child_by_field_name("attribute")
                .and_then(|a| a.utf8_text(bytes).ok())
                .map(|s| s.to_string());

            let object = func.child_by_field_name("object");
            let receiver = object
                .filter(|o| o.kind() == "identifier")
                .and_then(|o| o.utf8_text(bytes).ok())
                .map(|s| s.to_string());

            // The object may itself contain calls (`f().g()`).
            if let Some(obj) = object
                && obj.kind() != "identifier"
            {
                lower_object(obj, bytes, &mut inner);
            }

            match attr {
                Some(attr) => Callee::Attribute { receiver, attr },
                None => Callee::Opaque,
            }
        }
        Some(func) => {
            // Unresolvable callee; still lower it for nested calls.
            lower_object(func, bytes, &mut inner);
            Callee::Opaque
        }
        None => Callee::Opaque,
    };

    if let Some(args) = node.child_by_field_name("arguments") {
        lower_children(args, bytes, &mut inner);
    }

    CallExpr { callee, inner }
}

/// Lower an arbitrary expression node into `out`, preserving any
/// calls or definitions nested inside it.
fn lower_object(node: Node, bytes: &[u8], out: &mut Vec<PyNode>) {
    match node.kind() {
        "call" => out.push(PyNode::Call(lower_call(node, bytes))),
        _ => lower_children(node, bytes, out),
    }
}

/// Extract simple parameter names from a `parameters` node.
fn lower_params(node: Node, bytes: &[u8]) -> Vec<String> {
    let mut params = Vec::new();
    for i in 0..node.named_child_count() {
        let Some(child) = node.named_child(i) else {
            continue;
        };
        let name = match child.kind() {
            "identifier" => child.utf8_text(bytes).ok().map(|s| s.to_string()),
            "typed_parameter" | "list_splat_pattern" | "dictionary_splat_pattern" => {
                first_identifier(child, bytes)
            }
            "default_parameter" | "typed_default_parameter" => child
                .child_by_field_name("name")
                .and_then(|n| first_identifier_or_self(n, bytes)),
            // Bare `*` / `/` separators and anything exotic.
            _ => None,
        };
        if let Some(name) = name {
            params.push(name);
        }
    }
    params
}

/// Find the first identifier inside `node`, depth-first.
fn first_identifier(node: Node, bytes: &[u8]) -> Option<String> {
    for i in 0..node.named_child_count() {
        let child = node.named_child(i)?;
        if child.kind() == "identifier" {
            return child.utf8_text(bytes).ok().map(|s| s.to_string());
        }
        if let Some(found) = first_identifier(child, bytes) {
            return Some(found);
        }
    }
    None
}

/// Like `first_identifier`, but `node` itself may be the identifier.
fn first_identifier_or_self(node: Node, bytes: &[u8]) -> Option<String> {
    if node.kind() == "identifier" {
        return node.utf8_text(bytes).ok().map(|s| s.to_string());
    }
    first_identifier(node, bytes)
}
