//! **editgraph** - On-demand call-graph discovery and edit-relevance retrieval
//! for automated function-level performance edits on Python repositories.
//!
//! Rebuild-per-query source indexing with tree-sitter parsing, name-only
//! symbol resolution, and a bounded edit pool with similarity retrieval.

/// Core engine - discovery, scoring, retrieval
pub mod core {
    /// Whole-repository source index with per-scan parse caching
    pub mod index;
    pub use index::{ParseError, SourceFile, SourceIndex};

    /// Repository-wide symbol location (first-match-wins over sorted paths)
    pub mod locate;
    pub use locate::{Located, NameOnly, ResolveStrategy, locate};

    /// Downstream/upstream call extraction with name-only resolution
    pub mod callgraph;
    pub use callgraph::{CallRef, downstream_refs, upstream_refs};

    /// Edit-relevance scoring seam with a Jaccard baseline
    pub mod scorer;
    pub use scorer::{DependencyScorer, JaccardScorer};

    /// Dependency orchestrator producing ordered modification candidates
    pub mod deps;
    pub use deps::{DependencyOrchestrator, ModificationCandidate, Origin, TARGET_SCORE};

    /// Bounded-fragment edit pool with JSON persistence
    pub mod pool;
    pub use pool::{EditFragment, EditPool};

    /// Bounded tool-use retrieval loop over the pool
    pub mod agent;
    pub use agent::{NO_ANSWER, PolicyClient, RetrievalAgent};
}

/// Language processing - Python AST lowering via tree-sitter
pub mod parsers {
    /// Closed owned node model over the tree-sitter Python grammar
    pub mod python_ast;
    pub use python_ast::{Callee, ClassDef, FunctionDef, Module, PyNode, parse_module};
}

/// Infrastructure - configuration, walking, small helpers
pub mod infra {
    /// Layered configuration (TOML file + environment)
    pub mod config;
    pub use config::{EngineConfig, load_config};

    /// Gitignore-aware Python source walker
    pub mod walk;
    pub use walk::SourceWalker;

    /// Shared helpers
    pub mod utils;
    // Keep utils private - not part of the public API
}

// Strategic re-exports for external consumers
pub use core::{
    DependencyOrchestrator, DependencyScorer, EditPool, JaccardScorer, ModificationCandidate,
    Origin, PolicyClient, RetrievalAgent, SourceIndex, TARGET_SCORE, locate,
};
pub use infra::{EngineConfig, SourceWalker, load_config};
pub use parsers::{FunctionDef, Module, parse_module};
