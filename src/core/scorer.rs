//! Filepath: src/core/scorer.rs
//! Edit-relevance scoring seam.
//!
//! The orchestrator and the edit pool only ever see this trait; the
//! production deployment plugs in an embedding-backed model, and the
//! built-in Jaccard baseline keeps the crate self-contained and the
//! tests hermetic.

/// Scores how related two code snippets are.
///
/// Contract: total over all string pairs, returns a finite value in
/// `[0, 1]`, and never fails. Candidate pruning and fragment ranking
/// both lean on that, so an implementation that can error internally
/// must map failures to `0.0` itself.
pub trait DependencyScorer {
    fn score(&self, a: &str, b: &str) -> f64;
}

/// Token-level Jaccard similarity. Tokens are maximal runs of
/// `[A-Za-z0-9_]`, so identifiers and literals count while
/// punctuation and indentation do not.
#[derive(Debug, Default, Clone, Copy)]
pub struct JaccardScorer;

impl JaccardScorer {
    fn tokens(s: &str) -> std::collections::HashSet<&str> {
        s.split(|c: char| !c.is_ascii_alphanumeric() && c != '_')
            .filter(|t| !t.is_empty())
            .collect()
    }
}

impl DependencyScorer for JaccardScorer {
    fn score(&self, a: &str, b: &str) -> f64 {
        let ta = Self::tokens(a);
        let tb = Self::tokens(b);
        if ta.is_empty() && tb.is_empty() {
            return 0.0;
        }

        let intersection = ta.intersection(&tb).count();
        let union = ta.union(&tb).count();

        intersection as f64 / union as f64
    }
}
