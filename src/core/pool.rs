//! Filepath: src/core/pool.rs
//! Bounded-fragment edit pool.
//!
//! Accepted edits are stored as unified-diff fragments of at most
//! `max_lines` diff lines each; a long diff is split into
//! consecutive fragments with a ragged tail. Fragments are opaque
//! strings from the pool's point of view, which keeps the persisted
//! format a plain JSON array.

use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use similar::TextDiff;
use tracing::debug;

use crate::core::scorer::DependencyScorer;
use crate::infra::utils::truncate_chars;

/// One stored slice of a unified diff.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EditFragment {
    text: String,
}

impl EditFragment {
    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn line_count(&self) -> usize {
        self.text.lines().count()
    }
}

/// In-memory pool of edit fragments with similarity-based retrieval.
#[derive(Debug)]
pub struct EditPool {
    /// Fragment size bound in diff lines; never zero.
    max_lines: usize,
    /// Per-side truncation applied before every scorer call.
    truncate_len: usize,
    fragments: Vec<EditFragment>,
}

impl EditPool {
    pub fn new(max_lines: usize, truncate_len: usize) -> Self {
        Self {
            // A zero bound would make partitioning degenerate.
            max_lines: max_lines.max(1),
            truncate_len,
            fragments: Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.fragments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fragments.is_empty()
    }

    pub fn fragments(&self) -> &[EditFragment] {
        &self.fragments
    }

    pub fn clear(&mut self) {
        self.fragments.clear();
    }

    /// Diff `before` against `after` line-by-line and absorb the
    /// resulting fragments. Identical inputs add nothing.
    pub fn add_edit(&mut self, before: &str, after: &str) {
        let diff = TextDiff::from_lines(before, after);
        if diff.ratio() >= 1.0 {
            return;
        }
        let unified = diff
            .unified_diff()
            .context_radius(3)
            // Keep fragments to pure diff lines, even for inputs
            // without a trailing newline
            .missing_newline_hint(false)
            .to_string();
        let lines: Vec<&str> = unified.lines().collect();
        self.absorb_lines(&lines);
    }

    /// Absorb an already-rendered patch: reconstruct the before and
    /// after texts from its lines, then diff them again through
    /// [`add_edit`](Self::add_edit). Hunk headers are dropped,
    /// removed/added markers stripped, context kept on both sides.
    pub fn add_edit_from_patch(&mut self, patch: &str) {
        let (before, after) = split_patch(patch);
        self.add_edit(&before, &after);
    }

    /// Partition `lines` into chunks of `max_lines`; the final chunk
    /// may be shorter. Empty input stores nothing.
    fn absorb_lines(&mut self, lines: &[&str]) {
        for chunk in lines.chunks(self.max_lines) {
            if chunk.is_empty() {
                continue;
            }
            self.fragments.push(EditFragment {
                text: chunk.join("\n"),
            });
        }
        debug!(fragments = self.fragments.len(), "pool updated");
    }

    /// Score every fragment against `reference` and return them in
    /// descending score order. The sort is stable, so equal-score
    /// fragments keep insertion order.
    pub fn rank<'p, S: DependencyScorer>(
        &'p self,
        scorer: &S,
        reference: &str,
    ) -> Vec<(&'p EditFragment, f64)> {
        let reference = truncate_chars(reference, self.truncate_len);
        let mut scored: Vec<(&EditFragment, f64)> = self
            .fragments
            .iter()
            .map(|frag| {
                let text = truncate_chars(frag.text(), self.truncate_len);
                (frag, scorer.score(reference, text))
            })
            .collect();
        scored.sort_by(|a, b| b.1.total_cmp(&a.1));
        scored
    }

    /// Top `k` fragments by score. `k` larger than the pool just
    /// returns everything ranked.
    pub fn top_k<'p, S: DependencyScorer>(
        &'p self,
        scorer: &S,
        reference: &str,
        k: usize,
    ) -> Vec<(&'p EditFragment, f64)> {
        let mut ranked = self.rank(scorer, reference);
        ranked.truncate(k);
        ranked
    }

    /// Ranked fragments at 1-based positions `lo..=hi`. `hi` is
    /// clamped to the pool size; a zero bound, an inverted range, or
    /// `lo` past the pool is an empty result, never a panic.
    pub fn in_range<'p, S: DependencyScorer>(
        &'p self,
        scorer: &S,
        reference: &str,
        lo: usize,
        hi: usize,
    ) -> Vec<(&'p EditFragment, f64)> {
        if lo == 0 || hi == 0 || lo > hi || lo > self.fragments.len() {
            return Vec::new();
        }
        let hi = hi.min(self.fragments.len());
        let ranked = self.rank(scorer, reference);
        ranked[lo - 1..hi].to_vec()
    }

    /// Persist the fragments as a JSON array.
    pub fn export(&self, path: &Path) -> Result<()> {
        let file = File::create(path)
            .with_context(|| format!("failed to create pool file {}", path.display()))?;
        serde_json::to_writer_pretty(BufWriter::new(file), &self.fragments)
            .with_context(|| format!("failed to write pool file {}", path.display()))?;
        Ok(())
    }

    /// Replace the pool contents from a JSON array on disk. A
    /// missing file is a no-op so fresh runs start empty.
    pub fn load(&mut self, path: &Path) -> Result<()> {
        if !path.exists() {
            return Ok(());
        }
        let file = File::open(path)
            .with_context(|| format!("failed to open pool file {}", path.display()))?;
        self.fragments = serde_json::from_reader(BufReader::new(file))
            .with_context(|| format!("failed to parse pool file {}", path.display()))?;
        Ok(())
    }
}

/// Split a rendered patch back into before/after texts. `-`/`+`
/// markers are stripped, `@@` lines skipped, everything else is
/// context belonging to both sides.
fn split_patch(patch: &str) -> (String, String) {
    let mut before = Vec::new();
    let mut after = Vec::new();
    for line in patch.lines() {
        if let Some(removed) = line.strip_prefix('-') {
            before.push(removed);
        } else if let Some(added) = line.strip_prefix('+') {
            after.push(added);
        } else if line.starts_with("@@") {
            continue;
        } else {
            before.push(line);
            after.push(line);
        }
    }
    (before.join("\n"), after.join("\n"))
}
