//! Filepath: src/core/deps.rs
//! Dependency orchestrator: one query from (root, function, class)
//! to a scored, ordered list of modification candidates.
//!
//! The output order is downstream callees, then the target itself,
//! then upstream callers, and is never re-sorted; consumers that
//! want score order sort on their side. The target always survives
//! pruning by carrying a sentinel score above any real scorer
//! output.

use std::path::{Path, PathBuf};

use anyhow::Result;
use tracing::{debug, info, warn};

use crate::core::callgraph::{self, CallRef};
use crate::core::index::SourceIndex;
use crate::core::locate::{self, Located};
use crate::core::scorer::DependencyScorer;
use crate::infra::config::EngineConfig;
use crate::infra::utils::truncate_chars;
use crate::infra::walk::SourceWalker;

/// Sentinel relevance for the target function. Scorers are bounded
/// by 1.0, so the target always ranks first under score ordering.
pub const TARGET_SCORE: f64 = 100.0;

/// Where a candidate sits relative to the target in the call graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Origin {
    Target,
    Upstream,
    Downstream,
}

/// A function the edit pipeline should consider modifying.
#[derive(Debug, Clone, PartialEq)]
pub struct ModificationCandidate {
    pub file: PathBuf,
    pub class: Option<String>,
    pub name: String,
    pub dependency_score: f64,
    pub origin: Origin,
}

/// Runs the full discovery query. Holds a scorer and the engine
/// thresholds; the source index is rebuilt per call.
pub struct DependencyOrchestrator<'s, S: DependencyScorer> {
    scorer: &'s S,
    config: EngineConfig,
}

impl<'s, S: DependencyScorer> DependencyOrchestrator<'s, S> {
    pub fn new(scorer: &'s S, config: EngineConfig) -> Self {
        Self { scorer, config }
    }

    /// Discover and score every candidate around `function` under
    /// `root`. An unlocatable target is an empty result, not an
    /// error; broken files and unresolvable candidates are logged
    /// and dropped individually.
    pub fn modifications(
        &self,
        root: &Path,
        function: &str,
        class: Option<&str>,
    ) -> Result<Vec<ModificationCandidate>> {
        let walker = SourceWalker::new(&self.config.ignore_patterns)?;
        let index = SourceIndex::build(root, &walker)?;

        let Some(target) = locate::locate(&index, function, class) else {
            warn!(function, ?class, "target function not found; empty result");
            return Ok(Vec::new());
        };
        let target_text = target.function_text();

        let downstream = callgraph::downstream_refs(&index, target.func);
        let upstream = callgraph::upstream_refs(&index, function);

        let mut out = Vec::new();
        self.score_refs(
            &index,
            &downstream,
            &target_text,
            Origin::Downstream,
            &mut out,
        );
        out.push(ModificationCandidate {
            file: target.file.path.clone(),
            class: class.map(str::to_string),
            name: function.to_string(),
            dependency_score: TARGET_SCORE,
            origin: Origin::Target,
        });
        self.score_refs(&index, &upstream, &target_text, Origin::Upstream, &mut out);

        info!(
            function,
            candidates = out.len(),
            downstream = downstream.len(),
            upstream = upstream.len(),
            "dependency discovery complete"
        );
        Ok(out)
    }

    /// Score one side of the graph, appending survivors in input
    /// order. Each ref fails independently.
    fn score_refs(
        &self,
        index: &SourceIndex,
        refs: &[CallRef],
        target_text: &str,
        origin: Origin,
        out: &mut Vec<ModificationCandidate>,
    ) {
        for call_ref in refs {
            if self.is_test_name(&call_ref.name) {
                debug!(%call_ref, "dropping test function");
                continue;
            }

            let Some(candidate) = locate::locate(index, &call_ref.name, call_ref.class.as_deref())
            else {
                warn!(%call_ref, "candidate vanished during scoring; dropped");
                continue;
            };

            let score = self.score_pair(target_text, &candidate.function_text());
            if score <= self.config.accept_threshold {
                debug!(%call_ref, score, "candidate below threshold");
                continue;
            }

            out.push(to_candidate(&candidate, call_ref, score, origin));
        }
    }

    /// Both snippets are truncated independently before scoring so
    /// one oversized function cannot starve the other side.
    fn score_pair(&self, a: &str, b: &str) -> f64 {
        self.scorer.score(
            truncate_chars(a, self.config.truncate_len),
            truncate_chars(b, self.config.truncate_len),
        )
    }

    fn is_test_name(&self, name: &str) -> bool {
        self.config
            .test_prefixes
            .iter()
            .any(|prefix| name.starts_with(prefix.as_str()))
    }
}

fn to_candidate(
    located: &Located<'_>,
    call_ref: &CallRef,
    score: f64,
    origin: Origin,
) -> ModificationCandidate {
    ModificationCandidate {
        file: located.file.path.clone(),
        class: call_ref.class.clone(),
        name: call_ref.name.clone(),
        dependency_score: score,
        origin,
    }
}

#[cfg(test)]
mod tests {
    use std::fs;

    use anyhow::Result;
    use tempfile::TempDir;

    use super::*;
    use crate::core::scorer::JaccardScorer;

    fn write(root: &Path, rel: &str, contents: &str) {
        let path = root.join(rel);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(path, contents).unwrap();
    }

    fn orchestrator(scorer: &JaccardScorer) -> DependencyOrchestrator<'_, JaccardScorer> {
        DependencyOrchestrator::new(scorer, EngineConfig::default())
    }

    #[test]
    fn missing_target_yields_empty_result() -> Result<()> {
        let tmp = TempDir::new()?;
        write(tmp.path(), "m.py", "def other():\n    pass\n");

        let scorer = JaccardScorer;
        let out = orchestrator(&scorer).modifications(tmp.path(), "no_such_fn", None)?;
        assert!(out.is_empty());
        Ok(())
    }

    #[test]
    fn target_carries_sentinel_score_and_sits_between_sides() -> Result<()> {
        let tmp = TempDir::new()?;
        write(
            tmp.path(),
            "app.py",
            "def entry():\n    return work()\n\ndef work():\n    return helper()\n\ndef helper():\n    return 1\n",
        );

        let scorer = JaccardScorer;
        let out = orchestrator(&scorer).modifications(tmp.path(), "work", None)?;

        let target_pos = out
            .iter()
            .position(|c| c.origin == Origin::Target)
            .expect("target present");
        assert_eq!(out[target_pos].name, "work");
        assert_eq!(out[target_pos].dependency_score, TARGET_SCORE);

        // Everything before the target is downstream, after upstream.
        assert!(
            out[..target_pos]
                .iter()
                .all(|c| c.origin == Origin::Downstream)
        );
        assert!(
            out[target_pos + 1..]
                .iter()
                .all(|c| c.origin == Origin::Upstream)
        );

        assert!(out.iter().any(|c| c.name == "helper"));
        assert!(out.iter().any(|c| c.name == "entry"));
        Ok(())
    }

    #[test]
    fn test_functions_are_excluded() -> Result<()> {
        let tmp = TempDir::new()?;
        write(
            tmp.path(),
            "app.py",
            "def work():\n    return 1\n\ndef test_work():\n    assert work() == 1\n\ndef use_work():\n    return work()\n",
        );

        let scorer = JaccardScorer;
        let out = orchestrator(&scorer).modifications(tmp.path(), "work", None)?;

        assert!(out.iter().all(|c| c.name != "test_work"));
        assert!(out.iter().any(|c| c.name == "use_work"));
        Ok(())
    }

    #[test]
    fn class_methods_resolve_with_qualifier() -> Result<()> {
        let tmp = TempDir::new()?;
        write(
            tmp.path(),
            "svc.py",
            "class Service:\n    def handle(self):\n        return self.load()\n\n    def load(self):\n        return []\n",
        );

        let scorer = JaccardScorer;
        let out = orchestrator(&scorer).modifications(tmp.path(), "handle", Some("Service"))?;

        let target = out.iter().find(|c| c.origin == Origin::Target).unwrap();
        assert_eq!(target.class.as_deref(), Some("Service"));
        assert!(
            out.iter()
                .any(|c| c.name == "load" && c.origin == Origin::Downstream)
        );
        Ok(())
    }
}
