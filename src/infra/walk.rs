//! Filepath: src/infra/walk.rs
//! Gitignore-aware Python source walker.
//! - Respects .gitignore, .git/info/exclude, and global gitignore
//! - Always prunes vendored/cache directories (site-packages,
//!   __pycache__, .venv/venv, node_modules, .git)
//! - Extra ignore globs (early prune + late filter)
//! - Only yields files with a recognized source extension (.py)
//! - Deterministic ordering for stable queries/tests
//!
//! Backed by ripgrep's `ignore` crate and `globset`.
//!
//! The index rebuilds from the filesystem on every top-level query,
//! so the walker carries no state between walks.

use std::path::{Path, PathBuf};

use anyhow::Result;
use globset::{Glob, GlobSet, GlobSetBuilder};
use ignore::{DirEntry, WalkBuilder};

/// Directories never worth parsing, regardless of caller globs.
const VENDORED_DIRS: &[&str] = &[
    "**/site-packages",
    "**/site-packages/**",
    "**/__pycache__",
    "**/__pycache__/**",
    "**/.venv/**",
    "**/venv/**",
    "**/node_modules/**",
    "**/.git/**",
];

/// Walker yielding the Python files a repository scan should parse.
/// Extra globs are applied in two places:
///   1) Early: prune directories during traversal (filter_entry).
///   2) Late: filter out files that still slipped through.
pub struct SourceWalker
{
    /// Compiled set of vendored + caller-supplied ignore patterns
    ignore_patterns: GlobSet,
}

impl SourceWalker
{
    /// Build a walker with the built-in vendored excludes plus any
    /// additional caller patterns (e.g. "fixtures/**").
    pub fn new(additional_ignores: &[String]) -> Result<Self>
    {
        let mut builder = GlobSetBuilder::new();

        for pattern in VENDORED_DIRS
        {
            builder.add(Glob::new(pattern)?);
        }

        for pattern in additional_ignores
        {
            builder.add(Glob::new(pattern)?);
        }

        Ok(Self { ignore_patterns: builder.build()? })
    }

    /// True when `path` has a recognized source extension.
    fn is_source_file(path: &Path) -> bool
    {
        path.extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| e.eq_ignore_ascii_case("py"))
    }

    /// Traverse files under `root`, respecting ignore rules and the
    /// extension filter. Returns a **sorted** list for determinism.
    pub fn walk_files<P: AsRef<Path>>(
        &self,
        root: P,
    ) -> Vec<PathBuf>
    {
        let root_path = root.as_ref();

        let mut builder = WalkBuilder::new(root_path);

        // Respect .ignore/.gitignore/.git/info/exclude and global gitignore
        builder.git_ignore(true);
        builder.git_global(true);
        builder.git_exclude(true);

        // Early directory pruning using the combined ignore set.
        let prune = self
            .ignore_patterns
            .clone();
        builder.filter_entry(move |ent: &DirEntry| {
            let is_dir = ent
                .file_type()
                .map(|ft| ft.is_dir())
                .unwrap_or(false);

            !(is_dir && prune.is_match(ent.path()))
        });

        let mut out: Vec<PathBuf> = builder
            .build()
            // Drop entries with IO errors; the scan must not abort
            .filter_map(|res| res.ok())
            // Keep only regular files
            .filter(|entry| {
                entry
                    .file_type()
                    .is_some_and(|ft| ft.is_file())
            })
            .map(|entry| entry.into_path())
            // Extension filter
            .filter(|p| Self::is_source_file(p))
            // Late file-level ignore filtering using RELATIVE path
            .filter(|abs| {
                let rel = abs
                    .strip_prefix(root_path)
                    .unwrap_or(abs);
                !self
                    .ignore_patterns
                    .is_match(rel)
                    && !self
                        .ignore_patterns
                        .is_match(abs)
            })
            .collect();

        // Deterministic order (stable locate semantics & tests)
        out.sort();

        out
    }
}

#[cfg(test)]
mod tests
{
    use std::fs;

    use tempfile::TempDir;

    use super::*;

    /// Create a file with parent dirs as needed
    fn write_file(
        root: &Path,
        rel: &str,
        contents: &str,
    ) -> Result<()>
    {
        let path = root.join(rel);
        if let Some(parent) = path.parent()
        {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, contents)?;
        Ok(())
    }

    #[test]
    fn yields_only_python_files_sorted() -> Result<()>
    {
        let tmp = TempDir::new()?;
        let root = tmp.path();

        write_file(root, "b.py", "x = 1\n")?;
        write_file(root, "a.py", "y = 2\n")?;
        write_file(root, "README.md", "# nope\n")?;
        write_file(root, "script.sh", "echo hi\n")?;

        let walker = SourceWalker::new(&[])?;
        let files: Vec<_> = walker
            .walk_files(root)
            .into_iter()
            .map(|p| {
                p.strip_prefix(root)
                    .unwrap()
                    .to_path_buf()
            })
            .collect();

        assert_eq!(files, vec![PathBuf::from("a.py"), PathBuf::from("b.py")]);
        Ok(())
    }

    #[test]
    fn prunes_vendored_directories() -> Result<()>
    {
        let tmp = TempDir::new()?;
        let root = tmp.path();

        write_file(root, "pkg/mod.py", "a = 1\n")?;
        write_file(root, "env/site-packages/dep/dep.py", "b = 2\n")?;
        write_file(root, "pkg/__pycache__/mod.cpython-311.py", "c = 3\n")?;

        let walker = SourceWalker::new(&[])?;
        let files = walker.walk_files(root);

        assert_eq!(files.len(), 1, "unexpected files: {files:?}");
        assert!(
            files[0].ends_with("pkg/mod.py"),
            "expected pkg/mod.py, got {files:?}"
        );
        Ok(())
    }

    #[test]
    fn extra_globs_filter_files() -> Result<()>
    {
        let tmp = TempDir::new()?;
        let root = tmp.path();

        write_file(root, "keep.py", "a = 1\n")?;
        write_file(root, "generated/skip.py", "b = 2\n")?;

        let walker = SourceWalker::new(&["generated/**".to_string()])?;
        let files = walker.walk_files(root);

        assert_eq!(files.len(), 1);
        assert!(files[0].ends_with("keep.py"));
        Ok(())
    }
}
