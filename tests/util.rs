//! Shared test utilities for integration tests
//!
//! Provides common fixture creation and helper functions
//! used across multiple test files.

use assert_fs::prelude::*;

/// Create a small two-file Python project: `main.py` defines `foo`
/// which calls `bar`, and `helpers.py` defines `bar`.
pub fn make_foo_bar_fixture() -> assert_fs::TempDir
{
    let tmp = assert_fs::TempDir::new().expect("tempdir");

    tmp.child("main.py")
        .write_str("def foo(items):\n    total = 0\n    for item in items:\n        total += bar(item)\n    return total\n")
        .expect("write main.py");

    tmp.child("helpers.py")
        .write_str("def bar(item):\n    return item * 2\n")
        .expect("write helpers.py");

    tmp
}

/// Create a mixed project with classes, free functions, tests, and
/// vendored noise, exercising walker filtering and class-qualified
/// resolution in one fixture.
pub fn make_mixed_fixture() -> assert_fs::TempDir
{
    let tmp = assert_fs::TempDir::new().expect("tempdir");

    tmp.child("svc/pipeline.py")
        .write_str(concat!(
            "class Pipeline:\n",
            "    def process(self, batch):\n",
            "        cleaned = self.clean(batch)\n",
            "        return summarize(cleaned)\n",
            "\n",
            "    def clean(self, batch):\n",
            "        return [b for b in batch if b]\n",
        ))
        .expect("write pipeline.py");

    tmp.child("svc/report.py")
        .write_str(concat!(
            "def summarize(rows):\n",
            "    return len(rows)\n",
            "\n",
            "def test_summarize():\n",
            "    assert summarize([1]) == 1\n",
        ))
        .expect("write report.py");

    // Vendored copy that must never appear in results
    tmp.child("env/site-packages/dep/pipeline.py")
        .write_str("def summarize(rows):\n    return 0\n")
        .expect("write vendored");

    tmp
}
