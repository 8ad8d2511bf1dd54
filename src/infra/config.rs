//! Filepath: src/infra/config.rs
//! Engine configuration: reference defaults, optional TOML file,
//! optional environment overrides.

use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// Engine thresholds. Every knob here is caller-supplied
/// configuration; the defaults are the reference values the rest of
/// the crate documents.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig
{
    /// Extra ignore globs applied on top of the built-in vendored excludes
    pub ignore_patterns: Vec<String>,

    /// Maximum diff lines per edit fragment
    pub max_lines: usize,

    /// Minimum scorer output for a candidate to survive pruning.
    /// Deliberately low: the pipeline prefers re-validating an
    /// irrelevant neighbor over missing a relevant one.
    pub accept_threshold: f64,

    /// Per-snippet truncation applied before every scorer call
    pub truncate_len: usize,

    /// Prompt truncation applied before every policy call
    pub prompt_truncate_len: usize,

    /// Maximum retrieval-agent iterations
    pub max_requests: usize,

    /// Simple-name prefixes identifying test functions to drop
    pub test_prefixes: Vec<String>,
}

impl Default for EngineConfig
{
    fn default() -> Self
    {
        Self {
            ignore_patterns: Vec::new(),
            max_lines: 15,
            accept_threshold: 0.001,
            truncate_len: 500,
            prompt_truncate_len: 8000,
            max_requests: 5,
            test_prefixes: vec!["test_".to_string(), "tests_".to_string()],
        }
    }
}

/// Load configuration from `editgraph.toml` (first match wins) plus
/// `EDITGRAPH_`-prefixed environment variables. Missing files fall
/// back to defaults; a malformed file is an error.
pub fn load_config() -> Result<EngineConfig>
{
    let mut builder = config::Config::builder();

    let config_paths = ["editgraph.toml", ".editgraph.toml"];

    for path in &config_paths
    {
        if Path::new(path).exists()
        {
            builder = builder.add_source(config::File::with_name(path));
            break;
        }
    }

    // EDITGRAPH_MAX_LINES etc. No separator: the field names
    // themselves contain underscores.
    builder = builder.add_source(config::Environment::with_prefix("EDITGRAPH"));

    let cfg = builder
        .build()
        .context("Failed to load configuration")?;

    // `#[serde(default)]` fills anything the sources left unset.
    let parsed: EngineConfig = cfg
        .try_deserialize()
        .context("Failed to parse configuration")?;

    Ok(parsed)
}
