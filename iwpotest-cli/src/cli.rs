//! CLI argument parsing using clap derive API
//!
//! This module defines the command-line interface structure using clap's derive macros.
//! It is purely declarative with no side effects or I/O.

use std::path::PathBuf;

use clap::{Parser, ValueEnum};

/// Default harness configuration file, used when `--config` is not given.
pub const DEFAULT_CONFIG: &str = "iwpotest.toml";

/// iwpotest -- runs `*.iwpotest` scenarios against the game executable.
///
/// Each scenario gets its own copy of the game, injected event code and a
/// companion server process. Exit code is 0 when every scenario passed.
#[derive(Parser, Debug)]
#[command(name = "iwpotest", version, about, long_about = None)]
pub struct Cli {
    /// Scenario files, or directories searched recursively for `*.iwpotest`.
    #[arg(required = true)]
    pub files: Vec<PathBuf>,

    /// Path to the iwpotest.toml configuration file.
    ///
    /// A missing file is only an error when the path is given explicitly.
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Directory holding the program executable and its `data/` resources.
    #[arg(long)]
    pub iwpo_dir: Option<PathBuf>,

    /// Directory under which per-scenario working directories are created.
    #[arg(long)]
    pub temp_dir: Option<PathBuf>,

    /// Companion command line, whitespace separated (e.g. "node iwpo/server.js").
    #[arg(long)]
    pub companion: Option<String>,

    /// Number of scenarios run concurrently (0 = all at once).
    #[arg(long)]
    pub max_parallel: Option<usize>,

    /// Keep working directories after the run.
    #[arg(short, long)]
    pub keep: bool,

    /// Include each scenario's diagnostic log in the report.
    #[arg(short, long)]
    pub verbose: bool,

    /// Write per-scenario logs and a summary under the temp directory.
    #[arg(long)]
    pub write_logs: bool,

    /// Override log level (trace, debug, info, warn, error).
    #[arg(long)]
    pub log_level: Option<String>,

    /// Output format.
    #[arg(long, default_value = "text")]
    pub output: OutputFormat,
}

/// Supported output formats.
#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable report.
    Text,
    /// Machine-readable JSON.
    Json,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_files_and_defaults() {
        let cli = Cli::try_parse_from(["iwpotest", "tests/jump.iwpotest", "tests/suite"])
            .expect("should parse");
        assert_eq!(cli.files.len(), 2);
        assert!(cli.config.is_none());
        assert!(!cli.keep);
        assert!(!cli.verbose);
        assert!(matches!(cli.output, OutputFormat::Text));
    }

    #[test]
    fn parses_all_overrides() {
        let cli = Cli::try_parse_from([
            "iwpotest",
            "-c",
            "custom.toml",
            "--iwpo-dir",
            "build",
            "--temp-dir",
            "/tmp/iwpo",
            "--companion",
            "node server.js",
            "--max-parallel",
            "4",
            "-k",
            "-v",
            "--write-logs",
            "--log-level",
            "debug",
            "--output",
            "json",
            "a.iwpotest",
        ])
        .expect("should parse");

        assert_eq!(cli.config, Some(PathBuf::from("custom.toml")));
        assert_eq!(cli.iwpo_dir, Some(PathBuf::from("build")));
        assert_eq!(cli.temp_dir, Some(PathBuf::from("/tmp/iwpo")));
        assert_eq!(cli.companion.as_deref(), Some("node server.js"));
        assert_eq!(cli.max_parallel, Some(4));
        assert!(cli.keep && cli.verbose && cli.write_logs);
        assert_eq!(cli.log_level.as_deref(), Some("debug"));
        assert!(matches!(cli.output, OutputFormat::Json));
    }

    #[test]
    fn requires_at_least_one_file() {
        assert!(Cli::try_parse_from(["iwpotest"]).is_err());
    }

    #[test]
    fn rejects_unknown_output_format() {
        assert!(Cli::try_parse_from(["iwpotest", "--output", "yaml", "a.iwpotest"]).is_err());
    }
}
