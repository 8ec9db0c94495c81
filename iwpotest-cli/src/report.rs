//! Run report and optional log persistence

use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::{DateTime, Local};
use colored::Colorize;
use serde::Serialize;
use tracing::info;

use iwpotest_scenario::{Scenario, ScenarioState};

use crate::error::CliError;
use crate::output::Render;

/// Summary file written next to the per-scenario logs.
pub const SUMMARY_FILE: &str = "_result.txt";

/// Outcome of a whole run.
#[derive(Debug, Serialize)]
pub struct RunReport {
    pub scenarios: Vec<ScenarioReport>,
    pub passed: usize,
    pub total: usize,
    pub elapsed_secs: f64,
    #[serde(skip)]
    pub verbose: bool,
}

/// Outcome of a single scenario.
#[derive(Debug, Clone, Serialize)]
pub struct ScenarioReport {
    pub name: String,
    pub path: String,
    pub state: ScenarioState,
    pub passed: bool,
    pub message: Option<String>,
    pub log: Vec<String>,
}

impl ScenarioReport {
    pub fn from_scenario(scenario: &Scenario) -> Self {
        Self {
            name: scenario.name().to_owned(),
            path: scenario.path().display().to_string(),
            state: scenario.state(),
            passed: scenario.passed(),
            message: scenario.message().map(str::to_owned),
            log: scenario.log().to_vec(),
        }
    }

    /// `[name] PASSED` or `[name] FAILED - message`, without color.
    pub fn status_line(&self) -> String {
        if self.passed {
            format!("[{}] PASSED", self.name)
        } else {
            match &self.message {
                Some(message) => format!("[{}] FAILED - {}", self.name, message),
                None => format!("[{}] FAILED", self.name),
            }
        }
    }

    fn render_colored(&self, w: &mut dyn Write) -> std::io::Result<()> {
        let name = format!("[{}]", self.name).bold();
        if self.passed {
            writeln!(w, "{} {}", name, "PASSED".green())
        } else {
            match &self.message {
                Some(message) => writeln!(w, "{} {} - {}", name, "FAILED".red(), message),
                None => writeln!(w, "{} {}", name, "FAILED".red()),
            }
        }
    }
}

impl RunReport {
    pub fn new(scenarios: &[Scenario], elapsed: Duration, verbose: bool) -> Self {
        let scenarios: Vec<ScenarioReport> =
            scenarios.iter().map(ScenarioReport::from_scenario).collect();
        let passed = scenarios.iter().filter(|s| s.passed).count();
        Self {
            total: scenarios.len(),
            passed,
            scenarios,
            elapsed_secs: elapsed.as_secs_f64(),
            verbose,
        }
    }

    pub fn all_passed(&self) -> bool {
        self.passed == self.total
    }

    pub fn failed(&self) -> usize {
        self.total - self.passed
    }

    pub fn result_line(&self) -> String {
        format!("Result: {}/{} passed.", self.passed, self.total)
    }

    /// Uncolored report text, as written to [`SUMMARY_FILE`].
    pub fn plain_text(&self) -> String {
        let mut out = String::new();
        for scenario in &self.scenarios {
            out.push_str(&scenario.status_line());
            out.push('\n');
            if self.verbose {
                for line in &scenario.log {
                    out.push_str("    ");
                    out.push_str(line);
                    out.push('\n');
                }
            }
        }
        out.push_str(&self.result_line());
        out.push('\n');
        out
    }
}

impl Render for RunReport {
    fn render_text(&self, w: &mut dyn Write) -> std::io::Result<()> {
        for scenario in &self.scenarios {
            scenario.render_colored(w)?;
            if self.verbose {
                for line in &scenario.log {
                    writeln!(w, "    {}", line.dimmed())?;
                }
            }
        }

        let result = self.result_line();
        if self.all_passed() {
            writeln!(w, "{}", result.green().bold())
        } else {
            writeln!(w, "{}", result.red().bold())
        }
    }
}

/// Write `<scenario>.txt` per scenario and [`SUMMARY_FILE`] into a directory
/// named after `started` under `root`. Returns the created directory.
pub async fn write_logs(
    report: &RunReport,
    root: &Path,
    started: DateTime<Local>,
) -> Result<PathBuf, CliError> {
    let dir = root.join(started.format("%Y-%m-%d_%H-%M-%S").to_string());
    tokio::fs::create_dir_all(&dir).await?;

    let mut used = std::collections::HashSet::from([SUMMARY_FILE.to_owned()]);
    for scenario in &report.scenarios {
        let file = unique_log_name(&scenario.name, &mut used);
        let mut content = scenario.status_line();
        content.push('\n');
        for line in &scenario.log {
            content.push_str(line);
            content.push('\n');
        }
        tokio::fs::write(dir.join(file), content).await?;
    }

    tokio::fs::write(dir.join(SUMMARY_FILE), report.plain_text()).await?;
    info!(dir = %dir.display(), "scenario logs written");
    Ok(dir)
}

/// Log file name for a scenario, unique within `used`.
///
/// The scenario name comes from the file or `configuration.name`, so anything
/// that could leave the log directory (separators, leading dots) is replaced.
fn unique_log_name(name: &str, used: &mut std::collections::HashSet<String>) -> String {
    let name = sanitize_file_stem(name);
    let mut candidate = format!("{name}.txt");
    let mut n = 2;
    while !used.insert(candidate.clone()) {
        candidate = format!("{name}-{n}.txt");
        n += 1;
    }
    candidate
}

fn sanitize_file_stem(name: &str) -> String {
    let cleaned: String = name
        .chars()
        .map(|c| {
            if c.is_alphanumeric() || matches!(c, '-' | '_' | '.' | ' ') {
                c
            } else {
                '_'
            }
        })
        .collect();
    let cleaned = cleaned.trim_start_matches('.').trim();
    if cleaned.is_empty() {
        "scenario".to_owned()
    } else {
        cleaned.to_owned()
    }
}
