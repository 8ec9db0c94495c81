//! CLI-specific error types and exit code mapping

use iwpotest_core::error::HarnessError;

/// CLI-specific error type.
///
/// Each variant carries enough context for a user-friendly message.
/// The `exit_code()` method maps errors to the process exit code.
#[derive(Debug, thiserror::Error)]
pub enum CliError {
    /// Configuration loading, validation or startup check failure.
    #[error("configuration error: {0}")]
    Config(String),

    /// A run step failed outside any single scenario.
    #[error("{0}")]
    Command(String),

    /// At least one scenario did not pass.
    #[error("{failed} of {total} scenario(s) failed")]
    ScenariosFailed { failed: usize, total: usize },

    /// JSON serialisation failed during output rendering.
    #[error("json output error: {0}")]
    JsonSerialize(#[from] serde_json::Error),

    /// IO error (log directory, stdout write, etc.).
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Wrapped domain error from iwpotest-core.
    #[error("{0}")]
    Core(#[from] HarnessError),
}

impl CliError {
    /// Map the error to a process exit code.
    ///
    /// | Code | Meaning                          |
    /// |------|----------------------------------|
    /// | 0    | Every scenario passed            |
    /// | 1    | Scenario failure / general error |
    /// | 2    | Harness configuration error      |
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Config(_) | Self::Core(HarnessError::Config(_)) => 2,
            Self::Command(_)
            | Self::ScenariosFailed { .. }
            | Self::JsonSerialize(_)
            | Self::Io(_)
            | Self::Core(_) => 1,
        }
    }
}
