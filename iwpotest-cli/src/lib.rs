//! iwpotest CLI library
//!
//! The `iwpotest` binary is a thin wrapper over [`run::load_config`] and
//! [`run::execute`]; the pieces are exposed here for integration tests.

pub mod cli;
pub mod discovery;
pub mod error;
pub mod logging;
pub mod output;
pub mod report;
pub mod run;
pub mod scheduler;

pub use error::CliError;
pub use report::{RunReport, ScenarioReport};
pub use scheduler::{Schedule, Scheduler};
