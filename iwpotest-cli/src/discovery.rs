//! Scenario file discovery
//!
//! Expands the command-line paths into an ordered, de-duplicated list of
//! scenario files. Uses blocking I/O; call from `spawn_blocking` inside async code.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

/// Scenario file extension (without the dot).
pub const SCENARIO_EXTENSION: &str = "iwpotest";

/// Resolve `inputs` into scenario files.
///
/// Files are taken as given. Directories are searched recursively for
/// `*.iwpotest`, sorted per directory. A file reached twice runs once, at its
/// first position. Paths that match nothing are warned about and skipped.
pub fn discover(inputs: &[PathBuf]) -> Vec<PathBuf> {
    let mut seen = HashSet::new();
    let mut found = Vec::new();

    for input in inputs {
        let mut matched = Vec::new();
        if input.is_file() {
            matched.push(input.clone());
        } else if input.is_dir() {
            collect_recursive(input, &mut matched);
            matched.sort();
        }

        if matched.is_empty() {
            warn!(path = %input.display(), "no scenario files match");
            continue;
        }

        for path in matched {
            let key = std::fs::canonicalize(&path).unwrap_or_else(|_| path.clone());
            if seen.insert(key) {
                found.push(path);
            } else {
                debug!(path = %path.display(), "duplicate scenario file skipped");
            }
        }
    }

    found
}

fn collect_recursive(dir: &Path, out: &mut Vec<PathBuf>) {
    let entries = match std::fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) => {
            warn!(dir = %dir.display(), error = %e, "failed to read directory");
            return;
        }
    };

    for entry in entries {
        let entry = match entry {
            Ok(e) => e,
            Err(e) => {
                warn!(error = %e, "failed to read directory entry");
                continue;
            }
        };
        let path = entry.path();
        if path.is_dir() {
            collect_recursive(&path, out);
        } else if is_scenario_file(&path) {
            out.push(path);
        }
    }
}

/// Whether `path` carries the scenario file extension.
pub fn is_scenario_file(path: &Path) -> bool {
    path.extension().is_some_and(|ext| ext == SCENARIO_EXTENSION)
}
