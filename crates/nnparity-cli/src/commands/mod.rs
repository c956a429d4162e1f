//! Subcommands

mod list;
mod run;

pub use list::ListCommand;
pub use run::RunCommand;

use anyhow::{Context, Result, anyhow};
use nnparity_runner::{Suite, builtin_suite, builtin_suites, load_suite_file};
use std::path::PathBuf;

/// Built-in suites by name plus suites loaded from files. Nothing selected
/// means every built-in suite.
pub(crate) fn select_suites(names: &[String], files: &[PathBuf]) -> Result<Vec<Suite>> {
    if names.is_empty() && files.is_empty() {
        return Ok(builtin_suites());
    }

    let mut suites = Vec::with_capacity(names.len() + files.len());
    for name in names {
        let suite = builtin_suite(name).ok_or_else(|| {
            let known: Vec<String> = builtin_suites().into_iter().map(|s| s.name).collect();
            anyhow!("unknown suite `{name}` (built-in suites: {})", known.join(", "))
        })?;
        suites.push(suite);
    }
    for path in files {
        let suite = load_suite_file(path).with_context(|| format!("failed to load suite file {}", path.display()))?;
        suites.push(suite);
    }
    Ok(suites)
}
