//! `nnparity list`

use super::select_suites;
use anyhow::Result;
use clap::Parser;
use console::style;
use nnparity_runner::Harness;
use std::path::PathBuf;

/// Print the cases suites expand to, without running anything
#[derive(Debug, Parser)]
pub struct ListCommand {
    /// Built-in suite to list (repeatable; default: all)
    #[arg(long = "suite", value_name = "NAME")]
    pub suites: Vec<String>,

    /// Suite YAML file to list (repeatable)
    #[arg(long = "suite-file", value_name = "PATH")]
    pub suite_files: Vec<PathBuf>,
}

impl ListCommand {
    pub fn execute(&self) -> Result<()> {
        let suites = select_suites(&self.suites, &self.suite_files)?;
        let collection = Harness::list(&suites)?;

        for suite in &suites {
            let backends = if suite.backends.is_empty() {
                "default targets".to_string()
            } else {
                suite.backends.iter().map(|b| b.to_string()).collect::<Vec<_>>().join(", ")
            };
            println!("{} ({}/{}, {backends})", style(&suite.name).bold(), suite.frontend, suite.template);

            for case in collection.cases.iter().filter(|c| c.suite == suite.name) {
                println!("  {} {}", style(&case.case_id).cyan(), case.params);
            }
            for excluded in collection.excluded.iter().filter(|e| e.suite == suite.name) {
                println!("  {} {} {}", style(&excluded.case_id).dim(), style("excluded:").yellow(), excluded.reason);
            }
        }

        println!(
            "\n{} cases, {} excluded",
            style(collection.cases.len()).bold(),
            style(collection.excluded.len()).bold()
        );
        Ok(())
    }
}
