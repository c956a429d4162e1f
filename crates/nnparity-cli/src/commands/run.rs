//! `nnparity run`

use super::select_suites;
use crate::exit::{EXIT_SUCCESS, EXIT_VERDICT_FAIL};
use anyhow::{Context, Result};
use clap::Parser;
use console::style;
use nnparity_config::{HarnessConfig, ReportFormat};
use nnparity_runner::{Harness, LOG_FILE, REPORT_JSON, REPORT_MARKDOWN, init_logging};
use std::path::PathBuf;
use tracing::info;

/// Run suites against every configured backend
#[derive(Debug, Parser)]
pub struct RunCommand {
    /// Built-in suite to run (repeatable; default: all)
    #[arg(long = "suite", value_name = "NAME")]
    pub suites: Vec<String>,

    /// Suite YAML file to run (repeatable)
    #[arg(long = "suite-file", value_name = "PATH")]
    pub suite_files: Vec<PathBuf>,

    /// Base case option document (YAML)
    #[arg(long, value_name = "PATH")]
    pub case_config: Option<PathBuf>,

    /// Directory for per-case outputs and reports
    #[arg(long, value_name = "DIR")]
    pub run_root: Option<PathBuf>,

    /// Maximum number of cases in flight
    #[arg(short, long, value_name = "N")]
    pub jobs: Option<usize>,
}

impl RunCommand {
    /// Command-line values win over the configuration file.
    pub fn apply_overrides(&self, config: &mut HarnessConfig) {
        if let Some(case_config) = &self.case_config {
            config.setup.case_config = Some(case_config.clone());
        }
        if let Some(run_root) = &self.run_root {
            config.setup.run_root = run_root.clone();
        }
        if let Some(jobs) = self.jobs {
            config.setup.max_parallel = jobs;
        }
    }

    pub async fn execute(&self, mut config: HarnessConfig) -> Result<i32> {
        self.apply_overrides(&mut config);
        let suites = select_suites(&self.suites, &self.suite_files)?;

        let run_root = &config.setup.run_root;
        std::fs::create_dir_all(run_root).with_context(|| format!("cannot create run root {}", run_root.display()))?;
        init_logging(&config.setup).context("failed to initialise logging")?;

        let harness = Harness::from_config(&config).context("invalid harness configuration")?;
        info!(suites = suites.len(), run_root = %run_root.display(), "starting run");
        let report = harness.run(&suites).await.context("run aborted")?;

        report.print_summary();
        for format in &config.setup.report_formats {
            let file = match format {
                ReportFormat::Json => REPORT_JSON,
                ReportFormat::Markdown => REPORT_MARKDOWN,
            };
            println!("{} {}", style("report:").dim(), run_root.join(file).display());
        }
        println!("{} {}", style("log:").dim(), run_root.join(LOG_FILE).display());

        Ok(if report.success() { EXIT_SUCCESS } else { EXIT_VERDICT_FAIL })
    }
}
