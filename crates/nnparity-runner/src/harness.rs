//! Top-level entry point: collect, run, report

use crate::case::{Collection, collect_cases};
use crate::orchestrator::{RunContext, run_case};
use crate::pool::run_cases;
use crate::registry::EngineRegistry;
use crate::report::RunReport;
use crate::suite::Suite;
use chrono::Utc;
use nnparity_common::HarnessError;
use nnparity_config::{CaseOptions, HarnessConfig, ReportFormat, SetupConfig, load_case_options, validate_config};
use std::sync::Arc;
use tracing::{info, warn};

pub const REPORT_JSON: &str = "report.json";
pub const REPORT_MARKDOWN: &str = "report.md";

pub struct Harness {
    setup: SetupConfig,
    ctx: Arc<RunContext>,
}

impl Harness {
    pub fn new(setup: SetupConfig, base_options: CaseOptions, registry: EngineRegistry) -> Self {
        let ctx = RunContext {
            registry,
            base_options,
            run_root: setup.run_root.clone(),
            input_seed: setup.input_seed,
        };
        Self { setup, ctx: Arc::new(ctx) }
    }

    /// Validate `config` and build command adapters for it.
    pub fn from_config(config: &HarnessConfig) -> Result<Self, HarnessError> {
        validate_config(config)?;
        let base_options = load_case_options(&config.setup)?;
        // The base document alone must resolve; overlays are checked per case.
        base_options.resolve().map_err(nnparity_common::ConfigError::from)?;
        let registry = EngineRegistry::from_config(config)?;
        Ok(Self::new(config.setup.clone(), base_options, registry))
    }

    pub fn setup(&self) -> &SetupConfig {
        &self.setup
    }

    pub fn context(&self) -> &RunContext {
        &self.ctx
    }

    /// Expand suites without running anything.
    pub fn list(suites: &[Suite]) -> Result<Collection, HarnessError> {
        Ok(collect_cases(suites)?)
    }

    /// Run every case of `suites` and write the configured reports.
    pub async fn run(&self, suites: &[Suite]) -> Result<RunReport, HarnessError> {
        let started_at = Utc::now();
        let collection = collect_cases(suites)?;
        info!(
            suites = suites.len(),
            cases = collection.cases.len(),
            excluded = collection.excluded.len(),
            "collected test cases"
        );
        for excluded in &collection.excluded {
            info!(case_id = %excluded.case_id, reason = %excluded.reason, "excluded from comparison");
        }

        let run_root = &self.setup.run_root;
        std::fs::create_dir_all(run_root).map_err(|e| HarnessError::io(run_root, e))?;

        let verdicts = run_cases(collection.cases, Arc::clone(&self.ctx), self.setup.max_parallel).await;
        let report = RunReport::new(started_at, verdicts, collection.excluded);

        for format in &self.setup.report_formats {
            match format {
                ReportFormat::Json => report.write_json(&run_root.join(REPORT_JSON))?,
                ReportFormat::Markdown => report.write_markdown(&run_root.join(REPORT_MARKDOWN))?,
            }
        }

        let s = &report.summary;
        if report.success() {
            info!(passed = s.passed, excluded = s.excluded, "run passed");
        } else {
            warn!(passed = s.passed, failed = s.failed, errored = s.errored, "run failed");
        }
        Ok(report)
    }

    /// Run a single case outside the pool. Useful for reproducing one failure.
    pub async fn run_one(&self, case: &crate::case::TestCase) -> RunReport {
        let started_at = Utc::now();
        RunReport::new(started_at, run_case(case, &self.ctx).await, Vec::new())
    }
}
