//! Verdicts and the run report

use crate::case::ExcludedCase;
use chrono::{DateTime, Utc};
use console::style;
use nnparity_common::{BackendId, HarnessError};
use nnparity_compare::{Comparison, Diagnostic};
use nnparity_matrix::CaseId;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;

/// Terminal status of one (case, backend) pair. Ordered from best to worst.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Outcome {
    Passed,
    Failed,
    Errored,
}

impl Outcome {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Passed)
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Passed => "PASS",
            Self::Failed => "FAIL",
            Self::Errored => "ERROR",
        }
    }

    /// Worst outcome of a set; `None` when empty.
    pub fn worst(outcomes: impl IntoIterator<Item = Outcome>) -> Option<Outcome> {
        outcomes.into_iter().max()
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Pipeline stage a verdict was decided in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    /// The case never ran to completion inside the worker pool.
    Scheduling,
    Overlay,
    Synthesis,
    Inputs,
    Compile,
    Reference,
    Execution,
    Comparison,
}

impl Stage {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Scheduling => "scheduling",
            Self::Overlay => "overlay",
            Self::Synthesis => "synthesis",
            Self::Inputs => "inputs",
            Self::Compile => "compile",
            Self::Reference => "reference",
            Self::Execution => "execution",
            Self::Comparison => "comparison",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Outcome of one (case, backend) pair. Never mutated once created.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Verdict {
    case_id: CaseId,
    suite: String,
    backend: BackendId,
    outcome: Outcome,
    stage: Stage,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    comparison: Option<Comparison>,
}

impl Verdict {
    /// Passed, Failed or (for an output-count mismatch) Errored.
    pub fn from_comparison(case_id: CaseId, suite: impl Into<String>, backend: BackendId, comparison: Comparison) -> Self {
        let (outcome, error) = match &comparison {
            Comparison::Match { .. } => (Outcome::Passed, None),
            Comparison::Mismatch(_) => (Outcome::Failed, None),
            Comparison::CountMismatch { golden, actual } => {
                (Outcome::Errored, Some(format!("output count mismatch: golden has {golden}, backend produced {actual}")))
            }
        };
        Self { case_id, suite: suite.into(), backend, outcome, stage: Stage::Comparison, error, comparison: Some(comparison) }
    }

    pub fn errored(
        case_id: CaseId,
        suite: impl Into<String>,
        backend: BackendId,
        stage: Stage,
        error: impl fmt::Display,
    ) -> Self {
        Self {
            case_id,
            suite: suite.into(),
            backend,
            outcome: Outcome::Errored,
            stage,
            error: Some(error.to_string()),
            comparison: None,
        }
    }

    pub fn case_id(&self) -> &CaseId {
        &self.case_id
    }

    pub fn suite(&self) -> &str {
        &self.suite
    }

    pub fn backend(&self) -> &BackendId {
        &self.backend
    }

    pub fn outcome(&self) -> Outcome {
        self.outcome
    }

    pub fn stage(&self) -> Stage {
        self.stage
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn comparison(&self) -> Option<&Comparison> {
        self.comparison.as_ref()
    }

    pub fn diagnostic(&self) -> Option<&Diagnostic> {
        match &self.comparison {
            Some(Comparison::Mismatch(d)) => Some(d),
            _ => None,
        }
    }

    /// One-line cause for Failed/Errored verdicts; empty when Passed.
    pub fn detail(&self) -> String {
        match (self.outcome, self.diagnostic(), &self.error) {
            (Outcome::Passed, _, _) => String::new(),
            (_, Some(diagnostic), _) => diagnostic.to_string(),
            (_, None, Some(error)) => format!("[{}] {error}", self.stage),
            (_, None, None) => format!("[{}]", self.stage),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Summary {
    pub cases: usize,
    pub verdicts: usize,
    pub passed: usize,
    pub failed: usize,
    pub errored: usize,
    pub excluded: usize,
}

/// Aggregated result of a run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunReport {
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub summary: Summary,
    /// Sorted by case id, then backend.
    pub verdicts: Vec<Verdict>,
    pub excluded: Vec<ExcludedCase>,
}

impl RunReport {
    pub fn new(started_at: DateTime<Utc>, mut verdicts: Vec<Verdict>, excluded: Vec<ExcludedCase>) -> Self {
        verdicts.sort_by(|a, b| (&a.case_id, &a.backend).cmp(&(&b.case_id, &b.backend)));

        let mut summary = Summary { verdicts: verdicts.len(), excluded: excluded.len(), ..Summary::default() };
        for v in &verdicts {
            match v.outcome {
                Outcome::Passed => summary.passed += 1,
                Outcome::Failed => summary.failed += 1,
                Outcome::Errored => summary.errored += 1,
            }
        }
        summary.cases = verdicts.iter().map(|v| &v.case_id).collect::<std::collections::BTreeSet<_>>().len();

        Self { started_at, finished_at: Utc::now(), summary, verdicts, excluded }
    }

    /// Every verdict Passed. A run with nothing to check is vacuously
    /// successful.
    pub fn success(&self) -> bool {
        self.verdicts.iter().all(|v| v.outcome.is_success())
    }

    pub fn verdicts_for<'a>(&'a self, case_id: &'a CaseId) -> impl Iterator<Item = &'a Verdict> + 'a {
        self.verdicts.iter().filter(move |v| &v.case_id == case_id)
    }

    /// Worst outcome among the case's backends.
    pub fn case_status(&self, case_id: &CaseId) -> Option<Outcome> {
        Outcome::worst(self.verdicts_for(case_id).map(|v| v.outcome))
    }

    pub fn write_json(&self, path: &Path) -> Result<(), HarnessError> {
        let json = serde_json::to_string_pretty(self).map_err(|e| HarnessError::runtime(e.to_string()))?;
        std::fs::write(path, json).map_err(|e| HarnessError::io(path, e))
    }

    pub fn to_markdown(&self) -> String {
        let s = &self.summary;
        let mut markdown = String::new();

        markdown.push_str("# nnparity Report\n\n");
        markdown.push_str(&format!(
            "Started {} and finished {} ({:.2}s).\n\n",
            self.started_at.format("%Y-%m-%d %H:%M:%S UTC"),
            self.finished_at.format("%Y-%m-%d %H:%M:%S UTC"),
            (self.finished_at - self.started_at).num_milliseconds() as f64 / 1000.0
        ));

        markdown.push_str("## Summary\n\n");
        markdown.push_str("| Metric | Value |\n");
        markdown.push_str("|--------|-------|\n");
        markdown.push_str(&format!("| Cases | {} |\n", s.cases));
        markdown.push_str(&format!("| Verdicts | {} |\n", s.verdicts));
        markdown.push_str(&format!("| Passed | {} |\n", s.passed));
        markdown.push_str(&format!("| Failed | {} |\n", s.failed));
        markdown.push_str(&format!("| Errored | {} |\n", s.errored));
        markdown.push_str(&format!("| Excluded | {} |\n", s.excluded));
        markdown.push_str(&format!("| Result | {} |\n\n", if self.success() { "✅ PASS" } else { "❌ FAIL" }));

        if !self.verdicts.is_empty() {
            markdown.push_str("## Verdicts\n\n");
            markdown.push_str("| Case | Backend | Status | Details |\n");
            markdown.push_str("|------|---------|--------|---------|\n");
            for v in &self.verdicts {
                let icon = match v.outcome {
                    Outcome::Passed => "✅",
                    Outcome::Failed => "❌",
                    Outcome::Errored => "💥",
                };
                markdown.push_str(&format!(
                    "| `{}` | {} | {} {} | {} |\n",
                    v.case_id,
                    v.backend,
                    icon,
                    v.outcome,
                    escape_cell(&v.detail())
                ));
            }
            markdown.push('\n');
        }

        if !self.excluded.is_empty() {
            markdown.push_str("## Excluded\n\n");
            markdown.push_str("| Case | Parameters | Reason |\n");
            markdown.push_str("|------|------------|--------|\n");
            for e in &self.excluded {
                markdown.push_str(&format!("| `{}` | {} | {} |\n", e.case_id, escape_cell(&e.params.to_string()), e.reason));
            }
            markdown.push('\n');
        }

        markdown
    }

    pub fn write_markdown(&self, path: &Path) -> Result<(), HarnessError> {
        std::fs::write(path, self.to_markdown()).map_err(|e| HarnessError::io(path, e))
    }

    /// Console summary: every non-passing pair with its cause, then totals.
    pub fn print_summary(&self) {
        for v in self.verdicts.iter().filter(|v| !v.outcome.is_success()) {
            let marker = match v.outcome {
                Outcome::Failed => style(v.outcome.label()).red().bold(),
                _ => style(v.outcome.label()).magenta().bold(),
            };
            println!("{marker} {} [{}]: {}", v.case_id, v.backend, v.detail());
        }

        let s = &self.summary;
        println!(
            "{} passed, {} failed, {} errored across {} cases ({} excluded)",
            style(s.passed).green(),
            style(s.failed).red(),
            style(s.errored).magenta(),
            s.cases,
            s.excluded
        );
        if self.success() {
            println!("{}", style("PASS").green().bold());
        } else {
            println!("{}", style("FAIL").red().bold());
        }
    }
}

fn escape_cell(text: &str) -> String {
    text.replace('|', "\\|").replace('\n', " ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use nnparity_common::{ExecutionError, Tensor, ToleranceSpec};
    use nnparity_compare::compare;
    use nnparity_matrix::ParamTuple;
    use std::time::Duration;

    fn id(n: i64) -> CaseId {
        ParamTuple::new().with("n", n).case_id("suite")
    }

    fn passed(case: CaseId, backend: &str) -> Verdict {
        let golden = vec![Tensor::from_f32(vec![1], vec![1.0]).unwrap()];
        Verdict::from_comparison(case, "suite", backend.into(), compare(&golden, &golden, ToleranceSpec::default()))
    }

    fn failed(case: CaseId, backend: &str) -> Verdict {
        let golden = vec![Tensor::from_f32(vec![1], vec![1.0]).unwrap()];
        let actual = vec![Tensor::from_f32(vec![1], vec![2.0]).unwrap()];
        Verdict::from_comparison(case, "suite", backend.into(), compare(&golden, &actual, ToleranceSpec::default()))
    }

    #[test]
    fn test_outcome_ordering_is_worst_last() {
        assert_eq!(Outcome::worst([Outcome::Passed, Outcome::Errored, Outcome::Failed]), Some(Outcome::Errored));
        assert_eq!(Outcome::worst([]), None);
    }

    #[test]
    fn test_count_mismatch_is_errored_not_failed() {
        let v = Verdict::from_comparison(id(1), "suite", "cpu".into(), Comparison::CountMismatch { golden: 2, actual: 1 });
        assert_eq!(v.outcome(), Outcome::Errored);
        assert!(v.detail().contains("golden has 2"));
    }

    #[test]
    fn test_case_status_is_worst_backend() {
        let timeout = ExecutionError::timeout("k210", Duration::from_secs(1));
        let report = RunReport::new(
            Utc::now(),
            vec![
                passed(id(1), "cpu"),
                Verdict::errored(id(1), "suite", "k210".into(), Stage::Execution, timeout),
                passed(id(3), "cpu"),
                failed(id(3), "k210"),
            ],
            Vec::new(),
        );
        assert_eq!(report.case_status(&id(1)), Some(Outcome::Errored));
        assert_eq!(report.case_status(&id(3)), Some(Outcome::Failed));
        assert_eq!(report.summary, Summary { cases: 2, verdicts: 4, passed: 2, failed: 1, errored: 1, excluded: 0 });
        assert!(!report.success());
    }

    #[test]
    fn test_empty_report_is_vacuous_success() {
        assert!(RunReport::new(Utc::now(), Vec::new(), Vec::new()).success());
    }

    #[test]
    fn test_markdown_lists_every_pair_with_cause() {
        let report = RunReport::new(Utc::now(), vec![passed(id(1), "cpu"), failed(id(1), "k210")], Vec::new());
        let md = report.to_markdown();
        assert!(md.contains("| Metric | Value |"));
        assert!(md.contains("| Failed | 1 |"));
        assert!(md.contains("✅ PASS"));
        assert!(md.contains("1 of 1 elements exceed"));
    }

    #[test]
    fn test_json_report_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("report.json");
        let report = RunReport::new(Utc::now(), vec![failed(id(1), "cpu")], Vec::new());
        report.write_json(&path).unwrap();

        let back: RunReport = serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(back.verdicts, report.verdicts);
        assert!(back.verdicts[0].diagnostic().is_some());
    }
}
