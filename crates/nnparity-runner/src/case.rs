//! Test-case collection
//!
//! Every suite's matrix is expanded once at collection time. Tuples the
//! synthesiser flags as unverifiable are set aside with their reason and never
//! scheduled; the rest become [`TestCase`]s.

use crate::suite::Suite;
use nnparity_common::{BackendId, MatrixError, OverlayError};
use nnparity_config::{CaseOptions, OptionBlock, OptionName};
use nnparity_matrix::{CaseId, ParamTuple};
use nnparity_synth::{Frontend, ModelSynthesizer};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

/// One concrete parameter tuple of a suite, ready to run.
#[derive(Clone)]
pub struct TestCase {
    pub case_id: CaseId,
    pub suite: String,
    pub params: ParamTuple,
    pub frontend: Frontend,
    pub synthesizer: Arc<dyn ModelSynthesizer>,
    /// Suite backends (as a `targets` block) followed by the suite overlay.
    pub overlay: CaseOverlay,
}

impl fmt::Debug for TestCase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TestCase")
            .field("case_id", &self.case_id)
            .field("suite", &self.suite)
            .field("params", &self.params)
            .field("template", &self.synthesizer.template())
            .finish()
    }
}

/// Case-specific option layers, kept unparsed until the case runs so that a
/// bad overlay aborts only the cases that use it.
#[derive(Debug, Clone, Default)]
pub struct CaseOverlay {
    pub backends: Vec<BackendId>,
    pub document: Option<String>,
}

impl CaseOverlay {
    /// Merge over `base`: suite backends first, then the overlay document.
    pub fn apply(&self, base: &CaseOptions) -> Result<CaseOptions, OverlayError> {
        let mut merged = base.clone();
        if !self.backends.is_empty() {
            let values = self.backends.iter().map(|b| serde_yaml::Value::from(b.as_str())).collect();
            merged.set(OptionBlock::new(OptionName::Targets, values)?);
        }
        if let Some(document) = &self.document {
            merged = merged.merge(&CaseOptions::parse(document)?);
        }
        Ok(merged)
    }
}

/// A tuple removed from the runnable set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExcludedCase {
    pub suite: String,
    pub case_id: CaseId,
    pub params: ParamTuple,
    pub reason: String,
}

#[derive(Debug, Default)]
pub struct Collection {
    pub cases: Vec<TestCase>,
    pub excluded: Vec<ExcludedCase>,
}

/// Expand every suite into test cases, in suite order then matrix order.
pub fn collect_cases(suites: &[Suite]) -> Result<Collection, MatrixError> {
    let mut names = HashSet::new();
    let mut collection = Collection::default();

    for suite in suites {
        if !names.insert(suite.name.as_str()) {
            return Err(MatrixError::InvalidSuite {
                suite: suite.name.clone(),
                message: "declared more than once".to_string(),
            });
        }
        suite.validate()?;

        let synthesizer = suite.synthesizer()?;
        let expansion = suite.axes.partition(|params| synthesizer.exclusion_reason(params))?;
        let overlay = CaseOverlay { backends: suite.backends.clone(), document: suite.overlay.clone() };

        for excluded in expansion.excluded {
            collection.excluded.push(ExcludedCase {
                suite: suite.name.clone(),
                case_id: excluded.params.case_id(&suite.name),
                params: excluded.params,
                reason: excluded.reason,
            });
        }

        for params in expansion.included {
            collection.cases.push(TestCase {
                case_id: params.case_id(&suite.name),
                suite: suite.name.clone(),
                params,
                frontend: suite.frontend,
                synthesizer: Arc::clone(&synthesizer),
                overlay: overlay.clone(),
            });
        }
    }

    Ok(collection)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::suite::{builtin_suite, builtin_suites};
    use nnparity_matrix::ParamValue;

    #[test]
    fn test_random_normal_excludes_unseeded_tuples() {
        let suite = builtin_suite("onnx_random_normal").unwrap();
        let collection = collect_cases(&[suite]).unwrap();
        assert_eq!(collection.cases.len(), 4);
        assert_eq!(collection.excluded.len(), 4);
        assert!(collection.cases.iter().all(|c| c.params.get("seed") == Some(&ParamValue::Float(1.0))));
        assert!(collection.excluded.iter().all(|e| e.reason.contains("seed")));
    }

    #[test]
    fn test_case_ids_are_unique_across_builtin_suites() {
        let collection = collect_cases(&builtin_suites()).unwrap();
        let ids: HashSet<_> = collection.cases.iter().map(|c| c.case_id.clone()).collect();
        assert_eq!(ids.len(), collection.cases.len());
        // slice 4 + eltwise 3 + letterbox 3 + random_normal 4
        assert_eq!(collection.cases.len(), 14);
    }

    #[test]
    fn test_duplicate_suite_is_fatal() {
        let suite = builtin_suite("caffe_slice").unwrap();
        let err = collect_cases(&[suite.clone(), suite]).unwrap_err();
        assert!(err.to_string().contains("declared more than once"));
    }

    #[test]
    fn test_suite_backends_become_targets() {
        let suite = builtin_suite("caffe_slice").unwrap();
        let case = collect_cases(&[suite]).unwrap().cases.remove(0);
        let resolved = case.overlay.apply(&CaseOptions::builtin()).unwrap().resolve().unwrap();
        assert_eq!(resolved.compile.targets, [BackendId::new("cpu"), BackendId::new("k210")]);
    }

    #[test]
    fn test_overlay_document_wins_over_suite_backends() {
        let overlay = CaseOverlay {
            backends: vec![BackendId::new("cpu"), BackendId::new("k210")],
            document: Some("case:\n  compile_opt:\n    - name: targets\n      values: [k510]\n".to_string()),
        };
        let resolved = overlay.apply(&CaseOptions::builtin()).unwrap().resolve().unwrap();
        assert_eq!(resolved.compile.targets, [BackendId::new("k510")]);
    }
}
