//! Declarative test suites
//!
//! A suite pairs one model template with a parameter matrix, the backends it
//! targets and an optional case option overlay. Suites are either built in
//! (mirroring the operator tests the compiler ships with) or loaded from YAML.

use nnparity_common::{BackendId, HarnessError, MatrixError};
use nnparity_matrix::{ParamValue, ParameterMatrix};
use nnparity_synth::{Frontend, ModelSynthesizer, synthesizer_for};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;

/// Preprocessing overlay of the letterbox suite: a uint8 NHWC 56x56 image is
/// letterboxed onto each model input.
pub const LETTERBOX_OVERLAY: &str = r#"
case:
  preprocess_opt:
    - name: preprocess
      values: [true]
    - name: swapRB
      values: [false]
    - name: input_shape
      values:
        - [1, 56, 56, 3]
    - name: mean
      values:
        - [0, 0, 0]
    - name: std
      values:
        - [1, 1, 1]
    - name: input_range
      values:
        - [0, 255]
    - name: input_type
      values: [uint8]
    - name: input_layout
      values: [NHWC]
    - name: output_layout
      values: [NHWC]
    - name: letter_value
      values: [114.]
"#;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Suite {
    pub name: String,
    pub frontend: Frontend,
    pub template: String,
    #[serde(default)]
    pub axes: ParameterMatrix,
    /// Requested backends. Empty means whatever the case options target.
    #[serde(default)]
    pub backends: Vec<BackendId>,
    /// Case option document merged over the base options for every case.
    #[serde(default)]
    pub overlay: Option<String>,
}

impl Suite {
    pub fn new(name: impl Into<String>, frontend: Frontend, template: impl Into<String>, axes: ParameterMatrix) -> Self {
        Self { name: name.into(), frontend, template: template.into(), axes, backends: Vec::new(), overlay: None }
    }

    pub fn with_backends<B: Into<BackendId>>(mut self, backends: impl IntoIterator<Item = B>) -> Self {
        self.backends = backends.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_overlay(mut self, overlay: impl Into<String>) -> Self {
        self.overlay = Some(overlay.into());
        self
    }

    /// Synthesiser for this suite's template.
    pub fn synthesizer(&self) -> Result<Arc<dyn ModelSynthesizer>, MatrixError> {
        synthesizer_for(self.frontend, &self.template).ok_or_else(|| MatrixError::InvalidSuite {
            suite: self.name.clone(),
            message: format!("unknown {} template `{}`", self.frontend, self.template),
        })
    }

    /// Structural checks that make a suite unusable as a whole.
    pub fn validate(&self) -> Result<(), MatrixError> {
        let invalid = |message: String| MatrixError::InvalidSuite { suite: self.name.clone(), message };

        if self.name.trim().is_empty() {
            return Err(invalid("suite name must not be empty".to_string()));
        }
        if let Some(bad) = self.backends.iter().find(|b| !b.is_path_safe()) {
            return Err(invalid(format!("backend id `{bad}` cannot be used as a case subdirectory name")));
        }
        self.axes.validate()?;
        self.synthesizer()?;
        Ok(())
    }
}

fn list<V: Into<ParamValue>>(items: impl IntoIterator<Item = V>) -> ParamValue {
    ParamValue::List(items.into_iter().map(Into::into).collect())
}

/// Suites shipped with the harness.
pub fn builtin_suites() -> Vec<Suite> {
    let eltwise_axes = |operation: &str| {
        ParameterMatrix::new()
            .with_axis("n", [1])
            .with_axis("i_channel", [3])
            .with_axis("i_size", [list([26, 28]), list([56, 56]), list([76, 80])])
            .with_axis("operation", [operation])
    };

    vec![
        Suite::new(
            "caffe_slice",
            Frontend::Caffe,
            "slice",
            ParameterMatrix::new()
                .with_axis("n", [1, 3])
                .with_axis("i_channel", [3])
                .with_axis("i_size", [list([28, 28])])
                .with_axis("axis", [2, 3])
                .with_axis("slice_point", [list([10])]),
        )
        .with_backends(["cpu", "k210"]),
        Suite::new("caffe_eltwise", Frontend::Caffe, "eltwise", eltwise_axes("sum")),
        Suite::new("caffe_letterbox", Frontend::Caffe, "eltwise", eltwise_axes("prod")).with_overlay(LETTERBOX_OVERLAY),
        Suite::new(
            "onnx_random_normal",
            Frontend::Onnx,
            "random_normal",
            ParameterMatrix::new()
                .with_axis("dtype", ["float32"])
                .with_axis("mean", [ParamValue::None, ParamValue::Float(1.0)])
                .with_axis("scale", [ParamValue::None, ParamValue::Float(2.0)])
                .with_axis("seed", [ParamValue::None, ParamValue::Float(1.0)])
                .with_axis("shape", [list([1, 3, 16, 16])]),
        ),
    ]
}

pub fn builtin_suite(name: &str) -> Option<Suite> {
    builtin_suites().into_iter().find(|s| s.name == name)
}

/// Load one suite from a YAML file.
///
/// ```yaml
/// name: caffe_slice_wide
/// frontend: caffe
/// template: slice
/// backends: [cpu]
/// axes:
///   - name: n
///     values: [1]
///   - name: i_channel
///     values: [3]
///   - name: i_size
///     values: [[28, 56]]
///   - name: axis
///     values: [3]
///   - name: slice_point
///     values: [[20]]
/// ```
pub fn load_suite_file(path: &Path) -> Result<Suite, HarnessError> {
    let text = std::fs::read_to_string(path).map_err(|e| HarnessError::io(path, e))?;
    let suite: Suite = serde_yaml::from_str(&text).map_err(|e| MatrixError::InvalidSuite {
        suite: path.display().to_string(),
        message: e.to_string(),
    })?;
    suite.validate()?;
    Ok(suite)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::orchestrator::{INPUTS_DIR, REFERENCE_DIR};

    #[test]
    fn test_builtin_suites_are_valid() {
        let suites = builtin_suites();
        assert_eq!(suites.len(), 4);
        for suite in &suites {
            suite.validate().unwrap();
        }
        assert_eq!(builtin_suite("caffe_slice").unwrap().axes.cardinality(), 4);
        assert_eq!(builtin_suite("onnx_random_normal").unwrap().axes.cardinality(), 8);
        assert!(builtin_suite("caffe_conv").is_none());
    }

    #[test]
    fn test_eltwise_suites_differ_only_in_operation_and_overlay() {
        let operation = |name: &str| builtin_suite(name).unwrap().axes.axes().last().unwrap().values.clone();
        assert_eq!(operation("caffe_eltwise"), [ParamValue::from("sum")]);
        assert_eq!(operation("caffe_letterbox"), [ParamValue::from("prod")]);
        assert!(builtin_suite("caffe_eltwise").unwrap().overlay.is_none());
        assert!(builtin_suite("caffe_letterbox").unwrap().overlay.is_some());
    }

    #[test]
    fn test_unknown_template_is_a_matrix_error() {
        let suite = Suite::new("bad", Frontend::Onnx, "slice", ParameterMatrix::new());
        assert!(matches!(suite.validate(), Err(MatrixError::InvalidSuite { suite, .. }) if suite == "bad"));
    }

    #[test]
    fn test_unsafe_backend_id_is_rejected() {
        let suite = builtin_suite("caffe_eltwise").unwrap().with_backends(["../cpu"]);
        assert!(suite.validate().is_err());
    }

    #[test]
    fn test_backend_named_like_golden_dir_is_rejected() {
        for reserved in [REFERENCE_DIR, INPUTS_DIR] {
            let suite = builtin_suite("caffe_eltwise").unwrap().with_backends(["cpu", reserved]);
            let err = suite.validate().unwrap_err();
            assert!(err.to_string().contains(reserved), "{err}");
        }
    }

    #[test]
    fn test_load_suite_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("suite.yml");
        std::fs::write(
            &path,
            "name: wide\nfrontend: caffe\ntemplate: slice\nbackends: [cpu]\naxes:\n  - name: n\n    values: [1]\n  - name: slice_point\n    values: [[20], null]\n",
        )
        .unwrap();

        let suite = load_suite_file(&path).unwrap();
        assert_eq!(suite.backends, [BackendId::new("cpu")]);
        assert_eq!(suite.axes.axes()[1].values, [list([20]), ParamValue::None]);
    }

    #[test]
    fn test_suite_file_rejects_unknown_fields() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("suite.yml");
        std::fs::write(&path, "name: x\nfrontend: caffe\ntemplate: slice\nbackend: [cpu]\n").unwrap();
        assert!(matches!(load_suite_file(&path), Err(HarnessError::Matrix(_))));
    }
}
