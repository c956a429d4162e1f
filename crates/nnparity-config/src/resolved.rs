//! Typed view of a merged case option document

use crate::options::{CaseOptions, OptionName, bool_value, f32_list, f32_value, str_value, usize_list};
use nnparity_common::{BackendId, DType, OverlayError, ToleranceSpec};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Memory layout of a 4-D image tensor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Layout {
    #[default]
    Nchw,
    Nhwc,
}

impl Layout {
    pub fn from_name(name: &str) -> Option<Self> {
        match name.to_ascii_uppercase().as_str() {
            "NCHW" => Some(Self::Nchw),
            "NHWC" => Some(Self::Nhwc),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Nchw => "NCHW",
            Self::Nhwc => "NHWC",
        }
    }
}

impl fmt::Display for Layout {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PreprocessOptions {
    pub enabled: bool,
    pub swap_rb: bool,
    /// Shape of the raw tensor fed to the backend. `None` means the model's
    /// declared input shape.
    pub input_shape: Option<Vec<usize>>,
    pub mean: Vec<f32>,
    pub std: Vec<f32>,
    pub input_range: (f32, f32),
    pub input_type: DType,
    pub input_layout: Layout,
    pub output_layout: Layout,
    pub letter_value: f32,
}

impl Default for PreprocessOptions {
    fn default() -> Self {
        Self {
            enabled: false,
            swap_rb: false,
            input_shape: None,
            mean: vec![0.0; 3],
            std: vec![1.0; 3],
            input_range: (0.0, 1.0),
            input_type: DType::Float32,
            input_layout: Layout::Nchw,
            output_layout: Layout::Nchw,
            letter_value: 0.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompileOptions {
    pub targets: Vec<BackendId>,
    pub dump_ir: bool,
    pub dump_asm: bool,
}

impl Default for CompileOptions {
    fn default() -> Self {
        Self { targets: vec![BackendId::new("cpu")], dump_ir: false, dump_asm: false }
    }
}

/// One `judge_opt.tolerance` entry. Rules without a target apply to every
/// backend that has no rule of its own.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ToleranceRule {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target: Option<BackendId>,
    pub abs_tol: f64,
    pub rel_tol: f64,
}

impl ToleranceRule {
    pub fn tolerance(&self) -> ToleranceSpec {
        ToleranceSpec::new(self.abs_tol, self.rel_tol)
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct JudgeOptions {
    pub rules: Vec<ToleranceRule>,
}

impl JudgeOptions {
    /// Target-specific rule, else the first generic rule, else the default.
    pub fn tolerance_for(&self, backend: &BackendId) -> ToleranceSpec {
        self.rules
            .iter()
            .find(|r| r.target.as_ref() == Some(backend))
            .or_else(|| self.rules.iter().find(|r| r.target.is_none()))
            .map(ToleranceRule::tolerance)
            .unwrap_or_default()
    }
}

/// Resolved configuration consumed by compilation, execution and comparison.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ResolvedConfig {
    pub preprocess: PreprocessOptions,
    pub compile: CompileOptions,
    pub judge: JudgeOptions,
}

impl ResolvedConfig {
    pub(crate) fn from_options(options: &CaseOptions) -> Result<Self, OverlayError> {
        let mut resolved = ResolvedConfig::default();
        let pre = &mut resolved.preprocess;

        for block in options.blocks() {
            let name = block.name().key();
            let first = block.first().ok_or_else(|| OverlayError::EmptyValues { name: name.to_string() })?;
            match block.name() {
                OptionName::Preprocess => pre.enabled = bool_value(name, first)?,
                OptionName::SwapRb => pre.swap_rb = bool_value(name, first)?,
                OptionName::InputShape => pre.input_shape = Some(usize_list(name, first)?),
                OptionName::Mean => pre.mean = f32_list(name, first)?,
                OptionName::Std => pre.std = f32_list(name, first)?,
                OptionName::InputRange => {
                    if let [lo, hi] = f32_list(name, first)?.as_slice() {
                        pre.input_range = (*lo, *hi);
                    }
                }
                OptionName::InputType => {
                    let s = str_value(name, first)?;
                    pre.input_type =
                        DType::from_name(&s).ok_or_else(|| OverlayError::invalid(name, format!("unknown type `{s}`")))?;
                }
                OptionName::InputLayout | OptionName::OutputLayout => {
                    let s = str_value(name, first)?;
                    let layout =
                        Layout::from_name(&s).ok_or_else(|| OverlayError::invalid(name, format!("unknown layout `{s}`")))?;
                    if block.name() == OptionName::InputLayout {
                        pre.input_layout = layout;
                    } else {
                        pre.output_layout = layout;
                    }
                }
                OptionName::LetterValue => pre.letter_value = f32_value(name, first)?,
                OptionName::Targets => {
                    let mut targets: Vec<BackendId> = Vec::with_capacity(block.values().len());
                    for value in block.values() {
                        let id = BackendId::new(str_value(name, value)?);
                        if !targets.contains(&id) {
                            targets.push(id);
                        }
                    }
                    resolved.compile.targets = targets;
                }
                OptionName::DumpIr => resolved.compile.dump_ir = bool_value(name, first)?,
                OptionName::DumpAsm => resolved.compile.dump_asm = bool_value(name, first)?,
                OptionName::Tolerance => {
                    resolved.judge.rules = block
                        .values()
                        .iter()
                        .map(|v| serde_yaml::from_value(v.clone()).map_err(|e| OverlayError::invalid(name, e.to_string())))
                        .collect::<Result<_, _>>()?;
                }
            }
        }

        let pre = &resolved.preprocess;
        if pre.mean.len() != pre.std.len() {
            return Err(OverlayError::invalid(
                "std",
                format!("mean has {} entries but std has {}", pre.mean.len(), pre.std.len()),
            ));
        }
        Ok(resolved)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rule(target: Option<&str>, abs_tol: f64) -> ToleranceRule {
        ToleranceRule { target: target.map(BackendId::from), abs_tol, rel_tol: 0.0 }
    }

    #[test]
    fn test_tolerance_prefers_target_rule() {
        let judge = JudgeOptions { rules: vec![rule(None, 0.1), rule(Some("k210"), 0.5)] };
        assert_eq!(judge.tolerance_for(&BackendId::new("k210")).abs_tol, 0.5);
        assert_eq!(judge.tolerance_for(&BackendId::new("cpu")).abs_tol, 0.1);
    }

    #[test]
    fn test_tolerance_falls_back_to_default() {
        let judge = JudgeOptions { rules: vec![rule(Some("k210"), 0.5)] };
        assert_eq!(judge.tolerance_for(&BackendId::new("cpu")), ToleranceSpec::default());
    }

    #[test]
    fn test_layout_names() {
        assert_eq!(Layout::from_name("nhwc"), Some(Layout::Nhwc));
        assert_eq!(Layout::from_name("HWC"), None);
        assert_eq!(Layout::Nchw.to_string(), "NCHW");
    }

    #[test]
    fn test_builtin_resolves_to_defaults() {
        let resolved = CaseOptions::builtin().resolve().unwrap();
        assert_eq!(resolved.preprocess, PreprocessOptions::default());
        assert_eq!(resolved.compile, CompileOptions::default());
        assert!(resolved.judge.rules.is_empty());
    }
}
