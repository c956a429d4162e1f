//! Case option documents and the override-wins overlay merge
//!
//! A document groups named option blocks, each holding a list of candidate
//! values:
//!
//! ```yaml
//! case:
//!   preprocess_opt:
//!     - name: preprocess
//!       values: [true]
//!   compile_opt:
//!     - name: targets
//!       values: [cpu, k210]
//! ```
//!
//! Documents are parsed and type-checked before any merge; unknown groups or
//! option names are rejected.

use crate::resolved::{ResolvedConfig, ToleranceRule};
use nnparity_common::{DType, OverlayError};
use serde::{Deserialize, Serialize};
use serde_yaml::Value;
use std::collections::BTreeMap;
use std::fmt;

/// Top-level option groups of a case document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum OptionGroup {
    Preprocess,
    Compile,
    Judge,
}

impl OptionGroup {
    pub const ALL: [OptionGroup; 3] = [Self::Preprocess, Self::Compile, Self::Judge];

    pub fn key(&self) -> &'static str {
        match self {
            Self::Preprocess => "preprocess_opt",
            Self::Compile => "compile_opt",
            Self::Judge => "judge_opt",
        }
    }

    pub fn from_key(key: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|g| g.key() == key)
    }
}

/// Every option the harness understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum OptionName {
    Preprocess,
    SwapRb,
    InputShape,
    Mean,
    Std,
    InputRange,
    InputType,
    InputLayout,
    OutputLayout,
    LetterValue,
    Targets,
    DumpIr,
    DumpAsm,
    Tolerance,
}

impl OptionName {
    pub const ALL: [OptionName; 14] = [
        Self::Preprocess,
        Self::SwapRb,
        Self::InputShape,
        Self::Mean,
        Self::Std,
        Self::InputRange,
        Self::InputType,
        Self::InputLayout,
        Self::OutputLayout,
        Self::LetterValue,
        Self::Targets,
        Self::DumpIr,
        Self::DumpAsm,
        Self::Tolerance,
    ];

    pub fn key(&self) -> &'static str {
        match self {
            Self::Preprocess => "preprocess",
            Self::SwapRb => "swapRB",
            Self::InputShape => "input_shape",
            Self::Mean => "mean",
            Self::Std => "std",
            Self::InputRange => "input_range",
            Self::InputType => "input_type",
            Self::InputLayout => "input_layout",
            Self::OutputLayout => "output_layout",
            Self::LetterValue => "letter_value",
            Self::Targets => "targets",
            Self::DumpIr => "dump_ir",
            Self::DumpAsm => "dump_asm",
            Self::Tolerance => "tolerance",
        }
    }

    pub fn group(&self) -> OptionGroup {
        match self {
            Self::Targets | Self::DumpIr | Self::DumpAsm => OptionGroup::Compile,
            Self::Tolerance => OptionGroup::Judge,
            _ => OptionGroup::Preprocess,
        }
    }

    pub fn lookup(group: OptionGroup, key: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|n| n.group() == group && n.key() == key)
    }

    /// Options whose whole value list is meaningful. All others take effect
    /// through their first value.
    pub fn is_list_valued(&self) -> bool {
        matches!(self, Self::Targets | Self::Tolerance)
    }

    /// Type-check one candidate value.
    fn check_value(&self, value: &Value) -> Result<(), OverlayError> {
        let name = self.key();
        match self {
            Self::Preprocess | Self::SwapRb | Self::DumpIr | Self::DumpAsm => bool_value(name, value).map(drop),
            Self::InputShape => usize_list(name, value).map(drop),
            Self::Mean => f32_list(name, value).map(drop),
            Self::LetterValue => f32_value(name, value).map(drop),
            Self::Std => {
                let std = f32_list(name, value)?;
                if std.iter().any(|s| *s == 0.0) {
                    return Err(OverlayError::invalid(name, "std entries must be non-zero"));
                }
                Ok(())
            }
            Self::InputRange => {
                let range = f32_list(name, value)?;
                match range.as_slice() {
                    [lo, hi] if lo < hi => Ok(()),
                    _ => Err(OverlayError::invalid(name, "expected [lo, hi] with lo < hi")),
                }
            }
            Self::InputType => {
                let s = str_value(name, value)?;
                DType::from_name(&s).map(drop).ok_or_else(|| OverlayError::invalid(name, format!("unknown type `{s}`")))
            }
            Self::InputLayout | Self::OutputLayout => {
                let s = str_value(name, value)?;
                crate::resolved::Layout::from_name(&s)
                    .map(drop)
                    .ok_or_else(|| OverlayError::invalid(name, format!("unknown layout `{s}`")))
            }
            Self::Targets => {
                let s = str_value(name, value)?;
                if nnparity_common::BackendId::new(s.as_str()).is_path_safe() {
                    Ok(())
                } else {
                    Err(OverlayError::invalid(name, format!("`{s}` is not a valid backend id")))
                }
            }
            Self::Tolerance => {
                let rule: ToleranceRule = serde_yaml::from_value(value.clone())
                    .map_err(|e| OverlayError::invalid(name, e.to_string()))?;
                if rule.tolerance().is_valid() {
                    Ok(())
                } else {
                    Err(OverlayError::invalid(name, "tolerances must be finite and non-negative"))
                }
            }
        }
    }
}

impl fmt::Display for OptionName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

/// One named option and its candidate values. Never empty.
#[derive(Debug, Clone, PartialEq)]
pub struct OptionBlock {
    name: OptionName,
    values: Vec<Value>,
}

impl OptionBlock {
    /// Build a block, validating every value.
    pub fn new(name: OptionName, values: Vec<Value>) -> Result<Self, OverlayError> {
        if values.is_empty() {
            return Err(OverlayError::EmptyValues { name: name.key().to_string() });
        }
        for value in &values {
            name.check_value(value)?;
        }
        Ok(Self { name, values })
    }

    pub fn name(&self) -> OptionName {
        self.name
    }

    pub fn values(&self) -> &[Value] {
        &self.values
    }

    /// The value a resolved configuration takes.
    pub fn first(&self) -> Option<&Value> {
        self.values.first()
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawDocument {
    case: BTreeMap<String, Vec<RawBlock>>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawBlock {
    name: String,
    values: Vec<Value>,
}

/// A validated case option document.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct CaseOptions {
    blocks: Vec<OptionBlock>,
}

impl CaseOptions {
    /// An empty document; merging it changes nothing.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Built-in base document declaring every option with its default.
    pub fn builtin() -> Self {
        use OptionName::*;
        let seq = |items: Vec<Value>| Value::Sequence(items);
        let defaults = [
            (Preprocess, vec![Value::from(false)]),
            (SwapRb, vec![Value::from(false)]),
            (Mean, vec![seq(vec![Value::from(0.0), Value::from(0.0), Value::from(0.0)])]),
            (Std, vec![seq(vec![Value::from(1.0), Value::from(1.0), Value::from(1.0)])]),
            (InputRange, vec![seq(vec![Value::from(0.0), Value::from(1.0)])]),
            (InputType, vec![Value::from("float32")]),
            (InputLayout, vec![Value::from("NCHW")]),
            (OutputLayout, vec![Value::from("NCHW")]),
            (LetterValue, vec![Value::from(0.0)]),
            (Targets, vec![Value::from("cpu")]),
            (DumpIr, vec![Value::from(false)]),
            (DumpAsm, vec![Value::from(false)]),
        ];
        let blocks = defaults.into_iter().map(|(name, values)| OptionBlock { name, values }).collect();
        Self { blocks }
    }

    /// Parse and validate a YAML option document.
    pub fn parse(text: &str) -> Result<Self, OverlayError> {
        if text.trim().is_empty() {
            return Ok(Self::empty());
        }

        let raw: RawDocument = serde_yaml::from_str(text).map_err(|e| OverlayError::parse(e.to_string()))?;

        let mut options = Self::empty();
        for (group_key, raw_blocks) in raw.case {
            let group = OptionGroup::from_key(&group_key)
                .ok_or_else(|| OverlayError::UnknownGroup { group: group_key.clone() })?;
            for raw_block in raw_blocks {
                let name = OptionName::lookup(group, &raw_block.name).ok_or_else(|| {
                    OverlayError::UnknownOption { group: group_key.clone(), name: raw_block.name.clone() }
                })?;
                if options.get(name).is_some() {
                    return Err(OverlayError::DuplicateOption { group: group_key.clone(), name: raw_block.name });
                }
                options.blocks.push(OptionBlock::new(name, raw_block.values)?);
            }
        }
        Ok(options)
    }

    pub fn get(&self, name: OptionName) -> Option<&OptionBlock> {
        self.blocks.iter().find(|b| b.name == name)
    }

    pub fn blocks(&self) -> &[OptionBlock] {
        &self.blocks
    }

    /// Replace (or declare) one option's value list.
    pub fn set(&mut self, block: OptionBlock) {
        match self.blocks.iter_mut().find(|b| b.name == block.name) {
            Some(existing) => *existing = block,
            None => self.blocks.push(block),
        }
    }

    /// Override-wins merge: every option present in `overlay` replaces this
    /// document's value list wholesale; absent options are inherited.
    pub fn merge(&self, overlay: &CaseOptions) -> CaseOptions {
        let mut merged = self.clone();
        for block in &overlay.blocks {
            merged.set(block.clone());
        }
        merged
    }

    /// Resolve the typed configuration consumed by compilation, execution and
    /// comparison.
    pub fn resolve(&self) -> Result<ResolvedConfig, OverlayError> {
        ResolvedConfig::from_options(self)
    }

    /// Serialise back into the document format.
    pub fn to_yaml(&self) -> Result<String, OverlayError> {
        let mut case: BTreeMap<&'static str, Vec<RawBlock>> = BTreeMap::new();
        for block in &self.blocks {
            case.entry(block.name.group().key())
                .or_default()
                .push(RawBlock { name: block.name.key().to_string(), values: block.values.clone() });
        }
        let mut doc = BTreeMap::new();
        doc.insert("case", case);
        serde_yaml::to_string(&doc).map_err(|e| OverlayError::parse(e.to_string()))
    }
}

/// Parse `overlay_text` and merge it over `base`, then resolve.
pub fn apply_overlay(base: &CaseOptions, overlay_text: &str) -> Result<ResolvedConfig, OverlayError> {
    let overlay = CaseOptions::parse(overlay_text)?;
    base.merge(&overlay).resolve()
}

// ---------------------------------------------------------------------------
// Value accessors shared with resolution
// ---------------------------------------------------------------------------

pub(crate) fn bool_value(name: &str, value: &Value) -> Result<bool, OverlayError> {
    value.as_bool().ok_or_else(|| OverlayError::invalid(name, format!("expected a boolean, got {value:?}")))
}

pub(crate) fn f32_value(name: &str, value: &Value) -> Result<f32, OverlayError> {
    value
        .as_f64()
        .map(|f| f as f32)
        .ok_or_else(|| OverlayError::invalid(name, format!("expected a number, got {value:?}")))
}

pub(crate) fn str_value(name: &str, value: &Value) -> Result<String, OverlayError> {
    value
        .as_str()
        .map(str::to_string)
        .ok_or_else(|| OverlayError::invalid(name, format!("expected a string, got {value:?}")))
}

pub(crate) fn f32_list(name: &str, value: &Value) -> Result<Vec<f32>, OverlayError> {
    value
        .as_sequence()
        .ok_or_else(|| OverlayError::invalid(name, format!("expected a list, got {value:?}")))?
        .iter()
        .map(|v| f32_value(name, v))
        .collect()
}

pub(crate) fn usize_list(name: &str, value: &Value) -> Result<Vec<usize>, OverlayError> {
    value
        .as_sequence()
        .ok_or_else(|| OverlayError::invalid(name, format!("expected a list, got {value:?}")))?
        .iter()
        .map(|v| {
            v.as_u64()
                .and_then(|u| usize::try_from(u).ok())
                .ok_or_else(|| OverlayError::invalid(name, format!("expected a non-negative integer, got {v:?}")))
        })
        .collect()
}
