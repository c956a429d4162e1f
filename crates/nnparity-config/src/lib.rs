//! Configuration for nnparity runs.
//!
//! Two layers live here:
//! - the harness configuration (`nnparity.toml`): run root, worker-pool bound,
//!   external compiler/reference/backend commands and per-target settings;
//! - case option documents (YAML), merged override-wins over a base document
//!   and resolved into a typed [`ResolvedConfig`].

pub mod harness;
pub mod options;
pub mod resolved;

pub use harness::{
    CONFIG_ENV, CommandSpec, HarnessConfig, ReportFormat, SetupConfig, TargetConfig, load_case_options, load_config,
    load_config_from_env, load_config_from_file, save_config_to_file, validate_config,
};
pub use options::{CaseOptions, OptionBlock, OptionGroup, OptionName, apply_overlay};
pub use resolved::{CompileOptions, JudgeOptions, Layout, PreprocessOptions, ResolvedConfig, ToleranceRule};
