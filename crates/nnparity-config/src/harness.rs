//! Harness configuration (`nnparity.toml`)

use crate::options::CaseOptions;
use nnparity_common::{BackendId, ConfigError};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::debug;

/// Environment variable naming an explicit config file.
pub const CONFIG_ENV: &str = "NNPARITY_CONFIG";

/// Standard config locations, tried in order.
pub const CONFIG_PATHS: [&str; 2] = ["nnparity.toml", ".nnparity/config.toml"];

const MAX_PARALLEL_LIMIT: usize = 256;
const MAX_TIMEOUT_SECS: u64 = 3600;
const LOG_LEVELS: [&str; 6] = ["trace", "debug", "info", "warn", "error", "off"];

/// Top-level harness configuration.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct HarnessConfig {
    pub setup: SetupConfig,
    /// External compiler. Unset means every compile attempt errors.
    pub compiler: Option<CommandSpec>,
    /// Reference engine per authoring front-end (`caffe`, `onnx`).
    pub reference: BTreeMap<String, CommandSpec>,
    pub targets: BTreeMap<BackendId, TargetConfig>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SetupConfig {
    /// Per-case directories land in `<run_root>/<case_id>/`
    pub run_root: PathBuf,
    /// Worker-pool bound
    pub max_parallel: usize,
    pub log_level: String,
    /// Seed for deterministic input generation
    pub input_seed: u64,
    pub compile_timeout_secs: u64,
    pub reference_timeout_secs: u64,
    pub report_formats: Vec<ReportFormat>,
    /// Optional base case-option document (YAML)
    pub case_config: Option<PathBuf>,
}

impl Default for SetupConfig {
    fn default() -> Self {
        Self {
            run_root: PathBuf::from("tests_output"),
            max_parallel: num_cpus::get().clamp(1, MAX_PARALLEL_LIMIT),
            log_level: "info".to_string(),
            input_seed: 0,
            compile_timeout_secs: 300,
            reference_timeout_secs: 300,
            report_formats: vec![ReportFormat::Json, ReportFormat::Markdown],
            case_config: None,
        }
    }
}

impl SetupConfig {
    pub fn compile_timeout(&self) -> Duration {
        Duration::from_secs(self.compile_timeout_secs)
    }

    pub fn reference_timeout(&self) -> Duration {
        Duration::from_secs(self.reference_timeout_secs)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReportFormat {
    Json,
    Markdown,
}

impl ReportFormat {
    pub fn from_name(name: &str) -> Option<Self> {
        match name.trim().to_lowercase().as_str() {
            "json" => Some(Self::Json),
            "markdown" | "md" => Some(Self::Markdown),
            _ => None,
        }
    }
}

/// An external program and its argument template. Arguments may contain
/// `{model}`, `{artifact}`, `{backend}`, `{options}`, `{inputs}`, `{outputs}`,
/// `{device}` and `{case_dir}` placeholders.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandSpec {
    pub program: String,
    #[serde(default)]
    pub args: Vec<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub env: BTreeMap<String, String>,
}

impl CommandSpec {
    pub fn new(program: impl Into<String>, args: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self { program: program.into(), args: args.into_iter().map(Into::into).collect(), env: BTreeMap::new() }
    }

    /// Substitute `{key}` placeholders in every argument.
    pub fn render_args(&self, vars: &BTreeMap<&str, String>) -> Vec<String> {
        self.args
            .iter()
            .map(|arg| {
                vars.iter().fold(arg.clone(), |acc, (key, value)| acc.replace(&format!("{{{key}}}"), value))
            })
            .collect()
    }
}

/// Per-backend execution settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TargetConfig {
    /// Single physical accelerator: executions are serialised on `device`.
    pub exclusive: bool,
    pub device: Option<String>,
    pub timeout_secs: u64,
    pub program: Option<String>,
    pub args: Vec<String>,
}

impl Default for TargetConfig {
    fn default() -> Self {
        Self { exclusive: false, device: None, timeout_secs: 60, program: None, args: Vec::new() }
    }
}

impl TargetConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn command(&self) -> Option<CommandSpec> {
        self.program.as_ref().map(|program| CommandSpec {
            program: program.clone(),
            args: self.args.clone(),
            env: BTreeMap::new(),
        })
    }
}

/// Load configuration: `NNPARITY_CONFIG`, then the standard paths, then
/// defaults. Environment overrides apply in every case.
pub fn load_config() -> Result<HarnessConfig, ConfigError> {
    if let Ok(path) = std::env::var(CONFIG_ENV) {
        return load_config_from_file(Path::new(&path));
    }

    for path in CONFIG_PATHS {
        let path = Path::new(path);
        if path.exists() {
            return load_config_from_file(path);
        }
    }

    debug!("no config file found, using defaults");
    let mut config = HarnessConfig::default();
    load_config_from_env(&mut config)?;
    Ok(config)
}

/// Load configuration from a TOML file, then apply environment overrides.
pub fn load_config_from_file(path: &Path) -> Result<HarnessConfig, ConfigError> {
    let contents = std::fs::read_to_string(path)
        .map_err(|e| ConfigError::Read { path: path.display().to_string(), message: e.to_string() })?;

    let mut config: HarnessConfig = toml::from_str(&contents)
        .map_err(|e| ConfigError::Parse { path: path.display().to_string(), message: e.to_string() })?;

    // A relative case_config is relative to the config file.
    if let Some(case_config) = &config.setup.case_config
        && case_config.is_relative()
        && let Some(parent) = path.parent()
    {
        config.setup.case_config = Some(parent.join(case_config));
    }

    debug!(path = %path.display(), "loaded harness config");
    load_config_from_env(&mut config)?;
    Ok(config)
}

fn parse_env<T: std::str::FromStr>(var: &str, value: &str) -> Result<T, ConfigError>
where
    T::Err: std::fmt::Display,
{
    value.trim().parse().map_err(|e: T::Err| ConfigError::env(var, e.to_string()))
}

/// Apply `NNPARITY_*` environment overrides.
pub fn load_config_from_env(config: &mut HarnessConfig) -> Result<(), ConfigError> {
    if let Ok(val) = std::env::var("NNPARITY_RUN_ROOT") {
        config.setup.run_root = PathBuf::from(val);
    }

    if let Ok(val) = std::env::var("NNPARITY_MAX_PARALLEL") {
        config.setup.max_parallel = parse_env("NNPARITY_MAX_PARALLEL", &val)?;
    }

    if let Ok(val) = std::env::var("NNPARITY_LOG_LEVEL") {
        config.setup.log_level = val.trim().to_lowercase();
    }

    if let Ok(val) = std::env::var("NNPARITY_INPUT_SEED") {
        config.setup.input_seed = parse_env("NNPARITY_INPUT_SEED", &val)?;
    }

    if let Ok(val) = std::env::var("NNPARITY_REPORT_FORMATS") {
        config.setup.report_formats = val
            .split(',')
            .filter(|s| !s.trim().is_empty())
            .map(|s| {
                ReportFormat::from_name(s)
                    .ok_or_else(|| ConfigError::env("NNPARITY_REPORT_FORMATS", format!("unknown report format `{s}`")))
            })
            .collect::<Result<_, _>>()?;
    }

    Ok(())
}

/// Semantic checks that parsing alone cannot enforce.
pub fn validate_config(config: &HarnessConfig) -> Result<(), ConfigError> {
    let setup = &config.setup;

    if setup.max_parallel == 0 {
        return Err(ConfigError::invalid("max_parallel must be greater than 0"));
    }
    if setup.max_parallel > MAX_PARALLEL_LIMIT {
        return Err(ConfigError::invalid(format!("max_parallel should not exceed {MAX_PARALLEL_LIMIT}")));
    }

    if !LOG_LEVELS.contains(&setup.log_level.as_str()) {
        return Err(ConfigError::invalid(format!("invalid log level `{}`", setup.log_level)));
    }

    check_timeout("compile_timeout_secs", setup.compile_timeout_secs)?;
    check_timeout("reference_timeout_secs", setup.reference_timeout_secs)?;

    for (id, target) in &config.targets {
        if !id.is_path_safe() {
            return Err(ConfigError::invalid(format!(
                "target id `{id}` is not filesystem-safe or names a case artifact directory"
            )));
        }
        check_timeout(&format!("targets.{id}.timeout_secs"), target.timeout_secs)?;
        if target.exclusive && target.device.as_deref().is_none_or(|d| d.trim().is_empty()) {
            return Err(ConfigError::invalid(format!("exclusive target `{id}` must name a device")));
        }
    }

    for (frontend, command) in &config.reference {
        if command.program.trim().is_empty() {
            return Err(ConfigError::invalid(format!("reference.{frontend}.program must not be empty")));
        }
    }

    Ok(())
}

fn check_timeout(name: &str, secs: u64) -> Result<(), ConfigError> {
    if secs == 0 {
        return Err(ConfigError::invalid(format!("{name} must be greater than 0")));
    }
    if secs > MAX_TIMEOUT_SECS {
        return Err(ConfigError::invalid(format!("{name} should not exceed 1 hour")));
    }
    Ok(())
}

/// Base case options: the built-in defaults, overlaid with
/// `setup.case_config` when one is configured.
pub fn load_case_options(setup: &SetupConfig) -> Result<CaseOptions, ConfigError> {
    let builtin = CaseOptions::builtin();
    let Some(path) = &setup.case_config else {
        return Ok(builtin);
    };

    let text = std::fs::read_to_string(path)
        .map_err(|e| ConfigError::Read { path: path.display().to_string(), message: e.to_string() })?;
    let document = CaseOptions::parse(&text)?;
    Ok(builtin.merge(&document))
}

/// Save configuration as pretty TOML.
pub fn save_config_to_file(config: &HarnessConfig, path: &Path) -> Result<(), ConfigError> {
    let text = toml::to_string_pretty(config).map_err(|e| ConfigError::invalid(format!("failed to serialize config: {e}")))?;
    std::fs::write(path, text)
        .map_err(|e| ConfigError::invalid(format!("failed to write config file {}: {e}", path.display())))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = HarnessConfig::default();
        validate_config(&config).unwrap();
        assert_eq!(config.setup.run_root, PathBuf::from("tests_output"));
        assert!(config.compiler.is_none());
    }

    #[test]
    fn test_validate_rejects_zero_parallel() {
        let mut config = HarnessConfig::default();
        config.setup.max_parallel = 0;
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn test_validate_rejects_unknown_log_level() {
        let mut config = HarnessConfig::default();
        config.setup.log_level = "chatty".into();
        assert!(validate_config(&config).unwrap_err().to_string().contains("chatty"));
    }

    #[test]
    fn test_exclusive_target_needs_device() {
        let mut config = HarnessConfig::default();
        config.targets.insert(BackendId::new("k210"), TargetConfig { exclusive: true, ..Default::default() });
        assert!(validate_config(&config).is_err());

        config.targets.insert(
            BackendId::new("k210"),
            TargetConfig { exclusive: true, device: Some("/dev/ttyUSB0".into()), ..Default::default() },
        );
        validate_config(&config).unwrap();
    }

    #[test]
    fn test_target_named_like_a_case_dir_is_rejected() {
        let mut config = HarnessConfig::default();
        config.targets.insert(BackendId::new("inputs"), TargetConfig::default());
        assert!(validate_config(&config).unwrap_err().to_string().contains("inputs"));
    }

    #[test]
    fn test_render_args_substitutes_every_placeholder() {
        let spec = CommandSpec::new("ncc", ["compile", "{model}", "{artifact}", "--target={backend}"]);
        let vars = BTreeMap::from([("model", "m.onnx".to_string()), ("artifact", "out.kmodel".to_string()), ("backend", "cpu".to_string())]);
        assert_eq!(spec.render_args(&vars), ["compile", "m.onnx", "out.kmodel", "--target=cpu"]);
    }

    #[test]
    fn test_parse_full_toml() {
        let text = r#"
            [setup]
            run_root = "out"
            max_parallel = 2
            report_formats = ["json"]

            [compiler]
            program = "ncc"
            args = ["compile", "{model}"]

            [reference.caffe]
            program = "python3"

            [targets.k210]
            exclusive = true
            device = "/dev/ttyUSB0"
            timeout_secs = 120
        "#;
        let config: HarnessConfig = toml::from_str(text).unwrap();
        assert_eq!(config.setup.max_parallel, 2);
        assert_eq!(config.setup.log_level, "info");
        assert_eq!(config.compiler.unwrap().args, ["compile", "{model}"]);
        assert_eq!(config.reference["caffe"].program, "python3");
        let k210 = &config.targets[&BackendId::new("k210")];
        assert!(k210.exclusive);
        assert_eq!(k210.timeout(), Duration::from_secs(120));
        assert!(k210.command().is_none());
    }
}
