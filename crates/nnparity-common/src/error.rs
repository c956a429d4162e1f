//! Error taxonomy of a harness run
//!
//! Stage errors (`OverlayError`, `SynthesisError`, `CompileError`,
//! `ExecutionError`) are caught at the orchestration boundary and recorded in
//! a verdict. Only [`HarnessError`] ends a run.

use std::path::Path;
use std::time::Duration;
use thiserror::Error;

/// Invalid parameter-matrix or suite declaration. Fatal for the whole run.
#[derive(Debug, Clone, Error)]
pub enum MatrixError {
    #[error("matrix axis name must not be empty")]
    EmptyAxisName,

    #[error("duplicate matrix axis: {name}")]
    DuplicateAxis { name: String },

    #[error("invalid suite {suite}: {message}")]
    InvalidSuite { suite: String, message: String },
}

/// Problems with a case option document or its merge into the base.
#[derive(Debug, Clone, Error)]
pub enum OverlayError {
    #[error("failed to parse option document: {message}")]
    Parse { message: String },

    #[error("unknown option group `{group}`")]
    UnknownGroup { group: String },

    #[error("unknown option `{name}` in `{group}`")]
    UnknownOption { group: String, name: String },

    #[error("option `{name}` is declared more than once in `{group}`")]
    DuplicateOption { group: String, name: String },

    #[error("option `{name}` has an empty value list")]
    EmptyValues { name: String },

    #[error("invalid value for `{name}`: {message}")]
    InvalidValue { name: String, message: String },
}

/// Invalid harness configuration (file, environment or semantic checks).
#[derive(Debug, Clone, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {message}")]
    Read { path: String, message: String },

    #[error("failed to parse config file {path}: {message}")]
    Parse { path: String, message: String },

    #[error("invalid {var}: {message}")]
    Env { var: String, message: String },

    #[error("invalid configuration: {message}")]
    Invalid { message: String },

    #[error("base case options: {0}")]
    CaseOptions(#[from] OverlayError),
}

/// Model synthesis failed. The whole case is aborted.
#[derive(Debug, Clone, Error)]
pub enum SynthesisError {
    #[error("missing parameter `{name}`")]
    MissingParameter { name: String },

    #[error("invalid parameter `{name}`: {message}")]
    InvalidParameter { name: String, message: String },

    #[error("graph rejected: {message}")]
    GraphRejected { message: String },

    #[error("failed to write {path}: {message}")]
    Io { path: String, message: String },
}

/// Compilation for one backend failed. Siblings are unaffected.
#[derive(Debug, Clone, Error)]
pub enum CompileError {
    #[error("no compiler configured")]
    NotConfigured,

    #[error("compiler for {backend} exited with {status:?}: {stderr}")]
    Failed { backend: String, status: Option<i32>, stderr: String },

    #[error("compiler for {backend} timed out after {timeout:?}")]
    Timeout { backend: String, timeout: Duration },

    #[error("compiler for {backend} did not produce an artifact at {path}")]
    MissingArtifact { backend: String, path: String },

    #[error("compiler I/O error: {message}")]
    Io { message: String },

    #[error("compile error: {message}")]
    Other { message: String },
}

/// Reference or backend execution failed.
#[derive(Debug, Clone, Error)]
pub enum ExecutionError {
    #[error("{target} timed out after {timeout:?}")]
    Timeout { target: String, timeout: Duration },

    #[error("{target} is unreachable: {message}")]
    Unreachable { target: String, message: String },

    #[error("{program} exited with {status:?}: {stderr}")]
    Process { program: String, status: Option<i32>, stderr: String },

    #[error("failed to decode outputs: {message}")]
    OutputDecode { message: String },

    #[error("execution I/O error: {message}")]
    Io { message: String },

    #[error("engine error: {message}")]
    Engine { message: String },
}

/// Misconfiguration of the harness itself. Ends the run.
#[derive(Debug, Clone, Error)]
pub enum HarnessError {
    #[error("matrix declaration error: {0}")]
    Matrix(#[from] MatrixError),

    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("I/O error at {path}: {message}")]
    Io { path: String, message: String },

    #[error("runtime error: {message}")]
    Runtime { message: String },
}

impl OverlayError {
    pub fn parse<S: Into<String>>(message: S) -> Self {
        Self::Parse { message: message.into() }
    }

    pub fn invalid<S1: Into<String>, S2: Into<String>>(name: S1, message: S2) -> Self {
        Self::InvalidValue { name: name.into(), message: message.into() }
    }
}

impl ConfigError {
    pub fn invalid<S: Into<String>>(message: S) -> Self {
        Self::Invalid { message: message.into() }
    }

    pub fn env<S1: Into<String>, S2: Into<String>>(var: S1, message: S2) -> Self {
        Self::Env { var: var.into(), message: message.into() }
    }
}

impl SynthesisError {
    pub fn missing<S: Into<String>>(name: S) -> Self {
        Self::MissingParameter { name: name.into() }
    }

    pub fn invalid<S1: Into<String>, S2: Into<String>>(name: S1, message: S2) -> Self {
        Self::InvalidParameter { name: name.into(), message: message.into() }
    }

    pub fn io(path: &Path, err: std::io::Error) -> Self {
        Self::Io { path: path.display().to_string(), message: err.to_string() }
    }
}

impl CompileError {
    pub fn io(err: std::io::Error) -> Self {
        Self::Io { message: err.to_string() }
    }

    pub fn other<S: Into<String>>(message: S) -> Self {
        Self::Other { message: message.into() }
    }
}

impl ExecutionError {
    pub fn timeout<S: Into<String>>(target: S, timeout: Duration) -> Self {
        Self::Timeout { target: target.into(), timeout }
    }

    pub fn unreachable<S1: Into<String>, S2: Into<String>>(target: S1, message: S2) -> Self {
        Self::Unreachable { target: target.into(), message: message.into() }
    }

    pub fn decode<S: Into<String>>(message: S) -> Self {
        Self::OutputDecode { message: message.into() }
    }

    pub fn io(err: std::io::Error) -> Self {
        Self::Io { message: err.to_string() }
    }

    pub fn engine<S: Into<String>>(message: S) -> Self {
        Self::Engine { message: message.into() }
    }

    /// Timeouts and unreachable devices are infrastructure hiccups rather than
    /// defects in the compiled artifact.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Self::Timeout { .. } | Self::Unreachable { .. })
    }

    pub fn category(&self) -> &'static str {
        match self {
            Self::Timeout { .. } => "timeout",
            Self::Unreachable { .. } => "unreachable",
            Self::Process { .. } => "process",
            Self::OutputDecode { .. } => "decode",
            Self::Io { .. } => "io",
            Self::Engine { .. } => "engine",
        }
    }
}

impl HarnessError {
    pub fn io(path: &Path, err: std::io::Error) -> Self {
        Self::Io { path: path.display().to_string(), message: err.to_string() }
    }

    pub fn runtime<S: Into<String>>(message: S) -> Self {
        Self::Runtime { message: message.into() }
    }

    pub fn category(&self) -> &'static str {
        match self {
            Self::Matrix(_) => "matrix",
            Self::Config(_) => "config",
            Self::Io { .. } => "io",
            Self::Runtime { .. } => "runtime",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_execution_error_categories() {
        let timeout = ExecutionError::timeout("k210", Duration::from_secs(3));
        assert_eq!(timeout.category(), "timeout");
        assert!(timeout.is_recoverable());
        assert!(timeout.to_string().contains("k210 timed out after 3s"));

        let decode = ExecutionError::decode("bad manifest");
        assert_eq!(decode.category(), "decode");
        assert!(!decode.is_recoverable());
    }

    #[test]
    fn test_harness_error_wraps_matrix_error() {
        let err: HarnessError = MatrixError::DuplicateAxis { name: "axis".into() }.into();
        assert_eq!(err.category(), "matrix");
        assert!(err.to_string().contains("duplicate matrix axis: axis"));
    }

    #[test]
    fn test_overlay_unknown_option_message() {
        let err = OverlayError::UnknownOption { group: "preprocess_opt".into(), name: "swapBR".into() };
        assert_eq!(err.to_string(), "unknown option `swapBR` in `preprocess_opt`");
    }
}
