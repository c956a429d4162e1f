//! Compilation of a synthesised model for one backend

use crate::process::{path_var, run_command};
use async_trait::async_trait;
use nnparity_common::{BackendId, CompileError};
use nnparity_config::{CommandSpec, CompileOptions, PreprocessOptions, ResolvedConfig};
use nnparity_synth::ModelDescriptor;
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::debug;

/// File name of the compiled artifact inside `<case_dir>/<backend>/`.
pub const ARTIFACT_FILE: &str = "test.kmodel";

/// Options handed to the compiler as JSON next to the artifact.
pub const COMPILE_OPTIONS_FILE: &str = "compile_options.json";

/// Model compiler/importer.
///
/// Each call compiles for exactly one backend; a failure never affects other
/// backends of the same case.
#[async_trait]
pub trait Compiler: Send + Sync {
    async fn compile(
        &self,
        model: &ModelDescriptor,
        backend: &BackendId,
        config: &ResolvedConfig,
        out_dir: &Path,
    ) -> Result<PathBuf, CompileError>;
}

#[derive(Serialize)]
struct CompileRequest<'a> {
    backend: &'a BackendId,
    frontend: &'a str,
    model: Vec<String>,
    preprocess: &'a PreprocessOptions,
    compile: &'a CompileOptions,
}

/// Drives an external compiler program.
///
/// Placeholders: `{model}`, `{artifact}`, `{backend}`, `{options}`,
/// `{case_dir}`.
#[derive(Debug, Clone)]
pub struct CommandCompiler {
    command: CommandSpec,
}

impl CommandCompiler {
    pub fn new(command: CommandSpec) -> Self {
        Self { command }
    }
}

#[async_trait]
impl Compiler for CommandCompiler {
    async fn compile(
        &self,
        model: &ModelDescriptor,
        backend: &BackendId,
        config: &ResolvedConfig,
        out_dir: &Path,
    ) -> Result<PathBuf, CompileError> {
        tokio::fs::create_dir_all(out_dir).await.map_err(CompileError::io)?;

        let request = CompileRequest {
            backend,
            frontend: model.frontend().name(),
            model: model.files().iter().map(|f| path_var(f)).collect(),
            preprocess: &config.preprocess,
            compile: &config.compile,
        };
        let options_path = out_dir.join(COMPILE_OPTIONS_FILE);
        let json = serde_json::to_vec_pretty(&request).map_err(|e| CompileError::other(e.to_string()))?;
        tokio::fs::write(&options_path, json).await.map_err(CompileError::io)?;

        let artifact = out_dir.join(ARTIFACT_FILE);
        let model_path = model.primary_file().ok_or_else(|| CompileError::other("model has no files"))?;
        let case_dir = out_dir.parent().unwrap_or(out_dir);

        let mut vars = BTreeMap::new();
        vars.insert("model", path_var(model_path));
        vars.insert("artifact", path_var(&artifact));
        vars.insert("backend", backend.to_string());
        vars.insert("options", path_var(&options_path));
        vars.insert("case_dir", path_var(case_dir));

        let output = run_command(&self.command, &vars, out_dir).await.map_err(CompileError::io)?;
        if !output.success {
            return Err(CompileError::Failed { backend: backend.to_string(), status: output.status, stderr: output.stderr });
        }
        if !artifact.exists() {
            return Err(CompileError::MissingArtifact { backend: backend.to_string(), path: path_var(&artifact) });
        }

        debug!(%backend, artifact = %artifact.display(), "compiled");
        Ok(artifact)
    }
}

/// Stand-in when no `[compiler]` is configured: every attempt errors.
#[derive(Debug, Clone, Copy, Default)]
pub struct UnconfiguredCompiler;

#[async_trait]
impl Compiler for UnconfiguredCompiler {
    async fn compile(
        &self,
        _model: &ModelDescriptor,
        _backend: &BackendId,
        _config: &ResolvedConfig,
        _out_dir: &Path,
    ) -> Result<PathBuf, CompileError> {
        Err(CompileError::NotConfigured)
    }
}
