//! Reference engines and execution backends

use crate::process::{path_var, run_command};
use crate::tensor_io::{load_tensors, write_tensors};
use async_trait::async_trait;
use nnparity_common::{BackendId, ExecutionError, Tensor};
use nnparity_config::CommandSpec;
use nnparity_synth::ModelDescriptor;
use std::collections::BTreeMap;
use std::path::Path;

/// The authoring framework's own inference engine, run on the original model.
#[async_trait]
pub trait ReferenceEngine: Send + Sync {
    fn name(&self) -> &str;

    /// Execute `model` on `inputs` (already preprocessed). Outputs follow the
    /// model's declared output order.
    async fn run(&self, model: &ModelDescriptor, inputs: &[Tensor], work_dir: &Path)
    -> Result<Vec<Tensor>, ExecutionError>;
}

/// A compilation target able to run compiled artifacts: an in-process
/// simulator, a host runtime or a physical accelerator.
#[async_trait]
pub trait Backend: Send + Sync {
    fn id(&self) -> &BackendId;

    async fn execute(&self, artifact: &Path, inputs: &[Tensor], work_dir: &Path)
    -> Result<Vec<Tensor>, ExecutionError>;
}

/// Exchange directories below `work_dir`, recreated for every run.
async fn prepare_exchange(work_dir: &Path, inputs: &[Tensor]) -> Result<(), ExecutionError> {
    let outputs_dir = work_dir.join("outputs");
    if outputs_dir.exists() {
        tokio::fs::remove_dir_all(&outputs_dir).await.map_err(ExecutionError::io)?;
    }
    tokio::fs::create_dir_all(&outputs_dir).await.map_err(ExecutionError::io)?;
    write_tensors(&work_dir.join("inputs"), "input", inputs).await.map_err(ExecutionError::io)?;
    Ok(())
}

/// Reference engine driven through an external program.
///
/// Placeholders: `{model}`, `{inputs}`, `{outputs}`, `{case_dir}`. The program
/// reads `<inputs>/manifest.json` and must write `<outputs>/manifest.json`.
#[derive(Debug, Clone)]
pub struct CommandReference {
    name: String,
    command: CommandSpec,
}

impl CommandReference {
    pub fn new(name: impl Into<String>, command: CommandSpec) -> Self {
        Self { name: name.into(), command }
    }
}

#[async_trait]
impl ReferenceEngine for CommandReference {
    fn name(&self) -> &str {
        &self.name
    }

    async fn run(
        &self,
        model: &ModelDescriptor,
        inputs: &[Tensor],
        work_dir: &Path,
    ) -> Result<Vec<Tensor>, ExecutionError> {
        prepare_exchange(work_dir, inputs).await?;
        let model_path = model.primary_file().ok_or_else(|| ExecutionError::engine("model has no files"))?;

        let mut vars = BTreeMap::new();
        vars.insert("model", path_var(model_path));
        vars.insert("inputs", path_var(&work_dir.join("inputs")));
        vars.insert("outputs", path_var(&work_dir.join("outputs")));
        vars.insert("case_dir", path_var(work_dir.parent().unwrap_or(work_dir)));

        let output = run_command(&self.command, &vars, work_dir)
            .await
            .map_err(|e| ExecutionError::unreachable(&self.name, e.to_string()))?;
        if !output.success {
            return Err(ExecutionError::Process {
                program: self.command.program.clone(),
                status: output.status,
                stderr: output.stderr,
            });
        }
        load_tensors(work_dir.join("outputs")).await
    }
}

/// Backend driven through an external runner program.
///
/// Placeholders: `{artifact}`, `{inputs}`, `{outputs}`, `{backend}`,
/// `{device}`, `{case_dir}`.
#[derive(Debug, Clone)]
pub struct CommandBackend {
    id: BackendId,
    command: CommandSpec,
    device: Option<String>,
}

impl CommandBackend {
    pub fn new(id: BackendId, command: CommandSpec, device: Option<String>) -> Self {
        Self { id, command, device }
    }
}

#[async_trait]
impl Backend for CommandBackend {
    fn id(&self) -> &BackendId {
        &self.id
    }

    async fn execute(&self, artifact: &Path, inputs: &[Tensor], work_dir: &Path) -> Result<Vec<Tensor>, ExecutionError> {
        prepare_exchange(work_dir, inputs).await?;

        let mut vars = BTreeMap::new();
        vars.insert("artifact", path_var(artifact));
        vars.insert("inputs", path_var(&work_dir.join("inputs")));
        vars.insert("outputs", path_var(&work_dir.join("outputs")));
        vars.insert("backend", self.id.to_string());
        vars.insert("device", self.device.clone().unwrap_or_default());
        vars.insert("case_dir", path_var(work_dir.parent().unwrap_or(work_dir)));

        let output = run_command(&self.command, &vars, work_dir)
            .await
            .map_err(|e| ExecutionError::unreachable(self.id.as_str(), e.to_string()))?;
        if !output.success {
            return Err(ExecutionError::Process {
                program: self.command.program.clone(),
                status: output.status,
                stderr: output.stderr,
            });
        }
        load_tensors(work_dir.join("outputs")).await
    }
}
