//! Per-case pipeline
//!
//! ```text
//! overlay -> synthesis -> inputs -> { compile(b) for each b } || reference
//!         -> { execute(b) -> compare(b) for each compiled b }
//! ```
//!
//! Compilation for every backend runs concurrently with the reference
//! execution. The golden result is computed once and shared by every
//! backend's comparison. Stage errors become Errored verdicts; nothing here
//! ends the run.

use crate::case::TestCase;
use crate::inputs::{case_seed, generate_inputs};
use crate::preprocess::{preprocess_inputs, to_output_layout};
use crate::registry::EngineRegistry;
use crate::report::{Outcome, Stage, Verdict};
use crate::tensor_io::write_tensors;
use futures::future::join_all;
use nnparity_common::{
    BackendId, CompileError, ExecutionError, ExecutionResult, RESERVED_CASE_DIRS, Tensor, ToleranceSpec,
};
use nnparity_compare::compare_results;
use nnparity_config::{CaseOptions, CompileOptions, ResolvedConfig};
use nnparity_synth::{ModelDescriptor, SynthesisContext};
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::time::timeout;
use tracing::{Instrument, debug, info, info_span, warn};

/// Name of the golden-output directory inside a case directory.
pub const REFERENCE_DIR: &str = RESERVED_CASE_DIRS[0];
/// Name of the generated-input directory inside a case directory.
pub const INPUTS_DIR: &str = RESERVED_CASE_DIRS[1];

/// Read-only state shared by every case of a run.
pub struct RunContext {
    pub registry: EngineRegistry,
    pub base_options: CaseOptions,
    pub run_root: PathBuf,
    pub input_seed: u64,
}

impl RunContext {
    pub fn case_dir(&self, case: &TestCase) -> PathBuf {
        self.run_root.join(&case.case_id)
    }

    /// Backends to blame when a case fails before its overlay resolves.
    pub(crate) fn fallback_targets(&self, case: &TestCase) -> Vec<BackendId> {
        if !case.overlay.backends.is_empty() {
            return case.overlay.backends.clone();
        }
        self.base_options
            .resolve()
            .map(|r| r.compile.targets)
            .unwrap_or_else(|_| CompileOptions::default().targets)
    }
}

/// Run one case end to end. Returns one verdict per requested backend, in
/// target order.
pub async fn run_case(case: &TestCase, ctx: &RunContext) -> Vec<Verdict> {
    let span = info_span!("case", case_id = %case.case_id);
    CaseRun { case, ctx }.run().instrument(span).await
}

struct CaseRun<'a> {
    case: &'a TestCase,
    ctx: &'a RunContext,
}

impl CaseRun<'_> {
    async fn run(self) -> Vec<Verdict> {
        let resolved = match self.case.overlay.apply(&self.ctx.base_options).and_then(|o| o.resolve()) {
            Ok(resolved) => resolved,
            Err(e) => return self.errored_all(&self.ctx.fallback_targets(self.case), Stage::Overlay, e),
        };
        let targets = resolved.compile.targets.clone();
        debug!(targets = ?targets, "overlay resolved");

        let case_dir = self.ctx.case_dir(self.case);
        if let Err(e) = reset_dir(&case_dir).await {
            return self.errored_all(&targets, Stage::Synthesis, format!("cannot prepare {}: {e}", case_dir.display()));
        }

        let model = match self.synthesize(case_dir.clone()).await {
            Ok(model) => model,
            Err(e) => return self.errored_all(&targets, Stage::Synthesis, e),
        };
        debug!(files = model.files().len(), "synthesised");

        let (raw_inputs, reference_inputs) = match self.prepare_inputs(&model, &resolved, &case_dir).await {
            Ok(inputs) => inputs,
            Err(e) => return self.errored_all(&targets, Stage::Inputs, e),
        };

        let compile_all = join_all(targets.iter().map(|b| self.compile(&model, b, &resolved, &case_dir)));
        let reference = self.reference(&model, &reference_inputs, &case_dir);
        let (compiled, golden) = tokio::join!(compile_all, reference);

        let golden = match golden {
            Ok(outputs) => {
                let outputs = to_output_layout(outputs, &resolved.preprocess);
                if let Err(e) = write_tensors(&case_dir.join(REFERENCE_DIR), "output", &outputs).await {
                    warn!(error = %e, "failed to dump golden outputs");
                }
                Ok(Arc::new(ExecutionResult::reference(outputs)))
            }
            Err(e) => Err(e),
        };

        let mut pending = Vec::new();
        let mut verdicts: Vec<Option<Verdict>> = Vec::with_capacity(targets.len());
        for (i, (backend, artifact)) in targets.iter().zip(compiled).enumerate() {
            match (artifact, &golden) {
                (Err(e), _) => verdicts.push(Some(self.errored(backend, Stage::Compile, e))),
                (Ok(_), Err(e)) => verdicts.push(Some(self.errored(backend, Stage::Reference, e))),
                (Ok(artifact), Ok(golden)) => {
                    verdicts.push(None);
                    let tolerance = resolved.judge.tolerance_for(backend);
                    let execution = self.execute(backend, artifact, &raw_inputs, &case_dir, Arc::clone(golden), tolerance);
                    pending.push(async move { (i, execution.await) });
                }
            }
        }

        for (i, verdict) in join_all(pending).await {
            verdicts[i] = Some(verdict);
        }
        verdicts.into_iter().flatten().collect()
    }

    async fn synthesize(&self, case_dir: PathBuf) -> Result<ModelDescriptor, String> {
        let synthesizer = Arc::clone(&self.case.synthesizer);
        let params = self.case.params.clone();
        let ctx = SynthesisContext::new(self.case.case_id.clone(), case_dir);

        match tokio::task::spawn_blocking(move || synthesizer.build(ctx, &params)).await {
            Ok(Ok(model)) => Ok(model),
            Ok(Err(e)) => Err(e.to_string()),
            Err(e) => Err(format!("synthesis task failed: {e}")),
        }
    }

    /// Raw backend inputs (persisted) and their reference-side equivalent.
    async fn prepare_inputs(
        &self,
        model: &ModelDescriptor,
        resolved: &ResolvedConfig,
        case_dir: &Path,
    ) -> Result<(Vec<Tensor>, Vec<Tensor>), String> {
        let seed = case_seed(self.ctx.input_seed, &self.case.case_id);
        let raw = generate_inputs(model.inputs(), &resolved.preprocess, seed).map_err(|e| e.to_string())?;
        write_tensors(&case_dir.join(INPUTS_DIR), "input", &raw)
            .await
            .map_err(|e| format!("cannot persist inputs: {e}"))?;
        let reference = preprocess_inputs(&raw, model.inputs(), &resolved.preprocess).map_err(|e| e.to_string())?;
        debug!(inputs = raw.len(), seed, "inputs generated");
        Ok((raw, reference))
    }

    async fn compile(
        &self,
        model: &ModelDescriptor,
        backend: &BackendId,
        resolved: &ResolvedConfig,
        case_dir: &Path,
    ) -> Result<PathBuf, CompileError> {
        let registry = &self.ctx.registry;
        let out_dir = case_dir.join(backend.as_str());
        let limit = registry.compile_timeout();

        let result = match timeout(limit, registry.compiler().compile(model, backend, resolved, &out_dir)).await {
            Ok(result) => result,
            Err(_) => Err(CompileError::Timeout { backend: backend.to_string(), timeout: limit }),
        };
        match &result {
            Ok(artifact) => debug!(%backend, artifact = %artifact.display(), "compiled"),
            Err(e) => warn!(%backend, error = %e, "compilation failed"),
        }
        result
    }

    async fn reference(
        &self,
        model: &ModelDescriptor,
        inputs: &[Tensor],
        case_dir: &Path,
    ) -> Result<Vec<Tensor>, ExecutionError> {
        let registry = &self.ctx.registry;
        let frontend = self.case.frontend;
        let engine = registry
            .reference(frontend)
            .ok_or_else(|| ExecutionError::engine(format!("no reference engine registered for {frontend}")))?;

        let limit = registry.reference_timeout();
        let work_dir = case_dir.join(REFERENCE_DIR);
        let result = match timeout(limit, engine.run(model, inputs, &work_dir)).await {
            Ok(result) => result,
            Err(_) => Err(ExecutionError::timeout(engine.name(), limit)),
        };
        match &result {
            Ok(outputs) => debug!(engine = engine.name(), outputs = outputs.len(), "reference executed"),
            Err(e) => warn!(engine = engine.name(), error = %e, "reference execution failed"),
        }
        result
    }

    async fn execute(
        &self,
        backend: &BackendId,
        artifact: PathBuf,
        inputs: &[Tensor],
        case_dir: &Path,
        golden: Arc<ExecutionResult>,
        tolerance: ToleranceSpec,
    ) -> Verdict {
        let span = info_span!("backend", %backend);
        async move {
            let Some(slot) = self.ctx.registry.backend(backend) else {
                return self.errored(backend, Stage::Execution, format!("no backend registered for {backend}"));
            };
            let work_dir = case_dir.join(backend.as_str());

            // Scoped device acquisition; the timeout covers execution only.
            let guard = match &slot.device_lock {
                Some(lock) => Some(lock.lock().await),
                None => None,
            };
            let result = timeout(slot.timeout, slot.backend.execute(&artifact, inputs, &work_dir)).await;
            drop(guard);

            let outputs = match result {
                Ok(Ok(outputs)) => outputs,
                Ok(Err(e)) => return self.errored(backend, Stage::Execution, e),
                Err(_) => return self.errored(backend, Stage::Execution, ExecutionError::timeout(backend.as_str(), slot.timeout)),
            };
            debug!(outputs = outputs.len(), "backend executed");

            if let Err(e) = write_tensors(&work_dir, "output", &outputs).await {
                warn!(error = %e, "failed to dump backend outputs");
            }

            let actual = ExecutionResult::backend(backend.clone(), outputs);
            let verdict = Verdict::from_comparison(
                self.case.case_id.clone(),
                &self.case.suite,
                backend.clone(),
                compare_results(&golden, &actual, tolerance),
            );
            log_verdict(&verdict);
            verdict
        }
        .instrument(span)
        .await
    }

    fn errored(&self, backend: &BackendId, stage: Stage, error: impl fmt::Display) -> Verdict {
        let verdict = Verdict::errored(self.case.case_id.clone(), &self.case.suite, backend.clone(), stage, error);
        log_verdict(&verdict);
        verdict
    }

    fn errored_all(&self, targets: &[BackendId], stage: Stage, error: impl fmt::Display) -> Vec<Verdict> {
        let message = error.to_string();
        warn!(%stage, error = %message, "case aborted");
        targets
            .iter()
            .map(|b| Verdict::errored(self.case.case_id.clone(), &self.case.suite, b.clone(), stage, &message))
            .collect()
    }
}

fn log_verdict(verdict: &Verdict) {
    match verdict.outcome() {
        Outcome::Passed => info!(backend = %verdict.backend(), "PASS"),
        outcome => warn!(backend = %verdict.backend(), %outcome, detail = %verdict.detail(), "verdict"),
    }
}

/// Each case starts from an empty directory so stale artifacts from a
/// previous run can never be mistaken for this run's.
async fn reset_dir(dir: &Path) -> std::io::Result<()> {
    if tokio::fs::try_exists(dir).await? {
        tokio::fs::remove_dir_all(dir).await?;
    }
    tokio::fs::create_dir_all(dir).await
}
