//! In-process compiler, reference engine and backends for end-to-end tests.
//!
//! The "compiled artifact" is the graph plus its resolved options as JSON;
//! simulated backends evaluate it the same way the reference engine does, so
//! unperturbed runs match exactly.

#![allow(dead_code)]

use async_trait::async_trait;
use nnparity_common::{BackendId, CompileError, ExecutionError, Tensor};
use nnparity_config::{ResolvedConfig, SetupConfig};
use nnparity_runner::preprocess::{preprocess_inputs, to_output_layout};
use nnparity_runner::{ARTIFACT_FILE, Backend, Compiler, EngineRegistry, Harness, ReferenceEngine};
use nnparity_synth::{EltwiseOp, Frontend, Graph, ModelDescriptor, Op};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

pub const DEFAULT_BACKEND_TIMEOUT: Duration = Duration::from_secs(30);

/// Evaluate a synthesised graph on host tensors.
pub fn evaluate(graph: &Graph, inputs: &[Tensor]) -> Result<Vec<Tensor>, String> {
    if inputs.len() != graph.inputs.len() {
        return Err(format!("graph takes {} inputs, got {}", graph.inputs.len(), inputs.len()));
    }
    let mut values: HashMap<String, Tensor> =
        graph.inputs.iter().map(|s| s.name.clone()).zip(inputs.iter().cloned()).collect();

    for node in &graph.nodes {
        let args = node
            .inputs
            .iter()
            .map(|name| values.get(name).cloned().ok_or_else(|| format!("undefined value `{name}`")))
            .collect::<Result<Vec<_>, _>>()?;
        let outputs = match &node.op {
            Op::Slice { axis, slice_points } => slice(&args[0], *axis, slice_points),
            Op::Eltwise { operation } => vec![eltwise(&args, *operation)],
            Op::RandomNormal { mean, scale, seed, shape, .. } => vec![random_normal(shape, *mean, *scale, *seed)],
            Op::Add => vec![eltwise(&args, EltwiseOp::Sum)],
        };
        for (name, tensor) in node.outputs.iter().zip(outputs) {
            values.insert(name.clone(), tensor);
        }
    }

    graph
        .outputs
        .iter()
        .map(|o| values.remove(&o.name).ok_or_else(|| format!("output `{}` was never produced", o.name)))
        .collect()
}

fn slice(t: &Tensor, axis: usize, points: &[usize]) -> Vec<Tensor> {
    let shape = t.shape();
    let outer: usize = shape[..axis].iter().product();
    let inner: usize = shape[axis + 1..].iter().product();
    let dim = shape[axis];

    let mut bounds = vec![0];
    bounds.extend_from_slice(points);
    bounds.push(dim);

    bounds
        .windows(2)
        .map(|w| {
            let mut values = Vec::with_capacity(outer * (w[1] - w[0]) * inner);
            for o in 0..outer {
                let base = o * dim * inner;
                values.extend_from_slice(&t.values()[base + w[0] * inner..base + w[1] * inner]);
            }
            let mut out_shape = shape.to_vec();
            out_shape[axis] = w[1] - w[0];
            Tensor::from_f32(out_shape, values).unwrap()
        })
        .collect()
}

fn eltwise(args: &[Tensor], op: EltwiseOp) -> Tensor {
    let mut acc = args[0].values().to_vec();
    for arg in &args[1..] {
        for (a, &b) in acc.iter_mut().zip(arg.values()) {
            *a = match op {
                EltwiseOp::Prod => *a * b,
                EltwiseOp::Sum => *a + b,
                EltwiseOp::Max => a.max(b),
            };
        }
    }
    Tensor::from_f32(args[0].shape().to_vec(), acc).unwrap()
}

/// Box-Muller over a seeded stream; unseeded nodes draw a fresh seed.
fn random_normal(shape: &[usize], mean: Option<f32>, scale: Option<f32>, seed: Option<f32>) -> Tensor {
    let seed = seed.map(|s| u64::from(s.to_bits())).unwrap_or_else(rand::random);
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let (mean, scale) = (mean.unwrap_or(0.0), scale.unwrap_or(1.0));
    let n: usize = shape.iter().product();
    let values = (0..n)
        .map(|_| {
            let u1 = 1.0 - rng.random::<f32>();
            let u2 = rng.random::<f32>();
            let z = (-2.0 * u1.ln()).sqrt() * (2.0 * std::f32::consts::PI * u2).cos();
            mean + scale * z
        })
        .collect();
    Tensor::from_f32(shape.to_vec(), values).unwrap()
}

/// Reference engine that evaluates the graph and counts its runs.
#[derive(Default)]
pub struct EvaluatingReference {
    runs: AtomicUsize,
}

impl EvaluatingReference {
    pub fn runs(&self) -> usize {
        self.runs.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ReferenceEngine for EvaluatingReference {
    fn name(&self) -> &str {
        "evaluator"
    }

    async fn run(&self, model: &ModelDescriptor, inputs: &[Tensor], _work_dir: &Path) -> Result<Vec<Tensor>, ExecutionError> {
        self.runs.fetch_add(1, Ordering::SeqCst);
        evaluate(model.graph(), inputs).map_err(ExecutionError::engine)
    }
}

/// Reference engine that never answers within any sane bound.
pub struct HangingReference;

#[async_trait]
impl ReferenceEngine for HangingReference {
    fn name(&self) -> &str {
        "hanging"
    }

    async fn run(&self, _model: &ModelDescriptor, _inputs: &[Tensor], _work_dir: &Path) -> Result<Vec<Tensor>, ExecutionError> {
        tokio::time::sleep(Duration::from_secs(3600)).await;
        Err(ExecutionError::engine("woke up"))
    }
}

pub struct FailingReference;

#[async_trait]
impl ReferenceEngine for FailingReference {
    fn name(&self) -> &str {
        "crashing"
    }

    async fn run(&self, _model: &ModelDescriptor, _inputs: &[Tensor], _work_dir: &Path) -> Result<Vec<Tensor>, ExecutionError> {
        Err(ExecutionError::engine("reference framework crashed"))
    }
}

#[derive(Serialize, Deserialize)]
pub struct Artifact {
    pub graph: Graph,
    pub config: ResolvedConfig,
}

/// Writes the graph and resolved options as the artifact.
#[derive(Default)]
pub struct MockCompiler {
    failing: HashSet<BackendId>,
    slow: HashMap<BackendId, Duration>,
    calls: AtomicUsize,
}

impl MockCompiler {
    pub fn failing_for(backends: &[&str]) -> Self {
        Self { failing: backends.iter().map(|b| BackendId::new(*b)).collect(), ..Self::default() }
    }

    /// Sleep for `delay` before compiling for `backend`.
    pub fn slow_for(backend: &str, delay: Duration) -> Self {
        Self { slow: HashMap::from([(BackendId::new(backend), delay)]), ..Self::default() }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Compiler for MockCompiler {
    async fn compile(
        &self,
        model: &ModelDescriptor,
        backend: &BackendId,
        config: &ResolvedConfig,
        out_dir: &Path,
    ) -> Result<PathBuf, CompileError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.slow.get(backend) {
            tokio::time::sleep(*delay).await;
        }
        if self.failing.contains(backend) {
            return Err(CompileError::Failed {
                backend: backend.to_string(),
                status: Some(1),
                stderr: "unsupported operator".to_string(),
            });
        }

        tokio::fs::create_dir_all(out_dir).await.map_err(CompileError::io)?;
        let artifact = out_dir.join(ARTIFACT_FILE);
        let json = serde_json::to_vec(&Artifact { graph: model.graph().clone(), config: config.clone() })
            .map_err(|e| CompileError::other(e.to_string()))?;
        tokio::fs::write(&artifact, json).await.map_err(CompileError::io)?;
        Ok(artifact)
    }
}

/// Tracks how many executions overlap.
#[derive(Default)]
pub struct ConcurrencyGauge {
    active: AtomicUsize,
    max: AtomicUsize,
}

impl ConcurrencyGauge {
    pub fn max(&self) -> usize {
        self.max.load(Ordering::SeqCst)
    }

    fn enter(&self) -> GaugeGuard<'_> {
        let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.max.fetch_max(now, Ordering::SeqCst);
        GaugeGuard(self)
    }
}

struct GaugeGuard<'a>(&'a ConcurrencyGauge);

impl Drop for GaugeGuard<'_> {
    fn drop(&mut self) {
        self.0.active.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Runs artifacts from [`MockCompiler`], with optional misbehaviour.
pub struct SimulatedBackend {
    id: BackendId,
    perturbation: Option<f32>,
    delay: Option<Duration>,
    drop_output: bool,
    gauge: Option<Arc<ConcurrencyGauge>>,
}

impl SimulatedBackend {
    pub fn new(id: &str) -> Self {
        Self { id: BackendId::new(id), perturbation: None, delay: None, drop_output: false, gauge: None }
    }

    /// Add `delta` to the first element of every output.
    pub fn with_perturbation(mut self, delta: f32) -> Self {
        self.perturbation = Some(delta);
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Lose the last output.
    pub fn dropping_output(mut self) -> Self {
        self.drop_output = true;
        self
    }

    pub fn with_gauge(mut self, gauge: Arc<ConcurrencyGauge>) -> Self {
        self.gauge = Some(gauge);
        self
    }
}

#[async_trait]
impl Backend for SimulatedBackend {
    fn id(&self) -> &BackendId {
        &self.id
    }

    async fn execute(&self, artifact: &Path, inputs: &[Tensor], _work_dir: &Path) -> Result<Vec<Tensor>, ExecutionError> {
        let _active = self.gauge.as_deref().map(ConcurrencyGauge::enter);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        let bytes = tokio::fs::read(artifact).await.map_err(ExecutionError::io)?;
        let Artifact { graph, config } =
            serde_json::from_slice(&bytes).map_err(|e| ExecutionError::decode(e.to_string()))?;
        let inputs = preprocess_inputs(inputs, &graph.inputs, &config.preprocess)
            .map_err(|e| ExecutionError::engine(e.to_string()))?;
        let outputs = evaluate(&graph, &inputs).map_err(ExecutionError::engine)?;
        let mut outputs = to_output_layout(outputs, &config.preprocess);

        if self.drop_output {
            outputs.pop();
        }
        if let Some(delta) = self.perturbation {
            outputs = outputs
                .into_iter()
                .map(|t| {
                    let mut values = t.values().to_vec();
                    values[0] += delta;
                    Tensor::new(t.shape().to_vec(), t.dtype(), values).unwrap()
                })
                .collect();
        }
        Ok(outputs)
    }
}

/// Evaluating references for both front-ends plus plain `cpu` and `k210`
/// simulators.
pub fn standard_registry(compiler: Arc<dyn Compiler>, reference: Arc<dyn ReferenceEngine>) -> EngineRegistry {
    EngineRegistry::new(compiler)
        .with_reference(Frontend::Caffe, Arc::clone(&reference))
        .with_reference(Frontend::Onnx, reference)
        .with_backend(Arc::new(SimulatedBackend::new("cpu")), DEFAULT_BACKEND_TIMEOUT)
        .with_backend(Arc::new(SimulatedBackend::new("k210")), DEFAULT_BACKEND_TIMEOUT)
}

pub fn setup_at(run_root: &Path) -> SetupConfig {
    SetupConfig { run_root: run_root.to_path_buf(), max_parallel: 4, input_seed: 7, ..SetupConfig::default() }
}

pub fn harness_at(run_root: &Path, registry: EngineRegistry) -> Harness {
    Harness::new(setup_at(run_root), nnparity_config::CaseOptions::builtin(), registry)
}
