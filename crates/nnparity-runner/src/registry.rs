//! Compiler, reference engines and backends available to a run

use crate::compiler::{CommandCompiler, Compiler, UnconfiguredCompiler};
use crate::engine::{Backend, CommandBackend, CommandReference, ReferenceEngine};
use nnparity_common::{BackendId, ConfigError};
use nnparity_config::HarnessConfig;
use nnparity_synth::Frontend;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::debug;

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(300);

/// A registered backend with its execution bound and, for single physical
/// accelerators, the lock every execution must hold.
#[derive(Clone)]
pub struct BackendSlot {
    pub backend: Arc<dyn Backend>,
    pub timeout: Duration,
    pub device_lock: Option<Arc<Mutex<()>>>,
}

#[derive(Clone)]
pub struct EngineRegistry {
    compiler: Arc<dyn Compiler>,
    compile_timeout: Duration,
    reference_timeout: Duration,
    references: BTreeMap<Frontend, Arc<dyn ReferenceEngine>>,
    backends: BTreeMap<BackendId, BackendSlot>,
    devices: BTreeMap<String, Arc<Mutex<()>>>,
}

impl EngineRegistry {
    pub fn new(compiler: Arc<dyn Compiler>) -> Self {
        Self {
            compiler,
            compile_timeout: DEFAULT_TIMEOUT,
            reference_timeout: DEFAULT_TIMEOUT,
            references: BTreeMap::new(),
            backends: BTreeMap::new(),
            devices: BTreeMap::new(),
        }
    }

    /// Command adapters for everything the configuration declares.
    pub fn from_config(config: &HarnessConfig) -> Result<Self, ConfigError> {
        let compiler: Arc<dyn Compiler> = match &config.compiler {
            Some(command) => Arc::new(CommandCompiler::new(command.clone())),
            None => Arc::new(UnconfiguredCompiler),
        };
        let mut registry = Self::new(compiler)
            .with_compile_timeout(config.setup.compile_timeout())
            .with_reference_timeout(config.setup.reference_timeout());

        for (name, command) in &config.reference {
            let frontend = Frontend::from_name(name)
                .ok_or_else(|| ConfigError::invalid(format!("unknown reference front-end `{name}`")))?;
            registry = registry.with_reference(frontend, Arc::new(CommandReference::new(name.clone(), command.clone())));
        }

        for (id, target) in &config.targets {
            let Some(command) = target.command() else {
                debug!(backend = %id, "target has no runner program, executions will error");
                continue;
            };
            let backend = Arc::new(CommandBackend::new(id.clone(), command, target.device.clone()));
            registry = if target.exclusive {
                let device = target.device.clone().unwrap_or_else(|| id.to_string());
                registry.with_exclusive_backend(backend, target.timeout(), &device)
            } else {
                registry.with_backend(backend, target.timeout())
            };
        }

        Ok(registry)
    }

    pub fn with_compile_timeout(mut self, timeout: Duration) -> Self {
        self.compile_timeout = timeout;
        self
    }

    pub fn with_reference_timeout(mut self, timeout: Duration) -> Self {
        self.reference_timeout = timeout;
        self
    }

    pub fn with_reference(mut self, frontend: Frontend, engine: Arc<dyn ReferenceEngine>) -> Self {
        self.references.insert(frontend, engine);
        self
    }

    /// Register a backend that may run any number of executions at once.
    pub fn with_backend(mut self, backend: Arc<dyn Backend>, timeout: Duration) -> Self {
        let slot = BackendSlot { backend: Arc::clone(&backend), timeout, device_lock: None };
        self.backends.insert(backend.id().clone(), slot);
        self
    }

    /// Register a backend bound to one physical device. Backends naming the
    /// same device share its lock.
    pub fn with_exclusive_backend(mut self, backend: Arc<dyn Backend>, timeout: Duration, device: &str) -> Self {
        let lock = Arc::clone(self.devices.entry(device.to_string()).or_default());
        let slot = BackendSlot { backend: Arc::clone(&backend), timeout, device_lock: Some(lock) };
        self.backends.insert(backend.id().clone(), slot);
        self
    }

    pub fn compiler(&self) -> &Arc<dyn Compiler> {
        &self.compiler
    }

    pub fn compile_timeout(&self) -> Duration {
        self.compile_timeout
    }

    pub fn reference_timeout(&self) -> Duration {
        self.reference_timeout
    }

    pub fn reference(&self, frontend: Frontend) -> Option<&Arc<dyn ReferenceEngine>> {
        self.references.get(&frontend)
    }

    pub fn backend(&self, id: &BackendId) -> Option<&BackendSlot> {
        self.backends.get(id)
    }

    pub fn backend_ids(&self) -> impl Iterator<Item = &BackendId> {
        self.backends.keys()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nnparity_config::{CommandSpec, TargetConfig};

    fn target(exclusive: bool, device: Option<&str>) -> TargetConfig {
        TargetConfig {
            exclusive,
            device: device.map(str::to_string),
            program: Some("runner".into()),
            ..TargetConfig::default()
        }
    }

    #[test]
    fn test_from_config_registers_command_adapters() {
        let mut config = HarnessConfig::default();
        config.reference.insert("caffe".into(), CommandSpec::new("python3", ["run_caffe.py"]));
        config.targets.insert("cpu".into(), target(false, None));
        config.targets.insert("k210".into(), target(true, Some("/dev/ttyUSB0")));
        config.targets.insert("k510".into(), TargetConfig::default());

        let registry = EngineRegistry::from_config(&config).unwrap();
        assert!(registry.reference(Frontend::Caffe).is_some());
        assert!(registry.reference(Frontend::Onnx).is_none());
        assert!(registry.backend(&"cpu".into()).unwrap().device_lock.is_none());
        assert!(registry.backend(&"k210".into()).unwrap().device_lock.is_some());
        assert!(registry.backend(&"k510".into()).is_none());
        assert_eq!(registry.compile_timeout(), Duration::from_secs(300));
    }

    #[test]
    fn test_backends_on_one_device_share_a_lock() {
        let mut config = HarnessConfig::default();
        config.targets.insert("k210".into(), target(true, Some("/dev/ttyUSB0")));
        config.targets.insert("k210-alt".into(), target(true, Some("/dev/ttyUSB0")));
        let registry = EngineRegistry::from_config(&config).unwrap();

        let a = registry.backend(&"k210".into()).unwrap().device_lock.clone().unwrap();
        let b = registry.backend(&"k210-alt".into()).unwrap().device_lock.clone().unwrap();
        assert!(Arc::ptr_eq(&a, &b));
    }

    #[test]
    fn test_unknown_reference_frontend_is_rejected() {
        let mut config = HarnessConfig::default();
        config.reference.insert("tflite".into(), CommandSpec::new("python3", ["run.py"]));
        assert!(EngineRegistry::from_config(&config).is_err());
    }
}
