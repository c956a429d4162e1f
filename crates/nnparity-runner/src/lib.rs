//! Test orchestration for nnparity.
//!
//! Suites expand into [`TestCase`]s; each case is synthesised, compiled for
//! every requested backend concurrently with the reference run, executed and
//! compared. The [`Harness`] drives the whole run through a bounded pool and
//! produces a [`RunReport`].
//!
//! The compiler, reference engines and backends are trait objects held by an
//! [`EngineRegistry`]; the stock implementations spawn external processes.

pub mod case;
pub mod compiler;
pub mod engine;
pub mod harness;
pub mod inputs;
pub mod logging;
pub mod orchestrator;
pub mod pool;
pub mod preprocess;
mod process;
pub mod registry;
pub mod report;
pub mod suite;
pub mod tensor_io;

pub use case::{CaseOverlay, Collection, ExcludedCase, TestCase, collect_cases};
pub use compiler::{ARTIFACT_FILE, COMPILE_OPTIONS_FILE, CommandCompiler, Compiler, UnconfiguredCompiler};
pub use engine::{Backend, CommandBackend, CommandReference, ReferenceEngine};
pub use harness::{Harness, REPORT_JSON, REPORT_MARKDOWN};
pub use logging::{LOG_FILE, init_logging, parse_log_level};
pub use orchestrator::{RunContext, run_case};
pub use pool::run_cases;
pub use registry::{BackendSlot, EngineRegistry};
pub use report::{Outcome, RunReport, Stage, Summary, Verdict};
pub use suite::{Suite, builtin_suite, builtin_suites, load_suite_file};
