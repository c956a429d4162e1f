//! nnparity CLI
//!
//! Differential testing of a neural-network compiler: synthesise tiny models
//! over a parameter matrix, compile them for every backend, and compare each
//! backend's outputs against the authoring framework's reference outputs.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use console::style;
use nnparity_config::{HarnessConfig, load_config, load_config_from_file};
use std::path::PathBuf;

mod commands;
mod exit;

use commands::{ListCommand, RunCommand};
use exit::EXIT_FATAL;

/// nnparity - differential tester for NN compiler backends
#[derive(Debug, Parser)]
#[command(name = "nnparity")]
#[command(about = "Differential tester for neural-network compiler backends")]
#[command(long_about = r#"
nnparity expands declarative operator suites into test cases, synthesises a
minimal Caffe or ONNX model per case, compiles it for every requested backend,
and checks each backend's outputs against the reference framework.

Examples:
  # Run every built-in suite
  nnparity run

  # Run one suite with a custom config and 8 cases in flight
  nnparity run --config nnparity.toml --suite caffe_slice --jobs 8

  # Show the cases a suite file expands to
  nnparity list --suite-file suites/slice_wide.yaml

Exit codes: 0 all passed, 1 some case failed or errored, 2 fatal error.
"#)]
#[command(version)]
struct Cli {
    /// Harness configuration file (default: NNPARITY_CONFIG, then nnparity.toml)
    #[arg(short, long, value_name = "PATH", global = true)]
    config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error, off)
    #[arg(long, value_name = "LEVEL", global = true)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    Run(RunCommand),
    #[command(alias = "ls")]
    List(ListCommand),
}

impl Cli {
    fn load_configuration(&self) -> Result<HarnessConfig> {
        let mut config = match &self.config {
            Some(path) => load_config_from_file(path)
                .with_context(|| format!("failed to load configuration from {}", path.display()))?,
            None => load_config().context("failed to load configuration")?,
        };
        if let Some(level) = &self.log_level {
            config.setup.log_level = level.trim().to_lowercase();
        }
        Ok(config)
    }
}

async fn dispatch(cli: Cli) -> Result<i32> {
    match &cli.command {
        Commands::Run(cmd) => cmd.execute(cli.load_configuration()?).await,
        Commands::List(cmd) => cmd.execute().map(|()| exit::EXIT_SUCCESS),
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let code = match dispatch(cli).await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("{} {e}", style("error:").red().bold());
            for cause in e.chain().skip(1) {
                eprintln!("  {} {cause}", style("caused by:").dim());
            }
            EXIT_FATAL
        }
    };
    std::process::exit(code);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_definition_is_consistent() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_run_with_overrides() {
        let cli = Cli::try_parse_from([
            "nnparity",
            "run",
            "--suite",
            "caffe_slice",
            "--suite",
            "caffe_eltwise",
            "--suite-file",
            "wide.yaml",
            "--run-root",
            "out",
            "--jobs",
            "3",
            "--log-level",
            "debug",
        ])
        .unwrap();
        assert_eq!(cli.log_level.as_deref(), Some("debug"));

        let Commands::Run(run) = cli.command else { panic!("expected run") };
        assert_eq!(run.suites, ["caffe_slice", "caffe_eltwise"]);
        assert_eq!(run.suite_files, [PathBuf::from("wide.yaml")]);

        let mut config = HarnessConfig::default();
        run.apply_overrides(&mut config);
        assert_eq!(config.setup.run_root, PathBuf::from("out"));
        assert_eq!(config.setup.max_parallel, 3);
        assert_eq!(config.setup.case_config, None);
    }

    #[test]
    fn test_parse_list_alias() {
        let cli = Cli::try_parse_from(["nnparity", "ls", "--suite", "onnx_random_normal"]).unwrap();
        let Commands::List(list) = cli.command else { panic!("expected list") };
        assert_eq!(list.suites, ["onnx_random_normal"]);
    }

    #[test]
    fn test_subcommand_is_required() {
        assert!(Cli::try_parse_from(["nnparity"]).is_err());
    }

    #[test]
    fn test_config_file_and_log_level_override() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nnparity.toml");
        std::fs::write(&path, "[setup]\nmax_parallel = 2\nlog_level = \"warn\"\n").unwrap();

        let cli = Cli::try_parse_from(["nnparity", "run", "--config", path.to_str().unwrap(), "--log-level", "TRACE"])
            .unwrap();
        let config = cli.load_configuration().unwrap();
        assert_eq!(config.setup.max_parallel, 2);
        assert_eq!(config.setup.log_level, "trace");
    }
}
