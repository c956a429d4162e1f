//! Child-process plumbing shared by the command adapters

use nnparity_config::CommandSpec;
use std::collections::BTreeMap;
use std::path::Path;
use std::process::Stdio;
use tokio::process::Command;
use tracing::debug;

/// Longest stderr tail kept in an error message.
const STDERR_TAIL: usize = 2000;

#[derive(Debug)]
pub(crate) struct ProcessOutput {
    pub success: bool,
    pub status: Option<i32>,
    pub stderr: String,
}

/// Run `spec` with placeholders substituted from `vars`.
///
/// The child is killed if the returned future is dropped, which is how the
/// orchestrator's timeouts end runaway engines.
pub(crate) async fn run_command(
    spec: &CommandSpec,
    vars: &BTreeMap<&str, String>,
    cwd: &Path,
) -> std::io::Result<ProcessOutput> {
    let args = spec.render_args(vars);
    debug!(program = %spec.program, ?args, cwd = %cwd.display(), "spawning");

    let output = Command::new(&spec.program)
        .args(&args)
        .envs(&spec.env)
        .current_dir(cwd)
        .stdin(Stdio::null())
        .kill_on_drop(true)
        .output()
        .await?;

    let stderr = String::from_utf8_lossy(&output.stderr);
    let stderr = stderr.trim();
    let tail_start = stderr.char_indices().rev().nth(STDERR_TAIL).map_or(0, |(i, _)| i);

    Ok(ProcessOutput {
        success: output.status.success(),
        status: output.status.code(),
        stderr: stderr[tail_start..].to_string(),
    })
}

pub(crate) fn path_var(path: &Path) -> String {
    path.display().to_string()
}
