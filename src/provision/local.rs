//! EN-010: Local process execution.

use super::ExecOutput;
use crate::core::error::{Error, Result};
use indexmap::IndexMap;
use std::path::Path;
use std::process::{Command, Stdio};

/// Run `program args...` in `cwd` with extra environment bindings, capturing output.
///
/// A non-zero exit is not an error here; callers decide via [`ExecOutput::success`].
pub fn exec_local(
    program: &str,
    args: &[String],
    cwd: &Path,
    env: &IndexMap<String, String>,
) -> Result<ExecOutput> {
    log::debug!("exec {} {} (in {})", program, args.join(" "), cwd.display());

    let output = Command::new(program)
        .args(args)
        .current_dir(cwd)
        .envs(env)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .output()
        .map_err(|e| Error::provisioning("spawn", format!("failed to spawn {}: {}", program, e)))?;

    Ok(ExecOutput {
        exit_code: output.status.code().unwrap_or(-1),
        stdout: String::from_utf8_lossy(&output.stdout).to_string(),
        stderr: String::from_utf8_lossy(&output.stderr).to_string(),
    })
}
