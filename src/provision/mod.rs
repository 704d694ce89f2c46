//! EN-010/011: Provisioning collaborator: trait, payload, process execution.
//!
//! The lifecycle driver only sees [`Provisioner`]. The shipped implementation
//! drives the `terraform` CLI (or a compatible binary such as `tofu`).

pub mod local;
pub mod terraform;

use crate::core::error::Result;
use indexmap::IndexMap;

/// Inputs handed to the provisioning tool.
///
/// Required values travel as environment bindings so the tool treats them as
/// overridable; optional defaults travel as direct variable bindings.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConfigurationPayload {
    /// Environment bindings, keys already prefixed (`TF_VAR_name`)
    pub env: IndexMap<String, String>,

    /// Direct variable bindings (`-var name=value`)
    pub vars: IndexMap<String, String>,
}

/// Apply / output / destroy interface of the provisioning engine.
pub trait Provisioner {
    /// Apply, then verify a second apply with the same payload would change nothing.
    fn apply_idempotent(&mut self, payload: &ConfigurationPayload) -> Result<()>;

    /// Fetch one resolved output value.
    fn output(&mut self, name: &str) -> Result<String>;

    /// Tear down everything the apply created.
    fn destroy(&mut self) -> Result<()>;
}

/// Output from executing a command.
#[derive(Debug, Clone)]
pub struct ExecOutput {
    pub exit_code: i32,
    pub stdout: String,
    pub stderr: String,
}

impl ExecOutput {
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }

    /// Short diagnostic for error messages: stderr, or stdout when stderr is empty.
    pub fn diagnostic(&self) -> String {
        let stderr = self.stderr.trim();
        let text = if stderr.is_empty() { self.stdout.trim() } else { stderr };
        format!("exit code {}: {}", self.exit_code, text)
    }
}
