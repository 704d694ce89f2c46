//! EN-007: Lifecycle driver: inputs → apply (idempotent) → validate outputs → destroy.
//!
//! States advance `INIT → INPUTS-PREPARED → PROVISIONED → VALIDATED`; teardown
//! runs exactly once on every path that reached provisioning, including
//! unwinding. A teardown failure is reported next to the verdict and never
//! changes it.

use super::error::{Error, Result};
use super::types::{LifecycleEvent, LifecycleState};
use crate::provenance::eventlog;
use crate::provision::{ConfigurationPayload, Provisioner};
use indexmap::IndexMap;
use std::path::Path;
use std::time::Instant;

/// What the driver needs from the declaration phase.
#[derive(Debug, Clone, Copy)]
pub struct LifecycleInputs<'a> {
    /// File the variables were declared in (diagnostics only)
    pub source: &'a Path,
    /// Synthesized values for required variables
    pub synthesized: &'a IndexMap<String, String>,
    /// Defaults of optional variables
    pub optional: &'a IndexMap<String, String>,
    /// Output names to fetch and check
    pub outputs: &'a [String],
    /// Environment prefix for required values (`TF_VAR_`)
    pub env_prefix: &'a str,
}

/// Outcome of one lifecycle.
#[derive(Debug)]
pub struct LifecycleReport {
    /// Furthest state reached before teardown
    pub reached: LifecycleState,
    /// Outputs that passed validation, with their values
    pub outputs: IndexMap<String, String>,
    /// First failure; None means the module passed
    pub failure: Option<Error>,
    /// Whether teardown ran
    pub destroy_attempted: bool,
    /// Teardown failure, reported on its own
    pub destroy_error: Option<Error>,
    pub duration_seconds: f64,
}

impl LifecycleReport {
    pub fn passed(&self) -> bool {
        self.failure.is_none()
    }

    /// DESTROYED when everything including teardown succeeded, FAILED otherwise.
    pub fn final_state(&self) -> LifecycleState {
        if self.failure.is_none() && self.destroy_attempted && self.destroy_error.is_none() {
            LifecycleState::Destroyed
        } else {
            LifecycleState::Failed
        }
    }
}

/// Where lifecycle events are recorded.
#[derive(Debug, Clone, Copy)]
pub struct RecordCtx<'a> {
    pub state_dir: &'a Path,
    pub module_key: &'a str,
    pub enabled: bool,
}

impl<'a> RecordCtx<'a> {
    pub fn new(state_dir: &'a Path, module_key: &'a str) -> Self {
        Self {
            state_dir,
            module_key,
            enabled: true,
        }
    }

    /// A context that records nothing.
    pub fn disabled() -> Self {
        Self {
            state_dir: Path::new(""),
            module_key: "",
            enabled: false,
        }
    }

    pub fn record(&self, event: LifecycleEvent) {
        if !self.enabled {
            return;
        }
        if let Err(e) = eventlog::append_event(self.state_dir, self.module_key, event) {
            log::warn!("{}: cannot record event: {}", self.module_key, e);
        }
    }
}

/// Build the configuration payload.
///
/// Required values become `<prefix><name>` environment bindings; optional
/// defaults become direct variable bindings. A name in both is malformed.
pub fn prepare_payload(
    source: &Path,
    synthesized: &IndexMap<String, String>,
    optional: &IndexMap<String, String>,
    env_prefix: &str,
) -> Result<ConfigurationPayload> {
    let mut payload = ConfigurationPayload::default();
    for (name, value) in synthesized {
        if optional.contains_key(name) {
            return Err(Error::MalformedDeclaration {
                path: source.to_path_buf(),
                kind: "variable".to_string(),
                message: format!("'{}' is both required and optional", name),
            });
        }
        payload
            .env
            .insert(format!("{}{}", env_prefix, name), value.clone());
    }
    for (name, value) in optional {
        payload.vars.insert(name.clone(), value.clone());
    }
    Ok(payload)
}

/// Destroys on drop unless [`Teardown::run`] already did.
struct Teardown<'p, P: Provisioner + ?Sized> {
    provisioner: &'p mut P,
    armed: bool,
}

impl<'p, P: Provisioner + ?Sized> Teardown<'p, P> {
    fn arm(provisioner: &'p mut P) -> Self {
        Self {
            provisioner,
            armed: true,
        }
    }

    fn provisioner(&mut self) -> &mut P {
        &mut *self.provisioner
    }

    fn run(mut self) -> Result<()> {
        self.armed = false;
        self.provisioner.destroy()
    }
}

impl<P: Provisioner + ?Sized> Drop for Teardown<'_, P> {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        self.armed = false;
        log::warn!("lifecycle interrupted, destroying");
        if let Err(e) = self.provisioner.destroy() {
            log::warn!("teardown after interruption failed: {}", e);
        }
    }
}

/// Drive one module through its lifecycle.
pub fn drive<P: Provisioner + ?Sized>(
    provisioner: &mut P,
    inputs: &LifecycleInputs,
    ctx: &RecordCtx,
) -> LifecycleReport {
    let start = Instant::now();
    let mut report = LifecycleReport {
        reached: LifecycleState::Init,
        outputs: IndexMap::new(),
        failure: None,
        destroy_attempted: false,
        destroy_error: None,
        duration_seconds: 0.0,
    };

    let payload = match prepare_payload(
        inputs.source,
        inputs.synthesized,
        inputs.optional,
        inputs.env_prefix,
    ) {
        Ok(payload) => payload,
        Err(e) => {
            fail(&mut report, e, ctx);
            report.duration_seconds = start.elapsed().as_secs_f64();
            return report;
        }
    };
    report.reached = LifecycleState::InputsPrepared;
    log::info!(
        "{}: {} required, {} optional",
        report.reached,
        payload.env.len(),
        payload.vars.len()
    );
    ctx.record(LifecycleEvent::InputsPrepared {
        required: inputs.synthesized.keys().cloned().collect(),
        optional: inputs.optional.keys().cloned().collect(),
    });

    let mut teardown = Teardown::arm(provisioner);
    let outcome = provision_and_validate(
        teardown.provisioner(),
        &payload,
        inputs.outputs,
        &mut report,
        ctx,
    );
    if let Err(e) = outcome {
        fail(&mut report, e, ctx);
    }

    let destroy_start = Instant::now();
    report.destroy_attempted = true;
    match teardown.run() {
        Ok(()) => {
            log::info!("{}", LifecycleState::Destroyed);
            ctx.record(LifecycleEvent::Destroyed {
                duration_seconds: destroy_start.elapsed().as_secs_f64(),
            });
        }
        Err(e) => {
            log::warn!("teardown failed: {}", e);
            ctx.record(LifecycleEvent::DestroyFailed {
                error: e.to_string(),
            });
            report.destroy_error = Some(e);
        }
    }

    report.duration_seconds = start.elapsed().as_secs_f64();
    report
}

fn provision_and_validate<P: Provisioner + ?Sized>(
    provisioner: &mut P,
    payload: &ConfigurationPayload,
    outputs: &[String],
    report: &mut LifecycleReport,
    ctx: &RecordCtx,
) -> Result<()> {
    let apply_start = Instant::now();
    provisioner.apply_idempotent(payload)?;
    report.reached = LifecycleState::Provisioned;
    log::info!("{}", report.reached);
    ctx.record(LifecycleEvent::Provisioned {
        duration_seconds: apply_start.elapsed().as_secs_f64(),
    });

    for name in outputs {
        let value = provisioner.output(name)?;
        if value.is_empty() {
            return Err(Error::Validation { name: name.clone() });
        }
        log::debug!("output {} resolved", name);
        ctx.record(LifecycleEvent::OutputValidated {
            output: name.clone(),
        });
        report.outputs.insert(name.clone(), value);
    }

    report.reached = LifecycleState::Validated;
    log::info!("{}: {} outputs", report.reached, outputs.len());
    Ok(())
}

fn fail(report: &mut LifecycleReport, error: Error, ctx: &RecordCtx) {
    log::warn!("failed after {}: {}", report.reached, error);
    ctx.record(LifecycleEvent::LifecycleFailed {
        state: report.reached,
        error: error.to_string(),
    });
    report.failure = Some(error);
}
