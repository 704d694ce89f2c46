//! EN-008: Harness: one module end to end, and many modules in parallel.
//!
//! inspect → synthesize → stage workspace → drive lifecycle → record.
//! Declaration errors surface before anything touches the filesystem or the
//! provisioning tool.

use super::classifier::classify;
use super::collector::collect_outputs;
use super::error::{Error, Result};
use super::lifecycle::{drive, LifecycleInputs, RecordCtx};
use super::parser::parse_file;
use super::report::save_report;
use super::synthesizer::Synthesizer;
use super::types::{HarnessConfig, LifecycleEvent, ModuleInterface, RunReport};
use crate::provenance::{eventlog, hasher};
use crate::provision::Provisioner;
use crate::workspace::Workspace;
use indexmap::IndexMap;
use rayon::prelude::*;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Instant;

/// Settings shared by every invocation of a run.
#[derive(Debug, Clone, Copy)]
pub struct RunOptions<'a> {
    pub config: &'a HarnessConfig,
    /// Where event logs and reports go
    pub state_dir: &'a Path,
    /// Record events and reports
    pub record: bool,
}

/// Result of one module in a multi-module run.
#[derive(Debug)]
pub struct ModuleOutcome {
    pub module: PathBuf,
    pub result: Result<RunReport>,
}

impl ModuleOutcome {
    pub fn passed(&self) -> bool {
        matches!(&self.result, Ok(report) if report.passed)
    }
}

/// Statically read a module's declared inputs and outputs.
pub fn inspect_module(module_dir: &Path, config: &HarnessConfig) -> Result<ModuleInterface> {
    let decl = &config.declarations;
    let variables_file = parse_file(&module_dir.join(&decl.variables_file))?;
    let outputs_file = parse_file(&module_dir.join(&decl.outputs_file))?;

    let variables = classify(&variables_file)?;
    let outputs = collect_outputs(&outputs_file, decl.outputs)?;

    log::debug!(
        "{}: {} required, {} optional, {} outputs",
        module_dir.display(),
        variables.required.len(),
        variables.optional_defaults.len(),
        outputs.len()
    );
    Ok(ModuleInterface { variables, outputs })
}

/// Required variables whose declared type is not a string.
///
/// Synthesized values are always strings; the tool may reject them for these.
pub fn type_gaps(iface: &ModuleInterface) -> Vec<(String, String)> {
    iface
        .variables
        .required
        .iter()
        .filter_map(|name| iface.variables.variable(name))
        .filter(|v| !v.is_string_typed())
        .map(|v| (v.name.clone(), v.declared_type.clone().unwrap_or_default()))
        .collect()
}

/// Synthesize values for a module's required variables.
pub fn synthesize_inputs(
    iface: &ModuleInterface,
    config: &HarnessConfig,
) -> Result<IndexMap<String, String>> {
    let synthesizer = Synthesizer::from_config(&config.synthesis)?;
    for (name, declared) in type_gaps(iface) {
        log::warn!(
            "required variable '{}' is declared as {}; a string placeholder will be passed",
            name,
            declared
        );
    }
    Ok(synthesizer.synthesize(&iface.variables.required))
}

/// Test one module. `make` builds the provisioner for the staged directory.
///
/// `Err` means the module never reached provisioning; a lifecycle failure is
/// an `Ok` report with `passed == false`.
pub fn run_module<P, F>(module_dir: &Path, opts: &RunOptions, make: &F) -> Result<RunReport>
where
    P: Provisioner,
    F: Fn(&Path) -> P,
{
    let start = Instant::now();
    let config = opts.config;

    let iface = inspect_module(module_dir, config)?;
    let synthesized = synthesize_inputs(&iface, config)?;
    let optional = iface.variables.optional_defaults.clone();
    let output_names = iface.output_names();

    let module_key = hasher::module_key(module_dir);
    let fingerprint = hasher::hash_directory(module_dir)?;
    let run_id = eventlog::generate_run_id();

    let workspace = if config.isolate {
        Workspace::isolated(module_dir)?
    } else {
        Workspace::in_place(module_dir)?
    };
    let provider_file = workspace.stage_provider_file(&config.provider_file)?;

    let ctx = RecordCtx {
        state_dir: opts.state_dir,
        module_key: &module_key,
        enabled: opts.record,
    };
    ctx.record(LifecycleEvent::RunStarted {
        module: module_dir.display().to_string(),
        run_id: run_id.clone(),
        fingerprint: fingerprint.clone(),
        ensayo_version: env!("CARGO_PKG_VERSION").to_string(),
    });
    log::info!("{}: testing in {}", module_key, workspace.path().display());

    let variables_source = module_dir.join(&config.declarations.variables_file);
    let inputs = LifecycleInputs {
        source: &variables_source,
        synthesized: &synthesized,
        optional: &optional,
        outputs: &output_names,
        env_prefix: &config.provisioner.env_prefix,
    };
    let mut provisioner = make(workspace.path());
    let lifecycle = drive(&mut provisioner, &inputs, &ctx);
    drop(provisioner);
    drop(provider_file);
    drop(workspace);

    let passed = lifecycle.passed();
    let total_seconds = start.elapsed().as_secs_f64();
    ctx.record(LifecycleEvent::RunCompleted {
        run_id: run_id.clone(),
        passed,
        total_seconds,
    });

    let report = RunReport {
        module: module_dir.display().to_string(),
        module_key,
        run_id,
        fingerprint,
        finished_at: eventlog::now_iso8601(),
        synthesized,
        optional,
        outputs: lifecycle.outputs.clone(),
        reached: lifecycle.reached,
        state: lifecycle.final_state(),
        passed,
        failure: lifecycle.failure.as_ref().map(|e| e.to_string()),
        destroy_error: lifecycle.destroy_error.as_ref().map(|e| e.to_string()),
        duration_seconds: total_seconds,
    };

    if opts.record {
        if let Err(e) = save_report(opts.state_dir, &report) {
            log::warn!("{}: cannot save report: {}", report.module_key, e);
        }
    }
    Ok(report)
}

/// Test several modules, at most `jobs` at a time (0 = one per CPU).
///
/// Results come back in input order.
pub fn run_many<P, F>(
    modules: &[PathBuf],
    opts: &RunOptions,
    jobs: usize,
    make: &F,
) -> Result<Vec<ModuleOutcome>>
where
    P: Provisioner,
    F: Fn(&Path) -> P + Sync,
{
    if !opts.config.isolate {
        check_distinct(modules)?;
    }

    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(jobs)
        .build()
        .map_err(|e| Error::Config(format!("cannot start {} workers: {}", jobs, e)))?;

    let outcomes: Vec<ModuleOutcome> = pool.install(|| {
        modules
            .par_iter()
            .map(|module| ModuleOutcome {
                module: module.clone(),
                result: run_module(module, opts, make),
            })
            .collect()
    });
    Ok(outcomes)
}

/// In-place runs share the module directory; the same one may not appear twice.
fn check_distinct(modules: &[PathBuf]) -> Result<()> {
    let mut seen = HashSet::new();
    for module in modules {
        let key = std::fs::canonicalize(module).unwrap_or_else(|_| module.clone());
        if !seen.insert(key) {
            return Err(Error::Config(format!(
                "{} is listed more than once; enable isolation to test it concurrently",
                module.display()
            )));
        }
    }
    Ok(())
}
