//! EN-017: CLI subcommands: init, inspect, inputs, test, status.

use crate::core::error::{Error, Result};
use crate::core::harness::{self, ModuleOutcome, RunOptions};
use crate::core::lifecycle::prepare_payload;
use crate::core::types::{HarnessConfig, ModuleInterface, RunReport};
use crate::core::{config, report};
use crate::provision::terraform::TerraformProvisioner;
use clap::{Subcommand, ValueEnum};
use std::path::{Path, PathBuf};

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Write an ensayo.yaml template and a state directory
    Init {
        /// Directory to initialize (default: current)
        #[arg(default_value = ".")]
        path: PathBuf,
    },

    /// Show a module's required inputs, optional defaults, and outputs
    Inspect {
        /// Module directory
        #[arg(env = "MODULE_PATH")]
        module: PathBuf,

        /// Path to ensayo.yaml
        #[arg(short, long)]
        config: Option<PathBuf>,
    },

    /// Print the inputs a test run would pass, without running anything
    Inputs {
        /// Module directory
        #[arg(env = "MODULE_PATH")]
        module: PathBuf,

        /// Path to ensayo.yaml
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Output format
        #[arg(long, value_enum, default_value_t = InputsFormat::Env)]
        format: InputsFormat,
    },

    /// Apply each module, check its outputs, destroy it
    Test {
        /// Module directories
        #[arg(env = "MODULE_PATH", required = true, num_args = 1..)]
        modules: Vec<PathBuf>,

        /// Path to ensayo.yaml
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Provisioning tool binary (overrides the config)
        #[arg(long)]
        terraform: Option<String>,

        /// State directory
        #[arg(long, default_value = "state")]
        state_dir: PathBuf,

        /// Modules tested at once (0 = one per CPU)
        #[arg(short, long, default_value_t = 1)]
        jobs: usize,

        /// Run in the module directory instead of a temporary copy
        #[arg(long)]
        no_isolate: bool,

        /// Skip the post-apply plan check
        #[arg(long)]
        skip_idempotence: bool,

        /// Do not write events or reports
        #[arg(long)]
        no_record: bool,
    },

    /// Show the last test run of each module
    Status {
        /// State directory
        #[arg(long, default_value = "state")]
        state_dir: PathBuf,

        /// Only modules whose key or path contains this
        #[arg(short, long)]
        module: Option<String>,
    },
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputsFormat {
    /// `TF_VAR_name=value` lines, then `-var` arguments
    Env,
    /// JSON object with `env` and `vars`
    Json,
}

/// Dispatch a CLI command.
pub fn dispatch(cmd: Commands) -> Result<()> {
    match cmd {
        Commands::Init { path } => cmd_init(&path),
        Commands::Inspect { module, config } => cmd_inspect(&module, config.as_deref()),
        Commands::Inputs {
            module,
            config,
            format,
        } => cmd_inputs(&module, config.as_deref(), format),
        Commands::Test {
            modules,
            config,
            terraform,
            state_dir,
            jobs,
            no_isolate,
            skip_idempotence,
            no_record,
        } => {
            let overrides = Overrides {
                terraform,
                no_isolate,
                skip_idempotence,
            };
            cmd_test(
                &modules,
                config.as_deref(),
                &overrides,
                &state_dir,
                jobs,
                !no_record,
            )
        }
        Commands::Status { state_dir, module } => cmd_status(&state_dir, module.as_deref()),
    }
}

/// Command-line settings that win over ensayo.yaml.
#[derive(Debug, Default)]
struct Overrides {
    terraform: Option<String>,
    no_isolate: bool,
    skip_idempotence: bool,
}

fn effective_config(file: Option<&Path>, overrides: &Overrides) -> Result<HarnessConfig> {
    let mut config = config::load_config(file)?;
    if let Some(ref binary) = overrides.terraform {
        config.provisioner.binary = binary.clone();
    }
    if overrides.no_isolate {
        config.isolate = false;
    }
    if overrides.skip_idempotence {
        config.provisioner.verify_idempotent = false;
    }
    Ok(config)
}

fn cmd_init(path: &Path) -> Result<()> {
    let config_path = path.join(config::CONFIG_FILE_NAME);
    if config_path.exists() {
        return Err(Error::Config(format!(
            "{} already exists",
            config_path.display()
        )));
    }

    let state_dir = path.join("state");
    std::fs::create_dir_all(&state_dir)?;
    std::fs::write(&config_path, config::template())?;

    println!("Initialized ensayo at {}", path.display());
    println!("  Created: {}", config_path.display());
    println!("  Created: {}/", state_dir.display());
    Ok(())
}

fn cmd_inspect(module: &Path, file: Option<&Path>) -> Result<()> {
    let config = effective_config(file, &Overrides::default())?;
    let iface = harness::inspect_module(module, &config)?;
    print_interface(module, &iface);
    Ok(())
}

fn print_interface(module: &Path, iface: &ModuleInterface) {
    let vars = &iface.variables;
    println!("Module: {}", module.display());

    println!("  Required ({}):", vars.required.len());
    for name in &vars.required {
        let declared = vars
            .variable(name)
            .and_then(|v| v.declared_type.as_deref())
            .map(|t| format!(" [{}]", t))
            .unwrap_or_default();
        println!("    {}{}", name, declared);
    }

    println!("  Optional ({}):", vars.optional_defaults.len());
    for (name, default) in &vars.optional_defaults {
        let sensitive = vars.variable(name).map(|v| v.sensitive).unwrap_or(false);
        let shown = if sensitive { "(sensitive)" } else { default.as_str() };
        println!("    {} = {:?}", name, shown);
    }

    println!("  Outputs ({}):", iface.outputs.len());
    for output in &iface.outputs {
        println!("    {}", output.name);
    }

    for (name, declared) in harness::type_gaps(iface) {
        println!(
            "  warning: '{}' is {} but will receive a string placeholder",
            name, declared
        );
    }
}

fn cmd_inputs(module: &Path, file: Option<&Path>, format: InputsFormat) -> Result<()> {
    let config = effective_config(file, &Overrides::default())?;
    let iface = harness::inspect_module(module, &config)?;
    let synthesized = harness::synthesize_inputs(&iface, &config)?;
    let payload = prepare_payload(
        &module.join(&config.declarations.variables_file),
        &synthesized,
        &iface.variables.optional_defaults,
        &config.provisioner.env_prefix,
    )?;

    match format {
        InputsFormat::Env => {
            for (key, value) in &payload.env {
                println!("{}={}", key, value);
            }
            for (name, value) in &payload.vars {
                println!("-var {}={}", name, value);
            }
        }
        InputsFormat::Json => {
            let doc = serde_json::json!({
                "env": payload.env,
                "vars": payload.vars,
            });
            let text = serde_json::to_string_pretty(&doc)
                .map_err(|e| Error::Config(format!("cannot serialize inputs: {}", e)))?;
            println!("{}", text);
        }
    }
    Ok(())
}

fn cmd_test(
    modules: &[PathBuf],
    file: Option<&Path>,
    overrides: &Overrides,
    state_dir: &Path,
    jobs: usize,
    record: bool,
) -> Result<()> {
    let config = effective_config(file, overrides)?;
    let opts = RunOptions {
        config: &config,
        state_dir,
        record,
    };
    let binary = config.provisioner.binary.clone();
    let verify = config.provisioner.verify_idempotent;
    let make = move |dir: &Path| {
        let tf = TerraformProvisioner::new(binary.clone(), dir);
        if verify {
            tf
        } else {
            tf.without_idempotence_check()
        }
    };

    let outcomes = harness::run_many(modules, &opts, jobs, &make)?;
    for outcome in &outcomes {
        print_outcome(outcome);
    }

    let failed = outcomes.iter().filter(|o| !o.passed()).count();
    println!();
    if failed > 0 {
        println!(
            "Test completed with errors: {} passed, {} FAILED",
            outcomes.len() - failed,
            failed
        );
        return Err(Error::TestsFailed {
            failed,
            total: outcomes.len(),
        });
    }
    println!("Test complete: {} passed.", outcomes.len());
    Ok(())
}

fn print_outcome(outcome: &ModuleOutcome) {
    match &outcome.result {
        Ok(report) => {
            let verdict = if report.passed { "PASS" } else { "FAIL" };
            println!(
                "{}: {} (reached {}, {}, {:.1}s)",
                outcome.module.display(),
                verdict,
                report.reached,
                report.state,
                report.duration_seconds
            );
            if let Some(ref failure) = report.failure {
                println!("  error: {}", failure);
            }
            if let Some(ref teardown) = report.destroy_error {
                println!("  teardown: {}", teardown);
            }
        }
        Err(e) => {
            let phase = if e.is_declaration_error() {
                "declarations"
            } else {
                "setup"
            };
            println!("{}: FAIL ({}, not provisioned)", outcome.module.display(), phase);
            println!("  error: {}", e);
        }
    }
}

fn cmd_status(state_dir: &Path, filter: Option<&str>) -> Result<()> {
    let reports: Vec<RunReport> = report::list_reports(state_dir)?
        .into_iter()
        .filter(|r| filter.is_none_or(|f| r.module_key.contains(f) || r.module.contains(f)))
        .collect();

    if reports.is_empty() {
        println!("No runs found. Run `ensayo test` first.");
        return Ok(());
    }

    for r in &reports {
        let verdict = if r.passed { "PASS" } else { "FAIL" };
        println!("Module: {} ({})", r.module, r.module_key);
        println!("  Run: {} at {}", r.run_id, r.finished_at);
        println!(
            "  Result: {} [{} → {}] ({:.2}s)",
            verdict, r.reached, r.state, r.duration_seconds
        );
        println!("  Fingerprint: {}", r.fingerprint);
        println!("  Inputs: {} synthesized, {} defaults", r.synthesized.len(), r.optional.len());
        println!("  Outputs checked: {}", r.outputs.len());
        for name in r.outputs.keys() {
            println!("    {}", name);
        }
        if let Some(ref failure) = r.failure {
            println!("  Error: {}", failure);
        }
        if let Some(ref teardown) = r.destroy_error {
            println!("  Teardown: {}", teardown);
        }
        println!();
    }
    Ok(())
}
