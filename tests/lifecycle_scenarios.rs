//! End-to-end scenarios against scripted provisioners and a fake `terraform`.

use ensayo::core::error::{Error, Result};
use ensayo::core::harness::{run_many, run_module, RunOptions};
use ensayo::core::types::{HarnessConfig, LifecycleState};
use ensayo::provenance::eventlog;
use ensayo::provision::{ConfigurationPayload, Provisioner};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

const RG_VARIABLES: &str = r#"
variable "resource_group_name" {
  type        = string
  description = "Name of the resource group"
}

variable "resource_group_location" {
  type = string
}

variable "tags_owner" {
  type    = string
  default = "platform"
}
"#;

const RG_OUTPUTS: &str = r#"
output "resource_group_id" {
  value = "declared"
}
"#;

fn write_module(dir: &Path, variables: &str, outputs: &str) {
    std::fs::create_dir_all(dir).unwrap();
    std::fs::write(dir.join("variables.tf"), variables).unwrap();
    std::fs::write(dir.join("outputs.tf"), outputs).unwrap();
    std::fs::write(dir.join("main.tf"), "resource \"azurerm_resource_group\" \"rg\" {}\n").unwrap();
}

#[derive(Debug, Clone, Default)]
struct Seen {
    calls: Vec<String>,
    payload: Option<ConfigurationPayload>,
    provider_at_apply: bool,
    dir: PathBuf,
}

/// Scripted provisioner; everything it observes lands in `seen`.
struct Scripted {
    dir: PathBuf,
    seen: Arc<Mutex<Seen>>,
    fail_apply: bool,
    output_value: String,
}

impl Provisioner for Scripted {
    fn apply_idempotent(&mut self, payload: &ConfigurationPayload) -> Result<()> {
        let mut seen = self.seen.lock().unwrap();
        seen.calls.push("apply".to_string());
        seen.payload = Some(payload.clone());
        seen.provider_at_apply = self.dir.join("provider.tf").exists();
        seen.dir = self.dir.clone();
        if self.fail_apply {
            return Err(Error::Provisioning {
                operation: "apply".to_string(),
                message: "subscription not found".to_string(),
            });
        }
        Ok(())
    }

    fn output(&mut self, name: &str) -> Result<String> {
        self.seen.lock().unwrap().calls.push(format!("output {}", name));
        Ok(self.output_value.clone())
    }

    fn destroy(&mut self) -> Result<()> {
        self.seen.lock().unwrap().calls.push("destroy".to_string());
        Ok(())
    }
}

fn opts<'a>(config: &'a HarnessConfig, state: &'a Path) -> RunOptions<'a> {
    RunOptions {
        config,
        state_dir: state,
        record: true,
    }
}

#[test]
fn scenario_a_required_inputs_synthesized_and_outputs_checked() {
    let root = tempfile::tempdir().unwrap();
    let module = root.path().join("resource_group");
    write_module(&module, RG_VARIABLES, RG_OUTPUTS);
    let state = root.path().join("state");
    let config = HarnessConfig::default();

    let seen = Arc::new(Mutex::new(Seen::default()));
    let make = |dir: &Path| Scripted {
        dir: dir.to_path_buf(),
        seen: Arc::clone(&seen),
        fail_apply: false,
        output_value: "/subscriptions/0000/resourceGroups/test-resource_group_name".to_string(),
    };
    let report = run_module(&module, &opts(&config, &state), &make).unwrap();

    assert!(report.passed);
    assert_eq!(report.reached, LifecycleState::Validated);
    assert_eq!(report.state, LifecycleState::Destroyed);
    assert_eq!(report.synthesized["resource_group_name"], "test-resource_group_name");
    assert_eq!(report.synthesized["resource_group_location"], "eastus");
    assert_eq!(report.optional["tags_owner"], "platform");

    let seen = seen.lock().unwrap();
    assert_eq!(seen.calls, vec!["apply", "output resource_group_id", "destroy"]);
    assert!(seen.provider_at_apply);
    let payload = seen.payload.as_ref().unwrap();
    assert_eq!(payload.env["TF_VAR_resource_group_name"], "test-resource_group_name");
    assert_eq!(payload.env["TF_VAR_resource_group_location"], "eastus");
    assert_eq!(payload.vars["tags_owner"], "platform");
    assert!(!payload.env.contains_key("TF_VAR_tags_owner"));

    // The isolated copy is gone and the source never had a provider file.
    assert!(!seen.dir.exists());
    assert!(!module.join("provider.tf").exists());

    let events = eventlog::read_events(&state, &report.module_key).unwrap();
    assert!(events.len() >= 6);
}

#[test]
fn scenario_a_empty_output_still_destroyed() {
    let root = tempfile::tempdir().unwrap();
    let module = root.path().join("rg");
    write_module(&module, RG_VARIABLES, RG_OUTPUTS);
    let config = HarnessConfig::default();

    let seen = Arc::new(Mutex::new(Seen::default()));
    let make = |dir: &Path| Scripted {
        dir: dir.to_path_buf(),
        seen: Arc::clone(&seen),
        fail_apply: false,
        output_value: String::new(),
    };
    let report = run_module(&module, &opts(&config, &root.path().join("state")), &make).unwrap();

    assert!(!report.passed);
    assert!(report
        .failure
        .as_deref()
        .unwrap()
        .contains("output 'resource_group_id' should not be empty"));
    assert_eq!(seen.lock().unwrap().calls.last().map(String::as_str), Some("destroy"));
}

#[test]
fn scenario_b_two_labels_rejected_without_side_effects() {
    let root = tempfile::tempdir().unwrap();
    let module = root.path().join("bad");
    write_module(
        &module,
        "variable \"resource_group_name\" \"extra\" {\n  type = string\n}\n",
        RG_OUTPUTS,
    );
    let state = root.path().join("state");
    let config = HarnessConfig {
        isolate: false,
        ..HarnessConfig::default()
    };

    let seen = Arc::new(Mutex::new(Seen::default()));
    let make = |dir: &Path| Scripted {
        dir: dir.to_path_buf(),
        seen: Arc::clone(&seen),
        fail_apply: false,
        output_value: "x".to_string(),
    };
    let err = run_module(&module, &opts(&config, &state), &make).unwrap_err();

    assert!(matches!(err, Error::MalformedDeclaration { .. }));
    assert!(seen.lock().unwrap().calls.is_empty());
    assert!(!module.join("provider.tf").exists());
    assert!(!state.exists());
}

#[test]
fn scenario_c_apply_failure_destroys_once() {
    let root = tempfile::tempdir().unwrap();
    let module = root.path().join("rg");
    write_module(&module, RG_VARIABLES, RG_OUTPUTS);
    let config = HarnessConfig::default();

    let seen = Arc::new(Mutex::new(Seen::default()));
    let make = |dir: &Path| Scripted {
        dir: dir.to_path_buf(),
        seen: Arc::clone(&seen),
        fail_apply: true,
        output_value: "x".to_string(),
    };
    let report = run_module(&module, &opts(&config, &root.path().join("state")), &make).unwrap();

    assert!(!report.passed);
    assert_eq!(report.state, LifecycleState::Failed);
    assert_eq!(report.reached, LifecycleState::InputsPrepared);
    assert!(report.failure.as_deref().unwrap().contains("subscription not found"));
    let seen = seen.lock().unwrap();
    assert_eq!(seen.calls, vec!["apply", "destroy"]);
}

#[test]
fn parallel_invocations_are_isolated() {
    let root = tempfile::tempdir().unwrap();
    let a = root.path().join("network");
    let b = root.path().join("storage");
    write_module(&a, "variable \"vnet_name\" {}\nvariable \"location\" {}\n", "output \"vnet_id\" {\n  value = \"v\"\n}\n");
    write_module(&b, "variable \"account_name\" {}\n", "output \"account_id\" {\n  value = \"a\"\n}\n");
    let config = HarnessConfig::default();
    let state = root.path().join("state");

    // One log per module directory, keyed by the variable it declares.
    let seen_a = Arc::new(Mutex::new(Seen::default()));
    let seen_b = Arc::new(Mutex::new(Seen::default()));
    let make = |dir: &Path| {
        let vars = std::fs::read_to_string(dir.join("variables.tf")).unwrap();
        let seen = if vars.contains("vnet_name") { &seen_a } else { &seen_b };
        Scripted {
            dir: dir.to_path_buf(),
            seen: Arc::clone(seen),
            fail_apply: false,
            output_value: "ok".to_string(),
        }
    };

    let outcomes = run_many(&[a.clone(), b.clone()], &opts(&config, &state), 2, &make).unwrap();
    assert!(outcomes.iter().all(|o| o.passed()));

    let sa = seen_a.lock().unwrap();
    let sb = seen_b.lock().unwrap();
    assert_ne!(sa.dir, sb.dir);
    assert_ne!(sa.dir, a);
    assert_ne!(sb.dir, b);
    assert!(sa.provider_at_apply && sb.provider_at_apply);

    let pa = sa.payload.as_ref().unwrap();
    let pb = sb.payload.as_ref().unwrap();
    assert_eq!(pa.env.len(), 2);
    assert_eq!(pa.env["TF_VAR_location"], "eastus");
    assert_eq!(pb.env.len(), 1);
    assert_eq!(pb.env["TF_VAR_account_name"], "test-account_name");
    assert!(!pb.env.contains_key("TF_VAR_vnet_name"));

    assert!(!a.join("provider.tf").exists());
    assert!(!b.join("provider.tf").exists());
    assert_ne!(outcomes[0].result.as_ref().unwrap().module_key, outcomes[1].result.as_ref().unwrap().module_key);
}

#[cfg(unix)]
mod fake_terraform {
    use super::*;
    use ensayo::provision::terraform::TerraformProvisioner;
    use std::os::unix::fs::PermissionsExt;

    /// Logs each call with the inputs it saw, into a file next to itself.
    const SCRIPT: &str = r#"#!/bin/sh
log="$(dirname "$0")/calls.log"
echo "$1 cwd=$(basename "$PWD") provider=$(test -f provider.tf && echo yes || echo no) rg=$TF_VAR_resource_group_name loc=$TF_VAR_resource_group_location args=$*" >> "$log"
case "$1" in
  init|apply|destroy) exit 0 ;;
  plan) exit 0 ;;
  output) printf '"/subscriptions/0000/resourceGroups/%s"\n' "$TF_VAR_resource_group_name" ;;
  *) exit 1 ;;
esac
"#;

    #[test]
    fn full_lifecycle_through_terraform_cli() {
        let root = tempfile::tempdir().unwrap();
        let bin_dir = root.path().join("bin");
        std::fs::create_dir_all(&bin_dir).unwrap();
        let bin = bin_dir.join("terraform");
        std::fs::write(&bin, SCRIPT).unwrap();
        std::fs::set_permissions(&bin, std::fs::Permissions::from_mode(0o755)).unwrap();

        let module = root.path().join("rg");
        write_module(&module, RG_VARIABLES, RG_OUTPUTS);
        let mut config = HarnessConfig::default();
        config.provisioner.binary = bin.to_string_lossy().to_string();
        let state = root.path().join("state");

        let binary = config.provisioner.binary.clone();
        let make = move |dir: &Path| TerraformProvisioner::new(binary.clone(), dir);
        let report = run_module(&module, &opts(&config, &state), &make).unwrap();

        assert!(report.passed, "{:?}", report.failure);
        assert_eq!(report.state, LifecycleState::Destroyed);
        assert_eq!(
            report.outputs["resource_group_id"],
            "/subscriptions/0000/resourceGroups/test-resource_group_name"
        );

        let log = std::fs::read_to_string(bin_dir.join("calls.log")).unwrap();
        let lines: Vec<&str> = log.lines().collect();
        let verbs: Vec<&str> = lines.iter().map(|l| l.split(' ').next().unwrap()).collect();
        assert_eq!(verbs, vec!["init", "apply", "plan", "output", "destroy"]);
        for line in &lines {
            assert!(line.contains("provider=yes"), "{}", line);
            assert!(line.contains("rg=test-resource_group_name"), "{}", line);
            assert!(line.contains("loc=eastus"), "{}", line);
        }
        assert!(lines[1].contains("-var tags_owner=platform"));
        assert!(lines[4].contains("-var tags_owner=platform"));
        assert!(!module.join("provider.tf").exists());
    }
}
