//! EN-011: Terraform CLI provisioner.
//!
//! Invokes the binary directly in the staged module directory:
//! `init` → `apply -auto-approve` → `plan -detailed-exitcode` (idempotence)
//! → `output -json <name>` → `destroy -auto-approve`.
//! Required inputs reach the tool through `TF_VAR_*` environment variables,
//! optional defaults through `-var name=value`.

use super::local::exec_local;
use super::{ConfigurationPayload, ExecOutput, Provisioner};
use crate::core::error::{Error, Result};
use std::path::PathBuf;

/// Exit code of `plan -detailed-exitcode` when changes are pending.
const PLAN_HAS_CHANGES: i32 = 2;

/// Drives a Terraform-compatible binary in one module directory.
#[derive(Debug)]
pub struct TerraformProvisioner {
    binary: String,
    dir: PathBuf,
    payload: ConfigurationPayload,
    initialized: bool,
    verify_idempotent: bool,
}

impl TerraformProvisioner {
    pub fn new(binary: impl Into<String>, dir: impl Into<PathBuf>) -> Self {
        Self {
            binary: binary.into(),
            dir: dir.into(),
            payload: ConfigurationPayload::default(),
            initialized: false,
            verify_idempotent: true,
        }
    }

    /// Skip the post-apply plan check.
    pub fn without_idempotence_check(mut self) -> Self {
        self.verify_idempotent = false;
        self
    }

    /// Run one subcommand with the current payload's environment.
    fn exec(&self, args: Vec<String>) -> Result<ExecOutput> {
        let mut env = self.payload.env.clone();
        env.insert("TF_IN_AUTOMATION".to_string(), "1".to_string());
        exec_local(&self.binary, &args, &self.dir, &env)
    }

    /// Run one subcommand and require a zero exit code.
    fn run(&self, operation: &str, args: Vec<String>) -> Result<ExecOutput> {
        log::info!("{} {} in {}", self.binary, operation, self.dir.display());
        let out = self.exec(args)?;
        if out.success() {
            Ok(out)
        } else {
            Err(Error::provisioning(operation, out.diagnostic()))
        }
    }

    fn ensure_initialized(&mut self) -> Result<()> {
        if !self.initialized {
            self.run("init", init_args())?;
            self.initialized = true;
        }
        Ok(())
    }
}

impl Provisioner for TerraformProvisioner {
    fn apply_idempotent(&mut self, payload: &ConfigurationPayload) -> Result<()> {
        self.payload = payload.clone();
        self.ensure_initialized()?;
        self.run("apply", apply_args(&self.payload))?;
        if !self.verify_idempotent {
            return Ok(());
        }

        let plan = self.exec(plan_args(&self.payload))?;
        match plan.exit_code {
            0 => Ok(()),
            PLAN_HAS_CHANGES => Err(Error::provisioning(
                "idempotence check",
                format!(
                    "a second apply would change resources: {}",
                    plan.stdout.trim()
                ),
            )),
            _ => Err(Error::provisioning("idempotence check", plan.diagnostic())),
        }
    }

    fn output(&mut self, name: &str) -> Result<String> {
        let out = self.run("output", output_args(name))?;
        parse_output_json(&out.stdout)
            .map_err(|e| Error::provisioning("output", format!("output '{}': {}", name, e)))
    }

    fn destroy(&mut self) -> Result<()> {
        self.ensure_initialized()?;
        self.run("destroy", destroy_args(&self.payload))?;
        Ok(())
    }
}

fn init_args() -> Vec<String> {
    ["init", "-input=false", "-no-color"].map(String::from).to_vec()
}

fn with_vars(base: &[&str], payload: &ConfigurationPayload) -> Vec<String> {
    let mut args: Vec<String> = base.iter().map(|s| s.to_string()).collect();
    for (name, value) in &payload.vars {
        args.push("-var".to_string());
        args.push(format!("{}={}", name, value));
    }
    args
}

fn apply_args(payload: &ConfigurationPayload) -> Vec<String> {
    with_vars(&["apply", "-auto-approve", "-input=false", "-no-color"], payload)
}

fn plan_args(payload: &ConfigurationPayload) -> Vec<String> {
    with_vars(&["plan", "-detailed-exitcode", "-input=false", "-no-color"], payload)
}

fn destroy_args(payload: &ConfigurationPayload) -> Vec<String> {
    with_vars(&["destroy", "-auto-approve", "-input=false", "-no-color"], payload)
}

fn output_args(name: &str) -> Vec<String> {
    ["output", "-no-color", "-json", name].map(String::from).to_vec()
}

/// Decode `terraform output -json <name>`.
///
/// Strings come back unquoted, null becomes empty, anything else stays JSON.
pub fn parse_output_json(raw: &str) -> std::result::Result<String, serde_json::Error> {
    let value: serde_json::Value = serde_json::from_str(raw.trim())?;
    Ok(match value {
        serde_json::Value::String(s) => s,
        serde_json::Value::Null => String::new(),
        other => other.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    fn payload() -> ConfigurationPayload {
        let mut p = ConfigurationPayload::default();
        p.env.insert("TF_VAR_resource_group_name".into(), "test-resource_group_name".into());
        p.vars.insert("sku".into(), "Standard".into());
        p.vars.insert("replicas".into(), "2".into());
        p
    }

    #[test]
    fn test_en011_apply_args() {
        let args = apply_args(&payload());
        assert_eq!(
            args,
            vec![
                "apply",
                "-auto-approve",
                "-input=false",
                "-no-color",
                "-var",
                "sku=Standard",
                "-var",
                "replicas=2"
            ]
        );
    }

    #[test]
    fn test_en011_env_not_in_args() {
        let args = destroy_args(&payload());
        assert!(args.iter().all(|a| !a.contains("resource_group_name")));
        assert_eq!(args[0], "destroy");
    }

    #[test]
    fn test_en011_plan_and_output_args() {
        assert!(plan_args(&ConfigurationPayload::default()).contains(&"-detailed-exitcode".to_string()));
        assert_eq!(output_args("id"), vec!["output", "-no-color", "-json", "id"]);
        assert_eq!(init_args(), vec!["init", "-input=false", "-no-color"]);
    }

    #[test]
    fn test_en011_parse_output_json() {
        assert_eq!(parse_output_json("\"/subscriptions/x/resourceGroups/rg\"\n").unwrap(), "/subscriptions/x/resourceGroups/rg");
        assert_eq!(parse_output_json("null").unwrap(), "");
        assert_eq!(parse_output_json("\"\"").unwrap(), "");
        assert_eq!(parse_output_json("3").unwrap(), "3");
        assert_eq!(parse_output_json("[\"a\",\"b\"]").unwrap(), "[\"a\",\"b\"]");
        assert!(parse_output_json("not json").is_err());
    }

    #[cfg(unix)]
    mod fake_binary {
        use super::*;
        use std::os::unix::fs::PermissionsExt;

        const FAKE: &str = r#"#!/bin/sh
here="$(dirname "$0")"
echo "$1 $TF_VAR_resource_group_name" >> "$here/calls.log"
case "$1" in
  init) exit 0 ;;
  apply) exit 0 ;;
  plan) exit "${FAKE_PLAN_EXIT:-0}" ;;
  output) printf '"id-for-%s"' "$4" ;;
  destroy) exit "${FAKE_DESTROY_EXIT:-0}" ;;
  *) exit 99 ;;
esac
"#;

        fn install() -> (tempfile::TempDir, PathBuf) {
            let dir = tempfile::tempdir().unwrap();
            let bin = dir.path().join("terraform");
            std::fs::write(&bin, FAKE).unwrap();
            std::fs::set_permissions(&bin, std::fs::Permissions::from_mode(0o755)).unwrap();
            (dir, bin)
        }

        fn calls(dir: &Path) -> Vec<String> {
            std::fs::read_to_string(dir.join("calls.log"))
                .unwrap_or_default()
                .lines()
                .map(str::to_string)
                .collect()
        }

        #[test]
        fn test_en011_full_cycle() {
            let (dir, bin) = install();
            let mut tf = TerraformProvisioner::new(bin.to_string_lossy(), dir.path());
            tf.apply_idempotent(&payload()).unwrap();
            assert_eq!(tf.output("resource_group_id").unwrap(), "id-for-resource_group_id");
            tf.destroy().unwrap();

            let log = calls(dir.path());
            assert_eq!(
                log,
                vec![
                    "init test-resource_group_name",
                    "apply test-resource_group_name",
                    "plan test-resource_group_name",
                    "output test-resource_group_name",
                    "destroy test-resource_group_name",
                ]
            );
        }

        #[test]
        fn test_en011_plan_drift_is_not_idempotent() {
            let (dir, bin) = install();
            let mut tf = TerraformProvisioner::new(bin.to_string_lossy(), dir.path());
            let mut p = payload();
            p.env.insert("FAKE_PLAN_EXIT".into(), "2".into());
            let err = tf.apply_idempotent(&p).unwrap_err();
            match err {
                Error::Provisioning { operation, message } => {
                    assert_eq!(operation, "idempotence check");
                    assert!(message.contains("second apply"));
                }
                other => panic!("expected provisioning error, got {:?}", other),
            }
        }

        #[test]
        fn test_en011_idempotence_check_disabled() {
            let (dir, bin) = install();
            let mut tf =
                TerraformProvisioner::new(bin.to_string_lossy(), dir.path()).without_idempotence_check();
            let mut p = payload();
            p.env.insert("FAKE_PLAN_EXIT".into(), "2".into());
            tf.apply_idempotent(&p).unwrap();
            assert!(calls(dir.path()).iter().all(|c| !c.starts_with("plan")));
        }

        #[test]
        fn test_en011_destroy_failure() {
            let (dir, bin) = install();
            let mut tf = TerraformProvisioner::new(bin.to_string_lossy(), dir.path());
            let mut p = payload();
            p.env.insert("FAKE_DESTROY_EXIT".into(), "1".into());
            tf.apply_idempotent(&p).unwrap();
            let err = tf.destroy().unwrap_err();
            assert!(matches!(err, Error::Provisioning { ref operation, .. } if operation == "destroy"));
        }

        #[test]
        fn test_en011_destroy_without_apply_initializes() {
            let (dir, bin) = install();
            let mut tf = TerraformProvisioner::new(bin.to_string_lossy(), dir.path());
            tf.destroy().unwrap();
            let log = calls(dir.path());
            assert_eq!(log.len(), 2);
            assert!(log[0].starts_with("init"));
            assert!(log[1].starts_with("destroy"));
        }
    }
}
