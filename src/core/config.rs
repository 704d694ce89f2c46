//! EN-009: Harness configuration: `ensayo.yaml` parsing and validation.
//!
//! Every field has a default, so a missing file and an empty file both mean
//! the built-in defaults. Validation checks:
//! - Version must be "1.0"
//! - Provider file name is a plain file name ending in `.tf`
//! - Declaration file names are non-empty and distinct
//! - Synthesis rules set exactly one of `contains`/`matches` and compile
//! - Placeholder prefix, binary, and env prefix are non-empty

use super::error::{Error, Result};
use super::synthesizer::compile_rule;
use super::types::HarnessConfig;
use std::path::Path;

/// Default config file name, looked up in the working directory.
pub const CONFIG_FILE_NAME: &str = "ensayo.yaml";

/// One problem found by [`validate_config`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigIssue {
    pub message: String,
}

impl std::fmt::Display for ConfigIssue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

/// Parse a config file from disk.
pub fn parse_config_file(path: &Path) -> Result<HarnessConfig> {
    let content = std::fs::read_to_string(path).map_err(|source| Error::Read {
        path: path.to_path_buf(),
        source,
    })?;
    parse_config(&content)
        .map_err(|e| Error::Config(format!("{}: {}", path.display(), e)))
}

/// Parse a config from a string.
pub fn parse_config(yaml: &str) -> Result<HarnessConfig> {
    if yaml.trim().is_empty() {
        return Ok(HarnessConfig::default());
    }
    serde_yaml_ng::from_str(yaml).map_err(|e| Error::Config(format!("YAML parse error: {}", e)))
}

/// Validate a parsed config. Returns a list of issues (empty = valid).
pub fn validate_config(config: &HarnessConfig) -> Vec<ConfigIssue> {
    let mut issues = Vec::new();
    let mut push = |message: String| issues.push(ConfigIssue { message });

    if config.version != "1.0" {
        push(format!("version must be \"1.0\", got \"{}\"", config.version));
    }

    let provider = &config.provider_file.name;
    if provider.is_empty() {
        push("provider_file.name must not be empty".to_string());
    } else if provider.contains('/') || provider.contains('\\') || provider.starts_with('.') {
        push(format!(
            "provider_file.name must be a plain file name, got \"{}\"",
            provider
        ));
    } else if !provider.ends_with(".tf") {
        push(format!("provider_file.name must end in .tf, got \"{}\"", provider));
    }

    let decl = &config.declarations;
    if decl.variables_file.is_empty() {
        push("declarations.variables_file must not be empty".to_string());
    }
    if decl.outputs_file.is_empty() {
        push("declarations.outputs_file must not be empty".to_string());
    }
    if !decl.variables_file.is_empty() && decl.variables_file == decl.outputs_file {
        push(format!(
            "declarations.variables_file and outputs_file are both \"{}\"",
            decl.variables_file
        ));
    }
    if *provider == decl.variables_file || *provider == decl.outputs_file {
        push(format!(
            "provider_file.name \"{}\" would overwrite a declaration file",
            provider
        ));
    }

    if config.synthesis.placeholder_prefix.is_empty() {
        push("synthesis.placeholder_prefix must not be empty".to_string());
    }
    for (i, rule) in config.synthesis.rules.iter().enumerate() {
        if rule.value.is_empty() {
            push(format!("synthesis.rules[{}]: value must not be empty", i));
        }
        if let Err(e) = compile_rule(rule) {
            push(format!("synthesis.rules[{}]: {}", i, e));
        }
    }

    if config.provisioner.binary.trim().is_empty() {
        push("provisioner.binary must not be empty".to_string());
    }
    if config.provisioner.env_prefix.is_empty() {
        push("provisioner.env_prefix must not be empty".to_string());
    }

    issues
}

/// Load the effective config.
///
/// An explicit path must exist. Without one, `ensayo.yaml` in the working
/// directory is used when present, otherwise the defaults.
pub fn load_config(explicit: Option<&Path>) -> Result<HarnessConfig> {
    let config = match explicit {
        Some(path) => parse_config_file(path)?,
        None if Path::new(CONFIG_FILE_NAME).exists() => {
            parse_config_file(Path::new(CONFIG_FILE_NAME))?
        }
        None => HarnessConfig::default(),
    };
    let issues = validate_config(&config);
    if !issues.is_empty() {
        let joined: Vec<String> = issues.iter().map(|i| i.to_string()).collect();
        return Err(Error::Config(joined.join("; ")));
    }
    Ok(config)
}

/// Template written by `ensayo init`.
pub fn template() -> String {
    r#"# ensayo harness configuration
version: "1.0"

# Test a temporary copy of each module (required for parallel runs)
isolate: true

provider_file:
  name: provider.tf
  content: |
    provider "azurerm" {
      features {}
    }

declarations:
  variables_file: variables.tf
  outputs_file: outputs.tf
  # static: output values must be literals; names_only: keep names of
  # outputs that reference resources
  outputs: static

synthesis:
  placeholder_prefix: "test-"
  rules:
    - contains: location
      value: eastus

provisioner:
  binary: terraform
  env_prefix: TF_VAR_
  verify_idempotent: true
"#
    .to_string()
}
