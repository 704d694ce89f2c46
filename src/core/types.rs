//! EN-001: Shared types: declaration AST, descriptors, harness config,
//! lifecycle states, provenance events, and run reports.
//!
//! Config, event, and report types derive Serialize/Deserialize for YAML and
//! JSONL roundtripping. The declaration AST holds unevaluated `hcl` expressions.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// Region token handed to required variables whose name mentions a location.
pub const DEFAULT_REGION: &str = "eastus";

/// Prefix for placeholder values of required variables.
pub const PLACEHOLDER_PREFIX: &str = "test-";

/// Environment prefix the provisioning tool reads input variables from.
pub const ENV_PREFIX: &str = "TF_VAR_";

/// Provider file staged into the module workspace.
pub const PROVIDER_FILE_NAME: &str = "provider.tf";

/// Default provider file content.
pub const PROVIDER_FILE_CONTENT: &str = r#"
provider "azurerm" {
  features {}
}
"#;

// ============================================================================
// Declaration AST
// ============================================================================

/// One parsed declaration file.
#[derive(Debug, Clone, PartialEq)]
pub struct DeclarationFile {
    /// Path label used in diagnostics
    pub source: PathBuf,

    /// Top-level blocks in source order
    pub blocks: Vec<DeclarationBlock>,
}

impl DeclarationFile {
    /// Iterate over top-level blocks of one kind.
    pub fn blocks_of<'a>(&'a self, kind: &'a str) -> impl Iterator<Item = &'a DeclarationBlock> {
        self.blocks.iter().filter(move |b| b.kind == kind)
    }
}

/// A named, labeled block with unevaluated attributes.
#[derive(Debug, Clone, PartialEq)]
pub struct DeclarationBlock {
    /// Block type (`variable`, `output`, `resource`, ...)
    pub kind: String,

    /// Block labels in order
    pub labels: Vec<String>,

    /// Attributes by name (order-preserving)
    pub attributes: IndexMap<String, hcl::Expression>,

    /// Nested blocks (`validation`, `precondition`, ...)
    pub blocks: Vec<DeclarationBlock>,
}

impl DeclarationBlock {
    /// Look up an attribute expression.
    pub fn attribute(&self, name: &str) -> Option<&hcl::Expression> {
        self.attributes.get(name)
    }
}

// ============================================================================
// Descriptors
// ============================================================================

/// A declared module input.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VariableDescriptor {
    /// Variable name (the block label)
    pub name: String,

    /// Default coerced to a string; None when the variable is required
    #[serde(default)]
    pub default: Option<String>,

    /// Declared type constraint as source text (e.g. `list(string)`)
    #[serde(default)]
    pub declared_type: Option<String>,

    /// Description, when it is a static string
    #[serde(default)]
    pub description: Option<String>,

    /// Marked sensitive
    #[serde(default)]
    pub sensitive: bool,
}

impl VariableDescriptor {
    pub fn has_default(&self) -> bool {
        self.default.is_some()
    }

    /// Whether the declared type is absent or a plain string.
    pub fn is_string_typed(&self) -> bool {
        matches!(self.declared_type.as_deref(), None | Some("string") | Some("any"))
    }
}

/// A declared module output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutputDescriptor {
    /// Output name (the block label)
    pub name: String,

    /// Declaration-time value; None only under [`OutputPolicy::NamesOnly`]
    #[serde(default)]
    pub value: Option<String>,

    /// Marked sensitive
    #[serde(default)]
    pub sensitive: bool,
}

/// Variables partitioned into required and optional.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Classification {
    /// One descriptor per `variable` block, declaration order
    pub variables: Vec<VariableDescriptor>,

    /// Names without a default, declaration order
    pub required: Vec<String>,

    /// Names with a default, mapped to the coerced default
    pub optional_defaults: IndexMap<String, String>,
}

impl Classification {
    pub fn variable(&self, name: &str) -> Option<&VariableDescriptor> {
        self.variables.iter().find(|v| v.name == name)
    }
}

/// Everything the harness learns from a module without running it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModuleInterface {
    pub variables: Classification,
    pub outputs: Vec<OutputDescriptor>,
}

impl ModuleInterface {
    /// Names of the outputs to validate after apply.
    pub fn output_names(&self) -> Vec<String> {
        self.outputs.iter().map(|o| o.name.clone()).collect()
    }
}

// ============================================================================
// Harness configuration (ensayo.yaml)
// ============================================================================

/// Root harness configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HarnessConfig {
    /// Schema version (must be "1.0")
    #[serde(default = "default_version")]
    pub version: String,

    /// Run each invocation against a temporary copy of the module
    #[serde(default = "default_true")]
    pub isolate: bool,

    /// Provider file staged for the duration of the lifecycle
    #[serde(default)]
    pub provider_file: ProviderFileSpec,

    /// Which files hold the declarations and how outputs are read
    #[serde(default)]
    pub declarations: DeclarationFiles,

    /// Input synthesis policy
    #[serde(default)]
    pub synthesis: SynthesisConfig,

    /// Provisioning tool settings
    #[serde(default)]
    pub provisioner: ProvisionerConfig,
}

impl Default for HarnessConfig {
    fn default() -> Self {
        Self {
            version: default_version(),
            isolate: true,
            provider_file: ProviderFileSpec::default(),
            declarations: DeclarationFiles::default(),
            synthesis: SynthesisConfig::default(),
            provisioner: ProvisionerConfig::default(),
        }
    }
}

fn default_version() -> String {
    "1.0".to_string()
}

fn default_true() -> bool {
    true
}

/// Fixed-content provider/credentials file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderFileSpec {
    /// File name inside the module directory
    #[serde(default = "default_provider_name")]
    pub name: String,

    /// File content
    #[serde(default = "default_provider_content")]
    pub content: String,
}

impl Default for ProviderFileSpec {
    fn default() -> Self {
        Self {
            name: default_provider_name(),
            content: default_provider_content(),
        }
    }
}

fn default_provider_name() -> String {
    PROVIDER_FILE_NAME.to_string()
}

fn default_provider_content() -> String {
    PROVIDER_FILE_CONTENT.to_string()
}

/// Declaration file names and output policy.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeclarationFiles {
    #[serde(default = "default_variables_file")]
    pub variables_file: String,

    #[serde(default = "default_outputs_file")]
    pub outputs_file: String,

    #[serde(default)]
    pub outputs: OutputPolicy,
}

impl Default for DeclarationFiles {
    fn default() -> Self {
        Self {
            variables_file: default_variables_file(),
            outputs_file: default_outputs_file(),
            outputs: OutputPolicy::default(),
        }
    }
}

fn default_variables_file() -> String {
    "variables.tf".to_string()
}

fn default_outputs_file() -> String {
    "outputs.tf".to_string()
}

/// How output `value` expressions are treated.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutputPolicy {
    /// Value must evaluate statically
    #[default]
    Static,
    /// Keep the name when the value references runtime state
    NamesOnly,
}

/// Input synthesis policy.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SynthesisConfig {
    /// Prefix for placeholder values (`test-<name>`)
    #[serde(default = "default_placeholder_prefix")]
    pub placeholder_prefix: String,

    /// Ordered name rules; first match wins
    #[serde(default = "default_rules")]
    pub rules: Vec<SynthesisRule>,
}

impl Default for SynthesisConfig {
    fn default() -> Self {
        Self {
            placeholder_prefix: default_placeholder_prefix(),
            rules: default_rules(),
        }
    }
}

fn default_placeholder_prefix() -> String {
    PLACEHOLDER_PREFIX.to_string()
}

fn default_rules() -> Vec<SynthesisRule> {
    vec![SynthesisRule {
        contains: Some("location".to_string()),
        matches: None,
        value: DEFAULT_REGION.to_string(),
    }]
}

/// Maps variable names to a fixed value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SynthesisRule {
    /// Case-insensitive substring of the variable name
    #[serde(default)]
    pub contains: Option<String>,

    /// Regular expression over the variable name
    #[serde(default)]
    pub matches: Option<String>,

    /// Value to synthesize
    pub value: String,
}

/// Provisioning tool settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProvisionerConfig {
    /// Tool binary (name on PATH or absolute path)
    #[serde(default = "default_binary")]
    pub binary: String,

    /// Environment prefix for required inputs
    #[serde(default = "default_env_prefix")]
    pub env_prefix: String,

    /// Follow apply with a plan that must report no changes
    #[serde(default = "default_true")]
    pub verify_idempotent: bool,
}

impl Default for ProvisionerConfig {
    fn default() -> Self {
        Self {
            binary: default_binary(),
            env_prefix: default_env_prefix(),
            verify_idempotent: true,
        }
    }
}

fn default_binary() -> String {
    "terraform".to_string()
}

fn default_env_prefix() -> String {
    ENV_PREFIX.to_string()
}

// ============================================================================
// Lifecycle
// ============================================================================

/// Lifecycle state of one invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LifecycleState {
    Init,
    InputsPrepared,
    Provisioned,
    Validated,
    Destroyed,
    Failed,
}

impl fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Init => write!(f, "INIT"),
            Self::InputsPrepared => write!(f, "INPUTS-PREPARED"),
            Self::Provisioned => write!(f, "PROVISIONED"),
            Self::Validated => write!(f, "VALIDATED"),
            Self::Destroyed => write!(f, "DESTROYED"),
            Self::Failed => write!(f, "FAILED"),
        }
    }
}

// ============================================================================
// Provenance events
// ============================================================================

/// Lifecycle event for the JSONL event log.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum LifecycleEvent {
    RunStarted {
        module: String,
        run_id: String,
        fingerprint: String,
        ensayo_version: String,
    },
    InputsPrepared {
        required: Vec<String>,
        optional: Vec<String>,
    },
    Provisioned {
        duration_seconds: f64,
    },
    OutputValidated {
        output: String,
    },
    LifecycleFailed {
        state: LifecycleState,
        error: String,
    },
    Destroyed {
        duration_seconds: f64,
    },
    DestroyFailed {
        error: String,
    },
    RunCompleted {
        run_id: String,
        passed: bool,
        total_seconds: f64,
    },
}

/// Timestamped event wrapper.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimestampedEvent {
    pub ts: String,
    #[serde(flatten)]
    pub event: LifecycleEvent,
}

// ============================================================================
// Run report
// ============================================================================

/// Persisted summary of one invocation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunReport {
    /// Module directory as given
    pub module: String,

    /// Key used for the state directory
    pub module_key: String,

    pub run_id: String,

    /// BLAKE3 fingerprint of the module directory
    pub fingerprint: String,

    /// When the run finished
    pub finished_at: String,

    /// Synthesized values for required variables
    pub synthesized: IndexMap<String, String>,

    /// Defaults passed for optional variables
    pub optional: IndexMap<String, String>,

    /// Outputs checked after apply, with their resolved values
    pub outputs: IndexMap<String, String>,

    /// Furthest state reached before teardown
    pub reached: LifecycleState,

    /// Final state: Destroyed, or Failed
    pub state: LifecycleState,

    pub passed: bool,

    #[serde(default)]
    pub failure: Option<String>,

    /// Teardown error, reported but not a test failure on its own
    #[serde(default)]
    pub destroy_error: Option<String>,

    pub duration_seconds: f64,
}

// ============================================================================
// Tests
// ============================================================================
