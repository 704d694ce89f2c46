//! EN-006: Input synthesis for required variables.
//!
//! Produces a deterministic, non-empty value per required name. Rules are
//! tried in order (first match wins); unmatched names get
//! `placeholder_prefix + name`. The default policy maps any name containing
//! "location" (case-insensitive) to `eastus` and everything else to
//! `test-<name>`. Values are always strings, whatever the declared type.

use super::error::{Error, Result};
use super::types::{SynthesisConfig, SynthesisRule, PLACEHOLDER_PREFIX};
use indexmap::IndexMap;
use regex::{Regex, RegexBuilder};

/// Compiled synthesis policy.
#[derive(Debug, Clone)]
pub struct Synthesizer {
    rules: Vec<(Regex, String)>,
    placeholder_prefix: String,
}

impl Default for Synthesizer {
    fn default() -> Self {
        // The default rule set is a literal substring; compiling it cannot fail.
        Self::from_config(&SynthesisConfig::default()).unwrap_or_else(|_| Self {
            rules: Vec::new(),
            placeholder_prefix: PLACEHOLDER_PREFIX.to_string(),
        })
    }
}

impl Synthesizer {
    /// Compile a synthesis config.
    pub fn from_config(config: &SynthesisConfig) -> Result<Self> {
        let rules = config
            .rules
            .iter()
            .map(|rule| Ok((compile_rule(rule)?, rule.value.clone())))
            .collect::<Result<Vec<_>>>()?;
        Ok(Self {
            rules,
            placeholder_prefix: config.placeholder_prefix.clone(),
        })
    }

    /// Value for a single required variable.
    pub fn value_for(&self, name: &str) -> String {
        self.rules
            .iter()
            .find(|(pattern, _)| pattern.is_match(name))
            .map(|(_, value)| value.clone())
            .unwrap_or_else(|| format!("{}{}", self.placeholder_prefix, name))
    }

    /// Values for all required variables.
    pub fn synthesize(&self, required: &[String]) -> IndexMap<String, String> {
        required
            .iter()
            .map(|name| (name.clone(), self.value_for(name)))
            .collect()
    }
}

/// Synthesize with the default policy.
pub fn synthesize(required: &[String]) -> IndexMap<String, String> {
    Synthesizer::default().synthesize(required)
}

/// Compile one rule into a case-insensitive matcher.
pub(crate) fn compile_rule(rule: &SynthesisRule) -> Result<Regex> {
    let pattern = match (&rule.contains, &rule.matches) {
        (Some(sub), None) => regex::escape(sub),
        (None, Some(re)) => re.clone(),
        (Some(_), Some(_)) => {
            return Err(Error::Config(format!(
                "synthesis rule for '{}' sets both contains and matches",
                rule.value
            )))
        }
        (None, None) => {
            return Err(Error::Config(format!(
                "synthesis rule for '{}' needs contains or matches",
                rule.value
            )))
        }
    };
    RegexBuilder::new(&pattern)
        .case_insensitive(true)
        .build()
        .map_err(|e| Error::Config(format!("invalid synthesis pattern '{}': {}", pattern, e)))
}
