//! EN-004: Variable classification: required vs. optional-with-default.
//!
//! Walks `variable` blocks only; every other block kind is skipped. Each
//! variable lands in exactly one of `required` or `optional_defaults`.

use super::error::{Error, Result};
use super::literal::evaluate_literal;
use super::types::{Classification, DeclarationBlock, DeclarationFile, VariableDescriptor};
use std::path::Path;

const KIND: &str = "variable";

/// Classify the variables declared in a file.
pub fn classify(file: &DeclarationFile) -> Result<Classification> {
    let mut classification = Classification::default();

    for block in file.blocks_of(KIND) {
        let descriptor = describe_variable(block, &file.source)?;

        if classification.variable(&descriptor.name).is_some() {
            return Err(Error::MalformedDeclaration {
                path: file.source.clone(),
                kind: KIND.to_string(),
                message: format!("variable '{}' declared more than once", descriptor.name),
            });
        }

        match descriptor.default {
            Some(ref value) => {
                classification
                    .optional_defaults
                    .insert(descriptor.name.clone(), value.clone());
            }
            None => classification.required.push(descriptor.name.clone()),
        }
        classification.variables.push(descriptor);
    }

    log::debug!(
        "{}: {} required, {} optional",
        file.source.display(),
        classification.required.len(),
        classification.optional_defaults.len()
    );
    Ok(classification)
}

/// Build the descriptor for one `variable` block.
fn describe_variable(block: &DeclarationBlock, source: &Path) -> Result<VariableDescriptor> {
    let name = single_label(block, source)?;

    let default = match block.attribute("default") {
        Some(expr) => {
            let literal = evaluate_literal(expr).map_err(|message| Error::UnevaluableDefault {
                name: name.clone(),
                message,
            })?;
            let value = literal
                .to_display_string()
                .map_err(|unsupported| Error::UnsupportedDefaultType {
                    kind: KIND.to_string(),
                    name: name.clone(),
                    type_name: unsupported.0,
                })?;
            Some(value)
        }
        None => None,
    };

    // Informational attributes never fail the classification.
    let declared_type = block.attribute("type").map(|expr| expr.to_string());
    let description = block
        .attribute("description")
        .and_then(|expr| evaluate_literal(expr).ok())
        .and_then(|lit| lit.as_str().map(str::to_string));
    let sensitive = block
        .attribute("sensitive")
        .and_then(|expr| evaluate_literal(expr).ok())
        .and_then(|lit| lit.as_bool())
        .unwrap_or(false);

    Ok(VariableDescriptor {
        name,
        default,
        declared_type,
        description,
        sensitive,
    })
}

/// The block's only label, or a malformed-declaration error.
pub(crate) fn single_label(block: &DeclarationBlock, source: &Path) -> Result<String> {
    match block.labels.as_slice() {
        [name] => Ok(name.clone()),
        labels => Err(Error::MalformedDeclaration {
            path: source.to_path_buf(),
            kind: block.kind.clone(),
            message: format!(
                "{} block should have exactly one label (name), found {}: {:?}",
                block.kind,
                labels.len(),
                labels
            ),
        }),
    }
}
