//! EN-005: Output collection.
//!
//! Walks `output` blocks only. The collected values are declaration-time
//! placeholders; after apply only the names matter.

use super::classifier::single_label;
use super::error::{Error, Result};
use super::literal::evaluate_literal;
use super::types::{DeclarationFile, OutputDescriptor, OutputPolicy};

const KIND: &str = "output";

/// Collect the outputs declared in a file.
///
/// Fails on the first bad block; no partial list is returned.
pub fn collect_outputs(file: &DeclarationFile, policy: OutputPolicy) -> Result<Vec<OutputDescriptor>> {
    let mut outputs: Vec<OutputDescriptor> = Vec::new();

    for block in file.blocks_of(KIND) {
        let name = single_label(block, &file.source)?;

        if outputs.iter().any(|o| o.name == name) {
            return Err(Error::MalformedDeclaration {
                path: file.source.clone(),
                kind: KIND.to_string(),
                message: format!("output '{}' declared more than once", name),
            });
        }

        let expr = block.attribute("value").ok_or_else(|| Error::MissingValue {
            path: file.source.clone(),
            name: name.clone(),
        })?;

        let value = match (evaluate_literal(expr), policy) {
            (Ok(literal), _) => {
                let value = literal
                    .to_display_string()
                    .map_err(|unsupported| Error::UnsupportedDefaultType {
                        kind: KIND.to_string(),
                        name: name.clone(),
                        type_name: unsupported.0,
                    })?;
                Some(value)
            }
            (Err(_), OutputPolicy::NamesOnly) => None,
            (Err(message), OutputPolicy::Static) => {
                return Err(Error::UnevaluableOutput { name, message });
            }
        };

        let sensitive = block
            .attribute("sensitive")
            .and_then(|expr| evaluate_literal(expr).ok())
            .and_then(|lit| lit.as_bool())
            .unwrap_or(false);

        outputs.push(OutputDescriptor {
            name,
            value,
            sensitive,
        });
    }

    log::debug!("{}: {} outputs", file.source.display(), outputs.len());
    Ok(outputs)
}
