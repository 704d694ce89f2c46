//! EN-002: Declaration parsing.
//!
//! Parses a module's `.tf` source into a [`DeclarationFile`] without
//! evaluating anything:
//! - Content must be UTF-8 and valid HCL
//! - Only blocks are allowed at the top level
//! - Attribute names must be unique within a body
//!
//! Parsing is all-or-nothing: any error discards the whole file.

use super::error::{Error, Result};
use super::types::{DeclarationBlock, DeclarationFile};
use indexmap::IndexMap;
use std::path::Path;

/// Parse a declaration file from disk.
pub fn parse_file(path: &Path) -> Result<DeclarationFile> {
    let content = std::fs::read(path).map_err(|e| Error::Read {
        path: path.to_path_buf(),
        source: e,
    })?;
    parse(&content, path)
}

/// Parse raw file content. `source` is only used to label diagnostics.
pub fn parse(content: &[u8], source: &Path) -> Result<DeclarationFile> {
    let text = std::str::from_utf8(content).map_err(|e| syntax(source, format!("invalid UTF-8: {}", e)))?;
    parse_str(text, source)
}

/// Parse declaration source text.
pub fn parse_str(text: &str, source: &Path) -> Result<DeclarationFile> {
    let body = hcl::parse(text).map_err(|e| syntax(source, e.to_string()))?;

    let mut blocks = Vec::new();
    for structure in body.iter() {
        match structure {
            hcl::Structure::Block(block) => blocks.push(convert_block(block, source)?),
            hcl::Structure::Attribute(attr) => {
                return Err(syntax(
                    source,
                    format!("unexpected top-level attribute '{}'", attr.key()),
                ));
            }
        }
    }

    log::debug!("parsed {} ({} blocks)", source.display(), blocks.len());
    Ok(DeclarationFile {
        source: source.to_path_buf(),
        blocks,
    })
}

fn convert_block(block: &hcl::Block, source: &Path) -> Result<DeclarationBlock> {
    let mut attributes = IndexMap::new();
    let mut blocks = Vec::new();

    for structure in block.body().iter() {
        match structure {
            hcl::Structure::Attribute(attr) => {
                if attributes.contains_key(attr.key()) {
                    return Err(syntax(
                        source,
                        format!(
                            "attribute '{}' redefined in {} block",
                            attr.key(),
                            block.identifier()
                        ),
                    ));
                }
                attributes.insert(attr.key().to_string(), attr.expr().clone());
            }
            hcl::Structure::Block(nested) => blocks.push(convert_block(nested, source)?),
        }
    }

    Ok(DeclarationBlock {
        kind: block.identifier().to_string(),
        labels: block.labels().iter().map(|l| l.as_str().to_string()).collect(),
        attributes,
        blocks,
    })
}

fn syntax(source: &Path, message: String) -> Error {
    Error::Syntax {
        path: source.to_path_buf(),
        message,
    }
}
