use std::path::Path;

use serde_json::Value;

use super::{kind_of, Document};
use crate::config::IdSource;
use crate::error::IdResolutionError;

/// Separator placed between values pulled from multiple id fields.
pub const ID_SEPARATOR: &str = "_";

/// Computes the document id for a staged file.
///
/// `original_name` is the file name as it was dropped into staging. With
/// [`IdSource::Filename`] the id is that name minus its final extension. With
/// [`IdSource::Fields`] each path (`a/b/c`, or a JSON pointer) is looked up in
/// `document` and the scalar values found are joined with [`ID_SEPARATOR`];
/// missing, null and empty-string values are skipped.
pub fn resolve_id(
    source: &IdSource,
    original_name: &str,
    document: &Document,
) -> Result<String, IdResolutionError> {
    match source {
        IdSource::Filename => id_from_filename(original_name),
        IdSource::Fields { fields } => id_from_fields(fields, document),
    }
}

fn id_from_filename(original_name: &str) -> Result<String, IdResolutionError> {
    let stem = Path::new(original_name)
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or_default();

    if stem.is_empty() {
        return Err(IdResolutionError::EmptyFilename(original_name.to_string()));
    }
    Ok(stem.to_string())
}

fn id_from_fields(fields: &[String], document: &Document) -> Result<String, IdResolutionError> {
    let mut parts = Vec::with_capacity(fields.len());

    for field in fields {
        let Some(value) = lookup(document, field) else {
            continue;
        };

        match value {
            Value::Null => {}
            Value::String(s) if s.is_empty() => {}
            Value::String(s) => parts.push(s.clone()),
            Value::Number(n) => parts.push(n.to_string()),
            Value::Bool(b) => parts.push(b.to_string()),
            other => {
                return Err(IdResolutionError::NotScalar {
                    field: field.clone(),
                    found: kind_of(other),
                })
            }
        }
    }

    if parts.is_empty() {
        return Err(IdResolutionError::Unresolved {
            fields: fields.to_vec(),
        });
    }
    Ok(parts.join(ID_SEPARATOR))
}

/// Looks `path` up in `document`. `a/b/c` and `/a/b/c` are equivalent;
/// everything after the first segment is a JSON pointer.
fn lookup<'a>(document: &'a Document, path: &str) -> Option<&'a Value> {
    let path = path.strip_prefix('/').unwrap_or(path);
    match path.split_once('/') {
        None => document.get(path),
        Some((head, rest)) => document.get(head)?.pointer(&format!("/{}", rest)),
    }
}
