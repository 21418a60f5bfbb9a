use serde_json::Value;

use super::{kind_of, Document};
use crate::error::DecodeError;

/// Turns raw file bytes into a keyed document.
///
/// New input formats are added as new decoders; the File Load Task only sees
/// this capability.
pub trait ContentDecoder: Send + Sync {
    fn decode(&self, bytes: &[u8]) -> Result<Document, DecodeError>;

    /// Short format name used in log output.
    fn name(&self) -> &'static str;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct JsonDecoder;

impl ContentDecoder for JsonDecoder {
    fn decode(&self, bytes: &[u8]) -> Result<Document, DecodeError> {
        let value: Value = serde_json::from_slice(bytes)?;
        into_document(value)
    }

    fn name(&self) -> &'static str {
        "json"
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct YamlDecoder;

impl ContentDecoder for YamlDecoder {
    fn decode(&self, bytes: &[u8]) -> Result<Document, DecodeError> {
        let value: Value = serde_yaml::from_slice(bytes)?;
        into_document(value)
    }

    fn name(&self) -> &'static str {
        "yaml"
    }
}

fn into_document(value: Value) -> Result<Document, DecodeError> {
    match value {
        Value::Object(map) => Ok(map),
        other => Err(DecodeError::NotAnObject {
            found: kind_of(&other),
        }),
    }
}
