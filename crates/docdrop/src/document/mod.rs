//! In-memory document model and the pure operations over it.

pub mod decoder;
pub mod id;
pub mod merge;

pub use decoder::{ContentDecoder, JsonDecoder, YamlDecoder};
pub use id::{resolve_id, ID_SEPARATOR};
pub use merge::deep_merge;

/// A decoded document: a JSON object keyed by field name.
pub type Document = serde_json::Map<String, serde_json::Value>;

/// Reserved field holding the document id.
pub const ID_FIELD: &str = "_id";

/// Reserved field holding the store-assigned revision token.
pub const REV_FIELD: &str = "_rev";

/// Returns the revision token carried by `document`, if any.
pub fn revision_of(document: &Document) -> Option<&str> {
    document.get(REV_FIELD).and_then(serde_json::Value::as_str)
}

pub(crate) fn kind_of(value: &serde_json::Value) -> &'static str {
    match value {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "boolean",
        serde_json::Value::Number(_) => "number",
        serde_json::Value::String(_) => "string",
        serde_json::Value::Array(_) => "array",
        serde_json::Value::Object(_) => "object",
    }
}
