use serde_json::Value;

use super::Document;

/// Recursively merges `overlay` into `base`.
///
/// Where both sides hold an object under the same key the objects are merged
/// key by key; for every other collision the overlay value wins. Arrays are
/// replaced wholesale, never merged element-wise.
pub fn deep_merge(mut base: Document, overlay: Document) -> Document {
    merge_into(&mut base, overlay);
    base
}

fn merge_into(target: &mut Document, overlay: Document) {
    for (key, value) in overlay {
        let both_objects =
            value.is_object() && matches!(target.get(&key), Some(Value::Object(_)));

        if both_objects {
            if let (Some(Value::Object(existing)), Value::Object(incoming)) =
                (target.get_mut(&key), value)
            {
                merge_into(existing, incoming);
            }
        } else {
            target.insert(key, value);
        }
    }
}
