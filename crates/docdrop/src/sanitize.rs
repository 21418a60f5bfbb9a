//! Helpers for rendering untrusted values into file names and span fields.

use std::path::Path;

/// Returns only the filename component of a path (no directory).
///
/// Safe for span fields: reveals the file name without exposing the full path.
pub fn redact_path(path: &Path) -> String {
    path.file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("<unknown>")
        .to_string()
}

/// Makes a document id or revision safe to embed in a single file name.
///
/// Path separators, control characters and characters Windows forbids are
/// replaced with `_`.
pub fn filename_component(value: &str) -> String {
    let cleaned: String = value
        .chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect();

    if cleaned.is_empty() {
        "_".to_string()
    } else {
        cleaned
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_redact_path_returns_filename() {
        assert_eq!(
            redact_path(&PathBuf::from("/home/user/staging/orders.json")),
            "orders.json"
        );
    }

    #[test]
    fn test_redact_path_no_filename() {
        assert_eq!(redact_path(&PathBuf::from("/")), "<unknown>");
    }

    #[test]
    fn test_filename_component_replaces_separators() {
        assert_eq!(filename_component("customer/42\\x"), "customer_42_x");
        assert_eq!(filename_component("a:b*c?d"), "a_b_c_d");
        assert_eq!(filename_component("line\nbreak"), "line_break");
    }

    #[test]
    fn test_filename_component_keeps_revision_shape() {
        let revision = "2-967a00dff5e02add41819138abb3284d";
        assert_eq!(filename_component(revision), revision);
    }

    #[test]
    fn test_filename_component_never_empty() {
        assert_eq!(filename_component(""), "_");
    }
}
