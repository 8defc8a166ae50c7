//! Case folding shared by child ordering and search.

use unicode_normalization::UnicodeNormalization;

/// NFC-normalize and lowercase so that composed and decomposed forms of the
/// same name compare equal.
pub fn fold_case(s: &str) -> String {
    s.nfc().collect::<String>().to_lowercase()
}

/// Trim and drop empty strings.
pub(crate) fn non_empty(value: Option<String>) -> Option<String> {
    value.and_then(|v| {
        let trimmed = v.trim();
        if trimmed.is_empty() {
            None
        } else if trimmed.len() == v.len() {
            Some(v)
        } else {
            Some(trimmed.to_string())
        }
    })
}
