//! Normalization of reviewer text edits.
//!
//! Edits arrive keyed by whatever the reviewer typed: `NAME`, `[NAME]`,
//! `{{ NAME }}`. They are reduced to bare field names before the raw pass.

use tracing::{info_span, warn};

use super::raw::{apply_raw_pass, RawPassOutcome};
use super::FieldMapping;
use crate::error::FormatError;

/// Strips one layer of `{{ }}` or `[ ]` from a key and trims it.
pub fn normalize_key(key: &str) -> &str {
    let key = key.trim();
    if let Some(inner) = key
        .strip_prefix("{{")
        .and_then(|rest| rest.strip_suffix("}}"))
    {
        return inner.trim();
    }
    if let Some(inner) = key
        .strip_prefix('[')
        .and_then(|rest| rest.strip_suffix(']'))
    {
        return inner.trim();
    }
    key
}

/// Normalizes every key. Keys are applied in the mapping's (lexicographic)
/// order, so when two keys name the same field the later one wins.
pub fn normalize_edits(edits: &FieldMapping) -> FieldMapping {
    let mut normalized = FieldMapping::new();
    for (key, value) in edits {
        let name = normalize_key(key);
        if name.is_empty() {
            warn!(key = %key, "Ignoring edit with an empty field name");
            continue;
        }
        if let Some(previous) = normalized.insert(name.to_string(), value.clone()) {
            if previous != *value {
                warn!(
                    field = %name,
                    key = %key,
                    "Conflicting edits for the same field, keeping the later key"
                );
            }
        }
    }
    normalized
}

/// Applies reviewer edits to a filled document through the raw pass.
pub fn apply_text_edits(bytes: &[u8], edits: &FieldMapping) -> Result<RawPassOutcome, FormatError> {
    let _span = info_span!("apply_text_edits", edits = edits.len()).entered();
    apply_raw_pass(bytes, &normalize_edits(edits))
}
