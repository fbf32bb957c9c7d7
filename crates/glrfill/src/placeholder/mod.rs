//! Placeholder discovery and substitution.

use std::collections::BTreeMap;

use tracing::info_span;

use crate::docx::Document;
use crate::error::FormatError;

pub mod normalize;
pub mod raw;
pub mod scanner;
pub mod substitute;
pub mod token;

pub use normalize::{apply_text_edits, normalize_edits, normalize_key};
pub use raw::{apply_raw_pass, RawPassOutcome};
pub use scanner::{extract_placeholders, extract_placeholders_by_region, scan_text};
pub use substitute::{fill_document, FillStats, SubstitutionPolicy};

/// Field name to replacement value. Ordered, so substitution order is
/// deterministic.
pub type FieldMapping = BTreeMap<String, String>;

/// Serializes a filled document and runs the raw pass over the result.
pub fn finalize(doc: &Document, mapping: &FieldMapping) -> Result<Vec<u8>, FormatError> {
    let _span = info_span!("finalize").entered();
    let saved = doc.save()?;
    Ok(apply_raw_pass(&saved, mapping)?.bytes)
}
