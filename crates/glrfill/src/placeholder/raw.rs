//! Raw package substitution.
//!
//! Runs over the serialized package after the structural pass and rewrites
//! tokens wherever they occur in the XML text of `word/*.xml` parts: text
//! boxes, fields, comments and anything else the paragraph walk never sees.
//! A token is only found when it is contiguous in the XML, so tokens split by
//! run markup are left to the structural pass.

use quick_xml::escape::{escape, partial_escape};
use regex::{NoExpand, Regex};
use tracing::{debug, info_span, warn};

use super::FieldMapping;
use crate::docx::Package;
use crate::error::FormatError;

const CONTENT_PREFIX: &str = "word/";
const CONTENT_SUFFIX: &str = ".xml";

/// Output of a raw pass.
#[derive(Debug, Clone)]
pub struct RawPassOutcome {
    pub bytes: Vec<u8>,
    /// Entries whose text changed, in archive order.
    pub rewritten_entries: Vec<String>,
}

/// Whether an entry takes part in the raw pass.
pub fn is_eligible_entry(name: &str) -> bool {
    name.starts_with(CONTENT_PREFIX) && name.ends_with(CONTENT_SUFFIX)
}

struct FieldPattern {
    name: String,
    pattern: Regex,
    replacement: String,
}

/// Regex alternation of the spellings `name` can have in serialized XML:
/// as written, with markup characters escaped, and with quotes escaped too.
fn name_alternatives(name: &str) -> String {
    let mut spellings: Vec<String> = Vec::with_capacity(3);
    for spelling in [
        name.to_string(),
        partial_escape(name).into_owned(),
        escape(name).into_owned(),
    ] {
        if !spellings.contains(&spelling) {
            spellings.push(spelling);
        }
    }
    spellings
        .iter()
        .map(|s| regex::escape(s))
        .collect::<Vec<_>>()
        .join("|")
}

fn compile_patterns(mapping: &FieldMapping) -> Vec<FieldPattern> {
    let mut patterns = Vec::with_capacity(mapping.len());
    for (key, value) in mapping {
        let name = key.trim();
        if name.is_empty() {
            continue;
        }
        let escaped = name_alternatives(name);
        let source = format!(r"\{{\{{\s*(?:{0})\s*\}}\}}|\[\s*(?:{0})\s*\]", escaped);
        match Regex::new(&source) {
            Ok(pattern) => patterns.push(FieldPattern {
                name: name.to_string(),
                pattern,
                replacement: escape(value.as_str()).into_owned(),
            }),
            Err(e) => warn!(field = %name, error = %e, "Skipping field in raw pass"),
        }
    }
    patterns
}

/// Replaces tokens for every field of `mapping` in the raw XML of the
/// package. Entries that are not eligible, are not valid UTF-8, or contain no
/// token are copied unchanged.
pub fn apply_raw_pass(bytes: &[u8], mapping: &FieldMapping) -> Result<RawPassOutcome, FormatError> {
    let _span = info_span!("raw_pass", fields = mapping.len()).entered();
    let package = Package::open(bytes.to_vec())?;
    let patterns = compile_patterns(mapping);
    if patterns.is_empty() {
        return Ok(RawPassOutcome {
            bytes: package.into_bytes(),
            rewritten_entries: Vec::new(),
        });
    }

    let out = package.rewrite(is_eligible_entry, |name, content| {
        let Ok(text) = std::str::from_utf8(content) else {
            debug!(entry = name, "Entry is not UTF-8, copying unchanged");
            return None;
        };
        let mut current = text.to_string();
        let mut changed = false;
        for field in &patterns {
            if let std::borrow::Cow::Owned(replaced) =
                field.pattern.replace_all(&current, NoExpand(&field.replacement))
            {
                debug!(entry = name, field = %field.name, "Raw token replaced");
                current = replaced;
                changed = true;
            }
        }
        changed.then(|| current.into_bytes())
    })?;

    debug!(entries = ?out.replaced, "Raw pass finished");
    Ok(RawPassOutcome {
        bytes: out.bytes,
        rewritten_entries: out.replaced,
    })
}
