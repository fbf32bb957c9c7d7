//! Placeholder token grammar.
//!
//! A field `NAME` is referenced in text as `{{NAME}}`, `{{ NAME }}`, `[NAME]`
//! or `[ NAME ]`. Plain text substitution only knows these four exact
//! spellings; the raw pass accepts any whitespace inside the delimiters.

use super::FieldMapping;

/// The four spellings of a field, in substitution order.
pub fn token_variants(name: &str) -> [String; 4] {
    [
        format!("{{{{{}}}}}", name),
        format!("{{{{ {} }}}}", name),
        format!("[{}]", name),
        format!("[ {} ]", name),
    ]
}

/// Whether `text` contains any spelling of `name`.
pub fn contains_token(text: &str, name: &str) -> bool {
    token_variants(name)
        .iter()
        .any(|variant| text.contains(variant.as_str()))
}

/// Replaces every spelling of one field.
pub fn replace_field(text: &str, name: &str, value: &str) -> String {
    let mut out = text.to_string();
    for variant in token_variants(name) {
        if out.contains(variant.as_str()) {
            out = out.replace(variant.as_str(), value);
        }
    }
    out
}

/// Applies every field of `mapping`, in mapping order, to `text`. Keys are
/// trimmed; keys that trim to nothing are ignored.
pub fn substitute_text(text: &str, mapping: &FieldMapping) -> String {
    let mut out = text.to_string();
    for (key, value) in mapping {
        let name = key.trim();
        if name.is_empty() {
            continue;
        }
        out = replace_field(&out, name, value);
    }
    out
}
