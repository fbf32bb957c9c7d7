//! Placeholder discovery over assembled paragraph text.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::LazyLock;

use regex::Regex;

use crate::docx::{Document, Region, Scope};

static RE_TOKEN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\{\{(.*?)\}\}|\[(.*?)\]").unwrap());

/// Field names referenced in a piece of text, in order of appearance.
pub fn scan_text(text: &str) -> Vec<String> {
    RE_TOKEN
        .captures_iter(text)
        .filter_map(|caps| caps.get(1).or_else(|| caps.get(2)))
        .map(|m| m.as_str().trim())
        .filter(|name| !name.is_empty())
        .map(str::to_string)
        .collect()
}

/// Every field name referenced anywhere in the document (body, tables,
/// headers and footers), deduplicated and sorted.
pub fn extract_placeholders(doc: &Document) -> Vec<String> {
    let mut names = BTreeSet::new();
    doc.for_each_paragraph(Scope::All, |_, paragraph| {
        names.extend(scan_text(&paragraph.text()));
    });
    names.into_iter().collect()
}

/// Field names grouped by the region they appear in.
pub fn extract_placeholders_by_region(doc: &Document) -> BTreeMap<Region, BTreeSet<String>> {
    let mut regions: BTreeMap<Region, BTreeSet<String>> = BTreeMap::new();
    doc.for_each_paragraph(Scope::All, |region, paragraph| {
        let found = scan_text(&paragraph.text());
        if !found.is_empty() {
            regions.entry(region).or_default().extend(found);
        }
    });
    regions
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::docx::DocumentBuilder;

    fn load(builder: DocumentBuilder) -> Document {
        Document::load(&builder.build().unwrap()).unwrap()
    }

    #[test]
    fn test_scan_text_both_syntaxes() {
        assert_eq!(
            scan_text("Name: {{ NAME }}, Age: [AGE], DOB: {{DOB}}"),
            vec!["NAME", "AGE", "DOB"]
        );
    }

    #[test]
    fn test_scan_text_skips_empty_names() {
        assert_eq!(scan_text("[] {{ }} [ X ]"), vec!["X"]);
    }

    #[test]
    fn test_scan_text_is_non_greedy() {
        assert_eq!(scan_text("[A] and [B]"), vec!["A", "B"]);
        assert_eq!(scan_text("{{A}} }} {{B}}"), vec!["A", "B"]);
    }

    #[test]
    fn test_extract_sorted_and_deduplicated() {
        let doc = load(
            DocumentBuilder::new()
                .paragraph(["[ZIP] and {{ZIP}}"])
                .paragraph(["[ADDRESS]"]),
        );
        assert_eq!(extract_placeholders(&doc), vec!["ADDRESS", "ZIP"]);
    }

    #[test]
    fn test_tokens_split_across_runs_are_found() {
        let doc = load(DocumentBuilder::new().paragraph(["Date of Loss: [", "DATE_", "LOSS]"]));
        assert_eq!(extract_placeholders(&doc), vec!["DATE_LOSS"]);
    }

    #[test]
    fn test_tables_headers_and_footers_are_scanned() {
        let doc = load(
            DocumentBuilder::new()
                .paragraph(["Body [A]"])
                .table(&[&["[B]", "plain"]])
                .nested_table("[C]", &[&["{{ D }}"]])
                .header(["[E]"])
                .footer(["[F]"]),
        );
        assert_eq!(extract_placeholders(&doc), vec!["A", "B", "C", "D", "E", "F"]);

        let by_region = extract_placeholders_by_region(&doc);
        assert_eq!(
            by_region[&Region::Body].iter().collect::<Vec<_>>(),
            vec!["A", "B", "C", "D"]
        );
        assert!(by_region[&Region::Header].contains("E"));
        assert!(by_region[&Region::Footer].contains("F"));
    }

    #[test]
    fn test_document_without_sections() {
        let doc = load(DocumentBuilder::new().paragraph(["[X]"]).without_sections());
        assert_eq!(extract_placeholders(&doc), vec!["X"]);
    }

    #[test]
    fn test_text_box_tokens_are_not_visible() {
        let doc = load(DocumentBuilder::new().text_box("[HIDDEN]"));
        assert!(extract_placeholders(&doc).is_empty());
    }
}
