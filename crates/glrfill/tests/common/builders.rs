//! Builders for test templates, evidence and mappings.
//!
//! Everything is produced in memory so the suites need no binary fixtures.

#![allow(dead_code)]

use glrfill::docx::{DocumentBuilder, RunSpec};
use glrfill::placeholder::FieldMapping;
use lopdf::{dictionary, Object, Stream};

/// Builds a `FieldMapping` from string pairs.
pub fn mapping(pairs: &[(&str, &str)]) -> FieldMapping {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

/// The three fields every GLR header/footer carries.
pub fn header_footer_mapping() -> FieldMapping {
    mapping(&[
        ("INSURED_NAME", "Jane Roe"),
        ("DATE_LOSS", "03/02/2024"),
        ("MORTGAGEE", "First National Bank"),
    ])
}

/// Builder for GLR-shaped templates.
pub struct TemplateBuilder {
    inner: DocumentBuilder,
}

impl TemplateBuilder {
    /// An empty template with a section (header and footer capable).
    pub fn new() -> Self {
        Self {
            inner: DocumentBuilder::new(),
        }
    }

    /// The standard layout: insured and loss date in the header, mortgagee in
    /// the footer, report body with a table and a heading.
    pub fn glr() -> Self {
        Self::new()
            .header(&["Insured: {{INSURED_NAME}}"])
            .header(&["Date of Loss: [DATE_LOSS]"])
            .footer(&["Mortgagee: {{ MORTGAGEE }}"])
            .body(&["General Loss Report"])
            .body(&["Claim number: [CLAIM_NUMBER]"])
            .table(&[&["Roof", "{{ROOF_TYPE}}"], &["Stories", "[STORIES]"]])
    }

    pub fn body(mut self, runs: &[&str]) -> Self {
        self.inner = self.inner.paragraph(runs.iter().copied());
        self
    }

    pub fn styled_body(mut self, runs: Vec<RunSpec>) -> Self {
        self.inner = self.inner.paragraph(runs);
        self
    }

    pub fn header(mut self, runs: &[&str]) -> Self {
        self.inner = self.inner.header(runs.iter().copied());
        self
    }

    pub fn footer(mut self, runs: &[&str]) -> Self {
        self.inner = self.inner.footer(runs.iter().copied());
        self
    }

    pub fn table(mut self, rows: &[&[&str]]) -> Self {
        self.inner = self.inner.table(rows);
        self
    }

    pub fn text_box(mut self, text: &str) -> Self {
        self.inner = self.inner.text_box(text);
        self
    }

    pub fn entry(mut self, name: &str, content: impl Into<Vec<u8>>) -> Self {
        self.inner = self.inner.entry(name, content);
        self
    }

    pub fn build(&self) -> Vec<u8> {
        self.inner.build().expect("template builds")
    }
}

/// A PDF with one page per entry, each page's text layer reading that entry.
pub fn pdf_with_pages(pages: &[&str]) -> Vec<u8> {
    let mut doc = lopdf::Document::with_version("1.5");
    let pages_id = doc.new_object_id();
    let font_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Courier",
    });
    let resources_id = doc.add_object(dictionary! {
        "Font" => dictionary! { "F1" => font_id },
    });

    let mut kids = Vec::new();
    for text in pages {
        let content = format!("BT /F1 12 Tf 50 700 Td ({}) Tj ET", text);
        let content_id = doc.add_object(Stream::new(dictionary! {}, content.into_bytes()));
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "MediaBox" => vec![0.into(), 0.into(), 612.into(), 792.into()],
            "Resources" => resources_id,
            "Contents" => content_id,
        });
        kids.push(Object::Reference(page_id));
    }

    let count = kids.len() as i64;
    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => count,
        }),
    );
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);

    let mut bytes = Vec::new();
    doc.save_to(&mut bytes).expect("pdf saves");
    bytes
}

/// A minimal PNG signature; enough for format detection.
pub const PNG_PAGE: &[u8] = &[0x89, b'P', b'N', b'G', 0x0d, 0x0a, 0x1a, 0x0a, 0, 0, 0, 0];
