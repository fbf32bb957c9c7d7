//! Programmatic construction of small DOCX packages.
//!
//! Used by the test suites so that no binary fixtures are needed.

use super::model::{new_run, RunFormat, CONTENT_TYPES_PART, DOCUMENT_PART, DOCUMENT_RELS_PART};
use super::package::write_package;
use super::xml::{Element, XmlDocument};
use crate::error::FormatError;

const NS_W: &str = "http://schemas.openxmlformats.org/wordprocessingml/2006/main";
const NS_R: &str = "http://schemas.openxmlformats.org/officeDocument/2006/relationships";
const NS_WP: &str = "http://schemas.openxmlformats.org/drawingml/2006/wordprocessingDrawing";
const NS_A: &str = "http://schemas.openxmlformats.org/drawingml/2006/main";
const NS_WPS: &str = "http://schemas.microsoft.com/office/word/2010/wordprocessingShape";

const HEADER_PART: &str = "word/header1.xml";
const FOOTER_PART: &str = "word/footer1.xml";

/// One run of text with its formatting.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RunSpec {
    pub text: String,
    pub format: RunFormat,
}

impl RunSpec {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            format: RunFormat::default(),
        }
    }

    pub fn bold(mut self) -> Self {
        self.format.bold = Some(true);
        self
    }

    pub fn italic(mut self) -> Self {
        self.format.italic = Some(true);
        self
    }

    pub fn underline(mut self, kind: &str) -> Self {
        self.format.underline = Some(kind.to_string());
        self
    }

    pub fn style(mut self, style_id: &str) -> Self {
        self.format.style = Some(style_id.to_string());
        self
    }

    pub fn font(mut self, name: &str) -> Self {
        self.format.font_name = Some(name.to_string());
        self
    }

    /// Font size in half-points (`24` is 12pt).
    pub fn size(mut self, half_points: u32) -> Self {
        self.format.font_size_half_points = Some(half_points);
        self
    }

    pub fn color(mut self, hex: &str) -> Self {
        self.format.color = Some(hex.to_string());
        self
    }
}

impl From<&str> for RunSpec {
    fn from(text: &str) -> Self {
        Self::new(text)
    }
}

impl From<String> for RunSpec {
    fn from(text: String) -> Self {
        Self::new(text)
    }
}

#[derive(Debug, Clone)]
enum Block {
    Paragraph(Vec<RunSpec>),
    Table(Vec<Vec<Vec<Block>>>),
    TextBox(String),
}

/// Builder for a minimal WordprocessingML package.
#[derive(Debug, Clone)]
pub struct DocumentBuilder {
    body: Vec<Block>,
    header: Vec<Vec<RunSpec>>,
    footer: Vec<Vec<RunSpec>>,
    with_sections: bool,
    extra_entries: Vec<(String, Vec<u8>)>,
}

impl Default for DocumentBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl DocumentBuilder {
    pub fn new() -> Self {
        Self {
            body: Vec::new(),
            header: Vec::new(),
            footer: Vec::new(),
            with_sections: true,
            extra_entries: Vec::new(),
        }
    }

    /// Adds a body paragraph made of the given runs.
    pub fn paragraph<I, R>(mut self, runs: I) -> Self
    where
        I: IntoIterator<Item = R>,
        R: Into<RunSpec>,
    {
        self.body
            .push(Block::Paragraph(runs.into_iter().map(Into::into).collect()));
        self
    }

    /// Adds a table; every cell holds one single-run paragraph.
    pub fn table(mut self, rows: &[&[&str]]) -> Self {
        self.body.push(simple_table(rows));
        self
    }

    /// Adds a one-cell table whose cell contains `inner` as a nested table.
    pub fn nested_table(mut self, outer_text: &str, inner: &[&[&str]]) -> Self {
        let cell = vec![
            Block::Paragraph(vec![RunSpec::new(outer_text)]),
            simple_table(inner),
        ];
        self.body.push(Block::Table(vec![vec![cell]]));
        self
    }

    /// Adds a paragraph holding a drawing with a text box. Text inside the
    /// box is not part of the paragraph's run text.
    pub fn text_box(mut self, text: &str) -> Self {
        self.body.push(Block::TextBox(text.to_string()));
        self
    }

    /// Adds a paragraph to the default header of the first section.
    pub fn header<I, R>(mut self, runs: I) -> Self
    where
        I: IntoIterator<Item = R>,
        R: Into<RunSpec>,
    {
        self.header.push(runs.into_iter().map(Into::into).collect());
        self
    }

    /// Adds a paragraph to the default footer of the first section.
    pub fn footer<I, R>(mut self, runs: I) -> Self
    where
        I: IntoIterator<Item = R>,
        R: Into<RunSpec>,
    {
        self.footer.push(runs.into_iter().map(Into::into).collect());
        self
    }

    /// Omits the body `w:sectPr`, producing a document without sections.
    pub fn without_sections(mut self) -> Self {
        self.with_sections = false;
        self
    }

    /// Adds an arbitrary package entry, written after the document parts.
    pub fn entry(mut self, name: &str, content: impl Into<Vec<u8>>) -> Self {
        self.extra_entries.push((name.to_string(), content.into()));
        self
    }

    pub fn build(&self) -> Result<Vec<u8>, FormatError> {
        let has_header = self.with_sections && !self.header.is_empty();
        let has_footer = self.with_sections && !self.footer.is_empty();

        let mut body = Element::new("w:body");
        for block in &self.body {
            body.push_element(block_element(block));
        }
        if self.with_sections {
            let mut sect_pr = Element::new("w:sectPr");
            if has_header {
                sect_pr.push_element(
                    Element::new("w:headerReference")
                        .with_attr("w:type", "default")
                        .with_attr("r:id", "rId1"),
                );
            }
            if has_footer {
                sect_pr.push_element(
                    Element::new("w:footerReference")
                        .with_attr("w:type", "default")
                        .with_attr("r:id", "rId2"),
                );
            }
            sect_pr.push_element(
                Element::new("w:pgSz")
                    .with_attr("w:w", "12240")
                    .with_attr("w:h", "15840"),
            );
            body.push_element(sect_pr);
        }

        let document = Element::new("w:document")
            .with_attr("xmlns:w", NS_W)
            .with_attr("xmlns:r", NS_R)
            .with_attr("xmlns:wp", NS_WP)
            .with_attr("xmlns:a", NS_A)
            .with_attr("xmlns:wps", NS_WPS)
            .with_child(body);

        let mut parts: Vec<(String, Vec<u8>)> = vec![
            (
                CONTENT_TYPES_PART.to_string(),
                content_types(has_header, has_footer).into_bytes(),
            ),
            ("_rels/.rels".to_string(), package_rels().into_bytes()),
            (DOCUMENT_PART.to_string(), render(document)),
            (
                DOCUMENT_RELS_PART.to_string(),
                document_rels(has_header, has_footer).into_bytes(),
            ),
        ];
        if has_header {
            parts.push((
                HEADER_PART.to_string(),
                render(story("w:hdr", &self.header)),
            ));
        }
        if has_footer {
            parts.push((
                FOOTER_PART.to_string(),
                render(story("w:ftr", &self.footer)),
            ));
        }
        parts.extend(self.extra_entries.iter().cloned());

        write_package(
            parts
                .iter()
                .map(|(name, content)| (name.as_str(), content.as_slice())),
        )
    }
}

fn simple_table(rows: &[&[&str]]) -> Block {
    Block::Table(
        rows.iter()
            .map(|row| {
                row.iter()
                    .map(|text| vec![Block::Paragraph(vec![RunSpec::new(*text)])])
                    .collect()
            })
            .collect(),
    )
}

fn paragraph_element(runs: &[RunSpec]) -> Element {
    let mut paragraph = Element::new("w:p");
    for run in runs {
        paragraph.push_element(new_run(Some("w"), &run.text, &run.format));
    }
    paragraph
}

fn block_element(block: &Block) -> Element {
    match block {
        Block::Paragraph(runs) => paragraph_element(runs),
        Block::Table(rows) => {
            let mut table = Element::new("w:tbl");
            for row in rows {
                let mut tr = Element::new("w:tr");
                for cell in row {
                    let mut tc = Element::new("w:tc");
                    for inner in cell {
                        tc.push_element(block_element(inner));
                    }
                    tr.push_element(tc);
                }
                table.push_element(tr);
            }
            table
        }
        Block::TextBox(text) => {
            let content = Element::new("w:txbxContent")
                .with_child(paragraph_element(&[RunSpec::new(text.as_str())]));
            let shape = Element::new("wps:wsp")
                .with_child(Element::new("wps:txbx").with_child(content));
            let drawing = Element::new("w:drawing").with_child(
                Element::new("wp:inline").with_child(
                    Element::new("a:graphic").with_child(
                        Element::new("a:graphicData")
                            .with_attr("uri", NS_WPS)
                            .with_child(shape),
                    ),
                ),
            );
            Element::new("w:p").with_child(Element::new("w:r").with_child(drawing))
        }
    }
}

fn story(name: &str, paragraphs: &[Vec<RunSpec>]) -> Element {
    let mut root = Element::new(name)
        .with_attr("xmlns:w", NS_W)
        .with_attr("xmlns:r", NS_R);
    for runs in paragraphs {
        root.push_element(paragraph_element(runs));
    }
    root
}

fn render(root: Element) -> Vec<u8> {
    XmlDocument::from_root(root).to_xml_string().into_bytes()
}

fn content_types(has_header: bool, has_footer: bool) -> String {
    let mut xml = String::from(concat!(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>"#,
        "\n",
        r#"<Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types">"#,
        r#"<Default Extension="rels" ContentType="application/vnd.openxmlformats-package.relationships+xml"/>"#,
        r#"<Default Extension="xml" ContentType="application/xml"/>"#,
        r#"<Override PartName="/word/document.xml" ContentType="application/vnd.openxmlformats-officedocument.wordprocessingml.document.main+xml"/>"#,
    ));
    if has_header {
        xml.push_str(r#"<Override PartName="/word/header1.xml" ContentType="application/vnd.openxmlformats-officedocument.wordprocessingml.header+xml"/>"#);
    }
    if has_footer {
        xml.push_str(r#"<Override PartName="/word/footer1.xml" ContentType="application/vnd.openxmlformats-officedocument.wordprocessingml.footer+xml"/>"#);
    }
    xml.push_str("</Types>");
    xml
}

fn package_rels() -> String {
    concat!(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>"#,
        "\n",
        r#"<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">"#,
        r#"<Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/officeDocument" Target="word/document.xml"/>"#,
        "</Relationships>",
    )
    .to_string()
}

fn document_rels(has_header: bool, has_footer: bool) -> String {
    let mut xml = String::from(concat!(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>"#,
        "\n",
        r#"<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">"#,
    ));
    if has_header {
        xml.push_str(r#"<Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/header" Target="header1.xml"/>"#);
    }
    if has_footer {
        xml.push_str(r#"<Relationship Id="rId2" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/footer" Target="footer1.xml"/>"#);
    }
    xml.push_str("</Relationships>");
    xml
}
