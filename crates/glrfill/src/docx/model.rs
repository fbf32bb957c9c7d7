//! Structural view over a DOCX package: sections, paragraphs, runs and tables.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::package::Package;
use super::xml::{Element, Node, XmlDocument};
use crate::error::FormatError;

pub const CONTENT_TYPES_PART: &str = "[Content_Types].xml";
pub const DOCUMENT_PART: &str = "word/document.xml";
pub const DOCUMENT_RELS_PART: &str = "word/_rels/document.xml.rels";

/// Where a paragraph lives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Region {
    Body,
    Header,
    Footer,
}

/// Which regions a paragraph walk covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Scope {
    #[default]
    All,
    Body,
    HeadersAndFooters,
}

impl Scope {
    fn includes(self, region: Region) -> bool {
        match self {
            Scope::All => true,
            Scope::Body => region == Region::Body,
            Scope::HeadersAndFooters => region != Region::Body,
        }
    }
}

/// A header or footer attached to a section.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PartRef {
    /// `default`, `first` or `even`.
    pub kind: String,
    /// Package entry name, e.g. `word/header1.xml`.
    pub part: String,
}

/// A logical section and its header/footer parts.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Section {
    pub headers: Vec<PartRef>,
    pub footers: Vec<PartRef>,
}

/// Character formatting of a run, as far as it is carried over when
/// paragraph runs are merged. `None` means "not set on the run".
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunFormat {
    pub bold: Option<bool>,
    pub italic: Option<bool>,
    pub underline: Option<String>,
    pub style: Option<String>,
    pub font_name: Option<String>,
    pub font_size_half_points: Option<u32>,
    pub color: Option<String>,
}

impl RunFormat {
    /// Reads the supported attributes from a `w:rPr` element.
    pub fn from_properties(rpr: &Element) -> Self {
        let mut format = Self::default();
        for prop in rpr.child_elements() {
            let val = prop.attr_local("val");
            match prop.local_name() {
                "b" => format.bold = Some(toggle_value(val)),
                "i" => format.italic = Some(toggle_value(val)),
                "u" => format.underline = val.map(str::to_string),
                "rStyle" => format.style = val.map(str::to_string),
                "rFonts" => {
                    format.font_name = prop
                        .attr_local("ascii")
                        .or_else(|| prop.attr_local("hAnsi"))
                        .map(str::to_string)
                }
                "sz" => format.font_size_half_points = val.and_then(|v| v.parse().ok()),
                "color" => format.color = val.filter(|v| *v != "auto").map(str::to_string),
                _ => {}
            }
        }
        format
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// Builds a `w:rPr` element holding only the attributes that are set.
    pub fn to_properties(&self, prefix: Option<&str>) -> Option<Element> {
        if self.is_empty() {
            return None;
        }
        let q = |local: &str| qualify(prefix, local);
        let val = q("val");
        let mut rpr = Element::new(q("rPr"));

        if let Some(style) = &self.style {
            rpr.push_element(Element::new(q("rStyle")).with_attr(&val, style));
        }
        if let Some(font) = &self.font_name {
            rpr.push_element(
                Element::new(q("rFonts"))
                    .with_attr(q("ascii"), font)
                    .with_attr(q("hAnsi"), font),
            );
        }
        if let Some(bold) = self.bold {
            rpr.push_element(toggle_element(q("b"), &val, bold));
        }
        if let Some(italic) = self.italic {
            rpr.push_element(toggle_element(q("i"), &val, italic));
        }
        if let Some(color) = &self.color {
            rpr.push_element(Element::new(q("color")).with_attr(&val, color));
        }
        if let Some(size) = self.font_size_half_points {
            rpr.push_element(Element::new(q("sz")).with_attr(&val, size.to_string()));
        }
        if let Some(underline) = &self.underline {
            rpr.push_element(Element::new(q("u")).with_attr(&val, underline));
        }
        Some(rpr)
    }
}

fn toggle_value(val: Option<&str>) -> bool {
    !matches!(val, Some("false" | "0" | "off"))
}

fn toggle_element(name: String, val: &str, on: bool) -> Element {
    let el = Element::new(name);
    if on {
        el
    } else {
        el.with_attr(val, "0")
    }
}

fn qualify(prefix: Option<&str>, local: &str) -> String {
    match prefix {
        Some(prefix) => format!("{}:{}", prefix, local),
        None => local.to_string(),
    }
}

fn is_run(node: &Node) -> bool {
    matches!(node, Node::Element(el) if el.local_name() == "r")
}

fn is_text_content(el: &Element) -> bool {
    matches!(
        el.local_name(),
        "t" | "tab" | "br" | "cr" | "noBreakHyphen"
    )
}

fn run_text(run: &Element) -> String {
    let mut text = String::new();
    for child in run.child_elements() {
        match child.local_name() {
            "t" => text.push_str(&child.text()),
            "tab" => text.push('\t'),
            "br" | "cr" => text.push('\n'),
            "noBreakHyphen" => text.push('-'),
            _ => {}
        }
    }
    text
}

/// Replaces the text-bearing children of a run, keeping `w:rPr` and any
/// non-text content (drawings, field characters) in place.
fn write_run_text(run: &mut Element, text: &str) {
    let t_name = run.qualified("t");
    let tab_name = run.qualified("tab");
    let br_name = run.qualified("br");

    let insert_at = run
        .children()
        .iter()
        .position(|node| matches!(node, Node::Element(el) if is_text_content(el)))
        .unwrap_or_else(|| {
            run.children()
                .iter()
                .position(|node| !matches!(node, Node::Element(el) if el.local_name() == "rPr"))
                .unwrap_or(run.children().len())
        });
    run.children_mut()
        .retain(|node| !matches!(node, Node::Element(el) if is_text_content(el)));

    let mut content = Vec::new();
    let mut segment = String::new();
    let flush = |segment: &mut String, content: &mut Vec<Node>| {
        if !segment.is_empty() {
            content.push(Node::Element(text_element(&t_name, segment)));
            segment.clear();
        }
    };
    for ch in text.chars() {
        match ch {
            '\t' => {
                flush(&mut segment, &mut content);
                content.push(Node::Element(Element::new(tab_name.as_str())));
            }
            '\n' => {
                flush(&mut segment, &mut content);
                content.push(Node::Element(Element::new(br_name.as_str())));
            }
            '\r' => {}
            other => segment.push(other),
        }
    }
    flush(&mut segment, &mut content);

    let children = run.children_mut();
    let tail = children.split_off(insert_at.min(children.len()));
    children.extend(content);
    children.extend(tail);
}

fn text_element(name: &str, text: &str) -> Element {
    let mut el = Element::new(name);
    if text.starts_with(char::is_whitespace) || text.ends_with(char::is_whitespace) {
        el.set_attr("xml:space", "preserve");
    }
    el.push_text(text);
    el
}

/// Read-only view of a `w:p`.
#[derive(Debug, Clone, Copy)]
pub struct Paragraph<'a> {
    element: &'a Element,
}

impl<'a> Paragraph<'a> {
    pub fn runs(self) -> impl Iterator<Item = Run<'a>> {
        self.element
            .child_elements()
            .filter(|el| el.local_name() == "r")
            .map(|element| Run { element })
    }

    /// Full visible text: the concatenation of the run texts.
    pub fn text(self) -> String {
        self.runs().map(|run| run.text()).collect()
    }
}

/// Read-only view of a `w:r`.
#[derive(Debug, Clone, Copy)]
pub struct Run<'a> {
    element: &'a Element,
}

impl Run<'_> {
    pub fn text(&self) -> String {
        run_text(self.element)
    }

    pub fn format(&self) -> RunFormat {
        self.element
            .find_local("rPr")
            .map(RunFormat::from_properties)
            .unwrap_or_default()
    }
}

/// Mutable view of a `w:p`, handed out by [`Document::for_each_paragraph_mut`].
#[derive(Debug)]
pub struct ParagraphMut<'a> {
    element: &'a mut Element,
}

impl ParagraphMut<'_> {
    pub fn as_paragraph(&self) -> Paragraph<'_> {
        Paragraph {
            element: &*self.element,
        }
    }

    pub fn text(&self) -> String {
        self.as_paragraph().text()
    }

    pub fn run_texts(&self) -> Vec<String> {
        self.as_paragraph().runs().map(|run| run.text()).collect()
    }

    /// Replaces the text of the run at `index`, keeping its formatting.
    /// Returns false when there is no such run.
    pub fn set_run_text(&mut self, index: usize, text: &str) -> bool {
        match self
            .element
            .child_elements_mut()
            .filter(|el| el.local_name() == "r")
            .nth(index)
        {
            Some(run) => {
                write_run_text(run, text);
                true
            }
            None => false,
        }
    }

    /// Removes every run and inserts a single run carrying `text` and
    /// `format` where the first run stood.
    pub fn replace_runs(&mut self, text: &str, format: &RunFormat) {
        let run = new_run(self.element.prefix(), text, format);
        let first = self.element.children().iter().position(is_run);
        self.element.children_mut().retain(|node| !is_run(node));

        let children = self.element.children_mut();
        let at = first.unwrap_or(children.len()).min(children.len());
        children.insert(at, Node::Element(run));
    }
}

/// Builds a `w:r` with the given text and formatting.
pub(crate) fn new_run(prefix: Option<&str>, text: &str, format: &RunFormat) -> Element {
    let mut run = Element::new(qualify(prefix, "r"));
    if let Some(rpr) = format.to_properties(prefix) {
        run.push_element(rpr);
    }
    write_run_text(&mut run, text);
    run
}

/// Read-only view of a `w:tbl`.
#[derive(Debug, Clone, Copy)]
pub struct Table<'a> {
    element: &'a Element,
}

impl<'a> Table<'a> {
    /// Cells row by row.
    pub fn rows(&self) -> Vec<Vec<TableCell<'a>>> {
        self.element
            .child_elements()
            .filter(|el| el.local_name() == "tr")
            .map(|row| {
                row.child_elements()
                    .filter(|el| el.local_name() == "tc")
                    .map(|element| TableCell { element })
                    .collect()
            })
            .collect()
    }
}

/// Read-only view of a `w:tc`.
#[derive(Debug, Clone, Copy)]
pub struct TableCell<'a> {
    element: &'a Element,
}

impl<'a> TableCell<'a> {
    pub fn paragraphs(&self) -> Vec<Paragraph<'a>> {
        direct_paragraphs(self.element)
    }

    pub fn tables(&self) -> Vec<Table<'a>> {
        direct_tables(self.element)
    }
}

fn direct_paragraphs(container: &Element) -> Vec<Paragraph<'_>> {
    container
        .child_elements()
        .filter(|el| el.local_name() == "p")
        .map(|element| Paragraph { element })
        .collect()
}

fn direct_tables(container: &Element) -> Vec<Table<'_>> {
    container
        .child_elements()
        .filter(|el| el.local_name() == "tbl")
        .map(|element| Table { element })
        .collect()
}

/// Direct paragraphs first, then the paragraphs of each table, recursively.
fn visit_container<'a>(container: &'a Element, f: &mut dyn FnMut(Paragraph<'a>)) {
    for paragraph in direct_paragraphs(container) {
        f(paragraph);
    }
    for table in direct_tables(container) {
        for cell in table.rows().into_iter().flatten() {
            visit_container(cell.element, f);
        }
    }
}

fn visit_container_mut(container: &mut Element, f: &mut dyn FnMut(&mut ParagraphMut<'_>) -> bool) -> bool {
    let mut changed = false;
    for element in container
        .child_elements_mut()
        .filter(|el| el.local_name() == "p")
    {
        changed |= f(&mut ParagraphMut { element });
    }
    for table in container
        .child_elements_mut()
        .filter(|el| el.local_name() == "tbl")
    {
        for row in table.child_elements_mut().filter(|el| el.local_name() == "tr") {
            for cell in row.child_elements_mut().filter(|el| el.local_name() == "tc") {
                changed |= visit_container_mut(cell, f);
            }
        }
    }
    changed
}

/// A loaded template or report.
#[derive(Debug, Clone)]
pub struct Document {
    package: Package,
    parts: BTreeMap<String, XmlDocument>,
    sections: Vec<Section>,
    dirty: BTreeSet<String>,
}

impl Document {
    /// Parses DOCX bytes.
    pub fn load(bytes: &[u8]) -> Result<Self, FormatError> {
        let package = Package::open(bytes.to_vec())?;
        for required in [CONTENT_TYPES_PART, DOCUMENT_PART] {
            if !package.contains(required) {
                return Err(FormatError::MissingPart(required.to_string()));
            }
        }

        let main = parse_part(&package, DOCUMENT_PART)?;
        let body = main
            .root()
            .and_then(|root| root.find_local("body"))
            .ok_or_else(|| FormatError::MalformedXml {
                part: DOCUMENT_PART.to_string(),
                reason: "document has no body element".to_string(),
            })?;

        let relationships = load_relationships(&package)?;
        let sections = collect_sections(body, &relationships, &package);

        let mut parts = BTreeMap::new();
        for section in &sections {
            for part_ref in section.headers.iter().chain(&section.footers) {
                if !parts.contains_key(&part_ref.part) {
                    let xml = parse_part(&package, &part_ref.part)?;
                    parts.insert(part_ref.part.clone(), xml);
                }
            }
        }
        parts.insert(DOCUMENT_PART.to_string(), main);

        debug!(
            entries = package.entries().len(),
            sections = sections.len(),
            header_footer_parts = parts.len() - 1,
            "Loaded document"
        );

        Ok(Self {
            package,
            parts,
            sections,
            dirty: BTreeSet::new(),
        })
    }

    /// Serializes the document. Parts that were never modified keep their
    /// original compressed bytes; an untouched document comes back unchanged.
    pub fn save(&self) -> Result<Vec<u8>, FormatError> {
        if self.dirty.is_empty() {
            return Ok(self.package.bytes().to_vec());
        }
        let mut rendered: BTreeMap<&str, Vec<u8>> = self
            .dirty
            .iter()
            .filter_map(|name| {
                self.parts
                    .get(name)
                    .map(|xml| (name.as_str(), xml.to_xml_string().into_bytes()))
            })
            .collect();
        let out = self
            .package
            .rewrite(|name| self.dirty.contains(name), |name, _| rendered.remove(name))?;
        debug!(parts = ?out.replaced, "Saved document");
        Ok(out.bytes)
    }

    pub fn sections(&self) -> &[Section] {
        &self.sections
    }

    /// Whether the document exposes any section with header/footer access.
    pub fn has_sections(&self) -> bool {
        !self.sections.is_empty()
    }

    /// Direct body paragraphs.
    pub fn paragraphs(&self) -> Vec<Paragraph<'_>> {
        self.body().map(direct_paragraphs).unwrap_or_default()
    }

    /// Direct body tables.
    pub fn tables(&self) -> Vec<Table<'_>> {
        self.body().map(direct_tables).unwrap_or_default()
    }

    /// Direct paragraphs of every header of a section.
    pub fn header_paragraphs(&self, section: usize) -> Vec<Paragraph<'_>> {
        self.section_paragraphs(section, |s| &s.headers)
    }

    /// Direct paragraphs of every footer of a section.
    pub fn footer_paragraphs(&self, section: usize) -> Vec<Paragraph<'_>> {
        self.section_paragraphs(section, |s| &s.footers)
    }

    /// Body text, body paragraphs first and then table cells, one line per paragraph.
    pub fn text(&self) -> String {
        self.region_text(Region::Body)
    }

    /// Text of every paragraph in a region, one line per paragraph.
    pub fn region_text(&self, region: Region) -> String {
        let mut lines = Vec::new();
        self.for_each_paragraph(Scope::All, |r, paragraph| {
            if r == region {
                lines.push(paragraph.text());
            }
        });
        lines.join("\n")
    }

    /// Names of the parts modified since load.
    pub fn modified_parts(&self) -> impl Iterator<Item = &str> {
        self.dirty.iter().map(String::as_str)
    }

    /// Visits every paragraph in scope: body paragraphs, body tables, then
    /// each section's headers and footers with their tables. Parts shared by
    /// several sections are visited once.
    pub fn for_each_paragraph<'a, F>(&'a self, scope: Scope, mut f: F)
    where
        F: FnMut(Region, Paragraph<'a>),
    {
        for (part, region) in self.walk_order(scope) {
            let Some(container) = self.container(&part, region) else {
                continue;
            };
            visit_container(container, &mut |paragraph| f(region, paragraph));
        }
    }

    /// Mutable walk in the same order as [`Self::for_each_paragraph`]. The
    /// closure returns whether it changed the paragraph; changed parts are
    /// re-serialized on save.
    pub fn for_each_paragraph_mut<F>(&mut self, scope: Scope, mut f: F)
    where
        F: FnMut(Region, &mut ParagraphMut<'_>) -> bool,
    {
        for (part, region) in self.walk_order(scope) {
            let Some(xml) = self.parts.get_mut(&part) else {
                continue;
            };
            let Some(root) = xml.root_mut() else {
                continue;
            };
            let container = if region == Region::Body {
                match root.find_local_mut("body") {
                    Some(body) => body,
                    None => continue,
                }
            } else {
                root
            };
            if visit_container_mut(container, &mut |paragraph| f(region, paragraph)) {
                self.dirty.insert(part);
            }
        }
    }

    fn walk_order(&self, scope: Scope) -> Vec<(String, Region)> {
        let mut order = Vec::new();
        if scope.includes(Region::Body) {
            order.push((DOCUMENT_PART.to_string(), Region::Body));
        }
        let mut seen = BTreeSet::new();
        for section in &self.sections {
            let refs = section
                .headers
                .iter()
                .map(|r| (r, Region::Header))
                .chain(section.footers.iter().map(|r| (r, Region::Footer)));
            for (part_ref, region) in refs {
                if scope.includes(region) && seen.insert(part_ref.part.clone()) {
                    order.push((part_ref.part.clone(), region));
                }
            }
        }
        order
    }

    fn body(&self) -> Option<&Element> {
        self.parts
            .get(DOCUMENT_PART)
            .and_then(XmlDocument::root)
            .and_then(|root| root.find_local("body"))
    }

    fn container(&self, part: &str, region: Region) -> Option<&Element> {
        let root = self.parts.get(part)?.root()?;
        if region == Region::Body {
            root.find_local("body")
        } else {
            Some(root)
        }
    }

    fn section_paragraphs<F>(&self, section: usize, refs: F) -> Vec<Paragraph<'_>>
    where
        F: Fn(&Section) -> &Vec<PartRef>,
    {
        let Some(section) = self.sections.get(section) else {
            return Vec::new();
        };
        refs(section)
            .iter()
            .filter_map(|part_ref| self.parts.get(&part_ref.part)?.root())
            .flat_map(direct_paragraphs)
            .collect()
    }
}

fn parse_part(package: &Package, name: &str) -> Result<XmlDocument, FormatError> {
    let text = package.read_string(name)?;
    XmlDocument::parse(&text).map_err(|reason| FormatError::MalformedXml {
        part: name.to_string(),
        reason,
    })
}

/// Maps relationship ids of the main document part to package entry names.
fn load_relationships(package: &Package) -> Result<BTreeMap<String, String>, FormatError> {
    let mut relationships = BTreeMap::new();
    if !package.contains(DOCUMENT_RELS_PART) {
        debug!("Document has no relationships part");
        return Ok(relationships);
    }
    let rels = parse_part(package, DOCUMENT_RELS_PART)?;
    let Some(root) = rels.root() else {
        return Ok(relationships);
    };
    for rel in root
        .child_elements()
        .filter(|el| el.local_name() == "Relationship")
    {
        if rel.attr("TargetMode") == Some("External") {
            continue;
        }
        if let (Some(id), Some(target)) = (rel.attr("Id"), rel.attr("Target")) {
            relationships.insert(id.to_string(), resolve_target(target));
        }
    }
    Ok(relationships)
}

/// Resolves a relationship target relative to `word/`.
fn resolve_target(target: &str) -> String {
    if let Some(absolute) = target.strip_prefix('/') {
        return absolute.to_string();
    }
    let mut segments: Vec<&str> = vec!["word"];
    for segment in target.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                segments.pop();
            }
            other => segments.push(other),
        }
    }
    segments.join("/")
}

fn collect_sections(
    body: &Element,
    relationships: &BTreeMap<String, String>,
    package: &Package,
) -> Vec<Section> {
    let mut sections = Vec::new();
    for child in body.child_elements() {
        let sect_pr = match child.local_name() {
            "sectPr" => Some(child),
            "p" => child
                .find_local("pPr")
                .and_then(|ppr| ppr.find_local("sectPr")),
            _ => None,
        };
        let Some(sect_pr) = sect_pr else {
            continue;
        };

        let mut section = Section::default();
        for reference in sect_pr.child_elements() {
            let target = match reference.local_name() {
                "headerReference" => &mut section.headers,
                "footerReference" => &mut section.footers,
                _ => continue,
            };
            let kind = reference.attr_local("type").unwrap_or("default").to_string();
            let part = reference
                .attr_local("id")
                .and_then(|id| relationships.get(id));
            match part {
                Some(part) if package.contains(part) => target.push(PartRef {
                    kind,
                    part: part.clone(),
                }),
                _ => debug!(
                    reference = reference.local_name(),
                    "Skipping unresolved header/footer reference"
                ),
            }
        }
        sections.push(section);
    }
    sections
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::docx::builder::{DocumentBuilder, RunSpec};

    fn load(builder: DocumentBuilder) -> Document {
        Document::load(&builder.build().unwrap()).unwrap()
    }

    #[test]
    fn test_paragraph_text_concatenates_runs() {
        let doc = load(DocumentBuilder::new().paragraph(["Date: [", "DATE", "_LOSS]"]));
        let paragraphs = doc.paragraphs();
        assert_eq!(paragraphs.len(), 1);
        assert_eq!(paragraphs[0].runs().count(), 3);
        assert_eq!(paragraphs[0].text(), "Date: [DATE_LOSS]");
    }

    #[test]
    fn test_run_text_maps_tabs_and_breaks() {
        let doc = load(DocumentBuilder::new().paragraph(["a\tb\nc"]));
        assert_eq!(doc.paragraphs()[0].text(), "a\tb\nc");
    }

    #[test]
    fn test_run_format_is_read() {
        let doc = load(DocumentBuilder::new().paragraph([RunSpec::new("x")
            .bold()
            .italic()
            .underline("single")
            .font("Arial")
            .size(24)
            .color("FF0000")]));
        let format = doc.paragraphs()[0].runs().next().unwrap().format();
        assert_eq!(format.bold, Some(true));
        assert_eq!(format.italic, Some(true));
        assert_eq!(format.underline.as_deref(), Some("single"));
        assert_eq!(format.font_name.as_deref(), Some("Arial"));
        assert_eq!(format.font_size_half_points, Some(24));
        assert_eq!(format.color.as_deref(), Some("FF0000"));
        assert_eq!(format.style, None);
    }

    #[test]
    fn test_explicit_false_toggle() {
        let rpr = XmlDocument::parse(r#"<w:rPr><w:b w:val="0"/><w:i/></w:rPr>"#).unwrap();
        let format = RunFormat::from_properties(rpr.root().unwrap());
        assert_eq!(format.bold, Some(false));
        assert_eq!(format.italic, Some(true));
    }

    #[test]
    fn test_unmodified_save_is_identical() {
        let bytes = DocumentBuilder::new()
            .paragraph(["Hello"])
            .header(["Head"])
            .build()
            .unwrap();
        let doc = Document::load(&bytes).unwrap();
        assert_eq!(doc.save().unwrap(), bytes);
    }

    #[test]
    fn test_sections_resolve_header_and_footer_parts() {
        let doc = load(
            DocumentBuilder::new()
                .paragraph(["Body"])
                .header(["Head [INSURED_NAME]"])
                .footer(["Foot"]),
        );
        assert!(doc.has_sections());
        let section = &doc.sections()[0];
        assert_eq!(section.headers[0].part, "word/header1.xml");
        assert_eq!(section.headers[0].kind, "default");
        assert_eq!(section.footers[0].part, "word/footer1.xml");
        assert_eq!(doc.header_paragraphs(0)[0].text(), "Head [INSURED_NAME]");
        assert_eq!(doc.footer_paragraphs(0)[0].text(), "Foot");
        assert!(doc.header_paragraphs(5).is_empty());
    }

    #[test]
    fn test_document_without_sections() {
        let doc = load(DocumentBuilder::new().paragraph(["Body"]).without_sections());
        assert!(!doc.has_sections());
        assert_eq!(doc.region_text(Region::Header), "");
    }

    #[test]
    fn test_walk_order_and_tables() {
        let doc = load(
            DocumentBuilder::new()
                .paragraph(["one"])
                .table(&[&["cell a", "cell b"]])
                .paragraph(["two"])
                .header(["head"])
                .footer(["foot"]),
        );
        let mut seen = Vec::new();
        doc.for_each_paragraph(Scope::All, |region, p| seen.push((region, p.text())));
        assert_eq!(
            seen,
            vec![
                (Region::Body, "one".to_string()),
                (Region::Body, "two".to_string()),
                (Region::Body, "cell a".to_string()),
                (Region::Body, "cell b".to_string()),
                (Region::Header, "head".to_string()),
                (Region::Footer, "foot".to_string()),
            ]
        );
        assert_eq!(doc.tables().len(), 1);
        assert_eq!(doc.tables()[0].rows()[0][1].paragraphs()[0].text(), "cell b");
    }

    #[test]
    fn test_set_run_text_marks_part_dirty() {
        let mut doc = load(DocumentBuilder::new().paragraph([RunSpec::new("old").bold()]));
        doc.for_each_paragraph_mut(Scope::Body, |_, p| p.set_run_text(0, " new\tvalue "));
        assert_eq!(doc.modified_parts().collect::<Vec<_>>(), vec![DOCUMENT_PART]);

        let reloaded = Document::load(&doc.save().unwrap()).unwrap();
        let run = reloaded.paragraphs()[0].runs().next().unwrap();
        assert_eq!(run.text(), " new\tvalue ");
        assert_eq!(run.format().bold, Some(true));
    }

    #[test]
    fn test_replace_runs_keeps_position_and_format() {
        let mut doc = load(DocumentBuilder::new().paragraph([
            RunSpec::new("[").font("Arial").size(20),
            RunSpec::new("NAME").bold(),
            RunSpec::new("]"),
        ]));
        doc.for_each_paragraph_mut(Scope::All, |_, p| {
            let format = p.as_paragraph().runs().next().unwrap().format();
            p.replace_runs("Alice", &format);
            true
        });
        let reloaded = Document::load(&doc.save().unwrap()).unwrap();
        let paragraph = reloaded.paragraphs()[0];
        let runs: Vec<_> = paragraph.runs().collect();
        assert_eq!(runs.len(), 1);
        assert_eq!(runs[0].text(), "Alice");
        let format = runs[0].format();
        assert_eq!(format.font_name.as_deref(), Some("Arial"));
        assert_eq!(format.font_size_half_points, Some(20));
        assert_eq!(format.bold, None);
    }

    #[test]
    fn test_load_rejects_missing_parts() {
        let bytes = crate::docx::package::write_package([("word/document.xml", b"<w:document/>".as_slice())])
            .unwrap();
        assert!(matches!(
            Document::load(&bytes),
            Err(FormatError::MissingPart(part)) if part == CONTENT_TYPES_PART
        ));
        assert!(matches!(
            Document::load(b"plain text"),
            Err(FormatError::InvalidPackage(_))
        ));
    }

    #[test]
    fn test_load_rejects_malformed_document_xml() {
        let bytes = crate::docx::package::write_package([
            (CONTENT_TYPES_PART, b"<Types/>".as_slice()),
            (DOCUMENT_PART, b"<w:document><w:body>".as_slice()),
        ])
        .unwrap();
        assert!(matches!(
            Document::load(&bytes),
            Err(FormatError::MalformedXml { .. })
        ));
    }

    #[test]
    fn test_resolve_target() {
        assert_eq!(resolve_target("header1.xml"), "word/header1.xml");
        assert_eq!(resolve_target("../customXml/item1.xml"), "customXml/item1.xml");
        assert_eq!(resolve_target("/word/footer2.xml"), "word/footer2.xml");
    }
}
