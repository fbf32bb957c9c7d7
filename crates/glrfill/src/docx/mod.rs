//! DOCX package handling: zip container, XML parts and the structural
//! document model the placeholder engine works on.

#[cfg(any(test, feature = "test-util"))]
pub mod builder;
pub mod model;
pub mod package;
pub mod xml;

#[cfg(any(test, feature = "test-util"))]
pub use builder::{DocumentBuilder, RunSpec};
pub use model::{
    Document, Paragraph, ParagraphMut, PartRef, Region, Run, RunFormat, Scope, Section, Table,
    TableCell, DOCUMENT_PART,
};
pub use package::{Package, RewrittenPackage};
