//! DOCX (Word) table repair.
//!
//! This module rewrites Microsoft Word documents in the Office Open XML
//! (.docx) format: it normalizes every table to plain black text on a
//! white background with visible borders.

mod inspect;
mod normalize;
mod styles;

pub use inspect::{summarize_bytes, summarize_document_xml, DocumentSummary, TableSummary};
pub use normalize::{normalize_document_xml, BorderMode, FixOptions, FixReport};
pub use styles::{StyleInfo, StyleMap, StyleType};
