//! Read-only inspection of a document's tables.
//!
//! Backs the CLI `info` command and lets callers verify a repair without
//! unpacking the archive themselves: table/row/cell counts, remaining
//! dark shading, and which tables carry a style or explicit borders.

use crate::container::DocxContainer;
use crate::detect;
use crate::error::Result;
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use serde::Serialize;

/// Summary of one table (nested tables are reported as separate entries,
/// in document order of their opening tags).
#[derive(Debug, Clone, Default, Serialize)]
pub struct TableSummary {
    pub rows: usize,
    pub cells: usize,
    /// Cells with an explicit non-auto fill or a theme fill.
    pub shaded_cells: usize,
    pub style: Option<String>,
    pub has_explicit_borders: bool,
}

/// Summary of a document body.
#[derive(Debug, Clone, Default, Serialize)]
pub struct DocumentSummary {
    pub tables: Vec<TableSummary>,
    /// Paragraphs outside any table.
    pub body_paragraphs: usize,
}

impl DocumentSummary {
    pub fn shaded_cells(&self) -> usize {
        self.tables.iter().map(|t| t.shaded_cells).sum()
    }
}

/// Summarize the tables of a docx file given as bytes.
pub fn summarize_bytes(data: &[u8]) -> Result<DocumentSummary> {
    if !detect::is_zip_file(data) {
        return Err(crate::error::Error::UnknownFormat);
    }
    let container = DocxContainer::from_bytes(data.to_vec())?;
    detect::require_docx(&container)?;
    let document = container.read_xml("word/document.xml")?;
    summarize_document_xml(&document)
}

/// Summarize the tables of a `word/document.xml` part.
pub fn summarize_document_xml(xml: &str) -> Result<DocumentSummary> {
    let mut reader = Reader::from_str(xml);
    let mut buf = Vec::new();

    let mut summary = DocumentSummary::default();
    // Indices into summary.tables for the currently open tables.
    let mut open_tables: Vec<usize> = Vec::new();
    // Local name stack for parent checks.
    let mut path: Vec<Vec<u8>> = Vec::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) => {
                let name = e.name().as_ref().to_vec();
                match name.as_slice() {
                    b"w:tbl" => {
                        summary.tables.push(TableSummary::default());
                        open_tables.push(summary.tables.len() - 1);
                    }
                    b"w:tr" => {
                        if let Some(&idx) = open_tables.last() {
                            summary.tables[idx].rows += 1;
                        }
                    }
                    b"w:tc" => {
                        if let Some(&idx) = open_tables.last() {
                            summary.tables[idx].cells += 1;
                        }
                    }
                    b"w:p" if open_tables.is_empty() => {
                        summary.body_paragraphs += 1;
                    }
                    _ => {}
                }
                path.push(name);
            }
            Ok(Event::Empty(e)) => {
                let parent = path.last().map(Vec::as_slice);
                match e.name().as_ref() {
                    b"w:p" if open_tables.is_empty() => summary.body_paragraphs += 1,
                    b"w:shd" if parent == Some(b"w:tcPr") => {
                        if let Some(&idx) = open_tables.last() {
                            if is_dark_shading(&e) {
                                summary.tables[idx].shaded_cells += 1;
                            }
                        }
                    }
                    b"w:tblStyle" if parent == Some(b"w:tblPr") => {
                        if let Some(&idx) = open_tables.last() {
                            summary.tables[idx].style = attr_value(&e, b"w:val");
                        }
                    }
                    _ => {}
                }
            }
            Ok(Event::End(e)) => {
                if e.name().as_ref() == b"w:tbl" {
                    open_tables.pop();
                }
                path.pop();
            }
            Ok(Event::Eof) => break,
            Ok(_) => {}
            Err(e) => return Err(crate::error::Error::XmlParse(e.to_string())),
        }

        // w:tblBorders opens as a Start event; flag the table once seen.
        if let (Some(last), Some(&idx)) = (path.last(), open_tables.last()) {
            if last.as_slice() == b"w:tblBorders"
                && path.iter().rev().nth(1).map(Vec::as_slice) == Some(b"w:tblPr")
            {
                summary.tables[idx].has_explicit_borders = true;
            }
        }
        buf.clear();
    }

    Ok(summary)
}

/// Whether a `w:shd` element paints the cell: any explicit fill other
/// than "auto", or a theme fill.
fn is_dark_shading(e: &BytesStart<'_>) -> bool {
    let mut filled = false;
    for attr in e.attributes().flatten() {
        match attr.key.as_ref() {
            b"w:fill" => {
                let value = attr.unescape_value().unwrap_or_default();
                if !value.is_empty() && !value.eq_ignore_ascii_case("auto") {
                    filled = true;
                }
            }
            b"w:themeFill" => filled = true,
            _ => {}
        }
    }
    filled
}

fn attr_value(e: &BytesStart<'_>, key: &[u8]) -> Option<String> {
    e.attributes()
        .flatten()
        .find(|a| a.key.as_ref() == key)
        .and_then(|a| a.unescape_value().ok().map(|v| v.into_owned()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_summarize_shaded_table() {
        let xml = "<w:document><w:body>\
                   <w:p><w:r><w:t>intro</w:t></w:r></w:p>\
                   <w:tbl><w:tblPr><w:tblStyle w:val=\"DarkList\"/></w:tblPr>\
                   <w:tr>\
                   <w:tc><w:tcPr><w:shd w:val=\"clear\" w:fill=\"1F1F1F\"/></w:tcPr><w:p/></w:tc>\
                   <w:tc><w:tcPr><w:shd w:val=\"clear\" w:fill=\"auto\"/></w:tcPr><w:p/></w:tc>\
                   </w:tr></w:tbl>\
                   </w:body></w:document>";
        let summary = summarize_document_xml(xml).unwrap();
        assert_eq!(summary.body_paragraphs, 1);
        assert_eq!(summary.tables.len(), 1);
        let table = &summary.tables[0];
        assert_eq!(table.rows, 1);
        assert_eq!(table.cells, 2);
        assert_eq!(table.shaded_cells, 1);
        assert_eq!(table.style.as_deref(), Some("DarkList"));
        assert!(!table.has_explicit_borders);
    }

    #[test]
    fn test_summarize_explicit_borders_and_nesting() {
        let xml = "<w:document><w:body><w:tbl>\
                   <w:tblPr><w:tblBorders><w:top w:val=\"single\" w:sz=\"6\" w:space=\"0\" w:color=\"000000\"/></w:tblBorders></w:tblPr>\
                   <w:tr><w:tc>\
                   <w:tbl><w:tr><w:tc><w:tcPr><w:shd w:val=\"clear\" w:themeFill=\"text1\"/></w:tcPr><w:p/></w:tc></w:tr></w:tbl>\
                   <w:p/></w:tc></w:tr></w:tbl></w:body></w:document>";
        let summary = summarize_document_xml(xml).unwrap();
        assert_eq!(summary.tables.len(), 2);
        assert!(summary.tables[0].has_explicit_borders);
        assert_eq!(summary.tables[0].shaded_cells, 0);
        assert_eq!(summary.tables[1].shaded_cells, 1);
        assert_eq!(summary.shaded_cells(), 1);
        assert_eq!(summary.body_paragraphs, 0);
    }

    #[test]
    fn test_summarize_no_tables() {
        let xml = "<w:document><w:body><w:p/><w:p/></w:body></w:document>";
        let summary = summarize_document_xml(xml).unwrap();
        assert!(summary.tables.is_empty());
        assert_eq!(summary.body_paragraphs, 2);
    }
}
