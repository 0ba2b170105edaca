//! Package format detection.
//!
//! The tool only repairs Word documents, but an uploaded file can be
//! anything. Detection distinguishes "not a package at all" from "an Office
//! package of the wrong kind" so the caller can report a precise error.

use crate::container::DocxContainer;
use crate::error::{Error, Result};

/// ZIP file magic bytes: PK\x03\x04
const ZIP_MAGIC: [u8; 4] = [0x50, 0x4B, 0x03, 0x04];

/// Content type for the DOCX main document part.
const DOCX_CONTENT_TYPE: &str =
    "application/vnd.openxmlformats-officedocument.wordprocessingml.document.main+xml";

/// Content type for the XLSX workbook part.
const XLSX_CONTENT_TYPE: &str =
    "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet.main+xml";

/// Content type for the PPTX presentation part.
const PPTX_CONTENT_TYPE: &str =
    "application/vnd.openxmlformats-officedocument.presentationml.presentation.main+xml";

/// Detected OOXML package kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PackageKind {
    /// Microsoft Word document (.docx)
    Docx,
    /// Microsoft Excel workbook (.xlsx)
    Xlsx,
    /// Microsoft PowerPoint presentation (.pptx)
    Pptx,
}

impl PackageKind {
    /// Returns a human-readable name for this package kind.
    pub fn name(&self) -> &'static str {
        match self {
            PackageKind::Docx => "Word Document",
            PackageKind::Xlsx => "Excel Workbook",
            PackageKind::Pptx => "PowerPoint Presentation",
        }
    }
}

impl std::fmt::Display for PackageKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Check if data starts with ZIP magic bytes.
pub fn is_zip_file(data: &[u8]) -> bool {
    data.len() >= 4 && data[..4] == ZIP_MAGIC
}

/// Detect the package kind from raw bytes.
///
/// Verifies the ZIP magic, then inspects `[Content_Types].xml`; if the
/// content types are inconclusive, falls back to the format-specific folder
/// layout (`word/`, `xl/`, `ppt/`).
pub fn detect_package_kind(data: &[u8]) -> Result<PackageKind> {
    if !is_zip_file(data) {
        return Err(Error::UnknownFormat);
    }

    let container = DocxContainer::from_bytes(data.to_vec())?;
    detect_from_container(&container)
}

/// Detect the package kind from an already-loaded container.
pub fn detect_from_container(container: &DocxContainer) -> Result<PackageKind> {
    let content_types = container
        .read_xml("[Content_Types].xml")
        .map_err(|_| Error::MissingComponent("[Content_Types].xml".to_string()))?;

    if content_types.contains(DOCX_CONTENT_TYPE) {
        return Ok(PackageKind::Docx);
    }
    if content_types.contains(XLSX_CONTENT_TYPE) {
        return Ok(PackageKind::Xlsx);
    }
    if content_types.contains(PPTX_CONTENT_TYPE) {
        return Ok(PackageKind::Pptx);
    }

    // Fallback: format-specific folders
    let names = container.list_files();
    let has_word = names.iter().any(|n| n.starts_with("word/"));
    let has_xl = names.iter().any(|n| n.starts_with("xl/"));
    let has_ppt = names.iter().any(|n| n.starts_with("ppt/"));

    match (has_word, has_xl, has_ppt) {
        (true, false, false) => Ok(PackageKind::Docx),
        (false, true, false) => Ok(PackageKind::Xlsx),
        (false, false, true) => Ok(PackageKind::Pptx),
        _ => Err(Error::UnknownFormat),
    }
}

/// Confirm a loaded container is a Word document.
pub fn require_docx(container: &DocxContainer) -> Result<()> {
    match detect_from_container(container)? {
        PackageKind::Docx => Ok(()),
        other => Err(Error::UnsupportedFormat(other.name().to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Cursor, Write};

    fn package_with(content_type: &str, folder: &str) -> Vec<u8> {
        let mut zip = zip::ZipWriter::new(Cursor::new(Vec::new()));
        let opts = zip::write::SimpleFileOptions::default();
        zip.start_file("[Content_Types].xml", opts).unwrap();
        zip.write_all(
            format!("<Types><Override ContentType=\"{}\"/></Types>", content_type).as_bytes(),
        )
        .unwrap();
        zip.start_file(format!("{}/placeholder.xml", folder), opts)
            .unwrap();
        zip.write_all(b"<x/>").unwrap();
        zip.finish().unwrap().into_inner()
    }

    #[test]
    fn test_package_kind_display() {
        assert_eq!(PackageKind::Docx.to_string(), "Word Document");
        assert_eq!(PackageKind::Xlsx.to_string(), "Excel Workbook");
        assert_eq!(PackageKind::Pptx.to_string(), "PowerPoint Presentation");
    }

    #[test]
    fn test_is_zip_file() {
        assert!(is_zip_file(&[0x50, 0x4B, 0x03, 0x04, 0x00]));
        assert!(!is_zip_file(&[0x00, 0x00, 0x00, 0x00]));
        assert!(!is_zip_file(&[0x50, 0x4B])); // Too short
    }

    #[test]
    fn test_detect_invalid_data() {
        let result = detect_package_kind(&[0x00, 0x00, 0x00, 0x00]);
        assert!(matches!(result, Err(Error::UnknownFormat)));
    }

    #[test]
    fn test_detect_docx() {
        let data = package_with(DOCX_CONTENT_TYPE, "word");
        assert_eq!(detect_package_kind(&data).unwrap(), PackageKind::Docx);
    }

    #[test]
    fn test_detect_by_folder_fallback() {
        let data = package_with("application/xml", "xl");
        assert_eq!(detect_package_kind(&data).unwrap(), PackageKind::Xlsx);
    }

    #[test]
    fn test_require_docx_rejects_xlsx() {
        let data = package_with(XLSX_CONTENT_TYPE, "xl");
        let container = DocxContainer::from_bytes(data).unwrap();
        let result = require_docx(&container);
        match result {
            Err(Error::UnsupportedFormat(name)) => assert_eq!(name, "Excel Workbook"),
            other => panic!("expected UnsupportedFormat, got {:?}", other),
        }
    }
}
