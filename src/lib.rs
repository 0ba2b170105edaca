//! # unshade
//!
//! Repair Word documents whose tables are unreadable: dark cell shading,
//! light text on dark fills, bold/italic noise. Every table in the
//! document is rewritten to plain black text on a white background with
//! visible borders; everything else in the file is preserved byte for
//! byte.
//!
//! ## Quick Start
//!
//! ```no_run
//! use unshade::{fix_file, fixed_filename, FixOptions};
//!
//! let (output, report) = fix_file("report.docx", &FixOptions::default())?;
//! println!("fixed {} tables", report.tables);
//! std::fs::write(fixed_filename("report.docx"), output)?;
//! # Ok::<(), unshade::Error>(())
//! ```
//!
//! In-memory use works the same way through [`fix_bytes`], which is what
//! servers hand uploaded files to:
//!
//! ```no_run
//! use unshade::{fix_bytes, BorderMode, FixOptions};
//!
//! let data = std::fs::read("report.docx")?;
//! let options = FixOptions::with_border_mode(BorderMode::ExplicitBorders);
//! let (fixed, report) = fix_bytes(&data, &options)?;
//! # Ok::<(), unshade::Error>(())
//! ```

pub mod container;
pub mod detect;
pub mod error;

pub mod docx;

// Re-exports
pub use container::DocxContainer;
pub use detect::{detect_package_kind, PackageKind};
pub use docx::{
    summarize_bytes, BorderMode, DocumentSummary, FixOptions, FixReport, StyleMap, TableSummary,
};
pub use error::{Error, Result};

use std::path::Path;

const DOCUMENT_PART: &str = "word/document.xml";
const STYLES_PART: &str = "word/styles.xml";

/// Fix every table in a docx file given as bytes.
///
/// Returns the rewritten file and a report of what changed. Only
/// `word/document.xml` is rewritten; all other archive entries are copied
/// through unchanged and in their original order.
pub fn fix_bytes(data: &[u8], options: &FixOptions) -> Result<(Vec<u8>, FixReport)> {
    if !detect::is_zip_file(data) {
        return Err(Error::UnknownFormat);
    }
    let mut container = DocxContainer::from_bytes(data.to_vec())?;
    detect::require_docx(&container)?;

    // A file without a style registry still gets its shading and run
    // fixes; only the paragraph reset needs styles.xml.
    let styles = if container.exists(STYLES_PART) {
        StyleMap::parse(&container.read_xml(STYLES_PART)?)?
    } else {
        StyleMap::default()
    };

    let document = container.read_xml(DOCUMENT_PART)?;
    let (fixed, report) = docx::normalize_document_xml(&document, &styles, options)?;
    container.replace_xml(DOCUMENT_PART, fixed)?;

    Ok((container.save()?, report))
}

/// Fix every table in a docx file on disk.
pub fn fix_file(path: impl AsRef<Path>, options: &FixOptions) -> Result<(Vec<u8>, FixReport)> {
    let data = std::fs::read(path.as_ref())?;
    fix_bytes(&data, options)
}

/// Derive the conventional output name for a fixed file:
/// `report.docx` becomes `report_fixed.docx`.
pub fn fixed_filename(input: &str) -> String {
    match input.strip_suffix(".docx") {
        Some(stem) => format!("{}_fixed.docx", stem),
        None => format!("{}_fixed.docx", input),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fixed_filename() {
        assert_eq!(fixed_filename("report.docx"), "report_fixed.docx");
        assert_eq!(fixed_filename("a/b/report.docx"), "a/b/report_fixed.docx");
        assert_eq!(fixed_filename("report"), "report_fixed.docx");
        assert_eq!(fixed_filename("report.DOCX"), "report.DOCX_fixed.docx");
    }

    #[test]
    fn test_fix_bytes_rejects_non_zip() {
        let err = fix_bytes(b"not a zip file", &FixOptions::default());
        assert!(matches!(err, Err(Error::UnknownFormat)));
    }
}
