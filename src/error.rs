//! Error types for the unshade library.

use std::io;
use thiserror::Error;

/// Result type alias for unshade operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while repairing a document.
///
/// Per-cell and per-run cosmetic failures are never surfaced here; they are
/// counted in [`crate::FixReport`](crate::docx::FixReport) and processing
/// continues. Only failures that prevent loading or saving the package abort
/// an operation.
#[derive(Error, Debug)]
pub enum Error {
    /// I/O error during file operations.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// The input is not a ZIP-based package at all.
    #[error("Unknown file format (expected a .docx file)")]
    UnknownFormat,

    /// The package is OOXML but not a Word document.
    #[error("Unsupported format: {0} (expected a .docx file)")]
    UnsupportedFormat(String),

    /// Error reading or writing the ZIP archive.
    #[error("ZIP archive error: {0}")]
    ZipArchive(String),

    /// Error parsing XML content.
    #[error("XML parse error: {0}")]
    XmlParse(String),

    /// A required document part is missing from the package.
    #[error("Missing component: {0}")]
    MissingComponent(String),

    /// Invalid or malformed data in the document.
    #[error("Invalid data: {0}")]
    InvalidData(String),
}

impl From<zip::result::ZipError> for Error {
    fn from(err: zip::result::ZipError) -> Self {
        Error::ZipArchive(err.to_string())
    }
}

impl From<quick_xml::Error> for Error {
    fn from(err: quick_xml::Error) -> Self {
        Error::XmlParse(err.to_string())
    }
}
