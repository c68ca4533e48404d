//! Error types for the scrubkit library

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias using our Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for the scrubkit library
#[derive(Error, Debug)]
pub enum Error {
    /// PDF processing error
    #[error("PDF error: {0}")]
    Pdf(#[from] lopdf::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Malformed or unreadable zip archive
    #[error("Archive error: {0}")]
    Zip(#[from] zip::result::ZipError),

    /// Malformed XML part
    #[error("XML error: {0}")]
    Xml(#[from] quick_xml::Error),

    /// Malformed XML attribute
    #[error("XML attribute error: {0}")]
    XmlAttr(#[from] quick_xml::events::attributes::AttrError),

    /// Network failure or non-2xx response
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Unexpected JSON payload
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// CSV serialization error
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// Raster image could not be decoded
    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),

    /// File not found
    #[error("File not found: {}", .0.display())]
    FileNotFound(PathBuf),

    /// Invalid PDF (no pages)
    #[error("PDF has no pages: {}", .0.display())]
    EmptyPdf(PathBuf),

    /// Wrong password for an encrypted PDF
    #[error("Could not decrypt {}: incorrect password", .0.display())]
    IncorrectPassword(PathBuf),

    /// File extension is not one we know how to process
    #[error("Unsupported file type: {}", .0.display())]
    UnsupportedFormat(PathBuf),

    /// Required setting missing from flags and environment
    #[error("{0} is required")]
    MissingConfig(String),

    /// Page contained no downloadable images
    #[error("No images found at {0}")]
    NoImagesFound(String),

    /// Invalid glob pattern
    #[error("Invalid glob pattern: {0}")]
    InvalidGlob(String),

    /// No files matched pattern
    #[error("No files found matching pattern: {0}")]
    NoFilesMatched(String),

    /// General error
    #[error("{0}")]
    General(String),
}
