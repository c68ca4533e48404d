//! scrubkit library
//!
//! A toolbox of small document and data utilities:
//! - Remove hyperlinked watermark badges from PDF pages and PPTX slide layouts
//! - Blank document metadata of PDF and PPTX files
//! - Decrypt password-protected PDFs
//! - Download a web comic chapter into a PDF
//! - Export applied jobs from iimjobs.com to CSV
//!
//! # Example
//!
//! ```no_run
//! use scrubkit::config::WatermarkTarget;
//! use scrubkit::pdf::remove_watermark;
//! use std::path::Path;
//!
//! let report = remove_watermark(Path::new("slides.pdf"), &WatermarkTarget::default())
//!     .expect("Failed to clean PDF");
//! println!("Removed {} watermark object(s)", report.total());
//! ```

pub mod error;
pub mod config;
pub mod atomic;
pub mod pdf;
pub mod pptx;
pub mod clean;
pub mod comic;
pub mod jobs;

// Re-export commonly used items
pub use error::{Error, Result};
