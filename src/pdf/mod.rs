//! PDF manipulation module

pub mod watermark;
pub mod metadata;
pub mod unlock;
pub mod images;

// Re-export commonly used items
pub use watermark::{clean_document, remove_watermark, RemovalReport};
pub use metadata::{count_pages, extract_metadata, nuke_metadata, PdfMetadata};
pub use unlock::{unlock_pdf, UnlockOutcome};
pub use images::{images_to_pdf, PageImage, DEFAULT_DPI};
