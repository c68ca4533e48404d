//! PowerPoint (OOXML) package manipulation

pub mod package;
pub mod relationships;
pub mod layout;
pub mod metadata;

pub use package::{Package, Repack};
pub use layout::{remove_pptx_watermark, LayoutReport};
pub use metadata::nuke_pptx_metadata;
