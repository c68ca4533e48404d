//! Format dispatch for the file cleaning tools

use std::path::{Path, PathBuf};
use log::info;
use crate::config::WatermarkTarget;
use crate::error::{Error, Result};
use crate::{pdf, pptx};

/// Suffix appended to the file stem of cleaned copies
pub const DEFAULT_CLEAN_SUFFIX: &str = "-clean";

/// Document formats the cleaners understand
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentKind {
    Pdf,
    Pptx,
}

impl DocumentKind {
    /// Pick the format from the file extension (case-insensitive)
    pub fn from_path(path: &Path) -> Result<Self> {
        let extension = path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(str::to_lowercase);

        match extension.as_deref() {
            Some("pdf") => Ok(Self::Pdf),
            Some("pptx") => Ok(Self::Pptx),
            _ => Err(Error::UnsupportedFormat(path.to_path_buf())),
        }
    }
}

/// `<dir>/<stem><suffix>.<ext>` next to `input`
pub fn default_output_path(input: &Path, suffix: &str) -> PathBuf {
    let stem = input
        .file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_default();

    let name = match input.extension() {
        Some(ext) => format!("{}{}.{}", stem, suffix, ext.to_string_lossy().to_lowercase()),
        None => format!("{}{}", stem, suffix),
    };
    input.with_file_name(name)
}

/// Copy `input` to `output` and strip the watermark from the copy
///
/// Returns the number of removals: annotations plus scrubbed images for a
/// PDF, cleaned layouts for a presentation.
pub fn clean_copy(input: &Path, output: &Path, target: &WatermarkTarget) -> Result<usize> {
    if !input.exists() {
        return Err(Error::FileNotFound(input.to_path_buf()));
    }
    let kind = DocumentKind::from_path(input)?;

    if input != output {
        std::fs::copy(input, output)?;
    }

    let removed = match kind {
        DocumentKind::Pdf => pdf::remove_watermark(output, target)?.total(),
        DocumentKind::Pptx => pptx::remove_pptx_watermark(output, target)?.layouts_cleaned,
    };

    info!("{} -> {}: {} removal(s)", input.display(), output.display(), removed);
    Ok(removed)
}

/// Write a metadata-free copy of `input` to `output`, by format
pub fn nuke_file_metadata(input: &Path, output: &Path) -> Result<DocumentKind> {
    if !input.exists() {
        return Err(Error::FileNotFound(input.to_path_buf()));
    }
    let kind = DocumentKind::from_path(input)?;

    match kind {
        DocumentKind::Pdf => pdf::nuke_metadata(input, output)?,
        DocumentKind::Pptx => pptx::nuke_pptx_metadata(input, output)?,
    }

    Ok(kind)
}
