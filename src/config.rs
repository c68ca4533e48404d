//! Defaults and environment variable names shared by the library and CLI

/// Environment variable holding the PDF to clean in place
pub const PDF_FILE_ENV: &str = "PDF_FILE";

/// Environment variable holding the PPTX to clean in place
pub const PPTX_FILE_ENV: &str = "PPTX_FILE";

/// Environment variable holding the job site session cookie
pub const JOBS_COOKIE_ENV: &str = "IIMJOBS_COOKIE";

/// Environment variable holding the CSV output path
pub const JOBS_CSV_PATH_ENV: &str = "IIMJOBS_CSV_PATH";

/// Default CSV output file for the jobs export
pub const JOBS_DEFAULT_OUTPUT: &str = "iimjobs_applied_jobs.csv";

/// Host that watermark hyperlinks point at
pub const DEFAULT_WATERMARK_HOST: &str = "gamma.app";

/// Pixel width of the watermark badge image
pub const DEFAULT_WATERMARK_WIDTH: i64 = 575;

/// Pixel height of the watermark badge image
pub const DEFAULT_WATERMARK_HEIGHT: i64 = 137;

/// What to look for when stripping a watermark
///
/// Links are matched by a case-insensitive substring of their URI; images are
/// matched by their exact declared pixel size.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WatermarkTarget {
    /// Marker substring looked for in hyperlink targets (lowercase)
    pub host: String,
    /// Exact image width in pixels
    pub image_width: i64,
    /// Exact image height in pixels
    pub image_height: i64,
}

impl WatermarkTarget {
    /// Build a target, normalising the host marker to lowercase
    pub fn new(host: &str, image_width: i64, image_height: i64) -> Self {
        Self {
            host: host.to_lowercase(),
            image_width,
            image_height,
        }
    }

    /// Whether a hyperlink target contains the marker
    pub fn matches_uri(&self, uri: &str) -> bool {
        !self.host.is_empty() && uri.to_lowercase().contains(&self.host)
    }

    /// Whether an image of this size is the watermark
    pub fn matches_size(&self, width: i64, height: i64) -> bool {
        width == self.image_width && height == self.image_height
    }
}

impl Default for WatermarkTarget {
    fn default() -> Self {
        Self::new(
            DEFAULT_WATERMARK_HOST,
            DEFAULT_WATERMARK_WIDTH,
            DEFAULT_WATERMARK_HEIGHT,
        )
    }
}
