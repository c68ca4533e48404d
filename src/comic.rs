//! Web comic chapter downloader
//!
//! Fetches a chapter page, picks out the WordPress content images
//! (`<img class="wp-image-…">`) in page order, downloads them and writes them
//! into a PDF with one image per page.

use std::path::{Path, PathBuf};
use log::{info, warn};
use reqwest::blocking::Client;
use reqwest::Url;
use scraper::{Html, Selector};
use crate::error::{Error, Result};
use crate::pdf::images::{images_to_pdf, PageImage, DEFAULT_DPI};

/// Desktop browser identity sent with every request
pub const USER_AGENT: &str = "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/91.0.4472.114 Safari/537.36";

/// Class token fragment marking chapter images
pub const IMAGE_CLASS_MARKER: &str = "wp-image";

const IMAGE_SELECTOR: &str = "img[src]";

/// Result of downloading one chapter
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChapterReport {
    pub output: PathBuf,
    pub pages: usize,
    pub skipped: usize,
}

/// HTTP client wrapper for chapter downloads
pub struct ComicDownloader {
    client: Client,
}

impl ComicDownloader {
    pub fn new() -> Result<Self> {
        let client = Client::builder().user_agent(USER_AGENT).build()?;
        Ok(Self { client })
    }

    /// GET `url` and return the body; non-2xx is an error
    pub fn fetch_page(&self, url: &str) -> Result<String> {
        Ok(self.client.get(url).send()?.error_for_status()?.text()?)
    }

    /// Download and decode one image
    pub fn fetch_image(&self, url: &str) -> Result<PageImage> {
        let bytes = self.client.get(url).send()?.error_for_status()?.bytes()?;
        PageImage::from_bytes(&bytes)
    }

    /// Download the chapter at `url` into `out_dir`
    ///
    /// Images that fail to download or decode are skipped with a warning. The
    /// chapter fails when the page has no chapter images or none of them could
    /// be fetched.
    pub fn download_chapter(&self, url: &str, out_dir: &Path) -> Result<ChapterReport> {
        info!("Fetching content from {}", url);
        let base = Url::parse(url).map_err(|e| Error::General(format!("Invalid URL {}: {}", url, e)))?;
        let html = self.fetch_page(url)?;

        let image_urls = extract_image_urls(&html, &base)?;
        if image_urls.is_empty() {
            return Err(Error::NoImagesFound(url.to_string()));
        }
        info!("Found {} images", image_urls.len());

        let mut images = Vec::with_capacity(image_urls.len());
        for (i, image_url) in image_urls.iter().enumerate() {
            info!("Downloading image {}/{}: {}", i + 1, image_urls.len(), image_url);
            match self.fetch_image(image_url) {
                Ok(image) => images.push(image),
                Err(e) => warn!("Skipping image {}: {}", image_url, e),
            }
        }

        if images.is_empty() {
            return Err(Error::General(format!("No images could be downloaded from {}", url)));
        }

        let output = out_dir.join(output_file_name(url));
        images_to_pdf(&images, &output, DEFAULT_DPI)?;
        info!("Saved {} page(s) to {}", images.len(), output.display());

        Ok(ChapterReport {
            output,
            pages: images.len(),
            skipped: image_urls.len() - images.len(),
        })
    }
}

/// Absolute `src` URLs of chapter images, in document order
///
/// An `<img>` qualifies when one of its class tokens contains
/// [`IMAGE_CLASS_MARKER`] and it has a non-empty `src`. Relative sources are
/// resolved against `base`.
pub fn extract_image_urls(html: &str, base: &Url) -> Result<Vec<String>> {
    let selector = Selector::parse(IMAGE_SELECTOR).map_err(|e| Error::General(e.to_string()))?;
    let document = Html::parse_document(html);

    let mut urls = Vec::new();
    for element in document.select(&selector) {
        let img = element.value();
        if !img.classes().any(|token| token.contains(IMAGE_CLASS_MARKER)) {
            continue;
        }
        let Some(src) = img.attr("src").map(str::trim).filter(|src| !src.is_empty()) else {
            continue;
        };

        match base.join(src) {
            Ok(url) => urls.push(url.to_string()),
            Err(e) => warn!("Ignoring image with bad src {:?}: {}", src, e),
        }
    }

    Ok(urls)
}

/// PDF file name for a chapter URL
///
/// The last path segment with `-` turned into `_` and each word capitalised:
/// `…/sakamoto-days-chapter-109/` → `Sakamoto_Days_Chapter_109.pdf`.
pub fn output_file_name(url: &str) -> String {
    let slug = url.trim_matches('/').rsplit('/').next().unwrap_or_default();
    format!("{}.pdf", title_case(&slug.replace('-', "_")))
}

/// Uppercase the first letter of every alphabetic run, lowercase the rest
fn title_case(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut in_word = false;

    for ch in text.chars() {
        if ch.is_alphabetic() {
            if in_word {
                out.extend(ch.to_lowercase());
            } else {
                out.extend(ch.to_uppercase());
            }
            in_word = true;
        } else {
            out.push(ch);
            in_word = false;
        }
    }

    out
}
