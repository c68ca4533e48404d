//! Building a PDF out of raster images, one image per page

use std::io::Write;
use std::path::Path;
use flate2::write::ZlibEncoder;
use flate2::Compression;
use image::{ColorType, GenericImageView, ImageFormat, RgbImage};
use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Dictionary, Document, Object, Stream};
use crate::atomic::write_atomically;
use crate::error::{Error, Result};

/// Resolution used to size pages from image pixels
pub const DEFAULT_DPI: f32 = 100.0;

/// An image ready to be placed on a page
#[derive(Debug, Clone)]
pub struct PageImage {
    /// Width in pixels
    pub width: u32,
    /// Height in pixels
    pub height: u32,
    stream: Stream,
}

impl PageImage {
    /// Decode image bytes of any supported format
    ///
    /// Baseline RGB or grayscale JPEGs are embedded as-is; everything else is
    /// converted to 8-bit RGB (dropping alpha) and flate-compressed.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let format = image::guess_format(bytes)?;
        let decoded = image::load_from_memory_with_format(bytes, format)?;
        let (width, height) = decoded.dimensions();

        if format == ImageFormat::Jpeg {
            let color_space: Option<&[u8]> = match decoded.color() {
                ColorType::Rgb8 => Some(b"DeviceRGB".as_slice()),
                ColorType::L8 => Some(b"DeviceGray".as_slice()),
                _ => None,
            };
            if let Some(color_space) = color_space {
                let dict = image_dictionary(width, height, color_space, b"DCTDecode");
                return Ok(Self {
                    width,
                    height,
                    stream: Stream::new(dict, bytes.to_vec()),
                });
            }
        }

        Self::from_rgb(&decoded.to_rgb8())
    }

    /// Wrap already decoded RGB pixels
    pub fn from_rgb(rgb: &RgbImage) -> Result<Self> {
        let (width, height) = rgb.dimensions();

        let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(rgb.as_raw())?;
        let compressed = encoder.finish()?;

        let dict = image_dictionary(width, height, b"DeviceRGB", b"FlateDecode");
        Ok(Self {
            width,
            height,
            stream: Stream::new(dict, compressed),
        })
    }

    /// Page size in points at the given resolution
    pub fn page_size(&self, dpi: f32) -> (f32, f32) {
        let scale = 72.0 / dpi;
        (self.width as f32 * scale, self.height as f32 * scale)
    }
}

fn image_dictionary(width: u32, height: u32, color_space: &[u8], filter: &[u8]) -> Dictionary {
    let mut dict = Dictionary::new();
    dict.set("Type", Object::Name(b"XObject".to_vec()));
    dict.set("Subtype", Object::Name(b"Image".to_vec()));
    dict.set("Width", Object::Integer(width as i64));
    dict.set("Height", Object::Integer(height as i64));
    dict.set("ColorSpace", Object::Name(color_space.to_vec()));
    dict.set("BitsPerComponent", Object::Integer(8));
    dict.set("Filter", Object::Name(filter.to_vec()));
    dict
}

/// Build a document with one full-bleed page per image
pub fn build_image_document(images: &[PageImage], dpi: f32) -> Result<Document> {
    if images.is_empty() {
        return Err(Error::General("No images to write".to_string()));
    }

    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();
    let mut kids: Vec<Object> = Vec::with_capacity(images.len());

    for image in images {
        let (width, height) = image.page_size(dpi);
        let image_id = doc.add_object(image.stream.clone());

        let content = Content {
            operations: vec![
                Operation::new("q", vec![]),
                Operation::new(
                    "cm",
                    vec![width.into(), 0.into(), 0.into(), height.into(), 0.into(), 0.into()],
                ),
                Operation::new("Do", vec![Object::Name(b"Im0".to_vec())]),
                Operation::new("Q", vec![]),
            ],
        };
        let content_id = doc.add_object(Stream::new(Dictionary::new(), content.encode()?));

        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "MediaBox" => vec![0.into(), 0.into(), width.into(), height.into()],
            "Contents" => content_id,
            "Resources" => dictionary! {
                "XObject" => dictionary! {
                    "Im0" => image_id,
                },
            },
        });
        kids.push(Object::Reference(page_id));
    }

    let mut pages = Dictionary::new();
    pages.set("Type", Object::Name(b"Pages".to_vec()));
    pages.set("Count", Object::Integer(kids.len() as i64));
    pages.set("Kids", Object::Array(kids));
    doc.objects.insert(pages_id, Object::Dictionary(pages));

    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", Object::Reference(catalog_id));

    Ok(doc)
}

/// Write `images` to `output` as a PDF, one page each
pub fn images_to_pdf(images: &[PageImage], output: &Path, dpi: f32) -> Result<()> {
    let mut doc = build_image_document(images, dpi)?;
    write_atomically(output, |file| {
        doc.save_to(file)?;
        Ok(())
    })
}
