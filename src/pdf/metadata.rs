//! PDF metadata: inspection and removal

use std::path::Path;
use lopdf::{Dictionary, Document, Object, ObjectId, StringFormat};
use log::info;
use crate::atomic::write_atomically;
use crate::error::{Error, Result};

/// Document information keys blanked by [`nuke_metadata`]
pub const SCRUBBED_INFO_KEYS: [&str; 8] = [
    "Title",
    "Author",
    "Subject",
    "Keywords",
    "Creator",
    "Producer",
    "CreationDate",
    "ModDate",
];

/// Object id of the document catalog
fn catalog_id(doc: &Document) -> Result<ObjectId> {
    let catalog_ref = doc.trailer.get(b"Root")
        .map_err(|_| Error::General("No Root in trailer".to_string()))?;

    match catalog_ref {
        Object::Reference(id) => Ok(*id),
        _ => Err(Error::General("Root is not a reference".to_string())),
    }
}

/// Count pages by reading the Count field from the Pages dictionary
/// This is more reliable than get_pages() which doesn't handle nested page trees
pub(crate) fn count_pages_from_catalog(doc: &Document) -> Result<usize> {
    let catalog = doc.get_dictionary(catalog_id(doc)?)?;

    let pages_id = match catalog.get(b"Pages") {
        Ok(Object::Reference(id)) => *id,
        Ok(_) => return Err(Error::General("Pages is not a reference".to_string())),
        Err(_) => return Err(Error::General("No Pages in catalog".to_string())),
    };

    let count = doc.get_dictionary(pages_id)?
        .get(b"Count")
        .map_err(|_| Error::General("No Count in Pages".to_string()))?;

    match count {
        Object::Integer(n) => usize::try_from(*n)
            .map_err(|_| Error::General(format!("Invalid page Count {}", n))),
        _ => Err(Error::General("Count is not an integer".to_string())),
    }
}

/// PDF metadata
#[derive(Debug, Clone)]
pub struct PdfMetadata {
    /// Number of pages in the PDF
    pub page_count: usize,
    /// Document title (if present)
    pub title: Option<String>,
    /// Document author (if present)
    pub author: Option<String>,
    /// Producing application (if present)
    pub producer: Option<String>,
    /// Whether the file still carries an /Encrypt dictionary
    pub encrypted: bool,
}

/// Extract metadata from a PDF file
pub fn extract_metadata(path: &Path) -> Result<PdfMetadata> {
    if !path.exists() {
        return Err(Error::FileNotFound(path.to_path_buf()));
    }

    let doc = Document::load(path)?;
    let page_count = count_pages_from_catalog(&doc)?;

    if page_count == 0 {
        return Err(Error::EmptyPdf(path.to_path_buf()));
    }

    let info = match doc.trailer.get(b"Info") {
        Ok(Object::Reference(id)) => doc.get_dictionary(*id).ok(),
        Ok(Object::Dictionary(dict)) => Some(dict),
        _ => None,
    };

    Ok(PdfMetadata {
        page_count,
        title: info.and_then(|dict| info_string(dict, b"Title")),
        author: info.and_then(|dict| info_string(dict, b"Author")),
        producer: info.and_then(|dict| info_string(dict, b"Producer")),
        encrypted: doc.trailer.has(b"Encrypt"),
    })
}

/// Count the number of pages in a PDF file
///
/// This is a quick operation that reads the Count field from the Pages dictionary.
pub fn count_pages(path: &Path) -> Result<usize> {
    if !path.exists() {
        return Err(Error::FileNotFound(path.to_path_buf()));
    }

    let doc = Document::load(path)?;
    let page_count = count_pages_from_catalog(&doc)?;

    if page_count == 0 {
        return Err(Error::EmptyPdf(path.to_path_buf()));
    }

    Ok(page_count)
}

/// Write a copy of `input` to `output` with its document metadata blanked
///
/// Every key in [`SCRUBBED_INFO_KEYS`] becomes an empty string, `/Trapped`
/// becomes `/False`, and the catalog's XMP `/Metadata` stream is detached.
/// Pages are carried over unchanged.
pub fn nuke_metadata(input: &Path, output: &Path) -> Result<()> {
    if !input.exists() {
        return Err(Error::FileNotFound(input.to_path_buf()));
    }

    let mut doc = Document::load(input)?;
    scrub_document_metadata(&mut doc)?;

    // The old Info dictionary and XMP stream are now unreferenced
    doc.prune_objects();
    write_atomically(output, |file| {
        doc.save_to(file)?;
        Ok(())
    })?;

    info!("{}: metadata removed, written to {}", input.display(), output.display());
    Ok(())
}

/// Blank the document information dictionary and detach XMP metadata
pub fn scrub_document_metadata(doc: &mut Document) -> Result<()> {
    let mut info = Dictionary::new();
    for key in SCRUBBED_INFO_KEYS {
        info.set(key, Object::String(Vec::new(), StringFormat::Literal));
    }
    info.set("Trapped", Object::Name(b"False".to_vec()));

    let info_id = doc.add_object(info);
    doc.trailer.set("Info", Object::Reference(info_id));

    let catalog_id = catalog_id(doc)?;
    if let Object::Dictionary(ref mut catalog) = doc.get_object_mut(catalog_id)? {
        catalog.remove(b"Metadata");
    }

    Ok(())
}

/// Read a text string from the info dictionary (PDFDocEncoding or UTF-16BE)
fn info_string(dict: &Dictionary, key: &[u8]) -> Option<String> {
    let bytes = dict.get(key).ok()?.as_str().ok()?;

    if let Some(utf16) = bytes.strip_prefix(b"\xFE\xFF") {
        let units: Vec<u16> = utf16
            .chunks_exact(2)
            .map(|pair| u16::from_be_bytes([pair[0], pair[1]]))
            .collect();
        return String::from_utf16(&units).ok();
    }

    Some(String::from_utf8_lossy(bytes).into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;
    use lopdf::{dictionary, Stream};

    #[test]
    fn test_count_pages_nonexistent_file() {
        let result = count_pages(Path::new("nonexistent.pdf"));
        assert!(result.is_err());
        assert!(matches!(result.unwrap_err(), Error::FileNotFound(_)));
    }

    #[test]
    fn test_extract_metadata_nonexistent_file() {
        let result = extract_metadata(Path::new("nonexistent.pdf"));
        assert!(result.is_err());
        assert!(matches!(result.unwrap_err(), Error::FileNotFound(_)));
    }

    #[test]
    fn test_nuke_metadata_nonexistent_file() {
        let result = nuke_metadata(Path::new("nonexistent.pdf"), Path::new("out.pdf"));
        assert!(matches!(result.unwrap_err(), Error::FileNotFound(_)));
    }

    #[test]
    fn test_info_string_decodes_utf16() {
        let dict = dictionary! {
            "Title" => Object::String(vec![0xFE, 0xFF, 0x00, 0x48, 0x00, 0x69], StringFormat::Hexadecimal),
            "Author" => Object::String(b"Ada".to_vec(), StringFormat::Literal),
        };
        assert_eq!(info_string(&dict, b"Title").as_deref(), Some("Hi"));
        assert_eq!(info_string(&dict, b"Author").as_deref(), Some("Ada"));
        assert_eq!(info_string(&dict, b"Subject"), None);
    }

    #[test]
    fn test_scrub_document_metadata() {
        let mut doc = Document::with_version("1.5");
        let xmp_id = doc.add_object(Stream::new(dictionary! { "Type" => "Metadata" }, b"<x:xmpmeta/>".to_vec()));
        let pages_id = doc.add_object(dictionary! {
            "Type" => "Pages",
            "Kids" => Vec::<Object>::new(),
            "Count" => Object::Integer(0),
        });
        let catalog_id = doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
            "Metadata" => xmp_id,
        });
        let old_info = doc.add_object(dictionary! {
            "Author" => Object::String(b"Someone".to_vec(), StringFormat::Literal),
        });
        doc.trailer.set("Root", catalog_id);
        doc.trailer.set("Info", old_info);

        scrub_document_metadata(&mut doc).unwrap();

        let info_id = doc.trailer.get(b"Info").unwrap().as_reference().unwrap();
        let info = doc.get_dictionary(info_id).unwrap();
        for key in SCRUBBED_INFO_KEYS {
            assert_eq!(info.get(key.as_bytes()).unwrap().as_str().unwrap(), b"");
        }
        assert_eq!(info.get(b"Trapped").unwrap().as_name().unwrap(), b"False");
        assert!(!doc.get_dictionary(catalog_id).unwrap().has(b"Metadata"));
    }

    #[test]
    fn test_negative_page_count_is_rejected() {
        let mut doc = Document::with_version("1.5");
        let pages_id = doc.add_object(dictionary! {
            "Type" => "Pages",
            "Kids" => Vec::<Object>::new(),
            "Count" => Object::Integer(-1),
        });
        let catalog_id = doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
        });
        doc.trailer.set("Root", catalog_id);

        let err = count_pages_from_catalog(&doc).unwrap_err();
        assert!(matches!(err, Error::General(_)));
    }
}
