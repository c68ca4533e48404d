//! Watermark removal for PDF documents
//!
//! A watermark here is two things: link annotations pointing at the watermark
//! host, and a badge image of a known pixel size. Links are dropped from the
//! page's `/Annots`. Badge images are shrunk to a single blank pixel and every
//! `q ... /Name Do ... Q` bracket that paints them is cut out of the page's
//! content stream, so sibling drawing keeps its graphics state.

use std::collections::HashSet;
use std::path::Path;
use lopdf::content::{Content, Operation};
use lopdf::{Dictionary, Document, Object, ObjectId, Stream};
use log::{debug, info};
use crate::atomic::write_atomically;
use crate::config::WatermarkTarget;
use crate::error::{Error, Result};

/// Raw payload of one opaque black pixel in DeviceRGB
pub const BLANK_PIXEL: [u8; 3] = [0x00, 0x00, 0x00];

/// Image keys that would make the blank payload undecodable
const STRIPPED_IMAGE_KEYS: [&[u8]; 4] = [b"Filter", b"DecodeParms", b"SMask", b"Mask"];

/// Guards against cyclic `/Parent` chains when looking up inherited resources
const MAX_PAGE_TREE_DEPTH: usize = 64;

/// Counts of what a cleaning pass removed
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RemovalReport {
    /// Link annotations dropped from pages
    pub annotations_removed: usize,
    /// Distinct image objects blanked
    pub images_scrubbed: usize,
    /// Save/restore brackets cut out of content streams
    pub draw_spans_removed: usize,
}

impl RemovalReport {
    /// Number of watermark elements removed (annotations plus images)
    pub fn total(&self) -> usize {
        self.annotations_removed + self.images_scrubbed
    }
}

/// An image resource that matched the watermark size
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetImage {
    /// Resource name used by `Do` (without the leading slash)
    pub name: Vec<u8>,
    /// Indirect object holding the image stream
    pub id: ObjectId,
}

/// The parts of a content-stream operator that bracket matching cares about
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DrawOp<'a> {
    /// `q`
    Save,
    /// `Q`
    Restore,
    /// `/Name Do`
    PaintXObject(&'a [u8]),
    /// Anything else
    Other,
}

impl<'a> DrawOp<'a> {
    /// Classify a decoded operation
    pub fn classify(operation: &'a Operation) -> Self {
        match operation.operator.as_str() {
            "q" => DrawOp::Save,
            "Q" => DrawOp::Restore,
            "Do" => match operation.operands.first() {
                Some(Object::Name(name)) => DrawOp::PaintXObject(name.as_slice()),
                _ => DrawOp::Other,
            },
            _ => DrawOp::Other,
        }
    }
}

/// Remove the watermark from a PDF file in place
///
/// The file is only rewritten when something was removed; otherwise it is left
/// untouched on disk.
///
/// # Example
///
/// ```no_run
/// use scrubkit::config::WatermarkTarget;
/// use scrubkit::pdf::remove_watermark;
/// use std::path::Path;
///
/// let report = remove_watermark(Path::new("deck.pdf"), &WatermarkTarget::default())
///     .expect("Failed to clean PDF");
/// println!("Removed {} element(s)", report.total());
/// ```
pub fn remove_watermark(path: &Path, target: &WatermarkTarget) -> Result<RemovalReport> {
    if !path.exists() {
        return Err(Error::FileNotFound(path.to_path_buf()));
    }

    let mut doc = Document::load(path)?;
    let report = clean_document(&mut doc, target)?;

    if report.total() == 0 {
        info!("{}: no watermark elements found", path.display());
        return Ok(report);
    }

    // Dropped annotations are left as unreferenced objects
    doc.prune_objects();
    write_atomically(path, |file| {
        doc.save_to(file)?;
        Ok(())
    })?;

    info!(
        "{}: removed {} annotation(s), scrubbed {} image(s), cut {} draw span(s)",
        path.display(),
        report.annotations_removed,
        report.images_scrubbed,
        report.draw_spans_removed,
    );

    Ok(report)
}

/// Remove the watermark from every page of a loaded document
///
/// Targets are located on all pages before any image is scrubbed, so an image
/// shared between pages is still recognised (and its draws cut) on each of them.
pub fn clean_document(doc: &mut Document, target: &WatermarkTarget) -> Result<RemovalReport> {
    let mut report = RemovalReport::default();
    let page_ids: Vec<ObjectId> = doc.get_pages().into_values().collect();

    let mut matched_pages: Vec<(ObjectId, Vec<TargetImage>)> = Vec::new();
    for page_id in page_ids {
        report.annotations_removed += filter_annotations(doc, page_id, target)?;

        let images = find_target_images(doc, page_id, target);
        if !images.is_empty() {
            matched_pages.push((page_id, images));
        }
    }

    let mut scrubbed: HashSet<ObjectId> = HashSet::new();
    for image in matched_pages.iter().flat_map(|(_, images)| images) {
        if !scrubbed.insert(image.id) {
            continue;
        }
        if let Object::Stream(ref mut stream) = doc.get_object_mut(image.id)? {
            scrub_image(stream);
        }
    }
    report.images_scrubbed = scrubbed.len();

    for (page_id, images) in matched_pages {
        let names: HashSet<Vec<u8>> = images.into_iter().map(|image| image.name).collect();
        let removed = strip_draw_commands(doc, page_id, &names)?;
        debug!("page {:?}: cut {} draw span(s)", page_id, removed);
        report.draw_spans_removed += removed;
    }

    Ok(report)
}

/// Whether an annotation is a link whose action URI contains the watermark host
pub fn is_target_annotation(doc: &Document, annotation: &Object, target: &WatermarkTarget) -> bool {
    let Some(annotation) = resolve_dict(doc, annotation) else {
        return false;
    };
    let Some(action) = annotation.get(b"A").ok().and_then(|a| resolve_dict(doc, a)) else {
        return false;
    };

    match action.get(b"URI").map(|uri| resolve(doc, uri)) {
        Ok(Object::String(bytes, _)) => target.matches_uri(&String::from_utf8_lossy(bytes)),
        _ => false,
    }
}

/// Whether an image XObject dictionary has exactly the watermark's pixel size
pub fn is_target_image(dict: &Dictionary, target: &WatermarkTarget) -> bool {
    let is_image = matches!(dict.get(b"Subtype").and_then(|s| s.as_name()), Ok(b"Image"));
    if !is_image {
        return false;
    }

    let width = dict.get(b"Width").and_then(|w| w.as_i64());
    let height = dict.get(b"Height").and_then(|h| h.as_i64());
    match (width, height) {
        (Ok(width), Ok(height)) => target.matches_size(width, height),
        _ => false,
    }
}

/// Find the image resources on a page that match the watermark size
///
/// Resources inherited from an ancestor page-tree node are included.
pub fn find_target_images(doc: &Document, page_id: ObjectId, target: &WatermarkTarget) -> Vec<TargetImage> {
    let xobjects = page_resources(doc, page_id)
        .and_then(|resources| resources.get(b"XObject").ok())
        .and_then(|xobjects| resolve_dict(doc, xobjects));

    let Some(xobjects) = xobjects else {
        return Vec::new();
    };

    xobjects
        .iter()
        .filter_map(|(name, object)| {
            // Streams are always indirect
            let Object::Reference(id) = object else {
                return None;
            };
            match doc.get_object(*id) {
                Ok(Object::Stream(stream)) if is_target_image(&stream.dict, target) => {
                    Some(TargetImage { name: name.clone(), id: *id })
                }
                _ => None,
            }
        })
        .collect()
}

/// Replace an image's pixels with a single blank pixel
///
/// The object keeps its identity, so any other reference to it stays valid.
/// Running this twice gives the same result.
pub fn scrub_image(stream: &mut Stream) {
    stream.dict.set("Width", Object::Integer(1));
    stream.dict.set("Height", Object::Integer(1));
    stream.dict.set("BitsPerComponent", Object::Integer(8));
    stream.dict.set("ColorSpace", Object::Name(b"DeviceRGB".to_vec()));
    for key in STRIPPED_IMAGE_KEYS {
        stream.dict.remove(key);
    }
    stream.set_content(BLANK_PIXEL.to_vec());
}

/// Cut every bracket that paints one of `targets` out of an operator list
///
/// Returns the number of spans removed. A target painted inside a span that is
/// already being removed is not counted again.
pub fn excise_draw_commands(operations: &mut Vec<Operation>, targets: &HashSet<Vec<u8>>) -> usize {
    let spans = draw_spans(operations, targets);
    if spans.is_empty() {
        return 0;
    }

    let mut remove = vec![false; operations.len()];
    for &(start, end) in &spans {
        for flag in &mut remove[start..=end] {
            *flag = true;
        }
    }

    let mut flags = remove.into_iter();
    operations.retain(|_| !flags.next().unwrap_or(false));

    spans.len()
}

/// Compute the inclusive `(start, end)` spans that paint a target
///
/// Each span runs from the nearest unmatched `q` before the `Do` to the `Q`
/// that closes it. Without an enclosing `q`, or without a closing `Q`, the span
/// is the `Do` alone. The result is sorted and non-overlapping.
pub fn draw_spans(operations: &[Operation], targets: &HashSet<Vec<u8>>) -> Vec<(usize, usize)> {
    let ops: Vec<DrawOp> = operations.iter().map(DrawOp::classify).collect();
    let mut spans: Vec<(usize, usize)> = Vec::new();

    for (index, op) in ops.iter().enumerate() {
        let DrawOp::PaintXObject(name) = op else {
            continue;
        };
        if !targets.contains(*name) {
            continue;
        }
        if spans.last().is_some_and(|&(_, end)| index <= end) {
            continue;
        }

        let (mut start, mut end) = match (enclosing_save(&ops, index), matching_restore(&ops, index)) {
            (Some(start), Some(end)) => (start, end),
            _ => (index, index),
        };

        // A later hit can sit in a bracket that encloses earlier spans
        while let Some(&(last_start, last_end)) = spans.last() {
            if start > last_end {
                break;
            }
            spans.pop();
            start = start.min(last_start);
            end = end.max(last_end);
        }
        spans.push((start, end));
    }

    spans
}

/// Walk back from `index` to the `q` that opens its graphics-state scope
fn enclosing_save(ops: &[DrawOp], index: usize) -> Option<usize> {
    let mut depth = 0usize;
    for j in (0..index).rev() {
        match ops[j] {
            DrawOp::Restore => depth += 1,
            DrawOp::Save if depth == 0 => return Some(j),
            DrawOp::Save => depth -= 1,
            _ => {}
        }
    }
    None
}

/// Walk forward from `index` to the `Q` that closes its graphics-state scope
fn matching_restore(ops: &[DrawOp], index: usize) -> Option<usize> {
    let mut depth = 0usize;
    for (k, op) in ops.iter().enumerate().skip(index + 1) {
        match op {
            DrawOp::Save => depth += 1,
            DrawOp::Restore if depth == 0 => return Some(k),
            DrawOp::Restore => depth -= 1,
            _ => {}
        }
    }
    None
}

/// Drop watermark links from a page's `/Annots`, returning how many were dropped
fn filter_annotations(doc: &mut Document, page_id: ObjectId, target: &WatermarkTarget) -> Result<usize> {
    let annotations: Vec<Object> = {
        let page = doc.get_dictionary(page_id)?;
        match page.get(b"Annots").map(|annots| resolve(doc, annots)) {
            Ok(Object::Array(annots)) => annots.clone(),
            _ => return Ok(0),
        }
    };

    let kept: Vec<Object> = annotations
        .iter()
        .filter(|annotation| !is_target_annotation(doc, annotation, target))
        .cloned()
        .collect();

    let removed = annotations.len() - kept.len();
    if removed == 0 {
        return Ok(0);
    }

    if let Object::Dictionary(ref mut page) = doc.get_object_mut(page_id)? {
        if kept.is_empty() {
            page.remove(b"Annots");
        } else {
            page.set("Annots", Object::Array(kept));
        }
    }

    Ok(removed)
}

/// Rewrite a page's content without the brackets that paint `names`
fn strip_draw_commands(doc: &mut Document, page_id: ObjectId, names: &HashSet<Vec<u8>>) -> Result<usize> {
    if names.is_empty() || !doc.get_dictionary(page_id)?.has(b"Contents") {
        return Ok(0);
    }

    let mut content = Content::decode(&doc.get_page_content(page_id)?)?;
    let removed = excise_draw_commands(&mut content.operations, names);
    if removed == 0 {
        return Ok(0);
    }

    // Replace Contents with one new stream holding the edited operators
    let stream_id = doc.add_object(Stream::new(Dictionary::new(), content.encode()?));
    if let Object::Dictionary(ref mut page) = doc.get_object_mut(page_id)? {
        page.set("Contents", Object::Reference(stream_id));
    }

    Ok(removed)
}

/// The resource dictionary in effect for a page, following `/Parent` if needed
fn page_resources(doc: &Document, page_id: ObjectId) -> Option<&Dictionary> {
    let mut node = doc.get_dictionary(page_id).ok()?;
    for _ in 0..MAX_PAGE_TREE_DEPTH {
        if let Ok(resources) = node.get(b"Resources") {
            return resolve_dict(doc, resources);
        }
        match node.get(b"Parent") {
            Ok(Object::Reference(parent_id)) => node = doc.get_dictionary(*parent_id).ok()?,
            _ => return None,
        }
    }
    None
}

fn resolve<'a>(doc: &'a Document, object: &'a Object) -> &'a Object {
    match object {
        Object::Reference(id) => doc.get_object(*id).unwrap_or(object),
        _ => object,
    }
}

fn resolve_dict<'a>(doc: &'a Document, object: &'a Object) -> Option<&'a Dictionary> {
    match resolve(doc, object) {
        Object::Dictionary(dict) => Some(dict),
        Object::Stream(stream) => Some(&stream.dict),
        _ => None,
    }
}
