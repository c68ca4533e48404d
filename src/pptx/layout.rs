//! Watermark removal from presentation slide layouts
//!
//! A watermark is a `p:pic` in a slide layout whose click action
//! (`a:hlinkClick`) points at a hyperlink relationship targeting the marker
//! host. The picture goes, and so do the hyperlink relationship and the
//! relationships of the images the picture embedded.

use std::collections::HashSet;
use std::path::Path;
use quick_xml::events::{BytesStart, Event};
use quick_xml::name::{Namespace, ResolveResult};
use quick_xml::reader::NsReader;
use quick_xml::Writer;
use log::{debug, info};
use crate::config::WatermarkTarget;
use crate::error::Result;
use super::package::{Package, Repack};
use super::relationships::{parse_relationships, rels_path_for, remove_relationships};

/// DrawingML main namespace (`a:`)
pub const DRAWINGML_NS: &[u8] = b"http://schemas.openxmlformats.org/drawingml/2006/main";
/// PresentationML namespace (`p:`)
pub const PRESENTATIONML_NS: &[u8] = b"http://schemas.openxmlformats.org/presentationml/2006/main";
/// Office document relationships namespace (`r:`)
pub const RELATIONSHIPS_NS: &[u8] = b"http://schemas.openxmlformats.org/officeDocument/2006/relationships";

const LAYOUT_DIR: &str = "ppt/slideLayouts/";

/// What [`remove_pptx_watermark`] removed
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LayoutReport {
    pub layouts_cleaned: usize,
    pub pictures_removed: usize,
    pub relationships_removed: usize,
}

/// Result of scrubbing one layout part
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PictureRemoval {
    pub xml: Vec<u8>,
    pub removed: usize,
    /// `r:embed` ids of the images inside removed pictures
    pub embedded_ids: HashSet<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Tag {
    Picture,
    ClickAction,
    Blip,
    Other,
}

fn classify(ns: &ResolveResult, local: &[u8]) -> Tag {
    match (ns, local) {
        (ResolveResult::Bound(Namespace(uri)), b"pic") if *uri == PRESENTATIONML_NS => Tag::Picture,
        (ResolveResult::Bound(Namespace(uri)), b"hlinkClick") if *uri == DRAWINGML_NS => Tag::ClickAction,
        (ResolveResult::Bound(Namespace(uri)), b"blip") if *uri == DRAWINGML_NS => Tag::Blip,
        _ => Tag::Other,
    }
}

/// Whether `name` is a slide layout part
pub fn is_layout_part(name: &str) -> bool {
    name.strip_prefix(LAYOUT_DIR)
        .map_or(false, |file| !file.contains('/') && file.ends_with(".xml"))
}

/// Remove every watermark picture from the layouts of the presentation at `path`
///
/// The file is only rewritten when something was removed; otherwise it is left
/// byte-for-byte as it was.
///
/// # Example
///
/// ```no_run
/// use scrubkit::config::WatermarkTarget;
/// use scrubkit::pptx::remove_pptx_watermark;
/// use std::path::Path;
///
/// let report = remove_pptx_watermark(Path::new("deck.pptx"), &WatermarkTarget::default())
///     .expect("Failed to clean presentation");
/// println!("{} layouts cleaned", report.layouts_cleaned);
/// ```
pub fn remove_pptx_watermark(path: &Path, target: &WatermarkTarget) -> Result<LayoutReport> {
    let mut package = Package::open(path)?;
    let report = clean_package(&mut package, target)?;

    if package.is_modified() {
        package.save(path, Repack::Preserve)?;
        info!(
            "{}: cleaned {} layout(s), removed {} picture(s) and {} relationship(s)",
            path.display(),
            report.layouts_cleaned,
            report.pictures_removed,
            report.relationships_removed
        );
    } else {
        info!("{}: no watermark found", path.display());
    }

    Ok(report)
}

/// Scrub every slide layout of an opened package
pub fn clean_package(package: &mut Package, target: &WatermarkTarget) -> Result<LayoutReport> {
    let mut layouts: Vec<String> = package
        .part_names()
        .filter(|name| is_layout_part(name))
        .map(str::to_string)
        .collect();
    layouts.sort();

    let mut report = LayoutReport::default();

    for layout in layouts {
        let rels_name = rels_path_for(&layout);
        let Some(rels_xml) = package.read_part(&rels_name)? else {
            continue;
        };

        let link_ids: HashSet<String> = parse_relationships(&rels_xml)?
            .into_iter()
            .filter(|rel| rel.is_hyperlink_to(&target.host))
            .filter_map(|rel| rel.id)
            .collect();
        if link_ids.is_empty() {
            continue;
        }

        let Some(layout_xml) = package.read_part(&layout)? else {
            continue;
        };
        let pictures = remove_linked_pictures(&layout_xml, &link_ids)?;

        let mut doomed = link_ids;
        doomed.extend(pictures.embedded_ids);
        let (new_rels, rels_removed) = remove_relationships(&rels_xml, &doomed)?;

        if pictures.removed == 0 && rels_removed == 0 {
            continue;
        }

        debug!(
            "{}: removed {} picture(s), {} relationship(s)",
            layout, pictures.removed, rels_removed
        );
        if pictures.removed > 0 {
            package.replace_part(&layout, pictures.xml)?;
        }
        if rels_removed > 0 {
            package.replace_part(&rels_name, new_rels)?;
        }

        report.layouts_cleaned += 1;
        report.pictures_removed += pictures.removed;
        report.relationships_removed += rels_removed;
    }

    Ok(report)
}

/// Drop each `p:pic` whose `a:hlinkClick` `r:id` is one of `link_ids`
///
/// Elements are recognised by namespace URI, so any prefix works. Pictures are
/// buffered until their end tag and only then written out or discarded.
pub fn remove_linked_pictures(xml: &[u8], link_ids: &HashSet<String>) -> Result<PictureRemoval> {
    let mut reader = NsReader::from_reader(xml);
    let mut writer = Writer::new(Vec::with_capacity(xml.len()));
    let mut result = PictureRemoval::default();

    // Events of the picture currently being read
    let mut picture: Vec<Event> = Vec::new();
    let mut depth = 0usize;
    let mut linked = false;
    let mut blips: HashSet<String> = HashSet::new();

    loop {
        let (ns, event) = reader.read_resolved_event()?;
        let tag = match &event {
            Event::Start(e) | Event::Empty(e) => classify(&ns, e.local_name().as_ref()),
            _ => Tag::Other,
        };

        if let Event::Eof = event {
            break;
        }

        if depth == 0 {
            if tag == Tag::Picture && matches!(event, Event::Start(_)) {
                depth = 1;
                linked = false;
                blips.clear();
                picture.push(event);
            } else {
                writer.write_event(event)?;
            }
            continue;
        }

        match &event {
            Event::Start(e) | Event::Empty(e) => {
                match tag {
                    Tag::ClickAction => {
                        if relationship_attr(&reader, e, b"id")?.map_or(false, |id| link_ids.contains(&id)) {
                            linked = true;
                        }
                    }
                    Tag::Blip => {
                        if let Some(id) = relationship_attr(&reader, e, b"embed")? {
                            blips.insert(id);
                        }
                    }
                    _ => {}
                }
                if matches!(event, Event::Start(_)) {
                    depth += 1;
                }
            }
            Event::End(_) => depth -= 1,
            _ => {}
        }
        picture.push(event);

        if depth == 0 {
            if linked {
                result.removed += 1;
                result.embedded_ids.extend(blips.drain());
                picture.clear();
            } else {
                for buffered in picture.drain(..) {
                    writer.write_event(buffered)?;
                }
            }
        }
    }

    // Unterminated picture: keep what was read
    for buffered in picture.drain(..) {
        writer.write_event(buffered)?;
    }

    result.xml = writer.into_inner();
    Ok(result)
}

/// Value of an attribute in the relationships namespace (`r:id`, `r:embed`)
fn relationship_attr<R>(reader: &NsReader<R>, e: &BytesStart, local: &[u8]) -> Result<Option<String>> {
    for attr in e.attributes() {
        let attr = attr?;
        let (ns, name) = reader.resolve_attribute(attr.key);
        let in_rel_ns = matches!(ns, ResolveResult::Bound(Namespace(uri)) if uri == RELATIONSHIPS_NS);
        if in_rel_ns && name.as_ref() == local {
            return Ok(Some(attr.unescape_value()?.into_owned()));
        }
    }
    Ok(None)
}
