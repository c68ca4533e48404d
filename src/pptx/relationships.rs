//! Parsing and filtering of OOXML relationship (`.rels`) parts

use std::collections::HashSet;
use quick_xml::events::{BytesStart, Event};
use quick_xml::{Reader, Writer};
use crate::error::Result;

/// Relationship type fragment identifying hyperlinks
pub const HYPERLINK_TYPE: &str = "hyperlink";

/// One `<Relationship>` entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Relationship {
    pub id: Option<String>,
    pub rel_type: String,
    pub target: String,
}

impl Relationship {
    /// True for hyperlink relationships whose target contains `host`
    pub fn is_hyperlink_to(&self, host: &str) -> bool {
        !host.is_empty()
            && self.rel_type.contains(HYPERLINK_TYPE)
            && self.target.to_lowercase().contains(&host.to_lowercase())
    }
}

/// Path of the relationships part belonging to `part`
///
/// `ppt/slideLayouts/slideLayout1.xml` → `ppt/slideLayouts/_rels/slideLayout1.xml.rels`
pub fn rels_path_for(part: &str) -> String {
    match part.rsplit_once('/') {
        Some((dir, file)) => format!("{}/_rels/{}.rels", dir, file),
        None => format!("_rels/{}.rels", part),
    }
}

/// Read every relationship in document order
pub fn parse_relationships(xml: &[u8]) -> Result<Vec<Relationship>> {
    let mut reader = Reader::from_reader(xml);
    let mut relationships = Vec::new();

    loop {
        match reader.read_event()? {
            Event::Start(e) | Event::Empty(e) if is_relationship(&e) => {
                relationships.push(read_relationship(&e)?);
            }
            Event::Eof => break,
            _ => {}
        }
    }

    Ok(relationships)
}

/// Drop the relationships whose `Id` is in `ids`
///
/// Returns the rewritten part and the number of entries removed. Everything
/// else is written back event for event.
pub fn remove_relationships(xml: &[u8], ids: &HashSet<String>) -> Result<(Vec<u8>, usize)> {
    let mut reader = Reader::from_reader(xml);
    let mut writer = Writer::new(Vec::with_capacity(xml.len()));
    let mut removed = 0;
    // Depth inside a removed non-empty <Relationship>
    let mut skipping = 0usize;

    loop {
        let event = reader.read_event()?;

        if skipping > 0 {
            match event {
                Event::Start(_) => skipping += 1,
                Event::End(_) => skipping -= 1,
                Event::Eof => break,
                _ => {}
            }
            continue;
        }

        match event {
            Event::Empty(ref e) if is_relationship(e) && has_listed_id(e, ids)? => {
                removed += 1;
            }
            Event::Start(ref e) if is_relationship(e) && has_listed_id(e, ids)? => {
                removed += 1;
                skipping = 1;
            }
            Event::Eof => break,
            other => writer.write_event(other)?,
        }
    }

    Ok((writer.into_inner(), removed))
}

fn is_relationship(e: &BytesStart) -> bool {
    e.local_name().as_ref() == b"Relationship"
}

fn has_listed_id(e: &BytesStart, ids: &HashSet<String>) -> Result<bool> {
    Ok(read_relationship(e)?.id.map_or(false, |id| ids.contains(&id)))
}

fn read_relationship(e: &BytesStart) -> Result<Relationship> {
    let mut relationship = Relationship {
        id: None,
        rel_type: String::new(),
        target: String::new(),
    };

    for attr in e.attributes() {
        let attr = attr?;
        let value = attr.unescape_value()?.into_owned();
        match attr.key.local_name().as_ref() {
            b"Id" => relationship.id = Some(value),
            b"Type" => relationship.rel_type = value,
            b"Target" => relationship.target = value,
            _ => {}
        }
    }

    Ok(relationship)
}
