//! Document property scrubbing for presentations

use std::path::Path;
use quick_xml::events::{BytesText, Event};
use quick_xml::{Reader, Writer};
use log::{info, warn};
use crate::error::{Error, Result};
use super::package::{Package, Repack};

/// Core properties part (Dublin Core metadata)
pub const CORE_PROPERTIES_PART: &str = "docProps/core.xml";

/// Extended (application) properties part
pub const APP_PROPERTIES_PART: &str = "docProps/app.xml";

/// Core property elements whose text is cleared, by local name
pub const CORE_FIELDS: [&str; 9] = [
    "creator",
    "lastModifiedBy",
    "created",
    "modified",
    "title",
    "subject",
    "description",
    "keywords",
    "category",
];

/// Core property elements set to [`EPOCH_TIMESTAMP`] instead of emptied
pub const DATE_FIELDS: [&str; 2] = ["created", "modified"];

/// Extended property elements whose text is cleared, by local name
pub const APP_FIELDS: [&str; 2] = ["Company", "Manager"];

pub const EPOCH_TIMESTAMP: &str = "1970-01-01T00:00:00Z";

/// Write a copy of the presentation at `input` to `output` with its document
/// properties cleared
///
/// Every entry is re-written deflated. A property part that cannot be parsed
/// is kept as it was and reported with a warning.
pub fn nuke_pptx_metadata(input: &Path, output: &Path) -> Result<()> {
    let mut package = Package::open(input)?;

    for (part, fields, dates) in [
        (CORE_PROPERTIES_PART, &CORE_FIELDS[..], &DATE_FIELDS[..]),
        (APP_PROPERTIES_PART, &APP_FIELDS[..], &[][..]),
    ] {
        let Some(xml) = package.read_part(part)? else {
            continue;
        };
        match scrub_properties(&xml, fields, dates) {
            Ok(scrubbed) => package.replace_part(part, scrubbed)?,
            Err(e) => warn!("{}: leaving {} as is: {}", input.display(), part, e),
        }
    }

    package.save(output, Repack::Deflate)?;
    info!("{}: metadata removed, written to {}", input.display(), output.display());
    Ok(())
}

/// Clear the text of every element whose local name is in `fields`
///
/// Elements listed in `dates` get [`EPOCH_TIMESTAMP`] instead of empty text.
/// Attributes (such as `xsi:type`) and the rest of the document are kept.
pub fn scrub_properties(xml: &[u8], fields: &[&str], dates: &[&str]) -> Result<Vec<u8>> {
    let mut reader = Reader::from_reader(xml);
    let mut writer = Writer::new(Vec::with_capacity(xml.len()));
    // Depth inside a cleared element
    let mut clearing = 0usize;

    loop {
        let event = reader.read_event()?;

        if clearing > 0 {
            match event {
                Event::Start(_) => clearing += 1,
                Event::End(_) if clearing == 1 => {
                    clearing = 0;
                    writer.write_event(event)?;
                }
                Event::End(_) => clearing -= 1,
                Event::Eof => {
                    return Err(Error::General("Unexpected end of properties part".to_string()))
                }
                _ => {}
            }
            continue;
        }

        match event {
            Event::Start(ref e) => {
                let local = e.local_name();
                let name = std::str::from_utf8(local.as_ref()).unwrap_or_default();
                let cleared = fields.contains(&name);
                let dated = dates.contains(&name);
                writer.write_event(&event)?;
                if cleared {
                    clearing = 1;
                    if dated {
                        writer.write_event(Event::Text(BytesText::new(EPOCH_TIMESTAMP)))?;
                    }
                }
            }
            Event::Empty(ref e) => {
                let local = e.local_name();
                let name = std::str::from_utf8(local.as_ref()).unwrap_or_default();
                if fields.contains(&name) && dates.contains(&name) {
                    writer.write_event(Event::Start(e.clone()))?;
                    writer.write_event(Event::Text(BytesText::new(EPOCH_TIMESTAMP)))?;
                    writer.write_event(Event::End(e.to_end()))?;
                } else {
                    writer.write_event(&event)?;
                }
            }
            Event::Eof => break,
            other => writer.write_event(other)?,
        }
    }

    Ok(writer.into_inner())
}
