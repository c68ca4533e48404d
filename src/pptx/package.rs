//! In-memory view of an OOXML (zip) package
//!
//! The whole archive is read into memory. Parts are replaced by name and the
//! package is written back either entry-for-entry (untouched entries copied raw,
//! keeping their bytes and compression) or fully re-deflated.

use std::collections::BTreeMap;
use std::io::{Cursor, Read, Seek, Write};
use std::path::Path;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};
use crate::atomic::write_atomically;
use crate::error::{Error, Result};

/// How [`Package::write_to`] treats entries
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Repack {
    /// Copy untouched entries raw; replaced entries keep their compression method
    Preserve,
    /// Decompress everything and write it back deflated
    Deflate,
}

#[derive(Debug, Clone)]
struct EntryInfo {
    name: String,
    compression: CompressionMethod,
    is_dir: bool,
}

/// An opened presentation package
pub struct Package {
    archive: ZipArchive<Cursor<Vec<u8>>>,
    entries: Vec<EntryInfo>,
    replacements: BTreeMap<String, Vec<u8>>,
}

impl Package {
    /// Load a package from disk
    pub fn open(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(Error::FileNotFound(path.to_path_buf()));
        }
        Self::from_bytes(std::fs::read(path)?)
    }

    /// Load a package from bytes
    pub fn from_bytes(bytes: Vec<u8>) -> Result<Self> {
        let mut archive = ZipArchive::new(Cursor::new(bytes))?;

        let mut entries = Vec::with_capacity(archive.len());
        for i in 0..archive.len() {
            let file = archive.by_index_raw(i)?;
            entries.push(EntryInfo {
                name: file.name().to_string(),
                compression: file.compression(),
                is_dir: file.is_dir(),
            });
        }

        Ok(Self {
            archive,
            entries,
            replacements: BTreeMap::new(),
        })
    }

    /// Entry names in archive order
    pub fn part_names(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|entry| entry.name.as_str())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.iter().any(|entry| entry.name == name)
    }

    /// Current content of a part, including pending replacements
    pub fn read_part(&mut self, name: &str) -> Result<Option<Vec<u8>>> {
        if let Some(data) = self.replacements.get(name) {
            return Ok(Some(data.clone()));
        }
        if !self.contains(name) {
            return Ok(None);
        }

        let mut file = self.archive.by_name(name)?;
        let mut data = Vec::with_capacity(file.size() as usize);
        file.read_to_end(&mut data)?;
        Ok(Some(data))
    }

    /// Replace the content of an existing part
    pub fn replace_part(&mut self, name: &str, data: Vec<u8>) -> Result<()> {
        if !self.contains(name) {
            return Err(Error::General(format!("No part named {} in package", name)));
        }
        self.replacements.insert(name.to_string(), data);
        Ok(())
    }

    /// Whether any part has been replaced
    pub fn is_modified(&self) -> bool {
        !self.replacements.is_empty()
    }

    /// Write the package as a zip archive
    pub fn write_to<W: Write + Seek>(&mut self, out: W, mode: Repack) -> Result<()> {
        let mut writer = ZipWriter::new(out);

        for (index, entry) in self.entries.iter().enumerate() {
            let compression = match mode {
                Repack::Preserve => entry.compression,
                Repack::Deflate => CompressionMethod::Deflated,
            };
            let options = SimpleFileOptions::default().compression_method(compression);

            if entry.is_dir {
                writer.add_directory(entry.name.as_str(), options)?;
            } else if let Some(data) = self.replacements.get(&entry.name) {
                writer.start_file(entry.name.as_str(), options)?;
                writer.write_all(data)?;
            } else if mode == Repack::Preserve {
                writer.raw_copy_file(self.archive.by_index_raw(index)?)?;
            } else {
                let mut file = self.archive.by_index(index)?;
                writer.start_file(entry.name.as_str(), options)?;
                std::io::copy(&mut file, &mut writer)?;
            }
        }

        writer.finish()?;
        Ok(())
    }

    /// Write the package to `path` through a temporary file
    pub fn save(&mut self, path: &Path, mode: Repack) -> Result<()> {
        write_atomically(path, |file| self.write_to(file, mode))
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    /// Build a zip from (name, content) pairs, all stored uncompressed
    pub(crate) fn build_zip(parts: &[(&str, &str)]) -> Vec<u8> {
        let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
        let options = SimpleFileOptions::default().compression_method(CompressionMethod::Stored);
        for (name, content) in parts {
            writer.start_file(*name, options).unwrap();
            writer.write_all(content.as_bytes()).unwrap();
        }
        writer.finish().unwrap().into_inner()
    }

    fn compression_of(bytes: Vec<u8>, name: &str) -> CompressionMethod {
        let mut archive = ZipArchive::new(Cursor::new(bytes)).unwrap();
        let compression = archive.by_name(name).unwrap().compression();
        compression
    }

    #[test]
    fn test_read_and_replace() {
        let mut package = Package::from_bytes(build_zip(&[("a.xml", "<a/>"), ("b.xml", "<b/>")])).unwrap();

        assert_eq!(package.part_names().collect::<Vec<_>>(), vec!["a.xml", "b.xml"]);
        assert_eq!(package.read_part("a.xml").unwrap().unwrap(), b"<a/>");
        assert!(package.read_part("missing.xml").unwrap().is_none());
        assert!(!package.is_modified());

        package.replace_part("b.xml", b"<c/>".to_vec()).unwrap();
        assert!(package.is_modified());
        assert_eq!(package.read_part("b.xml").unwrap().unwrap(), b"<c/>");
        assert!(package.replace_part("missing.xml", Vec::new()).is_err());
    }

    #[test]
    fn test_preserve_keeps_compression() {
        let mut package = Package::from_bytes(build_zip(&[("a.xml", "<a/>"), ("b.xml", "<b/>")])).unwrap();
        package.replace_part("b.xml", b"<c/>".to_vec()).unwrap();

        let mut out = Cursor::new(Vec::new());
        package.write_to(&mut out, Repack::Preserve).unwrap();
        let bytes = out.into_inner();

        assert_eq!(compression_of(bytes.clone(), "a.xml"), CompressionMethod::Stored);
        assert_eq!(compression_of(bytes.clone(), "b.xml"), CompressionMethod::Stored);

        let mut reopened = Package::from_bytes(bytes).unwrap();
        assert_eq!(reopened.read_part("a.xml").unwrap().unwrap(), b"<a/>");
        assert_eq!(reopened.read_part("b.xml").unwrap().unwrap(), b"<c/>");
    }

    #[test]
    fn test_deflate_recompresses_everything() {
        let mut package = Package::from_bytes(build_zip(&[("a.xml", "<a/>")])).unwrap();

        let mut out = Cursor::new(Vec::new());
        package.write_to(&mut out, Repack::Deflate).unwrap();
        let bytes = out.into_inner();

        assert_eq!(compression_of(bytes.clone(), "a.xml"), CompressionMethod::Deflated);
        let mut reopened = Package::from_bytes(bytes).unwrap();
        assert_eq!(reopened.read_part("a.xml").unwrap().unwrap(), b"<a/>");
    }

    #[test]
    fn test_not_a_zip() {
        assert!(matches!(
            Package::from_bytes(b"plain text".to_vec()),
            Err(Error::Zip(_))
        ));
    }
}
