//! Removing password protection from PDFs

use std::collections::{BTreeMap, HashSet};
use std::path::Path;
use lopdf::encryption::DecryptionError;
use lopdf::xref::XrefEntry;
use lopdf::{Document, Object, Reader};
use log::{debug, info, warn};
use crate::atomic::write_atomically;
use crate::error::{Error, Result};
use crate::pdf::metadata::count_pages_from_catalog;

/// What [`unlock_pdf`] had to do
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnlockOutcome {
    /// The input was encrypted and has been decrypted
    Decrypted,
    /// The input was not encrypted and was copied through
    NotEncrypted,
}

/// Write a decrypted copy of `input` to `output`
///
/// A wrong password is reported as [`Error::IncorrectPassword`]; the output
/// is not written in that case.
///
/// # Example
///
/// ```no_run
/// use scrubkit::pdf::{unlock_pdf, UnlockOutcome};
/// use std::path::Path;
///
/// match unlock_pdf(Path::new("locked.pdf"), Path::new("open.pdf"), "secret") {
///     Ok(UnlockOutcome::Decrypted) => println!("unlocked"),
///     Ok(UnlockOutcome::NotEncrypted) => println!("was not protected"),
///     Err(e) => eprintln!("{}", e),
/// }
/// ```
pub fn unlock_pdf(input: &Path, output: &Path, password: &str) -> Result<UnlockOutcome> {
    if !input.exists() {
        return Err(Error::FileNotFound(input.to_path_buf()));
    }

    let buffer = std::fs::read(input)?;
    let mut doc = Document::load_mem(&buffer).map_err(|e| map_decryption_error(e, input))?;

    let outcome = if doc.is_encrypted() {
        if doc.encryption_state.is_some() {
            // Opened with the empty user password; objects are already in the clear
            debug!("{} opens without a user password", input.display());
        } else {
            doc = load_encrypted_objects(&buffer, doc);
            doc.decrypt(password).map_err(|e| map_decryption_error(e, input))?;
        }
        doc = into_plain_document(doc);
        verify_page_count(&doc, input)?;
        UnlockOutcome::Decrypted
    } else {
        warn!("{} is not password protected; copying", input.display());
        UnlockOutcome::NotEncrypted
    };

    write_atomically(output, |file| {
        doc.save_to(file)?;
        Ok(())
    })?;

    info!("{}: unlocked to {}", input.display(), output.display());
    Ok(outcome)
}

/// Parse every object the loader left out of a password-protected file
///
/// `Document::load` keeps only the `/Encrypt` dictionary when the empty
/// password does not open the file. The remaining objects are read here,
/// still encrypted, so that `decrypt` can process them.
fn load_encrypted_objects(buffer: &[u8], doc: Document) -> Document {
    let reader = Reader {
        buffer,
        document: doc,
        encryption_state: None,
        raw_objects: BTreeMap::new(),
    };

    let mut parsed = BTreeMap::new();
    for (&number, entry) in &reader.document.reference_table.entries {
        let XrefEntry::Normal { generation, .. } = *entry else {
            continue;
        };
        let id = (number, generation);
        if reader.document.objects.contains_key(&id) {
            continue;
        }
        match reader.get_object(id, &mut HashSet::new()) {
            Ok(object) => {
                parsed.insert(id, object);
            }
            Err(e) => warn!("Skipping unreadable object {} {}: {}", id.0, id.1, e),
        }
    }

    let mut doc = reader.document;
    doc.objects.extend(parsed);
    doc
}

/// Check that the decrypted page tree is complete
fn verify_page_count(doc: &Document, path: &Path) -> Result<usize> {
    let found = doc.get_pages().len();
    if found == 0 {
        return Err(Error::EmptyPdf(path.to_path_buf()));
    }

    let declared = count_pages_from_catalog(doc)?;
    if declared != found {
        return Err(Error::General(format!(
            "{}: decrypted page tree has {} page(s), catalog declares {}",
            path.display(),
            found,
            declared
        )));
    }

    Ok(found)
}

/// Move the decrypted objects into a fresh document without `/Encrypt`
///
/// The new document carries no encryption state, so saving it writes the
/// objects in the clear.
fn into_plain_document(mut doc: Document) -> Document {
    if let Some(Object::Reference(id)) = doc.trailer.remove(b"Encrypt") {
        doc.objects.remove(&id);
    }

    let mut plain = Document::with_version(doc.version.clone());
    plain.objects = std::mem::take(&mut doc.objects);
    plain.trailer = doc.trailer.clone();
    plain.max_id = doc.max_id;
    plain
}

fn map_decryption_error(error: lopdf::Error, path: &Path) -> Error {
    match error {
        lopdf::Error::Decryption(DecryptionError::IncorrectPassword) => {
            Error::IncorrectPassword(path.to_path_buf())
        }
        other => Error::Pdf(other),
    }
}
