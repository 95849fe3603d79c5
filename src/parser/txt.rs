use std::fs::File;
use std::io::Read;
use std::path::Path;

use super::FormatPlugin;
use crate::book::Book;
use crate::file::BookFile;
use crate::Registries;

const SAMPLE_SIZE: u64 = 4096;

/// Plain text files. Text carries no metadata, so only the encoding is
/// guessed from a leading sample.
pub struct TxtPlugin;

impl FormatPlugin for TxtPlugin {
    fn name(&self) -> &'static str {
        "txt"
    }

    fn accepts_file(&self, file: &BookFile) -> bool {
        file.extension() == "txt"
    }

    fn read_meta_info(&self, book: &mut Book, _registries: &mut Registries) -> bool {
        match read_sample(book.file().path()) {
            Ok(sample) => {
                if let Some(encoding) = detect_encoding(&sample) {
                    book.set_encoding(encoding);
                }
                true
            }
            Err(err) => {
                log::warn!("txt read error {}: {}", book.file().path().display(), err);
                false
            }
        }
    }
}

fn read_sample(path: &Path) -> Result<Vec<u8>, String> {
    let file = File::open(path).map_err(|err| err.to_string())?;
    let mut sample = Vec::new();
    file.take(SAMPLE_SIZE)
        .read_to_end(&mut sample)
        .map_err(|err| err.to_string())?;
    Ok(sample)
}

/// `utf-8` for a byte order mark or non-ASCII text that decodes as UTF-8.
/// Plain ASCII and anything else stays undecided.
fn detect_encoding(sample: &[u8]) -> Option<&'static str> {
    if sample.starts_with(&[0xEF, 0xBB, 0xBF]) {
        return Some("utf-8");
    }
    if sample.is_ascii() {
        return None;
    }
    match std::str::from_utf8(sample) {
        Ok(_) => Some("utf-8"),
        // a multi-byte sequence cut off by the sample boundary still counts
        Err(err) if err.error_len().is_none() => Some("utf-8"),
        Err(_) => None,
    }
}
