use std::path::Path;

use lopdf::{Dictionary, Document, Object};

use super::FormatPlugin;
use crate::book::Book;
use crate::file::BookFile;
use crate::Registries;

/// PDF metadata from the document information dictionary.
pub struct PdfPlugin;

#[derive(Debug, Default, PartialEq)]
pub struct PdfMetadata {
    pub title: Option<String>,
    pub authors: Vec<String>,
    pub keywords: Vec<String>,
}

impl FormatPlugin for PdfPlugin {
    fn name(&self) -> &'static str {
        "pdf"
    }

    fn accepts_file(&self, file: &BookFile) -> bool {
        file.extension() == "pdf"
    }

    fn read_meta_info(&self, book: &mut Book, registries: &mut Registries) -> bool {
        let metadata = match extract_pdf_metadata(book.file().path()) {
            Ok(metadata) => metadata,
            Err(err) => {
                log::warn!("pdf metadata error {}: {}", book.file().path().display(), err);
                return false;
            }
        };

        if let Some(title) = metadata.title {
            book.set_title(&title);
        }
        for author in &metadata.authors {
            book.add_author_by_name(registries, author, "");
        }
        for keyword in &metadata.keywords {
            book.add_tag_by_full_name(&mut registries.tags, keyword);
        }
        true
    }
}

pub fn extract_pdf_metadata(path: &Path) -> Result<PdfMetadata, String> {
    let doc = Document::load(path).map_err(|err| err.to_string())?;
    let mut metadata = PdfMetadata::default();

    let info = match doc.trailer.get(b"Info") {
        Ok(Object::Reference(id)) => doc.get_dictionary(*id).ok(),
        Ok(Object::Dictionary(dict)) => Some(dict),
        _ => None,
    };
    let Some(info) = info else {
        return Ok(metadata);
    };

    metadata.title = dict_string(info, b"Title").filter(|title| !title.is_empty());
    if let Some(author) = dict_string(info, b"Author") {
        metadata.authors = split_list(&author, &[';']);
    }
    if let Some(keywords) = dict_string(info, b"Keywords") {
        metadata.keywords = split_list(&keywords, &[',', ';']);
    }
    Ok(metadata)
}

fn split_list(value: &str, separators: &[char]) -> Vec<String> {
    value
        .split(separators)
        .map(|item| item.trim().to_string())
        .filter(|item| !item.is_empty())
        .collect()
}

fn dict_string(dict: &Dictionary, key: &[u8]) -> Option<String> {
    let text = match dict.get(key).ok()? {
        Object::String(data, _) => decode_text_string(data),
        Object::Name(name) => String::from_utf8_lossy(name).to_string(),
        _ => return None,
    };
    Some(text.trim().to_string())
}

/// PDF text strings are either UTF-16BE with a byte order mark or a
/// single-byte encoding; the latter is read as Latin-1 compatible UTF-8.
fn decode_text_string(data: &[u8]) -> String {
    if data.starts_with(&[0xFE, 0xFF]) {
        let units: Vec<u16> = data[2..]
            .chunks_exact(2)
            .map(|pair| u16::from_be_bytes([pair[0], pair[1]]))
            .collect();
        return String::from_utf16_lossy(&units);
    }
    match std::str::from_utf8(data) {
        Ok(text) => text.to_string(),
        Err(_) => data.iter().map(|&byte| byte as char).collect(),
    }
}
