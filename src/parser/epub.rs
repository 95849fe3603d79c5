use std::collections::HashMap;
use std::fs::File;
use std::io::Read;
use std::path::Path;

use quick_xml::events::{BytesStart, Event};
use quick_xml::reader::Reader;
use regex::Regex;
use zip::ZipArchive;

use super::{CoverImage, FormatPlugin};
use crate::book::Book;
use crate::file::BookFile;
use crate::Registries;

/// EPUB metadata from the package (OPF) document.
pub struct EpubPlugin;

#[derive(Debug, Default, PartialEq)]
pub struct OpfMetadata {
    pub title: Option<String>,
    /// (display name, `opf:file-as` sort key)
    pub authors: Vec<(String, String)>,
    pub language: Option<String>,
    pub subjects: Vec<String>,
    pub series: Option<String>,
    pub series_index: Option<i32>,
}

impl FormatPlugin for EpubPlugin {
    fn name(&self) -> &'static str {
        "epub"
    }

    fn accepts_file(&self, file: &BookFile) -> bool {
        file.extension() == "epub"
    }

    fn read_meta_info(&self, book: &mut Book, registries: &mut Registries) -> bool {
        let metadata = match read_package(book.file().path())
            .and_then(|(_, opf)| parse_opf_metadata(&opf))
        {
            Ok(metadata) => metadata,
            Err(err) => {
                log::warn!("epub metadata error {}: {}", book.file().path().display(), err);
                return false;
            }
        };

        if let Some(title) = metadata.title {
            book.set_title(&title);
        }
        if let Some(language) = metadata.language {
            book.set_language(&language);
        }
        if let Some(series) = metadata.series {
            book.set_series(&series, metadata.series_index.unwrap_or(0));
        }
        for (name, sort_key) in &metadata.authors {
            book.add_author_by_name(registries, name, sort_key);
        }
        for subject in &metadata.subjects {
            book.add_tag_by_full_name(&mut registries.tags, subject);
        }
        true
    }

    fn cover_image(&self, file: &BookFile) -> Option<CoverImage> {
        match extract_cover(file.path()) {
            Ok(cover) => cover,
            Err(err) => {
                log::warn!("epub cover error {}: {}", file.path().display(), err);
                None
            }
        }
    }
}

/// Opens the archive and returns the package document path and contents.
fn read_package(path: &Path) -> Result<(String, String), String> {
    let file = File::open(path).map_err(|err| err.to_string())?;
    let mut archive = ZipArchive::new(file).map_err(|err| err.to_string())?;
    read_package_from(&mut archive)
}

fn read_package_from(archive: &mut ZipArchive<File>) -> Result<(String, String), String> {
    let mut container = String::new();
    archive
        .by_name("META-INF/container.xml")
        .map_err(|_| "Missing META-INF/container.xml".to_string())?
        .read_to_string(&mut container)
        .map_err(|err| err.to_string())?;

    let rootfile = find_rootfile(&container).ok_or("Missing rootfile")?;
    let mut opf = String::new();
    archive
        .by_name(&rootfile)
        .map_err(|err| err.to_string())?
        .read_to_string(&mut opf)
        .map_err(|err| err.to_string())?;
    Ok((rootfile, opf))
}

fn find_rootfile(container: &str) -> Option<String> {
    let regex = Regex::new(r#"full-path="([^"]+)""#).ok()?;
    let captures = regex.captures(container)?;
    Some(captures.get(1)?.as_str().to_string())
}

fn local_name(qualified: &[u8]) -> String {
    let name = String::from_utf8_lossy(qualified);
    match name.rfind(':') {
        Some(index) => name[index + 1..].to_string(),
        None => name.to_string(),
    }
}

fn attribute(event: &BytesStart, wanted: &str) -> Option<String> {
    event
        .attributes()
        .flatten()
        .find(|attr| local_name(attr.key.as_ref()) == wanted)
        .and_then(|attr| attr.unescape_value().ok().map(|value| value.trim().to_string()))
}

pub fn parse_opf_metadata(opf: &str) -> Result<OpfMetadata, String> {
    let mut reader = Reader::from_str(opf);
    reader.trim_text(true);
    let mut buf = Vec::new();
    let mut metadata = OpfMetadata::default();
    let mut current_tag = String::new();
    let mut creator: Option<(String, bool)> = None;

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(event)) => {
                current_tag = String::from_utf8_lossy(event.name().as_ref()).to_string();
                match current_tag.as_str() {
                    "dc:creator" => {
                        let sort_key = attribute(&event, "file-as").unwrap_or_default();
                        let is_author = attribute(&event, "role")
                            .map(|role| role == "aut")
                            .unwrap_or(true);
                        creator = Some((sort_key, is_author));
                    }
                    "meta" => parse_meta_element(&event, &mut metadata),
                    _ => {}
                }
            }
            Ok(Event::Empty(event)) => {
                if event.name().as_ref() == b"meta" {
                    parse_meta_element(&event, &mut metadata);
                }
            }
            Ok(Event::Text(event)) => {
                let text = event.unescape().map_err(|err| err.to_string())?.trim().to_string();
                match current_tag.as_str() {
                    _ if text.is_empty() => {}
                    "dc:title" => {
                        if metadata.title.is_none() {
                            metadata.title = Some(text);
                        }
                    }
                    "dc:creator" => {
                        if let Some((sort_key, true)) = &creator {
                            metadata.authors.push((text, sort_key.clone()));
                        }
                    }
                    "dc:language" => {
                        if metadata.language.is_none() {
                            metadata.language = Some(text);
                        }
                    }
                    "dc:subject" => metadata.subjects.push(text),
                    _ => {}
                }
            }
            Ok(Event::End(_)) => {
                current_tag.clear();
                creator = None;
            }
            Ok(Event::Eof) => break,
            Err(err) => return Err(err.to_string()),
            _ => {}
        }
        buf.clear();
    }

    Ok(metadata)
}

/// Handles `<meta name="calibre:series" content="..."/>` and its index.
fn parse_meta_element(event: &BytesStart, metadata: &mut OpfMetadata) {
    let mut name = String::new();
    let mut content = String::new();

    for attr in event.attributes().flatten() {
        if attr.key.as_ref() == b"name" {
            name = String::from_utf8_lossy(&attr.value).to_string();
        }
        if attr.key.as_ref() == b"content" {
            content = String::from_utf8_lossy(&attr.value).trim().to_string();
        }
    }

    if name == "calibre:series" && metadata.series.is_none() && !content.is_empty() {
        metadata.series = Some(content);
    } else if name == "calibre:series_index" && metadata.series_index.is_none() {
        metadata.series_index = content.parse::<f64>().ok().map(|index| index.round() as i32);
    }
}

struct ManifestItem {
    href: String,
    media_type: Option<String>,
    properties: Option<String>,
}

/// Href of the cover image, relative to the package document.
///
/// Tries, in order: the `cover` meta entry, an item with the `cover-image`
/// property, an image item whose id or href mentions "cover", any image.
fn parse_opf_cover(opf: &str) -> Option<String> {
    let mut reader = Reader::from_str(opf);
    reader.trim_text(true);
    let mut buf = Vec::new();
    let mut cover_id: Option<String> = None;
    let mut manifest: Vec<(String, ManifestItem)> = Vec::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(event)) | Ok(Event::Empty(event)) => {
                let tag = local_name(event.name().as_ref());
                if tag == "meta" && attribute(&event, "name").as_deref() == Some("cover") {
                    cover_id = attribute(&event, "content");
                }
                if tag == "item" {
                    if let (Some(id), Some(href)) = (attribute(&event, "id"), attribute(&event, "href")) {
                        manifest.push((
                            id,
                            ManifestItem {
                                href,
                                media_type: attribute(&event, "media-type"),
                                properties: attribute(&event, "properties"),
                            },
                        ));
                    }
                }
            }
            Ok(Event::Eof) => break,
            Err(_) => break,
            _ => {}
        }
        buf.clear();
    }

    let is_image = |item: &ManifestItem| {
        item.media_type
            .as_deref()
            .map(|value| value.starts_with("image/"))
            .unwrap_or(false)
    };

    let by_id: HashMap<&str, &ManifestItem> =
        manifest.iter().map(|(id, item)| (id.as_str(), item)).collect();
    let cover_item = cover_id
        .as_deref()
        .and_then(|id| by_id.get(id).copied())
        .or_else(|| {
            manifest
                .iter()
                .map(|(_, item)| item)
                .find(|item| {
                    item.properties
                        .as_deref()
                        .map(|value| value.contains("cover-image"))
                        .unwrap_or(false)
                })
        })
        .or_else(|| {
            manifest
                .iter()
                .find(|(id, item)| {
                    is_image(item) && format!("{} {}", id, item.href).to_lowercase().contains("cover")
                })
                .map(|(_, item)| item)
        })
        .or_else(|| manifest.iter().map(|(_, item)| item).find(|item| is_image(*item)));

    cover_item.map(|item| item.href.clone())
}

fn extract_cover(path: &Path) -> Result<Option<CoverImage>, String> {
    let file = File::open(path).map_err(|err| err.to_string())?;
    let mut archive = ZipArchive::new(file).map_err(|err| err.to_string())?;
    let (rootfile, opf) = read_package_from(&mut archive)?;

    let Some(href) = parse_opf_cover(&opf) else {
        return Ok(None);
    };

    let opf_dir = Path::new(&rootfile)
        .parent()
        .map(|value| value.to_string_lossy().to_string())
        .unwrap_or_default();
    let cover_path = if opf_dir.is_empty() {
        href.clone()
    } else {
        format!("{}/{}", opf_dir, href)
    };

    let candidates = [
        cover_path.replace('\\', "/"),
        href.replace('\\', "/"),
        href.trim_start_matches("./").to_string(),
    ];
    for candidate in candidates {
        if let Ok(mut entry) = archive.by_name(&candidate) {
            let mut bytes = Vec::new();
            if entry.read_to_end(&mut bytes).is_ok() {
                return Ok(CoverImage::from_bytes(bytes));
            }
        }
    }
    Ok(None)
}
