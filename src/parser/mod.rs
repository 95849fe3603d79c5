//! Format plugins: per-file-type metadata and cover readers.

pub mod epub;
pub mod pdf;
pub mod txt;

use crate::book::Book;
use crate::file::BookFile;
use crate::Registries;

/// Reader for one book file format.
pub trait FormatPlugin {
    fn name(&self) -> &'static str;

    fn accepts_file(&self, file: &BookFile) -> bool;

    fn provides_meta_info(&self) -> bool {
        true
    }

    /// Fills `book` from the file's own metadata. Returns `false` when the
    /// file cannot be read.
    fn read_meta_info(&self, book: &mut Book, registries: &mut Registries) -> bool;

    fn cover_image(&self, _file: &BookFile) -> Option<CoverImage> {
        None
    }
}

/// Raw cover image bytes with the format sniffed from their content.
#[derive(Debug, Clone, PartialEq)]
pub struct CoverImage {
    pub bytes: Vec<u8>,
    pub mime: String,
}

impl CoverImage {
    /// Returns `None` when the bytes are not a recognizable image.
    pub fn from_bytes(bytes: Vec<u8>) -> Option<Self> {
        let format = image::guess_format(&bytes).ok()?;
        Some(Self {
            mime: format.to_mime_type().to_string(),
            bytes,
        })
    }

    pub fn extension(&self) -> &'static str {
        match self.mime.as_str() {
            "image/jpeg" => "jpg",
            "image/png" => "png",
            "image/webp" => "webp",
            "image/gif" => "gif",
            _ => "img",
        }
    }

    /// Pixel size, decoding the image to find it.
    pub fn dimensions(&self) -> Option<(u32, u32)> {
        let decoded = image::load_from_memory(&self.bytes).ok()?;
        Some((decoded.width(), decoded.height()))
    }
}

/// The registered format plugins plus the language assumed for books that
/// do not declare one.
pub struct PluginCollection {
    plugins: Vec<Box<dyn FormatPlugin>>,
    default_language: String,
}

impl PluginCollection {
    pub fn new(default_language: &str) -> Self {
        Self {
            plugins: Vec::new(),
            default_language: default_language.to_string(),
        }
    }

    pub fn with_default_plugins(default_language: &str) -> Self {
        let mut collection = Self::new(default_language);
        collection.register(Box::new(epub::EpubPlugin));
        collection.register(Box::new(pdf::PdfPlugin));
        collection.register(Box::new(txt::TxtPlugin));
        collection
    }

    pub fn register(&mut self, plugin: Box<dyn FormatPlugin>) {
        self.plugins.push(plugin);
    }

    /// First metadata-capable plugin that accepts `file`.
    pub fn plugin(&self, file: &BookFile) -> Option<&dyn FormatPlugin> {
        self.plugins
            .iter()
            .find(|plugin| plugin.provides_meta_info() && plugin.accepts_file(file))
            .map(|plugin| &**plugin)
    }

    pub fn plugin_for_book(&self, book: &Book) -> Option<&dyn FormatPlugin> {
        self.plugin(book.file())
    }

    pub fn accepts(&self, file: &BookFile) -> bool {
        self.plugin(file).is_some()
    }

    pub fn default_language(&self) -> &str {
        &self.default_language
    }

    pub fn set_default_language(&mut self, language: &str) {
        self.default_language = language.to_string();
    }
}
