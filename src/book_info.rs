use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::book::Book;
use crate::parser::{CoverImage, PluginCollection};

/// Legacy per-book info record stored as a sidecar next to the book file.
///
/// Tags and author display names are comma-joined strings; tags use full
/// names (`Fiction.SciFi`).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct BookInfo {
    pub title: String,
    pub language: String,
    pub encoding: String,
    pub series_title: String,
    pub index_in_series: i32,
    pub tags: String,
    pub author_display_name: String,
    pub author_sort_key: String,
}

impl BookInfo {
    pub fn from_json(json: &str) -> Result<Self, String> {
        serde_json::from_str(json).map_err(|err| err.to_string())
    }

    pub fn load(path: &Path) -> Result<Self, String> {
        let json = fs::read_to_string(path).map_err(|err| err.to_string())?;
        Self::from_json(&json)
    }

    pub fn save(&self, path: &Path) -> Result<(), String> {
        let json = serde_json::to_string_pretty(self).map_err(|err| err.to_string())?;
        fs::write(path, json).map_err(|err| err.to_string())
    }

    /// Captures a book's current state in sidecar form.
    pub fn from_book(book: &Book) -> Self {
        let tags: Vec<String> = book.tags().iter().map(|tag| tag.full_name()).collect();
        let authors: Vec<&str> = book.authors().iter().map(|author| author.name()).collect();
        Self {
            title: book.title().to_string(),
            language: book.language().to_string(),
            encoding: book.encoding().to_string(),
            series_title: book.series_title().to_string(),
            index_in_series: book.index_in_series(),
            tags: tags.join(","),
            author_display_name: authors.join(","),
            author_sort_key: book
                .authors()
                .first()
                .map(|author| author.sort_key().to_string())
                .unwrap_or_default(),
        }
    }

    /// True when the record alone is enough to describe the book.
    pub fn is_full(&self) -> bool {
        !self.title.is_empty() && !self.encoding.is_empty() && !self.language.is_empty()
    }
}

/// Read-only presentation view of a book.
pub struct LocalBookInfo<'a> {
    book: &'a Book,
    plugins: &'a PluginCollection,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BookSummary {
    pub id: i64,
    pub title: String,
    pub file: String,
    pub language: String,
    pub encoding: String,
    pub series_title: Option<String>,
    pub index_in_series: Option<i32>,
    pub authors: Vec<String>,
    pub tags: Vec<String>,
}

impl<'a> LocalBookInfo<'a> {
    pub fn new(book: &'a Book, plugins: &'a PluginCollection) -> Self {
        Self { book, plugins }
    }

    pub fn title(&self) -> &str {
        self.book.title()
    }

    pub fn file(&self) -> String {
        self.book.file().path_utf8()
    }

    pub fn language(&self) -> &str {
        self.book.language()
    }

    pub fn encoding(&self) -> &str {
        self.book.encoding()
    }

    pub fn series_title(&self) -> &str {
        self.book.series_title()
    }

    /// Cover image from the plugin that handles this book, if any.
    pub fn image(&self) -> Option<CoverImage> {
        let plugin = self.plugins.plugin_for_book(self.book)?;
        plugin.cover_image(self.book.file())
    }

    /// Full names of the book's tags.
    pub fn tags(&self) -> Vec<String> {
        self.book.tags().iter().map(|tag| tag.full_name()).collect()
    }

    pub fn authors(&self) -> Vec<String> {
        self.book
            .authors()
            .iter()
            .map(|author| author.name().to_string())
            .collect()
    }

    pub fn summary(&self) -> BookSummary {
        let series = self.series_title();
        BookSummary {
            id: self.book.book_id(),
            title: self.title().to_string(),
            file: self.file(),
            language: self.language().to_string(),
            encoding: self.encoding().to_string(),
            series_title: (!series.is_empty()).then(|| series.to_string()),
            index_in_series: (!series.is_empty()).then(|| self.book.index_in_series()),
            authors: self.authors(),
            tags: self.tags(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{BookInfo, LocalBookInfo};
    use crate::book::Book;
    use crate::file::BookFile;
    use crate::parser::epub::tests::{write_epub, OPF};
    use crate::parser::PluginCollection;
    use crate::Registries;

    #[test]
    fn missing_keys_default_to_empty() {
        let info = BookInfo::from_json(r#"{"title": "Walden", "indexInSeries": 2}"#)
            .expect("expected info");
        assert_eq!(info.title, "Walden");
        assert_eq!(info.index_in_series, 2);
        assert!(info.tags.is_empty());
        assert!(!info.is_full());
    }

    #[test]
    fn rejects_malformed_json() {
        assert!(BookInfo::from_json("{ not json").is_err());
    }

    #[test]
    fn saves_and_reloads_sidecar() {
        let dir = tempfile::tempdir().expect("expected temp dir");
        let path = dir.path().join("walden.txt.info.json");
        let info = BookInfo {
            title: "Walden".to_string(),
            language: "en".to_string(),
            encoding: "utf-8".to_string(),
            tags: "Essays,Nature.Forest".to_string(),
            ..BookInfo::default()
        };
        info.save(&path).expect("expected save");
        let loaded = BookInfo::load(&path).expect("expected load");
        assert_eq!(loaded, info);
        assert!(loaded.is_full());
    }

    #[test]
    fn view_flattens_tags_and_authors() {
        let mut registries = Registries::default();
        let plugins = PluginCollection::with_default_plugins("en");
        let mut book = Book::create(BookFile::new("/books/walden.txt"), 4, "utf-8", "en", "Walden");
        book.add_author_by_name(&mut registries, "Henry David Thoreau", "");
        book.add_tag_by_full_name(&mut registries.tags, "Nature.Forest");

        let view = LocalBookInfo::new(&book, &plugins);
        assert_eq!(view.title(), "Walden");
        assert_eq!(view.file(), "/books/walden.txt");
        assert_eq!(view.tags(), vec!["Nature.Forest"]);
        assert_eq!(view.authors(), vec!["Henry David Thoreau"]);
        assert!(view.image().is_none());

        let summary = view.summary();
        assert_eq!(summary.id, 4);
        assert!(summary.series_title.is_none());
        let json = serde_json::to_value(&summary).expect("expected json");
        assert_eq!(json["authors"][0], "Henry David Thoreau");

        let info = BookInfo::from_book(&book);
        assert_eq!(info.tags, "Nature.Forest");
        assert_eq!(info.author_sort_key, "thoreau");
    }

    #[test]
    fn view_reads_cover_through_plugin() {
        let dir = tempfile::tempdir().expect("expected temp dir");
        let path = dir.path().join("darkness.epub");
        write_epub(&path, OPF);

        let mut registries = Registries::default();
        let plugins = PluginCollection::with_default_plugins("en");
        let book = Book::load_from_file(&BookFile::new(&path), &plugins, &mut registries)
            .expect("expected book");
        let cover = LocalBookInfo::new(&book, &plugins)
            .image()
            .expect("expected cover");
        assert_eq!(cover.mime, "image/png");
        assert_eq!(cover.dimensions(), Some((2, 2)));
    }
}
