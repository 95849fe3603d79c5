use std::collections::BTreeSet;

use crate::author::AuthorRef;
use crate::book_info::BookInfo;
use crate::file::BookFile;
use crate::language::is_known_language;
use crate::matcher::Matcher;
use crate::parser::PluginCollection;
use crate::tag::{TagRef, TagRegistry};
use crate::Registries;

/// Encoding recorded when neither the plugin nor the sidecar names one.
pub const AUTO_ENCODING: &str = "auto";

/// A book in the library catalog.
#[derive(Debug, Clone)]
pub struct Book {
    book_id: i64,
    file: BookFile,
    title: String,
    language: String,
    encoding: String,
    series_title: String,
    index_in_series: i32,
    authors: Vec<AuthorRef>,
    tags: Vec<TagRef>,
}

impl Book {
    pub(crate) fn new(file: BookFile, book_id: i64) -> Self {
        Self {
            book_id,
            file,
            title: String::new(),
            language: String::new(),
            encoding: String::new(),
            series_title: String::new(),
            index_in_series: 0,
            authors: Vec::new(),
            tags: Vec::new(),
        }
    }

    pub fn create(file: BookFile, book_id: i64, encoding: &str, language: &str, title: &str) -> Self {
        let mut book = Self::new(file, book_id);
        book.set_encoding(encoding);
        book.set_language(language);
        book.set_title(title);
        book
    }

    /// Reads a book's metadata through the first plugin that accepts the file.
    ///
    /// Returns `None` when no plugin accepts the file or the plugin cannot
    /// read it. Missing title, encoding and language fall back to the file
    /// name, [`AUTO_ENCODING`] and the collection's default language.
    pub fn load_from_file(
        file: &BookFile,
        plugins: &PluginCollection,
        registries: &mut Registries,
    ) -> Option<Self> {
        let Some(plugin) = plugins.plugin(file) else {
            log::debug!("no format plugin for {}", file.path().display());
            return None;
        };

        let mut book = Self::new(file.clone(), 0);
        if !plugin.read_meta_info(&mut book, registries) {
            log::warn!(
                "{} plugin failed to read metadata: {}",
                plugin.name(),
                file.path().display()
            );
            return None;
        }

        let title = book.title.trim().to_string();
        book.set_title(&title);
        if book.title.is_empty() {
            book.set_title(&file.name(true));
        }
        if book.encoding.is_empty() {
            book.set_encoding(AUTO_ENCODING);
        }
        if book.language.is_empty() {
            book.set_language(plugins.default_language());
        }
        Some(book)
    }

    /// Builds a book from a legacy sidecar record.
    ///
    /// Tags and authors are stored comma-joined; each item is added in order.
    pub fn load_from_book_info(
        file: &BookFile,
        info: &BookInfo,
        plugins: &PluginCollection,
        registries: &mut Registries,
    ) -> Self {
        let mut book = Self::create(file.clone(), 0, &info.encoding, &info.language, &info.title);
        book.set_series(&info.series_title, info.index_in_series);

        if book.language.is_empty() {
            book.set_language(plugins.default_language());
        }

        if !info.tags.is_empty() {
            for full_name in info.tags.split(',') {
                book.add_tag_by_full_name(&mut registries.tags, full_name);
            }
        }

        if !info.author_display_name.is_empty() {
            for name in info.author_display_name.split(',') {
                if let Some(author) = registries.authors.get(name, "") {
                    book.add_author(author);
                }
            }
        }

        book
    }

    pub fn book_id(&self) -> i64 {
        self.book_id
    }

    pub fn set_book_id(&mut self, book_id: i64) {
        self.book_id = book_id;
    }

    pub fn file(&self) -> &BookFile {
        &self.file
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn language(&self) -> &str {
        &self.language
    }

    pub fn encoding(&self) -> &str {
        &self.encoding
    }

    pub fn series_title(&self) -> &str {
        &self.series_title
    }

    pub fn index_in_series(&self) -> i32 {
        self.index_in_series
    }

    pub fn authors(&self) -> &[AuthorRef] {
        &self.authors
    }

    pub fn tags(&self) -> &[TagRef] {
        &self.tags
    }

    pub fn set_title(&mut self, title: &str) {
        self.title = title.to_string();
    }

    /// A recognized language code is never replaced by an unrecognized one.
    pub fn set_language(&mut self, language: &str) {
        if !self.language.is_empty()
            && is_known_language(&self.language)
            && !is_known_language(language)
        {
            return;
        }
        self.language = language.to_string();
    }

    pub fn set_encoding(&mut self, encoding: &str) {
        self.encoding = encoding.to_string();
    }

    pub fn set_series(&mut self, title: &str, index: i32) {
        self.series_title = title.to_string();
        self.index_in_series = index;
    }

    /// Appends `tag` unless the book already carries it.
    pub fn add_tag(&mut self, tag: TagRef) -> bool {
        if self.tags.contains(&tag) {
            return false;
        }
        self.tags.push(tag);
        true
    }

    pub fn add_tag_by_full_name(&mut self, registry: &mut TagRegistry, full_name: &str) -> bool {
        match registry.get_by_full_name(full_name) {
            Some(tag) => self.add_tag(tag),
            None => false,
        }
    }

    /// Removes `tag`, and every descendant of it when `include_sub_tags` is set.
    pub fn remove_tag(&mut self, tag: &TagRef, include_sub_tags: bool) -> bool {
        let before = self.tags.len();
        self.tags
            .retain(|current| !(current == tag || (include_sub_tags && tag.is_ancestor_of(current))));
        self.tags.len() != before
    }

    /// Replaces `from` with `to`.
    ///
    /// With `include_sub_tags`, descendants of `from` are re-rooted under `to`
    /// and the whole tag list comes back in tag order, de-duplicated. Without
    /// it `from` is replaced in place, or dropped if `to` is already present.
    pub fn rename_tag(
        &mut self,
        registry: &mut TagRegistry,
        from: &TagRef,
        to: &TagRef,
        include_sub_tags: bool,
    ) -> bool {
        if include_sub_tags {
            let mut tag_set = BTreeSet::new();
            let mut changed = false;
            for tag in &self.tags {
                if tag == from {
                    tag_set.insert(to.clone());
                    changed = true;
                } else {
                    match registry.clone_sub_tag(tag, from, to) {
                        Some(new_tag) => {
                            tag_set.insert(new_tag);
                            changed = true;
                        }
                        None => {
                            tag_set.insert(tag.clone());
                        }
                    }
                }
            }
            if changed {
                self.tags = tag_set.into_iter().collect();
            }
            return changed;
        }

        let Some(index) = self.tags.iter().position(|tag| tag == from) else {
            return false;
        };
        if self.tags.contains(to) {
            self.tags.remove(index);
        } else {
            self.tags[index] = to.clone();
        }
        true
    }

    /// Adds `to` next to `from`, keeping `from`.
    ///
    /// With `include_sub_tags`, every descendant of `from` also gains a copy
    /// under `to`, and the tag list comes back in tag order.
    pub fn clone_tag(
        &mut self,
        registry: &mut TagRegistry,
        from: &TagRef,
        to: &TagRef,
        include_sub_tags: bool,
    ) -> bool {
        if include_sub_tags {
            let mut tag_set = BTreeSet::new();
            for tag in &self.tags {
                if tag == from {
                    tag_set.insert(to.clone());
                } else if let Some(new_tag) = registry.clone_sub_tag(tag, from, to) {
                    tag_set.insert(new_tag);
                }
            }
            if tag_set.is_empty() {
                return false;
            }
            tag_set.extend(self.tags.iter().cloned());
            self.tags = tag_set.into_iter().collect();
            return true;
        }

        if self.tags.contains(from) && !self.tags.contains(to) {
            self.tags.push(to.clone());
            return true;
        }
        false
    }

    pub fn remove_all_tags(&mut self) {
        self.tags.clear();
    }

    /// Appends `author`; the same author may appear more than once.
    pub fn add_author(&mut self, author: AuthorRef) {
        self.authors.push(author);
    }

    pub fn add_author_by_name(&mut self, registries: &mut Registries, name: &str, sort_key: &str) {
        if let Some(author) = registries.authors.get(name, sort_key) {
            self.add_author(author);
        }
    }

    /// Swaps `from` for `to`, or drops `from` when `to` is `None`.
    pub fn replace_author(&mut self, from: &AuthorRef, to: Option<AuthorRef>) -> bool {
        let Some(index) = self
            .authors
            .iter()
            .position(|author| AuthorRef::ptr_eq(author, from))
        else {
            return false;
        };
        match to {
            Some(author) => self.authors[index] = author,
            None => {
                self.authors.remove(index);
            }
        }
        true
    }

    pub fn remove_all_authors(&mut self) {
        self.authors.clear();
    }

    /// Case-insensitive search over title, series, authors, tags and file name.
    pub fn matches(&self, pattern: &str) -> bool {
        match Matcher::new(pattern) {
            Ok(matcher) => self.matches_with(&matcher),
            Err(err) => {
                log::warn!("invalid search pattern {:?}: {}", pattern, err);
                false
            }
        }
    }

    pub fn matches_with(&self, matcher: &Matcher) -> bool {
        matcher.is_match(&self.title)
            || matcher.is_match(&self.series_title)
            || self.authors.iter().any(|author| matcher.is_match(author.name()))
            || self.tags.iter().any(|tag| matcher.is_match(tag.name()))
            || matcher.is_match(&self.file.name(true))
    }
}

#[cfg(test)]
mod tests {
    use super::{Book, AUTO_ENCODING};
    use crate::book_info::BookInfo;
    use crate::file::BookFile;
    use crate::parser::PluginCollection;
    use crate::Registries;

    fn book_with_tags(registries: &mut Registries, tags: &[&str]) -> Book {
        let mut book = Book::create(BookFile::new("/books/sample.epub"), 1, "utf-8", "en", "Sample");
        for tag in tags {
            assert!(book.add_tag_by_full_name(&mut registries.tags, tag));
        }
        book
    }

    fn full_names(book: &Book) -> Vec<String> {
        book.tags().iter().map(|tag| tag.full_name()).collect()
    }

    #[test]
    fn add_tag_is_idempotent() {
        let mut registries = Registries::default();
        let mut book = book_with_tags(&mut registries, &["Fiction"]);
        let fiction = registries.tags.get_by_full_name("Fiction").expect("expected tag");
        assert!(!book.add_tag(fiction.clone()));
        assert!(!book.add_tag_by_full_name(&mut registries.tags, " Fiction "));
        assert_eq!(book.tags().len(), 1);
        assert!(!book.add_tag_by_full_name(&mut registries.tags, ""));
    }

    #[test]
    fn remove_tag_with_sub_tags_removes_exactly_descendants() {
        let mut registries = Registries::default();
        let mut book = book_with_tags(
            &mut registries,
            &["Fiction", "Fiction.SciFi", "Fiction.SciFi.Space", "History", "Nonfiction.Fiction"],
        );
        let fiction = registries.tags.get_by_full_name("Fiction").expect("expected tag");
        assert!(book.remove_tag(&fiction, true));
        assert_eq!(full_names(&book), vec!["History", "Nonfiction.Fiction"]);
        assert!(!book.remove_tag(&fiction, true));
    }

    #[test]
    fn remove_tag_without_sub_tags_keeps_descendants() {
        let mut registries = Registries::default();
        let mut book = book_with_tags(&mut registries, &["Fiction", "Fiction.SciFi"]);
        let fiction = registries.tags.get_by_full_name("Fiction").expect("expected tag");
        assert!(book.remove_tag(&fiction, false));
        assert_eq!(full_names(&book), vec!["Fiction.SciFi"]);
    }

    #[test]
    fn rename_tag_with_sub_tags_reroots_descendants() {
        let mut registries = Registries::default();
        let mut book = book_with_tags(&mut registries, &["Fiction", "Fiction.SciFi", "History"]);
        let from = registries.tags.get_by_full_name("Fiction").expect("expected tag");
        let to = registries.tags.get_by_full_name("Genre").expect("expected tag");
        assert!(book.rename_tag(&mut registries.tags, &from, &to, true));
        let mut names = full_names(&book);
        names.sort();
        assert_eq!(names, vec!["Genre", "Genre.SciFi", "History"]);
    }

    #[test]
    fn rename_tag_with_sub_tags_deduplicates() {
        let mut registries = Registries::default();
        let mut book = book_with_tags(&mut registries, &["Old.Topic", "New.Topic", "Old"]);
        let from = registries.tags.get_by_full_name("Old").expect("expected tag");
        let to = registries.tags.get_by_full_name("New").expect("expected tag");
        assert!(book.rename_tag(&mut registries.tags, &from, &to, true));
        assert_eq!(full_names(&book), vec!["New", "New.Topic"]);
    }

    #[test]
    fn rename_missing_tag_is_a_no_op() {
        let mut registries = Registries::default();
        let mut book = book_with_tags(&mut registries, &["History"]);
        let from = registries.tags.get_by_full_name("Fiction").expect("expected tag");
        let to = registries.tags.get_by_full_name("Genre").expect("expected tag");
        assert!(!book.rename_tag(&mut registries.tags, &from, &to, true));
        assert!(!book.rename_tag(&mut registries.tags, &from, &to, false));
        assert_eq!(full_names(&book), vec!["History"]);
    }

    #[test]
    fn rename_tag_in_place_keeps_position() {
        let mut registries = Registries::default();
        let mut book = book_with_tags(&mut registries, &["A", "B", "C"]);
        let from = registries.tags.get_by_full_name("B").expect("expected tag");
        let to = registries.tags.get_by_full_name("Z").expect("expected tag");
        assert!(book.rename_tag(&mut registries.tags, &from, &to, false));
        assert_eq!(full_names(&book), vec!["A", "Z", "C"]);

        let existing = registries.tags.get_by_full_name("A").expect("expected tag");
        assert!(book.rename_tag(&mut registries.tags, &to, &existing, false));
        assert_eq!(full_names(&book), vec!["A", "C"]);
    }

    #[test]
    fn clone_tag_keeps_source_tags() {
        let mut registries = Registries::default();
        let mut book = book_with_tags(&mut registries, &["Fiction", "Fiction.SciFi", "History"]);
        let from = registries.tags.get_by_full_name("Fiction").expect("expected tag");
        let to = registries.tags.get_by_full_name("Genre").expect("expected tag");
        assert!(book.clone_tag(&mut registries.tags, &from, &to, true));
        assert_eq!(
            full_names(&book),
            vec!["Fiction", "Fiction.SciFi", "Genre", "Genre.SciFi", "History"]
        );
    }

    #[test]
    fn clone_tag_without_sub_tags_appends_once() {
        let mut registries = Registries::default();
        let mut book = book_with_tags(&mut registries, &["Fiction", "Fiction.SciFi"]);
        let from = registries.tags.get_by_full_name("Fiction").expect("expected tag");
        let to = registries.tags.get_by_full_name("Genre").expect("expected tag");
        assert!(book.clone_tag(&mut registries.tags, &from, &to, false));
        assert!(!book.clone_tag(&mut registries.tags, &from, &to, false));
        assert_eq!(full_names(&book), vec!["Fiction", "Fiction.SciFi", "Genre"]);
    }

    #[test]
    fn authors_allow_duplicates_and_replace_by_identity() {
        let mut registries = Registries::default();
        let mut book = Book::create(BookFile::new("/books/a.epub"), 0, "", "", "A");
        book.add_author_by_name(&mut registries, "Neil Gaiman", "");
        book.add_author_by_name(&mut registries, "Terry Pratchett", "");
        book.add_author_by_name(&mut registries, "Neil Gaiman", "");
        assert_eq!(book.authors().len(), 3);

        let gaiman = registries.authors.get("Neil Gaiman", "").expect("expected author");
        let other = registries.authors.get("Someone Else", "").expect("expected author");
        assert!(book.replace_author(&gaiman, Some(other.clone())));
        let names: Vec<&str> = book.authors().iter().map(|author| author.name()).collect();
        assert_eq!(names, vec!["Someone Else", "Terry Pratchett", "Neil Gaiman"]);

        assert!(book.replace_author(&other, None));
        assert_eq!(book.authors().len(), 2);
        assert!(!book.replace_author(&other, None));

        book.remove_all_authors();
        assert!(book.authors().is_empty());
    }

    #[test]
    fn known_language_is_not_replaced_by_unknown() {
        let mut book = Book::create(BookFile::new("/books/a.txt"), 0, "", "de", "A");
        book.set_language("gibberish");
        assert_eq!(book.language(), "de");
        book.set_language("fr");
        assert_eq!(book.language(), "fr");

        let mut unknown = Book::create(BookFile::new("/books/b.txt"), 0, "", "xx", "B");
        unknown.set_language("yy");
        assert_eq!(unknown.language(), "yy");
    }

    #[test]
    fn matches_every_searchable_field() {
        let mut registries = Registries::default();
        let mut book = Book::create(
            BookFile::new("/books/lotr-vol1.epub"),
            0,
            "",
            "en",
            "The Fellowship of the Ring",
        );
        book.set_series("The Lord of the Rings", 1);
        book.add_author_by_name(&mut registries, "J.R.R. Tolkien", "");
        book.add_tag_by_full_name(&mut registries.tags, "Fiction.Fantasy");

        assert!(book.matches("tolkien"));
        assert!(book.matches("FELLOWSHIP"));
        assert!(book.matches("lord of"));
        assert!(book.matches("fantasy"));
        assert!(book.matches("lotr-vol"));
        assert!(!book.matches("fiction.fantasy"));
        assert!(!book.matches("asimov"));
    }

    #[test]
    fn load_from_book_info_splits_lists_in_order() {
        let mut registries = Registries::default();
        let plugins = PluginCollection::new("en");
        let info = BookInfo {
            title: "Collected Stories".to_string(),
            language: String::new(),
            encoding: "koi8-r".to_string(),
            series_title: "Stories".to_string(),
            index_in_series: 3,
            tags: "A,B,C".to_string(),
            author_display_name: "Anton Chekhov,Ivan Bunin".to_string(),
            ..BookInfo::default()
        };
        let book = Book::load_from_book_info(
            &BookFile::new("/books/stories.fb2"),
            &info,
            &plugins,
            &mut registries,
        );
        assert_eq!(book.title(), "Collected Stories");
        assert_eq!(book.language(), "en");
        assert_eq!(book.encoding(), "koi8-r");
        assert_eq!(book.series_title(), "Stories");
        assert_eq!(book.index_in_series(), 3);
        assert_eq!(full_names(&book), vec!["A", "B", "C"]);
        let authors: Vec<&str> = book.authors().iter().map(|author| author.name()).collect();
        assert_eq!(authors, vec!["Anton Chekhov", "Ivan Bunin"]);
    }

    #[test]
    fn load_from_book_info_skips_empty_items() {
        let mut registries = Registries::default();
        let plugins = PluginCollection::new("ru");
        let info = BookInfo {
            language: "uk".to_string(),
            tags: "A,,B,".to_string(),
            author_display_name: ",Somebody".to_string(),
            ..BookInfo::default()
        };
        let book = Book::load_from_book_info(
            &BookFile::new("/books/x.txt"),
            &info,
            &plugins,
            &mut registries,
        );
        assert_eq!(book.language(), "uk");
        assert_eq!(full_names(&book), vec!["A", "B"]);
        assert_eq!(book.authors().len(), 1);
    }

    #[test]
    fn load_from_file_without_plugin_fails() {
        let mut registries = Registries::default();
        let plugins = PluginCollection::with_default_plugins("en");
        let file = BookFile::new("/books/unknown.xyz");
        assert!(Book::load_from_file(&file, &plugins, &mut registries).is_none());
    }

    #[test]
    fn load_from_file_falls_back_to_file_name() {
        let dir = tempfile::tempdir().expect("expected temp dir");
        let path = dir.path().join("Short Stories.txt");
        std::fs::write(&path, "Once upon a time").expect("expected write");

        let mut registries = Registries::default();
        let plugins = PluginCollection::with_default_plugins("de");
        let book = Book::load_from_file(&BookFile::new(&path), &plugins, &mut registries)
            .expect("expected book");
        assert_eq!(book.title(), "Short Stories");
        assert_eq!(book.encoding(), AUTO_ENCODING);
        assert_eq!(book.language(), "de");
        assert_eq!(book.book_id(), 0);
    }
}
