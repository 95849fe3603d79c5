use rusqlite::Connection;
use std::collections::{BTreeSet, HashSet};
use std::path::{Path, PathBuf};
use std::rc::Rc;

pub mod author;
pub mod book;
pub mod book_info;
pub mod comparators;
pub mod db;
pub mod file;
pub mod language;
pub mod matcher;
pub mod parser;
pub mod scanner;
pub mod settings;
pub mod tag;

pub use author::{Author, AuthorRef, AuthorRegistry};
pub use book::Book;
pub use book_info::{BookInfo, BookSummary, LocalBookInfo};
pub use file::BookFile;
pub use matcher::Matcher;
pub use parser::{CoverImage, FormatPlugin, PluginCollection};
pub use scanner::ScanStats;
pub use settings::LibrarySettings;
pub use tag::{Tag, TagRef, TagRegistry};

/// Interning tables for the handles books share.
#[derive(Debug, Default)]
pub struct Registries {
  pub authors: AuthorRegistry,
  pub tags: TagRegistry,
}

/// An in-memory book collection with its settings and format plugins.
pub struct Library {
  settings: LibrarySettings,
  plugins: PluginCollection,
  registries: Registries,
  books: Vec<Book>,
  removed_ids: Vec<i64>,
}

impl Library {
  pub fn new(settings: LibrarySettings) -> Self {
    let plugins = PluginCollection::with_default_plugins(&settings.default_language);
    Self {
      settings,
      plugins,
      registries: Registries::default(),
      books: Vec::new(),
      removed_ids: Vec::new(),
    }
  }

  /// Restores settings and books from a catalog database.
  pub fn load(conn: &Connection) -> Result<Self, String> {
    let settings = db::load_settings(conn)?;
    let mut library = Self::new(settings);
    library.books = db::load_books(conn, &mut library.registries)?;
    Ok(library)
  }

  /// Writes settings and every book to the catalog, dropping books removed
  /// since the last save.
  ///
  /// Everything is written in one transaction. On failure nothing is
  /// committed and pending removals are kept for the next save.
  pub fn save(&mut self, conn: &mut Connection) -> Result<(), String> {
    let tx = conn.transaction().map_err(|err| err.to_string())?;
    db::save_settings(&tx, &self.settings)?;
    for book_id in &self.removed_ids {
      db::delete_book(&tx, *book_id)?;
    }
    let mut book_ids = Vec::with_capacity(self.books.len());
    for book in &self.books {
      book_ids.push(db::write_book(&tx, book)?);
    }
    tx.commit().map_err(|err| err.to_string())?;

    self.removed_ids.clear();
    for (book, book_id) in self.books.iter_mut().zip(book_ids) {
      book.set_book_id(book_id);
    }
    log::info!("saved {} books", self.books.len());
    Ok(())
  }

  pub fn settings(&self) -> &LibrarySettings {
    &self.settings
  }

  pub fn set_settings(&mut self, settings: LibrarySettings) {
    self.plugins.set_default_language(&settings.default_language);
    self.settings = settings;
  }

  pub fn plugins(&self) -> &PluginCollection {
    &self.plugins
  }

  pub fn registries(&self) -> &Registries {
    &self.registries
  }

  pub fn registries_mut(&mut self) -> &mut Registries {
    &mut self.registries
  }

  pub fn books(&self) -> &[Book] {
    &self.books
  }

  pub fn books_mut(&mut self) -> &mut [Book] {
    &mut self.books
  }

  pub fn book(&self, path: &Path) -> Option<&Book> {
    self.books.iter().find(|book| book.file().path() == path)
  }

  /// Adds `book` unless a book with the same file is already present.
  pub fn add_book(&mut self, book: Book) -> bool {
    if self.book(book.file().path()).is_some() {
      return false;
    }
    self.books.push(book);
    true
  }

  /// Drops the book stored at `path` and forgets authors no book uses.
  pub fn remove_book(&mut self, path: &Path) -> bool {
    let Some(index) = self.books.iter().position(|book| book.file().path() == path) else {
      return false;
    };
    let book = self.books.remove(index);
    if book.book_id() != 0 {
      self.removed_ids.push(book.book_id());
    }
    drop(book);
    let purged = self.registries.authors.purge_unused();
    log::debug!("removed {}, released {} authors", path.display(), purged);
    true
  }

  /// Books of one series in reading order.
  pub fn books_by_series(&self, series_title: &str) -> Vec<&Book> {
    let mut books: Vec<&Book> = self
      .books
      .iter()
      .filter(|book| book.series_title() == series_title)
      .collect();
    books.sort_by(|book0, book1| comparators::compare_books(book0, book1));
    books
  }

  /// Distinct series names, sorted.
  pub fn series(&self) -> Vec<&str> {
    let series: BTreeSet<&str> = self
      .books
      .iter()
      .map(|book| book.series_title())
      .filter(|title| !title.is_empty())
      .collect();
    series.into_iter().collect()
  }

  /// Every author on some book, once each, in author order.
  pub fn authors(&self) -> Vec<AuthorRef> {
    let mut authors: Vec<AuthorRef> = Vec::new();
    for author in self.books.iter().flat_map(|book| book.authors()) {
      if !authors.iter().any(|known| Rc::ptr_eq(known, author)) {
        authors.push(author.clone());
      }
    }
    authors.sort_by(|author0, author1| comparators::compare_authors(Some(author0), Some(author1)));
    authors
  }

  /// Every tag on some book, once each, in tag order.
  pub fn tags(&self) -> Vec<TagRef> {
    let tags: BTreeSet<TagRef> = self
      .books
      .iter()
      .flat_map(|book| book.tags().iter().cloned())
      .collect();
    tags.into_iter().collect()
  }

  pub fn search(&self, pattern: &str) -> Vec<&Book> {
    let matcher = match Matcher::new(pattern) {
      Ok(matcher) => matcher,
      Err(err) => {
        log::warn!("invalid search pattern {:?}: {}", pattern, err);
        return Vec::new();
      }
    };
    self.books.iter().filter(|book| book.matches_with(&matcher)).collect()
  }

  /// Renames a tag on every book. Returns how many books changed.
  pub fn rename_tag(&mut self, from: &str, to: &str, include_sub_tags: bool) -> usize {
    let Some(from) = self.registries.tags.find_by_full_name(from) else {
      return 0;
    };
    let Some(to) = self.registries.tags.get_by_full_name(to) else {
      return 0;
    };
    if from == to {
      return 0;
    }
    let mut changed = 0;
    for book in &mut self.books {
      if book.rename_tag(&mut self.registries.tags, &from, &to, include_sub_tags) {
        changed += 1;
      }
    }
    log::info!("renamed tag {} to {} on {} books", from, to, changed);
    changed
  }

  /// Removes a tag from every book. Returns how many books changed.
  pub fn remove_tag(&mut self, full_name: &str, include_sub_tags: bool) -> usize {
    let Some(tag) = self.registries.tags.find_by_full_name(full_name) else {
      return 0;
    };
    let mut changed = 0;
    for book in &mut self.books {
      if book.remove_tag(&tag, include_sub_tags) {
        changed += 1;
      }
    }
    changed
  }

  /// Loads a single file into the library.
  pub fn load_file(&mut self, path: &Path) -> Option<&Book> {
    if self.book(path).is_some() {
      log::debug!("{} is already in the library", path.display());
      return None;
    }
    let file = BookFile::new(path);
    let book = scanner::load_book_file(&file, &self.settings, &self.plugins, &mut self.registries)?;
    self.books.push(book);
    self.books.last()
  }

  /// Adds every new loadable file under `root`.
  pub fn scan(&mut self, root: &Path) -> Result<ScanStats, String> {
    let known: HashSet<PathBuf> = self
      .books
      .iter()
      .map(|book| book.file().path().to_path_buf())
      .collect();
    let (books, stats) = scanner::scan_directory(
      root,
      &known,
      &self.settings,
      &self.plugins,
      &mut self.registries,
    )?;
    self.books.extend(books);
    Ok(stats)
  }

  pub fn info<'a>(&'a self, book: &'a Book) -> LocalBookInfo<'a> {
    LocalBookInfo::new(book, &self.plugins)
  }

  /// Writes a sidecar record next to the book file.
  pub fn write_sidecar(&self, book: &Book) -> Result<(), String> {
    let path = book.file().sidecar(&self.settings.info_suffix);
    BookInfo::from_book(book).save(&path)
  }
}
