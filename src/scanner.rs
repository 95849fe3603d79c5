use std::collections::HashSet;
use std::path::{Path, PathBuf};

use serde::Serialize;
use walkdir::{DirEntry, WalkDir};

use crate::book::Book;
use crate::book_info::BookInfo;
use crate::file::BookFile;
use crate::parser::PluginCollection;
use crate::settings::LibrarySettings;
use crate::Registries;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ScanStats {
    pub added: u64,
    pub skipped: u64,
    pub failed: u64,
}

/// Loads one book file. A complete sidecar record wins over the format
/// plugin; a broken or partial sidecar falls through to the plugin.
pub fn load_book_file(
    file: &BookFile,
    settings: &LibrarySettings,
    plugins: &PluginCollection,
    registries: &mut Registries,
) -> Option<Book> {
    let sidecar = file.sidecar(&settings.info_suffix);
    if sidecar.is_file() {
        match BookInfo::load(&sidecar) {
            Ok(info) if info.is_full() => {
                log::debug!("using sidecar {}", sidecar.display());
                return Some(Book::load_from_book_info(file, &info, plugins, registries));
            }
            Ok(_) => log::debug!("sidecar {} is incomplete", sidecar.display()),
            Err(err) => log::warn!("sidecar read error {}: {}", sidecar.display(), err),
        }
    }
    Book::load_from_file(file, plugins, registries)
}

/// Walks `root` and loads every file a plugin accepts. Paths listed in
/// `known` are counted as skipped.
pub fn scan_directory(
    root: &Path,
    known: &HashSet<PathBuf>,
    settings: &LibrarySettings,
    plugins: &PluginCollection,
    registries: &mut Registries,
) -> Result<(Vec<Book>, ScanStats), String> {
    if !root.exists() {
        return Err(format!("Path does not exist: {}", root.display()));
    }
    log::info!("scanning {}", root.display());

    let mut stats = ScanStats::default();
    let mut books = Vec::new();

    let walker = WalkDir::new(root)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|entry| settings.scan_hidden || entry.depth() == 0 || !is_hidden(entry));

    for entry in walker.filter_map(|e| e.ok()) {
        if !entry.file_type().is_file() {
            continue;
        }
        let path = entry.path();
        if is_sidecar(path, &settings.info_suffix) {
            continue;
        }

        let file = BookFile::new(path);
        if !plugins.accepts(&file) || known.contains(path) {
            stats.skipped += 1;
            continue;
        }

        match load_book_file(&file, settings, plugins, registries) {
            Some(book) => {
                stats.added += 1;
                books.push(book);
            }
            None => {
                log::warn!("could not load {}", path.display());
                stats.failed += 1;
            }
        }
    }

    log::info!(
        "scan of {} done: {} added, {} skipped, {} failed",
        root.display(),
        stats.added,
        stats.skipped,
        stats.failed
    );
    Ok((books, stats))
}

fn is_hidden(entry: &DirEntry) -> bool {
    entry
        .file_name()
        .to_str()
        .map(|name| name.starts_with('.'))
        .unwrap_or(false)
}

fn is_sidecar(path: &Path, suffix: &str) -> bool {
    !suffix.is_empty()
        && path
            .file_name()
            .and_then(|name| name.to_str())
            .map(|name| name.ends_with(suffix))
            .unwrap_or(false)
}
