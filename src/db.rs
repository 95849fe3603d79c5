use rusqlite::{params, Connection, OptionalExtension};
use std::collections::HashMap;
use std::path::Path;

use crate::book::Book;
use crate::file::BookFile;
use crate::settings::LibrarySettings;
use crate::tag::TagRef;
use crate::Registries;

const MIGRATION_CATALOG_SQL: &str = "
CREATE TABLE IF NOT EXISTS books (
    book_id INTEGER PRIMARY KEY AUTOINCREMENT,
    file_path TEXT UNIQUE NOT NULL,
    title TEXT NOT NULL,
    language TEXT NOT NULL,
    encoding TEXT NOT NULL,
    series TEXT NOT NULL DEFAULT '',
    series_index INTEGER NOT NULL DEFAULT 0,
    created_at DATETIME DEFAULT CURRENT_TIMESTAMP,
    updated_at DATETIME DEFAULT CURRENT_TIMESTAMP
);
CREATE TABLE IF NOT EXISTS authors (
    author_id INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT NOT NULL,
    sort_key TEXT NOT NULL,
    UNIQUE (name, sort_key)
);
CREATE TABLE IF NOT EXISTS book_authors (
    book_id INTEGER NOT NULL,
    author_id INTEGER NOT NULL,
    author_index INTEGER NOT NULL,
    PRIMARY KEY (book_id, author_index),
    FOREIGN KEY(book_id) REFERENCES books(book_id) ON DELETE CASCADE,
    FOREIGN KEY(author_id) REFERENCES authors(author_id) ON DELETE CASCADE
);
CREATE TABLE IF NOT EXISTS tags (
    tag_id INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT NOT NULL,
    parent_id INTEGER,
    FOREIGN KEY(parent_id) REFERENCES tags(tag_id) ON DELETE CASCADE
);
CREATE TABLE IF NOT EXISTS book_tags (
    book_id INTEGER NOT NULL,
    tag_id INTEGER NOT NULL,
    tag_index INTEGER NOT NULL,
    PRIMARY KEY (book_id, tag_id),
    FOREIGN KEY(book_id) REFERENCES books(book_id) ON DELETE CASCADE,
    FOREIGN KEY(tag_id) REFERENCES tags(tag_id) ON DELETE CASCADE
);
";

const MIGRATION_SETTINGS_SQL: &str = "
CREATE TABLE IF NOT EXISTS settings (
    id INTEGER PRIMARY KEY CHECK (id = 1),
    json TEXT NOT NULL,
    updated_at DATETIME DEFAULT CURRENT_TIMESTAMP
);
";

pub fn init_db(path: &Path) -> Result<Connection, String> {
    let conn = Connection::open(path).map_err(|err| err.to_string())?;
    run_migrations(&conn)?;
    Ok(conn)
}

pub fn init_in_memory() -> Result<Connection, String> {
    let conn = Connection::open_in_memory().map_err(|err| err.to_string())?;
    run_migrations(&conn)?;
    Ok(conn)
}

fn run_migrations(conn: &Connection) -> Result<(), String> {
    conn.execute_batch(
        "PRAGMA foreign_keys = ON;
         CREATE TABLE IF NOT EXISTS schema_migrations (
            id TEXT PRIMARY KEY NOT NULL,
            applied_at INTEGER NOT NULL
         );",
    )
    .map_err(|err| err.to_string())?;
    apply_migration(conn, "0000_catalog", MIGRATION_CATALOG_SQL)?;
    apply_migration(conn, "0001_settings", MIGRATION_SETTINGS_SQL)?;
    Ok(())
}

fn apply_migration(conn: &Connection, id: &str, sql: &str) -> Result<(), String> {
    let existing: Option<String> = conn
        .query_row(
            "SELECT id FROM schema_migrations WHERE id = ?1",
            params![id],
            |row| row.get(0),
        )
        .optional()
        .map_err(|err| err.to_string())?;
    if existing.is_some() {
        return Ok(());
    }
    conn.execute_batch(sql).map_err(|err| err.to_string())?;
    conn.execute(
        "INSERT INTO schema_migrations (id, applied_at) VALUES (?1, strftime('%s', 'now'))",
        params![id],
    )
    .map_err(|err| err.to_string())?;
    log::info!("applied migration {}", id);
    Ok(())
}

/// Inserts or updates `book` (keyed by file path) and rewrites its author and
/// tag links. The book's id is set to the catalog id.
pub fn save_book(conn: &mut Connection, book: &mut Book) -> Result<i64, String> {
    let tx = conn.transaction().map_err(|err| err.to_string())?;
    let book_id = write_book(&tx, book)?;
    tx.commit().map_err(|err| err.to_string())?;
    book.set_book_id(book_id);
    Ok(book_id)
}

/// Writes one book and its links on `conn` without opening a transaction.
/// Returns the catalog id; the caller assigns it once its transaction commits.
pub fn write_book(conn: &Connection, book: &Book) -> Result<i64, String> {
    let path = book.file().path_utf8();

    conn.execute(
        "INSERT INTO books (file_path, title, language, encoding, series, series_index)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)
         ON CONFLICT(file_path) DO UPDATE SET
            title = excluded.title,
            language = excluded.language,
            encoding = excluded.encoding,
            series = excluded.series,
            series_index = excluded.series_index,
            updated_at = CURRENT_TIMESTAMP",
        params![
            path,
            book.title(),
            book.language(),
            book.encoding(),
            book.series_title(),
            book.index_in_series()
        ],
    )
    .map_err(|err| err.to_string())?;

    let book_id: i64 = conn
        .query_row(
            "SELECT book_id FROM books WHERE file_path = ?1",
            params![path],
            |row| row.get(0),
        )
        .map_err(|err| err.to_string())?;

    conn.execute("DELETE FROM book_authors WHERE book_id = ?1", params![book_id])
        .map_err(|err| err.to_string())?;
    for (index, author) in book.authors().iter().enumerate() {
        conn.execute(
            "INSERT OR IGNORE INTO authors (name, sort_key) VALUES (?1, ?2)",
            params![author.name(), author.sort_key()],
        )
        .map_err(|err| err.to_string())?;
        let author_id: i64 = conn
            .query_row(
                "SELECT author_id FROM authors WHERE name = ?1 AND sort_key = ?2",
                params![author.name(), author.sort_key()],
                |row| row.get(0),
            )
            .map_err(|err| err.to_string())?;
        conn.execute(
            "INSERT INTO book_authors (book_id, author_id, author_index) VALUES (?1, ?2, ?3)",
            params![book_id, author_id, index as i64],
        )
        .map_err(|err| err.to_string())?;
    }

    conn.execute("DELETE FROM book_tags WHERE book_id = ?1", params![book_id])
        .map_err(|err| err.to_string())?;
    for (index, tag) in book.tags().iter().enumerate() {
        let tag_id = ensure_tag(conn, tag)?;
        conn.execute(
            "INSERT OR IGNORE INTO book_tags (book_id, tag_id, tag_index) VALUES (?1, ?2, ?3)",
            params![book_id, tag_id, index as i64],
        )
        .map_err(|err| err.to_string())?;
    }

    log::debug!("saved book {} as {}", path, book_id);
    Ok(book_id)
}

/// Returns the catalog id of `tag`, inserting it and its ancestors as needed.
fn ensure_tag(conn: &Connection, tag: &TagRef) -> Result<i64, String> {
    let parent_id = match tag.parent() {
        Some(parent) => Some(ensure_tag(conn, parent)?),
        None => None,
    };
    let existing: Option<i64> = conn
        .query_row(
            "SELECT tag_id FROM tags WHERE name = ?1 AND parent_id IS ?2",
            params![tag.name(), parent_id],
            |row| row.get(0),
        )
        .optional()
        .map_err(|err| err.to_string())?;
    let tag_id = match existing {
        Some(tag_id) => tag_id,
        None => {
            conn.execute(
                "INSERT INTO tags (name, parent_id) VALUES (?1, ?2)",
                params![tag.name(), parent_id],
            )
            .map_err(|err| err.to_string())?;
            conn.last_insert_rowid()
        }
    };
    tag.set_tag_id(tag_id);
    Ok(tag_id)
}

pub fn delete_book(conn: &Connection, book_id: i64) -> Result<bool, String> {
    let removed = conn
        .execute("DELETE FROM books WHERE book_id = ?1", params![book_id])
        .map_err(|err| err.to_string())?;
    Ok(removed > 0)
}

/// Rebuilds every stored book, interning authors and tags in `registries`.
pub fn load_books(conn: &Connection, registries: &mut Registries) -> Result<Vec<Book>, String> {
    let tags = load_tags(conn, registries)?;

    let mut stmt = conn
        .prepare(
            "SELECT book_id, file_path, title, language, encoding, series, series_index
             FROM books ORDER BY book_id",
        )
        .map_err(|err| err.to_string())?;
    let rows = stmt
        .query_map([], |row| {
            Ok((
                row.get::<_, i64>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, String>(3)?,
                row.get::<_, String>(4)?,
                row.get::<_, String>(5)?,
                row.get::<_, i32>(6)?,
            ))
        })
        .map_err(|err| err.to_string())?;

    let mut books = Vec::new();
    for row in rows {
        let (book_id, path, title, language, encoding, series, series_index) =
            row.map_err(|err| err.to_string())?;
        let mut book = Book::create(BookFile::new(path), book_id, &encoding, &language, &title);
        book.set_series(&series, series_index);
        books.push(book);
    }

    let mut author_stmt = conn
        .prepare(
            "SELECT a.name, a.sort_key FROM book_authors ba
             JOIN authors a ON a.author_id = ba.author_id
             WHERE ba.book_id = ?1 ORDER BY ba.author_index",
        )
        .map_err(|err| err.to_string())?;
    let mut tag_stmt = conn
        .prepare("SELECT tag_id FROM book_tags WHERE book_id = ?1 ORDER BY tag_index")
        .map_err(|err| err.to_string())?;

    for book in &mut books {
        let authors: Vec<(String, String)> = author_stmt
            .query_map(params![book.book_id()], |row| Ok((row.get(0)?, row.get(1)?)))
            .map_err(|err| err.to_string())?
            .collect::<rusqlite::Result<_>>()
            .map_err(|err| err.to_string())?;
        for (name, sort_key) in authors {
            book.add_author_by_name(registries, &name, &sort_key);
        }

        let tag_ids: Vec<i64> = tag_stmt
            .query_map(params![book.book_id()], |row| row.get(0))
            .map_err(|err| err.to_string())?
            .collect::<rusqlite::Result<_>>()
            .map_err(|err| err.to_string())?;
        for tag_id in tag_ids {
            if let Some(tag) = tags.get(&tag_id) {
                book.add_tag(tag.clone());
            }
        }
    }

    log::info!("loaded {} books from catalog", books.len());
    Ok(books)
}

fn load_tags(conn: &Connection, registries: &mut Registries) -> Result<HashMap<i64, TagRef>, String> {
    let mut stmt = conn
        .prepare("SELECT tag_id, name, parent_id FROM tags ORDER BY tag_id")
        .map_err(|err| err.to_string())?;
    let rows: Vec<(i64, String, Option<i64>)> = stmt
        .query_map([], |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)))
        .map_err(|err| err.to_string())?
        .collect::<rusqlite::Result<_>>()
        .map_err(|err| err.to_string())?;

    let records: HashMap<i64, (String, Option<i64>)> = rows
        .into_iter()
        .map(|(tag_id, name, parent_id)| (tag_id, (name, parent_id)))
        .collect();
    let mut resolved: HashMap<i64, TagRef> = HashMap::new();
    let mut ids: Vec<i64> = records.keys().copied().collect();
    ids.sort_unstable();
    for tag_id in ids {
        resolve_tag(tag_id, &records, &mut resolved, registries);
    }
    Ok(resolved)
}

fn resolve_tag(
    tag_id: i64,
    records: &HashMap<i64, (String, Option<i64>)>,
    resolved: &mut HashMap<i64, TagRef>,
    registries: &mut Registries,
) -> Option<TagRef> {
    if let Some(tag) = resolved.get(&tag_id) {
        return Some(tag.clone());
    }
    let (name, parent_id) = records.get(&tag_id)?;
    let parent = match parent_id {
        Some(parent_id) => Some(resolve_tag(*parent_id, records, resolved, registries)?),
        None => None,
    };
    let tag = registries.tags.get(name, parent.as_ref())?;
    tag.set_tag_id(tag_id);
    resolved.insert(tag_id, tag.clone());
    Some(tag)
}

pub fn load_settings(conn: &Connection) -> Result<LibrarySettings, String> {
    let value: Option<String> = conn
        .query_row(
            "SELECT json FROM settings WHERE id = 1",
            [],
            |row| row.get(0),
        )
        .optional()
        .map_err(|err| err.to_string())?;
    match value {
        Some(json) => LibrarySettings::from_json(&json),
        None => Ok(LibrarySettings::default()),
    }
}

pub fn save_settings(conn: &Connection, settings: &LibrarySettings) -> Result<(), String> {
    let json = settings.to_json()?;
    conn.execute(
        "INSERT INTO settings (id, json, updated_at) VALUES (1, ?1, CURRENT_TIMESTAMP)
         ON CONFLICT(id) DO UPDATE SET json = excluded.json, updated_at = excluded.updated_at",
        params![json],
    )
    .map_err(|err| err.to_string())?;
    Ok(())
}
