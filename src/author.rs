use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

/// A book author: display name plus the key used for sorting.
#[derive(Debug, PartialEq, Eq, Hash)]
pub struct Author {
    name: String,
    sort_key: String,
}

pub type AuthorRef = Rc<Author>;

impl Author {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn sort_key(&self) -> &str {
        &self.sort_key
    }
}

impl fmt::Display for Author {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

/// Interns authors so every (name, sort key) pair maps to one shared handle.
#[derive(Debug, Default)]
pub struct AuthorRegistry {
    authors: HashMap<(String, String), AuthorRef>,
}

impl AuthorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the shared author, creating it on first use.
    ///
    /// Both parts are trimmed. An empty name yields `None`; an empty sort key
    /// is derived from the name (see [`derive_sort_key`]).
    pub fn get(&mut self, name: &str, sort_key: &str) -> Option<AuthorRef> {
        let name = normalize_ws(name);
        if name.is_empty() {
            return None;
        }
        let sort_key = match normalize_ws(sort_key) {
            key if key.is_empty() => derive_sort_key(&name),
            key => key.to_lowercase(),
        };
        let author = self
            .authors
            .entry((name.clone(), sort_key.clone()))
            .or_insert_with(|| Rc::new(Author { name, sort_key }));
        Some(Rc::clone(author))
    }

    pub fn len(&self) -> usize {
        self.authors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.authors.is_empty()
    }

    /// Forgets authors no book refers to any more.
    pub fn purge_unused(&mut self) -> usize {
        let before = self.authors.len();
        self.authors.retain(|_, author| Rc::strong_count(author) > 1);
        before - self.authors.len()
    }
}

/// Sort key for an author given only a display name.
/// Handles both "First Last" and "Last, First" formats.
pub fn derive_sort_key(name: &str) -> String {
    let name = name.trim().to_lowercase();
    if let Some(pos) = name.find(',') {
        return name[..pos].trim().to_string();
    }
    name.split_whitespace().last().unwrap_or(&name).to_string()
}

fn normalize_ws(value: &str) -> String {
    value.split_whitespace().collect::<Vec<_>>().join(" ")
}
