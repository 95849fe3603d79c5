use std::cell::Cell;
use std::cmp::Ordering;
use std::collections::HashMap;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::ops::Deref;
use std::rc::Rc;

/// Separator between levels in a tag's full name.
pub const DELIMITER: char = '.';

/// One node of the tag hierarchy.
#[derive(Debug)]
pub struct Tag {
    index: usize,
    name: String,
    parent: Option<TagRef>,
    level: usize,
    tag_id: Cell<i64>,
}

impl Tag {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn parent(&self) -> Option<&TagRef> {
        self.parent.as_ref()
    }

    /// Depth in the hierarchy, zero for root tags.
    pub fn level(&self) -> usize {
        self.level
    }

    /// Catalog id, zero until the tag has been saved.
    pub fn tag_id(&self) -> i64 {
        self.tag_id.get()
    }

    pub fn set_tag_id(&self, tag_id: i64) {
        self.tag_id.set(tag_id);
    }

    /// Ancestor names and this tag's name joined with [`DELIMITER`].
    pub fn full_name(&self) -> String {
        match &self.parent {
            Some(parent) => format!("{}{}{}", parent.full_name(), DELIMITER, self.name),
            None => self.name.clone(),
        }
    }

    /// True when `self` is a strict ancestor of `tag`.
    pub fn is_ancestor_of(&self, tag: &Tag) -> bool {
        if tag.level <= self.level {
            return false;
        }
        let mut current = tag;
        while current.level > self.level {
            match &current.parent {
                Some(parent) => current = &**parent,
                None => return false,
            }
        }
        std::ptr::eq(current, self)
    }
}

/// Shared handle to an interned tag. Equality is identity.
#[derive(Debug, Clone)]
pub struct TagRef(Rc<Tag>);

impl TagRef {
    pub fn ptr_eq(&self, other: &TagRef) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}

impl Deref for TagRef {
    type Target = Tag;

    fn deref(&self) -> &Tag {
        &self.0
    }
}

impl PartialEq for TagRef {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other)
    }
}

impl Eq for TagRef {}

impl Hash for TagRef {
    fn hash<H: Hasher>(&self, state: &mut H) {
        std::ptr::hash(Rc::as_ptr(&self.0), state);
    }
}

impl PartialOrd for TagRef {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for TagRef {
    fn cmp(&self, other: &Self) -> Ordering {
        crate::comparators::compare_tags(Some(self), Some(other))
    }
}

impl fmt::Display for TagRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.full_name())
    }
}

/// Interns tags so each (parent, name) pair exists exactly once.
#[derive(Debug, Default)]
pub struct TagRegistry {
    tags: Vec<TagRef>,
    lookup: HashMap<(Option<usize>, String), usize>,
}

impl TagRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the child of `parent` named `name`, creating it on first use.
    /// The name is trimmed; an empty name yields `None`.
    pub fn get(&mut self, name: &str, parent: Option<&TagRef>) -> Option<TagRef> {
        let name = name.trim();
        if name.is_empty() {
            return None;
        }
        let key = (parent.map(|tag| tag.index), name.to_string());
        if let Some(&index) = self.lookup.get(&key) {
            return Some(self.tags[index].clone());
        }
        let index = self.tags.len();
        let tag = TagRef(Rc::new(Tag {
            index,
            name: name.to_string(),
            parent: parent.cloned(),
            level: parent.map(|tag| tag.level + 1).unwrap_or(0),
            tag_id: Cell::new(0),
        }));
        self.tags.push(tag.clone());
        self.lookup.insert(key, index);
        Some(tag)
    }

    /// Resolves a dot-delimited full name such as `Fiction.SciFi`.
    /// Every segment is trimmed; an empty segment yields `None`.
    pub fn get_by_full_name(&mut self, full_name: &str) -> Option<TagRef> {
        let full_name = full_name.trim();
        match full_name.rfind(DELIMITER) {
            None => self.get(full_name, None),
            Some(index) => {
                let parent = self.get_by_full_name(&full_name[..index])?;
                self.get(&full_name[index + 1..], Some(&parent))
            }
        }
    }

    /// Looks up an existing child of `parent` without creating it.
    pub fn find(&self, name: &str, parent: Option<&TagRef>) -> Option<TagRef> {
        let key = (parent.map(|tag| tag.index), name.trim().to_string());
        self.lookup.get(&key).map(|&index| self.tags[index].clone())
    }

    /// Lookup-only form of [`TagRegistry::get_by_full_name`].
    pub fn find_by_full_name(&self, full_name: &str) -> Option<TagRef> {
        let full_name = full_name.trim();
        match full_name.rfind(DELIMITER) {
            None => self.find(full_name, None),
            Some(index) => {
                let parent = self.find_by_full_name(&full_name[..index])?;
                self.find(&full_name[index + 1..], Some(&parent))
            }
        }
    }

    /// Rebuilds `tag`'s path below `from` underneath `to`.
    ///
    /// `Fiction.SciFi.Space` cloned from `Fiction` to `Genre` gives
    /// `Genre.SciFi.Space`. Yields `None` unless `from` is a strict ancestor
    /// of `tag`.
    pub fn clone_sub_tag(&mut self, tag: &TagRef, from: &TagRef, to: &TagRef) -> Option<TagRef> {
        let mut names = Vec::new();
        let mut current = tag.clone();
        while current.level > from.level {
            names.push(current.name.clone());
            current = current.parent.clone()?;
        }
        if names.is_empty() || current != *from {
            return None;
        }
        let mut result = to.clone();
        for name in names.iter().rev() {
            result = self.get(name, Some(&result))?;
        }
        Some(result)
    }

    pub fn by_tag_id(&self, tag_id: i64) -> Option<TagRef> {
        if tag_id == 0 {
            return None;
        }
        self.tags.iter().find(|tag| tag.tag_id() == tag_id).cloned()
    }

    pub fn tags(&self) -> &[TagRef] {
        &self.tags
    }

    pub fn len(&self) -> usize {
        self.tags.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tags.is_empty()
    }
}
