//! Orderings used to sort books, authors and tags in the library views.

use std::cmp::Ordering;

use crate::author::AuthorRef;
use crate::book::Book;
use crate::tag::{Tag, TagRef};

/// Orders books by series, then position in series, then title.
///
/// A book without a series is placed by comparing its title against the
/// other book's series name, so standalone titles interleave with series.
/// That branch is asymmetric: when a title equals the other book's series
/// name, one direction reports `Equal` and the other `Less`, so this is not a
/// strict weak ordering for every input.
pub fn compare_books(book0: &Book, book1: &Book) -> Ordering {
    let series0 = book0.series_title();
    let series1 = book1.series_title();
    if series0 == series1 {
        if !series0.is_empty() {
            let by_index = book0.index_in_series().cmp(&book1.index_in_series());
            if by_index != Ordering::Equal {
                return by_index;
            }
        }
        return book0.title().cmp(book1.title());
    }
    if series0.is_empty() {
        return book0.title().cmp(series1);
    }
    if series1.is_empty() {
        return if series0 <= book1.title() {
            Ordering::Less
        } else {
            Ordering::Greater
        };
    }
    series0.cmp(series1)
}

/// Orders authors by sort key, then display name. Missing authors sort first.
pub fn compare_authors(author0: Option<&AuthorRef>, author1: Option<&AuthorRef>) -> Ordering {
    match (author0, author1) {
        (None, None) => Ordering::Equal,
        (None, Some(_)) => Ordering::Less,
        (Some(_), None) => Ordering::Greater,
        (Some(author0), Some(author1)) => author0
            .sort_key()
            .cmp(author1.sort_key())
            .then_with(|| author0.name().cmp(author1.name())),
    }
}

/// Orders tags depth-first through the hierarchy: an ancestor precedes its
/// descendants and siblings are ordered by name. Missing tags sort first.
pub fn compare_tags(tag0: Option<&TagRef>, tag1: Option<&TagRef>) -> Ordering {
    let (mut tag0, mut tag1): (&Tag, &Tag) = match (tag0, tag1) {
        (None, None) => return Ordering::Equal,
        (None, Some(_)) => return Ordering::Less,
        (Some(_), None) => return Ordering::Greater,
        (Some(tag0), Some(tag1)) => (&**tag0, &**tag1),
    };

    let level0 = tag0.level();
    let level1 = tag1.level();
    match level0.cmp(&level1) {
        Ordering::Greater => {
            tag0 = lift(tag0, level1);
            if std::ptr::eq(tag0, tag1) {
                return Ordering::Greater;
            }
        }
        Ordering::Less => {
            tag1 = lift(tag1, level0);
            if std::ptr::eq(tag0, tag1) {
                return Ordering::Less;
            }
        }
        Ordering::Equal => {
            if std::ptr::eq(tag0, tag1) {
                return Ordering::Equal;
            }
        }
    }

    while !same_parent(tag0, tag1) {
        match (tag0.parent(), tag1.parent()) {
            (Some(parent0), Some(parent1)) => {
                tag0 = &**parent0;
                tag1 = &**parent1;
            }
            _ => break,
        }
    }
    tag0.name().cmp(tag1.name())
}

fn lift(mut tag: &Tag, level: usize) -> &Tag {
    while tag.level() > level {
        match tag.parent() {
            Some(parent) => tag = &**parent,
            None => break,
        }
    }
    tag
}

fn same_parent(tag0: &Tag, tag1: &Tag) -> bool {
    match (tag0.parent(), tag1.parent()) {
        (None, None) => true,
        (Some(parent0), Some(parent1)) => parent0.ptr_eq(parent1),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::{compare_authors, compare_books, compare_tags};
    use crate::author::AuthorRegistry;
    use crate::book::Book;
    use crate::file::BookFile;
    use crate::tag::{TagRef, TagRegistry};
    use std::cmp::Ordering;

    fn book(title: &str, series: &str, index: i32) -> Book {
        let file = BookFile::new(format!("/books/{}.epub", title));
        let mut book = Book::create(file, 0, "auto", "en", title);
        book.set_series(series, index);
        book
    }

    #[test]
    fn books_in_same_series_follow_index_then_title() {
        let first = book("Foundation", "Foundation", 1);
        let second = book("Foundation and Empire", "Foundation", 2);
        let also_second = book("Alternate Second", "Foundation", 2);
        assert_eq!(compare_books(&first, &second), Ordering::Less);
        assert_eq!(compare_books(&second, &first), Ordering::Greater);
        assert_eq!(compare_books(&also_second, &second), Ordering::Less);
    }

    #[test]
    fn books_without_series_compare_by_title() {
        let a = book("Anathem", "", 0);
        let b = book("Blindsight", "", 0);
        assert_eq!(compare_books(&a, &b), Ordering::Less);
        assert_eq!(compare_books(&b, &a), Ordering::Greater);
    }

    #[test]
    fn standalone_title_interleaves_with_series_names() {
        let standalone = book("Hyperion Cantos Guide", "", 0);
        let in_series = book("The Fall of Hyperion", "Hyperion", 2);
        assert_eq!(compare_books(&in_series, &standalone), Ordering::Less);
        assert_eq!(compare_books(&standalone, &in_series), Ordering::Greater);
        let earlier = book("Dune", "", 0);
        assert_eq!(compare_books(&earlier, &in_series), Ordering::Less);
    }

    #[test]
    fn standalone_branch_is_asymmetric_on_ties() {
        let standalone = book("Dune", "", 0);
        let in_series = book("Dune Messiah", "Dune", 2);
        // title equal to the other series name: a tie one way, Less the other
        assert_eq!(compare_books(&standalone, &in_series), Ordering::Equal);
        assert_eq!(compare_books(&in_series, &standalone), Ordering::Less);
    }

    #[test]
    fn null_author_sorts_first() {
        let mut registry = AuthorRegistry::new();
        let author = registry.get("Frank Herbert", "").expect("expected author");
        assert_eq!(compare_authors(None, Some(&author)), Ordering::Less);
        assert_eq!(compare_authors(Some(&author), None), Ordering::Greater);
        assert_eq!(compare_authors(None, None), Ordering::Equal);
    }

    #[test]
    fn authors_order_by_sort_key_then_name() {
        let mut registry = AuthorRegistry::new();
        let herbert = registry.get("Frank Herbert", "").expect("expected author");
        let brian = registry.get("Brian Herbert", "").expect("expected author");
        let asimov = registry.get("Isaac Asimov", "").expect("expected author");
        let mut authors = vec![herbert, asimov, brian];
        authors.sort_by(|a, b| compare_authors(Some(a), Some(b)));
        let names: Vec<&str> = authors.iter().map(|author| author.name()).collect();
        assert_eq!(names, vec!["Isaac Asimov", "Brian Herbert", "Frank Herbert"]);
    }

    #[test]
    fn ancestors_precede_descendants() {
        let mut registry = TagRegistry::new();
        let fiction = registry.get_by_full_name("Fiction").expect("expected tag");
        let scifi = registry.get_by_full_name("Fiction.SciFi").expect("expected tag");
        assert_eq!(compare_tags(Some(&fiction), Some(&scifi)), Ordering::Less);
        assert_eq!(compare_tags(Some(&scifi), Some(&fiction)), Ordering::Greater);
        assert_eq!(compare_tags(Some(&scifi), Some(&scifi)), Ordering::Equal);
        assert_eq!(compare_tags(None, Some(&fiction)), Ordering::Less);
        assert_eq!(compare_tags(Some(&fiction), None), Ordering::Greater);
    }

    #[test]
    fn tag_order_is_total_over_a_hierarchy() {
        let mut registry = TagRegistry::new();
        let names = [
            "Fiction.SciFi.Space",
            "History",
            "Fiction",
            "Fiction.Fantasy",
            "History.Ancient",
            "Fiction.SciFi",
            "Art",
        ];
        let mut tags: Vec<TagRef> = names
            .iter()
            .map(|name| registry.get_by_full_name(name).expect("expected tag"))
            .collect();
        tags.sort();
        let sorted: Vec<String> = tags.iter().map(|tag| tag.full_name()).collect();
        assert_eq!(
            sorted,
            vec![
                "Art",
                "Fiction",
                "Fiction.Fantasy",
                "Fiction.SciFi",
                "Fiction.SciFi.Space",
                "History",
                "History.Ancient",
            ]
        );

        for a in &tags {
            for b in &tags {
                let forward = compare_tags(Some(a), Some(b));
                assert_eq!(forward, compare_tags(Some(b), Some(a)).reverse());
                for c in &tags {
                    if forward == Ordering::Less && compare_tags(Some(b), Some(c)) == Ordering::Less {
                        assert_eq!(compare_tags(Some(a), Some(c)), Ordering::Less);
                    }
                }
            }
        }
    }
}
