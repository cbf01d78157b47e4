//! Library catalog
//!
//! The catalog is a small JSON document listing books that can be opened.
//! The library view filters it by a search term and a genre, then sorts it
//! with a numeric-aware, case-insensitive comparison.

use crate::{ReaderError, Result};
use log::{debug, info};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fs;
use std::path::Path;
use std::str::FromStr;

/// One catalog entry
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Book {
    pub title: String,
    pub author: String,
    pub genres: Vec<String>,
    /// Location of the book file
    pub download: String,
}

/// Catalog file contents
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Catalog {
    pub books: Vec<Book>,
}

/// Field the library is sorted by
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortKey {
    #[default]
    Title,
    Author,
    Download,
}

impl FromStr for SortKey {
    type Err = ReaderError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "" | "title" => Ok(SortKey::Title),
            "author" => Ok(SortKey::Author),
            "download" => Ok(SortKey::Download),
            other => Err(ReaderError::Catalog(format!("Unknown sort key '{}'", other))),
        }
    }
}

impl SortKey {
    fn field<'a>(&self, book: &'a Book) -> &'a str {
        match self {
            SortKey::Title => &book.title,
            SortKey::Author => &book.author,
            SortKey::Download => &book.download,
        }
    }
}

/// Library view filters
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LibraryQuery {
    /// Matched against title and author, empty matches everything
    pub term: String,
    /// Matched against the genre list, empty matches everything
    pub genre: String,
    pub sort: SortKey,
}

/// Read a catalog file
pub fn load_catalog(path: impl AsRef<Path>) -> Result<Catalog> {
    let path = path.as_ref();
    debug!("Loading catalog from {:?}", path);

    let raw = fs::read_to_string(path).map_err(|e| {
        ReaderError::Catalog(format!("Failed to read {}: {}", path.display(), e))
    })?;
    let catalog: Catalog = serde_json::from_str(&raw)?;

    info!("Catalog loaded: {} book(s)", catalog.books.len());
    Ok(catalog)
}

/// Apply the query's filters and ordering
pub fn filter_and_sort(books: &[Book], query: &LibraryQuery) -> Vec<Book> {
    let term = query.term.trim().to_lowercase();
    let genre = query.genre.trim().to_lowercase();

    let mut out: Vec<Book> = books
        .iter()
        .filter(|b| {
            let term_ok = term.is_empty()
                || b.title.to_lowercase().contains(&term)
                || b.author.to_lowercase().contains(&term);
            let genre_ok =
                genre.is_empty() || b.genres.join(" ").to_lowercase().contains(&genre);
            term_ok && genre_ok
        })
        .cloned()
        .collect();

    out.sort_by(|x, y| natural_cmp(query.sort.field(x), query.sort.field(y)));
    out
}

/// Status text shown above the list
pub fn status_line(count: usize) -> String {
    if count == 0 {
        "No books found.".to_string()
    } else {
        format!("Showing {} book(s).", count)
    }
}

/// Terminal rendering of one entry
pub fn render_entry(book: &Book) -> String {
    format!(
        "{}\n  Author: {}\n  Genres: {}\n  Open: {}",
        book.title,
        book.author,
        book.genres.join(", "),
        book.download
    )
}

/// Compare strings case-insensitively, treating digit runs as numbers
///
/// "Book 2" sorts before "book 10".
pub fn natural_cmp(a: &str, b: &str) -> Ordering {
    let mut a = a.chars().peekable();
    let mut b = b.chars().peekable();

    loop {
        match (a.peek().copied(), b.peek().copied()) {
            (None, None) => return Ordering::Equal,
            (None, Some(_)) => return Ordering::Less,
            (Some(_), None) => return Ordering::Greater,
            (Some(x), Some(y)) if x.is_ascii_digit() && y.is_ascii_digit() => {
                let left = take_number(&mut a);
                let right = take_number(&mut b);
                let ord = compare_digits(&left, &right);
                if ord != Ordering::Equal {
                    return ord;
                }
            }
            (Some(x), Some(y)) => {
                let ord = x.to_lowercase().cmp(y.to_lowercase());
                if ord != Ordering::Equal {
                    return ord;
                }
                a.next();
                b.next();
            }
        }
    }
}

fn take_number(chars: &mut std::iter::Peekable<std::str::Chars<'_>>) -> String {
    let mut digits = String::new();
    while let Some(c) = chars.peek().copied().filter(char::is_ascii_digit) {
        digits.push(c);
        chars.next();
    }
    digits
}

/// Compare digit strings by numeric value without overflow
fn compare_digits(a: &str, b: &str) -> Ordering {
    let a = a.trim_start_matches('0');
    let b = b.trim_start_matches('0');
    a.len().cmp(&b.len()).then_with(|| a.cmp(b))
}
