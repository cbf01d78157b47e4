//! Document loading
//!
//! Plain text is read as-is. EPUB files are walked chapter by chapter in
//! spine order, markup is stripped and chapters are separated by blank
//! lines.

use crate::{ReaderError, Result};
use log::{debug, info};
use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use std::fs;
use std::path::Path;

/// A loaded document
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    pub title: String,
    /// Rendered plain text; tokens are derived from this
    pub text: String,
    /// Where the text came from, e.g. "epub:/books/emma.epub"
    pub source: String,
}

impl Document {
    /// Document built from text already in memory
    pub fn from_text(title: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            text: text.into(),
            source: "memory".to_string(),
        }
    }

    pub fn token_count(&self) -> usize {
        self.text.split_whitespace().count()
    }
}

/// Load a document, choosing the format from the file extension
pub fn load(path: impl AsRef<Path>) -> Result<Document> {
    let path = path.as_ref();
    if !path.exists() {
        return Err(ReaderError::Document(format!(
            "File not found: {}",
            path.display()
        )));
    }

    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_lowercase)
        .unwrap_or_default();

    let doc = match ext.as_str() {
        "epub" => load_epub(path)?,
        _ => load_text(path)?,
    };

    if doc.text.trim().is_empty() {
        return Err(ReaderError::Document(format!(
            "No readable text in {}",
            path.display()
        )));
    }

    info!(
        "Loaded '{}' ({} tokens) from {}",
        doc.title,
        doc.token_count(),
        doc.source
    );
    Ok(doc)
}

fn title_from_path(path: &Path) -> String {
    path.file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("Untitled")
        .to_string()
}

fn load_text(path: &Path) -> Result<Document> {
    let bytes = fs::read(path)?;
    let text = String::from_utf8(bytes)
        .map_err(|e| ReaderError::Document(format!("{} is not UTF-8: {}", path.display(), e)))?;

    Ok(Document {
        title: title_from_path(path),
        text,
        source: format!("text:{}", path.display()),
    })
}

fn load_epub(path: &Path) -> Result<Document> {
    let mut doc =
        epub::doc::EpubDoc::new(path).map_err(|e| ReaderError::Epub(e.to_string()))?;

    let chapters = doc.get_num_chapters();
    if chapters == 0 {
        return Err(ReaderError::Epub("No chapters found in EPUB".to_string()));
    }
    debug!("EPUB has {} chapters", chapters);

    let mut text = String::new();
    for idx in 0..chapters {
        if !doc.set_current_chapter(idx) {
            continue;
        }
        let Some((markup, _mime)) = doc.get_current_str() else {
            continue;
        };

        let chapter = html_to_text(&markup);
        if chapter.is_empty() {
            continue;
        }
        if !text.is_empty() {
            text.push_str("\n\n");
        }
        text.push_str(&chapter);
    }

    Ok(Document {
        title: title_from_path(path),
        text,
        source: format!("epub:{}", path.display()),
    })
}

static HIDDEN_BLOCKS: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?is)<(head|script|style)\b[^>]*>.*?</(head|script|style)\s*>")
        .expect("hidden block pattern")
});

static BLOCK_BREAKS: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)<br\s*/?>|</(p|div|h[1-6]|li|blockquote|tr|section)\s*>")
        .expect("block break pattern")
});

static TAGS: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?s)<[^>]*>").expect("tag pattern"));

static ENTITIES: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"&(#[0-9]+|#[xX][0-9a-fA-F]+|[a-zA-Z]+);").expect("entity pattern")
});

/// Reduce XHTML chapter markup to plain text, one paragraph per line
pub fn html_to_text(html: &str) -> String {
    let text = HIDDEN_BLOCKS.replace_all(html, "");
    let text = BLOCK_BREAKS.replace_all(&text, "\n");
    let text = TAGS.replace_all(&text, "");
    let text = ENTITIES.replace_all(&text, |caps: &Captures| decode_entity(caps));

    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

fn decode_entity(caps: &Captures) -> String {
    let name = &caps[1];
    let decoded = if let Some(num) = name.strip_prefix("#x").or_else(|| name.strip_prefix("#X")) {
        u32::from_str_radix(num, 16).ok().and_then(char::from_u32)
    } else if let Some(num) = name.strip_prefix('#') {
        num.parse().ok().and_then(char::from_u32)
    } else {
        match name {
            "amp" => Some('&'),
            "lt" => Some('<'),
            "gt" => Some('>'),
            "quot" => Some('"'),
            "apos" => Some('\''),
            "nbsp" => Some('\u{a0}'),
            "mdash" => Some('\u{2014}'),
            "ndash" => Some('\u{2013}'),
            "hellip" => Some('\u{2026}'),
            "lsquo" => Some('\u{2018}'),
            "rsquo" => Some('\u{2019}'),
            "ldquo" => Some('\u{201c}'),
            "rdquo" => Some('\u{201d}'),
            _ => None,
        }
    };

    decoded.map_or_else(|| caps[0].to_string(), |c| c.to_string())
}
