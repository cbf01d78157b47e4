//! Token stream derivation
//!
//! Narration progress is counted in whitespace-delimited tokens. The stream
//! is always re-derived from the current document text, so index `i` names
//! the same token for as long as the text is unchanged.

use std::ops::Range;

/// Flatten document text into whitespace-separated tokens
///
/// Runs of any whitespace (newlines, tabs, non-breaking spaces) count as a
/// single separator; leading and trailing whitespace produce no tokens.
pub fn tokenize(text: &str) -> Vec<String> {
    text.split_whitespace().map(str::to_string).collect()
}

/// Join a window of tokens into utterance text
pub fn join_tokens(tokens: &[String]) -> String {
    tokens.join(" ")
}

/// Index range of the chunk starting at `start`
///
/// Clipped to the stream end; empty when `start` is past it. A chunk size
/// of zero is treated as one.
pub fn chunk_range(len: usize, start: usize, chunk_size: usize) -> Range<usize> {
    let start = start.min(len);
    let end = start.saturating_add(chunk_size.max(1)).min(len);
    start..end
}

/// Number of chunks needed to cover `len` tokens
pub fn chunk_count(len: usize, chunk_size: usize) -> usize {
    let chunk_size = chunk_size.max(1);
    (len + chunk_size - 1) / chunk_size
}

/// Fraction of a `len`-token stream before `offset`
pub fn progress(offset: usize, len: usize) -> f64 {
    if len == 0 {
        0.0
    } else {
        offset.min(len) as f64 / len as f64
    }
}
