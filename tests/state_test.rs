//! Reader state tests
//!
//! Open real files, read them aloud through a scripted engine and check that
//! bookmarks survive a restart of the reader.

mod common;

use common::ScriptedEngine;
use dfreader::bookmark::{BookmarkStore, JsonBookmarkStore};
use dfreader::state::config::Config;
use dfreader::state::State;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tempfile::TempDir;

fn reader(engine: &ScriptedEngine, bookmark: &Path) -> State {
    let mut config = Config::in_memory();
    config.set("speech", "chunk_size", "2");
    State::with_parts(
        config,
        Some(Box::new(engine.clone())),
        Box::new(JsonBookmarkStore::new(bookmark)),
    )
}

fn write_book(dir: &TempDir) -> PathBuf {
    let path = dir.path().join("fox.txt");
    fs::write(&path, "the quick brown\nfox jumps over").unwrap();
    path
}

#[test]
fn test_open_and_read_aloud() {
    let dir = TempDir::new().unwrap();
    let engine = ScriptedEngine::new();
    let mut state = reader(&engine, &dir.path().join("bookmark.json"));

    state.open(write_book(&dir)).expect("book should open");
    assert_eq!(state.document().map(|d| d.title.as_str()), Some("fox"));
    assert_eq!(state.status(), "fox: stopped");

    state.read_aloud();
    assert_eq!(engine.texts(), vec!["the quick"]);
    assert_eq!(state.status(), "fox: reading at token 0 of 6");
}

#[test]
fn test_bookmark_survives_restart() {
    let dir = TempDir::new().unwrap();
    let bookmark = dir.path().join("state").join("bookmark.json");
    let book = write_book(&dir);

    let engine = ScriptedEngine::new();
    let mut state = reader(&engine, &bookmark);
    state.open(&book).unwrap();
    state.read_aloud();

    let now = Instant::now();
    engine.finish();
    state.pump(now);
    state.pump(now + Duration::from_secs(1));
    assert_eq!(engine.texts(), vec!["the quick", "brown fox"]);
    state.stop_reading();
    assert!(!state.sequencer().is_speaking());

    let stored = JsonBookmarkStore::new(&bookmark).load().unwrap();
    assert_eq!(stored.map(|b| b.token_offset), Some(2));

    // A fresh reader picks up where the first one left off
    let engine = ScriptedEngine::new();
    let mut state = reader(&engine, &bookmark);
    state.open(&book).unwrap();
    state.read_aloud();
    assert_eq!(engine.texts(), vec!["brown fox"]);
}

#[test]
fn test_bookmark_here_records_position() {
    let dir = TempDir::new().unwrap();
    let bookmark = dir.path().join("bookmark.json");
    let engine = ScriptedEngine::new();
    let mut state = reader(&engine, &bookmark);
    state.open(write_book(&dir)).unwrap();

    assert_eq!(state.bookmark_here(), None);

    state.read_from(4);
    assert_eq!(engine.texts(), vec!["jumps over"]);
    assert_eq!(state.bookmark_here(), Some(4));

    let stored = JsonBookmarkStore::new(&bookmark).load().unwrap().unwrap();
    assert_eq!(stored.token_offset, 4);
    assert!((stored.scroll - 4.0 / 6.0).abs() < 1e-9);
}

#[test]
fn test_opening_another_document_stops_reading() {
    let dir = TempDir::new().unwrap();
    let engine = ScriptedEngine::new();
    let mut state = reader(&engine, &dir.path().join("bookmark.json"));
    state.open(write_book(&dir)).unwrap();
    state.read_aloud();

    let other = dir.path().join("other.txt");
    fs::write(&other, "another story").unwrap();
    state.open(&other).unwrap();

    assert!(!state.sequencer().is_speaking());
    assert_eq!(engine.log().cancels, 1);
    assert!(engine.log().live.is_none());
}

#[test]
fn test_open_rejects_missing_and_blank_files() {
    let dir = TempDir::new().unwrap();
    let engine = ScriptedEngine::new();
    let mut state = reader(&engine, &dir.path().join("bookmark.json"));

    assert!(state.open(dir.path().join("absent.txt")).is_err());

    let blank = dir.path().join("blank.txt");
    fs::write(&blank, " \n\t\n").unwrap();
    assert!(state.open(&blank).is_err());
    assert!(state.document().is_none());
}

#[test]
fn test_completion_bookmarks_store_progress_after_each_chunk() {
    let dir = TempDir::new().unwrap();
    let bookmark = dir.path().join("bookmark.json");
    let engine = ScriptedEngine::new();
    let mut state = reader(&engine, &bookmark);
    state.open(write_book(&dir)).unwrap();
    state.read_aloud();

    let store = JsonBookmarkStore::new(&bookmark);
    let mut now = Instant::now();
    for expected in [2usize, 4, 6] {
        engine.finish();
        state.pump(now);
        let saved = store.load().unwrap().unwrap();
        assert_eq!(saved.token_offset, expected);
        assert!(
            (saved.scroll - expected as f64 / 6.0).abs() < 1e-9,
            "bookmark at {} saved scroll {}",
            expected,
            saved.scroll
        );
        now += Duration::from_secs(1);
        state.pump(now);
    }
    assert!(!state.sequencer().is_speaking());
}

#[test]
fn test_configured_volume_applied_to_engine() {
    let dir = TempDir::new().unwrap();
    let engine = ScriptedEngine::new();
    let mut config = Config::in_memory();
    config.set("speech", "volume", "70");

    let _state = State::with_parts(
        config,
        Some(Box::new(engine.clone())),
        Box::new(JsonBookmarkStore::new(dir.path().join("bookmark.json"))),
    );
    assert_eq!(engine.log().volume, Some(70));
}

#[test]
fn test_rejected_volume_does_not_stop_reading() {
    let dir = TempDir::new().unwrap();
    let engine = ScriptedEngine::new();
    engine.refuse_volume(true);
    let mut config = Config::in_memory();
    config.set("speech", "volume", "70");
    config.set("speech", "chunk_size", "2");

    let mut state = State::with_parts(
        config,
        Some(Box::new(engine.clone())),
        Box::new(JsonBookmarkStore::new(dir.path().join("bookmark.json"))),
    );
    state.open(write_book(&dir)).unwrap();
    state.read_aloud();

    assert_eq!(engine.log().volume, None);
    assert_eq!(engine.texts(), vec!["the quick"]);
}

#[test]
fn test_rate_change_saved_to_config_file() {
    let dir = TempDir::new().unwrap();
    let config_path = dir.path().join("dfreader.cfg");
    let engine = ScriptedEngine::new();
    let config = Config::load_from(&config_path).unwrap();

    let mut state = State::with_parts(
        config,
        Some(Box::new(engine.clone())),
        Box::new(JsonBookmarkStore::new(dir.path().join("bookmark.json"))),
    );
    assert_eq!(state.adjust_rate(0.25), 1.25);

    let reloaded = Config::load_from(&config_path).unwrap();
    assert_eq!(reloaded.rate(), 1.25);
}
