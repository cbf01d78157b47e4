//! Configuration loading tests
//!
//! Tests that reader configuration loads correctly from disk and provides
//! expected default values

use dfreader::library::SortKey;
use dfreader::speech::Backend;
use dfreader::state::config::Config;
use std::fs;
use std::time::Duration;
use tempfile::TempDir;

#[test]
fn test_config_created_when_missing() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("dfreader.cfg");

    let config = Config::load_from(&path).expect("Failed to load config");
    assert!(path.exists());
    assert_eq!(config.path(), &path);

    let written = fs::read_to_string(&path).unwrap();
    assert!(written.contains("[speech]"));
    assert!(written.contains("chunk_size"));
}

#[test]
fn test_config_reads_user_values() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("dfreader.cfg");
    fs::write(
        &path,
        "[speech]\n\
         backend=espeak\n\
         chunk_size=30\n\
         chunk_delay_ms=50\n\
         rate=0.8\n\
         volume=70\n\
         voice_idx=1\n\
         [reader]\n\
         bookmark_file=/var/tmp/bm.json\n\
         [library]\n\
         catalog=books/catalog.json\n\
         sort=author\n",
    )
    .unwrap();

    let config = Config::load_from(&path).expect("Failed to load config");
    assert_eq!(config.backend(), Backend::Espeak);
    assert_eq!(config.chunk_size(), 30);
    assert_eq!(config.chunk_delay(), Duration::from_millis(50));
    assert_eq!(config.rate(), 0.8);
    assert_eq!(config.volume(), Some(70));
    assert_eq!(config.voice_idx(), Some(1));
    assert_eq!(
        config.bookmark_path().unwrap().to_str(),
        Some("/var/tmp/bm.json")
    );
    assert_eq!(config.catalog_path().to_str(), Some("books/catalog.json"));
    assert_eq!(config.default_sort(), SortKey::Author);
}

#[test]
fn test_config_save_round_trip() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("dfreader.cfg");

    let mut config = Config::load_from(&path).unwrap();
    config.set("speech", "chunk_size", "12");
    config.save().unwrap();

    let reloaded = Config::load_from(&path).unwrap();
    assert_eq!(reloaded.chunk_size(), 12);
    assert_eq!(reloaded.sequencer_options().chunk_size, 12);
}

#[test]
fn test_config_unwritable_location_is_an_error() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("no-such-dir").join("dfreader.cfg");

    assert!(Config::load_from(&path).is_err());
    assert!(!path.exists());
}
