//! Application state management
//!
//! The State struct is the central data structure for the reader, holding
//! configuration, the open document and the read-aloud sequencer.

pub mod config;

use crate::bookmark::{BookmarkStore, JsonBookmarkStore, MemoryBookmarkStore};
use crate::document::{self, Document};
use crate::sequencer::{PlaybackState, Sequencer};
use crate::speech::{create_engine, SpeechEngine};
use crate::text::progress;
use crate::Result;
use config::Config;
use log::{info, warn};
use std::path::Path;
use std::time::{Duration, Instant};

/// Lowest and highest rate multiplier reachable by rate adjustment
const MIN_RATE: f32 = 0.5;
const MAX_RATE: f32 = 3.0;

/// Main application state for the reader
pub struct State {
    /// Configuration loaded from ~/.dfreader.cfg
    pub config: Config,

    /// Read-aloud driver
    sequencer: Sequencer,

    /// Document currently open, if any
    document: Option<Document>,
}

impl State {
    /// Create the application state from configuration
    ///
    /// A missing speech engine is not fatal: read-aloud becomes a no-op.
    pub fn new(config: Config) -> Result<Self> {
        info!("Initializing state from {:?}", config.path());

        let engine = match create_engine(config.backend()) {
            Ok(engine) => Some(engine),
            Err(e) => {
                warn!("Read-aloud unavailable: {}", e);
                None
            }
        };

        let store: Box<dyn BookmarkStore> = match config.bookmark_path() {
            Some(path) => {
                info!("Bookmarks kept in {:?}", path);
                Box::new(JsonBookmarkStore::new(path))
            }
            None => {
                warn!("No home directory, bookmarks will not persist");
                Box::new(MemoryBookmarkStore::new())
            }
        };

        Ok(Self::with_parts(config, engine, store))
    }

    /// Assemble state from explicit parts
    ///
    /// The configured volume is applied to the engine; an engine that
    /// rejects it keeps its default.
    pub fn with_parts(
        config: Config,
        mut engine: Option<Box<dyn SpeechEngine>>,
        store: Box<dyn BookmarkStore>,
    ) -> Self {
        if let (Some(engine), Some(volume)) = (engine.as_mut(), config.volume()) {
            match engine.set_volume(volume) {
                Ok(()) => info!("Speech volume set to {}", volume),
                Err(e) => warn!("Keeping default volume: {}", e),
            }
        }

        let options = config.sequencer_options();
        let sequencer =
            Sequencer::new(engine, store, options).with_scroll_fn(Box::new(progress));
        Self {
            config,
            sequencer,
            document: None,
        }
    }

    /// Open a document file, stopping any narration of the previous one
    pub fn open(&mut self, path: impl AsRef<Path>) -> Result<()> {
        let doc = document::load(path)?;
        self.set_document(doc);
        Ok(())
    }

    /// Replace the open document
    pub fn set_document(&mut self, doc: Document) {
        self.sequencer.stop();
        self.document = Some(doc);
    }

    pub fn document(&self) -> Option<&Document> {
        self.document.as_ref()
    }

    pub fn sequencer(&self) -> &Sequencer {
        &self.sequencer
    }

    /// Read aloud from the bookmark, or from the start
    pub fn read_aloud(&mut self) {
        if let Some(doc) = &self.document {
            self.sequencer.resume(&doc.text);
        }
    }

    /// Read aloud from a specific token
    pub fn read_from(&mut self, offset: usize) {
        if let Some(doc) = &self.document {
            self.sequencer.start_from(&doc.text, offset);
        }
    }

    pub fn stop_reading(&mut self) {
        self.sequencer.stop();
    }

    /// Bookmark the current read-aloud position
    ///
    /// Returns the saved offset, None when nothing is being read.
    pub fn bookmark_here(&mut self) -> Option<usize> {
        let cursor = self.sequencer.cursor()?;
        let scroll = self.scroll_position();
        self.sequencer.save_bookmark(cursor, scroll);
        Some(cursor)
    }

    /// Nudge the speech rate; applies from the next chunk
    ///
    /// The new rate is saved to the config file for the next run.
    pub fn adjust_rate(&mut self, delta: f32) -> f32 {
        let rate = (self.sequencer.options().rate + delta).clamp(MIN_RATE, MAX_RATE);
        self.sequencer.set_rate(rate);
        self.config.set("speech", "rate", &rate.to_string());
        if let Err(e) = self.config.save() {
            warn!("Rate not saved: {}", e);
        }
        rate
    }

    pub fn set_voice(&mut self, voice: Option<usize>) {
        self.sequencer.set_voice(voice);
    }

    /// Progress through the document as a fraction, saved as the scroll
    /// position of bookmarks
    pub fn scroll_position(&self) -> f64 {
        let total = self.document.as_ref().map_or(0, Document::token_count);
        self.sequencer
            .cursor()
            .map_or(0.0, |cursor| progress(cursor, total))
    }

    /// Collect engine completions and submit due chunks
    pub fn pump(&mut self, now: Instant) {
        self.sequencer.poll(now);
    }

    /// Time until the sequencer next needs attention
    pub fn time_until_next(&self, now: Instant) -> Option<Duration> {
        self.sequencer.time_until_next(now)
    }

    /// One-line status for the terminal
    pub fn status(&self) -> String {
        let Some(doc) = &self.document else {
            return "No document open".to_string();
        };
        match self.sequencer.state() {
            PlaybackState::Idle => format!("{}: stopped", doc.title),
            PlaybackState::Speaking { cursor, .. } => format!(
                "{}: reading at token {} of {}",
                doc.title,
                cursor,
                doc.token_count()
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn state() -> State {
        State::with_parts(
            Config::in_memory(),
            None,
            Box::new(MemoryBookmarkStore::new()),
        )
    }

    #[test]
    fn test_without_document() {
        let mut state = state();
        state.read_aloud();
        state.read_from(3);
        assert_eq!(state.status(), "No document open");
        assert_eq!(state.bookmark_here(), None);
        assert_eq!(state.scroll_position(), 0.0);
    }

    #[test]
    fn test_adjust_rate_clamps() {
        let mut state = state();
        assert_eq!(state.adjust_rate(0.25), 1.25);
        assert_eq!(state.adjust_rate(10.0), MAX_RATE);
        assert_eq!(state.adjust_rate(-10.0), MIN_RATE);
    }

    #[test]
    fn test_status_with_document() {
        let mut state = state();
        state.set_document(Document::from_text("Emma", "one two three"));
        assert_eq!(state.status(), "Emma: stopped");
    }
}
