//! Speech playback sequencer
//!
//! Speech engines stall or drop text when handed a whole chapter at once, so
//! narration is split into fixed-size windows of tokens. The sequencer
//! submits one window, waits for the engine to report it finished, saves a
//! bookmark, and after a short pause submits the next one.
//!
//! The sequencer never blocks. The owner's event loop calls [`Sequencer::pump`]
//! whenever the engine may have finished something or a pause may have
//! elapsed; [`Sequencer::time_until_next`] tells it how long it may sleep.
//!
//! Invariants:
//! - at most one utterance is live in the engine at any time;
//! - utterances of a session are submitted in increasing offset order;
//! - completions tagged with any other session, or any other offset than the
//!   one in flight, are ignored.
//!
//! Engine and bookmark store failures are logged and swallowed.

use crate::bookmark::{Bookmark, BookmarkStore};
use crate::speech::{SessionId, SpeechEngine, Utterance, UtteranceTag};
use crate::text::{chunk_count, chunk_range, join_tokens, tokenize};
use log::{debug, info, warn};
use std::ops::Range;
use std::time::{Duration, Instant};

/// Default number of tokens per utterance
pub const DEFAULT_CHUNK_SIZE: usize = 40;

/// Default pause between utterances
pub const DEFAULT_CHUNK_DELAY: Duration = Duration::from_millis(30);

/// Playback parameters
#[derive(Debug, Clone, PartialEq)]
pub struct SequencerOptions {
    /// Tokens per utterance, at least 1
    pub chunk_size: usize,
    /// Pause after a completion before the next submission
    pub chunk_delay: Duration,
    /// Rate multiplier for new utterances
    pub rate: f32,
    /// Voice index for new utterances
    pub voice: Option<usize>,
}

impl Default for SequencerOptions {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            chunk_delay: DEFAULT_CHUNK_DELAY,
            rate: 1.0,
            voice: None,
        }
    }
}

/// Maps the cursor after a completion and the stream length to the scroll
/// value saved with the bookmark
pub type ScrollFn = Box<dyn Fn(usize, usize) -> f64 + Send>;

/// Observable playback state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackState {
    Idle,
    Speaking { session: SessionId, cursor: usize },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    /// Utterance submitted, waiting for the engine
    InFlight { tag: UtteranceTag, len: usize },
    /// Next chunk goes out at this instant
    Pending(Instant),
}

struct Session {
    id: SessionId,
    tokens: Vec<String>,
    /// Next token to speak; moves only when an utterance completes
    cursor: usize,
    phase: Phase,
}

/// Drives chunked narration of one document through a speech engine
pub struct Sequencer {
    /// None when the platform has no speech support
    engine: Option<Box<dyn SpeechEngine>>,
    store: Box<dyn BookmarkStore>,
    options: SequencerOptions,
    next_session: SessionId,
    session: Option<Session>,
    /// Last scroll position reported by the front end
    scroll: f64,
    /// Overrides `scroll` for completion bookmarks
    scroll_fn: Option<ScrollFn>,
}

impl Sequencer {
    pub fn new(
        engine: Option<Box<dyn SpeechEngine>>,
        store: Box<dyn BookmarkStore>,
        options: SequencerOptions,
    ) -> Self {
        let mut options = options;
        options.chunk_size = options.chunk_size.max(1);

        match &engine {
            Some(e) => info!(
                "Sequencer ready: {} backend, {} tokens per chunk",
                e.name(),
                options.chunk_size
            ),
            None => warn!("No speech engine, read-aloud disabled"),
        }

        Self {
            engine,
            store,
            options,
            next_session: 1,
            session: None,
            scroll: 0.0,
            scroll_fn: None,
        }
    }

    /// Derive completion bookmark scroll values from the cursor instead of
    /// the last reported position
    pub fn with_scroll_fn(mut self, scroll_fn: ScrollFn) -> Self {
        self.scroll_fn = Some(scroll_fn);
        self
    }

    /// Whether read-aloud can do anything at all
    pub fn is_supported(&self) -> bool {
        self.engine.is_some()
    }

    pub fn options(&self) -> &SequencerOptions {
        &self.options
    }

    pub fn state(&self) -> PlaybackState {
        match &self.session {
            Some(s) => PlaybackState::Speaking {
                session: s.id,
                cursor: s.cursor,
            },
            None => PlaybackState::Idle,
        }
    }

    pub fn is_speaking(&self) -> bool {
        self.session.is_some()
    }

    /// Offset of the next token to speak, for highlighting
    pub fn cursor(&self) -> Option<usize> {
        self.session.as_ref().map(|s| s.cursor)
    }

    /// Token range of the utterance currently being spoken
    pub fn speaking_range(&self) -> Option<Range<usize>> {
        match self.session.as_ref()?.phase {
            Phase::InFlight { tag, len } => Some(tag.start..tag.start + len),
            Phase::Pending(_) => None,
        }
    }

    /// Change the rate; the utterance in flight keeps its own
    pub fn set_rate(&mut self, rate: f32) {
        debug!("Rate for next chunk: {}", rate);
        self.options.rate = rate;
    }

    /// Change the voice; the utterance in flight keeps its own
    pub fn set_voice(&mut self, voice: Option<usize>) {
        debug!("Voice for next chunk: {:?}", voice);
        self.options.voice = voice;
    }

    /// Start narrating `text` from token `offset`
    ///
    /// The token stream is derived from `text` here, since the document may
    /// have changed since `offset` was recorded. An offset past the end is
    /// clamped to the last token. Any running session is cancelled first.
    pub fn start_from(&mut self, text: &str, offset: usize) {
        if self.engine.is_none() {
            debug!("start_from ignored, no speech engine");
            return;
        }

        self.stop();

        let tokens = tokenize(text);
        if tokens.is_empty() {
            debug!("Nothing to read");
            return;
        }

        let start = offset.min(tokens.len() - 1);
        let id = self.next_session;
        self.next_session += 1;
        info!(
            "Session {} reading from token {} of {} ({} chunks)",
            id,
            start,
            tokens.len(),
            chunk_count(tokens.len() - start, self.options.chunk_size)
        );

        let now = Instant::now();
        self.session = Some(Session {
            id,
            tokens,
            cursor: start,
            phase: Phase::Pending(now),
        });
        self.submit_next(now);
    }

    /// Resume from the stored bookmark, or from the beginning
    pub fn resume(&mut self, text: &str) {
        let offset = self.load_bookmark().map_or(0, |b| b.token_offset);
        self.start_from(text, offset);
    }

    /// Cancel the utterance in flight and end the session
    ///
    /// No-op when idle. Completions for the cancelled utterance that arrive
    /// later are ignored.
    pub fn stop(&mut self) {
        let Some(session) = self.session.take() else {
            return;
        };
        info!("Session {} stopped at token {}", session.id, session.cursor);

        if let Some(engine) = self.engine.as_mut() {
            if let Err(e) = engine.cancel_all() {
                warn!("Cancel failed: {}", e);
            }
        }
    }

    /// Handle an engine completion
    ///
    /// Returns true if the completion belonged to the utterance in flight.
    pub fn on_finished(&mut self, tag: UtteranceTag, scroll: f64, now: Instant) -> bool {
        self.scroll = scroll;
        self.accept_completion(tag, now)
    }

    fn accept_completion(&mut self, tag: UtteranceTag, now: Instant) -> bool {
        let current = match &self.session {
            Some(Session {
                id,
                phase: Phase::InFlight { tag: live, len },
                ..
            }) if *id == tag.session && *live == tag => Some(*len),
            _ => None,
        };

        match current {
            Some(len) => {
                self.advance(len, now);
                true
            }
            None => {
                debug!("Ignoring stale completion {:?}", tag);
                false
            }
        }
    }

    /// Submit the next chunk if its pause has elapsed
    pub fn run_due(&mut self, now: Instant) {
        let due = matches!(
            &self.session,
            Some(Session { phase: Phase::Pending(at), .. }) if now >= *at
        );
        if due {
            self.submit_next(now);
        }
    }

    /// Collect engine completions, then submit anything that is due
    ///
    /// `scroll` is the front end's current scroll position, stored alongside
    /// bookmarks written by this call.
    pub fn pump(&mut self, now: Instant, scroll: f64) {
        self.scroll = scroll;
        self.poll(now);
    }

    /// Like [`Sequencer::pump`], keeping the last reported scroll position
    pub fn poll(&mut self, now: Instant) {
        let finished = match self.engine.as_mut() {
            Some(engine) => engine.poll_finished(),
            None => return,
        };
        for tag in finished {
            self.accept_completion(tag, now);
        }
        self.run_due(now);
    }

    /// Time until the next scheduled submission
    ///
    /// None while idle or while waiting on the engine.
    pub fn time_until_next(&self, now: Instant) -> Option<Duration> {
        match self.session.as_ref()?.phase {
            Phase::Pending(at) => Some(at.saturating_duration_since(now)),
            Phase::InFlight { .. } => None,
        }
    }

    /// Save an explicit bookmark
    pub fn save_bookmark(&mut self, token_offset: usize, scroll: f64) {
        self.persist(Bookmark::new(token_offset, scroll));
    }

    /// Stored bookmark, None if absent or unreadable
    pub fn load_bookmark(&self) -> Option<Bookmark> {
        match self.store.load() {
            Ok(bookmark) => bookmark,
            Err(e) => {
                warn!("Failed to load bookmark: {}", e);
                None
            }
        }
    }

    fn persist(&mut self, bookmark: Bookmark) {
        if let Err(e) = self.store.save(&bookmark) {
            warn!("Failed to save bookmark: {}", e);
        }
    }

    /// Move past a spoken chunk and schedule the next one
    fn advance(&mut self, len: usize, now: Instant) {
        let delay = self.options.chunk_delay;
        let Some(session) = self.session.as_mut() else {
            return;
        };

        session.cursor += len;
        let cursor = session.cursor;
        let total = session.tokens.len();
        let done = cursor >= total;
        if done {
            info!("Session {} finished", session.id);
            self.session = None;
        } else {
            session.phase = Phase::Pending(now + delay);
        }

        let scroll = match &self.scroll_fn {
            Some(scroll_fn) => scroll_fn(cursor.min(total), total),
            None => self.scroll,
        };
        self.persist(Bookmark::new(cursor, scroll));
    }

    fn submit_next(&mut self, now: Instant) {
        let Some(session) = self.session.as_mut() else {
            return;
        };
        let Some(engine) = self.engine.as_mut() else {
            return;
        };

        let range = chunk_range(session.tokens.len(), session.cursor, self.options.chunk_size);
        let len = range.len();
        let tag = UtteranceTag {
            session: session.id,
            start: session.cursor,
        };
        let utterance = Utterance {
            tag,
            text: join_tokens(&session.tokens[range]),
            voice: self.options.voice,
            rate: self.options.rate,
        };

        session.phase = Phase::InFlight { tag, len };
        debug!("Submitting tokens {}..{}", tag.start, tag.start + len);

        if let Err(e) = engine.submit(&utterance) {
            // Counted as spoken; a broken engine and a slow one look the same
            warn!("Speech submission failed, skipping chunk: {}", e);
            self.advance(len, now);
        }
    }
}
