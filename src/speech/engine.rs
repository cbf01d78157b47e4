//! Speech engine abstraction
//!
//! The reader narrates documents through an engine that speaks one bounded
//! utterance at a time and reports when it has finished. Each utterance is
//! tagged with the playback session that submitted it, and the engine hands
//! that tag back on completion so stale completions can be told apart from
//! current ones.

use crate::platform::Platform;
use crate::{ReaderError, Result};
use log::info;
use std::fmt;
use std::str::FromStr;

/// Identifies one contiguous playback run
pub type SessionId = u64;

/// Tag carried by every submitted utterance
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct UtteranceTag {
    /// Session active when the utterance was submitted
    pub session: SessionId,
    /// Token offset of the first token in the utterance
    pub start: usize,
}

/// One request to the speech engine
#[derive(Debug, Clone, PartialEq)]
pub struct Utterance {
    pub tag: UtteranceTag,
    /// Window of tokens joined by single spaces
    pub text: String,
    /// Voice index (backend-specific), None keeps the engine default
    pub voice: Option<usize>,
    /// Rate multiplier, 1.0 is the engine's normal speed
    pub rate: f32,
}

/// Speech engine trait
///
/// Implementations speak at most one utterance at a time. `poll_finished`
/// reports each submitted utterance at most once, and after `cancel_all`
/// nothing submitted earlier is ever reported.
pub trait SpeechEngine: Send {
    /// Short backend name for logging
    fn name(&self) -> &'static str;

    /// Start speaking an utterance
    fn submit(&mut self, utterance: &Utterance) -> Result<()>;

    /// Silence the current utterance and forget anything pending
    fn cancel_all(&mut self) -> Result<()>;

    /// Tags of utterances that finished since the last poll
    fn poll_finished(&mut self) -> Vec<UtteranceTag>;

    /// Set speech volume (0-100)
    fn set_volume(&mut self, volume: u8) -> Result<()>;
}

/// Which backend to construct
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Backend {
    /// Pick the best backend for the platform
    #[default]
    Auto,
    /// tts crate (Speech Dispatcher, AVFoundation, WinRT)
    Native,
    /// espeak-ng subprocess
    Espeak,
}

impl FromStr for Backend {
    type Err = ReaderError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "auto" | "" => Ok(Backend::Auto),
            "native" | "tts" => Ok(Backend::Native),
            "espeak" | "espeak-ng" => Ok(Backend::Espeak),
            other => Err(ReaderError::Config(format!(
                "Unknown speech backend '{}' (expected auto, native or espeak)",
                other
            ))),
        }
    }
}

impl fmt::Display for Backend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Backend::Auto => "auto",
            Backend::Native => "native",
            Backend::Espeak => "espeak",
        };
        f.write_str(name)
    }
}

fn try_native() -> Result<Box<dyn SpeechEngine>> {
    use super::backends::native::NativeEngine;
    Ok(Box::new(NativeEngine::new()?))
}

fn try_espeak() -> Result<Box<dyn SpeechEngine>> {
    use super::backends::espeak::EspeakEngine;
    Ok(Box::new(EspeakEngine::new()?))
}

/// Create a speech engine
///
/// With `Backend::Auto` the order depends on the platform:
///
/// **WSL:** espeak-ng over the WSLg PulseAudio server first, since Speech
/// Dispatcher is rarely configured there, then the tts crate.
///
/// **Everything else:** the tts crate first (respects system voice
/// preferences), then espeak-ng.
pub fn create_engine(backend: Backend) -> Result<Box<dyn SpeechEngine>> {
    let order: &[Backend] = match backend {
        Backend::Native => &[Backend::Native],
        Backend::Espeak => &[Backend::Espeak],
        Backend::Auto => match Platform::current() {
            Platform::Wsl => {
                info!("Detected WSL environment");
                &[Backend::Espeak, Backend::Native]
            }
            Platform::Linux | Platform::Other => &[Backend::Native, Backend::Espeak],
        },
    };

    let mut failures = Vec::new();
    for candidate in order {
        info!("Trying {} speech backend...", candidate);
        let result = match candidate {
            Backend::Espeak => try_espeak(),
            _ => try_native(),
        };
        match result {
            Ok(engine) => {
                info!("✓ Successfully initialized {} backend", engine.name());
                return Ok(engine);
            }
            Err(e) => {
                info!("✗ {} backend unavailable: {}", candidate, e);
                failures.push(format!("{}: {}", candidate, e));
            }
        }
    }

    Err(ReaderError::Speech(format!(
        "No speech backend available on {}. Tried:\n{}",
        std::env::consts::OS,
        failures.join("\n")
    )))
}
