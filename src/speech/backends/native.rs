//! Native TTS backend using the tts crate
//!
//! This backend uses the `tts` crate which provides a unified interface to:
//! - Speech Dispatcher on Linux (via native bindings)
//! - AVFoundation on macOS/iOS (via native bindings)
//! - WinRT on Windows
//!
//! Completion is detected through the crate's utterance-end callback where
//! the platform supports it, otherwise by polling `is_speaking`. End
//! notifications carry the utterance id, so a late notification for an
//! earlier utterance is never credited to the one in flight. Apple ids are
//! not comparable; there any notification counts.

use crate::speech::{SpeechEngine, Utterance, UtteranceTag};
use crate::{ReaderError, Result};
use log::{debug, error, warn};
use std::sync::mpsc::{self, Receiver};
use std::time::{Duration, Instant};
use tts::{Tts, UtteranceId};

/// How long after submission `is_speaking() == false` is not trusted
///
/// Some platforms report idle for a moment before speech actually starts.
const SPEAKING_GRACE: Duration = Duration::from_millis(150);

/// What the utterance-end callback reports
#[cfg(not(any(target_os = "macos", target_os = "ios")))]
type EndSignal = UtteranceId;
#[cfg(any(target_os = "macos", target_os = "ios"))]
type EndSignal = ();

#[cfg(not(any(target_os = "macos", target_os = "ios")))]
fn end_signal(id: UtteranceId) -> EndSignal {
    id
}

#[cfg(any(target_os = "macos", target_os = "ios"))]
fn end_signal(_id: UtteranceId) -> EndSignal {}

/// Signal expected for an utterance `speak` just accepted
#[cfg(not(any(target_os = "macos", target_os = "ios")))]
fn expected_signal(id: Option<UtteranceId>) -> Option<EndSignal> {
    id
}

#[cfg(any(target_os = "macos", target_os = "ios"))]
fn expected_signal(_id: Option<UtteranceId>) -> Option<EndSignal> {
    None
}

/// Whether the received end signals finish the utterance in flight
///
/// With a known id only a matching signal counts. Without one, any signal
/// does.
fn ends_current<T: PartialEq>(expected: Option<&T>, received: &[T]) -> bool {
    match expected {
        Some(id) => received.contains(id),
        None => !received.is_empty(),
    }
}

/// Utterance currently handed to the platform engine
struct Current {
    tag: UtteranceTag,
    /// End signal that belongs to this utterance, when the platform has ids
    id: Option<EndSignal>,
    submitted_at: Instant,
}

/// Native TTS backend using the tts crate
pub struct NativeEngine {
    tts: Tts,

    /// Utterance-end notifications, when the platform has callbacks
    ended: Option<Receiver<EndSignal>>,

    current: Option<Current>,

    /// Rate multiplier last applied to the platform engine
    applied_rate: Option<f32>,

    /// Voice index last applied to the platform engine
    applied_voice: Option<usize>,
}

impl NativeEngine {
    /// Create a new native TTS engine
    pub fn new() -> Result<Self> {
        debug!("Creating native TTS backend");

        let tts = Tts::default()
            .map_err(|e| ReaderError::Speech(format!("Failed to initialize TTS: {}", e)))?;

        let features = tts.supported_features();
        let ended = if features.utterance_callbacks {
            let (tx, rx) = mpsc::channel();
            tts.on_utterance_end(Some(Box::new(move |id: UtteranceId| {
                // Receiver gone means the engine was dropped
                let _ = tx.send(end_signal(id));
            })))
            .map_err(|e| {
                ReaderError::Speech(format!("Failed to register completion callback: {}", e))
            })?;
            Some(rx)
        } else if features.is_speaking {
            debug!("Utterance callbacks unsupported, polling is_speaking");
            None
        } else {
            return Err(ReaderError::Speech(
                "Platform TTS cannot report when speech finishes".to_string(),
            ));
        };

        debug!("Native TTS backend created successfully");

        Ok(Self {
            tts,
            ended,
            current: None,
            applied_rate: None,
            applied_voice: None,
        })
    }

    /// Map a rate multiplier onto the platform's rate range
    fn platform_rate(multiplier: f32, min: f32, normal: f32, max: f32) -> f32 {
        (normal * multiplier).clamp(min, max)
    }

    fn apply_rate(&mut self, rate: f32) -> Result<()> {
        if self.applied_rate == Some(rate) {
            return Ok(());
        }
        if !self.tts.supported_features().rate {
            warn!("Rate control not supported on this platform");
            self.applied_rate = Some(rate);
            return Ok(());
        }

        let converted = Self::platform_rate(
            rate,
            self.tts.min_rate(),
            self.tts.normal_rate(),
            self.tts.max_rate(),
        );
        debug!("Setting rate to {} (platform {})", rate, converted);
        self.tts
            .set_rate(converted)
            .map_err(|e| ReaderError::Speech(format!("Failed to set rate: {}", e)))?;
        self.applied_rate = Some(rate);
        Ok(())
    }

    fn apply_voice(&mut self, idx: usize) -> Result<()> {
        if self.applied_voice == Some(idx) {
            return Ok(());
        }

        let voices = self
            .tts
            .voices()
            .map_err(|e| ReaderError::Speech(format!("Failed to get voices: {}", e)))?;

        if let Some(voice) = voices.get(idx) {
            debug!("Selecting voice {}: {}", idx, voice.name());
            self.tts
                .set_voice(voice)
                .map_err(|e| ReaderError::Speech(format!("Failed to set voice: {}", e)))?;
        } else {
            warn!(
                "Voice index {} out of range (have {} voices)",
                idx,
                voices.len()
            );
        }
        self.applied_voice = Some(idx);
        Ok(())
    }

    fn drain_ended(&self) -> Vec<EndSignal> {
        match &self.ended {
            Some(rx) => rx.try_iter().collect(),
            None => Vec::new(),
        }
    }
}

impl SpeechEngine for NativeEngine {
    fn name(&self) -> &'static str {
        "native"
    }

    fn submit(&mut self, utterance: &Utterance) -> Result<()> {
        self.apply_rate(utterance.rate)?;
        if let Some(idx) = utterance.voice {
            self.apply_voice(idx)?;
        }

        // Notifications from before this submission must not count
        self.drain_ended();

        debug!("Speaking {} chars", utterance.text.len());
        let id = self.tts.speak(utterance.text.as_str(), false).map_err(|e| {
            error!("Failed to speak: {}", e);
            ReaderError::Speech(format!("Speak failed: {}", e))
        })?;

        self.current = Some(Current {
            tag: utterance.tag,
            id: expected_signal(id),
            submitted_at: Instant::now(),
        });
        Ok(())
    }

    fn cancel_all(&mut self) -> Result<()> {
        debug!("Canceling speech");
        self.current = None;
        let result = self.tts.stop().map(|_| ()).map_err(|e| {
            error!("Failed to cancel speech: {}", e);
            ReaderError::Speech(format!("Cancel failed: {}", e))
        });
        self.drain_ended();
        result
    }

    fn poll_finished(&mut self) -> Vec<UtteranceTag> {
        let Some(current) = &self.current else {
            self.drain_ended();
            return Vec::new();
        };

        let finished = if self.ended.is_some() {
            let received = self.drain_ended();
            ends_current(current.id.as_ref(), &received)
        } else if current.submitted_at.elapsed() < SPEAKING_GRACE {
            false
        } else {
            match self.tts.is_speaking() {
                Ok(speaking) => !speaking,
                Err(e) => {
                    warn!("is_speaking failed, treating utterance as done: {}", e);
                    true
                }
            }
        };

        if finished {
            self.current.take().map(|c| vec![c.tag]).unwrap_or_default()
        } else {
            Vec::new()
        }
    }

    fn set_volume(&mut self, volume: u8) -> Result<()> {
        debug!("Setting volume to {}", volume);

        if !self.tts.supported_features().volume {
            warn!("Volume control not supported on this platform");
            return Ok(());
        }

        let min = self.tts.min_volume();
        let max = self.tts.max_volume();
        let converted = min + (max - min) * (volume.min(100) as f32 / 100.0);
        self.tts
            .set_volume(converted)
            .map_err(|e| ReaderError::Speech(format!("Failed to set volume: {}", e)))?;

        Ok(())
    }
}
