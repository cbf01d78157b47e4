//! Shared helpers for integration tests

#![allow(dead_code)]

use dfreader::speech::{SpeechEngine, Utterance, UtteranceTag};
use dfreader::{ReaderError, Result};
use std::sync::{Arc, Mutex, MutexGuard};

/// What the scripted engine has seen
#[derive(Debug, Default)]
pub struct EngineLog {
    /// Every accepted submission, in order
    pub submitted: Vec<Utterance>,
    /// Utterance currently speaking
    pub live: Option<UtteranceTag>,
    /// Highest number of simultaneously live utterances observed
    pub max_live: usize,
    /// Completions waiting to be polled
    pub finished: Vec<UtteranceTag>,
    pub cancels: usize,
    /// Reject submissions with an error
    pub refuse: bool,
    /// Last accepted volume
    pub volume: Option<u8>,
    /// Reject volume changes with an error
    pub refuse_volume: bool,
}

/// Engine driven by the test: utterances finish only when told to
///
/// Clones share one log, so the test keeps a handle while the sequencer owns
/// the other.
#[derive(Clone, Default)]
pub struct ScriptedEngine {
    log: Arc<Mutex<EngineLog>>,
}

impl ScriptedEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn log(&self) -> MutexGuard<'_, EngineLog> {
        self.log.lock().unwrap()
    }

    /// Texts of all submissions so far
    pub fn texts(&self) -> Vec<String> {
        self.log().submitted.iter().map(|u| u.text.clone()).collect()
    }

    /// Finish the live utterance, if any
    pub fn finish(&self) -> Option<UtteranceTag> {
        let mut log = self.log();
        let tag = log.live.take()?;
        log.finished.push(tag);
        Some(tag)
    }

    /// Deliver a completion the engine should never have sent
    pub fn inject_completion(&self, tag: UtteranceTag) {
        self.log().finished.push(tag);
    }

    pub fn refuse_submissions(&self, refuse: bool) {
        self.log().refuse = refuse;
    }

    pub fn refuse_volume(&self, refuse: bool) {
        self.log().refuse_volume = refuse;
    }
}

impl SpeechEngine for ScriptedEngine {
    fn name(&self) -> &'static str {
        "scripted"
    }

    fn submit(&mut self, utterance: &Utterance) -> Result<()> {
        let mut log = self.log();
        if log.refuse {
            return Err(ReaderError::Speech("engine refused".to_string()));
        }
        let live = if log.live.is_some() { 2 } else { 1 };
        log.max_live = log.max_live.max(live);
        log.live = Some(utterance.tag);
        log.submitted.push(utterance.clone());
        Ok(())
    }

    fn cancel_all(&mut self) -> Result<()> {
        let mut log = self.log();
        log.live = None;
        log.finished.clear();
        log.cancels += 1;
        Ok(())
    }

    fn poll_finished(&mut self) -> Vec<UtteranceTag> {
        std::mem::take(&mut self.log().finished)
    }

    fn set_volume(&mut self, volume: u8) -> Result<()> {
        let mut log = self.log();
        if log.refuse_volume {
            return Err(ReaderError::Speech("volume control unavailable".to_string()));
        }
        log.volume = Some(volume);
        Ok(())
    }
}
