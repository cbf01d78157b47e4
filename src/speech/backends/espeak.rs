//! espeak-ng subprocess backend
//!
//! Each utterance runs as its own `espeak-ng` child process; the utterance
//! is finished when the child exits. On WSL the child talks to the WSLg
//! PulseAudio server, which is auto-detected.
//!
//! Dependencies:
//! - espeak-ng (install with: sudo apt install espeak-ng)
//! - PulseAudio client libraries (usually pre-installed with WSLG)

use crate::platform::is_wsl;
use crate::speech::{SpeechEngine, Utterance, UtteranceTag};
use crate::{ReaderError, Result};
use log::{debug, error, info, warn};
use std::process::{Child, Command, Stdio};

/// espeak-ng speed at rate multiplier 1.0, in words per minute
const NORMAL_WPM: f32 = 175.0;
const MIN_WPM: f32 = 80.0;
const MAX_WPM: f32 = 450.0;

/// Voices selectable by index
const VOICES: &[&str] = &[
    "en",    // 0: Default English
    "en-us", // 1: US English
    "en-gb", // 2: British English
    "en-sc", // 3: Scottish English
    "es",    // 4: Spanish
    "fr",    // 5: French
    "de",    // 6: German
    "it",    // 7: Italian
    "pt",    // 8: Portuguese
    "ru",    // 9: Russian
];

/// espeak-ng backend
pub struct EspeakEngine {
    /// Child process speaking the current utterance
    current: Option<(UtteranceTag, Child)>,

    /// espeak amplitude (0-200)
    amplitude: u8,

    espeak_path: String,
}

impl EspeakEngine {
    /// Point PULSE_SERVER at the WSLg socket when running under WSL
    fn setup_pulseaudio() -> Result<()> {
        const WSLG_PULSE_PATH: &str = "/mnt/wslg/PulseServer";

        if std::env::var("PULSE_SERVER").is_ok() {
            debug!("PULSE_SERVER already set via environment");
            return Ok(());
        }

        if std::path::Path::new(WSLG_PULSE_PATH).exists() {
            info!("Auto-detected WSLG PulseAudio server at {}", WSLG_PULSE_PATH);
            std::env::set_var("PULSE_SERVER", WSLG_PULSE_PATH);
            return Ok(());
        }

        if is_wsl() {
            warn!("WSLG PulseAudio server not found at {}", WSLG_PULSE_PATH);
            return Err(ReaderError::Speech(
                "PulseAudio server not found. Install WSLg or set PULSE_SERVER environment variable.".to_string()
            ));
        }

        // Native Linux uses the default socket; espeak-ng reports failure itself
        Ok(())
    }

    /// Create a new espeak-ng engine
    pub fn new() -> Result<Self> {
        debug!("Creating espeak-ng backend");

        Self::setup_pulseaudio()?;

        let espeak_path = Self::find_espeak()?;
        debug!("Found espeak-ng at: {}", espeak_path);

        Ok(Self {
            current: None,
            amplitude: Self::volume_to_amplitude(80),
            espeak_path,
        })
    }

    fn find_espeak() -> Result<String> {
        for path in ["espeak-ng", "/usr/bin/espeak-ng"] {
            if let Ok(status) = Command::new(path)
                .arg("--version")
                .stdout(Stdio::null())
                .stderr(Stdio::null())
                .status()
            {
                if status.success() {
                    return Ok(path.to_string());
                }
            }
        }

        Err(ReaderError::Speech(
            "espeak-ng not found. Install with: sudo apt install espeak-ng".to_string(),
        ))
    }

    /// Convert a rate multiplier to espeak speed (80-450 wpm)
    fn rate_to_wpm(rate: f32) -> u16 {
        (NORMAL_WPM * rate).clamp(MIN_WPM, MAX_WPM).round() as u16
    }

    /// Convert volume (0-100) to espeak amplitude (0-200)
    fn volume_to_amplitude(volume: u8) -> u8 {
        ((volume.min(100) as u16 * 200) / 100) as u8
    }

    fn voice_name(idx: Option<usize>) -> &'static str {
        idx.and_then(|i| VOICES.get(i)).copied().unwrap_or("en")
    }

    fn kill_current(&mut self) {
        if let Some((tag, mut child)) = self.current.take() {
            debug!("Killing espeak-ng process for offset {}", tag.start);
            match child.kill() {
                Ok(_) => {
                    let _ = child.wait();
                }
                Err(e) => debug!("Failed to kill espeak-ng process: {}", e),
            }
        }
    }
}

impl SpeechEngine for EspeakEngine {
    fn name(&self) -> &'static str {
        "espeak"
    }

    fn submit(&mut self, utterance: &Utterance) -> Result<()> {
        self.kill_current();

        let mut cmd = Command::new(&self.espeak_path);
        cmd.arg("-v").arg(Self::voice_name(utterance.voice));
        cmd.arg("-s").arg(Self::rate_to_wpm(utterance.rate).to_string());
        cmd.arg("-a").arg(self.amplitude.to_string());
        // "--" keeps tokens starting with a dash from being read as flags
        cmd.arg("--").arg(&utterance.text);
        cmd.stdout(Stdio::null());
        cmd.stderr(Stdio::null());

        match cmd.spawn() {
            Ok(child) => {
                debug!("espeak-ng started for offset {}", utterance.tag.start);
                self.current = Some((utterance.tag, child));
                Ok(())
            }
            Err(e) => {
                error!("Failed to spawn espeak-ng: {}", e);
                Err(ReaderError::Speech(format!("Failed to start espeak-ng: {}", e)))
            }
        }
    }

    fn cancel_all(&mut self) -> Result<()> {
        debug!("Canceling speech");
        self.kill_current();
        Ok(())
    }

    fn poll_finished(&mut self) -> Vec<UtteranceTag> {
        let exited = match self.current.as_mut() {
            None => return Vec::new(),
            Some((_, child)) => match child.try_wait() {
                Ok(Some(status)) => {
                    if !status.success() {
                        warn!("espeak-ng exited with {}", status);
                    }
                    true
                }
                Ok(None) => false,
                Err(e) => {
                    warn!("Failed to poll espeak-ng: {}", e);
                    true
                }
            },
        };

        if exited {
            self.current.take().map(|(tag, _)| vec![tag]).unwrap_or_default()
        } else {
            Vec::new()
        }
    }

    fn set_volume(&mut self, volume: u8) -> Result<()> {
        debug!("Setting volume to {}", volume);
        self.amplitude = Self::volume_to_amplitude(volume);
        Ok(())
    }
}

impl Drop for EspeakEngine {
    fn drop(&mut self) {
        debug!("Shutting down espeak-ng backend");
        self.kill_current();
    }
}
