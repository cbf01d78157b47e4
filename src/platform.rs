//! Platform detection utilities

use std::fs;

/// Host environment, as far as speech backend selection cares
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Platform {
    /// Linux running under Windows Subsystem for Linux
    Wsl,
    /// Any other Linux
    Linux,
    /// macOS, Windows and everything else the tts crate covers
    Other,
}

impl Platform {
    /// Detect the platform we are running on
    pub fn current() -> Self {
        if std::env::consts::OS != "linux" {
            return Platform::Other;
        }
        if is_wsl() {
            Platform::Wsl
        } else {
            Platform::Linux
        }
    }
}

/// Detect if running in WSL (Windows Subsystem for Linux)
///
/// WSL kernels mention Microsoft in /proc/version; WSL_DISTRO_NAME covers
/// the rest.
pub fn is_wsl() -> bool {
    if let Ok(contents) = fs::read_to_string("/proc/version") {
        let lower = contents.to_lowercase();
        if lower.contains("microsoft") || lower.contains("wsl") {
            return true;
        }
    }

    std::env::var("WSL_DISTRO_NAME").is_ok()
}
