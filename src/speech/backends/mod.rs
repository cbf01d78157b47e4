//! Platform-specific speech backends

// Native TTS backend using the tts crate (cross-platform)
pub mod native;

// espeak-ng subprocess backend (Linux, WSL with WSLg)
pub mod espeak;
