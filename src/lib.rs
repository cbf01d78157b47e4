//! dfreader - dyslexia-friendly document reader
//!
//! Loads plain-text or EPUB documents, reads them aloud in bounded chunks
//! through a speech engine, and remembers where the reader left off.

pub mod bookmark;
pub mod document;
pub mod error;
pub mod input;
pub mod library;
pub mod platform;
pub mod sequencer;
pub mod speech;
pub mod state;
pub mod text;

pub use error::{ReaderError, Result};

/// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
pub const APP_NAME: &str = "dfreader";
