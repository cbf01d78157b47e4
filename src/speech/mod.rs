//! Speech engine abstraction and backends

pub mod backends;
pub mod engine;

pub use engine::{create_engine, Backend, SessionId, SpeechEngine, Utterance, UtteranceTag};
