//! DocChat context engine
//!
//! Turns retrieved chunks into answers:
//! - Prompt assembly over the reranked context
//! - Language model synthesis
//! - The chat session and its transcript

pub mod prompt;
pub mod session;
pub mod synthesizer;

pub use session::{ChatSession, Role, SessionState, Transcript, Turn};
pub use synthesizer::Synthesizer;
