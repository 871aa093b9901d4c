//! Companion Dialogue: the conversational core of a chat-companion widget.
//!
//! Classifies each utterance, walks scripted scenes one question at a time,
//! recovers from confusion and digressions, and renders a reply as separate
//! spoken text and nonverbal bubble channels. Lexicon and scene catalog are
//! declarative RON tables; all randomness comes from one seedable generator.

pub mod core;
pub mod schema;

pub use crate::core::engine::{DialogueEngine, DialogueEngineBuilder, EngineError};
pub use crate::schema::reply::{Mode, Mood, Reply, TurnContext};
