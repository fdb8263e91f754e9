#![deny(unsafe_code)]

/// Chat session wiring for presenters.
pub mod app;
/// Conversation log, turn state machine and the orchestrator.
pub mod chat;
/// Compose area inputs: draft text, attachments and dictation.
pub mod input;
/// Preview references and display encoding for attachments.
pub mod media;
pub mod render;
/// Settings persistence.
pub mod settings;
pub mod suggestions;

pub use app::{ChatSession, ClearPrompt, UnavailableBackend};
