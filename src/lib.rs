//! Inbox Assist: email classification and reply drafting with a local model
//! and deterministic fallbacks.

pub mod config;
pub mod error;
pub mod llm;
pub mod pipeline;
