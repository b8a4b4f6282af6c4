//! Trivia engine integration.
//!
//! This module contains:
//! - Question formatting for Slack
//! - The engine and engine-event interfaces
//! - The child-process engine link

pub mod engine;
pub mod formatter;
pub mod process;

// Re-export commonly used types
pub use engine::{EngineEvents, TriviaEngine};
pub use process::ProcessEngine;
