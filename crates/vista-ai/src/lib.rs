//! Image description and text generation behind swappable strategies.
//!
//! The orchestrator only sees the [`VisionStrategy`] and [`LanguageStrategy`]
//! traits; [`gemini`] provides the production backends.

pub mod gemini;
pub mod orchestrator;
pub mod prompt;
pub mod strategy;

pub use orchestrator::{InteractionResult, Orchestrator};
pub use strategy::{LanguageStrategy, Outcome, VisionStrategy};
