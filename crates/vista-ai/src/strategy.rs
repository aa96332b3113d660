//! Capability traits for the two model roles.

use async_trait::async_trait;

/// Result of one model call.
///
/// Backends never return `Err` to the caller. A failed call still produces a
/// human-readable `message` that can be shown in place of model output, and
/// the variant lets callers tell the two apart without inspecting wording.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Generated(String),
    Failed { reason: String, message: String },
}

impl Outcome {
    pub fn failed(reason: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Failed {
            reason: reason.into(),
            message: message.into(),
        }
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, Self::Failed { .. })
    }

    /// Text to surface: the generated output, or the fallback message.
    pub fn text(&self) -> &str {
        match self {
            Self::Generated(text) => text,
            Self::Failed { message, .. } => message,
        }
    }

    pub fn into_text(self) -> String {
        match self {
            Self::Generated(text) => text,
            Self::Failed { message, .. } => message,
        }
    }
}

/// Turns raw image bytes into a natural-language description.
#[async_trait]
pub trait VisionStrategy: Send + Sync {
    /// Model identifier recorded in the conversation log.
    fn model_name(&self) -> &str;

    async fn describe_image(&self, image: &[u8]) -> Outcome;
}

/// Answers a text query, optionally grounded in background context.
#[async_trait]
pub trait LanguageStrategy: Send + Sync {
    /// Model identifier recorded in the conversation log.
    fn model_name(&self) -> &str;

    async fn respond(&self, query: &str, context: Option<&str>) -> Outcome;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn failed_outcome_surfaces_message() {
        let outcome = Outcome::failed("HTTP 503", "I apologize, but I encountered an error: HTTP 503");
        assert!(outcome.is_failed());
        assert!(outcome.text().starts_with("I apologize"));
    }

    #[test]
    fn generated_outcome_is_passthrough() {
        let outcome = Outcome::Generated("a red ball".into());
        assert!(!outcome.is_failed());
        assert_eq!(outcome.into_text(), "a red ball");
    }
}
