//! Prompt text sent to the generative models.

pub const DESCRIBE_IMAGE_PROMPT: &str = "Describe this image in detail. What do you see?";

/// Wrap a question with an image description so the model treats the
/// description as background rather than as the question.
///
/// Without context the query is sent as-is.
pub fn with_context(query: &str, context: Option<&str>) -> String {
    match context {
        Some(context) => envelope(
            "You are a helpful multimodal assistant. I will provide a description of an image I am looking at, and then ask a question.",
            context,
            query,
            "Please provide a helpful and accurate response.",
        ),
        None => query.to_string(),
    }
}

/// Shorter envelope used by the unified multimodal backend.
pub fn with_context_brief(query: &str, context: Option<&str>) -> String {
    match context {
        Some(context) => envelope(
            "You are a helpful multimodal assistant.",
            context,
            query,
            "Please provide a helpful response.",
        ),
        None => query.to_string(),
    }
}

fn envelope(preamble: &str, context: &str, query: &str, closing: &str) -> String {
    format!("{preamble}\n\nImage Description: {context}\n\nUser Question: {query}\n\n{closing}")
}
