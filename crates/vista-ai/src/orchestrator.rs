use std::sync::Arc;

use tracing::debug;

use crate::strategy::{LanguageStrategy, Outcome, VisionStrategy};

/// Outcome of one chat interaction. Lives only for the request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InteractionResult {
    pub response: String,
    /// Image description, when an image was supplied.
    pub context: Option<String>,
    /// Models actually invoked.
    pub vlm_model: Option<String>,
    pub llm_model: Option<String>,
    /// Some stage returned a fallback message instead of model output.
    pub degraded: bool,
}

/// Composes image description and text generation.
#[derive(Clone)]
pub struct Orchestrator {
    vision: Arc<dyn VisionStrategy>,
    language: Arc<dyn LanguageStrategy>,
}

impl Orchestrator {
    pub fn new(vision: Arc<dyn VisionStrategy>, language: Arc<dyn LanguageStrategy>) -> Self {
        Self { vision, language }
    }

    pub fn vision_model(&self) -> &str {
        self.vision.model_name()
    }

    pub fn language_model(&self) -> &str {
        self.language.model_name()
    }

    /// Describe the image (if any), then answer the query with the
    /// description as context.
    ///
    /// With an image and no query the description is returned directly and
    /// the language model is not called. Callers must supply at least one
    /// of the two inputs.
    pub async fn process_interaction(
        &self,
        text_query: Option<&str>,
        image: Option<&[u8]>,
    ) -> InteractionResult {
        let mut degraded = false;
        let mut vlm_model = None;

        let description = match image {
            Some(bytes) => {
                vlm_model = Some(self.vision.model_name().to_string());
                let outcome = self.vision.describe_image(bytes).await;
                degraded |= outcome.is_failed();
                Some(outcome).filter(|o| !o.text().is_empty())
            }
            None => None,
        };

        let query = text_query.filter(|q| !q.is_empty());

        if let (None, Some(description)) = (query, &description) {
            debug!("Image without query, skipping language model");
            let response = match description {
                Outcome::Generated(text) => format!("I see: {text}"),
                Outcome::Failed { message, .. } => message.clone(),
            };
            return InteractionResult {
                response,
                context: Some(description.text().to_string()),
                vlm_model,
                llm_model: None,
                degraded,
            };
        }

        let context = description.map(Outcome::into_text);
        let answer = self
            .language
            .respond(query.unwrap_or_default(), context.as_deref())
            .await;
        degraded |= answer.is_failed();

        InteractionResult {
            response: answer.into_text(),
            context,
            vlm_model,
            llm_model: Some(self.language.model_name().to_string()),
            degraded,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::Mutex;

    const IMAGE: &[u8] = b"\x89PNG";

    /// Vision fake returning a fixed outcome and counting calls.
    struct FakeVision {
        outcome: Outcome,
        calls: Mutex<usize>,
    }

    impl FakeVision {
        fn describing(text: &str) -> Arc<Self> {
            Arc::new(Self {
                outcome: Outcome::Generated(text.to_string()),
                calls: Mutex::new(0),
            })
        }

        fn failing() -> Arc<Self> {
            Arc::new(Self {
                outcome: Outcome::failed("timeout", "Error processing image with Gemini: timeout"),
                calls: Mutex::new(0),
            })
        }
    }

    #[async_trait]
    impl VisionStrategy for FakeVision {
        fn model_name(&self) -> &str {
            "fake-vlm"
        }

        async fn describe_image(&self, _image: &[u8]) -> Outcome {
            *self.calls.lock().unwrap() += 1;
            self.outcome.clone()
        }
    }

    /// Language fake recording every (query, context) pair it receives.
    struct FakeLanguage {
        outcome: Outcome,
        calls: Mutex<Vec<(String, Option<String>)>>,
    }

    impl FakeLanguage {
        fn answering(text: &str) -> Arc<Self> {
            Arc::new(Self {
                outcome: Outcome::Generated(text.to_string()),
                calls: Mutex::new(Vec::new()),
            })
        }

        fn failing() -> Arc<Self> {
            Arc::new(Self {
                outcome: Outcome::failed("boom", "I apologize, but I encountered an error: boom"),
                calls: Mutex::new(Vec::new()),
            })
        }

        fn calls(&self) -> Vec<(String, Option<String>)> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl LanguageStrategy for FakeLanguage {
        fn model_name(&self) -> &str {
            "fake-llm"
        }

        async fn respond(&self, query: &str, context: Option<&str>) -> Outcome {
            self.calls
                .lock()
                .unwrap()
                .push((query.to_string(), context.map(str::to_string)));
            self.outcome.clone()
        }
    }

    fn orchestrator(vision: &Arc<FakeVision>, language: &Arc<FakeLanguage>) -> Orchestrator {
        Orchestrator::new(vision.clone(), language.clone())
    }

    #[tokio::test]
    async fn image_only_short_circuits() {
        let vision = FakeVision::describing("a red ball");
        let language = FakeLanguage::answering("unused");

        let result = orchestrator(&vision, &language)
            .process_interaction(None, Some(IMAGE))
            .await;

        assert_eq!(result.response, "I see: a red ball");
        assert_eq!(result.context.as_deref(), Some("a red ball"));
        assert_eq!(result.vlm_model.as_deref(), Some("fake-vlm"));
        assert_eq!(result.llm_model, None);
        assert!(!result.degraded);
        assert!(language.calls().is_empty());
    }

    #[tokio::test]
    async fn empty_query_counts_as_absent() {
        let vision = FakeVision::describing("a red ball");
        let language = FakeLanguage::answering("unused");

        let result = orchestrator(&vision, &language)
            .process_interaction(Some(""), Some(IMAGE))
            .await;

        assert_eq!(result.response, "I see: a red ball");
        assert!(language.calls().is_empty());
    }

    #[tokio::test]
    async fn image_and_query_pass_description_as_context() {
        let vision = FakeVision::describing("a red ball");
        let language = FakeLanguage::answering("It is a red ball.");

        let result = orchestrator(&vision, &language)
            .process_interaction(Some("What is it?"), Some(IMAGE))
            .await;

        assert_eq!(result.response, "It is a red ball.");
        assert_eq!(result.context.as_deref(), Some("a red ball"));
        assert_eq!(
            language.calls(),
            vec![("What is it?".to_string(), Some("a red ball".to_string()))]
        );
        assert_eq!(*vision.calls.lock().unwrap(), 1);
        assert_eq!(result.llm_model.as_deref(), Some("fake-llm"));
    }

    #[tokio::test]
    async fn text_only_skips_vision() {
        let vision = FakeVision::describing("unused");
        let language = FakeLanguage::answering("Hi there");

        let result = orchestrator(&vision, &language)
            .process_interaction(Some("Hello"), None)
            .await;

        assert_eq!(result.response, "Hi there");
        assert_eq!(result.context, None);
        assert_eq!(result.vlm_model, None);
        assert_eq!(language.calls(), vec![("Hello".to_string(), None)]);
        assert_eq!(*vision.calls.lock().unwrap(), 0);
    }

    #[tokio::test]
    async fn failed_description_is_not_presented_as_seen() {
        let vision = FakeVision::failing();
        let language = FakeLanguage::answering("unused");

        let result = orchestrator(&vision, &language)
            .process_interaction(None, Some(IMAGE))
            .await;

        assert!(result.degraded);
        assert!(result.response.starts_with("Error processing image"));
        assert!(!result.response.starts_with("I see:"));
        assert!(language.calls().is_empty());
    }

    #[tokio::test]
    async fn failed_answer_is_degraded_but_returned() {
        let vision = FakeVision::describing("a red ball");
        let language = FakeLanguage::failing();

        let result = orchestrator(&vision, &language)
            .process_interaction(Some("What is it?"), Some(IMAGE))
            .await;

        assert!(result.degraded);
        assert!(result.response.contains("I apologize"));
        assert_eq!(result.context.as_deref(), Some("a red ball"));
    }
}
