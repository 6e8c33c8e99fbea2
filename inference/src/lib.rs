//! Model seams used by the analysis and indexing stages.
//!
//! The traits are implemented by the hosted [`HuggingFaceClient`] here and by
//! the local candle embedder in `embedding-engine`. Tests substitute fakes.

pub mod huggingface;

pub use huggingface::{HuggingFaceClient, LabelScore};

use persona_core::{ClassifierError, CoreError, EmotionScores, TraitScores};

/// Pretrained personality model: text in, one score per trait out.
pub trait TraitClassifier {
    async fn classify_traits(&self, text: &str) -> Result<TraitScores, CoreError>;
}

/// Emotion model returning a score for every label it knows.
pub trait EmotionClassifier {
    async fn classify_emotions(&self, text: &str) -> Result<EmotionScores, CoreError>;
}

pub trait Embedder {
    /// Vector length, when known before the first call.
    fn dimension(&self) -> Option<usize>;

    async fn embed(&self, text: &str) -> Result<Vec<f32>, CoreError>;
}

/// Stands in for both classifiers when the hosted models could not be set
/// up. Every call fails with the setup problem.
#[derive(Debug, Clone)]
pub struct UnavailableModels {
    reason: String,
}

impl UnavailableModels {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }

    fn error(&self) -> CoreError {
        ClassifierError::Unavailable {
            reason: self.reason.clone(),
        }
        .into()
    }
}

impl TraitClassifier for UnavailableModels {
    async fn classify_traits(&self, _text: &str) -> Result<TraitScores, CoreError> {
        Err(self.error())
    }
}

impl EmotionClassifier for UnavailableModels {
    async fn classify_emotions(&self, _text: &str) -> Result<EmotionScores, CoreError> {
        Err(self.error())
    }
}

/// Cut `text` to at most `max_chars` characters without splitting one.
pub fn truncate_chars(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate_respects_char_boundaries() {
        assert_eq!(truncate_chars("héllo wörld", 4), "héll");
        assert_eq!(truncate_chars("short", 100), "short");
        assert_eq!(truncate_chars("", 3), "");
        assert_eq!(truncate_chars("abc", 0), "");
    }

    #[tokio::test]
    async fn test_unavailable_models_always_fail() {
        let models = UnavailableModels::new("inference.api_token is missing");
        let err = models.classify_emotions("hello").await.unwrap_err();
        assert!(matches!(
            err,
            CoreError::Classifier(ClassifierError::Unavailable { ref reason })
                if reason == "inference.api_token is missing"
        ));
        assert!(models.classify_traits("hello").await.is_err());
    }
}
