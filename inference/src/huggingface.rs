use crate::{truncate_chars, Embedder, EmotionClassifier, TraitClassifier};
use indexmap::IndexMap;
use persona_core::{
    ClassifierError, CoreError, EmbeddingError, EmotionScores, InferenceSettings, TraitScores,
};
use reqwest::header::HeaderMap;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, warn};

const PROVIDER: &str = "huggingface";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LabelScore {
    pub label: String,
    pub score: f64,
}

/// Text-classification output comes back nested for single inputs on some
/// models and flat on others.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ClassificationResponse {
    Nested(Vec<Vec<LabelScore>>),
    Flat(Vec<LabelScore>),
}

/// Feature extraction returns a pooled vector for sentence-transformers
/// models and per-token vectors for plain encoders.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum FeatureResponse {
    Pooled(Vec<f32>),
    Tokens(Vec<Vec<f32>>),
    Batched(Vec<Vec<Vec<f32>>>),
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    estimated_time: Option<f64>,
}

#[derive(Serialize)]
struct InferenceRequest<'a> {
    inputs: &'a str,
    options: InferenceOptions,
}

#[derive(Serialize)]
struct InferenceOptions {
    wait_for_model: bool,
}

/// Client for the hosted inference API. One instance serves the personality,
/// emotion and embedding models named in [`InferenceSettings`].
#[derive(Debug, Clone)]
pub struct HuggingFaceClient {
    client: Client,
    endpoint: String,
    api_token: String,
    settings: InferenceSettings,
}

impl HuggingFaceClient {
    pub fn new(settings: InferenceSettings, api_token: String) -> Result<Self, CoreError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(settings.timeout_secs.max(1)))
            .build()?;

        Ok(Self {
            client,
            endpoint: settings.endpoint.trim_end_matches('/').to_string(),
            api_token,
            settings,
        })
    }

    /// Build from settings; the API token is required.
    pub fn from_settings(settings: &InferenceSettings) -> Result<Self, CoreError> {
        let token = settings.token()?;
        Self::new(settings.clone(), token)
    }

    async fn post(&self, url: &str, model: &str, text: &str) -> Result<reqwest::Response, CoreError> {
        let inputs = truncate_chars(text, self.settings.max_input_chars);
        debug!("Inference request to {} ({} chars)", model, inputs.chars().count());

        let response = self
            .client
            .post(url)
            .bearer_auth(&self.api_token)
            .json(&InferenceRequest {
                inputs,
                options: InferenceOptions {
                    wait_for_model: true,
                },
            })
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    CoreError::Classifier(ClassifierError::RequestTimeout {
                        provider: PROVIDER.to_string(),
                    })
                } else {
                    CoreError::Network(e)
                }
            })?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let headers = response.headers().clone();
        let body = response.text().await.unwrap_or_default();
        warn!("Inference call to {} failed with {}: {}", model, status, body);
        Err(CoreError::Classifier(status_to_error(status, &headers, &body, model)))
    }

    /// Raw label scores from a text-classification model.
    pub async fn classify(&self, model: &str, text: &str) -> Result<Vec<LabelScore>, CoreError> {
        let url = format!("{}/models/{}", self.endpoint, model);
        let response = self.post(&url, model, text).await?;

        let parsed: ClassificationResponse = response.json().await.map_err(|e| {
            CoreError::Classifier(ClassifierError::InvalidResponseFormat {
                model: model.to_string(),
                details: e.to_string(),
            })
        })?;

        let scores = match parsed {
            ClassificationResponse::Nested(mut outer) => {
                if outer.is_empty() {
                    Vec::new()
                } else {
                    outer.swap_remove(0)
                }
            }
            ClassificationResponse::Flat(scores) => scores,
        };

        if scores.is_empty() {
            return Err(CoreError::Classifier(ClassifierError::InvalidResponseFormat {
                model: model.to_string(),
                details: "no label scores returned".to_string(),
            }));
        }
        Ok(scores)
    }

    /// Sentence embedding from a feature-extraction model, mean pooled when
    /// the model returns token vectors.
    pub async fn feature_extraction(&self, model: &str, text: &str) -> Result<Vec<f32>, CoreError> {
        let url = format!("{}/pipeline/feature-extraction/{}", self.endpoint, model);
        let response = self.post(&url, model, text).await?;

        let parsed: FeatureResponse = response.json().await.map_err(|e| {
            CoreError::Embedding(EmbeddingError::InferenceFailed {
                reason: format!("unexpected feature-extraction output: {}", e),
            })
        })?;

        let vector = match parsed {
            FeatureResponse::Pooled(vector) => vector,
            FeatureResponse::Tokens(tokens) => mean_pool(&tokens),
            FeatureResponse::Batched(mut batch) => {
                if batch.is_empty() {
                    Vec::new()
                } else {
                    mean_pool(&batch.swap_remove(0))
                }
            }
        };

        if vector.is_empty() {
            return Err(CoreError::Embedding(EmbeddingError::InferenceFailed {
                reason: format!("{} returned an empty vector", model),
            }));
        }
        Ok(vector)
    }

    /// Map `LABEL_<i>` names onto the configured trait names, ordered by
    /// label index. Unknown labels are kept as reported.
    fn name_traits(&self, scores: Vec<LabelScore>) -> TraitScores {
        let labels = &self.settings.personality_labels;
        let mut named: Vec<(usize, String, f64)> = scores
            .into_iter()
            .map(|LabelScore { label, score }| {
                let index = label
                    .strip_prefix("LABEL_")
                    .and_then(|i| i.parse::<usize>().ok());
                match index.and_then(|i| labels.get(i).map(|name| (i, name))) {
                    Some((i, name)) => (i, name.clone(), score),
                    None => (usize::MAX, label, score),
                }
            })
            .collect();
        named.sort_by_key(|(index, _, _)| *index);

        named
            .into_iter()
            .map(|(_, name, score)| (name, score))
            .collect()
    }
}

impl TraitClassifier for HuggingFaceClient {
    async fn classify_traits(&self, text: &str) -> Result<TraitScores, CoreError> {
        let scores = self.classify(&self.settings.personality_model, text).await?;
        Ok(self.name_traits(scores))
    }
}

impl EmotionClassifier for HuggingFaceClient {
    async fn classify_emotions(&self, text: &str) -> Result<EmotionScores, CoreError> {
        let scores = self.classify(&self.settings.emotion_model, text).await?;
        let mut emotions: EmotionScores = IndexMap::with_capacity(scores.len());
        for LabelScore { label, score } in scores {
            emotions.insert(label, score);
        }
        Ok(emotions)
    }
}

impl Embedder for HuggingFaceClient {
    fn dimension(&self) -> Option<usize> {
        None
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>, CoreError> {
        self.feature_extraction(&self.settings.embedding_model, text)
            .await
    }
}

fn mean_pool(tokens: &[Vec<f32>]) -> Vec<f32> {
    let Some(width) = tokens.first().map(Vec::len) else {
        return Vec::new();
    };
    let mut sums = vec![0.0f32; width];
    for token in tokens {
        for (sum, value) in sums.iter_mut().zip(token) {
            *sum += value;
        }
    }
    let count = tokens.len() as f32;
    sums.iter_mut().for_each(|sum| *sum /= count);
    sums
}

fn status_to_error(status: StatusCode, headers: &HeaderMap, body: &str, model: &str) -> ClassifierError {
    let parsed: Option<ErrorBody> = serde_json::from_str(body).ok();

    match status.as_u16() {
        401 | 403 => ClassifierError::InvalidApiKey {
            provider: PROVIDER.to_string(),
        },
        404 => ClassifierError::ModelNotAvailable {
            model: model.to_string(),
        },
        429 => ClassifierError::RateLimitExceeded {
            provider: PROVIDER.to_string(),
            retry_after: headers
                .get("retry-after")
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.trim().parse::<u64>().ok())
                .unwrap_or(60),
        },
        503 => match parsed.and_then(|b| b.estimated_time) {
            Some(estimated) => ClassifierError::ModelLoading {
                model: model.to_string(),
                estimated_secs: estimated.ceil().max(1.0) as u64,
            },
            None => ClassifierError::ServiceUnavailable {
                provider: PROVIDER.to_string(),
            },
        },
        code => ClassifierError::InferenceFailed {
            model: model.to_string(),
            reason: parsed
                .and_then(|b| b.error)
                .unwrap_or_else(|| format!("HTTP {}", code)),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client() -> HuggingFaceClient {
        HuggingFaceClient::new(InferenceSettings::default(), "hf_test".to_string()).unwrap()
    }

    fn score(label: &str, score: f64) -> LabelScore {
        LabelScore {
            label: label.to_string(),
            score,
        }
    }

    #[test]
    fn test_label_indices_map_to_trait_names() {
        let traits = client().name_traits(vec![
            score("LABEL_4", 0.4),
            score("LABEL_0", 0.9),
            score("LABEL_2", 0.1),
            score("mystery", 0.5),
        ]);

        let names: Vec<_> = traits.keys().map(String::as_str).collect();
        assert_eq!(
            names,
            vec!["Extroversion", "Agreeableness", "Openness", "mystery"]
        );
        assert_eq!(traits["Extroversion"], 0.9);
    }

    #[test]
    fn test_mean_pool() {
        let pooled = mean_pool(&[vec![1.0, 2.0], vec![3.0, 4.0]]);
        assert_eq!(pooled, vec![2.0, 3.0]);
        assert!(mean_pool(&[]).is_empty());
    }

    #[test]
    fn test_loading_model_maps_to_retryable_error() {
        let err = status_to_error(
            StatusCode::SERVICE_UNAVAILABLE,
            &HeaderMap::new(),
            r#"{"error":"Model is currently loading","estimated_time":19.4}"#,
            "nateraw/bert-base-uncased-emotion",
        );
        assert!(matches!(
            err,
            ClassifierError::ModelLoading {
                estimated_secs: 20,
                ..
            }
        ));

        let err = status_to_error(StatusCode::BAD_REQUEST, &HeaderMap::new(), "not json", "m");
        assert!(matches!(
            err,
            ClassifierError::InferenceFailed { ref reason, .. } if reason == "HTTP 400"
        ));
    }

    #[test]
    fn test_missing_token_is_a_config_error() {
        let err = HuggingFaceClient::from_settings(&InferenceSettings::default()).unwrap_err();
        assert!(matches!(err, CoreError::Config(_)));
    }
}
