//! Local sentence embeddings with candle.
//!
//! Loads a BERT-family sentence-transformers checkpoint (for example
//! all-MiniLM-L6-v2) from a directory holding `config.json`,
//! `tokenizer.json` and `model.safetensors`, and produces mean-pooled,
//! L2-normalized vectors on the CPU.

use candle_core::{Device, Tensor};
use candle_nn::VarBuilder;
use candle_transformers::models::bert::{BertModel, Config, DTYPE};
use inference::Embedder;
use persona_core::{CoreError, EmbeddingError};
use std::path::{Path, PathBuf};
use tokenizers::{Tokenizer, TruncationParams};
use tracing::{debug, info};

/// Longest token sequence fed to the model.
pub const MAX_SEQUENCE_LENGTH: usize = 256;

pub struct EmbeddingEngine {
    model: BertModel,
    tokenizer: Tokenizer,
    device: Device,
    model_path: PathBuf,
    hidden_size: usize,
}

impl std::fmt::Debug for EmbeddingEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EmbeddingEngine")
            .field("model_path", &self.model_path)
            .field("hidden_size", &self.hidden_size)
            .finish()
    }
}

fn inference_failed(e: impl std::fmt::Display) -> CoreError {
    CoreError::Embedding(EmbeddingError::InferenceFailed {
        reason: e.to_string(),
    })
}

impl EmbeddingEngine {
    pub fn load(model_dir: impl AsRef<Path>) -> Result<Self, CoreError> {
        let model_dir = model_dir.as_ref();
        let config_path = model_dir.join("config.json");
        let tokenizer_path = model_dir.join("tokenizer.json");
        let weights_path = model_dir.join("model.safetensors");

        for required in [&config_path, &tokenizer_path, &weights_path] {
            if !required.exists() {
                return Err(CoreError::Embedding(EmbeddingError::ModelNotFound {
                    model_name: required.display().to_string(),
                }));
            }
        }

        let load_failed = || {
            CoreError::Embedding(EmbeddingError::ModelLoadingFailed {
                model_path: model_dir.display().to_string(),
            })
        };

        let raw: serde_json::Value = serde_json::from_str(&std::fs::read_to_string(&config_path)?)
            .map_err(|_| load_failed())?;
        let hidden_size = raw
            .get("hidden_size")
            .and_then(serde_json::Value::as_u64)
            .ok_or_else(load_failed)? as usize;
        let config: Config = serde_json::from_value(raw).map_err(|_| load_failed())?;

        let mut tokenizer = Tokenizer::from_file(&tokenizer_path).map_err(|_| load_failed())?;
        tokenizer
            .with_padding(None)
            .with_truncation(Some(TruncationParams {
                max_length: MAX_SEQUENCE_LENGTH,
                ..Default::default()
            }))
            .map_err(|_| load_failed())?;

        let device = Device::Cpu;
        // Safety: the weights file is not modified while mapped.
        let vb = unsafe { VarBuilder::from_mmaped_safetensors(&[weights_path], DTYPE, &device) }
            .map_err(|_| load_failed())?;
        let model = BertModel::load(vb, &config).map_err(|_| load_failed())?;

        info!(
            "Loaded embedding model from {} ({} dimensions)",
            model_dir.display(),
            hidden_size
        );

        Ok(Self {
            model,
            tokenizer,
            device,
            model_path: model_dir.to_path_buf(),
            hidden_size,
        })
    }

    pub fn model_path(&self) -> &Path {
        &self.model_path
    }

    pub fn generate_embedding(&self, text: &str) -> Result<Vec<f32>, CoreError> {
        let encoding = self.tokenizer.encode(text, true).map_err(|_| {
            CoreError::Embedding(EmbeddingError::TokenizationFailed {
                text_length: text.len(),
            })
        })?;

        let ids = encoding.get_ids();
        if ids.is_empty() {
            return Err(CoreError::Embedding(EmbeddingError::TokenizationFailed {
                text_length: text.len(),
            }));
        }
        debug!("Embedding {} tokens", ids.len());

        let token_ids = Tensor::new(ids, &self.device)
            .and_then(|t| t.unsqueeze(0))
            .map_err(inference_failed)?;
        let token_type_ids = token_ids.zeros_like().map_err(inference_failed)?;

        let hidden = self
            .model
            .forward(&token_ids, &token_type_ids)
            .map_err(inference_failed)?;

        let pooled = mean_pool(&hidden).map_err(inference_failed)?;
        let vector = normalize_l2(&pooled)
            .and_then(|t| t.squeeze(0))
            .and_then(|t| t.to_vec1::<f32>())
            .map_err(inference_failed)?;

        if vector.len() != self.hidden_size {
            return Err(CoreError::Embedding(EmbeddingError::DimensionMismatch {
                expected: self.hidden_size,
                actual: vector.len(),
            }));
        }
        Ok(vector)
    }
}

/// Average over the token axis of a `(batch, tokens, hidden)` tensor.
fn mean_pool(hidden: &Tensor) -> candle_core::Result<Tensor> {
    let (_batch, tokens, _hidden) = hidden.dims3()?;
    hidden.sum(1)? / (tokens as f64)
}

fn normalize_l2(v: &Tensor) -> candle_core::Result<Tensor> {
    v.broadcast_div(&v.sqr()?.sum_keepdim(1)?.sqrt()?)
}

impl Embedder for EmbeddingEngine {
    fn dimension(&self) -> Option<usize> {
        Some(self.hidden_size)
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>, CoreError> {
        self.generate_embedding(text)
    }
}
