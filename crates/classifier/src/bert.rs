//! Sentence-transformer encoder on a BERT-family model (Candle).
//!
//! Token states are mean-pooled under the attention mask, which is how
//! sentence-transformers checkpoints pool by default. Files are read from the
//! checkpoint's `encoder/` directory when present and otherwise fetched from
//! the Hugging Face Hub (cached by `hf-hub`).
//!
//! Only `model_type = "bert"` configs are accepted. XLM-RoBERTa configs also
//! deserialize as a BERT config but offset positions by `pad_token_id + 1`,
//! so loading them through `BertModel` would embed every text wrongly.

use crate::encoder::Encoder;
use crate::head::map_candle_err;
use candle_core::{D, DType, Device, Tensor};
use candle_nn::VarBuilder;
use candle_transformers::models::bert::{BertModel, Config as BertConfig};
use hf_hub::api::sync::Api;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tokenizers::{Tokenizer, TruncationParams};
use tracing::{debug, info};
use urbanroute_core::ModelError;

const CONFIG_FILE: &str = "config.json";
const TOKENIZER_FILE: &str = "tokenizer.json";
const WEIGHTS_FILE: &str = "model.safetensors";

pub struct SentenceBertEncoder {
    model: BertModel,
    tokenizer: Tokenizer,
    device: Device,
    dimension: usize,
}

#[derive(Deserialize)]
struct ModelType {
    model_type: Option<String>,
}

/// Reject encoder configs whose architecture `BertModel` cannot run.
/// Configs without a `model_type` predate the field and are BERT.
fn check_model_type(config_json: &str) -> Result<(), ModelError> {
    let parsed: ModelType = serde_json::from_str(config_json)
        .map_err(|e| ModelError::InvalidCheckpoint(format!("Invalid encoder config: {e}")))?;
    match parsed.model_type.as_deref() {
        None | Some("bert") => Ok(()),
        Some(other) => Err(ModelError::UnsupportedEncoder(format!(
            "model_type '{other}' (only 'bert' encoders are supported)"
        ))),
    }
}

/// Truncate to `max_len` tokens inside the tokenizer, so special tokens
/// added by the post-processor survive.
fn configure_tokenizer(tokenizer: &mut Tokenizer, max_len: usize) -> Result<(), ModelError> {
    tokenizer
        .with_truncation(Some(TruncationParams {
            max_length: max_len.max(1),
            ..Default::default()
        }))
        .map_err(|e| ModelError::InvalidCheckpoint(format!("Invalid truncation: {e}")))?;
    Ok(())
}

impl SentenceBertEncoder {
    pub fn load(encoder_dir: &Path, base_model: &str, max_len: usize) -> Result<Self, ModelError> {
        let device = Device::Cpu;

        let needs_hub = [CONFIG_FILE, TOKENIZER_FILE, WEIGHTS_FILE]
            .iter()
            .any(|name| !encoder_dir.join(name).exists());
        let hub = if needs_hub {
            let api = Api::new().map_err(|e| ModelError::Io {
                path: base_model.to_string(),
                reason: format!("Failed to initialize HuggingFace Hub API: {e}"),
            })?;
            Some(api.model(base_model.to_string()))
        } else {
            None
        };

        let resolve = |name: &str| -> Result<PathBuf, ModelError> {
            let local = encoder_dir.join(name);
            if local.exists() {
                return Ok(local);
            }
            match &hub {
                Some(repo) => repo.get(name).map_err(|e| ModelError::Io {
                    path: format!("{base_model}/{name}"),
                    reason: format!("Failed to download: {e}"),
                }),
                None => Err(ModelError::InvalidCheckpoint(format!(
                    "missing {}",
                    local.display()
                ))),
            }
        };

        let config_path = resolve(CONFIG_FILE)?;
        let tokenizer_path = resolve(TOKENIZER_FILE)?;
        let weights_path = resolve(WEIGHTS_FILE)?;

        info!(
            model = base_model,
            config = %config_path.display(),
            weights = %weights_path.display(),
            "Loading sentence encoder"
        );

        let config_str = std::fs::read_to_string(&config_path).map_err(|e| ModelError::Io {
            path: config_path.display().to_string(),
            reason: e.to_string(),
        })?;
        check_model_type(&config_str)?;
        let config: BertConfig = serde_json::from_str(&config_str).map_err(|e| {
            ModelError::UnsupportedEncoder(format!(
                "{} is not a BERT config: {e}",
                config_path.display()
            ))
        })?;

        let mut tokenizer = Tokenizer::from_file(&tokenizer_path).map_err(|e| {
            ModelError::InvalidCheckpoint(format!("Failed to load tokenizer: {e}"))
        })?;
        configure_tokenizer(&mut tokenizer, max_len)?;

        // SAFETY: the weights file is not modified while mapped.
        let vb = unsafe {
            VarBuilder::from_mmaped_safetensors(&[weights_path], DType::F32, &device)
        }
        .map_err(|e| ModelError::InvalidCheckpoint(format!("Failed to map weights: {e}")))?;

        let model = BertModel::load(vb, &config)
            .map_err(|e| ModelError::InvalidCheckpoint(format!("Failed to load encoder: {e}")))?;

        info!(
            dimension = config.hidden_size,
            max_len = max_len,
            "Sentence encoder loaded"
        );

        Ok(Self {
            model,
            tokenizer,
            device,
            dimension: config.hidden_size,
        })
    }
}

impl Encoder for SentenceBertEncoder {
    fn kind(&self) -> &'static str {
        "sentence_bert"
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn encode(&self, text: &str) -> Result<Vec<f32>, ModelError> {
        let encoding = self
            .tokenizer
            .encode(text, true)
            .map_err(|e| ModelError::Inference(format!("Tokenization failed: {e}")))?;

        let ids = encoding.get_ids();
        let mask = encoding.get_attention_mask();
        debug!(tokens = ids.len(), "Tokenized input");

        let input_ids = Tensor::new(ids, &self.device)
            .and_then(|t| t.unsqueeze(0))
            .map_err(map_candle_err)?;
        let attention_mask = Tensor::new(mask, &self.device)
            .and_then(|t| t.unsqueeze(0))
            .map_err(map_candle_err)?;
        let token_type_ids = input_ids.zeros_like().map_err(map_candle_err)?;

        // [1, seq_len, hidden]
        let hidden = self
            .model
            .forward(&input_ids, &token_type_ids, Some(&attention_mask))
            .map_err(map_candle_err)?;

        // Masked mean pooling: [1, seq_len, 1] mask, sum over the sequence.
        let pooled = (|| {
            let mask = attention_mask.to_dtype(DType::F32)?.unsqueeze(D::Minus1)?;
            let summed = hidden.broadcast_mul(&mask)?.sum(1)?;
            let counts = mask.sum(1)?.clamp(1e-9f32, f32::MAX)?;
            summed.broadcast_div(&counts)?.squeeze(0)
        })()
        .map_err(map_candle_err)?;

        pooled.to_vec1::<f32>().map_err(map_candle_err)
    }
}
