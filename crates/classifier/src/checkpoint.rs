//! Checkpoint directory layout and manifest validation.
//!
//! ```text
//! <checkpoint>/
//!   manifest.json
//!   head.safetensors
//!   encoder/            (sentence_bert only, optional)
//! ```

use crate::encoder::Encoder;
use crate::hashing::HashingEncoder;
use crate::head::Activation;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;
use urbanroute_core::{Label, ModelError};

pub const MANIFEST_FILE: &str = "manifest.json";
pub const HEAD_FILE: &str = "head.safetensors";
pub const ENCODER_DIR: &str = "encoder";
pub const FORMAT_VERSION: u32 = 1;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Manifest {
    pub format_version: u32,
    /// Label name (aliases accepted) → output index of the head.
    pub labels: BTreeMap<String, usize>,
    pub encoder: EncoderSpec,
    #[serde(default)]
    pub head: HeadSpec,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum EncoderSpec {
    SentenceBert {
        base_model: String,
        #[serde(default = "default_max_len")]
        max_len: usize,
    },
    Hashing {
        dimension: usize,
    },
}

fn default_max_len() -> usize {
    128
}

impl EncoderSpec {
    pub fn kind(&self) -> &'static str {
        match self {
            EncoderSpec::SentenceBert { .. } => "sentence_bert",
            EncoderSpec::Hashing { .. } => "hashing",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HeadSpec {
    #[serde(default = "default_hidden_size")]
    pub hidden_size: usize,
    #[serde(default)]
    pub activation: Activation,
}

fn default_hidden_size() -> usize {
    256
}

impl Default for HeadSpec {
    fn default() -> Self {
        Self {
            hidden_size: default_hidden_size(),
            activation: Activation::default(),
        }
    }
}

impl Manifest {
    /// Read and parse `<dir>/manifest.json`, checking the format version.
    pub fn read(dir: &Path) -> Result<Self, ModelError> {
        if !dir.is_dir() {
            return Err(ModelError::CheckpointNotFound(dir.display().to_string()));
        }

        let path = dir.join(MANIFEST_FILE);
        if !path.exists() {
            return Err(ModelError::InvalidCheckpoint(format!(
                "missing {MANIFEST_FILE} in {}",
                dir.display()
            )));
        }

        let content = std::fs::read_to_string(&path).map_err(|e| ModelError::Io {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;
        let manifest: Manifest = serde_json::from_str(&content).map_err(|e| {
            ModelError::InvalidCheckpoint(format!("{}: {e}", path.display()))
        })?;

        if manifest.format_version != FORMAT_VERSION {
            return Err(ModelError::InvalidCheckpoint(format!(
                "unsupported format_version {} (expected {FORMAT_VERSION})",
                manifest.format_version
            )));
        }

        Ok(manifest)
    }

    /// Head output index → label. Every label must appear exactly once and the
    /// indices must be exactly `0..Label::COUNT`.
    pub fn label_table(&self) -> Result<Vec<Label>, ModelError> {
        label_table(&self.labels)
    }
}

pub fn label_table(labels: &BTreeMap<String, usize>) -> Result<Vec<Label>, ModelError> {
    let mut by_index: Vec<Option<Label>> = vec![None; Label::COUNT];
    let mut seen: BTreeMap<Label, &str> = BTreeMap::new();

    for (name, &index) in labels {
        let label: Label = name
            .parse()
            .map_err(|e| ModelError::InvalidCheckpoint(format!("labels: {e}")))?;

        if let Some(previous) = seen.insert(label, name) {
            return Err(ModelError::InvalidCheckpoint(format!(
                "labels: '{label}' is mapped twice ('{previous}' and '{name}')"
            )));
        }

        let slot = by_index.get_mut(index).ok_or_else(|| {
            ModelError::InvalidCheckpoint(format!(
                "labels: index {index} for '{name}' is out of range 0..{}",
                Label::COUNT
            ))
        })?;
        if let Some(other) = slot {
            return Err(ModelError::InvalidCheckpoint(format!(
                "labels: index {index} is used by both '{other}' and '{label}'"
            )));
        }
        *slot = Some(label);
    }

    if let Some(missing) = Label::ALL.into_iter().find(|l| !seen.contains_key(l)) {
        return Err(ModelError::InvalidCheckpoint(format!(
            "labels: '{missing}' is missing"
        )));
    }

    // All labels present once, indices distinct and in range: every slot is full.
    Ok(by_index.into_iter().flatten().collect())
}

/// Instantiate the encoder a manifest describes.
pub fn build_encoder(dir: &Path, spec: &EncoderSpec) -> Result<Arc<dyn Encoder>, ModelError> {
    match spec {
        EncoderSpec::Hashing { dimension } => Ok(Arc::new(HashingEncoder::new(*dimension)?)),

        #[cfg(feature = "bert")]
        EncoderSpec::SentenceBert {
            base_model,
            max_len,
        } => Ok(Arc::new(crate::bert::SentenceBertEncoder::load(
            &dir.join(ENCODER_DIR),
            base_model,
            *max_len,
        )?)),

        #[cfg(not(feature = "bert"))]
        EncoderSpec::SentenceBert { base_model, .. } => {
            let _ = dir;
            Err(ModelError::UnsupportedEncoder(format!(
                "sentence_bert ({base_model}) requires building with the `bert` feature"
            )))
        }
    }
}
