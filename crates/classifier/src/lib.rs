//! # urbanroute classifier
//!
//! Turns raw text into a [`ClassificationResult`]:
//!
//! ```text
//! text ──► CachedEncoder ──► Embedding ──► ClassifierHead ──► softmax
//!                (LRU)                                          │
//!                                       ConfidencePolicy ◄──────┘
//! ```
//!
//! The loaded checkpoint ([`LoadedModel`]) is immutable and shared behind an
//! `Arc`; each [`IntentClassifier`] owns its own cache, so a fresh session can
//! reuse the model without inheriting memoized encodings.
//!
//! The keyword fallback ([`KeywordMatcher`]) lives here too but is applied by
//! the dispatcher, which decides when confidence is too low.

#[cfg(feature = "bert")]
pub mod bert;
pub mod cache;
pub mod checkpoint;
pub mod encoder;
pub mod hashing;
pub mod head;
pub mod keywords;
pub mod policy;

pub use cache::{CacheStats, EmbeddingCache};
pub use checkpoint::{EncoderSpec, HeadSpec, Manifest};
pub use encoder::{CachedEncoder, Encoder};
pub use hashing::HashingEncoder;
pub use head::{Activation, ClassifierHead};
pub use keywords::{KeywordError, KeywordMatcher};
pub use policy::{ConfidencePolicy, RoutingSettings};

use std::collections::HashSet;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info};
use urbanroute_core::{
    ClassificationResult, Embedding, IntentModel, Label, LabelMap, LabelScores, ModelError,
};

/// The immutable, checkpoint-derived part of the classifier.
pub struct LoadedModel {
    encoder: Arc<dyn Encoder>,
    head: ClassifierHead,
    /// Head output index → label.
    labels: Vec<Label>,
}

impl LoadedModel {
    /// Load and validate a checkpoint directory.
    pub fn load(dir: &Path) -> Result<Self, ModelError> {
        let manifest = Manifest::read(dir)?;
        let labels = manifest.label_table()?;
        let encoder = checkpoint::build_encoder(dir, &manifest.encoder)?;
        let head = ClassifierHead::from_safetensors(
            &dir.join(checkpoint::HEAD_FILE),
            manifest.head.activation,
        )?;

        if head.hidden_size() != manifest.head.hidden_size {
            return Err(ModelError::InvalidCheckpoint(format!(
                "manifest declares hidden_size {} but {} has {}",
                manifest.head.hidden_size,
                checkpoint::HEAD_FILE,
                head.hidden_size()
            )));
        }

        let model = Self::from_parts(encoder, head, labels)?;
        info!(
            checkpoint = %dir.display(),
            encoder = model.encoder.kind(),
            dimension = model.dimension(),
            hidden = model.head.hidden_size(),
            "Intent checkpoint loaded"
        );
        Ok(model)
    }

    /// Assemble a model from already-built parts, checking that they fit.
    pub fn from_parts(
        encoder: Arc<dyn Encoder>,
        head: ClassifierHead,
        labels: Vec<Label>,
    ) -> Result<Self, ModelError> {
        if head.input_dim() != encoder.dimension() {
            return Err(ModelError::InvalidCheckpoint(format!(
                "head expects {}-dimensional embeddings, {} encoder produces {}",
                head.input_dim(),
                encoder.kind(),
                encoder.dimension()
            )));
        }

        let distinct: HashSet<Label> = labels.iter().copied().collect();
        if labels.len() != Label::COUNT || distinct.len() != Label::COUNT {
            return Err(ModelError::InvalidCheckpoint(format!(
                "label table must list each of the {} labels once, got {labels:?}",
                Label::COUNT
            )));
        }

        if head.num_outputs() != labels.len() {
            return Err(ModelError::InvalidCheckpoint(format!(
                "head has {} outputs for {} labels",
                head.num_outputs(),
                labels.len()
            )));
        }

        Ok(Self {
            encoder,
            head,
            labels,
        })
    }

    pub fn encoder(&self) -> &Arc<dyn Encoder> {
        &self.encoder
    }

    pub fn dimension(&self) -> usize {
        self.encoder.dimension()
    }

    /// Probability per label for an embedding.
    pub fn distribution(&self, embedding: &Embedding) -> Result<LabelScores, ModelError> {
        let probs = self.head.probabilities(embedding.as_slice())?;
        let mut scores: LabelScores = LabelMap::from_fn(|_| 0.0);
        for (&label, p) in self.labels.iter().zip(probs) {
            scores[label] = p;
        }
        Ok(scores)
    }
}

/// Checkpoint model + per-session embedding cache + confidence policy.
pub struct IntentClassifier {
    model: Arc<LoadedModel>,
    encoder: CachedEncoder,
    policy: ConfidencePolicy,
}

impl IntentClassifier {
    /// Load a checkpoint and wrap it with a fresh cache.
    pub fn load(dir: &Path, settings: RoutingSettings) -> Result<Self, ModelError> {
        let model = LoadedModel::load(dir)?;
        Ok(Self::new(Arc::new(model), settings))
    }

    /// A classifier over an already-loaded model. The cache starts empty.
    pub fn new(model: Arc<LoadedModel>, settings: RoutingSettings) -> Self {
        let encoder = CachedEncoder::new(model.encoder.clone(), settings.cache_capacity);
        Self {
            model,
            encoder,
            policy: settings.policy,
        }
    }

    pub fn from_parts(
        encoder: Arc<dyn Encoder>,
        head: ClassifierHead,
        labels: Vec<Label>,
        policy: ConfidencePolicy,
        cache_capacity: usize,
    ) -> Result<Self, ModelError> {
        let model = LoadedModel::from_parts(encoder, head, labels)?;
        Ok(Self::new(
            Arc::new(model),
            RoutingSettings {
                policy,
                cache_capacity,
            },
        ))
    }

    /// The shared model, for building a replacement session.
    pub fn model(&self) -> &Arc<LoadedModel> {
        &self.model
    }

    pub fn policy(&self) -> &ConfidencePolicy {
        &self.policy
    }

    /// Encode `text`, serving repeats from the cache.
    pub fn encode(&mut self, text: &str) -> Result<Embedding, ModelError> {
        self.encoder.encode(text)
    }

    pub fn distribution(&self, embedding: &Embedding) -> Result<LabelScores, ModelError> {
        self.model.distribution(embedding)
    }

    pub fn classify(&self, embedding: &Embedding) -> Result<ClassificationResult, ModelError> {
        let scores = self.distribution(embedding)?;
        let result = self.policy.select(&scores);
        debug!(
            primary = %result.primary,
            score = result.primary_score,
            secondaries = ?result.secondaries,
            "Classified"
        );
        Ok(result)
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.encoder.stats()
    }

    pub fn clear_cache(&mut self) {
        self.encoder.clear();
    }
}

impl IntentModel for IntentClassifier {
    fn name(&self) -> &str {
        self.model.encoder.kind()
    }

    fn classify_text(&mut self, text: &str) -> Result<ClassificationResult, ModelError> {
        let embedding = self.encode(text)?;
        self.classify(&embedding)
    }
}
