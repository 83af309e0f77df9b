//! Classification domain types.
//!
//! Text → [`Embedding`] → [`LabelScores`] → [`ClassificationResult`].
//! The [`IntentModel`] trait is the seam the dispatcher classifies through,
//! so routing logic can be exercised without a loaded checkpoint.

use crate::error::ModelError;
use crate::label::{Label, LabelMap};
use serde::Serialize;
use std::sync::Arc;

/// Fixed-dimension vector produced by an encoder for one text input.
///
/// Immutable once produced; cloning shares the underlying buffer.
#[derive(Debug, Clone, PartialEq)]
pub struct Embedding(Arc<[f32]>);

impl Embedding {
    pub fn new(values: Vec<f32>) -> Self {
        Self(values.into())
    }

    pub fn as_slice(&self) -> &[f32] {
        &self.0
    }

    pub fn dimension(&self) -> usize {
        self.0.len()
    }

    /// Whether two embeddings share the same buffer (i.e. one was served
    /// from cache for the other).
    pub fn ptr_eq(&self, other: &Embedding) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl From<Vec<f32>> for Embedding {
    fn from(values: Vec<f32>) -> Self {
        Self::new(values)
    }
}

/// A probability distribution over the closed label set.
pub type LabelScores = LabelMap<f32>;

impl LabelMap<f32> {
    /// Equal probability for every label.
    pub fn uniform() -> Self {
        LabelMap::from_fn(|_| 1.0 / Label::COUNT as f32)
    }

    /// The highest-scoring label and its score.
    ///
    /// Scans in enumeration order and only replaces the current best on a
    /// strictly greater score, so ties go to the earliest label. Non-finite
    /// scores count as 0.
    pub fn argmax(&self) -> (Label, f32) {
        let mut best = (Label::ALL[0], finite_or_zero(self[Label::ALL[0]]));
        for (label, &score) in self.iter().skip(1) {
            let score = finite_or_zero(score);
            if score > best.1 {
                best = (label, score);
            }
        }
        best
    }

    /// Sum of all scores.
    pub fn total(&self) -> f32 {
        self.values().sum()
    }
}

fn finite_or_zero(score: f32) -> f32 {
    if score.is_finite() { score } else { 0.0 }
}

/// Primary/secondary label selection for one input.
///
/// Invariants (upheld by the confidence policy that builds it):
/// - `primary_score` is in `[0, 1]`
/// - `secondaries` never contains `primary`
/// - every secondary scored at least the secondary threshold
/// - `secondaries` are in label enumeration order
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClassificationResult {
    pub primary: Label,
    pub primary_score: f32,
    pub secondaries: Vec<Label>,
    /// The full distribution the selection was made from.
    pub scores: LabelScores,
}

impl ClassificationResult {
    /// Primary followed by secondaries.
    pub fn labels(&self) -> Vec<Label> {
        std::iter::once(self.primary)
            .chain(self.secondaries.iter().copied())
            .collect()
    }
}

/// Anything that can turn raw text into a [`ClassificationResult`].
///
/// Takes `&mut self` because implementations memoize encodings.
pub trait IntentModel: Send {
    /// A short name for logging.
    fn name(&self) -> &str;

    /// Encode and classify `text`.
    fn classify_text(&mut self, text: &str) -> Result<ClassificationResult, ModelError>;
}
