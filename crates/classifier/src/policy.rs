//! Primary/secondary label selection.

use serde::{Deserialize, Serialize};
use urbanroute_core::{ClassificationResult, Label, LabelScores};

pub const DEFAULT_PRIMARY_THRESHOLD: f32 = 0.50;
pub const DEFAULT_SECONDARY_THRESHOLD: f32 = 0.35;
pub const DEFAULT_CACHE_CAPACITY: usize = 256;

/// Confidence thresholds applied to a label distribution.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ConfidencePolicy {
    /// Below this, the keyword fallback is consulted.
    pub primary_threshold: f32,
    /// Minimum score for an additional label to be dispatched.
    pub secondary_threshold: f32,
}

impl Default for ConfidencePolicy {
    fn default() -> Self {
        Self {
            primary_threshold: DEFAULT_PRIMARY_THRESHOLD,
            secondary_threshold: DEFAULT_SECONDARY_THRESHOLD,
        }
    }
}

impl ConfidencePolicy {
    pub fn new(primary_threshold: f32, secondary_threshold: f32) -> Self {
        Self {
            primary_threshold,
            secondary_threshold,
        }
    }

    /// Pick the primary label (ties to the earliest label) and every other
    /// label scoring at least the secondary threshold, in enumeration order.
    pub fn select(&self, scores: &LabelScores) -> ClassificationResult {
        let (primary, primary_score) = scores.argmax();
        let secondaries = Label::ALL
            .into_iter()
            .filter(|&label| label != primary)
            .filter(|&label| {
                let score = scores[label];
                score.is_finite() && score >= self.secondary_threshold
            })
            .collect();

        ClassificationResult {
            primary,
            primary_score: primary_score.clamp(0.0, 1.0),
            secondaries,
            scores: scores.clone(),
        }
    }

    /// Whether the classifier's answer is too weak to accept without
    /// consulting the keyword fallback.
    pub fn needs_fallback(&self, result: &ClassificationResult) -> bool {
        result.primary_score < self.primary_threshold
    }
}

/// Thresholds plus cache sizing: everything a session needs besides the
/// checkpoint itself.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RoutingSettings {
    pub policy: ConfidencePolicy,
    pub cache_capacity: usize,
}

impl Default for RoutingSettings {
    fn default() -> Self {
        Self {
            policy: ConfidencePolicy::default(),
            cache_capacity: DEFAULT_CACHE_CAPACITY,
        }
    }
}
