//! Deterministic keyword fallback.
//!
//! One case-insensitive, word-bounded pattern per label. Patterns are tried
//! in label enumeration order and the first match wins, so overlapping
//! vocabularies ("aller au concert") resolve predictably.

use regex::Regex;
use urbanroute_core::{Label, LabelMap};

/// Built-in alternatives (regex fragments) for a label.
pub fn default_alternatives(label: Label) -> &'static [&'static str] {
    match label {
        Label::Transport => &[
            "bus",
            "métro",
            "train",
            "tram",
            "rer",
            "itinéraire",
            "trajet",
            "covoiturage",
            "taxi",
            "aller",
            "voyager",
            "prendre",
        ],
        Label::Weather => &[
            "météo",
            "pluie",
            "neige",
            "soleil",
            "orage",
            "vent",
            "température",
            "prévisions",
            "temps",
        ],
        Label::Culture => &[
            r"historiq\w*",
            "patrimoine",
            "monument",
            "musée",
            "château",
            "architecte",
            "histoire",
            "guerre",
        ],
        Label::Leisure => &[
            "concert",
            "exposition",
            "festival",
            "sortie",
            "loisir",
            "événement",
            "spectacle",
        ],
    }
}

#[derive(Debug, thiserror::Error)]
#[error("Invalid keyword pattern for '{label}': {reason}")]
pub struct KeywordError {
    pub label: Label,
    pub reason: String,
}

pub struct KeywordMatcher {
    patterns: LabelMap<Option<Regex>>,
}

impl KeywordMatcher {
    /// Build from per-label alternatives. `None` selects the built-in list;
    /// an empty list disables the label.
    pub fn with_overrides(
        overrides: &LabelMap<Option<Vec<String>>>,
    ) -> Result<Self, KeywordError> {
        let mut patterns: LabelMap<Option<Regex>> = LabelMap::from_fn(|_| None);
        for label in Label::ALL {
            patterns[label] = match &overrides[label] {
                Some(alternatives) => compile(label, alternatives)?,
                None => compile(label, default_alternatives(label))?,
            };
        }
        Ok(Self { patterns })
    }

    /// First label, in enumeration order, whose pattern matches `text`.
    pub fn match_label(&self, text: &str) -> Option<Label> {
        self.patterns
            .iter()
            .find(|(_, pattern)| pattern.as_ref().is_some_and(|re| re.is_match(text)))
            .map(|(label, _)| label)
    }

    /// Every label whose pattern matches, in enumeration order.
    pub fn matching_labels(&self, text: &str) -> Vec<Label> {
        self.patterns
            .iter()
            .filter(|(_, pattern)| pattern.as_ref().is_some_and(|re| re.is_match(text)))
            .map(|(label, _)| label)
            .collect()
    }

    /// The compiled pattern for a label, if it has one.
    pub fn pattern(&self, label: Label) -> Option<&str> {
        self.patterns[label].as_ref().map(Regex::as_str)
    }
}

impl Default for KeywordMatcher {
    fn default() -> Self {
        let mut patterns: LabelMap<Option<Regex>> = LabelMap::from_fn(|_| None);
        for label in Label::ALL {
            patterns[label] = compile(label, default_alternatives(label)).unwrap_or_else(|e| {
                tracing::error!(label = %label, error = %e, "Built-in keyword pattern rejected");
                None
            });
        }
        Self { patterns }
    }
}

fn compile<S: AsRef<str>>(label: Label, alternatives: &[S]) -> Result<Option<Regex>, KeywordError> {
    let fragments: Vec<&str> = alternatives
        .iter()
        .map(AsRef::as_ref)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .collect();
    if fragments.is_empty() {
        return Ok(None);
    }

    let source = format!(r"(?i)\b(?:{})\b", fragments.join("|"));
    Regex::new(&source).map(Some).map_err(|e| KeywordError {
        label,
        reason: e.to_string(),
    })
}
