//! The closed intent taxonomy.
//!
//! Every request is routed to one or more of these labels. The set is fixed at
//! compile time; tables keyed by label are [`LabelMap`]s, which are plain
//! arrays indexed by the enum discriminant, so iteration order is always the
//! enumeration order below.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::{Index, IndexMut};
use std::str::FromStr;

/// One category in the intent taxonomy.
///
/// The declaration order is significant: it is the tie-break order for equal
/// probabilities, the order secondary labels are reported in, and the order
/// keyword fallback patterns are scanned in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Label {
    Transport,
    Weather,
    Culture,
    Leisure,
}

impl Label {
    /// Number of labels in the taxonomy.
    pub const COUNT: usize = 4;

    /// All labels in enumeration order.
    pub const ALL: [Label; Label::COUNT] = [
        Label::Transport,
        Label::Weather,
        Label::Culture,
        Label::Leisure,
    ];

    /// Canonical lowercase name.
    pub fn as_str(self) -> &'static str {
        match self {
            Label::Transport => "transport",
            Label::Weather => "weather",
            Label::Culture => "culture",
            Label::Leisure => "leisure",
        }
    }

    /// Capitalized name used in output block headers.
    pub fn title(self) -> &'static str {
        match self {
            Label::Transport => "Transport",
            Label::Weather => "Weather",
            Label::Culture => "Culture",
            Label::Leisure => "Leisure",
        }
    }

    /// Position in the enumeration order.
    pub fn index(self) -> usize {
        self as usize
    }
}

impl fmt::Display for Label {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when a string names no known label.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown label '{0}' (expected one of: transport, weather, culture, leisure)")]
pub struct UnknownLabel(pub String);

impl FromStr for Label {
    type Err = UnknownLabel;

    /// Parses canonical names as well as the French names found in
    /// checkpoint label maps (`météo`, `loisirs`).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "transport" | "transports" => Ok(Label::Transport),
            "weather" | "météo" | "meteo" => Ok(Label::Weather),
            "culture" => Ok(Label::Culture),
            "leisure" | "loisirs" | "loisir" => Ok(Label::Leisure),
            _ => Err(UnknownLabel(s.to_string())),
        }
    }
}

/// A fixed-size table with one slot per [`Label`].
///
/// Serializes as a map keyed by canonical label name.
#[derive(Debug, Clone, PartialEq)]
pub struct LabelMap<T>([T; Label::COUNT]);

impl<T> LabelMap<T> {
    /// Build a table by evaluating `f` for every label in enumeration order.
    pub fn from_fn(f: impl FnMut(Label) -> T) -> Self {
        Self(Label::ALL.map(f))
    }

    /// Iterate `(label, value)` pairs in enumeration order.
    pub fn iter(&self) -> impl Iterator<Item = (Label, &T)> {
        Label::ALL.into_iter().zip(self.0.iter())
    }

    /// Iterate `(label, value)` pairs mutably in enumeration order.
    pub fn iter_mut(&mut self) -> impl Iterator<Item = (Label, &mut T)> {
        Label::ALL.into_iter().zip(self.0.iter_mut())
    }

    /// Iterate values in enumeration order.
    pub fn values(&self) -> impl Iterator<Item = &T> {
        self.0.iter()
    }

    /// Transform every slot, keeping label positions.
    pub fn map<U>(self, f: impl FnMut(T) -> U) -> LabelMap<U> {
        LabelMap(self.0.map(f))
    }
}

impl<T: Default> Default for LabelMap<T> {
    fn default() -> Self {
        Self::from_fn(|_| T::default())
    }
}

impl<T: Serialize> Serialize for LabelMap<T> {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        use serde::ser::SerializeMap;
        let mut map = serializer.serialize_map(Some(Label::COUNT))?;
        for (label, value) in self.iter() {
            map.serialize_entry(label.as_str(), value)?;
        }
        map.end()
    }
}

impl<T> Index<Label> for LabelMap<T> {
    type Output = T;

    fn index(&self, label: Label) -> &T {
        &self.0[label.index()]
    }
}

impl<T> IndexMut<Label> for LabelMap<T> {
    fn index_mut(&mut self, label: Label) -> &mut T {
        &mut self.0[label.index()]
    }
}
