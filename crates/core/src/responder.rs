//! Responder trait: the abstraction over domain answerers.
//!
//! A responder produces a natural-language answer for one label. Responders
//! may be stateful (keeping prior turns), so `respond` takes `&mut self`.

use async_trait::async_trait;
use crate::error::ResponderError;
use crate::label::{Label, LabelMap};

/// The core Responder trait.
///
/// Each domain responder (transport, weather, culture, leisure) implements
/// this trait and is registered in the [`ResponderRegistry`] under its label.
#[async_trait]
pub trait Responder: Send {
    /// A short name for logging (e.g. "weather").
    fn name(&self) -> &str;

    /// Answer the raw user text. Failures are recoverable and scoped to this
    /// responder.
    async fn respond(&mut self, text: &str) -> std::result::Result<String, ResponderError>;
}

/// Label → responder table.
///
/// Fixed once a session is built. Labels without a responder are skipped by
/// the dispatcher.
pub struct ResponderRegistry {
    slots: LabelMap<Option<Box<dyn Responder>>>,
}

impl ResponderRegistry {
    pub fn new() -> Self {
        Self {
            slots: LabelMap::from_fn(|_| None),
        }
    }

    /// Register a responder. Replaces any existing responder for the label.
    pub fn register(&mut self, label: Label, responder: Box<dyn Responder>) {
        self.slots[label] = Some(responder);
    }

    /// Builder-style [`register`](Self::register).
    pub fn with(mut self, label: Label, responder: Box<dyn Responder>) -> Self {
        self.register(label, responder);
        self
    }

    /// Get the responder for a label.
    pub fn get_mut(&mut self, label: Label) -> Option<&mut (dyn Responder + 'static)> {
        self.slots[label].as_deref_mut()
    }

    pub fn contains(&self, label: Label) -> bool {
        self.slots[label].is_some()
    }

    /// Labels that have a responder, in enumeration order.
    pub fn labels(&self) -> Vec<Label> {
        self.slots
            .iter()
            .filter(|(_, slot)| slot.is_some())
            .map(|(label, _)| label)
            .collect()
    }

    pub fn len(&self) -> usize {
        self.slots.values().filter(|slot| slot.is_some()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for ResponderRegistry {
    fn default() -> Self {
        Self::new()
    }
}
