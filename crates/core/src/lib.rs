//! # urbanroute core
//!
//! Domain types, traits, and error definitions for the urbanroute intent
//! dispatcher. This crate has no inference or HTTP dependencies. It defines
//! the domain model the other crates implement against.
//!
//! ## Design
//!
//! The label set is a closed enum and every per-label table is a
//! [`LabelMap`]. Classification goes through the [`IntentModel`] trait and
//! answers come from [`Responder`]s, so the dispatcher can be tested with
//! scripted stand-ins for both.

pub mod classification;
pub mod error;
pub mod label;
pub mod message;
pub mod responder;

// Re-export key types at crate root for ergonomics
pub use classification::{ClassificationResult, Embedding, IntentModel, LabelScores};
pub use error::{Error, ModelError, ResponderError, Result};
pub use label::{Label, LabelMap, UnknownLabel};
pub use message::{Conversation, Message, Role};
pub use responder::{Responder, ResponderRegistry};
