//! The router: classify → select labels → dispatch → aggregate.
//!
//! ```text
//!  text ──► IntentModel ──► ConfidencePolicy ──┬─ confident ──► primary + secondaries
//!                                              └─ weak ──► KeywordMatcher ──► [match] or [primary]
//!                                                                │
//!        "[Title] answer\n[Title] answer" ◄── responders, in label order
//! ```

use futures::FutureExt;
use serde::Serialize;
use std::any::Any;
use std::panic::AssertUnwindSafe;
use tracing::{Instrument, Span, debug, error, info, warn};
use urbanroute_classifier::{ConfidencePolicy, KeywordMatcher};
use urbanroute_core::{ClassificationResult, IntentModel, Label, LabelScores, ResponderRegistry};
use uuid::Uuid;

/// Returned by [`Dispatcher::route`] when no selected label has a responder.
pub const NO_RESPONDER_NOTICE: &str = "Aucun service n'est disponible pour cette demande.";

/// Where the final label sequence came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DecisionSource {
    /// Confident classification: primary plus qualifying secondaries.
    Classifier,
    /// Weak classification overridden by a keyword match.
    KeywordFallback,
    /// Weak classification, no keyword match: the primary alone.
    LowConfidence,
}

/// The labels a request will be dispatched to, and why.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RoutingDecision {
    /// Never empty.
    pub labels: Vec<Label>,
    pub classification: ClassificationResult,
    pub source: DecisionSource,
}

/// One dispatcher session.
///
/// Owns the classifier state (including its embedding cache) and one
/// responder per label. Replaced wholesale on reset.
pub struct Dispatcher<M> {
    model: M,
    policy: ConfidencePolicy,
    keywords: KeywordMatcher,
    responders: ResponderRegistry,
    session_id: Uuid,
    span: Span,
}

impl<M: IntentModel> Dispatcher<M> {
    pub fn new(
        model: M,
        policy: ConfidencePolicy,
        keywords: KeywordMatcher,
        responders: ResponderRegistry,
    ) -> Self {
        let session_id = Uuid::new_v4();
        let span = tracing::info_span!("session", id = %session_id);
        Self {
            model,
            policy,
            keywords,
            responders,
            session_id,
            span,
        }
    }

    /// Replace the logging span responder calls are instrumented with.
    pub fn with_span(mut self, span: Span) -> Self {
        self.span = span;
        self
    }

    pub fn session_id(&self) -> Uuid {
        self.session_id
    }

    pub fn span(&self) -> &Span {
        &self.span
    }

    pub fn model(&self) -> &M {
        &self.model
    }

    pub fn policy(&self) -> &ConfidencePolicy {
        &self.policy
    }

    /// Labels that have a responder, in enumeration order.
    pub fn registered_labels(&self) -> Vec<Label> {
        self.responders.labels()
    }

    /// Classify `text` and settle the label sequence, without dispatching.
    pub fn decide(&mut self, text: &str) -> RoutingDecision {
        let _entered = self.span.enter();

        let classification = match self.model.classify_text(text) {
            Ok(result) => result,
            Err(e) => {
                error!(model = self.model.name(), error = %e, "Inference failed, using uniform scores");
                self.policy.select(&LabelScores::uniform())
            }
        };

        let (labels, source) = if !self.policy.needs_fallback(&classification) {
            (classification.labels(), DecisionSource::Classifier)
        } else if let Some(label) = self.keywords.match_label(text) {
            (vec![label], DecisionSource::KeywordFallback)
        } else {
            (vec![classification.primary], DecisionSource::LowConfidence)
        };

        debug!(
            primary = %classification.primary,
            score = classification.primary_score,
            labels = ?labels,
            source = ?source,
            "Routing decision"
        );

        RoutingDecision {
            labels,
            classification,
            source,
        }
    }

    /// Route `text` to its responders and join their answers.
    ///
    /// A failing or panicking responder yields an inline error block for its
    /// label; the other labels are unaffected. Never returns an empty string.
    pub async fn route(&mut self, text: &str) -> String {
        let decision = self.decide(text);
        let span = self.span.clone();

        async {
            info!(labels = ?decision.labels, source = ?decision.source, "Dispatching request");

            let mut blocks = Vec::with_capacity(decision.labels.len());
            for &label in &decision.labels {
                let Some(responder) = self.responders.get_mut(label) else {
                    warn!(label = %label, "No responder registered, skipping");
                    continue;
                };
                let name = responder.name().to_string();

                let outcome = AssertUnwindSafe(responder.respond(text)).catch_unwind().await;
                let body = match outcome {
                    Ok(Ok(answer)) => answer,
                    Ok(Err(e)) => {
                        error!(label = %label, responder = %name, error = %e, "Responder failed");
                        error_block(&e)
                    }
                    Err(panic) => {
                        let message = panic_message(panic.as_ref());
                        error!(label = %label, responder = %name, panic = %message, "Responder panicked");
                        error_block(&format!("panique du service : {message}"))
                    }
                };
                blocks.push(format!("[{}] {}", label.title(), body));
            }

            if blocks.is_empty() {
                NO_RESPONDER_NOTICE.to_string()
            } else {
                blocks.join("\n")
            }
        }
        .instrument(span)
        .await
    }
}

fn error_block(error: &dyn std::fmt::Display) -> String {
    format!("[Erreur] échec de traitement : {error}")
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
