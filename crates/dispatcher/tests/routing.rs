//! Routing behaviour with a scripted model and mock responders.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use urbanroute_classifier::{ConfidencePolicy, KeywordMatcher};
use urbanroute_core::{
    ClassificationResult, IntentModel, Label, LabelMap, LabelScores, ModelError, Responder,
    ResponderError, ResponderRegistry,
};
use urbanroute_dispatcher::{DecisionSource, Dispatcher, NO_RESPONDER_NOTICE};

// ── Test doubles ──────────────────────────────────────────────────────

/// Returns a fixed distribution per input text; unknown texts get the
/// uniform distribution, texts in `failing` get an inference error.
struct ScriptedModel {
    policy: ConfidencePolicy,
    scripts: HashMap<String, LabelScores>,
    failing: Vec<String>,
    calls: Arc<AtomicUsize>,
}

impl ScriptedModel {
    fn new() -> Self {
        Self {
            policy: ConfidencePolicy::default(),
            scripts: HashMap::new(),
            failing: Vec::new(),
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    fn script(mut self, text: &str, values: [f32; 4]) -> Self {
        self.scripts
            .insert(text.to_string(), LabelMap::from_fn(|label| values[label.index()]));
        self
    }

    fn fail_on(mut self, text: &str) -> Self {
        self.failing.push(text.to_string());
        self
    }
}

impl IntentModel for ScriptedModel {
    fn name(&self) -> &str {
        "scripted"
    }

    fn classify_text(&mut self, text: &str) -> Result<ClassificationResult, ModelError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.failing.iter().any(|t| t == text) {
            return Err(ModelError::Inference("scripted failure".into()));
        }
        let scores = self
            .scripts
            .get(text)
            .cloned()
            .unwrap_or_else(LabelScores::uniform);
        Ok(self.policy.select(&scores))
    }
}

/// Answers with a fixed string and counts calls.
struct FixedResponder {
    name: &'static str,
    answer: String,
    calls: Arc<AtomicUsize>,
}

fn fixed(name: &'static str, answer: &str) -> Box<dyn Responder> {
    Box::new(FixedResponder {
        name,
        answer: answer.to_string(),
        calls: Arc::new(AtomicUsize::new(0)),
    })
}

#[async_trait]
impl Responder for FixedResponder {
    fn name(&self) -> &str {
        self.name
    }

    async fn respond(&mut self, _text: &str) -> Result<String, ResponderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.answer.clone())
    }
}

struct FailingResponder(ResponderError);

#[async_trait]
impl Responder for FailingResponder {
    fn name(&self) -> &str {
        "failing"
    }

    async fn respond(&mut self, _text: &str) -> Result<String, ResponderError> {
        Err(self.0.clone())
    }
}

struct PanickingResponder;

#[async_trait]
impl Responder for PanickingResponder {
    fn name(&self) -> &str {
        "panicking"
    }

    async fn respond(&mut self, _text: &str) -> Result<String, ResponderError> {
        panic!("responder exploded")
    }
}

fn all_responders() -> ResponderRegistry {
    ResponderRegistry::new()
        .with(Label::Transport, fixed("transport", "t-answer"))
        .with(Label::Weather, fixed("weather", "w-answer"))
        .with(Label::Culture, fixed("culture", "c-answer"))
        .with(Label::Leisure, fixed("leisure", "l-answer"))
}

fn dispatcher(model: ScriptedModel, responders: ResponderRegistry) -> Dispatcher<ScriptedModel> {
    Dispatcher::new(
        model,
        ConfidencePolicy::default(),
        KeywordMatcher::default(),
        responders,
    )
}

// ── Label selection ───────────────────────────────────────────────────

#[tokio::test]
async fn confident_request_goes_to_primary_then_secondaries() {
    let model = ScriptedModel::new().script("multi", [0.55, 0.40, 0.03, 0.02]);
    let mut d = dispatcher(model, all_responders());

    let decision = d.decide("multi");
    assert_eq!(decision.labels, vec![Label::Transport, Label::Weather]);
    assert_eq!(decision.source, DecisionSource::Classifier);

    assert_eq!(d.route("multi").await, "[Transport] t-answer\n[Weather] w-answer");
}

#[tokio::test]
async fn secondaries_follow_enumeration_order() {
    let model = ScriptedModel::new().script("ordered", [0.0, 0.05, 0.55, 0.40]);
    let mut d = dispatcher(model, all_responders());
    assert_eq!(d.route("ordered").await, "[Culture] c-answer\n[Leisure] l-answer");

    let model = ScriptedModel::new().script("ordered", [0.36, 0.0, 0.0, 0.64]);
    let mut d = dispatcher(model, all_responders());
    assert_eq!(
        d.decide("ordered").labels,
        vec![Label::Leisure, Label::Transport]
    );
}

#[tokio::test]
async fn thresholds_are_inclusive() {
    let model = ScriptedModel::new().script("edge", [0.15, 0.50, 0.0, 0.35]);
    let mut d = dispatcher(model, all_responders());
    let decision = d.decide("edge");
    assert_eq!(decision.source, DecisionSource::Classifier);
    assert_eq!(decision.labels, vec![Label::Weather, Label::Leisure]);
}

#[tokio::test]
async fn weak_primary_is_overridden_by_keyword() {
    let text = "un concert ce soir";
    let model = ScriptedModel::new().script(text, [0.10, 0.20, 0.40, 0.30]);
    let mut d = dispatcher(model, all_responders());

    let decision = d.decide(text);
    assert_eq!(decision.labels, vec![Label::Leisure]);
    assert_eq!(decision.source, DecisionSource::KeywordFallback);
    assert_eq!(decision.classification.primary, Label::Culture);

    assert_eq!(d.route(text).await, "[Leisure] l-answer");
}

#[tokio::test]
async fn keyword_fallback_drops_secondaries() {
    let text = "prendre le bus";
    let model = ScriptedModel::new().script(text, [0.05, 0.05, 0.45, 0.45]);
    let mut d = dispatcher(model, all_responders());

    let decision = d.decide(text);
    assert_eq!(decision.classification.secondaries, vec![Label::Leisure]);
    assert_eq!(decision.labels, vec![Label::Transport]);
    assert_eq!(d.route(text).await, "[Transport] t-answer");
}

#[tokio::test]
async fn weak_primary_without_keyword_keeps_primary_alone() {
    let text = "bonjour tout le monde";
    let model = ScriptedModel::new().script(text, [0.10, 0.10, 0.45, 0.35]);
    let mut d = dispatcher(model, all_responders());

    let decision = d.decide(text);
    assert_eq!(decision.labels, vec![Label::Culture]);
    assert_eq!(decision.source, DecisionSource::LowConfidence);
    assert_eq!(d.route(text).await, "[Culture] c-answer");
}

#[tokio::test]
async fn overlapping_keywords_resolve_in_label_order() {
    let text = "aller au concert";
    let mut d = dispatcher(ScriptedModel::new(), all_responders());
    let decision = d.decide(text);
    assert_eq!(decision.labels, vec![Label::Transport]);
    assert_eq!(decision.source, DecisionSource::KeywordFallback);
}

#[tokio::test]
async fn inference_failure_degrades_to_uniform_scores() {
    let model = ScriptedModel::new().fail_on("météo à Lille").fail_on("???");
    let mut d = dispatcher(model, all_responders());

    let decision = d.decide("météo à Lille");
    assert_eq!(decision.classification.scores, LabelScores::uniform());
    assert_eq!(decision.labels, vec![Label::Weather]);
    assert_eq!(decision.source, DecisionSource::KeywordFallback);

    assert_eq!(d.route("???").await, "[Transport] t-answer");
}

// ── Dispatch and aggregation ──────────────────────────────────────────

#[tokio::test]
async fn failing_responder_does_not_affect_others() {
    let model = ScriptedModel::new().script("multi", [0.55, 0.40, 0.03, 0.02]);
    let responders = ResponderRegistry::new()
        .with(
            Label::Transport,
            Box::new(FailingResponder(ResponderError::Network("down".into()))),
        )
        .with(Label::Weather, fixed("weather", "w-answer"));
    let mut d = dispatcher(model, responders);

    assert_eq!(
        d.route("multi").await,
        "[Transport] [Erreur] échec de traitement : Network error: down\n\
         [Weather] w-answer"
    );
}

#[tokio::test]
async fn panicking_responder_is_contained() {
    let model = ScriptedModel::new().script("multi", [0.40, 0.55, 0.03, 0.02]);
    let responders = ResponderRegistry::new()
        .with(Label::Transport, fixed("transport", "t-answer"))
        .with(Label::Weather, Box::new(PanickingResponder));
    let mut d = dispatcher(model, responders);

    let answer = d.route("multi").await;
    let blocks: Vec<&str> = answer.lines().collect();
    assert_eq!(blocks.len(), 2);
    assert_eq!(
        blocks[0],
        "[Weather] [Erreur] échec de traitement : panique du service : responder exploded"
    );
    assert_eq!(blocks[1], "[Transport] t-answer");

    // The session keeps working after a panic.
    assert!(d.route("multi").await.ends_with("[Transport] t-answer"));
}

#[tokio::test]
async fn unregistered_labels_are_skipped() {
    let model = ScriptedModel::new().script("multi", [0.55, 0.40, 0.03, 0.02]);
    let responders = ResponderRegistry::new().with(Label::Weather, fixed("weather", "w-answer"));
    let mut d = dispatcher(model, responders);

    assert_eq!(d.route("multi").await, "[Weather] w-answer");
}

#[tokio::test]
async fn no_responder_at_all_yields_notice() {
    let model = ScriptedModel::new().script("solo", [0.90, 0.05, 0.03, 0.02]);
    let responders = ResponderRegistry::new().with(Label::Culture, fixed("culture", "c"));
    let mut d = dispatcher(model, responders);

    assert_eq!(d.route("solo").await, NO_RESPONDER_NOTICE);
}

#[tokio::test]
async fn output_is_never_empty() {
    let mut d = dispatcher(ScriptedModel::new(), all_responders());
    for text in ["", "   ", "…", "météo", "n'importe quoi"] {
        assert!(!d.route(text).await.is_empty(), "empty output for {text:?}");
    }

    let mut bare = dispatcher(ScriptedModel::new(), ResponderRegistry::new());
    assert_eq!(bare.route("").await, NO_RESPONDER_NOTICE);
}

#[tokio::test]
async fn each_selected_responder_is_called_once() {
    let transport_calls = Arc::new(AtomicUsize::new(0));
    let weather_calls = Arc::new(AtomicUsize::new(0));
    let responders = ResponderRegistry::new()
        .with(
            Label::Transport,
            Box::new(FixedResponder {
                name: "transport",
                answer: "t".into(),
                calls: transport_calls.clone(),
            }),
        )
        .with(
            Label::Weather,
            Box::new(FixedResponder {
                name: "weather",
                answer: "w".into(),
                calls: weather_calls.clone(),
            }),
        );
    let model = ScriptedModel::new().script("weather only", [0.05, 0.90, 0.03, 0.02]);
    let classify_calls = model.calls.clone();
    let mut d = dispatcher(model, responders);

    d.route("weather only").await;
    d.route("weather only").await;

    assert_eq!(classify_calls.load(Ordering::SeqCst), 2);
    assert_eq!(weather_calls.load(Ordering::SeqCst), 2);
    assert_eq!(transport_calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn sessions_have_distinct_ids() {
    let a = dispatcher(ScriptedModel::new(), ResponderRegistry::new());
    let b = dispatcher(ScriptedModel::new(), ResponderRegistry::new());
    assert_ne!(a.session_id(), b.session_id());
    assert_eq!(a.registered_labels(), Vec::<Label>::new());
}
