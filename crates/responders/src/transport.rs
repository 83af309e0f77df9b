//! Public-transport responder.
//!
//! Itinerary requests ("de Lille à Roubaix") go to the Google Maps Directions
//! API in transit mode; general questions go to the chat model.

use crate::llm::ChatClient;
use async_trait::async_trait;
use regex::Regex;
use serde::Deserialize;
use std::sync::LazyLock;
use std::time::Duration;
use tracing::{debug, info, warn};
use urbanroute_config::TransportConfig;
use urbanroute_core::{Message, Responder, ResponderError};

const CLASSIFY_PROMPT: &str = "Vous êtes un classificateur qui décide si la requête de \
     l'utilisateur est une demande d'itinéraire (« de A à B ») ou une question générale sur \
     les transports.\nRépondez strictement par ITINERARY ou GENERAL.";

const REFORMULATE_PROMPT: &str = "Transformez la phrase de l'utilisateur en une forme exacte \
     « de X à Y ». Si non pertinent, renvoyez une chaîne vide.";

const EXPERT_PROMPT: &str =
    "Vous êtes un expert en transport. Répondez clairement à la question.";

pub const ASK_FOR_ENDPOINTS: &str = "Désolé, je n'ai pas compris d'où à où. Merci d'indiquer \
     votre itinéraire sous la forme « de X à Y ».";

static FROM_TO: LazyLock<Option<Regex>> = LazyLock::new(|| compile(r"(?i)\bde\s+(.+?)\s+à\s+(.+)"));
static PROPER_NOUN: LazyLock<Option<Regex>> =
    LazyLock::new(|| compile(r"\b[A-Z][a-zA-ZÀ-ÖØ-öø-ÿ'\-]+"));
static HTML_TAG: LazyLock<Option<Regex>> = LazyLock::new(|| compile(r"<[^>]+>"));

fn compile(pattern: &str) -> Option<Regex> {
    Regex::new(pattern)
        .map_err(|e| warn!(pattern, error = %e, "Transport pattern rejected"))
        .ok()
}

fn clean_place(s: &str) -> String {
    s.trim().trim_end_matches(['?', '!', '.', ' ']).trim().to_string()
}

/// Origin and destination from "de X à Y", or else the first two
/// capitalized words that don't start the sentence.
pub fn extract_endpoints(text: &str) -> Option<(String, String)> {
    if let Some(caps) = FROM_TO.as_ref().and_then(|re| re.captures(text)) {
        let origin = clean_place(&caps[1]);
        let destination = clean_place(&caps[2]);
        if !origin.is_empty() && !destination.is_empty() {
            return Some((origin, destination));
        }
    }

    let re = PROPER_NOUN.as_ref()?;
    let sentence_start = text.len() - text.trim_start().len();
    let mut names = re
        .find_iter(text)
        .filter(|m| m.start() != sentence_start)
        .map(|m| m.as_str().to_string());
    Some((names.next()?, names.next()?))
}

fn strip_html(s: &str) -> String {
    match HTML_TAG.as_ref() {
        Some(re) => re.replace_all(s, "").into_owned(),
        None => s.to_string(),
    }
}

// --- Directions API wire types ---

#[derive(Debug, Deserialize)]
struct DirectionsResponse {
    status: String,
    #[serde(default)]
    error_message: Option<String>,
    #[serde(default)]
    routes: Vec<Route>,
}

#[derive(Debug, Deserialize)]
struct Route {
    #[serde(default)]
    legs: Vec<Leg>,
}

#[derive(Debug, Deserialize)]
struct Leg {
    duration: TextValue,
    #[serde(default)]
    steps: Vec<Step>,
}

#[derive(Debug, Default, Deserialize)]
struct TextValue {
    #[serde(default)]
    text: String,
}

#[derive(Debug, Deserialize)]
struct Step {
    travel_mode: String,
    #[serde(default)]
    distance: TextValue,
    #[serde(default)]
    duration: TextValue,
    #[serde(default)]
    html_instructions: String,
    transit_details: Option<TransitDetails>,
}

#[derive(Debug, Deserialize)]
struct TransitDetails {
    #[serde(default)]
    line: TransitLine,
    departure_stop: Stop,
    arrival_stop: Stop,
    #[serde(default)]
    departure_time: TextValue,
    #[serde(default)]
    arrival_time: TextValue,
    num_stops: Option<u32>,
}

#[derive(Debug, Default, Deserialize)]
struct TransitLine {
    short_name: Option<String>,
    name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Stop {
    name: String,
}

fn render_step(step: &Step) -> String {
    match (step.travel_mode.as_str(), &step.transit_details) {
        ("WALKING", _) => format!(
            "- À pied : {} ({})",
            step.distance.text, step.duration.text
        ),
        ("TRANSIT", Some(td)) => {
            let line = td
                .line
                .short_name
                .as_deref()
                .or(td.line.name.as_deref())
                .unwrap_or("Ligne");
            let stops = td
                .num_stops
                .map(|n| n.to_string())
                .unwrap_or_else(|| "?".into());
            format!(
                "- {line} ({stops} arrêts) : {} → {} ({}–{})",
                td.departure_stop.name,
                td.arrival_stop.name,
                td.departure_time.text,
                td.arrival_time.text
            )
        }
        (mode, _) => format!(
            "- {mode} : {} ({})",
            strip_html(&step.html_instructions),
            step.duration.text
        ),
    }
}

fn render_routes(origin: &str, destination: &str, departure: &str, routes: &[Route]) -> String {
    let mut lines = vec![format!(
        "Itinéraires de {origin} → {destination} (départ prévu à {departure})"
    )];
    for (idx, route) in routes.iter().enumerate() {
        let Some(leg) = route.legs.first() else {
            continue;
        };
        lines.push(format!(
            "Itinéraire #{} : durée totale {}",
            idx + 1,
            leg.duration.text
        ));
        lines.extend(leg.steps.iter().map(render_step));
    }
    lines.join("\n")
}

pub struct TransportResponder {
    chat: ChatClient,
    model: String,
    http: reqwest::Client,
    directions_url: String,
    maps_api_key: Option<String>,
    language: String,
}

impl TransportResponder {
    pub fn new(
        chat: ChatClient,
        model: impl Into<String>,
        config: &TransportConfig,
    ) -> Result<Self, ResponderError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| ResponderError::Network(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            chat,
            model: model.into(),
            http,
            directions_url: config.directions_url.clone(),
            maps_api_key: config.google_maps_api_key.clone().filter(|k| !k.is_empty()),
            language: config.language.clone(),
        })
    }

    async fn ask(&self, system: &str, text: &str, temperature: Option<f32>) -> Result<String, ResponderError> {
        let messages = [Message::system(system), Message::user(text)];
        self.chat.complete(&self.model, &messages, temperature).await
    }

    async fn is_itinerary(&self, text: &str) -> Result<bool, ResponderError> {
        let kind = self.ask(CLASSIFY_PROMPT, text, Some(0.0)).await?;
        Ok(kind.to_uppercase().starts_with("ITINERARY"))
    }

    /// Query the Directions API. `Ok(Err(msg))` is a provider-side failure to
    /// show the user verbatim.
    async fn directions(
        &self,
        origin: &str,
        destination: &str,
    ) -> Result<Result<Vec<Route>, String>, ResponderError> {
        let key = self.maps_api_key.as_deref().ok_or_else(|| {
            ResponderError::NotConfigured("no Google Maps API key (set GOOGLE_MAPS_API_KEY)".into())
        })?;

        let departure = chrono::Utc::now().timestamp().to_string();
        let sent = self
            .http
            .get(&self.directions_url)
            .query(&[
                ("origin", origin),
                ("destination", destination),
                ("mode", "transit"),
                ("departure_time", departure.as_str()),
                ("alternatives", "true"),
                ("language", self.language.as_str()),
                ("key", key),
            ])
            .send()
            .await;

        let response = match sent {
            Ok(r) => r,
            Err(e) => return Ok(Err(e.to_string())),
        };
        let status = response.status();
        if !status.is_success() {
            return Ok(Err(format!("HTTP {}", status.as_u16())));
        }
        let body: DirectionsResponse = match response.json().await {
            Ok(b) => b,
            Err(e) => return Ok(Err(e.to_string())),
        };

        match body.status.as_str() {
            "OK" | "ZERO_RESULTS" | "NOT_FOUND" => Ok(Ok(body.routes)),
            other => Ok(Err(match body.error_message {
                Some(msg) => format!("{other} ({msg})"),
                None => other.to_string(),
            })),
        }
    }
}

#[async_trait]
impl Responder for TransportResponder {
    fn name(&self) -> &str {
        "transport"
    }

    async fn respond(&mut self, text: &str) -> Result<String, ResponderError> {
        if !self.is_itinerary(text).await? {
            debug!("General transport question");
            return self.ask(EXPERT_PROMPT, text, None).await;
        }

        let endpoints = match extract_endpoints(text) {
            Some(found) => Some(found),
            None => {
                let rephrased = self.ask(REFORMULATE_PROMPT, text, Some(0.0)).await?;
                debug!(rephrased = %rephrased, "Itinerary reformulated");
                extract_endpoints(&rephrased)
            }
        };
        let Some((origin, destination)) = endpoints else {
            return Ok(ASK_FOR_ENDPOINTS.to_string());
        };

        info!(origin = %origin, destination = %destination, "Fetching transit directions");
        let routes = match self.directions(&origin, &destination).await? {
            Ok(routes) => routes,
            Err(message) => return Ok(format!("Erreur API Google Maps : {message}")),
        };

        if routes.is_empty() {
            return Ok(format!(
                "Aucun itinéraire trouvé entre « {origin} » et « {destination} »."
            ));
        }

        let departure = chrono::Local::now().format("%H:%M").to_string();
        Ok(render_routes(&origin, &destination, &departure, &routes))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::serve;
    use axum::Json;
    use axum::extract::Query;
    use axum::routing::{get, post};
    use std::collections::HashMap;
    use urbanroute_config::TransportConfig;

    /// Classifies by keyword, echoes a fixed rephrasing, answers questions.
    async fn fake_llm(Json(body): Json<serde_json::Value>) -> Json<serde_json::Value> {
        let system = body["messages"][0]["content"].as_str().unwrap_or_default();
        let user = body["messages"][1]["content"].as_str().unwrap_or_default();
        let content = if system.starts_with("Vous êtes un classificateur") {
            if user.contains("écologique") { "GENERAL" } else { "itinerary" }.to_string()
        } else if system.starts_with("Transformez") {
            if user.contains("maison") { "de Lille à Lens".to_string() } else { String::new() }
        } else {
            "Le vélo.".to_string()
        };
        Json(serde_json::json!({"choices": [{"message": {"content": content}}]}))
    }

    async fn fake_directions(Query(q): Query<HashMap<String, String>>) -> Json<serde_json::Value> {
        assert_eq!(q.get("mode").map(String::as_str), Some("transit"));
        assert_eq!(q.get("key").map(String::as_str), Some("maps-key"));
        match q.get("destination").map(String::as_str) {
            Some("Roubaix") => Json(serde_json::json!({
                "status": "OK",
                "routes": [{
                    "legs": [{
                        "duration": {"text": "25 min"},
                        "steps": [
                            {"travel_mode": "WALKING", "distance": {"text": "300 m"},
                             "duration": {"text": "4 min"}},
                            {"travel_mode": "TRANSIT", "duration": {"text": "18 min"},
                             "transit_details": {
                                "line": {"short_name": "M2"},
                                "departure_stop": {"name": "Gare Lille Flandres"},
                                "arrival_stop": {"name": "Roubaix Grand Place"},
                                "departure_time": {"text": "10:02"},
                                "arrival_time": {"text": "10:20"},
                                "num_stops": 14}},
                            {"travel_mode": "BICYCLING", "duration": {"text": "3 min"},
                             "html_instructions": "Tourner à <b>droite</b>"}
                        ]
                    }]
                }]
            })),
            Some("Lens") => Json(serde_json::json!({"status": "ZERO_RESULTS", "routes": []})),
            _ => Json(serde_json::json!({
                "status": "REQUEST_DENIED",
                "error_message": "The provided API key is invalid."
            })),
        }
    }

    async fn responder(maps_key: Option<&str>) -> TransportResponder {
        let base = serve(
            axum::Router::new()
                .route("/chat/completions", post(fake_llm))
                .route("/directions", get(fake_directions)),
        )
        .await;
        let chat = ChatClient::new(&base, Some("k".into()), Duration::from_secs(5)).unwrap();
        let config = TransportConfig {
            google_maps_api_key: maps_key.map(String::from),
            directions_url: format!("{base}/directions"),
            ..TransportConfig::default()
        };
        TransportResponder::new(chat, "gpt-4o-mini", &config).unwrap()
    }

    #[test]
    fn endpoints_from_de_a_form() {
        assert_eq!(
            extract_endpoints("Comment aller de Lille à Roubaix ?"),
            Some(("Lille".into(), "Roubaix".into()))
        );
        assert_eq!(
            extract_endpoints("itinéraire de la gare Lille Flandres à l'aéroport de Lesquin"),
            Some(("la gare Lille Flandres".into(), "l'aéroport de Lesquin".into()))
        );
    }

    #[test]
    fn endpoints_from_proper_nouns() {
        assert_eq!(
            extract_endpoints("Je veux aller vers Paris depuis Lille"),
            Some(("Paris".into(), "Lille".into()))
        );
        assert_eq!(extract_endpoints("Je veux aller à Paris"), None);
        assert_eq!(extract_endpoints("un trajet rapide"), None);
    }

    #[test]
    fn html_is_stripped() {
        assert_eq!(strip_html("Prendre <b>à gauche</b>"), "Prendre à gauche");
    }

    #[tokio::test]
    async fn itinerary_is_rendered() {
        let mut transport = responder(Some("maps-key")).await;
        let answer = transport.respond("Comment aller de Lille à Roubaix ?").await.unwrap();

        let lines: Vec<&str> = answer.lines().collect();
        assert!(lines[0].starts_with("Itinéraires de Lille → Roubaix"));
        assert_eq!(lines[1], "Itinéraire #1 : durée totale 25 min");
        assert_eq!(lines[2], "- À pied : 300 m (4 min)");
        assert_eq!(
            lines[3],
            "- M2 (14 arrêts) : Gare Lille Flandres → Roubaix Grand Place (10:02–10:20)"
        );
        assert_eq!(lines[4], "- BICYCLING : Tourner à droite (3 min)");
    }

    #[tokio::test]
    async fn general_question_goes_to_llm() {
        let mut transport = responder(None).await;
        let answer = transport
            .respond("Quel est le moyen de transport le plus écologique ?")
            .await
            .unwrap();
        assert_eq!(answer, "Le vélo.");
    }

    #[tokio::test]
    async fn reformulation_then_no_routes() {
        let mut transport = responder(Some("maps-key")).await;
        let answer = transport.respond("je veux rentrer à la maison").await.unwrap();
        assert_eq!(answer, "Aucun itinéraire trouvé entre « Lille » et « Lens ».");
    }

    #[tokio::test]
    async fn unparseable_itinerary_asks_for_form() {
        let mut transport = responder(Some("maps-key")).await;
        let answer = transport.respond("un trajet rapide svp").await.unwrap();
        assert_eq!(answer, ASK_FOR_ENDPOINTS);
    }

    #[tokio::test]
    async fn api_error_is_shown_inline() {
        let mut transport = responder(Some("maps-key")).await;
        let answer = transport.respond("de Lille à Nulle-Part").await.unwrap();
        assert_eq!(
            answer,
            "Erreur API Google Maps : REQUEST_DENIED (The provided API key is invalid.)"
        );
    }

    #[tokio::test]
    async fn missing_maps_key_is_not_configured() {
        let mut transport = responder(None).await;
        let err = transport.respond("de Lille à Roubaix").await.unwrap_err();
        assert!(matches!(err, ResponderError::NotConfigured(_)));
    }
}
