//! # urbanroute responders
//!
//! Concrete [`Responder`](urbanroute_core::Responder)s for the four labels:
//!
//! - **transport**: itinerary lookup (Google Maps Directions, transit mode)
//!   or an expert LLM answer for general questions
//! - **weather**: current conditions from Open-Meteo
//! - **culture** / **leisure**: LLM personas that remember the conversation
//!
//! [`build_registry`] wires them up from configuration. Every call builds
//! fresh instances, so a new session never inherits conversation history.

pub mod chat;
pub mod llm;
pub mod transport;
pub mod weather;

pub use chat::ChatResponder;
pub use llm::ChatClient;
pub use transport::TransportResponder;
pub use weather::WeatherResponder;

use tracing::{debug, warn};
use urbanroute_config::AppConfig;
use urbanroute_core::{Label, Responder, ResponderError, ResponderRegistry};

/// Build one fresh responder per enabled label.
pub fn build_registry(config: &AppConfig) -> Result<ResponderRegistry, ResponderError> {
    let chat = ChatClient::from_config(&config.llm)?;
    if !chat.is_configured() {
        warn!("No LLM API key configured; transport, culture and leisure answers will fail");
    }

    let mut registry = ResponderRegistry::new();
    for label in Label::ALL {
        if !config.responders.is_enabled(label) {
            debug!(label = %label, "Responder disabled");
            continue;
        }
        registry.register(label, build_responder(label, config, &chat)?);
    }
    Ok(registry)
}

fn build_responder(
    label: Label,
    config: &AppConfig,
    chat: &ChatClient,
) -> Result<Box<dyn Responder>, ResponderError> {
    let model = config.model_for(label).to_string();
    let responders = &config.responders;

    Ok(match label {
        Label::Transport => Box::new(TransportResponder::new(
            chat.clone(),
            model,
            &responders.transport,
        )?),
        Label::Weather => Box::new(WeatherResponder::new(&responders.weather)?),
        Label::Culture => Box::new(ChatResponder::new(
            label.as_str(),
            chat.clone(),
            model,
            responders
                .culture
                .system_prompt
                .as_deref()
                .unwrap_or(chat::CULTURE_PROMPT),
        )),
        Label::Leisure => Box::new(ChatResponder::new(
            label.as_str(),
            chat.clone(),
            model,
            responders
                .leisure
                .system_prompt
                .as_deref()
                .unwrap_or(chat::LEISURE_PROMPT),
        )),
    })
}
