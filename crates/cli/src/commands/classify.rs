//! `urbanroute classify`: Print the routing decision without dispatching.

use urbanroute_classifier::IntentClassifier;
use urbanroute_config::AppConfig;
use urbanroute_core::ResponderRegistry;
use urbanroute_dispatcher::{Dispatcher, RoutingDecision, keyword_matcher, routing_settings};

/// Classify `text` with no responders attached.
pub fn decide(config: &AppConfig, text: &str) -> Result<RoutingDecision, Box<dyn std::error::Error>> {
    let settings = routing_settings(&config.routing);
    let classifier = IntentClassifier::load(&config.checkpoint, settings)?;
    let keywords = keyword_matcher(&config.routing)?;
    let mut dispatcher = Dispatcher::new(
        classifier,
        settings.policy,
        keywords,
        ResponderRegistry::new(),
    );
    Ok(dispatcher.decide(text.trim()))
}

pub fn run(config: &AppConfig, text: &str) -> Result<(), Box<dyn std::error::Error>> {
    let decision = decide(config, text)?;
    println!("{}", serde_json::to_string_pretty(&decision)?);
    Ok(())
}
