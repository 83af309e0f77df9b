//! Session construction from configuration.
//!
//! The checkpoint is loaded once into a [`SessionFactory`]; every session
//! (including the one built on reset) shares it and gets a fresh cache and
//! fresh responders.

use std::sync::Arc;
use tracing::{info, info_span};
use urbanroute_classifier::{
    CacheStats, ConfidencePolicy, IntentClassifier, KeywordMatcher, LoadedModel, RoutingSettings,
};
use urbanroute_config::{AppConfig, RoutingConfig};
use urbanroute_core::{Error, Result};

use crate::Dispatcher;

/// Thresholds and cache sizing from the `[routing]` table.
pub fn routing_settings(config: &RoutingConfig) -> RoutingSettings {
    RoutingSettings {
        policy: ConfidencePolicy::new(config.primary_threshold, config.secondary_threshold),
        cache_capacity: config.cache_capacity,
    }
}

/// Keyword matcher with any configured overrides applied.
pub fn keyword_matcher(config: &RoutingConfig) -> Result<KeywordMatcher> {
    let overrides = config.keyword_overrides().map_err(|e| Error::Config {
        message: e.to_string(),
    })?;
    KeywordMatcher::with_overrides(&overrides).map_err(|e| Error::Config {
        message: e.to_string(),
    })
}

/// Holds the loaded model and the configuration sessions are built from.
pub struct SessionFactory {
    model: Arc<LoadedModel>,
    config: AppConfig,
}

impl SessionFactory {
    /// Load the checkpoint named by `config.checkpoint`.
    pub fn load(config: AppConfig) -> Result<Self> {
        let model = LoadedModel::load(&config.checkpoint)?;
        info!(
            checkpoint = %config.checkpoint.display(),
            encoder = model.encoder().kind(),
            dimension = model.dimension(),
            "Intent model loaded"
        );
        Ok(Self::with_model(Arc::new(model), config))
    }

    pub fn with_model(model: Arc<LoadedModel>, config: AppConfig) -> Self {
        Self { model, config }
    }

    pub fn model(&self) -> &Arc<LoadedModel> {
        &self.model
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// A new session: empty cache, fresh responders, new session id.
    pub fn new_session(&self) -> Result<Dispatcher<IntentClassifier>> {
        let routing = &self.config.routing;
        let settings = routing_settings(routing);
        let classifier = IntentClassifier::new(Arc::clone(&self.model), settings);
        let keywords = keyword_matcher(routing)?;
        let responders = urbanroute_responders::build_registry(&self.config)?;

        let dispatcher = Dispatcher::new(classifier, settings.policy, keywords, responders);
        let span = info_span!(
            "session",
            id = %dispatcher.session_id(),
            checkpoint = %self.config.checkpoint.display()
        );
        let dispatcher = dispatcher.with_span(span);
        info!(
            session = %dispatcher.session_id(),
            responders = ?dispatcher.registered_labels(),
            "Session started"
        );
        Ok(dispatcher)
    }
}

impl Dispatcher<IntentClassifier> {
    /// Load the checkpoint and start a session in one step.
    pub fn from_config(config: &AppConfig) -> Result<Self> {
        SessionFactory::load(config.clone())?.new_session()
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.model().cache_stats()
    }
}
