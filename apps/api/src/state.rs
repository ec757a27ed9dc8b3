use std::sync::Arc;

use crate::config::Config;
use crate::practice::configurator::SessionConfigurator;
use crate::practice::registry::SessionRegistry;
use crate::practice::session::SessionServices;

/// Shared application state injected into all route handlers via Axum extractors.
#[derive(Clone)]
pub struct AppState {
    pub config: Config,
    /// Question deck builder. Backed by the LLM when an API key is configured.
    pub configurator: SessionConfigurator,
    /// Scorer, gateway and capture device handed to every new session.
    pub services: SessionServices,
    pub registry: Arc<SessionRegistry>,
}
