use crate::config::Config;
use crate::pipeline::Pipeline;

/// Shared application state injected into all route handlers via Axum extractors.
#[derive(Clone)]
pub struct AppState {
    /// Corpus store, generation provider, validator, and run sink, wired once at startup.
    pub pipeline: Pipeline,
    pub config: Config,
}
