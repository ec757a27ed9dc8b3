mod config;
mod db;
mod errors;
mod llm_client;
mod practice;
mod routes;
mod state;

use anyhow::Result;
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::{Config, ScorerBackend};
use crate::db::create_pool;
use crate::llm_client::LlmClient;
use crate::practice::analyzer::SessionCompletionAnalyzer;
use crate::practice::configurator::{
    LlmQuestionGenerator, OfflineQuestionGenerator, QuestionGenerator, SessionConfigurator,
};
use crate::practice::gateway::{LogOnlyGateway, PgPracticeGateway, PracticeSessionGateway};
use crate::practice::recording::{CaptureDevice, MediaServerDevice, UnavailableDevice};
use crate::practice::registry::SessionRegistry;
use crate::practice::scoring::{AnswerScorer, HeuristicAnswerScorer, LlmAnswerScorer};
use crate::practice::session::SessionServices;
use crate::routes::build_router;
use crate::state::AppState;

#[tokio::main]
async fn main() -> Result<()> {
    let config = Config::from_env()?;

    // Initialize structured logging
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!(
                "{}={}",
                env!("CARGO_PKG_NAME").replace('-', "_"),
                &config.rust_log
            ))
        }))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting Practice API v{}", env!("CARGO_PKG_VERSION"));

    // LLM client (optional)
    let llm = match &config.anthropic_api_key {
        Some(key) => {
            let client = LlmClient::new(key.clone(), config.question_timeout)?;
            info!("LLM client initialized (model: {})", llm_client::MODEL);
            Some(client)
        }
        None => {
            info!("ANTHROPIC_API_KEY not set; questions come from the local deck");
            None
        }
    };

    let generator: Arc<dyn QuestionGenerator> = match &llm {
        Some(client) => Arc::new(LlmQuestionGenerator(client.clone())),
        None => Arc::new(OfflineQuestionGenerator),
    };

    // Config::from_env guarantees a key when SCORER=llm
    let scorer: Arc<dyn AnswerScorer> = match (config.scorer, &llm) {
        (ScorerBackend::Llm, Some(client)) => Arc::new(LlmAnswerScorer(client.clone())),
        _ => Arc::new(HeuristicAnswerScorer),
    };
    info!("Answer scorer: {}", scorer.backend());

    // Persistence gateway (optional)
    let gateway: Arc<dyn PracticeSessionGateway> = match &config.database_url {
        Some(url) => Arc::new(PgPracticeGateway::new(create_pool(url).await?)),
        None => {
            info!("DATABASE_URL not set; finalized sessions are only logged");
            Arc::new(LogOnlyGateway)
        }
    };

    // Capture device (optional)
    let capture: Arc<dyn CaptureDevice> = match &config.recorder_url {
        Some(url) => {
            info!("Recording via media server at {url}");
            Arc::new(MediaServerDevice::new(url.clone())?)
        }
        None => Arc::new(UnavailableDevice),
    };

    let state = AppState {
        configurator: SessionConfigurator::new(generator, config.question_timeout),
        services: SessionServices {
            analyzer: SessionCompletionAnalyzer::new(scorer),
            gateway,
            capture,
            tick_period: config.tick_interval,
        },
        registry: Arc::new(SessionRegistry::new()),
        config: config.clone(),
    };

    let app = build_router(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    let addr: SocketAddr = format!("0.0.0.0:{}", config.port).parse()?;
    info!("Listening on {addr}");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
