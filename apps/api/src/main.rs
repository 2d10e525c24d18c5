mod assistant;
mod config;
mod conversation;
mod cv;
mod db;
mod documents;
mod errors;
mod llm_client;
mod models;
mod routes;
mod schema;
mod session;
mod state;

use anyhow::Result;
use std::net::SocketAddr;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use std::sync::Arc;

use crate::assistant::driver::{Driver, Handlers};
use crate::assistant::AgentContext;
use crate::config::Config;
use crate::db::create_pool;
use crate::documents::PgDocumentStore;
use crate::llm_client::LlmClient;
use crate::routes::build_router;
use crate::session::{MemorySessionStore, RedisSessionStore, SessionLocks, SessionStore};
use crate::state::AppState;

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration first (fails on missing required env vars)
    let config = Config::from_env()?;

    // Initialize structured logging
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!("{}={}", env!("CARGO_PKG_NAME"), &config.rust_log))
        }))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting Career Assistant API v{}", env!("CARGO_PKG_VERSION"));

    // Initialize PostgreSQL (CVs, job postings, applications)
    let db = create_pool(&config.database_url).await?;
    let documents = Arc::new(PgDocumentStore::new(db));

    // Initialize session storage
    let sessions: Arc<dyn SessionStore> = match &config.redis_url {
        Some(url) => {
            let client = redis::Client::open(url.as_str())?;
            info!("Redis session store initialized (ttl: {}s)", config.session_ttl_secs);
            Arc::new(RedisSessionStore::new(client, config.session_ttl_secs))
        }
        None => {
            warn!("REDIS_URL not set; sessions are kept in memory and lost on restart");
            Arc::new(MemorySessionStore::default())
        }
    };

    // Initialize LLM client
    let llm = Arc::new(LlmClient::new(config.anthropic_api_key.clone()));
    info!(
        "LLM client initialized (model: {}, deadline: {:?})",
        llm_client::MODEL,
        config.llm_timeout
    );

    // Build app state
    let state = AppState {
        agents: AgentContext {
            llm,
            documents,
            llm_timeout: config.llm_timeout,
            job_match_candidates: config.job_match_candidates,
        },
        driver: Arc::new(Driver::new(Handlers::standard())),
        sessions,
        locks: Arc::new(SessionLocks::default()),
    };

    // Build router
    let app = build_router(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive()); // TODO: tighten CORS in production

    let addr: SocketAddr = format!("0.0.0.0:{}", config.port).parse()?;
    info!("Listening on {addr}");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
