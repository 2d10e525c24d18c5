use std::sync::Arc;

use crate::assistant::driver::Driver;
use crate::assistant::AgentContext;
use crate::session::{SessionLocks, SessionStore};

/// Shared application state injected into all route handlers via Axum extractors.
#[derive(Clone)]
pub struct AppState {
    /// Model client, document store and per-call limits handed to every agent.
    pub agents: AgentContext,
    pub driver: Arc<Driver>,
    /// Redis in production; in-process map when no Redis URL is configured.
    pub sessions: Arc<dyn SessionStore>,
    pub locks: Arc<SessionLocks>,
}
