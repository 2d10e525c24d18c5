//! Conversational assistant: intent orchestration, task handlers, and the
//! driver that runs one turn.
//!
//! Every agent consumes the current `ConversationState` and returns a
//! `StateUpdate`; none of them mutate state directly and none of them return
//! errors to the driver. Failures become assistant messages at each agent's
//! outer boundary.

pub mod application_tracker;
pub mod ats_assessor;
pub mod driver;
pub mod general_chat;
pub mod handlers;
pub mod job_matcher;
pub mod letter_enhancer;
pub mod orchestrator;
pub mod prompts;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;
use tracing::error;

use crate::conversation::{ConversationState, NextAction, StateUpdate};
use crate::documents::DocumentStore;
use crate::errors::AppError;
use crate::llm_client::{LlmError, TextGenerator};
use crate::schema::ModelOutputError;

/// Collaborators shared by every agent for the duration of a turn.
#[derive(Clone)]
pub struct AgentContext {
    pub llm: Arc<dyn TextGenerator>,
    pub documents: Arc<dyn DocumentStore>,
    pub llm_timeout: Duration,
    pub job_match_candidates: i64,
}

#[derive(Debug, Error)]
pub enum AgentError {
    #[error("LLM call failed: {0}")]
    Llm(#[from] LlmError),

    #[error("unusable model output: {0}")]
    Output(#[from] ModelOutputError),

    #[error("document store error: {0}")]
    Store(#[from] AppError),
}

impl AgentError {
    /// Short machine-readable cause recorded in `ConversationState::error`.
    /// The full error only goes to the logs.
    pub fn code(&self) -> &'static str {
        match self {
            AgentError::Llm(LlmError::Timeout(_)) => "llm_timeout",
            AgentError::Llm(_) => "llm_unavailable",
            AgentError::Output(_) => "malformed_model_output",
            AgentError::Store(_) => "document_store_unavailable",
        }
    }
}

#[async_trait]
pub trait Agent: Send + Sync {
    fn name(&self) -> &'static str;

    /// Never fails: every error is converted into a user-facing message.
    async fn run(&self, ctx: &AgentContext, state: &ConversationState) -> StateUpdate;
}

/// Outer-boundary conversion for handlers: log the cause, tell the user
/// something generic, end the turn in `error`. No other field is written, so
/// earlier results in the state stay intact.
pub(crate) fn handler_failure(agent: &str, task: &str, err: &AgentError) -> StateUpdate {
    error!(agent, code = err.code(), "handler failed: {err}");
    StateUpdate::new()
        .reply(format!(
            "I'm sorry, something went wrong while {task}. Nothing was changed; \
             please try again in a moment."
        ))
        .next_action(NextAction::Error)
        .error(format!("{agent}: {}", err.code()))
}

/// Cuts `text` to at most `max_chars` characters on a char boundary.
pub(crate) fn truncate_chars(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => format!("{}…", text[..idx].trim_end()),
        None => text.to_string(),
    }
}
