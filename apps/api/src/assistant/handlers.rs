//! Axum route handlers for the Conversation API.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

use crate::conversation::{ConversationState, NextAction, Role, StateUpdate, TargetJob};
use crate::documents::DocumentStore;
use crate::errors::AppError;
use crate::state::AppState;

// ────────────────────────────────────────────────────────────────────────────
// Request / Response types
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct CreateSessionRequest {
    pub user_id: Uuid,
    pub cv_id: Option<Uuid>,
    pub application_id: Option<Uuid>,
    pub target_job: Option<TargetJob>,
}

#[derive(Debug, Deserialize)]
pub struct SendMessageRequest {
    pub message: String,
    pub cv_id: Option<Uuid>,
    /// A stored posting to target; mutually exclusive with `target_job`.
    pub job_id: Option<Uuid>,
    pub target_job: Option<TargetJob>,
    pub application_id: Option<Uuid>,
}

#[derive(Debug, Serialize)]
pub struct TurnResponse {
    /// Assistant messages produced by this turn, joined.
    pub reply: String,
    pub next_action: NextAction,
    pub state: ConversationState,
}

/// Conversation context a request may attach or switch.
#[derive(Debug, Default)]
struct ContextRefs {
    cv_id: Option<Uuid>,
    job_id: Option<Uuid>,
    target_job: Option<TargetJob>,
    application_id: Option<Uuid>,
}

/// Resolves ids into documents and returns the corresponding whole-value
/// writes. Unknown ids are rejected before the turn runs.
async fn resolve_context(
    documents: &dyn DocumentStore,
    user_id: Uuid,
    refs: ContextRefs,
) -> Result<StateUpdate, AppError> {
    let mut update = StateUpdate::new();

    if let Some(cv_id) = refs.cv_id {
        let cv = documents
            .get_cv(user_id, cv_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("CV {cv_id} not found")))?;
        update = update.cv(Some(cv.id), cv.data);
    }

    match (refs.job_id, refs.target_job) {
        (Some(_), Some(_)) => {
            return Err(AppError::Validation(
                "provide either job_id or target_job, not both".to_string(),
            ))
        }
        (Some(job_id), None) => {
            let job = documents
                .get_job(job_id)
                .await?
                .ok_or_else(|| AppError::NotFound(format!("Job posting {job_id} not found")))?;
            update = update.target_job(job.to_target_job());
        }
        (None, Some(job)) => {
            if job.title.trim().is_empty()
                || job.company.trim().is_empty()
                || job.description.trim().is_empty()
            {
                return Err(AppError::Validation(
                    "target_job requires title, company and description".to_string(),
                ));
            }
            update = update.target_job(job);
        }
        (None, None) => {}
    }

    if let Some(application_id) = refs.application_id {
        documents
            .get_application(user_id, application_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Application {application_id} not found")))?;
        update = update.application_id(application_id);
    }

    Ok(update)
}

/// Results derived from a CV or job that is being swapped out no longer
/// describe the conversation. A new CV clears the analysis and job matches; a
/// new target job clears the cover letter draft.
fn drop_stale_results(current: &ConversationState, mut update: StateUpdate) -> StateUpdate {
    let cv_changed = update.cv_id.is_some_and(|cv_id| cv_id != current.cv_id);
    if cv_changed {
        update.cv_analysis = Some(None);
        update.job_matches = Some(None);
    }

    let job_changed = update
        .target_job
        .as_ref()
        .is_some_and(|job| job.as_ref() != current.target_job.as_ref());
    if job_changed {
        update.cover_letter = Some(None);
    }

    update
}

// ────────────────────────────────────────────────────────────────────────────
// Handlers
// ────────────────────────────────────────────────────────────────────────────

/// POST /api/v1/sessions
///
/// Starts a conversation, optionally with a CV, target job or application
/// already attached. Returns the new state with the welcome message.
pub async fn handle_create_session(
    State(state): State<AppState>,
    Json(request): Json<CreateSessionRequest>,
) -> Result<(StatusCode, Json<ConversationState>), AppError> {
    let context = resolve_context(
        state.agents.documents.as_ref(),
        request.user_id,
        ContextRefs {
            cv_id: request.cv_id,
            job_id: None,
            target_job: request.target_job,
            application_id: request.application_id,
        },
    )
    .await?;

    let session_id = Uuid::new_v4();
    let conversation = state
        .driver
        .start_session(&state.agents, request.user_id, session_id, context)
        .await;
    state.sessions.save(&conversation).await?;

    Ok((StatusCode::CREATED, Json(conversation)))
}

/// GET /api/v1/sessions/:id
pub async fn handle_get_session(
    State(state): State<AppState>,
    Path(session_id): Path<Uuid>,
) -> Result<Json<ConversationState>, AppError> {
    let conversation = state
        .sessions
        .load(session_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Session {session_id} not found")))?;
    Ok(Json(conversation))
}

/// DELETE /api/v1/sessions/:id
pub async fn handle_delete_session(
    State(state): State<AppState>,
    Path(session_id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    let _turn = state.locks.acquire(session_id).await;
    if !state.sessions.delete(session_id).await? {
        return Err(AppError::NotFound(format!("Session {session_id} not found")));
    }
    info!(%session_id, "Session deleted");
    Ok(StatusCode::NO_CONTENT)
}

/// POST /api/v1/sessions/:id/messages
///
/// Runs one turn. Turns on the same session are serialized; the state is
/// loaded, advanced and saved under the session's lock.
pub async fn handle_send_message(
    State(state): State<AppState>,
    Path(session_id): Path<Uuid>,
    Json(request): Json<SendMessageRequest>,
) -> Result<Json<TurnResponse>, AppError> {
    if request.message.trim().is_empty() {
        return Err(AppError::Validation("message cannot be empty".to_string()));
    }

    let _turn = state.locks.acquire(session_id).await;

    let conversation = state
        .sessions
        .load(session_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Session {session_id} not found")))?;

    let context = resolve_context(
        state.agents.documents.as_ref(),
        conversation.user_id,
        ContextRefs {
            cv_id: request.cv_id,
            job_id: request.job_id,
            target_job: request.target_job,
            application_id: request.application_id,
        },
    )
    .await?;
    let context = drop_stale_results(&conversation, context);
    let conversation = conversation.apply(context);

    let before = conversation.messages().len();
    let conversation = state
        .driver
        .run_turn(&state.agents, conversation, request.message.trim())
        .await;
    state.sessions.save(&conversation).await?;

    let reply = conversation.messages()[before..]
        .iter()
        .filter(|m| m.role == Role::Assistant)
        .map(|m| m.content.as_str())
        .collect::<Vec<_>>()
        .join("\n\n");

    Ok(Json(TurnResponse {
        reply,
        next_action: conversation.next_action,
        state: conversation,
    }))
}
