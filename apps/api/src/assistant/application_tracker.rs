//! Application Tracker — summarizes where the user's applications stand and
//! what to do next.

use std::fmt::Write as _;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;
use tracing::info;

use crate::assistant::prompts::{TRACKER_PERSONA, TRACKER_PROMPT_TEMPLATE};
use crate::assistant::{handler_failure, truncate_chars, Agent, AgentContext, AgentError};
use crate::conversation::{ConversationState, NextAction, StateUpdate};
use crate::cv::{normalize_cv, scrub_personal_data, CanonicalCv};
use crate::llm_client::generate_within;
use crate::llm_client::prompts::json_system;
use crate::models::application::ApplicationRow;
use crate::schema::{parse_model_output, Fields, Schema, SchemaError};

const NOTES_CHARS: usize = 300;

#[derive(Debug, Clone, PartialEq)]
pub struct TrackerOutput {
    pub summary: String,
    pub next_steps: Vec<String>,
}

impl Schema for TrackerOutput {
    fn from_json(value: &Value) -> Result<Self, SchemaError> {
        let f = Fields::root(value)?;
        Ok(Self {
            summary: f.string("summary")?,
            next_steps: f.string_list("nextSteps")?,
        })
    }
}

fn days_since(then: DateTime<Utc>, now: DateTime<Utc>) -> i64 {
    (now - then).num_days().max(0)
}

fn application_lines(applications: &[ApplicationRow], now: DateTime<Utc>) -> String {
    let mut out = String::new();
    for app in applications {
        let _ = write!(
            out,
            "- {} at {} | status: {}",
            app.job_title, app.company, app.status
        );
        if let Some(applied_at) = app.applied_at {
            let _ = write!(out, " | applied {} days ago", days_since(applied_at, now));
        }
        let _ = write!(
            out,
            " | last update {} days ago",
            days_since(app.updated_at, now)
        );
        if let Some(notes) = app.notes.as_deref().filter(|n| !n.trim().is_empty()) {
            let _ = write!(out, " | notes: {}", truncate_chars(notes.trim(), NOTES_CHARS));
        }
        out.push('\n');
    }
    out
}

/// Notes are free text and may carry contact details; they are scrubbed with
/// the CV's literals when a CV is loaded, and for email/phone shapes always.
pub fn build_tracker_prompt(
    applications: &[ApplicationRow],
    user_request: &str,
    cv: &CanonicalCv,
    now: DateTime<Utc>,
) -> String {
    TRACKER_PROMPT_TEMPLATE
        .replace("{today}", &now.format("%Y-%m-%d").to_string())
        .replace(
            "{applications}",
            &scrub_personal_data(&application_lines(applications, now), cv),
        )
        .replace("{user_request}", user_request)
}

pub fn format_tracking(applications: &[ApplicationRow], output: &TrackerOutput) -> String {
    let mut out = String::from("## Your Applications\n\n");
    for app in applications {
        let _ = writeln!(
            out,
            "- **{}** at {}: {}",
            app.job_title, app.company, app.status
        );
    }
    let _ = writeln!(out, "\n{}", output.summary);
    if !output.next_steps.is_empty() {
        out.push_str("\n**Next steps:**\n");
        for step in &output.next_steps {
            let _ = writeln!(out, "- {step}");
        }
    }
    out.trim_end().to_string()
}

async fn load_applications(
    ctx: &AgentContext,
    state: &ConversationState,
) -> Result<Vec<ApplicationRow>, AgentError> {
    match state.application_id {
        Some(id) => Ok(ctx
            .documents
            .get_application(state.user_id, id)
            .await?
            .into_iter()
            .collect()),
        None => Ok(ctx.documents.list_applications(state.user_id).await?),
    }
}

async fn summarize(
    ctx: &AgentContext,
    applications: &[ApplicationRow],
    user_request: &str,
    cv: &CanonicalCv,
) -> Result<TrackerOutput, AgentError> {
    let prompt = build_tracker_prompt(applications, user_request, cv, Utc::now());
    let system = json_system(TRACKER_PERSONA);
    let raw = generate_within(&ctx.llm, ctx.llm_timeout, &system, &prompt).await?;
    Ok(parse_model_output::<TrackerOutput>(&raw)?)
}

pub struct ApplicationTracker;

#[async_trait]
impl Agent for ApplicationTracker {
    fn name(&self) -> &'static str {
        "application_tracker"
    }

    async fn run(&self, ctx: &AgentContext, state: &ConversationState) -> StateUpdate {
        let applications = match load_applications(ctx, state).await {
            Ok(apps) => apps,
            Err(e) => return handler_failure(self.name(), "loading your applications", &e),
        };

        if applications.is_empty() {
            let reply = if state.has_application_id() {
                "I couldn't find that application. It may have been removed; \
                 ask me about your applications to see everything I'm tracking."
            } else {
                "You don't have any tracked applications yet. Once you apply to a job \
                 I can help you keep an eye on it and plan follow-ups."
            };
            return StateUpdate::new()
                .reply(reply)
                .next_action(NextAction::WaitForUser);
        }

        let user_request = state
            .last_user_message()
            .map(|m| m.content.as_str())
            .unwrap_or("How are my applications going?");
        let cv = state
            .cv_data
            .as_ref()
            .map(normalize_cv)
            .unwrap_or_default();

        match summarize(ctx, &applications, user_request, &cv).await {
            Ok(output) => {
                info!(
                    session_id = %state.session_id,
                    applications = applications.len(),
                    "Applications summarized"
                );
                StateUpdate::new()
                    .reply(format_tracking(&applications, &output))
                    .next_action(NextAction::WaitForUser)
            }
            Err(e) => handler_failure(self.name(), "reviewing your applications", &e),
        }
    }
}
