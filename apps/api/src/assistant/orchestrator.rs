//! Orchestrator — classifies the latest user message into one intent and
//! decides where the turn goes next.
//!
//! Classification favors availability: output the model gets wrong, or a
//! deadline it misses, degrades to `general_chat` instead of failing the turn.
//! The prerequisite gate then keeps handlers from running without the data
//! they depend on.

use async_trait::async_trait;
use serde_json::Value;
use tracing::{debug, error, info, warn};

use crate::assistant::prompts::{CLASSIFIER_PERSONA, CLASSIFIER_PROMPT_TEMPLATE};
use crate::assistant::{general_chat, Agent, AgentContext};
use crate::conversation::{
    ConversationState, Intent, IntentClassification, NextAction, RequiredData, StateUpdate,
};
use crate::llm_client::prompts::json_system;
use crate::llm_client::{generate_within, LlmError};
use crate::schema::{parse_model_output, Fields, Schema, SchemaError};

pub const WELCOME_MESSAGE: &str = "Hi! I'm your career assistant. I can review your CV for \
    ATS compatibility, find job postings that fit your profile, keep track of your \
    applications, and write or polish cover letters. What would you like to start with?";

const REPHRASE_MESSAGE: &str = "I'm sorry, I couldn't process that just now. \
    Could you rephrase your request or try again in a moment?";

/// Classifications below this confidence are answered as general chat.
const MIN_ROUTING_CONFIDENCE: f64 = 0.4;

/// Message text longer than this is cut before it goes into the prompt.
const MAX_MESSAGE_CHARS: usize = 2000;

/// Boolean view of the state handed to the classifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContextFlags {
    pub has_cv_data: bool,
    pub has_job_context: bool,
    pub has_application_id: bool,
}

impl ContextFlags {
    pub fn of(state: &ConversationState) -> Self {
        Self {
            has_cv_data: state.has_cv_data(),
            has_job_context: state.has_job_context(),
            has_application_id: state.has_application_id(),
        }
    }

    fn has(&self, data: RequiredData) -> bool {
        match data {
            RequiredData::Cv => self.has_cv_data,
            RequiredData::Job => self.has_job_context,
        }
    }
}

impl Schema for IntentClassification {
    fn from_json(value: &Value) -> Result<Self, SchemaError> {
        let f = Fields::root(value)?;

        let raw_intent = f.string("intent")?;
        let intent = Intent::parse(&raw_intent)
            .ok_or_else(|| f.invalid("intent", format!("unknown intent '{raw_intent}'")))?;

        let mut required_data = Vec::new();
        for (i, item) in f.opt_string_list("requiredData")?.iter().enumerate() {
            let data = RequiredData::parse(&item.to_lowercase()).ok_or_else(|| {
                SchemaError::new(
                    format!("{}.requiredData[{i}]", f.path()),
                    format!("expected \"cv\" or \"job\", got '{item}'"),
                )
            })?;
            if !required_data.contains(&data) {
                required_data.push(data);
            }
        }

        Ok(Self {
            intent,
            confidence: f.unit_interval("confidence")?,
            required_data,
        })
    }
}

pub fn build_classifier_prompt(message: &str, flags: ContextFlags) -> String {
    CLASSIFIER_PROMPT_TEMPLATE
        .replace("{has_cv}", yes_no(flags.has_cv_data))
        .replace("{has_job}", yes_no(flags.has_job_context))
        .replace("{has_application}", yes_no(flags.has_application_id))
        .replace(
            "{message}",
            &crate::assistant::truncate_chars(message, MAX_MESSAGE_CHARS),
        )
}

fn yes_no(flag: bool) -> &'static str {
    if flag {
        "yes"
    } else {
        "no"
    }
}

/// Everything the routed intent needs that the state does not have yet.
/// The model's `requiredData` is unioned with the intent's own requirements,
/// so a forgetful classifier cannot open the gate. Chat never needs anything.
pub fn missing_requirements(
    classification: &IntentClassification,
    flags: ContextFlags,
) -> Vec<RequiredData> {
    if classification.intent == Intent::GeneralChat {
        return Vec::new();
    }

    let mut missing = Vec::new();
    let needed = classification
        .intent
        .intrinsic_requirements()
        .iter()
        .chain(classification.required_data.iter());
    for data in needed {
        if !flags.has(*data) && !missing.contains(data) {
            missing.push(*data);
        }
    }
    missing
}

/// Clarifying request naming each missing artifact.
pub fn clarifying_message(intent: Intent, missing: &[RequiredData]) -> String {
    let task = match intent {
        Intent::AnalyzeCv => "review your CV",
        Intent::FindJobs => "find jobs that fit you",
        Intent::TrackApplication => "look at your applications",
        Intent::EnhanceCoverLetter => "write your cover letter",
        Intent::GeneralChat => "help with that",
    };

    let mut lines = vec![format!("Happy to {task}! First I need a bit more from you:")];
    for data in missing {
        lines.push(match data {
            RequiredData::Cv => {
                "- **Your CV**: upload one or select an existing CV for this conversation."
                    .to_string()
            }
            RequiredData::Job => "- **The target job**: share the job title, company and \
                 description (or pick a posting from your matches)."
                .to_string(),
        });
    }
    lines.push("Once that's in place, just ask again.".to_string());
    lines.join("\n")
}

/// Runs the model and validates its answer. Recoverable problems (unusable
/// output, missed deadline) yield the fallback; provider errors propagate.
async fn classify(
    ctx: &AgentContext,
    message: &str,
    flags: ContextFlags,
) -> Result<IntentClassification, LlmError> {
    let prompt = build_classifier_prompt(message, flags);
    let system = json_system(CLASSIFIER_PERSONA);

    let raw = match generate_within(&ctx.llm, ctx.llm_timeout, &system, &prompt).await {
        Ok(raw) => raw,
        Err(LlmError::Timeout(deadline)) => {
            warn!("Intent classification exceeded {deadline:?}, using fallback");
            return Ok(IntentClassification::fallback());
        }
        Err(e) => return Err(e),
    };

    match parse_model_output::<IntentClassification>(&raw) {
        Ok(classification) => Ok(classification),
        Err(e) => {
            warn!("Unusable classifier output ({e}), using fallback");
            Ok(IntentClassification::fallback())
        }
    }
}

pub struct Orchestrator;

#[async_trait]
impl Agent for Orchestrator {
    fn name(&self) -> &'static str {
        "orchestrator"
    }

    async fn run(&self, ctx: &AgentContext, state: &ConversationState) -> StateUpdate {
        let Some(message) = state.last_user_message() else {
            return StateUpdate::new()
                .reply(WELCOME_MESSAGE)
                .next_action(NextAction::WaitForUser);
        };

        let flags = ContextFlags::of(state);
        let mut classification = match classify(ctx, &message.content, flags).await {
            Ok(c) => c,
            Err(e) => {
                error!(session_id = %state.session_id, "Intent classification failed: {e}");
                return StateUpdate::new()
                    .reply(REPHRASE_MESSAGE)
                    .next_action(NextAction::WaitForUser);
            }
        };

        if classification.confidence < MIN_ROUTING_CONFIDENCE
            && classification.intent != Intent::GeneralChat
        {
            debug!(
                "Low confidence {:.2} for {}, answering as general chat",
                classification.confidence,
                classification.intent.as_str()
            );
            classification.intent = Intent::GeneralChat;
            classification.required_data.clear();
        }

        info!(
            session_id = %state.session_id,
            intent = classification.intent.as_str(),
            confidence = classification.confidence,
            "Classified user message"
        );

        let update = StateUpdate::new()
            .intent(classification.intent)
            .clear_error();

        let missing = missing_requirements(&classification, flags);
        if !missing.is_empty() {
            return update
                .reply(clarifying_message(classification.intent, &missing))
                .next_action(NextAction::WaitForUser);
        }

        match NextAction::for_intent(classification.intent) {
            Some(action) => update.next_action(action),
            None => {
                let chat = general_chat::respond(&message.content);
                update.reply(chat.reply).next_action(chat.next_action)
            }
        }
    }
}
