//! Letter Enhancer — writes or revises a cover letter for one CV + job pair.
//!
//! Structure and length are asked of the model; the cliché blocklist is also
//! enforced after validation by re-scanning the content. Findings become
//! warnings, the letter itself is always returned.

use std::fmt::Write as _;

use async_trait::async_trait;
use serde_json::Value;
use tracing::info;

use crate::assistant::prompts::{LETTER_PERSONA, LETTER_PROMPT_TEMPLATE};
use crate::assistant::{handler_failure, truncate_chars, Agent, AgentContext, AgentError};
use crate::conversation::{
    ConversationState, CoverLetterDraft, NextAction, StateUpdate, TargetJob,
};
use crate::cv::{normalize_cv, scrub_personal_data, CanonicalCv};
use crate::llm_client::generate_within;
use crate::llm_client::prompts::{json_system, PRIVACY_INSTRUCTION};
use crate::schema::{parse_model_output, Fields, Schema, SchemaError};

/// Phrases that never belong in a letter. Matched case-insensitively.
pub const BLOCKLIST: &[&str] = &[
    "team player",
    "hard worker",
    "hard-working",
    "think outside the box",
    "go-getter",
    "synergy",
    "detail-oriented",
    "self-starter",
    "passionate about",
    "to whom it may concern",
    "results-driven",
    "fast learner",
    "perfect fit",
    "dear sir or madam",
];

pub const MIN_WORDS: usize = 300;
pub const MAX_WORDS: usize = 400;

const MAX_SKILLS: usize = 15;
const MAX_ACHIEVEMENTS: usize = 4;
const JOB_DESCRIPTION_CHARS: usize = 1500;

const REVISION_WORDS: &[&str] = &[
    "revise", "revision", "rewrite", "edit", "improve", "shorter", "longer", "shorten",
    "tweak", "change", "adjust", "polish", "update", "again",
];

/// Raw model answer before post-processing.
#[derive(Debug, Clone, PartialEq)]
pub struct LetterOutput {
    pub content: String,
    pub warnings: Vec<String>,
}

impl Schema for LetterOutput {
    fn from_json(value: &Value) -> Result<Self, SchemaError> {
        let f = Fields::root(value)?;
        Ok(Self {
            content: f.string("content")?,
            warnings: f.opt_string_list("warnings")?,
        })
    }
}

/// Blocklisted phrases present in `content`, in blocklist order.
pub fn find_cliches(content: &str) -> Vec<&'static str> {
    let lower = content.to_lowercase();
    BLOCKLIST
        .iter()
        .copied()
        .filter(|phrase| lower.contains(phrase))
        .collect()
}

/// Turns validated output into the stored draft: adds a warning for every
/// blocklisted phrase and for a length outside the band.
pub fn finalize_letter(output: LetterOutput) -> CoverLetterDraft {
    let LetterOutput {
        content,
        mut warnings,
    } = output;

    for phrase in find_cliches(&content) {
        let warning = format!("Contains clichéd phrase: \"{phrase}\"");
        if !warnings.contains(&warning) {
            warnings.push(warning);
        }
    }

    let word_count = content.split_whitespace().count();
    if word_count < MIN_WORDS {
        warnings.push(format!(
            "Letter is {word_count} words, below the recommended {MIN_WORDS}-{MAX_WORDS}"
        ));
    } else if word_count > MAX_WORDS {
        warnings.push(format!(
            "Letter is {word_count} words, above the recommended {MIN_WORDS}-{MAX_WORDS}"
        ));
    }

    CoverLetterDraft {
        content,
        warnings,
        word_count,
    }
}

fn wants_revision(message: &str) -> bool {
    let lower = message.to_lowercase();
    lower
        .split(|c: char| !c.is_alphanumeric())
        .any(|w| REVISION_WORDS.contains(&w))
}

fn cv_facts(cv: &CanonicalCv) -> String {
    let mut out = String::new();

    match cv.most_recent_role() {
        Some(role) => {
            let title = role.title.as_deref().unwrap_or("Role");
            match &role.company {
                Some(company) => {
                    let _ = writeln!(out, "Most recent role: {title} at {company}");
                }
                None => {
                    let _ = writeln!(out, "Most recent role: {title}");
                }
            }
            if let Some(desc) = &role.description {
                let _ = writeln!(out, "Role summary: {desc}");
            }
            for achievement in role.achievements.iter().take(MAX_ACHIEVEMENTS) {
                let _ = writeln!(out, "- {achievement}");
            }
        }
        None => out.push_str("Most recent role: not listed\n"),
    }

    if !cv.skills.is_empty() {
        let skills: Vec<&str> = cv.skills.iter().take(MAX_SKILLS).map(String::as_str).collect();
        let _ = writeln!(out, "Skills: {}", skills.join(", "));
    }

    if let Some(edu) = cv.most_recent_education() {
        let degree = match (&edu.degree, &edu.field) {
            (Some(d), Some(f)) => format!("{d} in {f}"),
            (Some(d), None) => d.clone(),
            (None, Some(f)) => f.clone(),
            (None, None) => "Studies".to_string(),
        };
        match &edu.institution {
            Some(inst) => {
                let _ = writeln!(out, "Education: {degree}, {inst}");
            }
            None => {
                let _ = writeln!(out, "Education: {degree}");
            }
        }
    }

    out
}

fn job_facts(job: &TargetJob) -> String {
    let mut out = format!("Title: {}\nCompany: {}\n", job.title, job.company);
    if let Some(location) = &job.location {
        let _ = writeln!(out, "Location: {location}");
    }
    let _ = write!(
        out,
        "Description: {}",
        truncate_chars(&job.description, JOB_DESCRIPTION_CHARS)
    );
    out
}

pub fn build_letter_prompt(
    cv: &CanonicalCv,
    job: &TargetJob,
    user_request: &str,
    previous: Option<&CoverLetterDraft>,
) -> String {
    let previous_draft = match previous {
        Some(draft) => format!(
            "\nCURRENT DRAFT (revise it according to the user request, keep what works):\n{}\n",
            draft.content
        ),
        None => String::new(),
    };
    let blocklist = BLOCKLIST
        .iter()
        .map(|p| format!("- \"{p}\""))
        .collect::<Vec<_>>()
        .join("\n");

    let prompt = LETTER_PROMPT_TEMPLATE
        .replace("{privacy_instruction}", PRIVACY_INSTRUCTION)
        .replace("{cv_facts}", &cv_facts(cv))
        .replace("{job_facts}", &job_facts(job))
        .replace("{previous_draft}", &previous_draft)
        .replace("{user_request}", user_request)
        .replace("{blocklist}", &blocklist);

    scrub_personal_data(&prompt, cv)
}

pub fn format_letter_message(job: &TargetJob, draft: &CoverLetterDraft) -> String {
    let mut out = String::from("## Your Cover Letter\n\n");
    let _ = writeln!(out, "**Position:** {} at {}\n", job.title, job.company);
    let _ = writeln!(out, "{}\n", draft.content.trim());

    if !draft.warnings.is_empty() {
        out.push_str("### Please review\n");
        for warning in &draft.warnings {
            let _ = writeln!(out, "- ⚠️ {warning}");
        }
        out.push('\n');
    }

    out.push_str("**Next steps:**\n");
    out.push_str("- Replace [Your Name] and check every claim against your experience\n");
    out.push_str("- Ask me to make it shorter, more formal, or to stress a different achievement\n\n");
    let _ = write!(out, "Word count: {}", draft.word_count);
    out
}

async fn write_letter(
    ctx: &AgentContext,
    cv: &CanonicalCv,
    job: &TargetJob,
    user_request: &str,
    previous: Option<&CoverLetterDraft>,
) -> Result<CoverLetterDraft, AgentError> {
    let prompt = build_letter_prompt(cv, job, user_request, previous);
    let system = json_system(LETTER_PERSONA);
    let raw = generate_within(&ctx.llm, ctx.llm_timeout, &system, &prompt).await?;
    let output = parse_model_output::<LetterOutput>(&raw)?;
    Ok(finalize_letter(output))
}

pub struct LetterEnhancer;

#[async_trait]
impl Agent for LetterEnhancer {
    fn name(&self) -> &'static str {
        "letter_enhancer"
    }

    async fn run(&self, ctx: &AgentContext, state: &ConversationState) -> StateUpdate {
        // Callable on its own, so the gate is repeated here
        let (Some(raw_cv), Some(job)) = (
            state.cv_data.as_ref().filter(|_| state.has_cv_data()),
            state.target_job.as_ref(),
        ) else {
            return StateUpdate::new()
                .reply(
                    "To write a cover letter I need both your CV and the job you're applying \
                     for (title, company and description). Please share whichever is missing.",
                )
                .next_action(NextAction::WaitForUser);
        };

        let user_request = state
            .last_user_message()
            .map(|m| m.content.as_str())
            .unwrap_or("Write a cover letter for this job.");
        let previous = state
            .cover_letter
            .as_ref()
            .filter(|_| wants_revision(user_request));

        let cv = normalize_cv(raw_cv);
        match write_letter(ctx, &cv, job, user_request, previous).await {
            Ok(draft) => {
                info!(
                    session_id = %state.session_id,
                    words = draft.word_count,
                    warnings = draft.warnings.len(),
                    revision = previous.is_some(),
                    "Cover letter drafted"
                );
                StateUpdate::new()
                    .reply(format_letter_message(job, &draft))
                    .cover_letter(draft)
                    .next_action(NextAction::WaitForUser)
            }
            Err(e) => handler_failure(self.name(), "writing your cover letter", &e),
        }
    }
}
