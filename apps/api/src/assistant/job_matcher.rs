//! Job Matcher — ranks open postings against the user's CV.

use std::fmt::Write as _;

use async_trait::async_trait;
use serde_json::Value;
use tracing::info;

use crate::assistant::prompts::{JOB_MATCH_PERSONA, JOB_MATCH_PROMPT_TEMPLATE};
use crate::assistant::{handler_failure, truncate_chars, Agent, AgentContext, AgentError};
use crate::conversation::{ConversationState, JobMatch, JobMatchResult, NextAction, StateUpdate};
use crate::cv::{normalize_cv, scrub_personal_data, CanonicalCv};
use crate::llm_client::generate_within;
use crate::llm_client::prompts::{json_system, PRIVACY_INSTRUCTION};
use crate::models::job::JobPostingRow;
use crate::schema::{parse_model_output, Fields, ModelOutputError, Schema, SchemaError};

const CANDIDATE_DESCRIPTION_CHARS: usize = 400;
const PROFILE_SKILLS: usize = 25;

/// One ranked posting as the model returns it, before it is tied to a posting.
#[derive(Debug, Clone, PartialEq)]
pub struct RankedPosting {
    pub job_id: String,
    pub match_score: u8,
    pub match_reason: String,
    pub keyword_matches: Vec<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RankingOutput {
    pub matches: Vec<RankedPosting>,
}

impl Schema for RankingOutput {
    fn from_json(value: &Value) -> Result<Self, SchemaError> {
        let f = Fields::root(value)?;
        let matches = f
            .objects("matches")?
            .into_iter()
            .map(|m| -> Result<RankedPosting, SchemaError> {
                Ok(RankedPosting {
                    job_id: m.string("jobId")?,
                    match_score: m.score("matchScore")?,
                    match_reason: m.string("matchReason")?,
                    keyword_matches: m.opt_string_list("keywordMatches")?,
                })
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { matches })
    }
}

/// Ties every ranked entry to a supplied posting and orders best first.
/// An id outside `candidates` fails validation; a repeated id keeps its first
/// entry.
pub fn resolve_matches(
    output: RankingOutput,
    candidates: &[JobPostingRow],
) -> Result<JobMatchResult, SchemaError> {
    let mut matches: Vec<JobMatch> = Vec::with_capacity(output.matches.len());

    for (i, ranked) in output.matches.into_iter().enumerate() {
        let posting = candidates
            .iter()
            .find(|c| c.id.to_string() == ranked.job_id)
            .ok_or_else(|| {
                SchemaError::new(
                    format!("$.matches[{i}].jobId"),
                    format!("'{}' is not one of the supplied postings", ranked.job_id),
                )
            })?;

        if matches.iter().any(|m| m.job_id == ranked.job_id) {
            continue;
        }

        matches.push(JobMatch {
            job_id: ranked.job_id,
            title: posting.title.clone(),
            company: posting.company.clone(),
            match_score: ranked.match_score,
            match_reason: ranked.match_reason,
            keyword_matches: ranked.keyword_matches,
        });
    }

    matches.sort_by(|a, b| b.match_score.cmp(&a.match_score));
    Ok(JobMatchResult { matches })
}

fn profile(cv: &CanonicalCv) -> String {
    let mut out = String::new();
    if let Some(summary) = &cv.summary {
        let _ = writeln!(out, "Summary: {summary}");
    }
    if !cv.experience.is_empty() {
        out.push_str("Experience:\n");
        for item in &cv.experience {
            let title = item.title.as_deref().unwrap_or("Role");
            match &item.company {
                Some(company) => {
                    let _ = writeln!(out, "- {title} at {company}");
                }
                None => {
                    let _ = writeln!(out, "- {title}");
                }
            }
        }
    }
    if !cv.skills.is_empty() {
        let skills: Vec<&str> = cv
            .skills
            .iter()
            .take(PROFILE_SKILLS)
            .map(String::as_str)
            .collect();
        let _ = writeln!(out, "Skills: {}", skills.join(", "));
    }
    if let Some(edu) = cv.most_recent_education() {
        let degree = [edu.degree.as_deref(), edu.field.as_deref()]
            .into_iter()
            .flatten()
            .collect::<Vec<_>>()
            .join(" in ");
        if !degree.is_empty() {
            let _ = writeln!(out, "Education: {degree}");
        }
    }
    out
}

fn candidate_lines(candidates: &[JobPostingRow]) -> String {
    let mut out = String::new();
    for job in candidates {
        let mut facts = Vec::new();
        if let Some(location) = &job.location {
            facts.push(location.clone());
        }
        if job.remote == Some(true) {
            facts.push("remote".to_string());
        }
        let facts = if facts.is_empty() {
            String::new()
        } else {
            format!(" ({})", facts.join(", "))
        };
        let _ = writeln!(
            out,
            "[{}] {} at {}{}: {}",
            job.id,
            job.title,
            job.company,
            facts,
            truncate_chars(&job.description, CANDIDATE_DESCRIPTION_CHARS)
        );
    }
    out
}

/// Only the profile is scrubbed: posting ids are digit-heavy and must reach
/// the model intact.
pub fn build_match_prompt(cv: &CanonicalCv, candidates: &[JobPostingRow]) -> String {
    JOB_MATCH_PROMPT_TEMPLATE
        .replace("{privacy_instruction}", PRIVACY_INSTRUCTION)
        .replace("{profile}", &scrub_personal_data(&profile(cv), cv))
        .replace("{candidates}", &candidate_lines(candidates))
}

pub fn format_matches(result: &JobMatchResult) -> String {
    if result.matches.is_empty() {
        return "I looked through the current openings but none of them is a strong fit for \
                your profile right now. I'll have more to work with as new postings come in; \
                meanwhile, want me to review your CV?"
            .to_string();
    }

    let mut out = String::from("## Jobs that fit your profile\n\n");
    for (i, m) in result.matches.iter().enumerate() {
        let _ = writeln!(
            out,
            "{}. **{}** at {} ({}% match)",
            i + 1,
            m.title,
            m.company,
            m.match_score
        );
        let _ = writeln!(out, "   {}", m.match_reason);
        if !m.keyword_matches.is_empty() {
            let _ = writeln!(out, "   Matching keywords: {}", m.keyword_matches.join(", "));
        }
    }
    out.push_str("\nPick one and I can write a tailored cover letter for it.");
    out
}

async fn rank(
    ctx: &AgentContext,
    cv: &CanonicalCv,
    candidates: &[JobPostingRow],
) -> Result<JobMatchResult, AgentError> {
    let prompt = build_match_prompt(cv, candidates);
    let system = json_system(JOB_MATCH_PERSONA);
    let raw = generate_within(&ctx.llm, ctx.llm_timeout, &system, &prompt).await?;
    let output = parse_model_output::<RankingOutput>(&raw)?;
    Ok(resolve_matches(output, candidates).map_err(ModelOutputError::from)?)
}

pub struct JobMatcher;

#[async_trait]
impl Agent for JobMatcher {
    fn name(&self) -> &'static str {
        "job_matcher"
    }

    async fn run(&self, ctx: &AgentContext, state: &ConversationState) -> StateUpdate {
        let Some(raw_cv) = state.cv_data.as_ref().filter(|_| state.has_cv_data()) else {
            return StateUpdate::new()
                .reply("To find matching jobs I need your CV first. Upload or select one.")
                .next_action(NextAction::WaitForUser);
        };

        let candidates = match ctx.documents.list_open_jobs(ctx.job_match_candidates).await {
            Ok(c) => c,
            Err(e) => {
                return handler_failure(self.name(), "looking up open jobs", &AgentError::from(e))
            }
        };
        if candidates.is_empty() {
            return StateUpdate::new()
                .reply(
                    "There are no open job postings to match against right now. Check back soon!",
                )
                .next_action(NextAction::WaitForUser);
        }

        let cv = normalize_cv(raw_cv);
        match rank(ctx, &cv, &candidates).await {
            Ok(result) => {
                info!(
                    session_id = %state.session_id,
                    candidates = candidates.len(),
                    matches = result.matches.len(),
                    "Jobs matched"
                );
                StateUpdate::new()
                    .reply(format_matches(&result))
                    .job_matches(result)
                    .next_action(NextAction::WaitForUser)
            }
            Err(e) => handler_failure(self.name(), "matching jobs to your profile", &e),
        }
    }
}
