//! ATS Assessor — scores a CV for applicant-tracking compatibility and
//! content quality.
//!
//! The CV is normalized, rendered without personal data, and the finished
//! prompt is scrubbed once more before it leaves the process. A result only
//! reaches the state after it validates; any failure leaves the previous
//! `cv_analysis` in place.

use std::fmt::Write as _;

use async_trait::async_trait;
use serde_json::Value;
use tracing::info;

use crate::assistant::prompts::{ATS_PERSONA, ATS_PROMPT_TEMPLATE};
use crate::assistant::{handler_failure, truncate_chars, Agent, AgentContext, AgentError};
use crate::conversation::{
    ConversationState, CvAnalysisResult, NextAction, ScoreDetails, StateUpdate, TargetJob,
};
use crate::cv::{normalize_cv, sanitize_cv, scrub_personal_data, CanonicalCv};
use crate::llm_client::generate_within;
use crate::llm_client::prompts::{json_system, PRIVACY_INSTRUCTION};
use crate::schema::{parse_model_output, Fields, Schema, SchemaError};

const JOB_DESCRIPTION_CHARS: usize = 1500;

impl Schema for CvAnalysisResult {
    fn from_json(value: &Value) -> Result<Self, SchemaError> {
        let f = Fields::root(value)?;

        let details = match f.opt_object("details")? {
            Some(d) => Some(ScoreDetails {
                formatting: d.score("formatting")?,
                keywords: d.score("keywords")?,
                experience: d.score("experience")?,
                education: d.score("education")?,
                skills: d.score("skills")?,
            }),
            None => None,
        };

        Ok(Self {
            overall_score: f.score("overallScore")?,
            ats_score: f.score("atsScore")?,
            content_score: f.score("contentScore")?,
            strengths: f.string_list("strengths")?,
            weaknesses: f.string_list("weaknesses")?,
            suggestions: f.string_list("suggestions")?,
            details,
        })
    }
}

/// Builds the assessment prompt. The result carries no literal contact value
/// of `cv`.
pub fn build_ats_prompt(cv: &CanonicalCv, job: Option<&TargetJob>) -> String {
    let job_context = match job {
        Some(job) => format!(
            "\nTARGET ROLE (weigh keyword coverage against it):\n{} at {}\n{}\n",
            job.title,
            job.company,
            truncate_chars(&job.description, JOB_DESCRIPTION_CHARS)
        ),
        None => String::new(),
    };

    let prompt = ATS_PROMPT_TEMPLATE
        .replace("{privacy_instruction}", PRIVACY_INSTRUCTION)
        .replace("{cv_body}", &sanitize_cv(cv))
        .replace("{job_context}", &job_context);

    // Job text and summaries are free-form; sweep the whole prompt again
    scrub_personal_data(&prompt, cv)
}

/// Renders the assessment for the chat.
pub fn format_report(result: &CvAnalysisResult) -> String {
    let mut out = String::from("## CV Analysis\n\n");
    let _ = writeln!(out, "**Overall score:** {}/100", result.overall_score);
    let _ = writeln!(out, "**ATS compatibility:** {}/100", result.ats_score);
    let _ = writeln!(out, "**Content quality:** {}/100", result.content_score);

    if let Some(d) = &result.details {
        let _ = writeln!(
            out,
            "\nFormatting {} · Keywords {} · Experience {} · Education {} · Skills {}",
            d.formatting, d.keywords, d.experience, d.education, d.skills
        );
    }

    for (heading, items) in [
        ("Strengths", &result.strengths),
        ("Areas to improve", &result.weaknesses),
        ("Suggestions", &result.suggestions),
    ] {
        if items.is_empty() {
            continue;
        }
        let _ = writeln!(out, "\n### {heading}");
        for item in items {
            let _ = writeln!(out, "- {item}");
        }
    }

    out.push_str(
        "\nWant me to find jobs that match this profile, or write a cover letter for a specific role?",
    );
    out
}

async fn assess(
    ctx: &AgentContext,
    cv: &CanonicalCv,
    job: Option<&TargetJob>,
) -> Result<CvAnalysisResult, AgentError> {
    let prompt = build_ats_prompt(cv, job);
    let system = json_system(ATS_PERSONA);
    let raw = generate_within(&ctx.llm, ctx.llm_timeout, &system, &prompt).await?;
    Ok(parse_model_output::<CvAnalysisResult>(&raw)?)
}

pub struct AtsAssessor;

#[async_trait]
impl Agent for AtsAssessor {
    fn name(&self) -> &'static str {
        "ats_assessor"
    }

    async fn run(&self, ctx: &AgentContext, state: &ConversationState) -> StateUpdate {
        let Some(raw_cv) = state.cv_data.as_ref().filter(|_| state.has_cv_data()) else {
            return StateUpdate::new()
                .reply(
                    "I don't have a CV to review yet. Upload or select one and I'll take a look.",
                )
                .next_action(NextAction::WaitForUser);
        };

        let cv = normalize_cv(raw_cv);
        match assess(ctx, &cv, state.target_job.as_ref()).await {
            Ok(result) => {
                info!(
                    session_id = %state.session_id,
                    overall = result.overall_score,
                    ats = result.ats_score,
                    "CV assessed"
                );
                StateUpdate::new()
                    .reply(format_report(&result))
                    .cv_analysis(result)
                    .next_action(NextAction::WaitForUser)
            }
            Err(e) => handler_failure(self.name(), "analyzing your CV", &e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assistant::testing::{context, sample_cv, state_with, with_cv, with_job};
    use crate::documents::testing::MemoryDocumentStore;
    use crate::llm_client::testing::{Scripted, ScriptedLlm};
    use serde_json::json;

    const VALID_OUTPUT: &str = r#"Here is my assessment:
    {
        "overallScore": 78,
        "atsScore": 72,
        "contentScore": 81,
        "strengths": ["Quantified latency win"],
        "weaknesses": ["Thin education section"],
        "suggestions": ["Add metrics to the Globex role"],
        "details": {"formatting": 80, "keywords": 65, "experience": 85, "education": 60, "skills": 70}
    }"#;

    fn previous_analysis() -> CvAnalysisResult {
        CvAnalysisResult {
            overall_score: 55,
            ats_score: 50,
            content_score: 60,
            strengths: vec!["earlier".to_string()],
            weaknesses: vec![],
            suggestions: vec![],
            details: None,
        }
    }

    #[test]
    fn test_prompt_contains_no_personal_data() {
        let cv = normalize_cv(&sample_cv());
        let prompt = build_ats_prompt(&cv, None);

        assert!(!prompt.contains("jane.doe@example.com"));
        assert!(!prompt.contains("555"));
        assert!(!prompt.contains("Jane Doe"));
        assert!(!prompt.contains("Jane"));
        assert!(prompt.contains("Email: Available | Format: Valid"));
        assert!(prompt.contains("Phone: Available | Format: Valid"));
        assert!(prompt.contains("Name: Available"));
        assert!(prompt.contains("Senior Backend Engineer at Acme"));
    }

    #[test]
    fn test_prompt_scrubs_contact_data_inside_job_text() {
        let cv = normalize_cv(&sample_cv());
        let mut job = crate::assistant::testing::sample_job();
        job.description = "Referred by Jane Doe (jane.doe@example.com)".to_string();
        let prompt = build_ats_prompt(&cv, Some(&job));
        assert!(!prompt.contains("Jane"));
        assert!(!prompt.contains("jane.doe@example.com"));
        assert!(prompt.contains("TARGET ROLE"));
    }

    #[test]
    fn test_prompt_omits_missing_sections() {
        let cv = normalize_cv(&json!({"name": "Sam Poe", "skills": ["Go"]}));
        let prompt = build_ats_prompt(&cv, None);
        assert!(!prompt.contains("WORK EXPERIENCE"));
        assert!(!prompt.contains("EDUCATION\n"));
        assert!(prompt.contains("SKILLS"));
        assert!(prompt.contains("Email: Not provided"));
    }

    #[test]
    fn test_schema_reports_bad_score_path() {
        let err = crate::schema::validate::<CvAnalysisResult>(&json!({
            "overallScore": 78,
            "atsScore": 120,
            "contentScore": 81,
            "strengths": [],
            "weaknesses": [],
            "suggestions": []
        }))
        .unwrap_err();
        assert_eq!(err.path, "$.atsScore");
    }

    #[test]
    fn test_schema_reports_nested_detail_path() {
        let err = crate::schema::validate::<CvAnalysisResult>(&json!({
            "overallScore": 78, "atsScore": 70, "contentScore": 81,
            "strengths": [], "weaknesses": [], "suggestions": [],
            "details": {"formatting": 80, "keywords": "high", "experience": 1, "education": 1, "skills": 1}
        }))
        .unwrap_err();
        assert_eq!(err.path, "$.details.keywords");
    }

    #[tokio::test]
    async fn test_valid_output_replaces_analysis() {
        let llm = ScriptedLlm::replying(&[VALID_OUTPUT]);
        let ctx = context(llm.clone(), MemoryDocumentStore::default());
        let state = with_cv(state_with("analyze my cv"))
            .apply(StateUpdate::new().cv_analysis(previous_analysis()));

        let update = AtsAssessor.run(&ctx, &state).await;
        let state = state.apply(update);

        let analysis = state.cv_analysis.as_ref().unwrap();
        assert_eq!(analysis.overall_score, 78);
        assert_eq!(analysis.strengths, vec!["Quantified latency win"]);
        assert_eq!(state.next_action, NextAction::WaitForUser);
        let report = &state.last_assistant_message().unwrap().content;
        assert!(report.contains("**Overall score:** 78/100"));
        assert!(report.contains("Add metrics to the Globex role"));
        assert!(!llm.prompts()[0].contains("jane.doe@example.com"));
    }

    #[tokio::test]
    async fn test_malformed_output_keeps_previous_analysis() {
        let llm = ScriptedLlm::replying(&[r#"{"overallScore": "great", "atsScore": 70}"#]);
        let ctx = context(llm, MemoryDocumentStore::default());
        let state = with_cv(state_with("analyze my cv"))
            .apply(StateUpdate::new().cv_analysis(previous_analysis()));

        let update = AtsAssessor.run(&ctx, &state).await;
        let state = state.apply(update);

        assert_eq!(state.next_action, NextAction::Error);
        assert_eq!(state.cv_analysis, Some(previous_analysis()));
        assert_eq!(
            state.error.as_deref(),
            Some("ats_assessor: malformed_model_output")
        );
        assert!(state
            .last_assistant_message()
            .unwrap()
            .content
            .starts_with("I'm sorry"));
    }

    #[tokio::test]
    async fn test_output_without_json_is_an_error() {
        let llm = ScriptedLlm::replying(&["Your CV looks great overall!"]);
        let ctx = context(llm, MemoryDocumentStore::default());
        let state = with_job(with_cv(state_with("analyze my cv")));

        let update = AtsAssessor.run(&ctx, &state).await;
        assert_eq!(update.next_action, Some(NextAction::Error));
        assert!(update.cv_analysis.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_is_an_error() {
        let llm = ScriptedLlm::new();
        llm.push(Scripted::Hang);
        let ctx = context(llm, MemoryDocumentStore::default());
        let state = with_cv(state_with("analyze my cv"));

        let update = AtsAssessor.run(&ctx, &state).await;
        assert_eq!(update.next_action, Some(NextAction::Error));
        assert_eq!(update.error, Some(Some("ats_assessor: llm_timeout".to_string())));
    }

    #[tokio::test]
    async fn test_missing_cv_asks_without_model_call() {
        let llm = ScriptedLlm::new();
        let ctx = context(llm.clone(), MemoryDocumentStore::default());
        let update = AtsAssessor.run(&ctx, &state_with("analyze my cv")).await;
        assert_eq!(update.next_action, Some(NextAction::WaitForUser));
        assert_eq!(llm.calls(), 0);
    }
}
