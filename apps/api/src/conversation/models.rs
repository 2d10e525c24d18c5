use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    User,
    Assistant,
    System,
}

/// A single conversation message. Never mutated after it is appended to a state.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Message {
    pub role: Role,
    pub content: String,
    pub timestamp: DateTime<Utc>,
}

impl Message {
    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content)
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self::new(Role::System, content)
    }

    fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
            timestamp: Utc::now(),
        }
    }
}

/// The fixed intent set produced by the orchestrator.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Intent {
    AnalyzeCv,
    FindJobs,
    TrackApplication,
    EnhanceCoverLetter,
    GeneralChat,
}

impl Intent {
    pub const ALL: [Intent; 5] = [
        Intent::AnalyzeCv,
        Intent::FindJobs,
        Intent::TrackApplication,
        Intent::EnhanceCoverLetter,
        Intent::GeneralChat,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Intent::AnalyzeCv => "analyze_cv",
            Intent::FindJobs => "find_jobs",
            Intent::TrackApplication => "track_application",
            Intent::EnhanceCoverLetter => "enhance_cover_letter",
            Intent::GeneralChat => "general_chat",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|i| i.as_str() == value)
    }

    /// Data an intent cannot run without, regardless of what the classifier reports.
    pub fn intrinsic_requirements(&self) -> &'static [RequiredData] {
        match self {
            Intent::AnalyzeCv | Intent::FindJobs => &[RequiredData::Cv],
            Intent::EnhanceCoverLetter => &[RequiredData::Cv, RequiredData::Job],
            Intent::TrackApplication | Intent::GeneralChat => &[],
        }
    }
}

/// Artifacts an intent may depend on.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum RequiredData {
    Cv,
    Job,
}

impl RequiredData {
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "cv" => Some(RequiredData::Cv),
            "job" => Some(RequiredData::Job),
            _ => None,
        }
    }
}

/// Exactly one of these is active on a state at any time.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum NextAction {
    #[default]
    WaitForUser,
    AnalyzeCv,
    FindJobs,
    TrackApplication,
    EnhanceCoverLetter,
    Error,
    End,
}

impl NextAction {
    /// `wait_for_user`, `error` and `end` hand control back to the caller.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            NextAction::WaitForUser | NextAction::Error | NextAction::End
        )
    }

    /// Maps a routed intent to the handler action that serves it.
    /// `general_chat` has no handler: it is answered inline.
    pub fn for_intent(intent: Intent) -> Option<Self> {
        match intent {
            Intent::AnalyzeCv => Some(NextAction::AnalyzeCv),
            Intent::FindJobs => Some(NextAction::FindJobs),
            Intent::TrackApplication => Some(NextAction::TrackApplication),
            Intent::EnhanceCoverLetter => Some(NextAction::EnhanceCoverLetter),
            Intent::GeneralChat => None,
        }
    }
}

/// The job a user is targeting. Supplied by the caller, never generated.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TargetJob {
    pub title: String,
    pub company: String,
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub salary: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remote: Option<bool>,
}

/// Optional per-dimension breakdown of an ATS assessment (each 0–100).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ScoreDetails {
    pub formatting: u8,
    pub keywords: u8,
    pub experience: u8,
    pub education: u8,
    pub skills: u8,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CvAnalysisResult {
    pub overall_score: u8,
    pub ats_score: u8,
    pub content_score: u8,
    pub strengths: Vec<String>,
    pub weaknesses: Vec<String>,
    pub suggestions: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<ScoreDetails>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct JobMatch {
    pub job_id: String,
    pub title: String,
    pub company: String,
    pub match_score: u8,
    pub match_reason: String,
    pub keyword_matches: Vec<String>,
}

/// Ranked matches, best first. Replaced wholesale on every production.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct JobMatchResult {
    pub matches: Vec<JobMatch>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CoverLetterDraft {
    pub content: String,
    pub warnings: Vec<String>,
    pub word_count: usize,
}

/// Transient classifier output. Only `current_intent`/`next_action` derived from
/// it are persisted.
#[derive(Debug, Clone, PartialEq)]
pub struct IntentClassification {
    pub intent: Intent,
    pub confidence: f64,
    pub required_data: Vec<RequiredData>,
}

impl IntentClassification {
    /// Used whenever the classifier output cannot be trusted.
    pub fn fallback() -> Self {
        Self {
            intent: Intent::GeneralChat,
            confidence: 0.5,
            required_data: vec![],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_intent_round_trips_through_wire_names() {
        for intent in Intent::ALL {
            assert_eq!(Intent::parse(intent.as_str()), Some(intent));
        }
        assert_eq!(Intent::parse("book_flight"), None);
    }

    #[test]
    fn test_cover_letter_requires_cv_and_job() {
        let reqs = Intent::EnhanceCoverLetter.intrinsic_requirements();
        assert!(reqs.contains(&RequiredData::Cv));
        assert!(reqs.contains(&RequiredData::Job));
        assert!(Intent::TrackApplication.intrinsic_requirements().is_empty());
    }

    #[test]
    fn test_general_chat_has_no_handler_action() {
        assert_eq!(NextAction::for_intent(Intent::GeneralChat), None);
        assert_eq!(
            NextAction::for_intent(Intent::FindJobs),
            Some(NextAction::FindJobs)
        );
    }

    #[test]
    fn test_terminal_actions() {
        assert!(NextAction::WaitForUser.is_terminal());
        assert!(NextAction::Error.is_terminal());
        assert!(NextAction::End.is_terminal());
        assert!(!NextAction::AnalyzeCv.is_terminal());
    }

    #[test]
    fn test_next_action_serializes_snake_case() {
        let json = serde_json::to_string(&NextAction::WaitForUser).unwrap();
        assert_eq!(json, "\"wait_for_user\"");
    }

    #[test]
    fn test_target_job_accepts_minimal_payload() {
        let json = r#"{"title": "Backend Engineer", "company": "Acme", "description": "Rust"}"#;
        let job: TargetJob = serde_json::from_str(json).unwrap();
        assert_eq!(job.company, "Acme");
        assert!(job.remote.is_none());
    }
}
