//! Conversation state and its per-field transition rules.
//!
//! `messages` is the only accumulating field: updates are appended in arrival
//! order. Every other field is replaced wholesale by the latest write. There is
//! no partial merge anywhere (an update to `cv_analysis` carries the entire
//! result, never just `strengths`).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::conversation::models::{
    CoverLetterDraft, CvAnalysisResult, Intent, JobMatchResult, Message, NextAction, Role,
    TargetJob,
};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ConversationState {
    pub user_id: Uuid,
    pub session_id: Uuid,
    messages: Vec<Message>,
    pub current_intent: Option<Intent>,
    pub cv_id: Option<Uuid>,
    /// Raw CV document as supplied by the document store. Normalized on use.
    pub cv_data: Option<Value>,
    pub target_job: Option<TargetJob>,
    pub cv_analysis: Option<CvAnalysisResult>,
    pub job_matches: Option<JobMatchResult>,
    pub application_id: Option<Uuid>,
    pub cover_letter: Option<CoverLetterDraft>,
    pub next_action: NextAction,
    pub error: Option<String>,
    pub timestamp: DateTime<Utc>,
}

impl ConversationState {
    /// Empty state at session start.
    pub fn new(user_id: Uuid, session_id: Uuid) -> Self {
        Self {
            user_id,
            session_id,
            messages: Vec::new(),
            current_intent: None,
            cv_id: None,
            cv_data: None,
            target_job: None,
            cv_analysis: None,
            job_matches: None,
            application_id: None,
            cover_letter: None,
            next_action: NextAction::WaitForUser,
            error: None,
            timestamp: Utc::now(),
        }
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn last_user_message(&self) -> Option<&Message> {
        self.messages.iter().rev().find(|m| m.role == Role::User)
    }

    pub fn last_assistant_message(&self) -> Option<&Message> {
        self.messages.iter().rev().find(|m| m.role == Role::Assistant)
    }

    pub fn has_cv_data(&self) -> bool {
        self.cv_data
            .as_ref()
            .is_some_and(|v| !v.is_null() && v.as_object().map_or(true, |o| !o.is_empty()))
    }

    pub fn has_job_context(&self) -> bool {
        self.target_job.is_some()
    }

    pub fn has_application_id(&self) -> bool {
        self.application_id.is_some()
    }

    /// Combines an update into the state using the field rules. Pure: consumes
    /// the old state and returns the merged one.
    pub fn apply(self, update: StateUpdate) -> Self {
        Self {
            user_id: self.user_id,
            session_id: self.session_id,
            messages: append_messages(self.messages, update.messages),
            current_intent: replace(self.current_intent, update.current_intent),
            cv_id: replace(self.cv_id, update.cv_id),
            cv_data: replace(self.cv_data, update.cv_data),
            target_job: replace(self.target_job, update.target_job),
            cv_analysis: replace(self.cv_analysis, update.cv_analysis),
            job_matches: replace(self.job_matches, update.job_matches),
            application_id: replace(self.application_id, update.application_id),
            cover_letter: replace(self.cover_letter, update.cover_letter),
            next_action: replace(self.next_action, update.next_action),
            error: replace(self.error, update.error),
            timestamp: replace(self.timestamp, update.timestamp),
        }
    }
}

/// Transition for `messages`: concatenation in arrival order.
pub fn append_messages(mut current: Vec<Message>, incoming: Vec<Message>) -> Vec<Message> {
    current.extend(incoming);
    current
}

/// Transition for every other field: the update, when present, wins outright.
pub fn replace<T>(current: T, incoming: Option<T>) -> T {
    incoming.unwrap_or(current)
}

/// A batch of field writes produced by one step.
///
/// For nullable fields the outer `Option` means "write this field" and the inner
/// value is the full replacement (which may itself be `None` to clear it).
#[derive(Debug, Clone, Default)]
pub struct StateUpdate {
    pub messages: Vec<Message>,
    pub current_intent: Option<Option<Intent>>,
    pub cv_id: Option<Option<Uuid>>,
    pub cv_data: Option<Option<Value>>,
    pub target_job: Option<Option<TargetJob>>,
    pub cv_analysis: Option<Option<CvAnalysisResult>>,
    pub job_matches: Option<Option<JobMatchResult>>,
    pub application_id: Option<Option<Uuid>>,
    pub cover_letter: Option<Option<CoverLetterDraft>>,
    pub next_action: Option<NextAction>,
    pub error: Option<Option<String>>,
    pub timestamp: Option<DateTime<Utc>>,
}

impl StateUpdate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn message(mut self, message: Message) -> Self {
        self.messages.push(message);
        self
    }

    pub fn reply(self, content: impl Into<String>) -> Self {
        self.message(Message::assistant(content))
    }

    pub fn intent(mut self, intent: Intent) -> Self {
        self.current_intent = Some(Some(intent));
        self
    }

    pub fn cv(mut self, cv_id: Option<Uuid>, cv_data: Value) -> Self {
        self.cv_id = Some(cv_id);
        self.cv_data = Some(Some(cv_data));
        self
    }

    pub fn target_job(mut self, job: TargetJob) -> Self {
        self.target_job = Some(Some(job));
        self
    }

    pub fn cv_analysis(mut self, analysis: CvAnalysisResult) -> Self {
        self.cv_analysis = Some(Some(analysis));
        self
    }

    pub fn job_matches(mut self, matches: JobMatchResult) -> Self {
        self.job_matches = Some(Some(matches));
        self
    }

    pub fn application_id(mut self, application_id: Uuid) -> Self {
        self.application_id = Some(Some(application_id));
        self
    }

    pub fn cover_letter(mut self, draft: CoverLetterDraft) -> Self {
        self.cover_letter = Some(Some(draft));
        self
    }

    pub fn next_action(mut self, action: NextAction) -> Self {
        self.next_action = Some(action);
        self
    }

    pub fn error(mut self, error: impl Into<String>) -> Self {
        self.error = Some(Some(error.into()));
        self
    }

    pub fn clear_error(mut self) -> Self {
        self.error = Some(None);
        self
    }

    pub fn at(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = Some(timestamp);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::conversation::models::{JobMatch, ScoreDetails};

    fn state() -> ConversationState {
        ConversationState::new(Uuid::new_v4(), Uuid::new_v4())
    }

    fn analysis(score: u8, strengths: &[&str]) -> CvAnalysisResult {
        CvAnalysisResult {
            overall_score: score,
            ats_score: score,
            content_score: score,
            strengths: strengths.iter().map(|s| s.to_string()).collect(),
            weaknesses: vec!["weak".to_string()],
            suggestions: vec![],
            details: None,
        }
    }

    #[test]
    fn test_new_state_is_empty_and_waiting() {
        let s = state();
        assert!(s.messages().is_empty());
        assert_eq!(s.next_action, NextAction::WaitForUser);
        assert!(!s.has_cv_data());
        assert!(!s.has_job_context());
        assert!(!s.has_application_id());
    }

    #[test]
    fn test_messages_accumulate_in_append_order() {
        let mut s = state();
        let contents = ["one", "two", "three", "four", "five"];
        for (i, content) in contents.iter().enumerate() {
            let msg = if i % 2 == 0 {
                Message::user(*content)
            } else {
                Message::assistant(*content)
            };
            s = s.apply(StateUpdate::new().message(msg));
        }
        // Updates that do not carry messages must not disturb them
        s = s.apply(StateUpdate::new().next_action(NextAction::End));

        let seen: Vec<&str> = s.messages().iter().map(|m| m.content.as_str()).collect();
        assert_eq!(seen, contents);
    }

    #[test]
    fn test_batch_update_preserves_batch_order() {
        let s = state().apply(
            StateUpdate::new()
                .message(Message::system("a"))
                .reply("b")
                .reply("c"),
        );
        let seen: Vec<&str> = s.messages().iter().map(|m| m.content.as_str()).collect();
        assert_eq!(seen, ["a", "b", "c"]);
    }

    #[test]
    fn test_cv_analysis_is_replaced_not_merged() {
        let mut first = analysis(40, &["clear layout", "good skills"]);
        first.details = Some(ScoreDetails {
            formatting: 50,
            keywords: 50,
            experience: 50,
            education: 50,
            skills: 50,
        });
        let second = analysis(80, &["quantified impact"]);

        let s = state()
            .apply(StateUpdate::new().cv_analysis(first))
            .apply(StateUpdate::new().cv_analysis(second.clone()));

        assert_eq!(s.cv_analysis, Some(second));
    }

    #[test]
    fn test_job_matches_and_target_job_replaced() {
        let job_a = TargetJob {
            title: "A".into(),
            company: "X".into(),
            description: "first".into(),
            url: Some("https://x.example/a".into()),
            location: None,
            salary: None,
            remote: Some(true),
        };
        let job_b = TargetJob {
            title: "B".into(),
            company: "Y".into(),
            description: "second".into(),
            url: None,
            location: None,
            salary: None,
            remote: None,
        };
        let matches_a = JobMatchResult {
            matches: vec![JobMatch {
                job_id: "1".into(),
                title: "A".into(),
                company: "X".into(),
                match_score: 90,
                match_reason: "r".into(),
                keyword_matches: vec!["rust".into()],
            }],
        };

        let s = state()
            .apply(StateUpdate::new().target_job(job_a).job_matches(matches_a))
            .apply(
                StateUpdate::new()
                    .target_job(job_b.clone())
                    .job_matches(JobMatchResult::default()),
            );

        // No url carried over from the first job
        assert_eq!(s.target_job, Some(job_b));
        assert_eq!(s.job_matches, Some(JobMatchResult::default()));
    }

    #[test]
    fn test_untouched_fields_keep_previous_value() {
        let s = state()
            .apply(StateUpdate::new().cv_analysis(analysis(70, &["x"])))
            .apply(StateUpdate::new().next_action(NextAction::Error).error("boom"));
        assert_eq!(s.cv_analysis, Some(analysis(70, &["x"])));
        assert_eq!(s.error.as_deref(), Some("boom"));
    }

    #[test]
    fn test_error_can_be_cleared() {
        let s = state()
            .apply(StateUpdate::new().error("boom"))
            .apply(StateUpdate::new().clear_error());
        assert!(s.error.is_none());
    }

    #[test]
    fn test_empty_cv_object_is_not_cv_data() {
        let s = state().apply(StateUpdate::new().cv(None, serde_json::json!({})));
        assert!(!s.has_cv_data());
        let s = s.apply(StateUpdate::new().cv(None, serde_json::json!({"name": "A"})));
        assert!(s.has_cv_data());
    }

    #[test]
    fn test_last_user_message_skips_assistant_replies() {
        let s = state().apply(
            StateUpdate::new()
                .message(Message::user("analyze my cv"))
                .reply("sure"),
        );
        assert_eq!(s.last_user_message().unwrap().content, "analyze my cv");
        assert_eq!(s.last_assistant_message().unwrap().content, "sure");
    }

    #[test]
    fn test_state_serializes_camel_case() {
        let value = serde_json::to_value(state()).unwrap();
        assert!(value.get("nextAction").is_some());
        assert!(value.get("cvAnalysis").is_some());
        assert_eq!(value["nextAction"], "wait_for_user");
    }

    #[test]
    fn test_transition_functions_directly() {
        assert_eq!(replace(1, Some(2)), 2);
        assert_eq!(replace(1, None), 1);
        let merged = append_messages(vec![Message::user("a")], vec![Message::user("b")]);
        assert_eq!(merged[1].content, "b");
    }
}
