//! Workflow driver — runs one conversational turn.
//!
//! A turn appends the user's message, asks the orchestrator where to go, and
//! dispatches at most one handler when `next_action` names one. After the
//! handler completes the driver pauses for the next user message: neither the
//! orchestrator nor a second handler runs within the same turn.

use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::assistant::application_tracker::ApplicationTracker;
use crate::assistant::ats_assessor::AtsAssessor;
use crate::assistant::job_matcher::JobMatcher;
use crate::assistant::letter_enhancer::LetterEnhancer;
use crate::assistant::orchestrator::Orchestrator;
use crate::assistant::{Agent, AgentContext};
use crate::conversation::{ConversationState, Message, NextAction, StateUpdate};

/// One handler per routable action.
#[derive(Clone)]
pub struct Handlers {
    pub analyze_cv: Arc<dyn Agent>,
    pub find_jobs: Arc<dyn Agent>,
    pub track_application: Arc<dyn Agent>,
    pub enhance_cover_letter: Arc<dyn Agent>,
}

impl Handlers {
    pub fn standard() -> Self {
        Self {
            analyze_cv: Arc::new(AtsAssessor),
            find_jobs: Arc::new(JobMatcher),
            track_application: Arc::new(ApplicationTracker),
            enhance_cover_letter: Arc::new(LetterEnhancer),
        }
    }

    /// `None` for the terminal actions.
    pub fn for_action(&self, action: NextAction) -> Option<&Arc<dyn Agent>> {
        match action {
            NextAction::AnalyzeCv => Some(&self.analyze_cv),
            NextAction::FindJobs => Some(&self.find_jobs),
            NextAction::TrackApplication => Some(&self.track_application),
            NextAction::EnhanceCoverLetter => Some(&self.enhance_cover_letter),
            NextAction::WaitForUser | NextAction::Error | NextAction::End => None,
        }
    }
}

pub struct Driver {
    orchestrator: Arc<dyn Agent>,
    handlers: Handlers,
}

impl Driver {
    pub fn new(handlers: Handlers) -> Self {
        Self {
            orchestrator: Arc::new(Orchestrator),
            handlers,
        }
    }

    /// Fresh state with the orchestrator's welcome message.
    pub async fn start_session(
        &self,
        ctx: &AgentContext,
        user_id: Uuid,
        session_id: Uuid,
        context: StateUpdate,
    ) -> ConversationState {
        let state = ConversationState::new(user_id, session_id).apply(context);
        let update = self.orchestrator.run(ctx, &state).await;
        info!(%session_id, %user_id, "Session started");
        state.apply(update.at(Utc::now()))
    }

    /// Runs a full turn for `user_text` and returns the resulting state.
    /// Never fails: agent errors are already messages in the state.
    pub async fn run_turn(
        &self,
        ctx: &AgentContext,
        state: ConversationState,
        user_text: &str,
    ) -> ConversationState {
        let session_id = state.session_id;
        let mut state = state.apply(
            StateUpdate::new()
                .message(Message::user(user_text))
                .next_action(NextAction::WaitForUser),
        );

        let update = self.orchestrator.run(ctx, &state).await;
        state = state.apply(update);

        let mut handled_by = None;
        if let Some(handler) = self.handlers.for_action(state.next_action) {
            debug!(%session_id, handler = handler.name(), "Dispatching handler");
            let mut update = handler.run(ctx, &state).await;
            match update.next_action {
                None => update.next_action = Some(NextAction::WaitForUser),
                Some(action) if !action.is_terminal() => {
                    warn!(
                        %session_id,
                        handler = handler.name(),
                        ?action,
                        "Handler tried to hand off; pausing for the user instead"
                    );
                    update.next_action = Some(NextAction::WaitForUser);
                }
                Some(_) => {}
            }
            state = state.apply(update);
            handled_by = Some(handler.name());
        }

        info!(
            %session_id,
            handler = handled_by.unwrap_or("none"),
            next_action = ?state.next_action,
            "Turn complete"
        );
        state.apply(StateUpdate::new().at(Utc::now()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assistant::orchestrator::WELCOME_MESSAGE;
    use crate::assistant::testing::{context, sample_cv, CountingAgent};
    use crate::conversation::{CvAnalysisResult, Intent, Role};
    use crate::documents::testing::MemoryDocumentStore;
    use crate::llm_client::testing::{Scripted, ScriptedLlm};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn counting_handlers(counter: &Arc<CountingAgent>) -> Handlers {
        Handlers {
            analyze_cv: counter.clone(),
            find_jobs: counter.clone(),
            track_application: counter.clone(),
            enhance_cover_letter: counter.clone(),
        }
    }

    fn fresh() -> ConversationState {
        ConversationState::new(Uuid::new_v4(), Uuid::new_v4())
    }

    fn classification(intent: &str, confidence: f64, required: &[&str]) -> String {
        serde_json::json!({
            "intent": intent,
            "confidence": confidence,
            "requiredData": required
        })
        .to_string()
    }

    #[tokio::test]
    async fn test_start_session_welcomes_without_model_call() {
        let llm = ScriptedLlm::new();
        let ctx = context(llm.clone(), MemoryDocumentStore::default());
        let driver = Driver::new(Handlers::standard());

        let state = driver
            .start_session(&ctx, Uuid::new_v4(), Uuid::new_v4(), StateUpdate::new())
            .await;

        assert_eq!(state.messages().len(), 1);
        assert_eq!(state.messages()[0].content, WELCOME_MESSAGE);
        assert_eq!(state.next_action, NextAction::WaitForUser);
        assert_eq!(llm.calls(), 0);
    }

    #[tokio::test]
    async fn test_find_jobs_without_cv_never_reaches_matcher() {
        let reply = classification("find_jobs", 0.93, &["cv"]);
        let llm = ScriptedLlm::replying(&[reply.as_str()]);
        let store =
            Arc::new(MemoryDocumentStore::default().with_job("Rust Engineer", "Initech", "Rust"));
        let mut ctx = context(llm.clone(), MemoryDocumentStore::default());
        ctx.documents = store.clone();
        let driver = Driver::new(Handlers::standard());

        let state = driver.run_turn(&ctx, fresh(), "find me jobs").await;

        assert_eq!(state.next_action, NextAction::WaitForUser);
        assert!(state
            .last_assistant_message()
            .unwrap()
            .content
            .contains("Your CV"));
        assert!(state.job_matches.is_none());
        // Only the classifier ran
        assert_eq!(llm.calls(), 1);
        assert_eq!(store.job_listings(), 0);
    }

    #[tokio::test]
    async fn test_cv_dependent_intents_without_cv_invoke_no_handler() {
        for (intent, text) in [
            ("analyze_cv", "analyze my CV"),
            ("enhance_cover_letter", "write a cover letter"),
            ("find_jobs", "find me jobs"),
        ] {
            let reply = classification(intent, 0.9, &["cv"]);
            let llm = ScriptedLlm::replying(&[reply.as_str()]);
            let ctx = context(llm, MemoryDocumentStore::default());
            let counter = Arc::new(CountingAgent::default());
            let driver = Driver::new(counting_handlers(&counter));

            let state = driver.run_turn(&ctx, fresh(), text).await;

            assert_eq!(counter.calls(), 0, "{intent} must not reach a handler");
            assert_eq!(state.next_action, NextAction::WaitForUser);
            assert_eq!(state.current_intent, Intent::parse(intent));
        }
    }

    #[tokio::test]
    async fn test_unrecognizable_message_stays_in_chat() {
        let reply = classification("general_chat", 0.15, &[]);
        let llm = ScriptedLlm::replying(&[reply.as_str()]);
        let ctx = context(llm, MemoryDocumentStore::default());
        let counter = Arc::new(CountingAgent::default());
        let driver = Driver::new(counting_handlers(&counter));

        let state = driver.run_turn(&ctx, fresh(), "zxcv blorp").await;

        assert_eq!(state.current_intent, Some(Intent::GeneralChat));
        assert_eq!(state.next_action, NextAction::WaitForUser);
        assert_eq!(counter.calls(), 0);
        assert_eq!(state.messages().len(), 2);
    }

    #[tokio::test]
    async fn test_routed_turn_runs_exactly_one_handler() {
        let reply = classification("track_application", 0.88, &[]);
        let llm = ScriptedLlm::replying(&[reply.as_str()]);
        let ctx = context(llm, MemoryDocumentStore::default());
        let counter = Arc::new(CountingAgent::default());
        let driver = Driver::new(counting_handlers(&counter));

        let state = driver.run_turn(&ctx, fresh(), "how are my applications?").await;

        assert_eq!(counter.calls(), 1);
        assert_eq!(state.next_action, NextAction::WaitForUser);
        assert_eq!(state.last_assistant_message().unwrap().content, "handled");
    }

    #[tokio::test]
    async fn test_malformed_ats_output_keeps_previous_analysis() {
        let reply = classification("analyze_cv", 0.95, &["cv"]);
        let llm = ScriptedLlm::replying(&[reply.as_str(), "{\"overallScore\": 900}"]);
        let ctx = context(llm, MemoryDocumentStore::default());
        let driver = Driver::new(Handlers::standard());
        let previous = CvAnalysisResult {
            overall_score: 61,
            ats_score: 58,
            content_score: 64,
            strengths: vec!["Clear structure".to_string()],
            weaknesses: vec![],
            suggestions: vec![],
            details: None,
        };
        let state = fresh().apply(
            StateUpdate::new()
                .cv(Some(Uuid::new_v4()), sample_cv())
                .cv_analysis(previous.clone()),
        );

        let state = driver.run_turn(&ctx, state, "analyze my cv again").await;

        assert_eq!(state.next_action, NextAction::Error);
        assert_eq!(state.cv_analysis, Some(previous));
        assert!(state.error.is_some());
    }

    #[tokio::test]
    async fn test_messages_accumulate_across_turns() {
        let chat = classification("general_chat", 0.9, &[]);
        let llm = ScriptedLlm::replying(&[chat.as_str(), chat.as_str()]);
        let ctx = context(llm, MemoryDocumentStore::default());
        let driver = Driver::new(Handlers::standard());

        let state = driver
            .start_session(&ctx, Uuid::new_v4(), Uuid::new_v4(), StateUpdate::new())
            .await;
        let state = driver.run_turn(&ctx, state, "hello").await;
        let state = driver.run_turn(&ctx, state, "what can you do?").await;

        let roles: Vec<Role> = state.messages().iter().map(|m| m.role).collect();
        assert_eq!(
            roles,
            [
                Role::Assistant,
                Role::User,
                Role::Assistant,
                Role::User,
                Role::Assistant
            ]
        );
        assert_eq!(state.messages()[1].content, "hello");
        assert_eq!(state.messages()[3].content, "what can you do?");
    }

    #[tokio::test]
    async fn test_error_from_previous_turn_is_cleared() {
        let chat = classification("general_chat", 0.9, &[]);
        let llm = ScriptedLlm::replying(&[chat.as_str()]);
        let ctx = context(llm, MemoryDocumentStore::default());
        let driver = Driver::new(Handlers::standard());
        let state = fresh().apply(
            StateUpdate::new()
                .error("ats_assessor: llm_timeout")
                .next_action(NextAction::Error),
        );

        let state = driver.run_turn(&ctx, state, "hi").await;

        assert!(state.error.is_none());
        assert_eq!(state.next_action, NextAction::WaitForUser);
    }

    #[tokio::test(start_paused = true)]
    async fn test_classifier_timeout_falls_back_to_chat() {
        let llm = ScriptedLlm::new();
        llm.push(Scripted::Hang);
        let ctx = context(llm, MemoryDocumentStore::default());
        let counter = Arc::new(CountingAgent::default());
        let driver = Driver::new(counting_handlers(&counter));

        let state = driver.run_turn(&ctx, fresh(), "find me jobs").await;

        assert_eq!(state.current_intent, Some(Intent::GeneralChat));
        assert_eq!(state.next_action, NextAction::WaitForUser);
        assert_eq!(counter.calls(), 0);
    }

    /// Handles the request, then asks for another handler.
    #[derive(Default)]
    struct HandoffAgent {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl Agent for HandoffAgent {
        fn name(&self) -> &'static str {
            "handoff"
        }

        async fn run(&self, _ctx: &AgentContext, _state: &ConversationState) -> StateUpdate {
            self.calls.fetch_add(1, Ordering::SeqCst);
            StateUpdate::new()
                .reply("tracked")
                .next_action(NextAction::FindJobs)
        }
    }

    #[tokio::test]
    async fn test_handler_handoff_is_not_followed() {
        let reply = classification("track_application", 0.9, &[]);
        let llm = ScriptedLlm::replying(&[reply.as_str()]);
        let ctx = context(llm.clone(), MemoryDocumentStore::default());
        let handoff = Arc::new(HandoffAgent::default());
        let as_agent: Arc<dyn Agent> = handoff.clone();
        let handlers = Handlers {
            analyze_cv: as_agent.clone(),
            find_jobs: as_agent.clone(),
            track_application: as_agent.clone(),
            enhance_cover_letter: as_agent,
        };
        let driver = Driver::new(handlers);

        let state = driver.run_turn(&ctx, fresh(), "how are my applications").await;

        assert_eq!(handoff.calls.load(Ordering::SeqCst), 1);
        assert_eq!(state.next_action, NextAction::WaitForUser);
        assert_eq!(state.last_assistant_message().unwrap().content, "tracked");
        assert_eq!(llm.calls(), 1);
    }
}
