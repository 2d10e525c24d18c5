// Conversation state threaded through every orchestration step.

pub mod models;
pub mod state;

pub use models::{
    CoverLetterDraft, CvAnalysisResult, Intent, IntentClassification, JobMatch, JobMatchResult,
    Message, NextAction, RequiredData, Role, ScoreDetails, TargetJob,
};
pub use state::{ConversationState, StateUpdate};
