// Deterministic small-talk responses. No model call.

use crate::conversation::NextAction;

const FAREWELL_WORDS: &[&str] = &["bye", "goodbye", "farewell", "cya", "quit", "exit"];
const FAREWELL_PHRASES: &[&str] = &["see you", "that's all", "that is all", "talk later"];
const THANKS_WORDS: &[&str] = &["thanks", "thank", "thx", "ty", "cheers", "appreciate"];
const HELP_WORDS: &[&str] = &["help", "capabilities", "features", "commands"];
const HELP_PHRASES: &[&str] = &["what can you do", "how does this work", "what do you do"];
const GREETING_WORDS: &[&str] = &["hi", "hello", "hey", "howdy", "greetings", "hiya", "yo"];
const GREETING_PHRASES: &[&str] = &["good morning", "good afternoon", "good evening"];

const CAPABILITIES: &str = "- **CV review**: an ATS compatibility and content assessment with concrete suggestions\n\
    - **Job matching**: open postings ranked against your profile\n\
    - **Application tracking**: where each application stands and what to do next\n\
    - **Cover letters**: a tailored letter for a specific job, or a revision of your draft";

#[derive(Debug, Clone, PartialEq)]
pub struct ChatReply {
    pub reply: String,
    pub next_action: NextAction,
}

impl ChatReply {
    fn waiting(reply: impl Into<String>) -> Self {
        Self {
            reply: reply.into(),
            next_action: NextAction::WaitForUser,
        }
    }
}

/// Pattern checks run farewell → thanks → help → greeting, so "thanks, bye"
/// ends the conversation and "hi, what can you do?" lists capabilities.
pub fn respond(message: &str) -> ChatReply {
    let lower = message.to_lowercase();
    let words: Vec<&str> = lower
        .split(|c: char| !c.is_alphanumeric() && c != '\'')
        .filter(|w| !w.is_empty())
        .collect();
    let matches = |vocab: &[&str], phrases: &[&str]| {
        words.iter().any(|w| vocab.contains(w)) || phrases.iter().any(|p| lower.contains(p))
    };

    if matches(FAREWELL_WORDS, FAREWELL_PHRASES) {
        return ChatReply {
            reply: "Good luck with your search! Come back any time you need a hand.".to_string(),
            next_action: NextAction::End,
        };
    }

    if matches(THANKS_WORDS, &[]) {
        return ChatReply::waiting(
            "You're welcome! Is there anything else I can help you with?",
        );
    }

    if matches(HELP_WORDS, HELP_PHRASES) {
        return ChatReply::waiting(format!(
            "Here's what I can do for you:\n{CAPABILITIES}\n\nJust tell me what you need."
        ));
    }

    if matches(GREETING_WORDS, GREETING_PHRASES) {
        return ChatReply::waiting(
            "Hello! How can I help with your job search today? I can review your CV, \
             find matching jobs, track applications or write a cover letter.",
        );
    }

    ChatReply::waiting(format!(
        "I'm not sure I understood that. I can help with:\n{CAPABILITIES}\n\n\
         Could you tell me which of these you'd like?"
    ))
}
