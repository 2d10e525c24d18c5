// Shared prompt fragments. Each agent keeps its own templates in
// assistant::prompts; this file holds the cross-cutting pieces.

/// System prompt fragment that enforces JSON-only output.
pub const JSON_ONLY_SYSTEM: &str = "You are a precise, structured assistant. \
    You MUST respond with valid JSON only. \
    Do NOT include any text outside the JSON object. \
    Do NOT use markdown code fences. \
    Do NOT include explanations or apologies.";

/// Appended to every prompt that carries CV-derived content.
pub const PRIVACY_INSTRUCTION: &str = "\
    Contact details in the CV have been replaced by availability indicators and \
    [redacted] markers. Assess presence and format only. Do NOT guess, invent or \
    ask for the underlying personal data.";

/// Prepends the JSON-only rules to an agent-specific persona.
pub fn json_system(persona: &str) -> String {
    format!("{persona} {JSON_ONLY_SYSTEM}")
}
