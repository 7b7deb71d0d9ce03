// Cross-cutting prompt fragments. Each service that needs LLM calls defines
// its own prompts.rs alongside it.

/// System prompt for interview-problem generation: JSON only, no prose.
pub const JSON_ONLY_SYSTEM: &str = "You are an experienced technical interviewer \
    who writes realistic interview problems. \
    You MUST respond with valid JSON only. \
    Do NOT include any text outside the JSON object. \
    Do NOT use markdown code fences. \
    Do NOT include explanations or apologies.";
