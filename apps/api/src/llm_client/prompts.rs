// Shared prompt fragments.
// Each service that needs LLM calls defines its own prompts.rs alongside it.
// This file contains cross-cutting fragments.

/// System prompt fragment that enforces JSON-only output.
pub const JSON_ONLY_SYSTEM: &str = "You MUST respond with valid JSON only. \
    Do NOT include any text outside the JSON object. \
    Do NOT use markdown code fences. \
    Do NOT include explanations or apologies outside the requested fields.";

/// Keeps generated text tied to the retrieved evidence.
pub const GROUNDING_INSTRUCTION: &str = "\
    CRITICAL: Base your answer only on the user's description and the occupation \
    entries listed below. Do NOT invent occupation codes, names, or duties that \
    are not present in those entries.";
