// Prompt constants for the Reasoner.
// Reuses cross-cutting fragments from llm_client::prompts.

/// System prompt for justification. The model explains; it does not choose.
pub const REASON_SYSTEM: &str = "You are an expert in occupational classification. \
    A retrieval system has already selected the occupation that best matches a \
    person's job description. Your task is to explain that selection in one or \
    two concise sentences.";

/// Justification prompt template.
/// Replace: {grounding_instruction}, {user_input}, {top_code}, {top_name},
///          {top_description}, {candidates_text}
pub const REASON_PROMPT_TEMPLATE: &str = r#"{grounding_instruction}

USER DESCRIPTION:
{user_input}

SELECTED OCCUPATION:
- Code: {top_code}, Name: {top_name}, Description: {top_description}

OTHER RANKED CANDIDATES (most similar first):
{candidates_text}

Explain why the selected occupation fits the user's description, pointing to the
duties in its description that match. Write the reason in the same language as
the user's description.

Return a JSON object with this EXACT schema:
{
  "reason": "Why this occupation was selected"
}"#;
