//! Reasoner: turns the retrieved evidence into a human-readable justification.
//!
//! The prompt is built only from its inputs, so the same request always
//! produces the same prompt; the provider's answer may still vary.
//! Generation is reached through [`TextGenerator`], carried in `AppState`
//! as `Arc<dyn TextGenerator>`.

use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use thiserror::Error;

use crate::llm_client::prompts::{GROUNDING_INSTRUCTION, JSON_ONLY_SYSTEM};
use crate::llm_client::{strip_json_fences, LlmClient, LlmError};
use crate::retrieval::Candidate;

pub mod prompts;

use prompts::{REASON_PROMPT_TEMPLATE, REASON_SYSTEM};

#[derive(Debug, Error)]
pub enum GenerationError {
    #[error("generation provider failed: {0}")]
    Upstream(String),

    #[error("generation request timed out")]
    Timeout,

    #[error("generation provider returned a malformed response: {0}")]
    Malformed(String),

    #[error("generation provider returned an empty reason")]
    EmptyContent,
}

impl From<LlmError> for GenerationError {
    fn from(err: LlmError) -> Self {
        if err.is_timeout() {
            return GenerationError::Timeout;
        }
        match err {
            LlmError::EmptyContent => GenerationError::EmptyContent,
            LlmError::Parse(e) => GenerationError::Malformed(e.to_string()),
            other => GenerationError::Upstream(other.to_string()),
        }
    }
}

#[async_trait]
pub trait TextGenerator: Send + Sync {
    async fn generate(&self, prompt: &str, system: &str) -> Result<String, GenerationError>;
}

#[async_trait]
impl TextGenerator for LlmClient {
    async fn generate(&self, prompt: &str, system: &str) -> Result<String, GenerationError> {
        Ok(self.generate_content(prompt, system).await?)
    }
}

#[derive(Debug, Deserialize)]
struct ReasonReply {
    reason: String,
}

#[derive(Clone)]
pub struct Reasoner {
    generator: Arc<dyn TextGenerator>,
}

impl Reasoner {
    pub fn new(generator: Arc<dyn TextGenerator>) -> Self {
        Self { generator }
    }

    /// Asks the provider why `top` fits `user_input`, given the full ranking.
    pub async fn explain(
        &self,
        user_input: &str,
        top: &Candidate,
        all_candidates: &[Candidate],
    ) -> Result<String, GenerationError> {
        let prompt = build_prompt(user_input, top, all_candidates);
        let system = format!("{REASON_SYSTEM} {JSON_ONLY_SYSTEM}");

        let text = self.generator.generate(&prompt, &system).await?;
        parse_reason(&text)
    }
}

pub fn build_prompt(user_input: &str, top: &Candidate, all_candidates: &[Candidate]) -> String {
    let others: Vec<String> = all_candidates
        .iter()
        .filter(|c| c.code != top.code)
        .map(|c| {
            format!(
                "- Code: {}, Name: {}, Description: {} (similarity {:.3})",
                c.code, c.name, c.description, c.similarity
            )
        })
        .collect();
    let candidates_text = if others.is_empty() {
        "(none)".to_string()
    } else {
        others.join("\n")
    };

    REASON_PROMPT_TEMPLATE
        .replace("{grounding_instruction}", GROUNDING_INSTRUCTION)
        .replace("{top_code}", &top.code)
        .replace("{top_name}", &top.name)
        .replace("{top_description}", &top.description)
        .replace("{candidates_text}", &candidates_text)
        // User text last, so braces in it are never treated as placeholders.
        .replace("{user_input}", user_input)
}

/// Extracts `reason` from the model's JSON reply.
fn parse_reason(text: &str) -> Result<String, GenerationError> {
    let reply: ReasonReply = serde_json::from_str(strip_json_fences(text))
        .map_err(|e| GenerationError::Malformed(e.to_string()))?;

    let reason = reply.reason.trim();
    if reason.is_empty() {
        return Err(GenerationError::EmptyContent);
    }
    Ok(reason.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::StubGenerator;

    fn candidate(code: &str, name: &str, similarity: f32) -> Candidate {
        Candidate {
            code: code.to_string(),
            name: name.to_string(),
            description: format!("{name} duties"),
            similarity,
        }
    }

    #[test]
    fn test_prompt_contains_evidence_and_user_text() {
        let top = candidate("32", "保安職業従事者", 0.91);
        let all = vec![top.clone(), candidate("91", "運搬・清掃・包装等従事者", 0.55)];

        let prompt = build_prompt("消防車に乗って火を消す仕事", &top, &all);

        assert!(prompt.contains("消防車に乗って火を消す仕事"));
        assert!(prompt.contains("Code: 32, Name: 保安職業従事者"));
        assert!(prompt.contains("Code: 91"));
        assert!(prompt.contains("similarity 0.550"));
        assert!(prompt.contains("CRITICAL"));
        assert!(!prompt.contains("{top_code}"));
    }

    #[test]
    fn test_prompt_is_deterministic() {
        let top = candidate("17", "教員", 0.8);
        let all = vec![top.clone(), candidate("16", "看護師", 0.6)];
        assert_eq!(
            build_prompt("塾で数学を教える", &top, &all),
            build_prompt("塾で数学を教える", &top, &all)
        );
    }

    #[test]
    fn test_placeholder_text_in_user_input_is_left_alone() {
        let top = candidate("17", "教員", 0.8);
        let prompt = build_prompt("I type {top_code} all day", &top, &[top.clone()]);
        assert!(prompt.contains("I type {top_code} all day"));
        assert!(prompt.contains("(none)"));
    }

    #[test]
    fn test_parse_reason_handles_fenced_json() {
        let reason = parse_reason("```json\n{\"reason\": \" 消火活動が該当します \"}\n```").unwrap();
        assert_eq!(reason, "消火活動が該当します");
    }

    #[test]
    fn test_parse_reason_rejects_malformed_and_empty() {
        assert!(matches!(
            parse_reason("not json"),
            Err(GenerationError::Malformed(_))
        ));
        assert!(matches!(
            parse_reason(r#"{"reason": "   "}"#),
            Err(GenerationError::EmptyContent)
        ));
    }

    #[tokio::test]
    async fn test_explain_returns_generated_reason() {
        let generator = Arc::new(StubGenerator::replying(r#"{"reason": "Matches firefighting duties."}"#));
        let reasoner = Reasoner::new(generator.clone());
        let top = candidate("32", "Firefighter", 0.9);

        let reason = reasoner.explain("I put out fires", &top, &[top.clone()]).await.unwrap();

        assert_eq!(reason, "Matches firefighting duties.");
        assert!(generator.last_prompt().unwrap().contains("I put out fires"));
    }

    #[tokio::test]
    async fn test_explain_propagates_generation_failure() {
        let reasoner = Reasoner::new(Arc::new(StubGenerator::failing()));
        let top = candidate("32", "Firefighter", 0.9);
        assert!(matches!(
            reasoner.explain("x", &top, &[top.clone()]).await,
            Err(GenerationError::Upstream(_))
        ));
    }
}
