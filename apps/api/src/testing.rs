//! Test doubles for the two provider capabilities.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;

use crate::config::{Config, DEFAULT_FALLBACK_REASON};
use crate::embedding::{EmbedTask, Embedder, EmbeddingError};
use crate::reasoning::{GenerationError, TextGenerator};
use crate::taxonomy::{TaxonomyEntry, TaxonomySnapshot};

/// Raw upstream text that must never reach a client.
pub const UPSTREAM_SECRET: &str = "quota exceeded for project secret-project-1234";

enum Behaviour {
    Reply,
    Fail,
    Hang,
}

pub struct StubEmbedder {
    default: Vec<f32>,
    by_text: HashMap<String, Vec<f32>>,
    behaviour: Behaviour,
    calls: AtomicUsize,
}

impl StubEmbedder {
    /// Returns `default` for every text.
    pub fn new(default: Vec<f32>) -> Self {
        Self {
            default,
            by_text: HashMap::new(),
            behaviour: Behaviour::Reply,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn failing() -> Self {
        Self {
            behaviour: Behaviour::Fail,
            ..Self::new(vec![])
        }
    }

    pub fn hanging() -> Self {
        Self {
            behaviour: Behaviour::Hang,
            ..Self::new(vec![])
        }
    }

    pub fn with(mut self, text: &str, vector: Vec<f32>) -> Self {
        self.by_text.insert(text.to_string(), vector);
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Embedder for StubEmbedder {
    async fn embed(&self, text: &str, _task: EmbedTask) -> Result<Vec<f32>, EmbeddingError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match self.behaviour {
            Behaviour::Reply => Ok(self
                .by_text
                .get(text)
                .cloned()
                .unwrap_or_else(|| self.default.clone())),
            Behaviour::Fail => Err(EmbeddingError::Upstream(UPSTREAM_SECRET.to_string())),
            Behaviour::Hang => std::future::pending().await,
        }
    }
}

pub struct StubGenerator {
    reply: String,
    behaviour: Behaviour,
    calls: AtomicUsize,
    last_prompt: Mutex<Option<String>>,
}

impl StubGenerator {
    pub fn replying(reply: &str) -> Self {
        Self {
            reply: reply.to_string(),
            behaviour: Behaviour::Reply,
            calls: AtomicUsize::new(0),
            last_prompt: Mutex::new(None),
        }
    }

    pub fn failing() -> Self {
        Self {
            behaviour: Behaviour::Fail,
            ..Self::replying("")
        }
    }

    pub fn hanging() -> Self {
        Self {
            behaviour: Behaviour::Hang,
            ..Self::replying("")
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn last_prompt(&self) -> Option<String> {
        self.last_prompt.lock().unwrap().clone()
    }
}

#[async_trait]
impl TextGenerator for StubGenerator {
    async fn generate(&self, prompt: &str, _system: &str) -> Result<String, GenerationError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        *self.last_prompt.lock().unwrap() = Some(prompt.to_string());
        match self.behaviour {
            Behaviour::Reply => Ok(self.reply.clone()),
            Behaviour::Fail => Err(GenerationError::Upstream(UPSTREAM_SECRET.to_string())),
            Behaviour::Hang => std::future::pending().await,
        }
    }
}

/// Configuration pointing the provider client at `base_url`, with short
/// deadlines and millisecond backoff.
pub fn test_config(base_url: &str) -> Config {
    Config {
        gemini_api_key: "test-key".to_string(),
        api_base_url: base_url.to_string(),
        embedding_model: "text-embedding-004".to_string(),
        generation_model: "gemini-2.0-flash".to_string(),
        taxonomy_path: None,
        taxonomy_index_path: PathBuf::from("unused-index.json"),
        candidate_count: 5,
        max_input_chars: 500,
        embed_timeout: Duration::from_secs(5),
        generate_timeout: Duration::from_secs(5),
        llm_max_attempts: 3,
        llm_retry_base_delay: Duration::from_millis(1),
        fallback_enabled: true,
        fallback_reason: DEFAULT_FALLBACK_REASON.to_string(),
        cors_allowed_origins: vec![],
        port: 0,
        rust_log: "info".to_string(),
    }
}

pub fn entry(code: &str, name: &str, description: &str, embedding: Vec<f32>) -> TaxonomyEntry {
    TaxonomyEntry {
        code: code.to_string(),
        name: name.to_string(),
        description: description.to_string(),
        embedding,
    }
}

/// Firefighter along the first axis, accountant along the second.
pub fn fire_and_ledger_snapshot() -> TaxonomySnapshot {
    TaxonomySnapshot::new(
        "stub-model",
        vec![
            entry("32", "Firefighter", "firefighter, extinguishes fires", vec![1.0, 0.0, 0.0]),
            entry("25", "Accountant", "accountant, manages ledgers", vec![0.0, 1.0, 0.0]),
        ],
    )
    .unwrap()
}

/// Seven entries, so top-K truncation is observable.
pub fn seven_entry_snapshot() -> TaxonomySnapshot {
    let entries = (0..7)
        .map(|i| {
            let angle = i as f32 * 0.2;
            entry(
                &format!("{}", 10 + i),
                &format!("Occupation {i}"),
                &format!("duties of occupation {i}"),
                vec![angle.cos(), angle.sin()],
            )
        })
        .collect();
    TaxonomySnapshot::new("stub-model", entries).unwrap()
}
