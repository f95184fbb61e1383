//! Core data models used throughout the resolver.
//!
//! These types represent the curated knowledge records, the conversation
//! context supplied by callers, and the attributed result returned for
//! every resolved question.

use serde::{Deserialize, Serialize};

/// One fact unit from a knowledge category file.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct QaEntry {
    pub id: String,
    /// Question phrasings, any of which may match an incoming query.
    #[serde(rename = "question_variants", default)]
    pub variants: Vec<String>,
    pub answer: String,
    #[serde(default)]
    pub keywords: Vec<String>,
    /// Not used for gating.
    #[serde(default = "default_confidence")]
    pub confidence: f64,
    /// Provenance tag such as `"manual"` or `"scraped"`.
    #[serde(default)]
    pub source: String,
}

fn default_confidence() -> f64 {
    1.0
}

/// A named, ordered group of [`QaEntry`] records.
#[derive(Debug, Clone, Serialize)]
pub struct KnowledgeCategory {
    pub id: String,
    pub description: String,
    pub entries: Vec<QaEntry>,
}

/// Who spoke a prior turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Sender {
    User,
    #[serde(alias = "ai", alias = "bot", alias = "model")]
    Assistant,
}

impl Sender {
    pub fn label(&self) -> &'static str {
        match self {
            Sender::User => "User",
            Sender::Assistant => "Assistant",
        }
    }
}

/// A prior turn of the dialogue, owned by the caller.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ConversationTurn {
    pub sender: Sender,
    pub content: String,
}

impl ConversationTurn {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            sender: Sender::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            sender: Sender::Assistant,
            content: content.into(),
        }
    }
}

/// Which resolver tier produced an answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ResolutionSource {
    Cache,
    Identity,
    LocalExact,
    LocalFuzzy,
    /// Domain question with no curated answer; the model is never consulted.
    LocalInsufficient,
    ExternalModel,
    FinalFallback,
    EmergencyError,
}

impl ResolutionSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResolutionSource::Cache => "cache",
            ResolutionSource::Identity => "identity",
            ResolutionSource::LocalExact => "local-exact",
            ResolutionSource::LocalFuzzy => "local-fuzzy",
            ResolutionSource::LocalInsufficient => "local-insufficient",
            ResolutionSource::ExternalModel => "external-model",
            ResolutionSource::FinalFallback => "final-fallback",
            ResolutionSource::EmergencyError => "emergency-error",
        }
    }
}

impl std::fmt::Display for ResolutionSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Per-request progress of the external model tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExternalState {
    NotAsked,
    Asking,
    Answered,
    Rejected,
    Failed,
}

/// Optional diagnostics attached to every result.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ResolutionDebug {
    pub request_id: String,
    pub input_chars: usize,
    pub output_chars: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model_reachable: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model_outcome: Option<ExternalState>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub entry_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub match_score: Option<u32>,
    pub elapsed_ms: u64,
}

/// The value returned to the caller for every accepted question.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResolutionResult {
    pub answer: String,
    pub source: ResolutionSource,
    pub debug: ResolutionDebug,
}
