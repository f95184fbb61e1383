//! External generative model tier.
//!
//! Defines the [`GenerativeModel`] seam and its implementations:
//! - **[`DisabledModel`]**: always fails; used when no provider is configured.
//! - **[`GeminiModel`]**: calls the Gemini `generateContent` REST API.
//!
//! [`ExternalResolver`] owns the prompt (fixed persona, a window of prior
//! turns, the question), invokes the model once, and validates the output.
//!
//! # Outcomes
//!
//! ```text
//! NotAsked ──▶ Asking ──┬──▶ Answered
//!                       ├──▶ Rejected   (empty / too short / generic apology)
//!                       └──▶ Failed     (transport, auth, API error)
//! ```
//!
//! Rejected and Failed both send the resolver to its static fallback.
//! There is no retry and no timeout beyond the HTTP client's own.

use anyhow::{bail, Result};
use async_trait::async_trait;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;

use crate::config::ModelConfig;
use crate::models::{ConversationTurn, ExternalState};

/// Fixed persona prepended to every prompt.
pub const SYSTEM_PERSONA: &str = "أنت SyriaGPT، مساعد ذكي تابع لوكالة نظم المعلومات السورية. \
أجب بلغة السؤال، وبإيجاز ووضوح. لا تخترع معلومات، وإذا لم تكن متأكداً فقل ذلك صراحة. \
You are SyriaGPT: answer in the user's language, concisely, without inventing facts.";

const APOLOGY_MARKERS: &[&str] = &[
    "عذراً",
    "عذرا",
    "آسف",
    "اسف",
    "لا أستطيع",
    "لا استطيع",
    "لا يمكنني",
    "sorry",
    "i cannot",
    "i can't",
    "unable to",
    "as an ai",
];

/// Sampling parameters sent with every request.
#[derive(Debug, Clone)]
pub struct GenerationParams {
    pub temperature: f32,
    pub top_p: f32,
    pub top_k: u32,
    pub max_output_tokens: u32,
}

impl From<&ModelConfig> for GenerationParams {
    fn from(c: &ModelConfig) -> Self {
        Self {
            temperature: c.temperature,
            top_p: c.top_p,
            top_k: c.top_k,
            max_output_tokens: c.max_output_tokens,
        }
    }
}

impl Default for GenerationParams {
    fn default() -> Self {
        GenerationParams::from(&ModelConfig::default())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ModelError {
    #[error("authorization failed: {0}")]
    Unauthorized(String),

    #[error("transport error: {0}")]
    Transport(String),

    #[error("API error {status}: {message}")]
    Api { status: u16, message: String },

    #[error("invalid response: {0}")]
    InvalidResponse(String),

    #[error("external model is disabled")]
    Disabled,
}

impl ModelError {
    pub fn is_auth(&self) -> bool {
        matches!(self, ModelError::Unauthorized(_))
    }

    /// Whether the provider answered at all (auth and API errors count).
    pub fn reached_provider(&self) -> bool {
        matches!(
            self,
            ModelError::Unauthorized(_) | ModelError::Api { .. } | ModelError::InvalidResponse(_)
        )
    }
}

/// A text-in, text-out generative model.
#[async_trait]
pub trait GenerativeModel: Send + Sync {
    /// Identifier used in logs (e.g. `"gemini-1.5-flash"`).
    fn name(&self) -> &str;

    async fn generate(&self, prompt: &str, params: &GenerationParams)
        -> Result<String, ModelError>;
}

// ============ Disabled ============

pub struct DisabledModel;

#[async_trait]
impl GenerativeModel for DisabledModel {
    fn name(&self) -> &str {
        "disabled"
    }

    async fn generate(&self, _prompt: &str, _params: &GenerationParams) -> Result<String, ModelError> {
        Err(ModelError::Disabled)
    }
}

// ============ Gemini ============

/// Gemini REST client.
///
/// Sends `POST {endpoint}/models/{model}:generateContent` with the API key
/// in the `x-goog-api-key` header and extracts the first candidate's text.
pub struct GeminiModel {
    endpoint: String,
    model: String,
    api_key: String,
    client: reqwest::Client,
}

impl GeminiModel {
    pub fn new(endpoint: &str, model: &str, api_key: &str, timeout_secs: u64) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()?;
        Ok(Self {
            endpoint: endpoint.trim_end_matches('/').to_string(),
            model: model.to_string(),
            api_key: api_key.to_string(),
            client,
        })
    }

    /// Build from config, reading the key from `api_key_env`.
    pub fn from_config(config: &ModelConfig) -> Result<Self> {
        let api_key = std::env::var(&config.api_key_env)
            .map_err(|_| anyhow::anyhow!("{} environment variable not set", config.api_key_env))?;
        Self::new(&config.endpoint, &config.model, &api_key, config.timeout_secs)
    }

    fn request_body(prompt: &str, params: &GenerationParams) -> Value {
        json!({
            "contents": [{ "role": "user", "parts": [{ "text": prompt }] }],
            "generationConfig": {
                "temperature": params.temperature,
                "topP": params.top_p,
                "topK": params.top_k,
                "maxOutputTokens": params.max_output_tokens,
            }
        })
    }
}

fn api_error_message(body: &str) -> String {
    serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|v| v["error"]["message"].as_str().map(str::to_string))
        .unwrap_or_else(|| body.chars().take(200).collect())
}

/// Pull the concatenated text parts of the first candidate.
pub fn parse_gemini_response(json: &Value) -> Result<String, ModelError> {
    if let Some(err) = json.get("error") {
        let message = err["message"].as_str().unwrap_or("unknown error").to_string();
        return Err(ModelError::Api {
            status: err["code"].as_u64().unwrap_or(0) as u16,
            message,
        });
    }

    let parts = json["candidates"][0]["content"]["parts"]
        .as_array()
        .ok_or_else(|| ModelError::InvalidResponse("missing candidates[0].content.parts".into()))?;

    Ok(parts
        .iter()
        .filter_map(|p| p["text"].as_str())
        .collect::<Vec<_>>()
        .join(""))
}

#[async_trait]
impl GenerativeModel for GeminiModel {
    fn name(&self) -> &str {
        &self.model
    }

    async fn generate(&self, prompt: &str, params: &GenerationParams) -> Result<String, ModelError> {
        let url = format!("{}/models/{}:generateContent", self.endpoint, self.model);

        let response = self
            .client
            .post(&url)
            .header("x-goog-api-key", &self.api_key)
            .header("Content-Type", "application/json")
            .json(&Self::request_body(prompt, params))
            .send()
            .await
            .map_err(|e| ModelError::Transport(e.to_string()))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| ModelError::Transport(e.to_string()))?;

        if status.as_u16() == 401 || status.as_u16() == 403 {
            return Err(ModelError::Unauthorized(api_error_message(&body)));
        }
        if !status.is_success() {
            let message = api_error_message(&body);
            // Gemini reports a bad key as 400 INVALID_ARGUMENT
            if message.contains("API key") || body.contains("API_KEY_INVALID") {
                return Err(ModelError::Unauthorized(message));
            }
            return Err(ModelError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let json: Value =
            serde_json::from_str(&body).map_err(|e| ModelError::InvalidResponse(e.to_string()))?;
        parse_gemini_response(&json)
    }
}

/// Create the configured [`GenerativeModel`].
///
/// | Config Value | Model |
/// |-------------|-------|
/// | `"disabled"` | [`DisabledModel`] |
/// | `"gemini"` | [`GeminiModel`] |
pub fn create_model(config: &ModelConfig) -> Result<Arc<dyn GenerativeModel>> {
    match config.provider.as_str() {
        "disabled" => Ok(Arc::new(DisabledModel)),
        "gemini" => Ok(Arc::new(GeminiModel::from_config(config)?)),
        other => bail!("Unknown model provider: {}", other),
    }
}

// ============ Resolver ============

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectReason {
    Empty,
    TooShort,
    GenericApology,
}

impl std::fmt::Display for RejectReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            RejectReason::Empty => "empty output",
            RejectReason::TooShort => "output too short",
            RejectReason::GenericApology => "generic apology",
        })
    }
}

#[derive(Debug)]
pub enum ExternalOutcome {
    Answered(String),
    Rejected(RejectReason),
    Failed(ModelError),
}

impl ExternalOutcome {
    pub fn state(&self) -> ExternalState {
        match self {
            ExternalOutcome::Answered(_) => ExternalState::Answered,
            ExternalOutcome::Rejected(_) => ExternalState::Rejected,
            ExternalOutcome::Failed(_) => ExternalState::Failed,
        }
    }

    /// Whether the provider produced any response.
    pub fn model_reachable(&self) -> bool {
        match self {
            ExternalOutcome::Answered(_) | ExternalOutcome::Rejected(_) => true,
            ExternalOutcome::Failed(e) => e.reached_provider(),
        }
    }
}

pub struct ExternalResolver {
    model: Arc<dyn GenerativeModel>,
    params: GenerationParams,
    history_window: usize,
    min_answer_chars: usize,
    apology_max_chars: usize,
    api_key_env: String,
}

impl ExternalResolver {
    pub fn new(model: Arc<dyn GenerativeModel>, config: &ModelConfig) -> Self {
        Self {
            model,
            params: GenerationParams::from(config),
            history_window: config.history_window,
            min_answer_chars: config.min_answer_chars,
            apology_max_chars: config.apology_max_chars,
            api_key_env: config.api_key_env.clone(),
        }
    }

    pub fn model_name(&self) -> &str {
        self.model.name()
    }

    /// Persona, then the last `history_window` turns, then the question.
    pub fn build_prompt(&self, question: &str, history: &[ConversationTurn]) -> String {
        let mut prompt = String::from(SYSTEM_PERSONA);
        prompt.push_str("\n\n");

        let start = history.len().saturating_sub(self.history_window);
        let window = &history[start..];
        if !window.is_empty() {
            prompt.push_str("Conversation so far:\n");
            for turn in window {
                prompt.push_str(turn.sender.label());
                prompt.push_str(": ");
                prompt.push_str(turn.content.trim());
                prompt.push('\n');
            }
            prompt.push('\n');
        }

        prompt.push_str("User: ");
        prompt.push_str(question.trim());
        prompt.push_str("\nAssistant:");
        prompt
    }

    /// Reject unusable output; `None` means the text may be shown.
    pub fn validate_output(&self, text: &str) -> Option<RejectReason> {
        let trimmed = text.trim();
        if trimmed.is_empty() {
            return Some(RejectReason::Empty);
        }
        let chars = trimmed.chars().count();
        if chars < self.min_answer_chars {
            return Some(RejectReason::TooShort);
        }
        if chars < self.apology_max_chars {
            let lower = trimmed.to_lowercase();
            if APOLOGY_MARKERS.iter().any(|m| lower.contains(m)) {
                return Some(RejectReason::GenericApology);
            }
        }
        None
    }

    pub async fn resolve(&self, question: &str, history: &[ConversationTurn]) -> ExternalOutcome {
        let prompt = self.build_prompt(question, history);
        tracing::debug!(
            model = %self.model.name(),
            state = ?ExternalState::Asking,
            prompt_chars = prompt.chars().count(),
            "asking external model"
        );

        match self.model.generate(&prompt, &self.params).await {
            Ok(text) => match self.validate_output(&text) {
                None => ExternalOutcome::Answered(text.trim().to_string()),
                Some(reason) => {
                    tracing::warn!(
                        model = %self.model.name(),
                        %reason,
                        output_chars = text.chars().count(),
                        "rejected external model output"
                    );
                    ExternalOutcome::Rejected(reason)
                }
            },
            Err(e) => {
                if e.is_auth() {
                    tracing::error!(
                        model = %self.model.name(),
                        error = %e,
                        hint = %format!("check that {} holds a valid API key", self.api_key_env),
                        "external model authorization failed"
                    );
                } else if matches!(e, ModelError::Disabled) {
                    tracing::warn!("external model disabled; using fallback");
                } else {
                    tracing::error!(model = %self.model.name(), error = %e, "external model call failed");
                }
                ExternalOutcome::Failed(e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Echo(&'static str);

    #[async_trait]
    impl GenerativeModel for Echo {
        fn name(&self) -> &str {
            "echo"
        }
        async fn generate(&self, _p: &str, _g: &GenerationParams) -> Result<String, ModelError> {
            Ok(self.0.to_string())
        }
    }

    fn resolver(text: &'static str) -> ExternalResolver {
        ExternalResolver::new(Arc::new(Echo(text)), &ModelConfig::default())
    }

    #[test]
    fn test_prompt_without_history() {
        let r = resolver("");
        let p = r.build_prompt("  hello  ", &[]);
        assert!(p.starts_with(SYSTEM_PERSONA));
        assert!(!p.contains("Conversation so far"));
        assert!(p.ends_with("User: hello\nAssistant:"));
    }

    #[test]
    fn test_prompt_keeps_last_eight_turns() {
        let r = resolver("");
        let history: Vec<ConversationTurn> = (0..12)
            .map(|i| {
                if i % 2 == 0 {
                    ConversationTurn::user(format!("turn-{:02}", i))
                } else {
                    ConversationTurn::assistant(format!("turn-{:02}", i))
                }
            })
            .collect();
        let p = r.build_prompt("q", &history);
        for i in 0..4 {
            assert!(!p.contains(&format!("turn-{:02}", i)), "turn {} leaked", i);
        }
        for i in 4..12 {
            assert!(p.contains(&format!("turn-{:02}", i)));
        }
        assert!(p.contains("User: turn-04"));
        assert!(p.contains("Assistant: turn-05"));
    }

    #[test]
    fn test_validation() {
        let r = resolver("");
        assert_eq!(r.validate_output("   "), Some(RejectReason::Empty));
        assert_eq!(r.validate_output("ok"), Some(RejectReason::TooShort));
        assert_eq!(
            r.validate_output("Sorry, I cannot help with that."),
            Some(RejectReason::GenericApology)
        );
        assert_eq!(
            r.validate_output("عذراً، لا أستطيع الإجابة عن هذا السؤال."),
            Some(RejectReason::GenericApology)
        );
        assert_eq!(r.validate_output("Bread needs flour, water, salt and yeast."), None);
    }

    #[test]
    fn test_long_answer_with_apology_word_is_accepted() {
        let r = resolver("");
        let long = format!("Sorry for the wait. {}", "Here is a detailed answer. ".repeat(10));
        assert_eq!(r.validate_output(&long), None);
    }

    #[tokio::test]
    async fn test_resolve_outcomes() {
        let out = resolver("A perfectly reasonable answer.").resolve("q", &[]).await;
        assert!(matches!(out, ExternalOutcome::Answered(ref t) if t == "A perfectly reasonable answer."));
        assert!(out.model_reachable());

        let out = resolver("sorry").resolve("q", &[]).await;
        assert_eq!(out.state(), ExternalState::Rejected);

        let disabled = ExternalResolver::new(Arc::new(DisabledModel), &ModelConfig::default());
        let out = disabled.resolve("q", &[]).await;
        assert_eq!(out.state(), ExternalState::Failed);
        assert!(!out.model_reachable());
    }

    #[test]
    fn test_parse_gemini_response() {
        let ok = json!({
            "candidates": [{ "content": { "parts": [{ "text": "Hello " }, { "text": "world" }] } }]
        });
        assert_eq!(parse_gemini_response(&ok).unwrap(), "Hello world");

        let err = json!({ "error": { "code": 429, "message": "quota" } });
        assert!(matches!(
            parse_gemini_response(&err),
            Err(ModelError::Api { status: 429, .. })
        ));

        assert!(matches!(
            parse_gemini_response(&json!({})),
            Err(ModelError::InvalidResponse(_))
        ));
    }
}
