//! Resolution orchestrator.
//!
//! Composes the tiers into one decision chain and attributes every answer
//! to the tier that produced it:
//!
//! ```text
//! question ─▶ validate ─▶ identity ─▶ cache ─▶ domain? ──yes──▶ exact ─▶ fuzzy ─▶ domain apology
//!                                                  │
//!                                                  └──no──▶ external model ─▶ generic apology
//! ```
//!
//! Identity runs ahead of the cache so a substring-related cached answer
//! can never shadow the self-description. Once a question is classified
//! as in-domain only curated knowledge may answer it; the external model
//! is never consulted for it. Fallback apologies are never cached.
//!
//! [`Resolver::resolve`] always yields a [`ResolutionResult`] for a
//! non-empty question; internal errors and panics inside a tier become
//! the emergency apology.

use anyhow::Result;
use futures::FutureExt;
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Instant;

use crate::cache::AnswerCache;
use crate::classifier::QueryClassifier;
use crate::config::Config;
use crate::knowledge::{KnowledgeBase, KnowledgeSource};
use crate::matcher::{search_advanced, search_exact, LocalMatch, ScoringConfig};
use crate::model::{create_model, ExternalOutcome, ExternalResolver, GenerativeModel};
use crate::models::{ConversationTurn, ResolutionDebug, ResolutionResult, ResolutionSource};

/// Returned for in-domain questions the knowledge base cannot answer.
pub const DOMAIN_APOLOGY: &str = "عذراً، لا تتوفر لدي معلومات كافية في قاعدة المعرفة المحلية للإجابة عن هذا السؤال حول سوريا. \
Sorry, my local knowledge base does not have enough information to answer this question about Syria.";

/// Returned when the external model fails or produces unusable output.
pub const GENERIC_APOLOGY: &str = "عذراً، لم أتمكن من الإجابة عن سؤالك في الوقت الحالي. يرجى المحاولة مرة أخرى لاحقاً. \
Sorry, I could not answer your question right now. Please try again later.";

/// Returned when the chain itself fails unexpectedly.
pub const EMERGENCY_APOLOGY: &str = "عذراً، حدث خطأ غير متوقع أثناء معالجة سؤالك. \
Sorry, something went wrong while processing your question.";

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("question must not be empty")]
    EmptyQuestion,
}

pub struct Resolver {
    classifier: QueryClassifier,
    cache: AnswerCache,
    knowledge: KnowledgeBase,
    scoring: ScoringConfig,
    external: ExternalResolver,
}

/// Builds a [`Resolver`] from config, with optional injected seams.
pub struct ResolverBuilder {
    config: Config,
    model: Option<Arc<dyn GenerativeModel>>,
    source: Option<Arc<dyn KnowledgeSource>>,
}

impl ResolverBuilder {
    pub fn model(mut self, model: Arc<dyn GenerativeModel>) -> Self {
        self.model = Some(model);
        self
    }

    pub fn knowledge_source(mut self, source: Arc<dyn KnowledgeSource>) -> Self {
        self.source = Some(source);
        self
    }

    pub fn build(self) -> Result<Resolver> {
        let config = self.config;
        let model = match self.model {
            Some(m) => m,
            None => create_model(&config.model)?,
        };
        let knowledge = match self.source {
            Some(s) => KnowledgeBase::new(s, config.knowledge.files.clone()),
            None => KnowledgeBase::from_config(&config.knowledge)?,
        };
        Ok(Resolver {
            classifier: QueryClassifier::from_config(&config.classifier),
            cache: AnswerCache::new(config.cache.ttl_secs),
            knowledge,
            scoring: ScoringConfig::from(&config.matcher),
            external: ExternalResolver::new(model, &config.model),
        })
    }
}

impl Resolver {
    pub fn builder(config: &Config) -> ResolverBuilder {
        ResolverBuilder {
            config: config.clone(),
            model: None,
            source: None,
        }
    }

    pub fn from_config(config: &Config) -> Result<Self> {
        Self::builder(config).build()
    }

    pub fn cache(&self) -> &AnswerCache {
        &self.cache
    }

    pub fn knowledge(&self) -> &KnowledgeBase {
        &self.knowledge
    }

    /// Name of the configured external model (`"disabled"` when off).
    pub fn model_name(&self) -> &str {
        self.external.model_name()
    }

    /// Resolve one question. Only an empty question is rejected.
    pub async fn resolve(
        &self,
        question: &str,
        history: &[ConversationTurn],
    ) -> Result<ResolutionResult, ValidationError> {
        let question = question.trim();
        if question.is_empty() {
            return Err(ValidationError::EmptyQuestion);
        }

        let started = Instant::now();
        let mut diag = ResolutionDebug {
            request_id: uuid::Uuid::new_v4().to_string(),
            input_chars: question.chars().count(),
            ..Default::default()
        };

        let request_id = diag.request_id.clone();
        let chain = AssertUnwindSafe(self.run_chain(question, history, &mut diag))
            .catch_unwind()
            .await;
        let (answer, source) = match chain {
            Ok(Ok(r)) => r,
            Ok(Err(e)) => {
                tracing::error!(
                    %request_id,
                    error = ?e,
                    "resolution chain failed; returning emergency answer"
                );
                (EMERGENCY_APOLOGY.to_string(), ResolutionSource::EmergencyError)
            }
            Err(panic) => {
                tracing::error!(
                    %request_id,
                    panic = %panic_message(panic.as_ref()),
                    "resolution chain panicked; returning emergency answer"
                );
                (EMERGENCY_APOLOGY.to_string(), ResolutionSource::EmergencyError)
            }
        };

        diag.output_chars = answer.chars().count();
        diag.elapsed_ms = started.elapsed().as_millis() as u64;
        tracing::info!(
            %request_id,
            %source,
            elapsed_ms = diag.elapsed_ms,
            "question resolved"
        );

        Ok(ResolutionResult {
            answer,
            source,
            debug: diag,
        })
    }

    async fn run_chain(
        &self,
        question: &str,
        history: &[ConversationTurn],
        diag: &mut ResolutionDebug,
    ) -> Result<(String, ResolutionSource)> {
        if let Some(identity) = self.classifier.identity_answer(question) {
            self.cache.store(question, identity)?;
            return Ok((identity.to_string(), ResolutionSource::Identity));
        }

        // lookup and the later store are not atomic; see cache module docs
        if let Some(hit) = self.cache.lookup(question)? {
            tracing::debug!(request_id = %diag.request_id, "cache hit");
            return Ok((hit, ResolutionSource::Cache));
        }

        if self.classifier.is_domain_question(question) {
            return self.resolve_domain(question, diag).await;
        }

        let outcome = self.external.resolve(question, history).await;
        diag.model_reachable = Some(outcome.model_reachable());
        diag.model_outcome = Some(outcome.state());
        match outcome {
            ExternalOutcome::Answered(text) => {
                self.cache.store(question, &text)?;
                Ok((text, ResolutionSource::ExternalModel))
            }
            ExternalOutcome::Rejected(_) | ExternalOutcome::Failed(_) => {
                Ok((GENERIC_APOLOGY.to_string(), ResolutionSource::FinalFallback))
            }
        }
    }

    async fn resolve_domain(
        &self,
        question: &str,
        diag: &mut ResolutionDebug,
    ) -> Result<(String, ResolutionSource)> {
        let categories = self.knowledge.ensure_loaded().await;

        let (found, source) = match search_exact(categories, question, &self.scoring) {
            Some(m) => (Some(m), ResolutionSource::LocalExact),
            None => (
                search_advanced(categories, question, &self.scoring),
                ResolutionSource::LocalFuzzy,
            ),
        };

        match found {
            Some(m) => {
                record_match(&m, diag);
                self.cache.store(question, &m.answer)?;
                Ok((m.answer, source))
            }
            None => {
                tracing::debug!(request_id = %diag.request_id, "no local match for domain question");
                Ok((DOMAIN_APOLOGY.to_string(), ResolutionSource::LocalInsufficient))
            }
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.as_str()
    } else {
        "unknown panic"
    }
}

fn record_match(m: &LocalMatch, diag: &mut ResolutionDebug) {
    diag.category = Some(m.category.clone());
    diag.entry_id = Some(m.entry_id.clone());
    diag.match_score = m.score;
}
