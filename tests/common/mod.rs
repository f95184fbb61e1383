#![allow(dead_code)]

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use syria_qa::config::Config;
use syria_qa::knowledge::KnowledgeSource;
use syria_qa::model::{GenerationParams, GenerativeModel, ModelError};
use syria_qa::resolver::Resolver;

pub const CAPITAL_ANSWER: &str =
    "The capital of Syria is Damascus, one of the oldest continuously inhabited cities.";
pub const ANTHEM_ANSWER: &str =
    "The national anthem is Humat ad-Diyar (Guardians of the Homeland).";
pub const CITADEL_ANSWER: &str = "The Citadel of Aleppo is one of the largest medieval castles.";

pub const GOVERNMENT_JSON: &str = r#"{
  "category": "government",
  "description": "State institutions",
  "qa_pairs": [
    {
      "id": "gov_capital",
      "question_variants": ["what is the capital of syria"],
      "answer": "The capital of Syria is Damascus, one of the oldest continuously inhabited cities.",
      "keywords": ["capital"],
      "confidence": 1.0,
      "source": "manual"
    }
  ]
}"#;

pub const GENERAL_JSON: &str = r#"{
  "category": "general",
  "description": "General facts",
  "qa_pairs": [
    {
      "id": "gen_anthem",
      "question_variants": ["what is the national anthem"],
      "answer": "The national anthem is Humat ad-Diyar (Guardians of the Homeland).",
      "keywords": ["anthem"],
      "confidence": 0.9,
      "source": "manual"
    }
  ]
}"#;

pub const CITIES_JSON: &str = r#"{
  "category": "cities",
  "description": "Cities and landmarks",
  "qa_pairs": [
    {
      "id": "city_citadel",
      "question_variants": ["tell me about the aleppo citadel"],
      "answer": "The Citadel of Aleppo is one of the largest medieval castles.",
      "keywords": ["citadel"],
      "confidence": 1.0,
      "source": "scraped"
    }
  ]
}"#;

/// In-memory knowledge resources keyed by file name.
pub struct MemorySource {
    files: HashMap<String, String>,
}

impl MemorySource {
    pub fn new(files: &[(&str, &str)]) -> Self {
        Self {
            files: files
                .iter()
                .map(|(n, c)| (n.to_string(), c.to_string()))
                .collect(),
        }
    }

    pub fn standard() -> Self {
        Self::new(&[
            ("cities.json", CITIES_JSON),
            ("general.json", GENERAL_JSON),
            ("government.json", GOVERNMENT_JSON),
        ])
    }
}

#[async_trait]
impl KnowledgeSource for MemorySource {
    fn describe(&self) -> String {
        "memory".to_string()
    }

    async fn fetch(&self, name: &str) -> Result<String> {
        self.files
            .get(name)
            .cloned()
            .ok_or_else(|| anyhow!("no such resource: {}", name))
    }
}

/// Knowledge source whose every fetch panics.
pub struct PanickingSource;

#[async_trait]
impl KnowledgeSource for PanickingSource {
    fn describe(&self) -> String {
        "panicking".to_string()
    }

    async fn fetch(&self, _name: &str) -> Result<String> {
        panic!("knowledge store client bug")
    }
}

/// What a [`MockModel`] does when called.
#[derive(Clone)]
pub enum Reply {
    Text(String),
    Transport,
    Unauthorized,
    Panic,
}

/// Counts calls and records prompts.
pub struct MockModel {
    reply: Reply,
    calls: AtomicUsize,
    prompts: Mutex<Vec<String>>,
}

impl MockModel {
    pub fn new(reply: Reply) -> Arc<Self> {
        Arc::new(Self {
            reply,
            calls: AtomicUsize::new(0),
            prompts: Mutex::new(Vec::new()),
        })
    }

    pub fn answering(text: &str) -> Arc<Self> {
        Self::new(Reply::Text(text.to_string()))
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn last_prompt(&self) -> Option<String> {
        self.prompts.lock().unwrap().last().cloned()
    }
}

#[async_trait]
impl GenerativeModel for MockModel {
    fn name(&self) -> &str {
        "mock"
    }

    async fn generate(&self, prompt: &str, _params: &GenerationParams) -> Result<String, ModelError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.prompts.lock().unwrap().push(prompt.to_string());
        match &self.reply {
            Reply::Text(t) => Ok(t.clone()),
            Reply::Transport => Err(ModelError::Transport("connection refused".to_string())),
            Reply::Unauthorized => Err(ModelError::Unauthorized("API key not valid".to_string())),
            Reply::Panic => panic!("provider client bug"),
        }
    }
}

pub fn test_config() -> Config {
    let mut cfg = Config::minimal();
    cfg.knowledge.files = vec![
        "cities.json".to_string(),
        "general.json".to_string(),
        "government.json".to_string(),
    ];
    cfg
}

pub fn resolver_with(cfg: &Config, model: Arc<MockModel>, source: MemorySource) -> Resolver {
    Resolver::builder(cfg)
        .model(model)
        .knowledge_source(Arc::new(source))
        .build()
        .unwrap()
}

pub fn resolver(model: Arc<MockModel>) -> Resolver {
    resolver_with(&test_config(), model, MemorySource::standard())
}
