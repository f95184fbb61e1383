//! Knowledge base loading.
//!
//! The knowledge base is a fixed, ordered list of category files, each
//! shaped like:
//!
//! ```json
//! {
//!   "category": "government",
//!   "description": "State institutions",
//!   "qa_pairs": [
//!     {
//!       "id": "gov_001",
//!       "question_variants": ["ما هي عاصمة سوريا"],
//!       "answer": "دمشق",
//!       "keywords": ["عاصمة"],
//!       "confidence": 1.0,
//!       "source": "manual"
//!     }
//!   ]
//! }
//! ```
//!
//! Loading is best-effort: every file yields a [`LoadOutcome`], failures
//! are logged and dropped, and a partially-loaded knowledge base is an
//! accepted degraded state. The load runs once per [`KnowledgeBase`]
//! instance; concurrent first callers await the same load.

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::OnceCell;

use crate::config::KnowledgeConfig;
use crate::models::{KnowledgeCategory, QaEntry};

/// Where category files are read from.
#[async_trait]
pub trait KnowledgeSource: Send + Sync {
    /// Short label for logs (e.g. `"dir:./data"`).
    fn describe(&self) -> String;

    /// Return the raw contents of one named resource.
    async fn fetch(&self, name: &str) -> Result<String>;
}

/// Reads `<root>/<name>` from the local filesystem.
pub struct DirectorySource {
    root: PathBuf,
}

impl DirectorySource {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

#[async_trait]
impl KnowledgeSource for DirectorySource {
    fn describe(&self) -> String {
        format!("dir:{}", self.root.display())
    }

    async fn fetch(&self, name: &str) -> Result<String> {
        let path = self.root.join(name);
        tokio::fs::read_to_string(&path)
            .await
            .with_context(|| format!("Failed to read {}", path.display()))
    }
}

/// Fetches `GET <base_url>/<name>`.
pub struct HttpSource {
    base_url: String,
    client: reqwest::Client,
}

impl HttpSource {
    pub fn new(base_url: &str, timeout_secs: u64) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()?;
        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
        })
    }
}

#[async_trait]
impl KnowledgeSource for HttpSource {
    fn describe(&self) -> String {
        format!("http:{}", self.base_url)
    }

    async fn fetch(&self, name: &str) -> Result<String> {
        let url = format!("{}/{}", self.base_url, name);
        let resp = self.client.get(&url).send().await?;
        let status = resp.status();
        if !status.is_success() {
            bail!("GET {} returned {}", url, status);
        }
        Ok(resp.text().await?)
    }
}

/// Build the configured [`KnowledgeSource`].
pub fn create_source(config: &KnowledgeConfig) -> Result<Arc<dyn KnowledgeSource>> {
    match config.source.as_str() {
        "dir" => Ok(Arc::new(DirectorySource::new(config.dir.clone()))),
        "http" => {
            let base = config
                .base_url
                .as_deref()
                .ok_or_else(|| anyhow::anyhow!("knowledge.base_url required for http source"))?;
            Ok(Arc::new(HttpSource::new(base, config.timeout_secs)?))
        }
        other => bail!("Unknown knowledge source: {}", other),
    }
}

/// Result of loading one resource.
#[derive(Debug)]
pub enum LoadOutcome {
    Loaded(KnowledgeCategory),
    Failed { resource: String, reason: String },
}

#[derive(Deserialize)]
struct CategoryFile {
    #[serde(default)]
    category: Option<String>,
    #[serde(default)]
    description: String,
    #[serde(default)]
    qa_pairs: Vec<QaEntry>,
}

/// Parse one category file. The category id falls back to the file stem,
/// and entries without an answer are dropped.
pub fn parse_category(resource: &str, raw: &str) -> Result<KnowledgeCategory> {
    let file: CategoryFile = serde_json::from_str(raw)
        .with_context(|| format!("Malformed knowledge file: {}", resource))?;

    let id = file
        .category
        .filter(|c| !c.trim().is_empty())
        .unwrap_or_else(|| {
            Path::new(resource)
                .file_stem()
                .map(|s| s.to_string_lossy().to_string())
                .unwrap_or_else(|| resource.to_string())
        });

    let total = file.qa_pairs.len();
    let entries: Vec<QaEntry> = file
        .qa_pairs
        .into_iter()
        .filter(|e| !e.answer.trim().is_empty())
        .collect();
    if entries.len() < total {
        tracing::warn!(
            resource,
            dropped = total - entries.len(),
            "dropped knowledge entries with an empty answer"
        );
    }

    Ok(KnowledgeCategory {
        id,
        description: file.description,
        entries,
    })
}

#[derive(Debug, Clone, Serialize)]
pub struct KnowledgeStats {
    pub categories: Vec<CategoryStats>,
    pub entries: usize,
    pub failed: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CategoryStats {
    pub id: String,
    pub description: String,
    pub entries: usize,
}

struct Loaded {
    categories: Vec<KnowledgeCategory>,
    failed: Vec<String>,
}

/// The in-memory knowledge base, loaded at most once.
pub struct KnowledgeBase {
    source: Arc<dyn KnowledgeSource>,
    files: Vec<String>,
    loaded: OnceCell<Loaded>,
}

impl KnowledgeBase {
    pub fn new(source: Arc<dyn KnowledgeSource>, files: Vec<String>) -> Self {
        Self {
            source,
            files,
            loaded: OnceCell::new(),
        }
    }

    pub fn from_config(config: &KnowledgeConfig) -> Result<Self> {
        Ok(Self::new(create_source(config)?, config.files.clone()))
    }

    pub fn is_loaded(&self) -> bool {
        self.loaded.initialized()
    }

    /// Load every configured resource on first call; later calls are no-ops.
    pub async fn ensure_loaded(&self) -> &[KnowledgeCategory] {
        let loaded = self.loaded.get_or_init(|| self.load_all()).await;
        &loaded.categories
    }

    /// Loaded categories, or an empty slice before [`ensure_loaded`](Self::ensure_loaded).
    pub fn categories(&self) -> &[KnowledgeCategory] {
        self.loaded
            .get()
            .map(|l| l.categories.as_slice())
            .unwrap_or(&[])
    }

    pub async fn stats(&self) -> KnowledgeStats {
        self.ensure_loaded().await;
        let loaded = self.loaded.get();
        let categories: Vec<CategoryStats> = self
            .categories()
            .iter()
            .map(|c| CategoryStats {
                id: c.id.clone(),
                description: c.description.clone(),
                entries: c.entries.len(),
            })
            .collect();
        KnowledgeStats {
            entries: categories.iter().map(|c| c.entries).sum(),
            categories,
            failed: loaded.map(|l| l.failed.clone()).unwrap_or_default(),
        }
    }

    async fn load_one(&self, name: &str) -> LoadOutcome {
        let parsed = match self.source.fetch(name).await {
            Ok(raw) => parse_category(name, &raw),
            Err(e) => Err(e),
        };
        match parsed {
            Ok(category) => LoadOutcome::Loaded(category),
            Err(e) => LoadOutcome::Failed {
                resource: name.to_string(),
                reason: format!("{:#}", e),
            },
        }
    }

    async fn load_all(&self) -> Loaded {
        let mut categories = Vec::new();
        let mut failed = Vec::new();

        for name in &self.files {
            match self.load_one(name).await {
                LoadOutcome::Loaded(category) => {
                    tracing::debug!(
                        resource = %name,
                        category = %category.id,
                        entries = category.entries.len(),
                        "loaded knowledge category"
                    );
                    categories.push(category);
                }
                LoadOutcome::Failed { resource, reason } => {
                    tracing::warn!(%resource, %reason, "skipping knowledge resource");
                    failed.push(resource);
                }
            }
        }

        tracing::info!(
            source = %self.source.describe(),
            categories = categories.len(),
            failed = failed.len(),
            "knowledge base loaded"
        );

        Loaded { categories, failed }
    }
}
