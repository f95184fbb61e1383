//! # Syria QA CLI (`sqa`)
//!
//! The `sqa` binary resolves questions from the command line, inspects the
//! classifier and local matcher, and starts the HTTP server.
//!
//! ## Usage
//!
//! ```bash
//! sqa --config ./config/sqa.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `sqa ask "<q>"` | Resolve a question through the full chain |
//! | `sqa classify "<q>"` | Show whether a question is identity, domain, or general |
//! | `sqa match "<q>"` | Run both local matcher passes and show what fired |
//! | `sqa categories` | List loaded knowledge categories and failed resources |
//! | `sqa serve` | Start the HTTP server |
//!
//! ## Examples
//!
//! ```bash
//! # Ask with prior conversation turns
//! sqa ask "وماذا عن حلب؟" --history-file ./turns.json
//!
//! # Check why a question did not hit the knowledge base
//! sqa match "عاصمة سوريا"
//! ```

use anyhow::Context;
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};

use syria_qa::config::{self, Config};
use syria_qa::knowledge::KnowledgeBase;
use syria_qa::matcher::{search_advanced, search_exact, LocalMatch, ScoringConfig};
use syria_qa::models::ConversationTurn;
use syria_qa::resolver::Resolver;
use syria_qa::{classifier::QueryClassifier, logging, server};

/// Syria QA: tiered question answering over a curated knowledge base
/// with a generative model fallback.
#[derive(Parser)]
#[command(name = "sqa", about = "Syria QA: tiered question answering", version)]
struct Cli {
    /// Path to configuration file (TOML).
    ///
    /// Defaults to `./config/sqa.toml`. When the file does not exist the
    /// built-in defaults are used (local directory knowledge, model disabled).
    #[arg(long, global = true, default_value = "./config/sqa.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Resolve a question and print the answer with its source.
    Ask {
        question: String,

        /// JSON file holding prior turns: `[{"sender": "user", "content": "..."}]`.
        #[arg(long)]
        history_file: Option<PathBuf>,
    },

    /// Classify a question without resolving it.
    Classify { question: String },

    /// Run the exact and scored local matchers against a question.
    Match { question: String },

    /// List knowledge categories.
    Categories,

    /// Start the HTTP server on `[server].bind`.
    Serve,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let cfg = read_config(&cli.config)?;
    logging::init(&cfg.logging);

    match cli.command {
        Commands::Ask {
            question,
            history_file,
        } => {
            let history = match history_file {
                Some(path) => read_history(&path)?,
                None => Vec::new(),
            };
            let resolver = Resolver::from_config(&cfg)?;
            let result = resolver.resolve(&question, &history).await?;
            println!("{}", result.answer);
            println!();
            println!("source: {}", result.source);
            println!("{}", serde_json::to_string_pretty(&result.debug)?);
        }
        Commands::Classify { question } => {
            let classifier = QueryClassifier::from_config(&cfg.classifier);
            let class = classifier.classify(&question);
            println!("{}", serde_json::to_string(&class)?.trim_matches('"'));
        }
        Commands::Match { question } => {
            let kb = KnowledgeBase::from_config(&cfg.knowledge)?;
            let categories = kb.ensure_loaded().await;
            let scoring = ScoringConfig::from(&cfg.matcher);

            print_match("exact", search_exact(categories, &question, &scoring));
            print_match("fuzzy", search_advanced(categories, &question, &scoring));
        }
        Commands::Categories => {
            let kb = KnowledgeBase::from_config(&cfg.knowledge)?;
            let stats = kb.stats().await;
            for c in &stats.categories {
                println!("{:<32} {:>5}  {}", c.id, c.entries, c.description);
            }
            println!("\n{} entries in {} categories", stats.entries, stats.categories.len());
            for failed in &stats.failed {
                println!("failed: {}", failed);
            }
        }
        Commands::Serve => {
            server::run_server(&cfg).await?;
        }
    }

    Ok(())
}

fn read_config(path: &Path) -> anyhow::Result<Config> {
    if path.exists() {
        config::load_config(path)
    } else {
        Ok(Config::minimal())
    }
}

fn read_history(path: &Path) -> anyhow::Result<Vec<ConversationTurn>> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read history file: {}", path.display()))?;
    serde_json::from_str(&raw)
        .with_context(|| format!("Malformed history file: {}", path.display()))
}

fn print_match(pass: &str, found: Option<LocalMatch>) {
    match found {
        Some(m) => {
            let score = m
                .score
                .map(|s| format!(" score={}", s))
                .unwrap_or_default();
            println!(
                "{:<6} {}/{} via={:?}{}",
                pass, m.category, m.entry_id, m.via, score
            );
            println!("       {}", m.answer);
        }
        None => println!("{:<6} no match", pass),
    }
}
