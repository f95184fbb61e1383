//! # Syria QA
//!
//! A tiered question-answering resolver for an assistant that answers
//! questions about Syria.
//!
//! Each question is routed through an ordered chain of resolvers, each
//! with its own matching semantics, and the answer is attributed to the
//! tier that produced it.
//!
//! ## Architecture
//!
//! ```text
//!              ┌────────────┐
//! question ──▶ │ Classifier │── identity ──────────────────────────▶ self-description
//!              └─────┬──────┘
//!                    ▼
//!              ┌────────────┐
//!              │   Cache    │── hit ───────────────────────────────▶ cached answer
//!              └─────┬──────┘
//!          domain ◀──┴──▶ general
//!            │               │
//!            ▼               ▼
//!   ┌─────────────────┐  ┌──────────────┐
//!   │ Knowledge base  │  │ Gemini model │
//!   │ exact ▶ fuzzy   │  └──────┬───────┘
//!   └────────┬────────┘         │
//!            ▼                  ▼
//!      local answer or    model answer or
//!      domain apology     generic apology
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! sqa ask "ما هي عاصمة سوريا"
//! sqa classify "who are you"
//! sqa match "عاصمة سوريا"
//! sqa categories
//! sqa serve
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`models`] | Core data types |
//! | [`classifier`] | Identity / domain classification |
//! | [`cache`] | TTL answer cache |
//! | [`knowledge`] | Knowledge base loading |
//! | [`matcher`] | Exact and scored local matching |
//! | [`model`] | External generative model tier |
//! | [`resolver`] | Resolution orchestrator |
//! | [`server`] | HTTP server |
//! | [`logging`] | Tracing subscriber setup |

pub mod cache;
pub mod classifier;
pub mod config;
pub mod knowledge;
pub mod logging;
pub mod matcher;
pub mod model;
pub mod models;
pub mod resolver;
pub mod server;
