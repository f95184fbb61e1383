//! Local matching over the loaded knowledge base.
//!
//! Two passes of increasing recall, run in order by the resolver:
//!
//! 1. [`search_exact`]: first-match containment, categories in priority
//!    order. Per entry: any variant bidirectionally contains/is contained
//!    by the query, else any keyword is contained in the query, else the
//!    query is contained in the answer.
//! 2. [`search_advanced`]: weighted word overlap across every entry:
//!
//! ```text
//! score(entry) = Σ over query words w
//!                  variant_weight  if w overlaps any variant word
//!                + keyword_weight  if w overlaps any keyword
//!                + answer_weight   if w overlaps any answer word
//! ```
//!
//! "Overlap" means one string contains the other. The best entry is
//! returned only when its score reaches `min_score`.
//!
//! Both passes are pure and report a miss as `None`.

use serde::Serialize;

use crate::classifier::normalize_question;
use crate::config::MatcherConfig;
use crate::models::{KnowledgeCategory, QaEntry};

/// Which rule produced a [`LocalMatch`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchVia {
    Variant,
    Keyword,
    AnswerBody,
    Scored,
}

#[derive(Debug, Clone, Serialize)]
pub struct LocalMatch {
    pub category: String,
    pub entry_id: String,
    pub answer: String,
    pub via: MatchVia,
    /// Fuzzy score; `None` for the exact pass.
    pub score: Option<u32>,
}

impl LocalMatch {
    fn from_entry(category: &KnowledgeCategory, entry: &QaEntry, via: MatchVia) -> Self {
        Self {
            category: category.id.clone(),
            entry_id: entry.id.clone(),
            answer: entry.answer.clone(),
            via,
            score: None,
        }
    }
}

/// Tuning for both passes. Defaults reproduce the fixed 2/3/1 weights and
/// a threshold of 2.
#[derive(Debug, Clone)]
pub struct ScoringConfig {
    pub variant_weight: u32,
    pub keyword_weight: u32,
    pub answer_weight: u32,
    pub min_score: u32,
    pub priority_categories: Vec<String>,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        ScoringConfig::from(&MatcherConfig::default())
    }
}

impl From<&MatcherConfig> for ScoringConfig {
    fn from(c: &MatcherConfig) -> Self {
        Self {
            variant_weight: c.variant_weight,
            keyword_weight: c.keyword_weight,
            answer_weight: c.answer_weight,
            min_score: c.min_score,
            priority_categories: c
                .priority_categories
                .iter()
                .map(|p| normalize_question(p))
                .collect(),
        }
    }
}

fn priority_rank(category: &KnowledgeCategory, priority: &[String]) -> usize {
    let id = normalize_question(&category.id);
    priority
        .iter()
        .position(|p| *p == id)
        .unwrap_or(priority.len())
}

/// Categories in exact-pass order: priority ids first (in the configured
/// order), then the rest in load order.
pub fn prioritized<'a>(
    categories: &'a [KnowledgeCategory],
    priority: &[String],
) -> Vec<&'a KnowledgeCategory> {
    let mut ordered: Vec<&KnowledgeCategory> = categories.iter().collect();
    // stable: ties keep load order
    ordered.sort_by_key(|c| priority_rank(c, priority));
    ordered
}

fn exact_rule(entry: &QaEntry, query: &str) -> Option<MatchVia> {
    let variant_hit = entry
        .variants
        .iter()
        .map(|v| normalize_question(v))
        .filter(|v| !v.is_empty())
        .any(|v| v.contains(query) || query.contains(v.as_str()));
    if variant_hit {
        return Some(MatchVia::Variant);
    }

    let keyword_hit = entry
        .keywords
        .iter()
        .map(|k| normalize_question(k))
        .filter(|k| !k.is_empty())
        .any(|k| query.contains(k.as_str()));
    if keyword_hit {
        return Some(MatchVia::Keyword);
    }

    if normalize_question(&entry.answer).contains(query) {
        return Some(MatchVia::AnswerBody);
    }

    None
}

/// Pass 1: strict first match in category-priority, then entry, order.
pub fn search_exact(
    categories: &[KnowledgeCategory],
    query: &str,
    scoring: &ScoringConfig,
) -> Option<LocalMatch> {
    let q = normalize_question(query);
    if q.is_empty() {
        return None;
    }

    for category in prioritized(categories, &scoring.priority_categories) {
        for entry in &category.entries {
            if let Some(via) = exact_rule(entry, &q) {
                return Some(LocalMatch::from_entry(category, entry, via));
            }
        }
    }
    None
}

fn overlaps(a: &str, b: &str) -> bool {
    a.contains(b) || b.contains(a)
}

/// Weighted overlap score of one entry against pre-split query words.
pub fn score_entry(entry: &QaEntry, query_words: &[&str], scoring: &ScoringConfig) -> u32 {
    let variant_words: Vec<String> = entry
        .variants
        .iter()
        .flat_map(|v| {
            normalize_question(v)
                .split_whitespace()
                .map(str::to_string)
                .collect::<Vec<_>>()
        })
        .collect();
    let keywords: Vec<String> = entry
        .keywords
        .iter()
        .map(|k| normalize_question(k))
        .filter(|k| !k.is_empty())
        .collect();
    let answer_norm = normalize_question(&entry.answer);
    let answer_words: Vec<&str> = answer_norm.split_whitespace().collect();

    let mut score = 0;
    for w in query_words {
        if variant_words.iter().any(|vw| overlaps(vw, w)) {
            score += scoring.variant_weight;
        }
        if keywords.iter().any(|k| overlaps(k, w)) {
            score += scoring.keyword_weight;
        }
        if answer_words.iter().any(|aw| overlaps(aw, w)) {
            score += scoring.answer_weight;
        }
    }
    score
}

/// Pass 2: best weighted-overlap entry across all categories, if it
/// reaches `min_score`. Ties keep the first entry seen.
pub fn search_advanced(
    categories: &[KnowledgeCategory],
    query: &str,
    scoring: &ScoringConfig,
) -> Option<LocalMatch> {
    let q = normalize_question(query);
    let words: Vec<&str> = q.split_whitespace().collect();
    if words.is_empty() {
        return None;
    }

    let mut best: Option<(u32, &KnowledgeCategory, &QaEntry)> = None;
    for category in categories {
        for entry in &category.entries {
            let score = score_entry(entry, &words, scoring);
            if best.map_or(score > 0, |(b, _, _)| score > b) {
                best = Some((score, category, entry));
            }
        }
    }

    let (score, category, entry) = best?;
    tracing::debug!(score, entry = %entry.id, min = scoring.min_score, "best fuzzy candidate");
    if score < scoring.min_score {
        return None;
    }

    let mut m = LocalMatch::from_entry(category, entry, MatchVia::Scored);
    m.score = Some(score);
    Some(m)
}
