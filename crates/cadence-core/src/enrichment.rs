//! Knowledge enrichment for predictions
//!
//! A knowledge source is consulted once per accepted prediction to attach
//! related facts. Lookups are bounded by a timeout and any failure degrades to
//! an empty context; enrichment never decides whether a prediction is stored.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Map, Value};
use tracing::{debug, warn};

use crate::db::Database;
use crate::error::{Error, Result};
use crate::models::PatternType;

/// Opaque context stored alongside a prediction
pub type EnrichmentContext = Map<String, Value>;

/// Source of free-text facts about a subject
#[async_trait]
pub trait KnowledgeEnrichment: Send + Sync {
    async fn search(&self, query: &str, subject_id: &str, max_results: usize)
        -> Result<Vec<String>>;
}

/// Runs the lookup on the blocking pool so a caller's timeout can fire while
/// SQLite or the connection pool is busy
#[async_trait]
impl KnowledgeEnrichment for Database {
    async fn search(
        &self,
        query: &str,
        subject_id: &str,
        max_results: usize,
    ) -> Result<Vec<String>> {
        let db = self.clone();
        let query = query.to_string();
        let subject_id = subject_id.to_string();

        tokio::task::spawn_blocking(move || {
            db.search_knowledge_facts(&subject_id, &query, max_results)
        })
        .await
        .map_err(|e| Error::Enrichment(format!("knowledge lookup task failed: {}", e)))?
    }
}

/// Lookup query used for each pattern
pub fn query_for(pattern: PatternType) -> &'static str {
    match pattern {
        PatternType::EnergyCrash => "energy crash fatigue tired rest",
        PatternType::Procrastination => "procrastination avoidance motivation tasks",
        PatternType::Hyperfocus => "hyperfocus focus breaks time",
        PatternType::DecisionFatigue => "decision fatigue overwhelm choices tasks",
        PatternType::SleepDisruption => "sleep insomnia night energy",
        PatternType::SocialMasking => "social masking mood people",
    }
}

/// Look up facts for a pattern, returning `None` on error, timeout or no facts
pub async fn try_enrich(
    source: &dyn KnowledgeEnrichment,
    subject_id: &str,
    pattern: PatternType,
    max_results: usize,
    timeout: Duration,
) -> Option<EnrichmentContext> {
    let query = query_for(pattern);

    let facts = match tokio::time::timeout(timeout, source.search(query, subject_id, max_results))
        .await
    {
        Ok(Ok(facts)) => facts,
        Ok(Err(e)) => {
            warn!(subject = subject_id, pattern = %pattern, error = %e, "Enrichment failed");
            return None;
        }
        Err(_) => {
            warn!(
                subject = subject_id,
                pattern = %pattern,
                timeout_ms = timeout.as_millis() as u64,
                "Enrichment timed out"
            );
            return None;
        }
    };

    if facts.is_empty() {
        debug!(subject = subject_id, pattern = %pattern, "No related facts");
        return None;
    }

    let mut context = Map::new();
    context.insert("query".to_string(), json!(query));
    context.insert("related_facts".to_string(), json!(facts));
    Some(context)
}

/// Enrich with an optional source; absent source or degraded lookup yields `{}`
pub async fn enrich_or_empty(
    source: Option<&Arc<dyn KnowledgeEnrichment>>,
    subject_id: &str,
    pattern: PatternType,
    max_results: usize,
    timeout: Duration,
) -> EnrichmentContext {
    match source {
        Some(source) => try_enrich(source.as_ref(), subject_id, pattern, max_results, timeout)
            .await
            .unwrap_or_default(),
        None => EnrichmentContext::new(),
    }
}

/// In-memory knowledge source for tests and demos
#[derive(Debug, Clone, Default)]
pub struct StaticKnowledge {
    facts: Vec<String>,
    failing: bool,
    delay: Option<Duration>,
}

impl StaticKnowledge {
    pub fn new(facts: Vec<String>) -> Self {
        Self {
            facts,
            ..Default::default()
        }
    }

    /// A source whose every lookup errors
    pub fn failing() -> Self {
        Self {
            failing: true,
            ..Default::default()
        }
    }

    /// Sleep before answering
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }
}

#[async_trait]
impl KnowledgeEnrichment for StaticKnowledge {
    async fn search(
        &self,
        query: &str,
        _subject_id: &str,
        max_results: usize,
    ) -> Result<Vec<String>> {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if self.failing {
            return Err(Error::Enrichment(format!("knowledge source unavailable for '{}'", query)));
        }
        Ok(self.facts.iter().take(max_results).cloned().collect())
    }
}
