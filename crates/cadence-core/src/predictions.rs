//! Forward-looking pattern prediction
//!
//! Each pattern has a fixed set of weighted factors read from the 7-day and
//! 30-day trend windows and the activity stats. A pattern's confidence is the
//! sum of the weights of its satisfied factors, capped at 1.0, and it is
//! predicted only at 0.6 or above.
//!
//! ## Deduplication
//!
//! At most one active prediction per subject and pattern is created within
//! 24 hours. The check runs once before enrichment to skip the lookup for
//! obvious duplicates, then again under the subject lock right before the
//! insert. The store rejects whatever slips past both.

use std::sync::Arc;

use chrono::{Duration, Utc};
use serde_json::{json, Map, Value};
use tracing::{debug, info, warn};

use crate::config::EngineConfig;
use crate::engine::EngineContext;
use crate::enrichment::{enrich_or_empty, EnrichmentContext, KnowledgeEnrichment};
use crate::error::Result;
use crate::models::{
    MultiMetricTrends, NewPrediction, PatternType, PredictedPattern, PredictionOutcome,
    StatsSnapshot, Trend,
};
use crate::trends::{round_to, TrendAnalyzer};

/// Short window the rules classify
pub const SHORT_WINDOW_DAYS: u32 = 7;

/// Baseline window the short window is compared against
pub const BASELINE_WINDOW_DAYS: u32 = 30;

/// Confidence a pattern needs to be predicted
pub const MIN_CONFIDENCE: f64 = 0.6;

/// Minimum gap between two active predictions of the same pattern
pub fn cooldown() -> Duration {
    Duration::hours(24)
}

/// Everything the rules read
#[derive(Debug, Clone)]
pub struct PredictionInputs {
    pub week: MultiMetricTrends,
    pub month: MultiMetricTrends,
    pub stats: StatsSnapshot,
}

/// A pattern that reached the confidence threshold
#[derive(Debug, Clone, PartialEq)]
pub struct Candidate {
    pub pattern_type: PatternType,
    pub confidence: f64,
    pub trigger_factors: Map<String, Value>,
}

struct Factor {
    name: &'static str,
    weight: f64,
    satisfied: bool,
    value: Value,
}

fn factor(name: &'static str, weight: f64, satisfied: bool, value: Value) -> Factor {
    Factor {
        name,
        weight,
        satisfied,
        value,
    }
}

/// Weighted factors for one pattern
fn factors(pattern: PatternType, inputs: &PredictionInputs) -> Vec<Factor> {
    let week = &inputs.week;
    let month = &inputs.month;
    let stats = &inputs.stats;

    // Positive when the short window sits below the baseline
    let energy_drop = round_to(month.avg_energy - week.avg_energy, 6);
    let mood_drop = round_to(month.avg_mood - week.avg_mood, 6);
    let focus_gain = round_to(week.avg_focus - month.avg_focus, 6);

    match pattern {
        PatternType::EnergyCrash => vec![
            factor(
                "energy_trend_7d",
                0.35,
                week.energy_trend == Trend::Declining,
                json!(week.energy_trend),
            ),
            factor("avg_energy_7d", 0.25, week.avg_energy < 0.4, json!(week.avg_energy)),
            factor(
                "focus_trend_7d",
                0.15,
                week.focus_trend == Trend::Declining,
                json!(week.focus_trend),
            ),
            factor("energy_drop_vs_30d", 0.25, energy_drop > 0.15, json!(energy_drop)),
        ],
        PatternType::Procrastination => vec![
            factor("avg_energy_7d", 0.25, week.avg_energy < 0.35, json!(week.avg_energy)),
            factor("avg_mood_7d", 0.2, week.avg_mood < -0.1, json!(week.avg_mood)),
            factor(
                "tasks_completed",
                0.2,
                stats.tasks_completed < 3,
                json!(stats.tasks_completed),
            ),
            factor(
                "mood_trend_7d",
                0.2,
                week.mood_trend == Trend::Declining,
                json!(week.mood_trend),
            ),
            factor("energy_drop_vs_30d", 0.15, energy_drop > 0.1, json!(energy_drop)),
        ],
        PatternType::Hyperfocus => vec![
            factor("avg_focus_7d", 0.35, week.avg_focus > 0.85, json!(week.avg_focus)),
            factor(
                "focus_trend_7d",
                0.25,
                week.focus_trend == Trend::Rising,
                json!(week.focus_trend),
            ),
            factor("avg_energy_7d", 0.2, week.avg_energy < 0.4, json!(week.avg_energy)),
            factor("focus_gain_vs_30d", 0.2, focus_gain > 0.15, json!(focus_gain)),
        ],
        PatternType::DecisionFatigue => vec![
            factor(
                "open_tasks",
                0.3,
                stats.open_tasks_count >= 5,
                json!(stats.open_tasks_count),
            ),
            factor("avg_focus_7d", 0.25, week.avg_focus < 0.35, json!(week.avg_focus)),
            factor(
                "focus_trend_7d",
                0.2,
                week.focus_trend == Trend::Declining,
                json!(week.focus_trend),
            ),
            factor(
                "open_tasks_high",
                0.15,
                stats.open_tasks_count >= 8,
                json!(stats.open_tasks_count),
            ),
            factor("avg_mood_7d", 0.1, week.avg_mood < 0.0, json!(week.avg_mood)),
        ],
        PatternType::SleepDisruption => vec![
            factor("avg_energy_7d", 0.3, week.avg_energy < 0.3, json!(week.avg_energy)),
            factor("avg_mood_7d", 0.2, week.avg_mood < -0.1, json!(week.avg_mood)),
            factor(
                "energy_trend_7d",
                0.2,
                week.energy_trend == Trend::Declining,
                json!(week.energy_trend),
            ),
            factor("energy_drop_vs_30d", 0.2, energy_drop > 0.2, json!(energy_drop)),
            factor("avg_focus_7d", 0.1, week.avg_focus < 0.3, json!(week.avg_focus)),
        ],
        PatternType::SocialMasking => vec![
            factor(
                "tasks_completed",
                0.3,
                stats.tasks_completed >= 8,
                json!(stats.tasks_completed),
            ),
            factor("avg_mood_7d", 0.25, week.avg_mood < -0.1, json!(week.avg_mood)),
            factor(
                "mood_trend_7d",
                0.25,
                week.mood_trend == Trend::Declining,
                json!(week.mood_trend),
            ),
            factor("avg_focus_7d", 0.1, week.avg_focus > 0.7, json!(week.avg_focus)),
            factor("mood_drop_vs_30d", 0.1, mood_drop > 0.15, json!(mood_drop)),
        ],
    }
}

/// Score one pattern; `None` when it stays below the threshold
pub fn score_pattern(pattern: PatternType, inputs: &PredictionInputs) -> Option<Candidate> {
    let mut confidence = 0.0;
    let mut trigger_factors = Map::new();

    for f in factors(pattern, inputs).into_iter().filter(|f| f.satisfied) {
        confidence += f.weight;
        trigger_factors.insert(f.name.to_string(), f.value);
    }

    let confidence = round_to(confidence, 2).min(1.0);
    if confidence < MIN_CONFIDENCE {
        debug!(pattern = %pattern, confidence, "Below confidence threshold");
        return None;
    }

    Some(Candidate {
        pattern_type: pattern,
        confidence,
        trigger_factors,
    })
}

/// Score every pattern
pub fn candidates(inputs: &PredictionInputs) -> Vec<Candidate> {
    PatternType::all()
        .iter()
        .filter_map(|p| score_pattern(*p, inputs))
        .collect()
}

pub struct PatternPredictor {
    config: EngineConfig,
    knowledge: Option<Arc<dyn KnowledgeEnrichment>>,
}

impl PatternPredictor {
    pub fn new(config: EngineConfig, knowledge: Option<Arc<dyn KnowledgeEnrichment>>) -> Self {
        Self { config, knowledge }
    }

    /// Gather the rule inputs; `None` when the short window has no observations
    pub fn inputs(
        &self,
        ctx: &EngineContext<'_>,
        subject_id: &str,
    ) -> Result<Option<PredictionInputs>> {
        let analyzer = TrendAnalyzer::new(ctx.observations);
        let week = analyzer.get_multi_metric_trends(subject_id, SHORT_WINDOW_DAYS)?;
        if week.total_count == 0 {
            return Ok(None);
        }

        let month = analyzer.get_multi_metric_trends(subject_id, BASELINE_WINDOW_DAYS)?;
        let stats = ctx.stats.snapshot(subject_id)?;
        Ok(Some(PredictionInputs { week, month, stats }))
    }

    /// Predict patterns for the subject and persist the new ones
    ///
    /// Returns only the predictions created by this call.
    pub async fn predict(
        &self,
        ctx: &EngineContext<'_>,
        subject_id: &str,
    ) -> Result<Vec<PredictedPattern>> {
        let Some(inputs) = self.inputs(ctx, subject_id)? else {
            debug!(subject = subject_id, "No observations in the last week, skipping predictions");
            return Ok(vec![]);
        };

        let mut created = vec![];
        for candidate in candidates(&inputs) {
            let pattern = candidate.pattern_type;
            if ctx
                .db
                .has_recent_active_prediction(subject_id, pattern, Utc::now() - cooldown())?
            {
                debug!(subject = subject_id, pattern = %pattern, "Prediction in cooldown");
                continue;
            }

            let context = enrich_or_empty(
                self.knowledge.as_ref(),
                subject_id,
                pattern,
                self.config.enrichment_max_results,
                self.config.enrichment_timeout,
            )
            .await;

            let stored = ctx.locks.with_lock(subject_id, || {
                self.persist(ctx, subject_id, candidate, context)
            })?;
            created.extend(stored);
        }

        info!(subject = subject_id, count = created.len(), "Prediction run complete");
        Ok(created)
    }

    /// Re-check the cooldown and insert; caller holds the subject lock
    fn persist(
        &self,
        ctx: &EngineContext<'_>,
        subject_id: &str,
        candidate: Candidate,
        enrichment_context: EnrichmentContext,
    ) -> Result<Option<PredictedPattern>> {
        let now = Utc::now();
        let pattern = candidate.pattern_type;

        if ctx
            .db
            .has_recent_active_prediction(subject_id, pattern, now - cooldown())?
        {
            debug!(subject = subject_id, pattern = %pattern, "Prediction created concurrently");
            return Ok(None);
        }

        let horizon = pattern.horizon();
        let prediction = NewPrediction {
            subject_id: subject_id.to_string(),
            pattern_type: pattern,
            confidence: candidate.confidence,
            predicted_for: now + horizon.duration(),
            time_horizon: horizon,
            trigger_factors: candidate.trigger_factors,
            enrichment_context,
            created_at: now,
        };

        match ctx.db.insert_prediction(&prediction) {
            Ok(Some(id)) => {
                info!(
                    subject = subject_id,
                    pattern = %pattern,
                    confidence = prediction.confidence,
                    horizon = %horizon,
                    "Prediction created"
                );
                ctx.db.get_prediction(id)
            }
            Ok(None) => {
                debug!(subject = subject_id, pattern = %pattern, "Duplicate rejected by store");
                Ok(None)
            }
            Err(e) => {
                warn!(subject = subject_id, pattern = %pattern, error = %e, "Failed to persist prediction");
                Ok(None)
            }
        }
    }

    /// Expire active predictions whose target time has passed
    pub fn expire_old_predictions(&self, ctx: &EngineContext<'_>, subject_id: &str) -> Result<usize> {
        let count = ctx.db.expire_predictions(subject_id, Utc::now())?;
        if count > 0 {
            info!(subject = subject_id, count, "Expired predictions");
        }
        Ok(count)
    }

    /// Record whether an active prediction came true
    pub fn resolve(
        &self,
        ctx: &EngineContext<'_>,
        prediction_id: i64,
        subject_id: &str,
        outcome: PredictionOutcome,
    ) -> Result<PredictedPattern> {
        let resolved = ctx
            .db
            .resolve_prediction(prediction_id, subject_id, outcome, Utc::now())?;
        info!(subject = subject_id, id = prediction_id, status = %resolved.status, "Prediction resolved");
        Ok(resolved)
    }
}
