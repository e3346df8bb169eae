//! Engine orchestration
//!
//! Runs the four components for one subject or for every known subject. A
//! component that fails is logged and reported as missing; the others still run.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use serde::Serialize;

use crate::config::EngineConfig;
use crate::db::Database;
use crate::enrichment::KnowledgeEnrichment;
use crate::error::Result;
use crate::interventions::InterventionDetector;
use crate::models::{
    Intervention, InterventionStatus, PredictedPattern, PredictionStatus, WellbeingScore,
};
use crate::predictions::PatternPredictor;
use crate::sources::{ObservationSource, StatsProvider};
use crate::wellbeing::WellbeingScorer;

/// Per-subject mutex registry
///
/// Serializes the "check cooldown, then persist" section of a component for one
/// subject. Different subjects never contend. An entry lives only while some
/// caller holds or waits on it.
#[derive(Debug, Default)]
pub struct SubjectLocks {
    locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl SubjectLocks {
    pub fn new() -> Self {
        Self::default()
    }

    fn handle(&self, subject_id: &str) -> Arc<Mutex<()>> {
        let mut locks = self.locks.lock().unwrap_or_else(|e| e.into_inner());
        locks
            .entry(subject_id.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    /// Drop the subject's entry when the registry holds the only reference
    fn release(&self, subject_id: &str) {
        let mut locks = self.locks.lock().unwrap_or_else(|e| e.into_inner());
        if locks
            .get(subject_id)
            .is_some_and(|handle| Arc::strong_count(handle) == 1)
        {
            locks.remove(subject_id);
        }
    }

    /// Run `f` while holding the subject's lock
    pub fn with_lock<T>(&self, subject_id: &str, f: impl FnOnce() -> T) -> T {
        let handle = self.handle(subject_id);
        let result = {
            // A panic in another holder leaves no state behind the unit mutex
            let _guard = handle.lock().unwrap_or_else(|e| e.into_inner());
            f()
        };
        drop(handle);
        self.release(subject_id);
        result
    }
}

/// Collaborators a component run needs
pub struct EngineContext<'a> {
    /// Store for derived records
    pub db: &'a Database,
    pub observations: &'a dyn ObservationSource,
    pub stats: &'a dyn StatsProvider,
    pub locks: &'a SubjectLocks,
}

impl<'a> EngineContext<'a> {
    /// Context where the database also serves observations and stats
    pub fn new(db: &'a Database, locks: &'a SubjectLocks) -> Self {
        Self {
            db,
            observations: db,
            stats: db,
            locks,
        }
    }

    /// Context reading observations and stats from host-supplied sources
    pub fn with_sources(
        db: &'a Database,
        observations: &'a dyn ObservationSource,
        stats: &'a dyn StatsProvider,
        locks: &'a SubjectLocks,
    ) -> Self {
        Self {
            db,
            observations,
            stats,
            locks,
        }
    }
}

/// Outcome of one engine pass for a subject. `None` marks a failed component.
#[derive(Debug, Serialize)]
pub struct RunReport {
    pub subject_id: String,
    pub expired: Option<usize>,
    pub predictions: Option<Vec<PredictedPattern>>,
    pub interventions: Option<Vec<Intervention>>,
    pub wellbeing: Option<WellbeingScore>,
}

impl RunReport {
    pub fn is_complete(&self) -> bool {
        self.expired.is_some()
            && self.predictions.is_some()
            && self.interventions.is_some()
            && self.wellbeing.is_some()
    }
}

/// What a summary composer needs for one subject
#[derive(Debug, Serialize)]
pub struct Briefing {
    pub subject_id: String,
    pub wellbeing: Option<WellbeingScore>,
    pub active_predictions: Vec<PredictedPattern>,
    pub pending_interventions: Vec<Intervention>,
}

/// Runs predictor, detector and scorer together
pub struct Engine {
    config: EngineConfig,
    predictor: PatternPredictor,
    detector: InterventionDetector,
    scorer: WellbeingScorer,
}

impl Engine {
    pub fn new(config: EngineConfig, knowledge: Option<Arc<dyn KnowledgeEnrichment>>) -> Self {
        Self {
            predictor: PatternPredictor::new(config.clone(), knowledge),
            detector: InterventionDetector::new(),
            scorer: WellbeingScorer::new(),
            config,
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn predictor(&self) -> &PatternPredictor {
        &self.predictor
    }

    pub fn detector(&self) -> &InterventionDetector {
        &self.detector
    }

    pub fn scorer(&self) -> &WellbeingScorer {
        &self.scorer
    }

    /// Expire, predict, evaluate and score one subject
    pub async fn run_subject(&self, ctx: &EngineContext<'_>, subject_id: &str) -> RunReport {
        let expired = log_failure(
            subject_id,
            "expire",
            self.predictor.expire_old_predictions(ctx, subject_id),
        );
        let predictions = log_failure(
            subject_id,
            "predict",
            self.predictor.predict(ctx, subject_id).await,
        );
        let interventions = log_failure(
            subject_id,
            "evaluate",
            self.detector.evaluate(ctx, subject_id),
        );
        let wellbeing = log_failure(subject_id, "score", self.scorer.compute(ctx, subject_id));

        let report = RunReport {
            subject_id: subject_id.to_string(),
            expired,
            predictions,
            interventions,
            wellbeing,
        };

        tracing::info!(
            subject = subject_id,
            expired = report.expired.unwrap_or(0),
            predictions = report.predictions.as_ref().map_or(0, Vec::len),
            interventions = report.interventions.as_ref().map_or(0, Vec::len),
            complete = report.is_complete(),
            "Engine run complete"
        );
        report
    }

    /// Run every subject known to the database
    pub async fn run_all(&self, ctx: &EngineContext<'_>) -> Result<Vec<RunReport>> {
        let subjects = ctx.db.list_subjects()?;
        let mut reports = Vec::with_capacity(subjects.len());
        for subject in &subjects {
            reports.push(self.run_subject(ctx, subject).await);
        }
        tracing::info!(subjects = subjects.len(), "Engine run finished for all subjects");
        Ok(reports)
    }

    /// Latest score, active predictions and pending interventions
    pub fn briefing(&self, ctx: &EngineContext<'_>, subject_id: &str) -> Result<Briefing> {
        Ok(Briefing {
            subject_id: subject_id.to_string(),
            wellbeing: ctx.db.latest_wellbeing_score(subject_id)?,
            active_predictions: ctx
                .db
                .list_predictions(subject_id, Some(PredictionStatus::Active))?,
            pending_interventions: ctx
                .db
                .list_interventions(subject_id, Some(InterventionStatus::Pending))?,
        })
    }

    /// Active predictions confident enough to notify about
    pub fn notifiable_predictions(
        &self,
        ctx: &EngineContext<'_>,
        subject_id: &str,
    ) -> Result<Vec<PredictedPattern>> {
        ctx.db
            .list_high_confidence_predictions(subject_id, self.config.high_confidence_min)
    }
}

fn log_failure<T>(subject_id: &str, phase: &str, result: Result<T>) -> Option<T> {
    match result {
        Ok(value) => Some(value),
        Err(e) => {
            tracing::warn!(subject = subject_id, phase, error = %e, "Engine phase failed");
            None
        }
    }
}
