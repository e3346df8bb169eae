//! Same-day intervention detection
//!
//! Binary threshold rules over the 7-day snapshot, activity stats and the raw
//! observations of the last three days. A detected type is raised at most once
//! per 12 hours per subject, whatever happened to the earlier intervention.

use chrono::{Duration, Utc};
use tracing::{debug, info, warn};

use crate::engine::EngineContext;
use crate::error::Result;
use crate::models::{
    Intervention, InterventionResponse, InterventionType, NewIntervention, Observation,
    StatsSnapshot, Trend, TrendSnapshot,
};
use crate::trends::TrendAnalyzer;

/// Trend window the rules read
pub const TREND_WINDOW_DAYS: u32 = 7;

/// Raw observation window for the energy-crash rule
pub const RECENT_WINDOW_DAYS: u32 = 3;

/// Minimum gap between two interventions of the same type
pub fn cooldown() -> Duration {
    Duration::hours(12)
}

/// Strict lower bound on average focus for the reactive hyperfocus alert
pub const HYPERFOCUS_FOCUS: f64 = 0.9;

/// A rule that fired, with the values that made it fire
#[derive(Debug, Clone, PartialEq)]
pub struct Detection {
    pub intervention_type: InterventionType,
    pub trigger_pattern: String,
}

impl Detection {
    fn new(intervention_type: InterventionType, trigger_pattern: String) -> Self {
        Self {
            intervention_type,
            trigger_pattern,
        }
    }
}

#[derive(Debug, Default)]
pub struct InterventionDetector;

impl InterventionDetector {
    pub fn new() -> Self {
        Self
    }

    /// Detect and persist interventions for the subject
    ///
    /// Returns only the interventions created by this call.
    pub fn evaluate(&self, ctx: &EngineContext<'_>, subject_id: &str) -> Result<Vec<Intervention>> {
        let analyzer = TrendAnalyzer::new(ctx.observations);
        let trends = analyzer.get_recent_trends(subject_id, TREND_WINDOW_DAYS)?;
        if trends.total_count == 0 {
            debug!(subject = subject_id, "No observations, skipping interventions");
            return Ok(vec![]);
        }

        let stats = ctx.stats.snapshot(subject_id)?;
        let recent = analyzer.recent_observations(subject_id, RECENT_WINDOW_DAYS)?;
        let detections = detect(&trends, &stats, &recent);

        ctx.locks
            .with_lock(subject_id, || self.persist(ctx, subject_id, detections))
    }

    fn persist(
        &self,
        ctx: &EngineContext<'_>,
        subject_id: &str,
        detections: Vec<Detection>,
    ) -> Result<Vec<Intervention>> {
        let mut created = vec![];

        for detection in detections {
            let now = Utc::now();
            let kind = detection.intervention_type;

            if ctx
                .db
                .has_recent_intervention(subject_id, kind, now - cooldown())?
            {
                debug!(subject = subject_id, intervention = %kind, "Intervention in cooldown");
                continue;
            }

            let new = NewIntervention {
                subject_id: subject_id.to_string(),
                intervention_type: kind,
                trigger_pattern: detection.trigger_pattern,
                message: kind.message().to_string(),
                created_at: now,
            };

            match ctx.db.insert_intervention(&new) {
                Ok(Some(id)) => {
                    if let Some(intervention) = ctx.db.get_intervention(id)? {
                        info!(subject = subject_id, intervention = %kind, id, "Intervention raised");
                        created.push(intervention);
                    }
                }
                Ok(None) => {
                    debug!(subject = subject_id, intervention = %kind, "Duplicate rejected by store");
                }
                Err(e) => {
                    warn!(subject = subject_id, intervention = %kind, error = %e, "Failed to persist intervention");
                }
            }
        }

        Ok(created)
    }

    /// Record the subject's response to a pending intervention
    pub fn update_status(
        &self,
        ctx: &EngineContext<'_>,
        intervention_id: i64,
        subject_id: &str,
        response: InterventionResponse,
    ) -> Result<Intervention> {
        let updated = ctx
            .db
            .update_intervention_status(intervention_id, subject_id, response)?;
        info!(subject = subject_id, id = intervention_id, status = %updated.status, "Intervention updated");
        Ok(updated)
    }
}

/// Apply every rule; nothing fires without observations
pub fn detect(
    trends: &TrendSnapshot,
    stats: &StatsSnapshot,
    recent: &[Observation],
) -> Vec<Detection> {
    if trends.total_count == 0 {
        return vec![];
    }

    let mut detections = vec![];

    if trends.avg_focus > HYPERFOCUS_FOCUS {
        detections.push(Detection::new(
            InterventionType::Hyperfocus,
            format!("avg_focus={:.2}", trends.avg_focus),
        ));
    }

    if trends.avg_energy < 0.3 && trends.avg_mood < -0.1 && stats.tasks_completed < 3 {
        detections.push(Detection::new(
            InterventionType::Procrastination,
            format!(
                "avg_energy={:.2}, avg_mood={:.2}, tasks_completed={}",
                trends.avg_energy, trends.avg_mood, stats.tasks_completed
            ),
        ));
    }

    if stats.open_tasks_count >= 5 && trends.avg_focus < 0.3 {
        detections.push(Detection::new(
            InterventionType::DecisionFatigue,
            format!(
                "open_tasks={}, avg_focus={:.2}",
                stats.open_tasks_count, trends.avg_focus
            ),
        ));
    }

    let crash = energy_falling(recent).filter(|_| trends.avg_energy < 0.3);
    if let Some(last_three) = &crash {
        detections.push(Detection::new(
            InterventionType::EnergyCrash,
            format!(
                "energy {:.2} > {:.2} > {:.2}, avg_energy={:.2}",
                last_three[0], last_three[1], last_three[2], trends.avg_energy
            ),
        ));
    }

    if stats.tasks_completed >= 10 && trends.avg_mood < -0.2 && trends.mood_trend == Trend::Declining
    {
        detections.push(Detection::new(
            InterventionType::SocialMasking,
            format!(
                "tasks_completed={}, avg_mood={:.2}, mood_trend=declining",
                stats.tasks_completed, trends.avg_mood
            ),
        ));
    }

    // Low energy already explained by a crash is not reported twice
    if crash.is_none() && trends.avg_energy < 0.25 && trends.avg_mood < 0.0 {
        detections.push(Detection::new(
            InterventionType::SleepDisruption,
            format!(
                "avg_energy={:.2}, avg_mood={:.2}",
                trends.avg_energy, trends.avg_mood
            ),
        ));
    }

    detections
}

/// Last three energy values when they strictly decrease
fn energy_falling(recent: &[Observation]) -> Option<[f64; 3]> {
    let tail = recent.len().checked_sub(3).map(|start| &recent[start..])?;
    let values = [tail[0].energy_level, tail[1].energy_level, tail[2].energy_level];
    (values[0] > values[1] && values[1] > values[2]).then_some(values)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Database;
    use crate::engine::SubjectLocks;
    use crate::error::Error;
    use crate::models::{InterventionStatus, NewObservation};

    fn snapshot(mood: f64, energy: f64, focus: f64) -> TrendSnapshot {
        TrendSnapshot {
            window_days: 7,
            avg_mood: mood,
            avg_energy: energy,
            avg_focus: focus,
            total_count: 5,
            mood_trend: Trend::Stable,
            energy_trend: Trend::Stable,
            focus_trend: Trend::Stable,
            min_mood: mood,
            max_mood: mood,
        }
    }

    fn energies(values: &[f64]) -> Vec<Observation> {
        let now = Utc::now();
        values
            .iter()
            .enumerate()
            .map(|(i, &e)| Observation {
                subject_id: "alice".to_string(),
                timestamp: now - Duration::hours((values.len() - i) as i64),
                mood_score: 0.0,
                energy_level: e,
                focus_score: 0.5,
            })
            .collect()
    }

    fn types(detections: &[Detection]) -> Vec<InterventionType> {
        detections.iter().map(|d| d.intervention_type).collect()
    }

    #[test]
    fn test_hyperfocus_threshold_is_strict() {
        let stats = StatsSnapshot::default();
        assert!(detect(&snapshot(0.0, 0.5, 0.9), &stats, &[]).is_empty());
        assert_eq!(
            types(&detect(&snapshot(0.0, 0.5, 0.91), &stats, &[])),
            vec![InterventionType::Hyperfocus]
        );
    }

    #[test]
    fn test_energy_crash_suppresses_sleep_disruption() {
        let stats = StatsSnapshot {
            tasks_completed: 5,
            ..Default::default()
        };
        let trends = snapshot(-0.05, 0.2, 0.5);

        let crash = detect(&trends, &stats, &energies(&[0.3, 0.2, 0.1]));
        assert_eq!(types(&crash), vec![InterventionType::EnergyCrash]);

        let flat = detect(&trends, &stats, &energies(&[0.2, 0.2, 0.2]));
        assert_eq!(types(&flat), vec![InterventionType::SleepDisruption]);
    }

    #[test]
    fn test_energy_crash_needs_low_average() {
        let stats = StatsSnapshot::default();
        let falling = energies(&[0.9, 0.6, 0.5, 0.4]);
        assert!(detect(&snapshot(0.0, 0.5, 0.5), &stats, &falling).is_empty());
        assert!(detect(&snapshot(0.0, 0.2, 0.5), &stats, &energies(&[0.3, 0.1]))
            .iter()
            .all(|d| d.intervention_type != InterventionType::EnergyCrash));
    }

    #[test]
    fn test_procrastination_and_decision_fatigue() {
        let stats = StatsSnapshot {
            tasks_completed: 1,
            current_streak: 0,
            open_tasks_count: 6,
        };
        let fired = types(&detect(&snapshot(-0.3, 0.28, 0.2), &stats, &[]));
        assert!(fired.contains(&InterventionType::Procrastination));
        assert!(fired.contains(&InterventionType::DecisionFatigue));
        assert!(!fired.contains(&InterventionType::SleepDisruption));
    }

    #[test]
    fn test_social_masking_needs_declining_mood() {
        let stats = StatsSnapshot {
            tasks_completed: 12,
            ..Default::default()
        };
        let mut trends = snapshot(-0.3, 0.6, 0.6);
        assert!(detect(&trends, &stats, &[]).is_empty());

        trends.mood_trend = Trend::Declining;
        assert_eq!(
            types(&detect(&trends, &stats, &[])),
            vec![InterventionType::SocialMasking]
        );
    }

    #[test]
    fn test_no_observations_detects_nothing() {
        let mut trends = snapshot(-1.0, 0.0, 0.0);
        trends.total_count = 0;
        assert!(detect(&trends, &StatsSnapshot::default(), &[]).is_empty());
    }

    fn log(db: &Database, hours_ago: i64, energy: f64) {
        db.insert_observation(&NewObservation {
            subject_id: "alice".to_string(),
            timestamp: Utc::now() - Duration::hours(hours_ago),
            mood_score: -0.05,
            energy_level: energy,
            focus_score: 0.5,
        })
        .unwrap();
    }

    #[test]
    fn test_evaluate_persists_and_cools_down() {
        let db = Database::in_memory().unwrap();
        let locks = SubjectLocks::new();
        let ctx = EngineContext::new(&db, &locks);
        let detector = InterventionDetector::new();

        log(&db, 3, 0.3);
        log(&db, 2, 0.2);
        log(&db, 1, 0.1);

        let first = detector.evaluate(&ctx, "alice").unwrap();
        assert_eq!(first.len(), 1);
        assert_eq!(first[0].intervention_type, InterventionType::EnergyCrash);
        assert_eq!(first[0].status, InterventionStatus::Pending);
        assert_eq!(first[0].message, InterventionType::EnergyCrash.message());

        // Dismissing does not lift the cooldown
        detector
            .update_status(&ctx, first[0].id, "alice", InterventionResponse::Dismissed)
            .unwrap();
        assert!(detector.evaluate(&ctx, "alice").unwrap().is_empty());
        assert_eq!(db.list_interventions("alice", None).unwrap().len(), 1);
    }

    #[test]
    fn test_evaluate_without_observations() {
        let db = Database::in_memory().unwrap();
        let locks = SubjectLocks::new();
        let ctx = EngineContext::new(&db, &locks);
        assert!(InterventionDetector::new()
            .evaluate(&ctx, "alice")
            .unwrap()
            .is_empty());
    }

    #[test]
    fn test_update_status_checks_ownership() {
        let db = Database::in_memory().unwrap();
        let locks = SubjectLocks::new();
        let ctx = EngineContext::new(&db, &locks);
        let detector = InterventionDetector::new();

        let err = detector
            .update_status(&ctx, 999, "alice", InterventionResponse::Acted)
            .unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));

        log(&db, 3, 0.3);
        log(&db, 2, 0.2);
        log(&db, 1, 0.1);
        let raised = detector.evaluate(&ctx, "alice").unwrap();
        let err = detector
            .update_status(&ctx, raised[0].id, "bob", InterventionResponse::Acted)
            .unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));

        let acted = detector
            .update_status(&ctx, raised[0].id, "alice", InterventionResponse::Acted)
            .unwrap();
        assert_eq!(acted.status, InterventionStatus::Acted);
        assert!(matches!(
            detector.update_status(&ctx, raised[0].id, "alice", InterventionResponse::Dismissed),
            Err(Error::InvalidTransition(_))
        ));
    }
}
