//! Composite wellbeing score
//!
//! Combines the 7-day trend snapshot with activity stats into a 0-100 score and
//! a traffic-light zone. Every computation appends a new row; scores are never
//! updated.

use chrono::Utc;
use tracing::info;

use crate::engine::EngineContext;
use crate::error::Result;
use crate::models::{
    ScoreComponents, StatsSnapshot, Trend, TrendSnapshot, WellbeingHistory, WellbeingScore,
    WellbeingZone,
};
use crate::trends::{half_window_trend, mean, round_to, window_start, TrendAnalyzer};

/// Window the score is computed over
pub const SCORE_WINDOW_DAYS: u32 = 7;

/// Score-point difference between history halves that counts as a change
pub const HISTORY_TREND_THRESHOLD: f64 = 3.0;

/// Score used when there is nothing to score
pub const NEUTRAL_SCORE: f64 = 50.0;

const MOOD_WEIGHT: f64 = 0.25;
const ENERGY_WEIGHT: f64 = 0.20;
const FOCUS_WEIGHT: f64 = 0.15;
const TASK_WEIGHT: f64 = 0.15;
const STREAK_WEIGHT: f64 = 0.10;
const CONSISTENCY_WEIGHT: f64 = 0.15;

/// Saturation points for the count-based components
const TASKS_FOR_FULL: f64 = 20.0;
const STREAK_FOR_FULL: f64 = 14.0;
const OBSERVATIONS_FOR_FULL: f64 = 14.0;

#[derive(Debug, Default)]
pub struct WellbeingScorer;

impl WellbeingScorer {
    pub fn new() -> Self {
        Self
    }

    /// Compute and append a wellbeing score for the subject
    pub fn compute(&self, ctx: &EngineContext<'_>, subject_id: &str) -> Result<WellbeingScore> {
        let trends = TrendAnalyzer::new(ctx.observations)
            .get_recent_trends(subject_id, SCORE_WINDOW_DAYS)?;
        let stats = ctx.stats.snapshot(subject_id)?;

        let (score, components) = score_inputs(&trends, &stats);
        let zone = WellbeingZone::from_score(score);

        let stored = ctx
            .db
            .insert_wellbeing_score(subject_id, score, zone, &components, Utc::now())?;

        info!(subject = subject_id, score, zone = %zone, "Wellbeing score recorded");
        Ok(stored)
    }

    /// Scores of the last `days` with their average and direction
    pub fn get_history(
        &self,
        ctx: &EngineContext<'_>,
        subject_id: &str,
        days: u32,
    ) -> Result<WellbeingHistory> {
        let now = Utc::now();
        let since = window_start(now, days);
        let scores = ctx.db.wellbeing_scores_since(subject_id, since)?;

        if scores.is_empty() {
            return Ok(WellbeingHistory {
                scores,
                trend: Trend::Stable,
                average_score: 0.0,
                days,
            });
        }

        let points: Vec<_> = scores.iter().map(|s| (s.created_at, s.score)).collect();
        let midpoint = since + (now - since) / 2;

        Ok(WellbeingHistory {
            trend: half_window_trend(&points, midpoint, HISTORY_TREND_THRESHOLD),
            average_score: round_to(mean(scores.iter().map(|s| s.score)), 1),
            scores,
            days,
        })
    }
}

/// Score and normalized components for a trend snapshot and stats
///
/// With no observations, tasks or streak the neutral score is returned and the
/// components are marked as no data.
pub fn score_inputs(trends: &TrendSnapshot, stats: &StatsSnapshot) -> (f64, ScoreComponents) {
    if trends.total_count == 0 && stats.tasks_completed == 0 && stats.current_streak == 0 {
        return (NEUTRAL_SCORE, ScoreComponents::NoData);
    }

    let mood = (trends.avg_mood + 1.0) / 2.0;
    let energy = trends.avg_energy;
    let focus = trends.avg_focus;
    let tasks = (stats.tasks_completed as f64 / TASKS_FOR_FULL).min(1.0);
    let streak = (stats.current_streak as f64 / STREAK_FOR_FULL).min(1.0);
    let consistency = (trends.total_count as f64 / OBSERVATIONS_FOR_FULL).min(1.0);

    let weighted = MOOD_WEIGHT * mood
        + ENERGY_WEIGHT * energy
        + FOCUS_WEIGHT * focus
        + TASK_WEIGHT * tasks
        + STREAK_WEIGHT * streak
        + CONSISTENCY_WEIGHT * consistency;

    let score = round_to(100.0 * weighted, 1).clamp(0.0, 100.0);

    (
        score,
        ScoreComponents::Computed {
            mood: round_to(mood, 4),
            energy: round_to(energy, 4),
            focus: round_to(focus, 4),
            tasks: round_to(tasks, 4),
            streak: round_to(streak, 4),
            consistency: round_to(consistency, 4),
        },
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Database;
    use crate::engine::SubjectLocks;
    use crate::models::NewObservation;
    use chrono::Duration;

    fn snapshot(count: usize, mood: f64, energy: f64, focus: f64) -> TrendSnapshot {
        TrendSnapshot {
            window_days: 7,
            avg_mood: mood,
            avg_energy: energy,
            avg_focus: focus,
            total_count: count,
            mood_trend: Trend::Stable,
            energy_trend: Trend::Stable,
            focus_trend: Trend::Stable,
            min_mood: mood,
            max_mood: mood,
        }
    }

    fn stats(tasks: u32, streak: u32) -> StatsSnapshot {
        StatsSnapshot {
            tasks_completed: tasks,
            current_streak: streak,
            open_tasks_count: 0,
        }
    }

    #[test]
    fn test_maximal_inputs_are_green() {
        let (score, components) = score_inputs(&snapshot(10, 1.0, 1.0, 1.0), &stats(50, 14));
        assert!(score >= 70.0, "score was {}", score);
        assert!(score <= 100.0);
        assert_eq!(WellbeingZone::from_score(score), WellbeingZone::Green);
        assert!(matches!(components, ScoreComponents::Computed { tasks, .. } if tasks == 1.0));
    }

    #[test]
    fn test_minimal_inputs_are_red() {
        let (score, _) = score_inputs(&snapshot(1, -1.0, 0.0, 0.0), &stats(0, 0));
        assert!(score <= 30.0, "score was {}", score);
        assert!(score >= 0.0);
        assert_eq!(WellbeingZone::from_score(score), WellbeingZone::Red);
    }

    #[test]
    fn test_empty_inputs_are_neutral() {
        let (score, components) = score_inputs(&snapshot(0, 0.0, 0.0, 0.0), &stats(0, 0));
        assert_eq!(score, 50.0);
        assert_eq!(WellbeingZone::from_score(score), WellbeingZone::Yellow);
        assert_eq!(components, ScoreComponents::NoData);
    }

    #[test]
    fn test_tasks_alone_are_scored() {
        // No observations but some activity: computed, not the neutral fallback
        let (score, components) = score_inputs(&snapshot(0, 0.0, 0.0, 0.0), &stats(20, 0));
        assert!(matches!(components, ScoreComponents::Computed { .. }));
        assert_eq!(score, 27.5);
    }

    #[test]
    fn test_score_is_rounded_to_one_decimal() {
        let (score, _) = score_inputs(&snapshot(3, 0.13, 0.47, 0.52), &stats(7, 3));
        assert_eq!(score, (score * 10.0).round() / 10.0);
    }

    #[test]
    fn test_compute_appends_rows() {
        let db = Database::in_memory().unwrap();
        let locks = SubjectLocks::new();
        let ctx = EngineContext::new(&db, &locks);
        let scorer = WellbeingScorer::new();

        let first = scorer.compute(&ctx, "alice").unwrap();
        assert_eq!(first.score, 50.0);
        assert_eq!(first.zone, WellbeingZone::Yellow);

        db.insert_observation(&NewObservation {
            subject_id: "alice".to_string(),
            timestamp: Utc::now() - Duration::hours(1),
            mood_score: 0.8,
            energy_level: 0.9,
            focus_score: 0.9,
        })
        .unwrap();
        let second = scorer.compute(&ctx, "alice").unwrap();
        assert_ne!(first.id, second.id);

        let history = scorer.get_history(&ctx, "alice", 30).unwrap();
        assert_eq!(history.scores.len(), 2);
        assert_eq!(history.days, 30);
        // Both rows sit in the second half of the window
        assert_eq!(history.trend, Trend::Stable);
    }

    #[test]
    fn test_history_trend_uses_score_threshold() {
        let db = Database::in_memory().unwrap();
        let locks = SubjectLocks::new();
        let ctx = EngineContext::new(&db, &locks);
        let now = Utc::now();

        for (days_ago, score) in [(25, 40.0), (20, 42.0), (5, 44.0), (1, 45.0)] {
            db.insert_wellbeing_score(
                "alice",
                score,
                WellbeingZone::from_score(score),
                &ScoreComponents::NoData,
                now - Duration::days(days_ago),
            )
            .unwrap();
        }

        let history = WellbeingScorer::new().get_history(&ctx, "alice", 30).unwrap();
        // 44.5 - 41.0 = 3.5 points
        assert_eq!(history.trend, Trend::Rising);
        assert_eq!(history.average_score, 42.8);

        let empty = WellbeingScorer::new().get_history(&ctx, "bob", 30).unwrap();
        assert_eq!(empty.average_score, 0.0);
        assert_eq!(empty.trend, Trend::Stable);
    }
}
