//! Trend analysis over the observation log
//!
//! Averages each metric over a trailing window and classifies its direction by
//! splitting the window at its temporal midpoint and comparing the mean of the
//! second half against the first.

use chrono::{DateTime, Duration, Utc};

use crate::error::Result;
use crate::models::{MultiMetricTrends, Observation, Trend, TrendSnapshot};
use crate::sources::ObservationSource;

/// Half-window difference that counts as a change, on the metric scale
pub const METRIC_TREND_THRESHOLD: f64 = 0.1;

/// Read-only analyzer over an observation source
pub struct TrendAnalyzer<'a> {
    source: &'a dyn ObservationSource,
}

impl<'a> TrendAnalyzer<'a> {
    pub fn new(source: &'a dyn ObservationSource) -> Self {
        Self { source }
    }

    /// Averages, min/max mood and per-metric trends over the last `days`
    pub fn get_recent_trends(&self, subject_id: &str, days: u32) -> Result<TrendSnapshot> {
        let now = Utc::now();
        let since = window_start(now, days);
        let observations = self.source.fetch(subject_id, since)?;
        Ok(summarize(&observations, days, since, now))
    }

    /// Averages and independent mood/energy/focus trends over the last `days`
    pub fn get_multi_metric_trends(
        &self,
        subject_id: &str,
        days: u32,
    ) -> Result<MultiMetricTrends> {
        let snapshot = self.get_recent_trends(subject_id, days)?;
        Ok(MultiMetricTrends::from(&snapshot))
    }

    /// Raw observations of the last `days`, oldest first
    pub fn recent_observations(&self, subject_id: &str, days: u32) -> Result<Vec<Observation>> {
        self.source
            .fetch(subject_id, window_start(Utc::now(), days))
    }
}

impl From<&TrendSnapshot> for MultiMetricTrends {
    fn from(s: &TrendSnapshot) -> Self {
        Self {
            window_days: s.window_days,
            avg_mood: s.avg_mood,
            avg_energy: s.avg_energy,
            avg_focus: s.avg_focus,
            total_count: s.total_count,
            mood_trend: s.mood_trend,
            energy_trend: s.energy_trend,
            focus_trend: s.focus_trend,
        }
    }
}

pub(crate) fn window_start(now: DateTime<Utc>, days: u32) -> DateTime<Utc> {
    now - Duration::days(days as i64)
}

/// Summarize observations that fall in `[since, now]`
///
/// Zero observations give zero averages and stable trends.
pub fn summarize(
    observations: &[Observation],
    window_days: u32,
    since: DateTime<Utc>,
    now: DateTime<Utc>,
) -> TrendSnapshot {
    if observations.is_empty() {
        return TrendSnapshot {
            window_days,
            avg_mood: 0.0,
            avg_energy: 0.0,
            avg_focus: 0.0,
            total_count: 0,
            mood_trend: Trend::Stable,
            energy_trend: Trend::Stable,
            focus_trend: Trend::Stable,
            min_mood: 0.0,
            max_mood: 0.0,
        };
    }

    let midpoint = since + (now - since) / 2;
    let series = |metric: fn(&Observation) -> f64| -> Vec<(DateTime<Utc>, f64)> {
        observations
            .iter()
            .map(|o| (o.timestamp, metric(o)))
            .collect()
    };

    let mood = series(|o| o.mood_score);
    let energy = series(|o| o.energy_level);
    let focus = series(|o| o.focus_score);

    let min_mood = mood.iter().map(|(_, v)| *v).fold(f64::INFINITY, f64::min);
    let max_mood = mood.iter().map(|(_, v)| *v).fold(f64::NEG_INFINITY, f64::max);

    TrendSnapshot {
        window_days,
        avg_mood: mean(mood.iter().map(|(_, v)| *v)),
        avg_energy: mean(energy.iter().map(|(_, v)| *v)),
        avg_focus: mean(focus.iter().map(|(_, v)| *v)),
        total_count: observations.len(),
        mood_trend: half_window_trend(&mood, midpoint, METRIC_TREND_THRESHOLD),
        energy_trend: half_window_trend(&energy, midpoint, METRIC_TREND_THRESHOLD),
        focus_trend: half_window_trend(&focus, midpoint, METRIC_TREND_THRESHOLD),
        min_mood,
        max_mood,
    }
}

/// Arithmetic mean; 0 for no values
pub(crate) fn mean(values: impl Iterator<Item = f64>) -> f64 {
    let (sum, count) = values.fold((0.0, 0usize), |(s, c), v| (s + v, c + 1));
    if count == 0 {
        return 0.0;
    }
    sum / count as f64
}

pub(crate) fn round_to(value: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    (value * factor).round() / factor
}

/// Compare the mean after `midpoint` with the mean before it
///
/// A half with no points makes the trend stable. The difference is rounded to
/// 6 decimals so float noise cannot push it across the threshold.
pub(crate) fn half_window_trend(
    points: &[(DateTime<Utc>, f64)],
    midpoint: DateTime<Utc>,
    threshold: f64,
) -> Trend {
    let (first, second): (Vec<_>, Vec<_>) = points.iter().partition(|(ts, _)| *ts < midpoint);
    if first.is_empty() || second.is_empty() {
        return Trend::Stable;
    }

    let first_avg = mean(first.iter().map(|(_, v)| *v));
    let second_avg = mean(second.iter().map(|(_, v)| *v));
    Trend::classify(round_to(second_avg - first_avg, 6), threshold)
}
