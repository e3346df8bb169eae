//! Data models for Cadence

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::{Error, Result};

// ========== Observations ==========

/// A single behavioral observation produced by the upstream session analyzer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Observation {
    pub subject_id: String,
    pub timestamp: DateTime<Utc>,
    /// Mood in [-1, 1]
    pub mood_score: f64,
    /// Energy in [0, 1]
    pub energy_level: f64,
    /// Focus in [0, 1]
    pub focus_score: f64,
}

/// Observation to be ingested (validated before it reaches the log)
#[derive(Debug, Clone)]
pub struct NewObservation {
    pub subject_id: String,
    pub timestamp: DateTime<Utc>,
    pub mood_score: f64,
    pub energy_level: f64,
    pub focus_score: f64,
}

impl NewObservation {
    /// Reject out-of-range or non-finite scores at the ingestion boundary
    pub fn validate(&self) -> Result<()> {
        if self.subject_id.trim().is_empty() {
            return Err(Error::InvalidData("subject_id must not be empty".into()));
        }
        check_range("mood_score", self.mood_score, -1.0, 1.0)?;
        check_range("energy_level", self.energy_level, 0.0, 1.0)?;
        check_range("focus_score", self.focus_score, 0.0, 1.0)?;
        Ok(())
    }
}

fn check_range(name: &str, value: f64, min: f64, max: f64) -> Result<()> {
    if !value.is_finite() || value < min || value > max {
        return Err(Error::InvalidData(format!(
            "{} must be within [{}, {}], got {}",
            name, min, max, value
        )));
    }
    Ok(())
}

/// Activity statistics supplied by the host (tasks, streaks)
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatsSnapshot {
    pub tasks_completed: u32,
    pub current_streak: u32,
    pub open_tasks_count: u32,
}

// ========== Trends ==========

/// Direction of a metric across a window
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Trend {
    Rising,
    Declining,
    Stable,
}

impl Trend {
    /// Classify a second-half minus first-half difference against a symmetric threshold
    pub fn classify(diff: f64, threshold: f64) -> Self {
        if diff > threshold {
            Trend::Rising
        } else if diff < -threshold {
            Trend::Declining
        } else {
            Trend::Stable
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Trend::Rising => "rising",
            Trend::Declining => "declining",
            Trend::Stable => "stable",
        }
    }
}

impl fmt::Display for Trend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Trailing statistics over a window of observations
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrendSnapshot {
    pub window_days: u32,
    pub avg_mood: f64,
    pub avg_energy: f64,
    pub avg_focus: f64,
    pub total_count: usize,
    pub mood_trend: Trend,
    pub energy_trend: Trend,
    pub focus_trend: Trend,
    pub min_mood: f64,
    pub max_mood: f64,
}

/// Per-metric averages and directions, as compared across windows by the predictor
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MultiMetricTrends {
    pub window_days: u32,
    pub avg_mood: f64,
    pub avg_energy: f64,
    pub avg_focus: f64,
    pub total_count: usize,
    pub mood_trend: Trend,
    pub energy_trend: Trend,
    pub focus_trend: Trend,
}

// ========== Predicted patterns ==========

/// Behavioral patterns the predictor can forecast
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PatternType {
    EnergyCrash,
    Procrastination,
    Hyperfocus,
    DecisionFatigue,
    SleepDisruption,
    SocialMasking,
}

impl PatternType {
    pub fn as_str(&self) -> &'static str {
        match self {
            PatternType::EnergyCrash => "energy_crash",
            PatternType::Procrastination => "procrastination",
            PatternType::Hyperfocus => "hyperfocus",
            PatternType::DecisionFatigue => "decision_fatigue",
            PatternType::SleepDisruption => "sleep_disruption",
            PatternType::SocialMasking => "social_masking",
        }
    }

    pub fn all() -> &'static [PatternType] {
        &[
            PatternType::EnergyCrash,
            PatternType::Procrastination,
            PatternType::Hyperfocus,
            PatternType::DecisionFatigue,
            PatternType::SleepDisruption,
            PatternType::SocialMasking,
        ]
    }

    /// How far ahead a forecast of this pattern looks
    pub fn horizon(&self) -> TimeHorizon {
        match self {
            PatternType::EnergyCrash => TimeHorizon::Hours24,
            PatternType::Procrastination => TimeHorizon::Days3,
            PatternType::Hyperfocus => TimeHorizon::Hours24,
            PatternType::DecisionFatigue => TimeHorizon::Hours24,
            PatternType::SleepDisruption => TimeHorizon::Days3,
            PatternType::SocialMasking => TimeHorizon::Days7,
        }
    }
}

impl fmt::Display for PatternType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for PatternType {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "energy_crash" => Ok(PatternType::EnergyCrash),
            "procrastination" => Ok(PatternType::Procrastination),
            "hyperfocus" => Ok(PatternType::Hyperfocus),
            "decision_fatigue" => Ok(PatternType::DecisionFatigue),
            "sleep_disruption" => Ok(PatternType::SleepDisruption),
            "social_masking" => Ok(PatternType::SocialMasking),
            _ => Err(format!("Unknown pattern type: {}", s)),
        }
    }
}

/// Forecast horizon
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TimeHorizon {
    #[serde(rename = "24h")]
    Hours24,
    #[serde(rename = "3d")]
    Days3,
    #[serde(rename = "7d")]
    Days7,
}

impl TimeHorizon {
    pub fn as_str(&self) -> &'static str {
        match self {
            TimeHorizon::Hours24 => "24h",
            TimeHorizon::Days3 => "3d",
            TimeHorizon::Days7 => "7d",
        }
    }

    pub fn duration(&self) -> Duration {
        match self {
            TimeHorizon::Hours24 => Duration::hours(24),
            TimeHorizon::Days3 => Duration::days(3),
            TimeHorizon::Days7 => Duration::days(7),
        }
    }
}

impl fmt::Display for TimeHorizon {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for TimeHorizon {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "24h" => Ok(TimeHorizon::Hours24),
            "3d" => Ok(TimeHorizon::Days3),
            "7d" => Ok(TimeHorizon::Days7),
            _ => Err(format!("Unknown time horizon: {}", s)),
        }
    }
}

/// Lifecycle of a prediction. Only `Active` may change, and only to a terminal state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PredictionStatus {
    Active,
    Confirmed,
    Avoided,
    Expired,
}

impl PredictionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PredictionStatus::Active => "active",
            PredictionStatus::Confirmed => "confirmed",
            PredictionStatus::Avoided => "avoided",
            PredictionStatus::Expired => "expired",
        }
    }

    pub fn can_transition_to(&self, next: PredictionStatus) -> bool {
        matches!(
            (self, next),
            (
                PredictionStatus::Active,
                PredictionStatus::Confirmed | PredictionStatus::Avoided | PredictionStatus::Expired
            )
        )
    }
}

impl fmt::Display for PredictionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for PredictionStatus {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "active" => Ok(PredictionStatus::Active),
            "confirmed" => Ok(PredictionStatus::Confirmed),
            "avoided" => Ok(PredictionStatus::Avoided),
            "expired" => Ok(PredictionStatus::Expired),
            _ => Err(format!("Unknown prediction status: {}", s)),
        }
    }
}

/// Outcome a user can report for a prediction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PredictionOutcome {
    Confirmed,
    Avoided,
}

impl From<PredictionOutcome> for PredictionStatus {
    fn from(outcome: PredictionOutcome) -> Self {
        match outcome {
            PredictionOutcome::Confirmed => PredictionStatus::Confirmed,
            PredictionOutcome::Avoided => PredictionStatus::Avoided,
        }
    }
}

impl FromStr for PredictionOutcome {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "confirmed" => Ok(PredictionOutcome::Confirmed),
            "avoided" => Ok(PredictionOutcome::Avoided),
            _ => Err(format!("Prediction can only be resolved as confirmed or avoided, got: {}", s)),
        }
    }
}

/// A prediction ready to be persisted
#[derive(Debug, Clone)]
pub struct NewPrediction {
    pub subject_id: String,
    pub pattern_type: PatternType,
    pub confidence: f64,
    pub predicted_for: DateTime<Utc>,
    pub time_horizon: TimeHorizon,
    pub trigger_factors: serde_json::Map<String, serde_json::Value>,
    pub enrichment_context: serde_json::Map<String, serde_json::Value>,
    pub created_at: DateTime<Utc>,
}

/// A persisted forward-looking prediction
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PredictedPattern {
    pub id: i64,
    pub subject_id: String,
    pub pattern_type: PatternType,
    pub confidence: f64,
    pub predicted_for: DateTime<Utc>,
    pub time_horizon: TimeHorizon,
    pub trigger_factors: serde_json::Map<String, serde_json::Value>,
    pub enrichment_context: serde_json::Map<String, serde_json::Value>,
    pub status: PredictionStatus,
    pub created_at: DateTime<Utc>,
    pub resolved_at: Option<DateTime<Utc>>,
}

// ========== Interventions ==========

/// Same-day intervention categories
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InterventionType {
    Hyperfocus,
    Procrastination,
    DecisionFatigue,
    /// Reserved; no detection rule exists for it yet
    Transition,
    EnergyCrash,
    SleepDisruption,
    SocialMasking,
}

impl InterventionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            InterventionType::Hyperfocus => "hyperfocus",
            InterventionType::Procrastination => "procrastination",
            InterventionType::DecisionFatigue => "decision_fatigue",
            InterventionType::Transition => "transition",
            InterventionType::EnergyCrash => "energy_crash",
            InterventionType::SleepDisruption => "sleep_disruption",
            InterventionType::SocialMasking => "social_masking",
        }
    }

    /// Fixed user-facing message for this intervention type
    pub fn message(&self) -> &'static str {
        match self {
            InterventionType::Hyperfocus => {
                "You've been deeply focused for a while. Take a short break, stretch, and drink some water."
            }
            InterventionType::Procrastination => {
                "Things feel heavy right now. Pick the smallest next step on one task and start with just five minutes."
            }
            InterventionType::DecisionFatigue => {
                "There's a lot on your plate. Choose one task to focus on and park the rest for later."
            }
            InterventionType::Transition => {
                "Switching gears can be hard. Take a moment to wrap up before starting the next thing."
            }
            InterventionType::EnergyCrash => {
                "Your energy has been dropping. Consider a real break, a snack, or a lighter task for now."
            }
            InterventionType::SleepDisruption => {
                "Low energy and mood can follow poor sleep. Try winding down a little earlier tonight."
            }
            InterventionType::SocialMasking => {
                "You've been getting a lot done while feeling low. It's okay to slow down and check in with yourself."
            }
        }
    }
}

impl fmt::Display for InterventionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for InterventionType {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "hyperfocus" => Ok(InterventionType::Hyperfocus),
            "procrastination" => Ok(InterventionType::Procrastination),
            "decision_fatigue" => Ok(InterventionType::DecisionFatigue),
            "transition" => Ok(InterventionType::Transition),
            "energy_crash" => Ok(InterventionType::EnergyCrash),
            "sleep_disruption" => Ok(InterventionType::SleepDisruption),
            "social_masking" => Ok(InterventionType::SocialMasking),
            _ => Err(format!("Unknown intervention type: {}", s)),
        }
    }
}

/// Lifecycle of an intervention. Only `Pending` may change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InterventionStatus {
    Pending,
    Dismissed,
    Acted,
}

impl InterventionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            InterventionStatus::Pending => "pending",
            InterventionStatus::Dismissed => "dismissed",
            InterventionStatus::Acted => "acted",
        }
    }

    pub fn can_transition_to(&self, next: InterventionStatus) -> bool {
        matches!(
            (self, next),
            (
                InterventionStatus::Pending,
                InterventionStatus::Dismissed | InterventionStatus::Acted
            )
        )
    }
}

impl fmt::Display for InterventionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for InterventionStatus {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "pending" => Ok(InterventionStatus::Pending),
            "dismissed" => Ok(InterventionStatus::Dismissed),
            "acted" => Ok(InterventionStatus::Acted),
            _ => Err(format!("Unknown intervention status: {}", s)),
        }
    }
}

/// Response a user can give to an intervention
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InterventionResponse {
    Dismissed,
    Acted,
}

impl From<InterventionResponse> for InterventionStatus {
    fn from(response: InterventionResponse) -> Self {
        match response {
            InterventionResponse::Dismissed => InterventionStatus::Dismissed,
            InterventionResponse::Acted => InterventionStatus::Acted,
        }
    }
}

impl FromStr for InterventionResponse {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "dismissed" => Ok(InterventionResponse::Dismissed),
            "acted" => Ok(InterventionResponse::Acted),
            _ => Err(format!("Intervention can only be dismissed or acted on, got: {}", s)),
        }
    }
}

/// An intervention ready to be persisted
#[derive(Debug, Clone)]
pub struct NewIntervention {
    pub subject_id: String,
    pub intervention_type: InterventionType,
    pub trigger_pattern: String,
    pub message: String,
    pub created_at: DateTime<Utc>,
}

/// A persisted same-day intervention
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Intervention {
    pub id: i64,
    pub subject_id: String,
    #[serde(rename = "type")]
    pub intervention_type: InterventionType,
    pub trigger_pattern: String,
    pub message: String,
    pub status: InterventionStatus,
    pub created_at: DateTime<Utc>,
}

// ========== Wellbeing ==========

/// Traffic-light zone derived from a wellbeing score
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WellbeingZone {
    Red,
    Yellow,
    Green,
}

impl WellbeingZone {
    /// `score <= 30` is red, `score <= 60` is yellow, anything higher is green
    pub fn from_score(score: f64) -> Self {
        if score <= 30.0 {
            WellbeingZone::Red
        } else if score <= 60.0 {
            WellbeingZone::Yellow
        } else {
            WellbeingZone::Green
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            WellbeingZone::Red => "red",
            WellbeingZone::Yellow => "yellow",
            WellbeingZone::Green => "green",
        }
    }
}

impl fmt::Display for WellbeingZone {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for WellbeingZone {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "red" => Ok(WellbeingZone::Red),
            "yellow" => Ok(WellbeingZone::Yellow),
            "green" => Ok(WellbeingZone::Green),
            _ => Err(format!("Unknown wellbeing zone: {}", s)),
        }
    }
}

/// Normalized inputs that produced a wellbeing score
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ScoreComponents {
    /// Nothing to score; the neutral fallback was used
    NoData,
    Computed {
        mood: f64,
        energy: f64,
        focus: f64,
        tasks: f64,
        streak: f64,
        consistency: f64,
    },
}

/// A persisted wellbeing score (append-only)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WellbeingScore {
    pub id: i64,
    pub subject_id: String,
    pub score: f64,
    pub zone: WellbeingZone,
    pub components: ScoreComponents,
    pub created_at: DateTime<Utc>,
}

/// Wellbeing scores over a window with their direction
#[derive(Debug, Clone, Serialize)]
pub struct WellbeingHistory {
    pub scores: Vec<WellbeingScore>,
    pub trend: Trend,
    pub average_score: f64,
    pub days: u32,
}
