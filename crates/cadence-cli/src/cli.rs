//! CLI argument definitions using clap
//!
//! This module contains all the clap structs and enums for parsing CLI arguments.
//! The actual command implementations are in the `commands` module.

use std::path::PathBuf;

use cadence_core::models::{
    InterventionResponse, InterventionStatus, PredictionOutcome, PredictionStatus,
};
use clap::{Parser, Subcommand};

/// Cadence - Behavioral trends, forecasts and wellbeing
#[derive(Parser)]
#[command(name = "cadence")]
#[command(about = "Behavioral trend and forecasting engine", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Database path
    #[arg(long, default_value = "cadence.db", global = true)]
    pub db: PathBuf,

    /// Engine config file (defaults to the data dir override, then built-in defaults)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Disable database encryption (not recommended for production)
    ///
    /// By default, the database is encrypted using SQLCipher.
    /// Set CADENCE_DB_KEY environment variable with your passphrase.
    /// Use --no-encrypt only for development or testing.
    #[arg(long, global = true)]
    pub no_encrypt: bool,

    /// Print results as JSON
    #[arg(long, global = true)]
    pub json: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Initialize the database
    Init,

    /// Record a behavioral observation
    Log {
        /// Subject the observation belongs to
        subject: String,

        /// Mood from -1 to 1
        #[arg(long, allow_hyphen_values = true)]
        mood: f64,

        /// Energy from 0 to 1
        #[arg(long)]
        energy: f64,

        /// Focus from 0 to 1
        #[arg(long)]
        focus: f64,

        /// Observation time (RFC 3339, defaults to now)
        #[arg(long)]
        at: Option<String>,
    },

    /// Show or update a subject's activity stats
    Stats {
        subject: String,

        /// Tasks completed
        #[arg(long)]
        tasks_completed: Option<u32>,

        /// Current streak in days
        #[arg(long)]
        streak: Option<u32>,

        /// Open tasks
        #[arg(long)]
        open_tasks: Option<u32>,
    },

    /// Manage knowledge facts used to enrich predictions
    Facts {
        #[command(subcommand)]
        action: FactsAction,
    },

    /// Show trailing trends
    Trends {
        subject: String,

        /// Window in days
        #[arg(short, long, default_value = "7")]
        days: u32,
    },

    /// Predict upcoming patterns
    Predict { subject: String },

    /// Detect same-day interventions
    Evaluate { subject: String },

    /// Compute a wellbeing score
    Score { subject: String },

    /// Show wellbeing score history
    History {
        subject: String,

        /// Window in days (defaults to the configured history window)
        #[arg(short, long)]
        days: Option<u32>,
    },

    /// Expire predictions whose target time has passed
    Expire {
        /// Only this subject (defaults to every subject)
        #[arg(long)]
        subject: Option<String>,
    },

    /// Run expire, predict, evaluate and score together
    Run {
        /// Only this subject (defaults to every subject)
        #[arg(long)]
        subject: Option<String>,
    },

    /// List predictions
    Predictions {
        subject: String,

        /// Filter by status: active, confirmed, avoided, expired
        #[arg(long)]
        status: Option<PredictionStatus>,
    },

    /// List interventions
    Interventions {
        subject: String,

        /// Filter by status: pending, dismissed, acted
        #[arg(long)]
        status: Option<InterventionStatus>,
    },

    /// Record the outcome of a prediction
    Resolve {
        /// Prediction ID
        id: i64,

        /// Subject that owns the prediction
        #[arg(long)]
        subject: String,

        /// Outcome: confirmed or avoided
        #[arg(long)]
        status: PredictionOutcome,
    },

    /// Respond to an intervention
    Intervention {
        /// Intervention ID
        id: i64,

        /// Subject that owns the intervention
        #[arg(long)]
        subject: String,

        /// Response: dismissed or acted
        #[arg(long)]
        status: InterventionResponse,
    },

    /// Latest score, active predictions and pending interventions
    Briefing { subject: String },
}

#[derive(Subcommand)]
pub enum FactsAction {
    /// Add a fact about a subject
    Add { subject: String, fact: String },

    /// List a subject's facts
    List { subject: String },
}
