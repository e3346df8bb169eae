//! Cadence Core Library
//!
//! Behavioral trend and forecasting engine:
//! - Trailing trend statistics over mood, energy and focus observations
//! - Weighted-confidence pattern predictions with expiry
//! - Threshold-triggered same-day interventions
//! - Composite wellbeing score with a traffic-light zone
//! - Encrypted SQLite persistence with cooldown backstops
//!
//! ## Usage
//!
//! ```rust,ignore
//! use cadence_core::{Database, Engine, EngineConfig, EngineContext, SubjectLocks};
//!
//! let db = Database::new("cadence.db")?;
//! let locks = SubjectLocks::new();
//! let ctx = EngineContext::new(&db, &locks);
//! let engine = Engine::new(EngineConfig::load(None)?, Some(Arc::new(db.clone())));
//! let report = engine.run_subject(&ctx, "alice").await;
//! ```

pub mod config;
pub mod db;
pub mod engine;
pub mod enrichment;
pub mod error;
pub mod interventions;
pub mod models;
pub mod predictions;
pub mod sources;
pub mod trends;
pub mod wellbeing;

pub use config::EngineConfig;
pub use db::Database;
pub use engine::{Briefing, Engine, EngineContext, RunReport, SubjectLocks};
pub use enrichment::{EnrichmentContext, KnowledgeEnrichment, StaticKnowledge};
pub use error::{Error, Result};
pub use interventions::InterventionDetector;
pub use models::*;
pub use predictions::PatternPredictor;
pub use sources::{ObservationSource, StatsProvider};
pub use trends::TrendAnalyzer;
pub use wellbeing::WellbeingScorer;
