//! CLI command implementations
//!
//! Commands are organized by domain:
//! - `core` - Init and shared utilities (open_db, build_engine, print_json)
//! - `observations` - Observation logging, stats, knowledge facts, trends
//! - `engine` - Predict, evaluate, score, history, expire, run, briefing
//! - `records` - Listing and resolving predictions and interventions

pub mod core;
pub mod engine;
pub mod observations;
pub mod records;

// Re-export command functions for main.rs
pub use self::core::*;
pub use engine::*;
pub use observations::*;
pub use records::*;

/// Truncate a string to a maximum length, adding "..." if truncated
pub fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max.saturating_sub(3)).collect();
        format!("{}...", kept)
    }
}
