//! CLI command tests
//!
//! This module contains all tests for the CLI commands.

use cadence_core::db::Database;
use cadence_core::models::{
    InterventionResponse, InterventionStatus, PredictionOutcome, PredictionStatus,
    StatsSnapshot,
};
use cadence_core::{Engine, EngineConfig};
use chrono::{Duration, Utc};
use clap::Parser;

use crate::cli::{Cli, Commands, FactsAction};
use crate::commands::{self, truncate};

fn setup_test_db() -> Database {
    Database::in_memory().unwrap()
}

fn engine() -> Engine {
    Engine::new(EngineConfig::default(), None)
}

fn log_at(db: &Database, subject: &str, hours_ago: i64, mood: f64, energy: f64, focus: f64) {
    let at = (Utc::now() - Duration::hours(hours_ago)).to_rfc3339();
    commands::cmd_log(db, subject, mood, energy, focus, Some(&at), false).unwrap();
}

/// Three falling energy logs over a low week
fn seed_crash(db: &Database) {
    log_at(db, "alice", 6 * 24, 0.0, 0.4, 0.5);
    log_at(db, "alice", 30, 0.0, 0.3, 0.5);
    log_at(db, "alice", 20, 0.0, 0.2, 0.5);
    log_at(db, "alice", 10, 0.0, 0.1, 0.5);
    commands::cmd_stats(db, "alice", Some(5), Some(1), Some(2), false).unwrap();
}

// ========== Argument Parsing Tests ==========

#[test]
fn test_parse_log_with_negative_mood() {
    let cli = Cli::try_parse_from([
        "cadence", "--no-encrypt", "log", "alice", "--mood", "-0.4", "--energy", "0.5",
        "--focus", "0.6",
    ])
    .unwrap();

    assert!(cli.no_encrypt);
    match cli.command {
        Commands::Log { subject, mood, .. } => {
            assert_eq!(subject, "alice");
            assert_eq!(mood, -0.4);
        }
        _ => panic!("expected log command"),
    }
}

#[test]
fn test_parse_resolve_status() {
    let cli = Cli::try_parse_from([
        "cadence", "resolve", "7", "--subject", "alice", "--status", "avoided", "--json",
    ])
    .unwrap();
    assert!(cli.json);
    assert!(matches!(
        cli.command,
        Commands::Resolve {
            id: 7,
            status: PredictionOutcome::Avoided,
            ..
        }
    ));

    // Expired is set by the engine, not by users
    assert!(Cli::try_parse_from([
        "cadence", "resolve", "7", "--subject", "alice", "--status", "expired",
    ])
    .is_err());
    assert!(Cli::try_parse_from([
        "cadence", "intervention", "3", "--subject", "alice", "--status", "pending",
    ])
    .is_err());
}

#[test]
fn test_parse_facts_add() {
    let cli = Cli::try_parse_from(["cadence", "facts", "add", "alice", "Naps help"]).unwrap();
    match cli.command {
        Commands::Facts {
            action: FactsAction::Add { subject, fact },
        } => {
            assert_eq!(subject, "alice");
            assert_eq!(fact, "Naps help");
        }
        _ => panic!("expected facts add"),
    }
}

// ========== Core Command Tests ==========

#[test]
fn test_cmd_init_creates_database() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("cadence.db");

    commands::cmd_init(&path, true).unwrap();
    assert!(path.exists());

    let db = commands::open_db(&path, true).unwrap();
    assert!(db.list_subjects().unwrap().is_empty());
}

#[test]
fn test_build_engine_with_config_file() {
    let dir = tempfile::tempdir().unwrap();
    let config = dir.path().join("engine.toml");
    std::fs::write(&config, "[history]\ndays = 10\n").unwrap();

    let db = setup_test_db();
    let engine = commands::build_engine(&db, Some(&config)).unwrap();
    assert_eq!(engine.config().history_days, 10);

    assert!(commands::build_engine(&db, Some(&dir.path().join("missing.toml"))).is_err());
}

#[test]
fn test_truncate() {
    assert_eq!(truncate("short", 10), "short");
    assert_eq!(truncate("a longer message", 8), "a lon...");
}

// ========== Observation Command Tests ==========

#[test]
fn test_cmd_log_and_trends() {
    let db = setup_test_db();
    log_at(&db, "alice", 2, 0.2, 0.6, 0.7);

    let rows = db
        .fetch_observations("alice", Utc::now() - Duration::days(1))
        .unwrap();
    assert_eq!(rows.len(), 1);

    assert!(commands::cmd_trends(&db, "alice", 7, false).is_ok());
    assert!(commands::cmd_trends(&db, "nobody", 7, true).is_ok());
}

#[test]
fn test_cmd_log_rejects_bad_input() {
    let db = setup_test_db();
    assert!(commands::cmd_log(&db, "alice", 2.0, 0.5, 0.5, None, false).is_err());
    assert!(commands::cmd_log(&db, "alice", 0.0, 0.5, 0.5, Some("yesterday"), false).is_err());
}

#[test]
fn test_cmd_stats_partial_update() {
    let db = setup_test_db();
    commands::cmd_stats(&db, "alice", Some(4), Some(2), Some(6), false).unwrap();
    commands::cmd_stats(&db, "alice", None, Some(3), None, false).unwrap();

    assert_eq!(
        db.stats_snapshot("alice").unwrap(),
        StatsSnapshot {
            tasks_completed: 4,
            current_streak: 3,
            open_tasks_count: 6,
        }
    );
}

#[test]
fn test_cmd_facts() {
    let db = setup_test_db();
    commands::cmd_facts_add(&db, "alice", "Naps help after lunch").unwrap();
    assert!(commands::cmd_facts_add(&db, "alice", "  ").is_err());
    assert!(commands::cmd_facts_list(&db, "alice", false).is_ok());
    assert_eq!(db.list_knowledge_facts("alice").unwrap().len(), 1);
}

// ========== Engine Command Tests ==========

#[tokio::test]
async fn test_cmd_run_and_briefing() {
    let db = setup_test_db();
    let engine = engine();
    seed_crash(&db);

    commands::cmd_run(&db, &engine, None, false).await.unwrap();

    let predictions = db.list_predictions("alice", Some(PredictionStatus::Active)).unwrap();
    assert!(!predictions.is_empty());
    let pending = db
        .list_interventions("alice", Some(InterventionStatus::Pending))
        .unwrap();
    assert!(!pending.is_empty());
    assert!(db.latest_wellbeing_score("alice").unwrap().is_some());

    assert!(commands::cmd_briefing(&db, &engine, "alice", false).is_ok());
    assert!(commands::cmd_briefing(&db, &engine, "alice", true).is_ok());
    assert!(commands::cmd_history(&db, &engine, "alice", None, false).is_ok());
}

#[tokio::test]
async fn test_cmd_predict_evaluate_score() {
    let db = setup_test_db();
    let engine = engine();
    seed_crash(&db);

    commands::cmd_predict(&db, &engine, "alice", true).await.unwrap();
    commands::cmd_evaluate(&db, &engine, "alice", false).unwrap();
    commands::cmd_score(&db, &engine, "alice", false).unwrap();
    commands::cmd_expire(&db, &engine, None, false).unwrap();

    assert!(!db.list_predictions("alice", None).unwrap().is_empty());
    assert!(!db.list_interventions("alice", None).unwrap().is_empty());
    assert!(commands::cmd_predictions_list(&db, "alice", None, false).is_ok());
    assert!(commands::cmd_interventions_list(&db, "alice", None, true).is_ok());
}

#[tokio::test]
async fn test_cmd_resolve_and_intervention_update() {
    let db = setup_test_db();
    let engine = engine();
    seed_crash(&db);
    commands::cmd_run(&db, &engine, Some("alice"), false)
        .await
        .unwrap();

    let prediction = &db.list_predictions("alice", None).unwrap()[0];
    assert!(
        commands::cmd_resolve(&db, &engine, prediction.id, "bob", PredictionOutcome::Confirmed, false)
            .is_err()
    );
    commands::cmd_resolve(
        &db,
        &engine,
        prediction.id,
        "alice",
        PredictionOutcome::Confirmed,
        false,
    )
    .unwrap();
    assert_eq!(
        db.get_prediction(prediction.id).unwrap().unwrap().status,
        PredictionStatus::Confirmed
    );

    let intervention = &db.list_interventions("alice", None).unwrap()[0];
    commands::cmd_intervention_update(
        &db,
        &engine,
        intervention.id,
        "alice",
        InterventionResponse::Dismissed,
        false,
    )
    .unwrap();
    assert!(commands::cmd_intervention_update(
        &db,
        &engine,
        intervention.id,
        "alice",
        InterventionResponse::Acted,
        false,
    )
    .is_err());
}

#[tokio::test]
async fn test_cmd_run_without_subjects() {
    let db = setup_test_db();
    assert!(commands::cmd_run(&db, &engine(), None, false).await.is_ok());
    assert!(commands::cmd_expire(&db, &engine(), Some("alice"), true).is_ok());
}
