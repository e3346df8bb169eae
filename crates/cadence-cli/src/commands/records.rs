//! Prediction and intervention listing and resolution commands

use anyhow::{Context, Result};
use cadence_core::db::Database;
use cadence_core::engine::{Engine, EngineContext, SubjectLocks};
use cadence_core::models::{
    InterventionResponse, InterventionStatus, PredictionOutcome, PredictionStatus,
};

use super::engine::{print_intervention, print_prediction};
use super::print_json;

pub fn cmd_predictions_list(
    db: &Database,
    subject: &str,
    status: Option<PredictionStatus>,
    json: bool,
) -> Result<()> {
    let predictions = db
        .list_predictions(subject, status)
        .context("Failed to list predictions")?;

    if json {
        return print_json(&predictions);
    }

    if predictions.is_empty() {
        println!("No predictions for {}.", subject);
        return Ok(());
    }
    println!("🔮 Predictions for {}", subject);
    for p in &predictions {
        print_prediction(p);
        if p.status != PredictionStatus::Active {
            println!("         status: {}", p.status);
        }
    }
    Ok(())
}

pub fn cmd_interventions_list(
    db: &Database,
    subject: &str,
    status: Option<InterventionStatus>,
    json: bool,
) -> Result<()> {
    let interventions = db
        .list_interventions(subject, status)
        .context("Failed to list interventions")?;

    if json {
        return print_json(&interventions);
    }

    if interventions.is_empty() {
        println!("No interventions for {}.", subject);
        return Ok(());
    }
    println!("🔔 Interventions for {}", subject);
    for i in &interventions {
        print_intervention(i);
    }
    Ok(())
}

pub fn cmd_resolve(
    db: &Database,
    engine: &Engine,
    id: i64,
    subject: &str,
    outcome: PredictionOutcome,
    json: bool,
) -> Result<()> {
    let locks = SubjectLocks::new();
    let ctx = EngineContext::new(db, &locks);
    let resolved = engine
        .predictor()
        .resolve(&ctx, id, subject, outcome)
        .with_context(|| format!("Failed to resolve prediction #{}", id))?;

    if json {
        return print_json(&resolved);
    }
    println!(
        "✅ Prediction #{} ({}) marked {}",
        resolved.id, resolved.pattern_type, resolved.status
    );
    Ok(())
}

pub fn cmd_intervention_update(
    db: &Database,
    engine: &Engine,
    id: i64,
    subject: &str,
    response: InterventionResponse,
    json: bool,
) -> Result<()> {
    let locks = SubjectLocks::new();
    let ctx = EngineContext::new(db, &locks);
    let updated = engine
        .detector()
        .update_status(&ctx, id, subject, response)
        .with_context(|| format!("Failed to update intervention #{}", id))?;

    if json {
        return print_json(&updated);
    }
    println!(
        "✅ Intervention #{} ({}) marked {}",
        updated.id, updated.intervention_type, updated.status
    );
    Ok(())
}
