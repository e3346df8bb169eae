//! Engine commands: predict, evaluate, score, history, expire, run, briefing

use anyhow::{Context, Result};
use cadence_core::db::Database;
use cadence_core::engine::{Briefing, Engine, EngineContext, RunReport, SubjectLocks};
use cadence_core::models::{Intervention, PredictedPattern, WellbeingScore, WellbeingZone};
use serde_json::json;

use super::print_json;

fn zone_icon(zone: WellbeingZone) -> &'static str {
    match zone {
        WellbeingZone::Red => "🔴",
        WellbeingZone::Yellow => "🟡",
        WellbeingZone::Green => "🟢",
    }
}

pub(crate) fn print_prediction(p: &PredictedPattern) {
    println!(
        "   #{:<4} {:<17} {:>3.0}%  within {:<3}  (until {})",
        p.id,
        p.pattern_type.as_str(),
        p.confidence * 100.0,
        p.time_horizon.as_str(),
        p.predicted_for.format("%Y-%m-%d %H:%M")
    );
}

pub(crate) fn print_intervention(i: &Intervention) {
    println!(
        "   #{:<4} {:<17} [{}] {}",
        i.id,
        i.intervention_type.as_str(),
        i.status,
        super::truncate(&i.message, 60)
    );
}

fn print_score(score: &WellbeingScore) {
    println!(
        "   {} {:.1} / 100 ({})",
        zone_icon(score.zone),
        score.score,
        score.zone
    );
}

pub async fn cmd_predict(db: &Database, engine: &Engine, subject: &str, json: bool) -> Result<()> {
    let locks = SubjectLocks::new();
    let ctx = EngineContext::new(db, &locks);
    let created = engine
        .predictor()
        .predict(&ctx, subject)
        .await
        .context("Prediction failed")?;

    if json {
        return print_json(&created);
    }

    if created.is_empty() {
        println!("🔮 No new predictions for {}.", subject);
        return Ok(());
    }
    println!("🔮 {} new prediction(s) for {}", created.len(), subject);
    for p in &created {
        print_prediction(p);
    }
    Ok(())
}

pub fn cmd_evaluate(db: &Database, engine: &Engine, subject: &str, json: bool) -> Result<()> {
    let locks = SubjectLocks::new();
    let ctx = EngineContext::new(db, &locks);
    let created = engine
        .detector()
        .evaluate(&ctx, subject)
        .context("Intervention detection failed")?;

    if json {
        return print_json(&created);
    }

    if created.is_empty() {
        println!("✅ No new interventions for {}.", subject);
        return Ok(());
    }
    println!("🔔 {} new intervention(s) for {}", created.len(), subject);
    for i in &created {
        print_intervention(i);
    }
    Ok(())
}

pub fn cmd_score(db: &Database, engine: &Engine, subject: &str, json: bool) -> Result<()> {
    let locks = SubjectLocks::new();
    let ctx = EngineContext::new(db, &locks);
    let score = engine
        .scorer()
        .compute(&ctx, subject)
        .context("Wellbeing scoring failed")?;

    if json {
        return print_json(&score);
    }

    println!("💚 Wellbeing for {}", subject);
    print_score(&score);
    Ok(())
}

pub fn cmd_history(
    db: &Database,
    engine: &Engine,
    subject: &str,
    days: Option<u32>,
    json: bool,
) -> Result<()> {
    let locks = SubjectLocks::new();
    let ctx = EngineContext::new(db, &locks);
    let days = days.unwrap_or(engine.config().history_days);
    let history = engine
        .scorer()
        .get_history(&ctx, subject, days)
        .context("Failed to load wellbeing history")?;

    if json {
        return print_json(&history);
    }

    println!("📅 Wellbeing history for {} (last {} days)", subject, days);
    if history.scores.is_empty() {
        println!("   No scores recorded.");
        return Ok(());
    }
    for score in &history.scores {
        println!(
            "   {}  {} {:.1}",
            score.created_at.format("%Y-%m-%d %H:%M"),
            zone_icon(score.zone),
            score.score
        );
    }
    println!("   ─────────────────────────────");
    println!(
        "   Average {:.1}, trend {}",
        history.average_score, history.trend
    );
    Ok(())
}

pub fn cmd_expire(
    db: &Database,
    engine: &Engine,
    subject: Option<&str>,
    json: bool,
) -> Result<()> {
    let locks = SubjectLocks::new();
    let ctx = EngineContext::new(db, &locks);
    let subjects = match subject {
        Some(s) => vec![s.to_string()],
        None => db.list_subjects().context("Failed to list subjects")?,
    };

    let mut total = 0;
    for subject in &subjects {
        total += engine
            .predictor()
            .expire_old_predictions(&ctx, subject)
            .with_context(|| format!("Failed to expire predictions for {}", subject))?;
    }

    if json {
        return print_json(&json!({ "expired": total }));
    }
    println!("⏳ Expired {} prediction(s)", total);
    Ok(())
}

fn print_report(report: &RunReport) {
    let status = |ok: bool| if ok { "" } else { " (failed)" };

    println!("👤 {}", report.subject_id);
    println!(
        "   Expired: {}{}",
        report.expired.unwrap_or(0),
        status(report.expired.is_some())
    );
    println!(
        "   Predictions: {}{}",
        report.predictions.as_ref().map_or(0, Vec::len),
        status(report.predictions.is_some())
    );
    for p in report.predictions.iter().flatten() {
        print_prediction(p);
    }
    println!(
        "   Interventions: {}{}",
        report.interventions.as_ref().map_or(0, Vec::len),
        status(report.interventions.is_some())
    );
    for i in report.interventions.iter().flatten() {
        print_intervention(i);
    }
    match &report.wellbeing {
        Some(score) => print_score(score),
        None => println!("   Wellbeing: (failed)"),
    }
}

pub async fn cmd_run(
    db: &Database,
    engine: &Engine,
    subject: Option<&str>,
    json: bool,
) -> Result<()> {
    let locks = SubjectLocks::new();
    let ctx = EngineContext::new(db, &locks);

    let reports = match subject {
        Some(s) => vec![engine.run_subject(&ctx, s).await],
        None => engine.run_all(&ctx).await.context("Engine run failed")?,
    };

    if json {
        return print_json(&reports);
    }

    if reports.is_empty() {
        println!("No subjects yet. Log an observation first.");
        return Ok(());
    }
    for report in &reports {
        print_report(report);
    }

    let incomplete = reports.iter().filter(|r| !r.is_complete()).count();
    if incomplete > 0 {
        println!();
        println!(
            "⚠️  {} subject(s) had a failed phase. Run with --verbose for details.",
            incomplete
        );
    }
    Ok(())
}

fn print_briefing(briefing: &Briefing) {
    println!("🗒️  Briefing for {}", briefing.subject_id);
    match &briefing.wellbeing {
        Some(score) => print_score(score),
        None => println!("   No wellbeing score yet."),
    }

    println!();
    println!("   Active predictions: {}", briefing.active_predictions.len());
    for p in &briefing.active_predictions {
        print_prediction(p);
    }

    println!();
    println!(
        "   Pending interventions: {}",
        briefing.pending_interventions.len()
    );
    for i in &briefing.pending_interventions {
        print_intervention(i);
    }
}

pub fn cmd_briefing(db: &Database, engine: &Engine, subject: &str, json: bool) -> Result<()> {
    let locks = SubjectLocks::new();
    let ctx = EngineContext::new(db, &locks);
    let briefing = engine
        .briefing(&ctx, subject)
        .context("Failed to build briefing")?;

    if json {
        return print_json(&briefing);
    }
    print_briefing(&briefing);
    Ok(())
}
