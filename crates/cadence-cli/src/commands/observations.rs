//! Observation, stats, knowledge fact and trend commands

use anyhow::{Context, Result};
use cadence_core::db::Database;
use cadence_core::models::{NewObservation, StatsSnapshot, Trend};
use cadence_core::TrendAnalyzer;
use chrono::{DateTime, Utc};
use serde_json::json;

use super::print_json;

/// Parse an RFC 3339 timestamp, defaulting to now
pub fn parse_timestamp(at: Option<&str>) -> Result<DateTime<Utc>> {
    match at {
        Some(s) => Ok(DateTime::parse_from_rfc3339(s)
            .with_context(|| format!("Invalid timestamp '{}', expected RFC 3339", s))?
            .with_timezone(&Utc)),
        None => Ok(Utc::now()),
    }
}

pub fn cmd_log(
    db: &Database,
    subject: &str,
    mood: f64,
    energy: f64,
    focus: f64,
    at: Option<&str>,
    json: bool,
) -> Result<()> {
    let observation = NewObservation {
        subject_id: subject.to_string(),
        timestamp: parse_timestamp(at)?,
        mood_score: mood,
        energy_level: energy,
        focus_score: focus,
    };

    let id = db
        .insert_observation(&observation)
        .context("Failed to record observation")?;

    if json {
        return print_json(&json!({ "id": id, "subject_id": subject }));
    }

    println!(
        "📝 Logged observation #{} for {} (mood {:+.2}, energy {:.2}, focus {:.2})",
        id, subject, mood, energy, focus
    );
    Ok(())
}

/// Update whichever stats were given, then show the snapshot
pub fn cmd_stats(
    db: &Database,
    subject: &str,
    tasks_completed: Option<u32>,
    streak: Option<u32>,
    open_tasks: Option<u32>,
    json: bool,
) -> Result<()> {
    let mut stats = db.stats_snapshot(subject).context("Failed to read stats")?;

    if tasks_completed.is_some() || streak.is_some() || open_tasks.is_some() {
        stats = StatsSnapshot {
            tasks_completed: tasks_completed.unwrap_or(stats.tasks_completed),
            current_streak: streak.unwrap_or(stats.current_streak),
            open_tasks_count: open_tasks.unwrap_or(stats.open_tasks_count),
        };
        db.upsert_stats(subject, &stats)
            .context("Failed to update stats")?;
    }

    if json {
        return print_json(&stats);
    }

    println!("📊 Stats for {}", subject);
    println!("   Tasks completed: {}", stats.tasks_completed);
    println!("   Current streak:  {} days", stats.current_streak);
    println!("   Open tasks:      {}", stats.open_tasks_count);
    Ok(())
}

pub fn cmd_facts_add(db: &Database, subject: &str, fact: &str) -> Result<()> {
    let id = db
        .add_knowledge_fact(subject, fact)
        .context("Failed to add fact")?;
    println!("✅ Added fact #{} for {}", id, subject);
    Ok(())
}

pub fn cmd_facts_list(db: &Database, subject: &str, json: bool) -> Result<()> {
    let facts = db
        .list_knowledge_facts(subject)
        .context("Failed to list facts")?;

    if json {
        let rows: Vec<_> = facts
            .iter()
            .map(|(id, fact)| json!({ "id": id, "fact": fact }))
            .collect();
        return print_json(&rows);
    }

    if facts.is_empty() {
        println!("No facts recorded for {}.", subject);
        return Ok(());
    }

    println!("📚 Facts for {}", subject);
    for (id, fact) in facts {
        println!("   #{:<4} {}", id, fact);
    }
    Ok(())
}

fn arrow(trend: Trend) -> &'static str {
    match trend {
        Trend::Rising => "↑",
        Trend::Declining => "↓",
        Trend::Stable => "→",
    }
}

pub fn cmd_trends(db: &Database, subject: &str, days: u32, json: bool) -> Result<()> {
    let snapshot = TrendAnalyzer::new(db)
        .get_recent_trends(subject, days)
        .context("Failed to compute trends")?;

    if json {
        return print_json(&snapshot);
    }

    println!("📈 Trends for {} (last {} days)", subject, days);
    println!("   ─────────────────────────────");
    if snapshot.total_count == 0 {
        println!("   No observations in this window.");
        return Ok(());
    }
    println!("   Observations: {}", snapshot.total_count);
    println!(
        "   Mood:   {:+.2} {} {}  (min {:+.2}, max {:+.2})",
        snapshot.avg_mood,
        arrow(snapshot.mood_trend),
        snapshot.mood_trend,
        snapshot.min_mood,
        snapshot.max_mood
    );
    println!(
        "   Energy: {:.2} {} {}",
        snapshot.avg_energy,
        arrow(snapshot.energy_trend),
        snapshot.energy_trend
    );
    println!(
        "   Focus:  {:.2} {} {}",
        snapshot.avg_focus,
        arrow(snapshot.focus_trend),
        snapshot.focus_trend
    );
    Ok(())
}
