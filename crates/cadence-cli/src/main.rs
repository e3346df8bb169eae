//! Cadence CLI - Behavioral trend and forecasting engine
//!
//! Usage:
//!   cadence init                                  Initialize database
//!   cadence log alice --mood 0.2 --energy 0.6 --focus 0.7
//!   cadence run                                   Expire, predict, evaluate and score everyone
//!   cadence briefing alice                        Latest score and open items

mod cli;
mod commands;

#[cfg(test)]
mod tests;

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use cli::*;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Set up logging
    // Priority: RUST_LOG env var > --verbose flag > default (info)
    let filter = if std::env::var("RUST_LOG").is_ok() {
        EnvFilter::from_default_env()
    } else if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(false).compact())
        .init();

    if let Commands::Init = cli.command {
        return commands::cmd_init(&cli.db, cli.no_encrypt);
    }

    let db = commands::open_db(&cli.db, cli.no_encrypt)?;
    let json = cli.json;

    match cli.command {
        Commands::Init => Ok(()),
        Commands::Log {
            subject,
            mood,
            energy,
            focus,
            at,
        } => commands::cmd_log(&db, &subject, mood, energy, focus, at.as_deref(), json),
        Commands::Stats {
            subject,
            tasks_completed,
            streak,
            open_tasks,
        } => commands::cmd_stats(&db, &subject, tasks_completed, streak, open_tasks, json),
        Commands::Facts { action } => match action {
            FactsAction::Add { subject, fact } => commands::cmd_facts_add(&db, &subject, &fact),
            FactsAction::List { subject } => commands::cmd_facts_list(&db, &subject, json),
        },
        Commands::Trends { subject, days } => commands::cmd_trends(&db, &subject, days, json),
        Commands::Predictions { subject, status } => {
            commands::cmd_predictions_list(&db, &subject, status, json)
        }
        Commands::Interventions { subject, status } => {
            commands::cmd_interventions_list(&db, &subject, status, json)
        }
        command => {
            let engine = commands::build_engine(&db, cli.config.as_deref())?;
            match command {
                Commands::Predict { subject } => {
                    commands::cmd_predict(&db, &engine, &subject, json).await
                }
                Commands::Evaluate { subject } => {
                    commands::cmd_evaluate(&db, &engine, &subject, json)
                }
                Commands::Score { subject } => commands::cmd_score(&db, &engine, &subject, json),
                Commands::History { subject, days } => {
                    commands::cmd_history(&db, &engine, &subject, days, json)
                }
                Commands::Expire { subject } => {
                    commands::cmd_expire(&db, &engine, subject.as_deref(), json)
                }
                Commands::Run { subject } => {
                    commands::cmd_run(&db, &engine, subject.as_deref(), json).await
                }
                Commands::Resolve {
                    id,
                    subject,
                    status,
                } => commands::cmd_resolve(&db, &engine, id, &subject, status, json),
                Commands::Intervention {
                    id,
                    subject,
                    status,
                } => commands::cmd_intervention_update(&db, &engine, id, &subject, status, json),
                Commands::Briefing { subject } => {
                    commands::cmd_briefing(&db, &engine, &subject, json)
                }
                _ => Ok(()),
            }
        }
    }
}
