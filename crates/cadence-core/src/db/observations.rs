//! Observation log and host stats operations

use chrono::{DateTime, Utc};
use rusqlite::params;

use super::{format_datetime, parse_datetime, Database};
use crate::error::Result;
use crate::models::{NewObservation, Observation, StatsSnapshot};

impl Database {
    /// Append a validated observation to the log
    pub fn insert_observation(&self, obs: &NewObservation) -> Result<i64> {
        obs.validate()?;

        let conn = self.conn()?;
        conn.execute(
            r#"
            INSERT INTO observations (subject_id, timestamp, mood_score, energy_level, focus_score)
            VALUES (?, ?, ?, ?, ?)
            "#,
            params![
                obs.subject_id,
                format_datetime(&obs.timestamp),
                obs.mood_score,
                obs.energy_level,
                obs.focus_score
            ],
        )?;

        Ok(conn.last_insert_rowid())
    }

    /// Observations for a subject at or after `since`, oldest first
    pub fn fetch_observations(
        &self,
        subject_id: &str,
        since: DateTime<Utc>,
    ) -> Result<Vec<Observation>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            r#"
            SELECT subject_id, timestamp, mood_score, energy_level, focus_score
            FROM observations
            WHERE subject_id = ? AND timestamp >= ?
            ORDER BY timestamp ASC, id ASC
            "#,
        )?;

        let rows = stmt.query_map(params![subject_id, format_datetime(&since)], |row| {
            let timestamp: String = row.get(1)?;
            Ok(Observation {
                subject_id: row.get(0)?,
                timestamp: parse_datetime(&timestamp),
                mood_score: row.get(2)?,
                energy_level: row.get(3)?,
                focus_score: row.get(4)?,
            })
        })?;

        let observations: std::result::Result<Vec<_>, _> = rows.collect();
        Ok(observations?)
    }

    /// All subjects that have observations or stats
    pub fn list_subjects(&self) -> Result<Vec<String>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            r#"
            SELECT subject_id FROM observations
            UNION
            SELECT subject_id FROM subject_stats
            ORDER BY subject_id
            "#,
        )?;

        let rows = stmt.query_map([], |row| row.get(0))?;
        let subjects: std::result::Result<Vec<String>, _> = rows.collect();
        Ok(subjects?)
    }

    /// Replace the stats snapshot for a subject
    pub fn upsert_stats(&self, subject_id: &str, stats: &StatsSnapshot) -> Result<()> {
        let conn = self.conn()?;
        conn.execute(
            r#"
            INSERT INTO subject_stats (subject_id, tasks_completed, current_streak, open_tasks_count, updated_at)
            VALUES (?, ?, ?, ?, ?)
            ON CONFLICT(subject_id) DO UPDATE SET
                tasks_completed = excluded.tasks_completed,
                current_streak = excluded.current_streak,
                open_tasks_count = excluded.open_tasks_count,
                updated_at = excluded.updated_at
            "#,
            params![
                subject_id,
                stats.tasks_completed,
                stats.current_streak,
                stats.open_tasks_count,
                format_datetime(&Utc::now())
            ],
        )?;
        Ok(())
    }

    /// Stats snapshot for a subject; zeros when the host never reported any
    pub fn stats_snapshot(&self, subject_id: &str) -> Result<StatsSnapshot> {
        let conn = self.conn()?;
        let result = conn.query_row(
            r#"
            SELECT tasks_completed, current_streak, open_tasks_count
            FROM subject_stats
            WHERE subject_id = ?
            "#,
            params![subject_id],
            |row| {
                Ok(StatsSnapshot {
                    tasks_completed: row.get(0)?,
                    current_streak: row.get(1)?,
                    open_tasks_count: row.get(2)?,
                })
            },
        );

        match result {
            Ok(stats) => Ok(stats),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(StatsSnapshot::default()),
            Err(e) => Err(e.into()),
        }
    }
}
