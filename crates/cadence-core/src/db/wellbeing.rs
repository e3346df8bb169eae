//! Wellbeing score database operations (append-only)

use chrono::{DateTime, Utc};
use rusqlite::params;

use super::{format_datetime, parse_datetime, Database};
use crate::error::Result;
use crate::models::{ScoreComponents, WellbeingScore, WellbeingZone};

impl Database {
    /// Append a wellbeing score; existing rows are never updated
    pub fn insert_wellbeing_score(
        &self,
        subject_id: &str,
        score: f64,
        zone: WellbeingZone,
        components: &ScoreComponents,
        created_at: DateTime<Utc>,
    ) -> Result<WellbeingScore> {
        let conn = self.conn()?;
        let components_json = serde_json::to_string(components)?;

        conn.execute(
            r#"
            INSERT INTO wellbeing_scores (subject_id, score, zone, components, created_at)
            VALUES (?, ?, ?, ?, ?)
            "#,
            params![
                subject_id,
                score,
                zone.as_str(),
                components_json,
                format_datetime(&created_at)
            ],
        )?;

        Ok(WellbeingScore {
            id: conn.last_insert_rowid(),
            subject_id: subject_id.to_string(),
            score,
            zone,
            components: components.clone(),
            created_at: parse_datetime(&format_datetime(&created_at)),
        })
    }

    /// Most recent score for a subject
    pub fn latest_wellbeing_score(&self, subject_id: &str) -> Result<Option<WellbeingScore>> {
        let conn = self.conn()?;
        let result = conn.query_row(
            r#"
            SELECT id, subject_id, score, zone, components, created_at
            FROM wellbeing_scores
            WHERE subject_id = ?
            ORDER BY created_at DESC, id DESC
            LIMIT 1
            "#,
            params![subject_id],
            |row| self.row_to_wellbeing_score(row),
        );

        match result {
            Ok(score) => Ok(Some(score)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Scores created at or after `since`, oldest first
    pub fn wellbeing_scores_since(
        &self,
        subject_id: &str,
        since: DateTime<Utc>,
    ) -> Result<Vec<WellbeingScore>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            r#"
            SELECT id, subject_id, score, zone, components, created_at
            FROM wellbeing_scores
            WHERE subject_id = ? AND created_at >= ?
            ORDER BY created_at ASC, id ASC
            "#,
        )?;

        let rows = stmt.query_map(params![subject_id, format_datetime(&since)], |row| {
            self.row_to_wellbeing_score(row)
        })?;

        let scores: std::result::Result<Vec<_>, _> = rows.collect();
        Ok(scores?)
    }

    fn row_to_wellbeing_score(&self, row: &rusqlite::Row) -> rusqlite::Result<WellbeingScore> {
        let score: f64 = row.get(2)?;
        let zone_str: String = row.get(3)?;
        let components_json: String = row.get(4)?;
        let created_at_str: String = row.get(5)?;

        Ok(WellbeingScore {
            id: row.get(0)?,
            subject_id: row.get(1)?,
            score,
            zone: zone_str
                .parse()
                .unwrap_or_else(|_: String| WellbeingZone::from_score(score)),
            components: serde_json::from_str(&components_json)
                .unwrap_or(ScoreComponents::NoData),
            created_at: parse_datetime(&created_at_str),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn test_scores_are_appended() {
        let db = Database::in_memory().unwrap();
        let now = Utc::now();

        db.insert_wellbeing_score(
            "alice",
            42.0,
            WellbeingZone::Yellow,
            &ScoreComponents::NoData,
            now - Duration::days(2),
        )
        .unwrap();
        let latest = db
            .insert_wellbeing_score(
                "alice",
                71.5,
                WellbeingZone::Green,
                &ScoreComponents::Computed {
                    mood: 0.8,
                    energy: 0.7,
                    focus: 0.6,
                    tasks: 0.5,
                    streak: 0.4,
                    consistency: 0.3,
                },
                now,
            )
            .unwrap();

        let fetched = db.latest_wellbeing_score("alice").unwrap().unwrap();
        assert_eq!(fetched.id, latest.id);
        assert_eq!(fetched.zone, WellbeingZone::Green);
        assert_eq!(fetched.components, latest.components);

        let all = db
            .wellbeing_scores_since("alice", now - Duration::days(7))
            .unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].score, 42.0);

        let recent = db
            .wellbeing_scores_since("alice", now - Duration::days(1))
            .unwrap();
        assert_eq!(recent.len(), 1);
        assert!(db.latest_wellbeing_score("bob").unwrap().is_none());
    }
}
