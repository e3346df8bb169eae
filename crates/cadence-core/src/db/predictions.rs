//! Predicted pattern database operations

use chrono::{DateTime, Utc};
use rusqlite::params;

use super::{format_datetime, is_constraint_violation, parse_datetime, parse_json_map, Database};
use crate::error::{Error, Result};
use crate::models::{
    NewPrediction, PatternType, PredictedPattern, PredictionOutcome, PredictionStatus, TimeHorizon,
};

const PREDICTION_COLUMNS: &str = r#"
    id, subject_id, pattern_type, confidence, predicted_for, time_horizon,
    trigger_factors, enrichment_context, status, created_at, resolved_at
"#;

impl Database {
    /// Insert a new active prediction
    ///
    /// Returns `None` when the storage cooldown trigger rejects the row because
    /// an active prediction of the same pattern was created within 24 hours.
    pub fn insert_prediction(&self, prediction: &NewPrediction) -> Result<Option<i64>> {
        let conn = self.conn()?;

        let factors_json = serde_json::to_string(&prediction.trigger_factors)?;
        let context_json = serde_json::to_string(&prediction.enrichment_context)?;

        let result = conn.execute(
            r#"
            INSERT INTO predicted_patterns (
                subject_id, pattern_type, confidence, predicted_for, time_horizon,
                trigger_factors, enrichment_context, status, created_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, 'active', ?)
            "#,
            params![
                prediction.subject_id,
                prediction.pattern_type.as_str(),
                prediction.confidence,
                format_datetime(&prediction.predicted_for),
                prediction.time_horizon.as_str(),
                factors_json,
                context_json,
                format_datetime(&prediction.created_at)
            ],
        );

        match result {
            Ok(_) => Ok(Some(conn.last_insert_rowid())),
            Err(e) if is_constraint_violation(&e) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Whether an active prediction of this pattern was created after `since`
    pub fn has_recent_active_prediction(
        &self,
        subject_id: &str,
        pattern_type: PatternType,
        since: DateTime<Utc>,
    ) -> Result<bool> {
        let conn = self.conn()?;
        let count: i64 = conn.query_row(
            r#"
            SELECT COUNT(*) FROM predicted_patterns
            WHERE subject_id = ? AND pattern_type = ? AND status = 'active' AND created_at > ?
            "#,
            params![subject_id, pattern_type.as_str(), format_datetime(&since)],
            |row| row.get(0),
        )?;
        Ok(count > 0)
    }

    /// Get a single prediction by ID
    pub fn get_prediction(&self, id: i64) -> Result<Option<PredictedPattern>> {
        let conn = self.conn()?;
        let sql = format!("SELECT {} FROM predicted_patterns WHERE id = ?", PREDICTION_COLUMNS);

        let result = conn.query_row(&sql, params![id], |row| self.row_to_prediction(row));

        match result {
            Ok(prediction) => Ok(Some(prediction)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// List a subject's predictions, newest first, optionally filtered by status
    pub fn list_predictions(
        &self,
        subject_id: &str,
        status: Option<PredictionStatus>,
    ) -> Result<Vec<PredictedPattern>> {
        let conn = self.conn()?;

        let predictions = if let Some(s) = status {
            let sql = format!(
                "SELECT {} FROM predicted_patterns WHERE subject_id = ? AND status = ? ORDER BY created_at DESC, id DESC",
                PREDICTION_COLUMNS
            );
            let mut stmt = conn.prepare(&sql)?;
            let rows =
                stmt.query_map(params![subject_id, s.as_str()], |row| self.row_to_prediction(row))?;
            rows.collect::<std::result::Result<Vec<_>, _>>()?
        } else {
            let sql = format!(
                "SELECT {} FROM predicted_patterns WHERE subject_id = ? ORDER BY created_at DESC, id DESC",
                PREDICTION_COLUMNS
            );
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt.query_map(params![subject_id], |row| self.row_to_prediction(row))?;
            rows.collect::<std::result::Result<Vec<_>, _>>()?
        };

        Ok(predictions)
    }

    /// Active predictions at or above a confidence floor, most confident first
    pub fn list_high_confidence_predictions(
        &self,
        subject_id: &str,
        min_confidence: f64,
    ) -> Result<Vec<PredictedPattern>> {
        let conn = self.conn()?;
        let sql = format!(
            r#"
            SELECT {} FROM predicted_patterns
            WHERE subject_id = ? AND status = 'active' AND confidence >= ?
            ORDER BY confidence DESC, created_at DESC
            "#,
            PREDICTION_COLUMNS
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(params![subject_id, min_confidence], |row| {
            self.row_to_prediction(row)
        })?;

        let predictions: std::result::Result<Vec<_>, _> = rows.collect();
        Ok(predictions?)
    }

    /// Mark every active prediction whose target time has passed as expired
    pub fn expire_predictions(&self, subject_id: &str, now: DateTime<Utc>) -> Result<usize> {
        let conn = self.conn()?;
        let now_str = format_datetime(&now);
        let updated = conn.execute(
            r#"
            UPDATE predicted_patterns
            SET status = 'expired', resolved_at = ?
            WHERE subject_id = ? AND status = 'active' AND predicted_for < ?
            "#,
            params![now_str, subject_id, now_str],
        )?;
        Ok(updated)
    }

    /// Record the outcome of an active prediction owned by `subject_id`
    pub fn resolve_prediction(
        &self,
        id: i64,
        subject_id: &str,
        outcome: PredictionOutcome,
        now: DateTime<Utc>,
    ) -> Result<PredictedPattern> {
        let status = PredictionStatus::from(outcome);

        let current = match self.get_prediction(id)? {
            Some(p) if p.subject_id == subject_id => p,
            _ => return Err(Error::NotFound(format!("Prediction {}", id))),
        };

        if !current.status.can_transition_to(status) {
            return Err(Error::InvalidTransition(format!(
                "prediction {} is {}, cannot become {}",
                id, current.status, status
            )));
        }

        let conn = self.conn()?;
        let updated = conn.execute(
            r#"
            UPDATE predicted_patterns
            SET status = ?, resolved_at = ?
            WHERE id = ? AND subject_id = ? AND status = 'active'
            "#,
            params![status.as_str(), format_datetime(&now), id, subject_id],
        )?;

        if updated == 0 {
            // Resolved or expired concurrently
            return Err(Error::InvalidTransition(format!(
                "prediction {} is no longer active",
                id
            )));
        }

        self.get_prediction(id)?
            .ok_or_else(|| Error::NotFound(format!("Prediction {}", id)))
    }

    fn row_to_prediction(&self, row: &rusqlite::Row) -> rusqlite::Result<PredictedPattern> {
        let pattern_str: String = row.get(2)?;
        let predicted_for_str: String = row.get(4)?;
        let horizon_str: String = row.get(5)?;
        let factors_json: String = row.get(6)?;
        let context_json: String = row.get(7)?;
        let status_str: String = row.get(8)?;
        let created_at_str: String = row.get(9)?;
        let resolved_at_str: Option<String> = row.get(10)?;

        let pattern_type = pattern_str.parse().unwrap_or(PatternType::EnergyCrash);

        Ok(PredictedPattern {
            id: row.get(0)?,
            subject_id: row.get(1)?,
            pattern_type,
            confidence: row.get(3)?,
            predicted_for: parse_datetime(&predicted_for_str),
            time_horizon: horizon_str
                .parse()
                .unwrap_or_else(|_: String| pattern_type.horizon()),
            trigger_factors: parse_json_map(&factors_json),
            enrichment_context: parse_json_map(&context_json),
            status: status_str.parse().unwrap_or(PredictionStatus::Expired),
            created_at: parse_datetime(&created_at_str),
            resolved_at: resolved_at_str.map(|s| parse_datetime(&s)),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn new_prediction(subject: &str, pattern: PatternType, created_at: DateTime<Utc>) -> NewPrediction {
        NewPrediction {
            subject_id: subject.to_string(),
            pattern_type: pattern,
            confidence: 0.75,
            predicted_for: created_at + pattern.horizon().duration(),
            time_horizon: pattern.horizon(),
            trigger_factors: serde_json::Map::new(),
            enrichment_context: serde_json::Map::new(),
            created_at,
        }
    }

    #[test]
    fn test_insert_and_get_prediction() {
        let db = Database::in_memory().unwrap();
        let now = Utc::now();

        let mut prediction = new_prediction("alice", PatternType::Hyperfocus, now);
        prediction
            .trigger_factors
            .insert("focus_trend".into(), serde_json::json!("rising"));

        let id = db.insert_prediction(&prediction).unwrap().unwrap();
        let stored = db.get_prediction(id).unwrap().unwrap();

        assert_eq!(stored.subject_id, "alice");
        assert_eq!(stored.pattern_type, PatternType::Hyperfocus);
        assert_eq!(stored.time_horizon, TimeHorizon::Hours24);
        assert_eq!(stored.status, PredictionStatus::Active);
        assert_eq!(stored.trigger_factors["focus_trend"], "rising");
        assert!(stored.enrichment_context.is_empty());
        assert!(stored.resolved_at.is_none());
    }

    #[test]
    fn test_cooldown_trigger_rejects_active_duplicate() {
        let db = Database::in_memory().unwrap();
        let now = Utc::now();

        let first = new_prediction("alice", PatternType::EnergyCrash, now - Duration::hours(2));
        assert!(db.insert_prediction(&first).unwrap().is_some());

        let second = new_prediction("alice", PatternType::EnergyCrash, now);
        assert!(db.insert_prediction(&second).unwrap().is_none());

        // Other subjects and other patterns are unaffected
        let other_subject = new_prediction("bob", PatternType::EnergyCrash, now);
        assert!(db.insert_prediction(&other_subject).unwrap().is_some());
        let other_pattern = new_prediction("alice", PatternType::Procrastination, now);
        assert!(db.insert_prediction(&other_pattern).unwrap().is_some());
    }

    #[test]
    fn test_cooldown_trigger_allows_after_window() {
        let db = Database::in_memory().unwrap();
        let now = Utc::now();

        let old = new_prediction("alice", PatternType::SocialMasking, now - Duration::hours(25));
        assert!(db.insert_prediction(&old).unwrap().is_some());

        let fresh = new_prediction("alice", PatternType::SocialMasking, now);
        assert!(db.insert_prediction(&fresh).unwrap().is_some());
    }

    #[test]
    fn test_has_recent_active_prediction() {
        let db = Database::in_memory().unwrap();
        let now = Utc::now();

        let p = new_prediction("alice", PatternType::DecisionFatigue, now - Duration::hours(3));
        db.insert_prediction(&p).unwrap();

        assert!(db
            .has_recent_active_prediction("alice", PatternType::DecisionFatigue, now - Duration::hours(24))
            .unwrap());
        assert!(!db
            .has_recent_active_prediction("alice", PatternType::DecisionFatigue, now - Duration::hours(1))
            .unwrap());
        assert!(!db
            .has_recent_active_prediction("bob", PatternType::DecisionFatigue, now - Duration::hours(24))
            .unwrap());
    }

    #[test]
    fn test_expire_predictions_is_idempotent() {
        let db = Database::in_memory().unwrap();
        let now = Utc::now();

        // predicted_for = created_at + 24h, so this one is already past due
        let past = new_prediction("alice", PatternType::EnergyCrash, now - Duration::hours(30));
        let past_id = db.insert_prediction(&past).unwrap().unwrap();
        let future = new_prediction("alice", PatternType::Procrastination, now);
        let future_id = db.insert_prediction(&future).unwrap().unwrap();

        assert_eq!(db.expire_predictions("alice", now).unwrap(), 1);
        assert_eq!(db.expire_predictions("alice", now).unwrap(), 0);

        let expired = db.get_prediction(past_id).unwrap().unwrap();
        assert_eq!(expired.status, PredictionStatus::Expired);
        assert!(expired.resolved_at.is_some());

        let still_active = db.get_prediction(future_id).unwrap().unwrap();
        assert_eq!(still_active.status, PredictionStatus::Active);
    }

    #[test]
    fn test_resolve_prediction_ownership_and_transitions() {
        let db = Database::in_memory().unwrap();
        let now = Utc::now();

        let id = db
            .insert_prediction(&new_prediction("alice", PatternType::Hyperfocus, now))
            .unwrap()
            .unwrap();

        // Wrong owner looks like a missing record
        let err = db
            .resolve_prediction(id, "bob", PredictionOutcome::Confirmed, now)
            .unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));

        let err = db
            .resolve_prediction(9999, "alice", PredictionOutcome::Confirmed, now)
            .unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));

        let resolved = db
            .resolve_prediction(id, "alice", PredictionOutcome::Avoided, now)
            .unwrap();
        assert_eq!(resolved.status, PredictionStatus::Avoided);
        assert!(resolved.resolved_at.is_some());

        // Terminal states do not move again
        let err = db
            .resolve_prediction(id, "alice", PredictionOutcome::Confirmed, now)
            .unwrap_err();
        assert!(matches!(err, Error::InvalidTransition(_)));
    }

    #[test]
    fn test_list_predictions_filters() {
        let db = Database::in_memory().unwrap();
        let now = Utc::now();

        let mut high = new_prediction("alice", PatternType::EnergyCrash, now);
        high.confidence = 0.95;
        let high_id = db.insert_prediction(&high).unwrap().unwrap();

        let low = new_prediction("alice", PatternType::Hyperfocus, now);
        let low_id = db.insert_prediction(&low).unwrap().unwrap();

        db.resolve_prediction(low_id, "alice", PredictionOutcome::Confirmed, now)
            .unwrap();

        assert_eq!(db.list_predictions("alice", None).unwrap().len(), 2);
        let active = db
            .list_predictions("alice", Some(PredictionStatus::Active))
            .unwrap();
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].id, high_id);

        let confident = db.list_high_confidence_predictions("alice", 0.8).unwrap();
        assert_eq!(confident.len(), 1);
        assert!(db.list_high_confidence_predictions("alice", 0.99).unwrap().is_empty());
    }
}
