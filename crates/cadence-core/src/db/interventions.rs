//! Intervention database operations

use chrono::{DateTime, Utc};
use rusqlite::params;

use super::{format_datetime, is_constraint_violation, parse_datetime, Database};
use crate::error::{Error, Result};
use crate::models::{
    Intervention, InterventionResponse, InterventionStatus, InterventionType, NewIntervention,
};

impl Database {
    /// Insert a new pending intervention
    ///
    /// Returns `None` when the storage cooldown trigger rejects it because an
    /// intervention of the same type was created for the subject within 12 hours.
    pub fn insert_intervention(&self, intervention: &NewIntervention) -> Result<Option<i64>> {
        let conn = self.conn()?;

        let result = conn.execute(
            r#"
            INSERT INTO interventions (subject_id, type, trigger_pattern, message, status, created_at)
            VALUES (?, ?, ?, ?, 'pending', ?)
            "#,
            params![
                intervention.subject_id,
                intervention.intervention_type.as_str(),
                intervention.trigger_pattern,
                intervention.message,
                format_datetime(&intervention.created_at)
            ],
        );

        match result {
            Ok(_) => Ok(Some(conn.last_insert_rowid())),
            Err(e) if is_constraint_violation(&e) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Whether any intervention of this type was created after `since`, whatever its status
    pub fn has_recent_intervention(
        &self,
        subject_id: &str,
        intervention_type: InterventionType,
        since: DateTime<Utc>,
    ) -> Result<bool> {
        let conn = self.conn()?;
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM interventions WHERE subject_id = ? AND type = ? AND created_at > ?",
            params![subject_id, intervention_type.as_str(), format_datetime(&since)],
            |row| row.get(0),
        )?;
        Ok(count > 0)
    }

    /// Get a single intervention by ID
    pub fn get_intervention(&self, id: i64) -> Result<Option<Intervention>> {
        let conn = self.conn()?;
        let result = conn.query_row(
            r#"
            SELECT id, subject_id, type, trigger_pattern, message, status, created_at
            FROM interventions
            WHERE id = ?
            "#,
            params![id],
            |row| self.row_to_intervention(row),
        );

        match result {
            Ok(intervention) => Ok(Some(intervention)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// List a subject's interventions, newest first, optionally filtered by status
    pub fn list_interventions(
        &self,
        subject_id: &str,
        status: Option<InterventionStatus>,
    ) -> Result<Vec<Intervention>> {
        let conn = self.conn()?;

        let interventions = if let Some(s) = status {
            let mut stmt = conn.prepare(
                r#"
                SELECT id, subject_id, type, trigger_pattern, message, status, created_at
                FROM interventions
                WHERE subject_id = ? AND status = ?
                ORDER BY created_at DESC, id DESC
                "#,
            )?;
            let rows = stmt.query_map(params![subject_id, s.as_str()], |row| {
                self.row_to_intervention(row)
            })?;
            rows.collect::<std::result::Result<Vec<_>, _>>()?
        } else {
            let mut stmt = conn.prepare(
                r#"
                SELECT id, subject_id, type, trigger_pattern, message, status, created_at
                FROM interventions
                WHERE subject_id = ?
                ORDER BY created_at DESC, id DESC
                "#,
            )?;
            let rows = stmt.query_map(params![subject_id], |row| self.row_to_intervention(row))?;
            rows.collect::<std::result::Result<Vec<_>, _>>()?
        };

        Ok(interventions)
    }

    /// Record the user's response to a pending intervention owned by `subject_id`
    pub fn update_intervention_status(
        &self,
        id: i64,
        subject_id: &str,
        response: InterventionResponse,
    ) -> Result<Intervention> {
        let status = InterventionStatus::from(response);

        let current = match self.get_intervention(id)? {
            Some(i) if i.subject_id == subject_id => i,
            _ => return Err(Error::NotFound(format!("Intervention {}", id))),
        };

        if !current.status.can_transition_to(status) {
            return Err(Error::InvalidTransition(format!(
                "intervention {} is {}, cannot become {}",
                id, current.status, status
            )));
        }

        let conn = self.conn()?;
        let updated = conn.execute(
            "UPDATE interventions SET status = ? WHERE id = ? AND subject_id = ? AND status = 'pending'",
            params![status.as_str(), id, subject_id],
        )?;

        if updated == 0 {
            return Err(Error::InvalidTransition(format!(
                "intervention {} is no longer pending",
                id
            )));
        }

        self.get_intervention(id)?
            .ok_or_else(|| Error::NotFound(format!("Intervention {}", id)))
    }

    fn row_to_intervention(&self, row: &rusqlite::Row) -> rusqlite::Result<Intervention> {
        let type_str: String = row.get(2)?;
        let status_str: String = row.get(5)?;
        let created_at_str: String = row.get(6)?;

        Ok(Intervention {
            id: row.get(0)?,
            subject_id: row.get(1)?,
            intervention_type: type_str.parse().unwrap_or(InterventionType::Transition),
            trigger_pattern: row.get(3)?,
            message: row.get(4)?,
            status: status_str.parse().unwrap_or(InterventionStatus::Dismissed),
            created_at: parse_datetime(&created_at_str),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn new_intervention(
        subject: &str,
        intervention_type: InterventionType,
        created_at: DateTime<Utc>,
    ) -> NewIntervention {
        NewIntervention {
            subject_id: subject.to_string(),
            intervention_type,
            trigger_pattern: "test".to_string(),
            message: intervention_type.message().to_string(),
            created_at,
        }
    }

    #[test]
    fn test_insert_and_list() {
        let db = Database::in_memory().unwrap();
        let now = Utc::now();

        let id = db
            .insert_intervention(&new_intervention("alice", InterventionType::Hyperfocus, now))
            .unwrap()
            .unwrap();

        let stored = db.get_intervention(id).unwrap().unwrap();
        assert_eq!(stored.intervention_type, InterventionType::Hyperfocus);
        assert_eq!(stored.status, InterventionStatus::Pending);
        assert_eq!(stored.message, InterventionType::Hyperfocus.message());

        let pending = db
            .list_interventions("alice", Some(InterventionStatus::Pending))
            .unwrap();
        assert_eq!(pending.len(), 1);
        assert!(db.list_interventions("bob", None).unwrap().is_empty());
    }

    #[test]
    fn test_cooldown_applies_regardless_of_status() {
        let db = Database::in_memory().unwrap();
        let now = Utc::now();

        let id = db
            .insert_intervention(&new_intervention(
                "alice",
                InterventionType::EnergyCrash,
                now - Duration::hours(2),
            ))
            .unwrap()
            .unwrap();
        db.update_intervention_status(id, "alice", InterventionResponse::Dismissed)
            .unwrap();

        // Dismissed still counts toward the 12h cooldown
        assert!(db
            .has_recent_intervention("alice", InterventionType::EnergyCrash, now - Duration::hours(12))
            .unwrap());
        assert!(db
            .insert_intervention(&new_intervention("alice", InterventionType::EnergyCrash, now))
            .unwrap()
            .is_none());

        // 13h later it may fire again
        let later = now + Duration::hours(11);
        assert!(db
            .insert_intervention(&new_intervention("alice", InterventionType::EnergyCrash, later))
            .unwrap()
            .is_some());
    }

    #[test]
    fn test_update_status_ownership_and_transitions() {
        let db = Database::in_memory().unwrap();
        let id = db
            .insert_intervention(&new_intervention(
                "alice",
                InterventionType::DecisionFatigue,
                Utc::now(),
            ))
            .unwrap()
            .unwrap();

        let err = db
            .update_intervention_status(id, "mallory", InterventionResponse::Acted)
            .unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));

        let updated = db
            .update_intervention_status(id, "alice", InterventionResponse::Acted)
            .unwrap();
        assert_eq!(updated.status, InterventionStatus::Acted);

        let err = db
            .update_intervention_status(id, "alice", InterventionResponse::Dismissed)
            .unwrap_err();
        assert!(matches!(err, Error::InvalidTransition(_)));
    }
}
