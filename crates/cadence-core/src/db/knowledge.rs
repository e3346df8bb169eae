//! Knowledge fact storage used to enrich predictions

use chrono::Utc;
use rusqlite::params;

use super::{format_datetime, Database};
use crate::error::{Error, Result};

/// Words shorter than this are ignored when matching facts
const MIN_TERM_LEN: usize = 3;

impl Database {
    /// Store a free-text fact about a subject
    pub fn add_knowledge_fact(&self, subject_id: &str, fact: &str) -> Result<i64> {
        let fact = fact.trim();
        if fact.is_empty() {
            return Err(Error::InvalidData("fact must not be empty".into()));
        }

        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO knowledge_facts (subject_id, fact, created_at) VALUES (?, ?, ?)",
            params![subject_id, fact, format_datetime(&Utc::now())],
        )?;
        Ok(conn.last_insert_rowid())
    }

    /// All facts for a subject, newest first
    pub fn list_knowledge_facts(&self, subject_id: &str) -> Result<Vec<(i64, String)>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT id, fact FROM knowledge_facts WHERE subject_id = ? ORDER BY created_at DESC, id DESC",
        )?;
        let rows = stmt.query_map(params![subject_id], |row| Ok((row.get(0)?, row.get(1)?)))?;
        let facts: std::result::Result<Vec<_>, _> = rows.collect();
        Ok(facts?)
    }

    /// Facts sharing the most query terms, best match first
    pub fn search_knowledge_facts(
        &self,
        subject_id: &str,
        query: &str,
        max_results: usize,
    ) -> Result<Vec<String>> {
        let terms: Vec<String> = query
            .split(|c: char| !c.is_alphanumeric())
            .filter(|t| t.len() >= MIN_TERM_LEN)
            .map(|t| t.to_lowercase())
            .collect();

        if terms.is_empty() || max_results == 0 {
            return Ok(vec![]);
        }

        let mut scored: Vec<(usize, i64, String)> = self
            .list_knowledge_facts(subject_id)?
            .into_iter()
            .filter_map(|(id, fact)| {
                let lower = fact.to_lowercase();
                let hits = terms.iter().filter(|t| lower.contains(t.as_str())).count();
                (hits > 0).then_some((hits, id, fact))
            })
            .collect();

        // More hits first, then newer facts
        scored.sort_by(|a, b| b.0.cmp(&a.0).then_with(|| b.1.cmp(&a.1)));

        Ok(scored
            .into_iter()
            .take(max_results)
            .map(|(_, _, fact)| fact)
            .collect())
    }
}
