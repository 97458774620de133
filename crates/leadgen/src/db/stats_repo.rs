//! Daily statistics repository. Records and queries per-day job metrics.

use rusqlite::params;
use serde::Serialize;

use super::{Database, DatabaseError};

/// Records a job that reached Completed or Failed into the daily statistics.
pub fn record_job_completion(
    db: &Database,
    date: &str,
    succeeded: bool,
    leads: u32,
    duration_ms: i64,
) -> Result<(), DatabaseError> {
    db.with_conn(|conn| {
        let success_val: i64 = if succeeded { 1 } else { 0 };
        let failure_val: i64 = if succeeded { 0 } else { 1 };

        // Right-hand column references in DO UPDATE see the pre-update row, so
        // the running average is (A * N + new) / (N + 1).
        conn.execute(
            "INSERT INTO daily_stats (date, total_processed, total_succeeded, total_failed,
             total_leads, avg_duration_ms)
             VALUES (?1, 1, ?2, ?3, ?4, ?5)
             ON CONFLICT(date) DO UPDATE SET
               total_processed = total_processed + 1,
               total_succeeded = total_succeeded + ?2,
               total_failed = total_failed + ?3,
               total_leads = total_leads + ?4,
               avg_duration_ms = (avg_duration_ms * total_processed + ?5) / (total_processed + 1)",
            params![date, success_val, failure_val, i64::from(leads), duration_ms],
        )?;
        Ok(())
    })
}

/// A single statistics row.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DailyStatRow {
    pub date: String,
    pub total_processed: i64,
    pub total_succeeded: i64,
    pub total_failed: i64,
    pub total_leads: i64,
    pub avg_duration_ms: i64,
}

/// Queries statistics rows within an optional date range, newest first.
pub fn query(
    db: &Database,
    from_date: Option<&str>,
    to_date: Option<&str>,
) -> Result<Vec<DailyStatRow>, DatabaseError> {
    db.with_conn(|conn| {
        let mut conditions = Vec::new();
        let mut param_values: Vec<Box<dyn rusqlite::types::ToSql>> = Vec::new();

        if let Some(from) = from_date {
            conditions.push(format!("date >= ?{}", param_values.len() + 1));
            param_values.push(Box::new(from.to_string()));
        }
        if let Some(to) = to_date {
            conditions.push(format!("date <= ?{}", param_values.len() + 1));
            param_values.push(Box::new(to.to_string()));
        }

        let where_clause = if conditions.is_empty() {
            String::new()
        } else {
            format!("WHERE {}", conditions.join(" AND "))
        };

        let sql = format!(
            "SELECT date, total_processed, total_succeeded, total_failed, total_leads,
             avg_duration_ms FROM daily_stats {} ORDER BY date DESC",
            where_clause
        );

        let params_ref: Vec<&dyn rusqlite::types::ToSql> =
            param_values.iter().map(|p| p.as_ref()).collect();
        let mut stmt = conn.prepare(&sql)?;
        let rows: Vec<DailyStatRow> = stmt
            .query_map(params_ref.as_slice(), |row| {
                Ok(DailyStatRow {
                    date: row.get(0)?,
                    total_processed: row.get(1)?,
                    total_succeeded: row.get(2)?,
                    total_failed: row.get(3)?,
                    total_leads: row.get(4)?,
                    avg_duration_ms: row.get(5)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(rows)
    })
}
