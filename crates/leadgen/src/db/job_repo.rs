//! Job repository. CRUD and guarded updates for the `jobs` table.

use chrono::{DateTime, Utc};
use rusqlite::{params, Row};
use serde::Serialize;

use super::{format_ts, parse_opt_ts, parse_ts, sql_int, Database, DatabaseError};
use crate::model::{Intensity, Job, JobParams, JobStatus, Platform};

/// A raw job row from the database.
#[derive(Debug, Clone)]
pub struct JobRow {
    pub id: String,
    pub industry: String,
    pub location: String,
    pub radius: i64,
    pub max_results: i64,
    pub keywords: String,
    pub job_title: Option<String>,
    pub platforms: String,
    pub intensity: String,
    pub webhook_url: Option<String>,
    pub status: String,
    pub progress: i64,
    pub results_count: i64,
    pub error_message: Option<String>,
    pub retry_count: i64,
    pub created_at: String,
    pub updated_at: String,
    pub started_at: Option<String>,
    pub completed_at: Option<String>,
}

impl JobRow {
    fn from_row(row: &Row<'_>) -> Result<Self, rusqlite::Error> {
        Ok(Self {
            id: row.get("id")?,
            industry: row.get("industry")?,
            location: row.get("location")?,
            radius: row.get("radius")?,
            max_results: row.get("max_results")?,
            keywords: row.get("keywords")?,
            job_title: row.get("job_title")?,
            platforms: row.get("platforms")?,
            intensity: row.get("intensity")?,
            webhook_url: row.get("webhook_url")?,
            status: row.get("status")?,
            progress: row.get("progress")?,
            results_count: row.get("results_count")?,
            error_message: row.get("error_message")?,
            retry_count: row.get("retry_count")?,
            created_at: row.get("created_at")?,
            updated_at: row.get("updated_at")?,
            started_at: row.get("started_at")?,
            completed_at: row.get("completed_at")?,
        })
    }

    pub fn from_job(job: &Job) -> Result<Self, DatabaseError> {
        Ok(Self {
            id: job.id.clone(),
            industry: job.params.industry.clone(),
            location: job.params.location.clone(),
            radius: i64::from(job.params.radius),
            max_results: i64::from(job.params.max_results),
            keywords: serde_json::to_string(&job.params.keywords)?,
            job_title: job.params.job_title.clone(),
            platforms: serde_json::to_string(&job.params.platforms)?,
            intensity: job.params.intensity.as_str().to_string(),
            webhook_url: job.params.webhook_url.clone(),
            status: job.status.as_str().to_string(),
            progress: i64::from(job.progress),
            results_count: i64::from(job.results_count),
            error_message: job.error_message.clone(),
            retry_count: i64::from(job.retry_count),
            created_at: format_ts(job.created_at),
            updated_at: format_ts(job.updated_at),
            started_at: job.started_at.map(format_ts),
            completed_at: job.completed_at.map(format_ts),
        })
    }

    pub fn into_job(self) -> Result<Job, DatabaseError> {
        let keywords: Vec<String> = serde_json::from_str(&self.keywords)?;
        let platforms: Vec<Platform> = serde_json::from_str(&self.platforms)?;
        let intensity: Intensity = self
            .intensity
            .parse()
            .map_err(|e| DatabaseError::invalid("intensity", e))?;
        let status: JobStatus = self
            .status
            .parse()
            .map_err(|e| DatabaseError::invalid("status", e))?;

        Ok(Job {
            params: JobParams {
                industry: self.industry,
                location: self.location,
                radius: to_u32("radius", self.radius)?,
                max_results: to_u32("max_results", self.max_results)?,
                keywords,
                job_title: self.job_title,
                platforms,
                intensity,
                webhook_url: self.webhook_url,
            },
            status,
            progress: u8::try_from(self.progress)
                .map_err(|e| DatabaseError::invalid("progress", e))?,
            results_count: to_u32("results_count", self.results_count)?,
            error_message: self.error_message,
            retry_count: to_u32("retry_count", self.retry_count)?,
            created_at: parse_ts("created_at", &self.created_at)?,
            updated_at: parse_ts("updated_at", &self.updated_at)?,
            started_at: parse_opt_ts("started_at", self.started_at.as_deref())?,
            completed_at: parse_opt_ts("completed_at", self.completed_at.as_deref())?,
            id: self.id,
        })
    }
}

fn to_u32(column: &'static str, value: i64) -> Result<u32, DatabaseError> {
    u32::try_from(value).map_err(|e| DatabaseError::invalid(column, e))
}

/// Query filter parameters for job listing.
#[derive(Debug, Default, Clone)]
pub struct JobFilter {
    pub status: Option<JobStatus>,
    pub limit: Option<u64>,
    pub offset: Option<u64>,
}

/// Field changes applied together with a guarded status change.
#[derive(Debug, Clone, Default)]
pub struct Transition {
    pub progress: Option<u8>,
    pub error_message: Option<String>,
    pub set_started: bool,
    pub set_completed: bool,
}

/// Number of jobs in each status.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StatusCounts {
    pub queued: u64,
    pub processing: u64,
    pub completed: u64,
    pub failed: u64,
    pub cancelled: u64,
}

impl StatusCounts {
    pub fn total(&self) -> u64 {
        self.queued + self.processing + self.completed + self.failed + self.cancelled
    }

    pub fn get(&self, status: JobStatus) -> u64 {
        match status {
            JobStatus::Queued => self.queued,
            JobStatus::Processing => self.processing,
            JobStatus::Completed => self.completed,
            JobStatus::Failed => self.failed,
            JobStatus::Cancelled => self.cancelled,
        }
    }

    fn slot(&mut self, status: JobStatus) -> &mut u64 {
        match status {
            JobStatus::Queued => &mut self.queued,
            JobStatus::Processing => &mut self.processing,
            JobStatus::Completed => &mut self.completed,
            JobStatus::Failed => &mut self.failed,
            JobStatus::Cancelled => &mut self.cancelled,
        }
    }
}

/// Inserts a new job row.
pub fn insert(db: &Database, job: &Job) -> Result<(), DatabaseError> {
    let row = JobRow::from_job(job)?;
    db.with_conn(|conn| {
        conn.execute(
            "INSERT INTO jobs (id, industry, location, radius, max_results, keywords, job_title,
             platforms, intensity, webhook_url, status, progress, results_count, error_message,
             retry_count, created_at, updated_at, started_at, completed_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17,
             ?18, ?19)",
            params![
                row.id,
                row.industry,
                row.location,
                row.radius,
                row.max_results,
                row.keywords,
                row.job_title,
                row.platforms,
                row.intensity,
                row.webhook_url,
                row.status,
                row.progress,
                row.results_count,
                row.error_message,
                row.retry_count,
                row.created_at,
                row.updated_at,
                row.started_at,
                row.completed_at,
            ],
        )?;
        Ok(())
    })
}

/// Finds a job by its ID.
pub fn find_by_id(db: &Database, id: &str) -> Result<Option<Job>, DatabaseError> {
    let row = db.with_conn(|conn| {
        let mut stmt = conn.prepare("SELECT * FROM jobs WHERE id = ?1")?;
        let mut rows = stmt.query_map(params![id], JobRow::from_row)?;
        match rows.next() {
            Some(Ok(row)) => Ok(Some(row)),
            Some(Err(e)) => Err(DatabaseError::Sqlite(e)),
            None => Ok(None),
        }
    })?;
    row.map(JobRow::into_job).transpose()
}

/// Queries jobs newest first, returning (jobs, total_count).
pub fn query(db: &Database, filter: &JobFilter) -> Result<(Vec<Job>, u64), DatabaseError> {
    let (rows, total) = db.with_conn(|conn| {
        let mut conditions = Vec::new();
        let mut param_values: Vec<Box<dyn rusqlite::types::ToSql>> = Vec::new();

        if let Some(status) = filter.status {
            conditions.push(format!("status = ?{}", param_values.len() + 1));
            param_values.push(Box::new(status.as_str()));
        }

        let where_clause = if conditions.is_empty() {
            String::new()
        } else {
            format!("WHERE {}", conditions.join(" AND "))
        };

        let count_sql = format!("SELECT COUNT(*) FROM jobs {}", where_clause);
        let params_ref: Vec<&dyn rusqlite::types::ToSql> =
            param_values.iter().map(|p| p.as_ref()).collect();
        let total: u64 = conn.query_row(&count_sql, params_ref.as_slice(), |r| r.get(0))?;

        let limit = sql_int("limit", filter.limit.unwrap_or(50))?;
        let offset = sql_int("offset", filter.offset.unwrap_or(0))?;
        param_values.push(Box::new(limit));
        param_values.push(Box::new(offset));
        let query_sql = format!(
            "SELECT * FROM jobs {} ORDER BY created_at DESC, rowid DESC LIMIT ?{} OFFSET ?{}",
            where_clause,
            param_values.len() - 1,
            param_values.len()
        );

        let params_ref: Vec<&dyn rusqlite::types::ToSql> =
            param_values.iter().map(|p| p.as_ref()).collect();
        let mut stmt = conn.prepare(&query_sql)?;
        let rows: Vec<JobRow> = stmt
            .query_map(params_ref.as_slice(), JobRow::from_row)?
            .collect::<Result<Vec<_>, _>>()?;

        Ok((rows, total))
    })?;

    let jobs = rows
        .into_iter()
        .map(JobRow::into_job)
        .collect::<Result<Vec<_>, _>>()?;
    Ok((jobs, total))
}

/// IDs of queued jobs, oldest first.
pub fn queued_ids(db: &Database, limit: usize) -> Result<Vec<String>, DatabaseError> {
    db.with_conn(|conn| {
        let mut stmt = conn.prepare(
            "SELECT id FROM jobs WHERE status = 'queued'
             ORDER BY created_at ASC, rowid ASC LIMIT ?1",
        )?;
        let ids = stmt
            .query_map(params![i64::try_from(limit).unwrap_or(i64::MAX)], |r| r.get::<_, String>(0))?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(ids)
    })
}

/// Moves a job to `to` only if its current status is one of `from`.
///
/// Returns `false` when the guard did not match (lost race or missing job).
pub fn transition(
    db: &Database,
    id: &str,
    from: &[JobStatus],
    to: JobStatus,
    change: &Transition,
    now: DateTime<Utc>,
) -> Result<bool, DatabaseError> {
    if from.is_empty() {
        return Ok(false);
    }
    let now = format_ts(now);

    db.with_conn(|conn| {
        let mut sets = vec!["status = ?1".to_string(), "updated_at = ?2".to_string()];
        let mut param_values: Vec<Box<dyn rusqlite::types::ToSql>> =
            vec![Box::new(to.as_str()), Box::new(now.clone())];

        if let Some(progress) = change.progress {
            param_values.push(Box::new(i64::from(progress)));
            sets.push(format!("progress = ?{}", param_values.len()));
        }
        if let Some(ref message) = change.error_message {
            param_values.push(Box::new(message.clone()));
            sets.push(format!("error_message = ?{}", param_values.len()));
        }
        if change.set_started {
            sets.push("started_at = ?2".to_string());
        }
        if change.set_completed {
            sets.push("completed_at = ?2".to_string());
        }

        param_values.push(Box::new(id.to_string()));
        let id_param = param_values.len();

        let mut placeholders = Vec::with_capacity(from.len());
        for status in from {
            param_values.push(Box::new(status.as_str()));
            placeholders.push(format!("?{}", param_values.len()));
        }

        let sql = format!(
            "UPDATE jobs SET {} WHERE id = ?{} AND status IN ({})",
            sets.join(", "),
            id_param,
            placeholders.join(", ")
        );
        let params_ref: Vec<&dyn rusqlite::types::ToSql> =
            param_values.iter().map(|p| p.as_ref()).collect();
        let changed = conn.execute(&sql, params_ref.as_slice())?;
        Ok(changed == 1)
    })
}

/// Raises progress of a processing job. Never lowers it.
///
/// Returns `false` if the job is no longer processing.
pub fn update_progress(
    db: &Database,
    id: &str,
    progress: u8,
    now: DateTime<Utc>,
) -> Result<bool, DatabaseError> {
    db.with_conn(|conn| {
        let changed = conn.execute(
            "UPDATE jobs SET progress = MAX(progress, ?2), updated_at = ?3
             WHERE id = ?1 AND status = 'processing'",
            params![id, i64::from(progress.min(100)), format_ts(now)],
        )?;
        Ok(changed == 1)
    })
}

/// Sets `results_count` on a processing job.
pub fn set_results_count(
    db: &Database,
    id: &str,
    count: u32,
    now: DateTime<Utc>,
) -> Result<bool, DatabaseError> {
    db.with_conn(|conn| {
        let changed = conn.execute(
            "UPDATE jobs SET results_count = ?2, updated_at = ?3
             WHERE id = ?1 AND status = 'processing'",
            params![id, i64::from(count), format_ts(now)],
        )?;
        Ok(changed == 1)
    })
}

/// Records a failed attempt that will be retried.
pub fn record_retry(
    db: &Database,
    id: &str,
    error_message: &str,
    now: DateTime<Utc>,
) -> Result<bool, DatabaseError> {
    db.with_conn(|conn| {
        let changed = conn.execute(
            "UPDATE jobs SET retry_count = retry_count + 1, error_message = ?2, updated_at = ?3
             WHERE id = ?1 AND status = 'processing'",
            params![id, error_message, format_ts(now)],
        )?;
        Ok(changed == 1)
    })
}

/// Counts jobs per status.
pub fn count_by_status(db: &Database) -> Result<StatusCounts, DatabaseError> {
    let rows = db.with_conn(|conn| {
        let mut stmt = conn.prepare("SELECT status, COUNT(*) FROM jobs GROUP BY status")?;
        let rows = stmt
            .query_map([], |r| Ok((r.get::<_, String>(0)?, r.get::<_, u64>(1)?)))?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    })?;

    let mut counts = StatusCounts::default();
    for (status, count) in rows {
        match status.parse::<JobStatus>() {
            Ok(status) => *counts.slot(status) += count,
            Err(e) => log::warn!("Skipping {} jobs with {}", count, e),
        }
    }
    Ok(counts)
}

/// Average run time in seconds over completed jobs.
pub fn avg_completed_duration_secs(db: &Database) -> Result<Option<f64>, DatabaseError> {
    db.with_conn(|conn| {
        let avg: Option<f64> = conn.query_row(
            "SELECT AVG((julianday(completed_at) - julianday(started_at)) * 86400.0)
             FROM jobs
             WHERE status = 'completed' AND started_at IS NOT NULL AND completed_at IS NOT NULL",
            [],
            |r| r.get(0),
        )?;
        Ok(avg)
    })
}

/// Deletes terminal jobs that completed before `cutoff`. Leads cascade.
pub fn delete_finished_before(
    db: &Database,
    cutoff: DateTime<Utc>,
) -> Result<usize, DatabaseError> {
    db.with_conn(|conn| {
        let deleted = conn.execute(
            "DELETE FROM jobs
             WHERE status IN ('completed', 'failed', 'cancelled')
               AND completed_at IS NOT NULL AND completed_at < ?1",
            params![format_ts(cutoff)],
        )?;
        Ok(deleted)
    })
}
