//! Lead repository. Leads, their enrichment payloads and audit records.

use chrono::Utc;
use rusqlite::{params, Connection, Row};
use serde::Serialize;

use super::{format_ts, parse_ts, sql_int, Database, DatabaseError};
use crate::model::{EnrichmentData, EnrichmentRecord, Lead, LeadScores, Platform};

/// A raw lead row from the database.
#[derive(Debug, Clone)]
struct LeadRow {
    id: String,
    job_id: String,
    name: Option<String>,
    business_name: Option<String>,
    phone: Option<String>,
    email: Option<String>,
    website: Option<String>,
    address: Option<String>,
    industry: Option<String>,
    job_title: Option<String>,
    source_platform: String,
    source_url: Option<String>,
    enrichment_data: String,
    quality_score: Option<i64>,
    completeness_score: Option<f64>,
    confidence_score: Option<f64>,
    created_at: String,
    updated_at: String,
}

impl LeadRow {
    fn from_row(row: &Row<'_>) -> Result<Self, rusqlite::Error> {
        Ok(Self {
            id: row.get("id")?,
            job_id: row.get("job_id")?,
            name: row.get("name")?,
            business_name: row.get("business_name")?,
            phone: row.get("phone")?,
            email: row.get("email")?,
            website: row.get("website")?,
            address: row.get("address")?,
            industry: row.get("industry")?,
            job_title: row.get("job_title")?,
            source_platform: row.get("source_platform")?,
            source_url: row.get("source_url")?,
            enrichment_data: row.get("enrichment_data")?,
            quality_score: row.get("quality_score")?,
            completeness_score: row.get("completeness_score")?,
            confidence_score: row.get("confidence_score")?,
            created_at: row.get("created_at")?,
            updated_at: row.get("updated_at")?,
        })
    }

    fn into_lead(self) -> Result<Lead, DatabaseError> {
        let enrichment_data: EnrichmentData = serde_json::from_str(&self.enrichment_data)?;
        let source_platform: Platform = self
            .source_platform
            .parse()
            .map_err(|e| DatabaseError::invalid("source_platform", e))?;
        let quality_score = self
            .quality_score
            .map(u8::try_from)
            .transpose()
            .map_err(|e| DatabaseError::invalid("quality_score", e))?;

        Ok(Lead {
            id: self.id,
            job_id: self.job_id,
            name: self.name,
            business_name: self.business_name,
            phone: self.phone,
            email: self.email,
            website: self.website,
            address: self.address,
            industry: self.industry,
            job_title: self.job_title,
            source_platform,
            source_url: self.source_url,
            enrichment_data,
            quality_score,
            completeness_score: self.completeness_score,
            confidence_score: self.confidence_score,
            created_at: parse_ts("created_at", &self.created_at)?,
            updated_at: parse_ts("updated_at", &self.updated_at)?,
        })
    }
}

/// Lead count and average quality for one source platform.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlatformStat {
    pub platform: Platform,
    pub lead_count: u64,
    pub avg_quality_score: Option<f64>,
}

fn insert_lead(conn: &Connection, lead: &Lead) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO leads (id, job_id, name, business_name, phone, email, website, address,
         industry, job_title, source_platform, source_url, enrichment_data, quality_score,
         completeness_score, confidence_score, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17, ?18)",
        params![
            lead.id,
            lead.job_id,
            lead.name,
            lead.business_name,
            lead.phone,
            lead.email,
            lead.website,
            lead.address,
            lead.industry,
            lead.job_title,
            lead.source_platform.as_str(),
            lead.source_url,
            serde_json::to_string(&lead.enrichment_data)?,
            lead.quality_score.map(i64::from),
            lead.completeness_score,
            lead.confidence_score,
            format_ts(lead.created_at),
            format_ts(lead.updated_at),
        ],
    )?;
    Ok(())
}

fn insert_record(conn: &Connection, record: &EnrichmentRecord) -> Result<(), DatabaseError> {
    let processed = record
        .processed_data
        .as_ref()
        .map(serde_json::to_string)
        .transpose()?;
    conn.execute(
        "INSERT INTO enrichment_records (id, lead_id, platform, data_type, raw_data,
         processed_data, confidence, scraped_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
        params![
            record.id,
            record.lead_id,
            record.platform.as_str(),
            record.data_type,
            serde_json::to_string(&record.raw_data)?,
            processed,
            record.confidence,
            format_ts(record.scraped_at),
        ],
    )?;
    Ok(())
}

/// Replaces every lead of `job_id` with `leads` in one transaction.
pub fn replace_for_job(db: &Database, job_id: &str, leads: &[Lead]) -> Result<usize, DatabaseError> {
    db.with_transaction(|tx| {
        let removed = tx.execute("DELETE FROM leads WHERE job_id = ?1", params![job_id])?;
        if removed > 0 {
            log::debug!("Replaced {} existing leads for job {}", removed, job_id);
        }
        for lead in leads {
            insert_lead(tx, lead)?;
        }
        Ok(leads.len())
    })
}

/// All leads of a job, oldest first.
pub fn find_by_job(db: &Database, job_id: &str) -> Result<Vec<Lead>, DatabaseError> {
    let rows = db.with_conn(|conn| {
        let mut stmt = conn.prepare(
            "SELECT * FROM leads WHERE job_id = ?1 ORDER BY created_at ASC, rowid ASC",
        )?;
        let rows = stmt
            .query_map(params![job_id], LeadRow::from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    })?;
    rows.into_iter().map(LeadRow::into_lead).collect()
}

/// A page of a job's leads, newest first.
pub fn page(
    db: &Database,
    job_id: &str,
    offset: u64,
    limit: u64,
) -> Result<Vec<Lead>, DatabaseError> {
    let limit = sql_int("limit", limit)?;
    let offset = sql_int("offset", offset)?;
    let rows = db.with_conn(|conn| {
        let mut stmt = conn.prepare(
            "SELECT * FROM leads WHERE job_id = ?1
             ORDER BY created_at DESC, rowid DESC LIMIT ?2 OFFSET ?3",
        )?;
        let rows = stmt
            .query_map(params![job_id, limit, offset], LeadRow::from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    })?;
    rows.into_iter().map(LeadRow::into_lead).collect()
}

/// Persists a lead's enrichment payload and scores along with its new
/// audit records.
pub fn update_enrichment(
    db: &Database,
    lead: &Lead,
    records: &[EnrichmentRecord],
) -> Result<(), DatabaseError> {
    let data = serde_json::to_string(&lead.enrichment_data)?;
    db.with_transaction(|tx| {
        tx.execute(
            "UPDATE leads SET enrichment_data = ?2, quality_score = ?3, completeness_score = ?4,
             confidence_score = ?5, updated_at = ?6 WHERE id = ?1",
            params![
                lead.id,
                data,
                lead.quality_score.map(i64::from),
                lead.completeness_score,
                lead.confidence_score,
                format_ts(Utc::now()),
            ],
        )?;
        for record in records {
            insert_record(tx, record)?;
        }
        Ok(())
    })
}

/// Overwrites the three scores of a lead.
pub fn update_scores(db: &Database, lead_id: &str, scores: &LeadScores) -> Result<(), DatabaseError> {
    db.with_conn(|conn| {
        conn.execute(
            "UPDATE leads SET quality_score = ?2, completeness_score = ?3, confidence_score = ?4,
             updated_at = ?5 WHERE id = ?1",
            params![
                lead_id,
                i64::from(scores.quality_score),
                scores.completeness_score,
                scores.confidence_score,
                format_ts(Utc::now()),
            ],
        )?;
        Ok(())
    })
}

/// Counts all leads.
pub fn count(db: &Database) -> Result<u64, DatabaseError> {
    db.with_conn(|conn| {
        let count: u64 = conn.query_row("SELECT COUNT(*) FROM leads", [], |r| r.get(0))?;
        Ok(count)
    })
}

/// Lead counts and average quality grouped by source platform.
pub fn platform_stats(db: &Database) -> Result<Vec<PlatformStat>, DatabaseError> {
    let rows = db.with_conn(|conn| {
        let mut stmt = conn.prepare(
            "SELECT source_platform, COUNT(*), AVG(quality_score)
             FROM leads GROUP BY source_platform ORDER BY source_platform",
        )?;
        let rows = stmt
            .query_map([], |r| {
                Ok((
                    r.get::<_, String>(0)?,
                    r.get::<_, u64>(1)?,
                    r.get::<_, Option<f64>>(2)?,
                ))
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    })?;

    rows.into_iter()
        .map(|(platform, lead_count, avg_quality_score)| {
            Ok(PlatformStat {
                platform: platform
                    .parse()
                    .map_err(|e| DatabaseError::invalid("source_platform", e))?,
                lead_count,
                avg_quality_score,
            })
        })
        .collect()
}

/// Audit records for one lead, in insertion order.
pub fn records_for_lead(db: &Database, lead_id: &str) -> Result<Vec<EnrichmentRecord>, DatabaseError> {
    type RecordRow = (
        String,
        String,
        String,
        String,
        String,
        Option<String>,
        Option<f64>,
        String,
    );

    let rows: Vec<RecordRow> = db.with_conn(|conn| {
        let mut stmt = conn.prepare(
            "SELECT id, lead_id, platform, data_type, raw_data, processed_data, confidence,
             scraped_at FROM enrichment_records WHERE lead_id = ?1 ORDER BY rowid ASC",
        )?;
        let rows = stmt
            .query_map(params![lead_id], |r| {
                Ok((
                    r.get(0)?,
                    r.get(1)?,
                    r.get(2)?,
                    r.get(3)?,
                    r.get(4)?,
                    r.get(5)?,
                    r.get(6)?,
                    r.get(7)?,
                ))
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    })?;

    rows.into_iter()
        .map(
            |(id, lead_id, platform, data_type, raw, processed, confidence, scraped_at)| {
                Ok(EnrichmentRecord {
                    id,
                    lead_id,
                    platform: platform
                        .parse()
                        .map_err(|e| DatabaseError::invalid("platform", e))?,
                    data_type,
                    raw_data: serde_json::from_str(&raw)?,
                    processed_data: processed.as_deref().map(serde_json::from_str).transpose()?,
                    confidence,
                    scraped_at: parse_ts("scraped_at", &scraped_at)?,
                })
            },
        )
        .collect()
}
