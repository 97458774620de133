//! Job result export as CSV or JSON.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{LeadgenError, Result};
use crate::model::{EnrichmentData, Lead, ParseEnumError, Platform};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExportFormat {
    #[default]
    Csv,
    Json,
}

impl ExportFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExportFormat::Csv => "csv",
            ExportFormat::Json => "json",
        }
    }

    pub fn content_type(&self) -> &'static str {
        match self {
            ExportFormat::Csv => "text/csv",
            ExportFormat::Json => "application/json",
        }
    }
}

impl fmt::Display for ExportFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ExportFormat {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim() {
            "csv" => Ok(ExportFormat::Csv),
            "json" => Ok(ExportFormat::Json),
            other => Err(ParseEnumError::new("export format", other)),
        }
    }
}

/// Rendered export of one job's leads.
#[derive(Debug, Clone, Serialize)]
pub struct ExportedResults {
    pub job_id: String,
    pub format: ExportFormat,
    pub content_type: &'static str,
    pub include_enrichment: bool,
    pub record_count: usize,
    pub size_bytes: usize,
    #[serde(skip)]
    pub content: Vec<u8>,
}

const CSV_COLUMNS: [&str; 15] = [
    "id",
    "business_name",
    "name",
    "phone",
    "email",
    "website",
    "address",
    "industry",
    "job_title",
    "source_platform",
    "source_url",
    "quality_score",
    "completeness_score",
    "confidence_score",
    "created_at",
];

const CSV_ENRICHMENT_COLUMNS: [&str; 2] = ["enriched_platforms", "enrichment_data"];

/// Renders `leads` in `format`. Enrichment payloads are left out unless
/// `include_enrichment` is set.
pub fn render(leads: &[Lead], format: ExportFormat, include_enrichment: bool) -> Result<Vec<u8>> {
    match format {
        ExportFormat::Csv => render_csv(leads, include_enrichment),
        ExportFormat::Json => render_json(leads, include_enrichment),
    }
}

fn render_csv(leads: &[Lead], include_enrichment: bool) -> Result<Vec<u8>> {
    let mut writer = csv::Writer::from_writer(Vec::new());

    let mut header: Vec<&str> = CSV_COLUMNS.to_vec();
    if include_enrichment {
        header.extend(CSV_ENRICHMENT_COLUMNS);
    }
    writer.write_record(&header)?;

    for lead in leads {
        let mut record = vec![
            lead.id.clone(),
            text(&lead.business_name),
            text(&lead.name),
            text(&lead.phone),
            text(&lead.email),
            text(&lead.website),
            text(&lead.address),
            text(&lead.industry),
            text(&lead.job_title),
            lead.source_platform.to_string(),
            text(&lead.source_url),
            number(lead.quality_score),
            number(lead.completeness_score),
            number(lead.confidence_score),
            lead.created_at.to_rfc3339(),
        ];
        if include_enrichment {
            record.push(platform_list(&lead.enrichment_data));
            record.push(if lead.enrichment_data.is_empty() {
                String::new()
            } else {
                serde_json::to_string(&lead.enrichment_data)?
            });
        }
        writer.write_record(&record)?;
    }

    writer
        .into_inner()
        .map_err(|e| LeadgenError::Csv(e.into_error().into()))
}

fn text(value: &Option<String>) -> String {
    value.clone().unwrap_or_default()
}

fn number<T: ToString>(value: Option<T>) -> String {
    value.map(|v| v.to_string()).unwrap_or_default()
}

fn platform_list(data: &EnrichmentData) -> String {
    data.keys()
        .map(Platform::as_str)
        .collect::<Vec<_>>()
        .join(";")
}

fn render_json(leads: &[Lead], include_enrichment: bool) -> Result<Vec<u8>> {
    if include_enrichment {
        return Ok(serde_json::to_vec_pretty(leads)?);
    }

    let rows = leads
        .iter()
        .map(|lead| {
            let mut value = serde_json::to_value(lead)?;
            if let Some(object) = value.as_object_mut() {
                object.remove("enrichment_data");
            }
            Ok(value)
        })
        .collect::<std::result::Result<Vec<_>, serde_json::Error>>()?;
    Ok(serde_json::to_vec_pretty(&rows)?)
}
