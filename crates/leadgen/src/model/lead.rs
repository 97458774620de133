use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::platform::Platform;

/// Per-platform enrichment payloads keyed by platform.
pub type EnrichmentData = BTreeMap<Platform, serde_json::Value>;

/// A record as returned by a discovery provider, before persistence.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawLead {
    pub name: Option<String>,
    pub business_name: Option<String>,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub website: Option<String>,
    pub address: Option<String>,
    pub industry: Option<String>,
    pub job_title: Option<String>,
    pub source_platform: Option<Platform>,
    pub source_url: Option<String>,
    #[serde(default)]
    pub enrichment_data: EnrichmentData,
}

impl RawLead {
    /// Creates an empty record attributed to `platform`.
    pub fn from_platform(platform: Platform) -> Self {
        Self {
            source_platform: Some(platform),
            ..Default::default()
        }
    }
}

/// A persisted lead owned by exactly one job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Lead {
    pub id: String,
    pub job_id: String,
    pub name: Option<String>,
    pub business_name: Option<String>,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub website: Option<String>,
    pub address: Option<String>,
    pub industry: Option<String>,
    pub job_title: Option<String>,
    pub source_platform: Platform,
    pub source_url: Option<String>,
    pub enrichment_data: EnrichmentData,
    pub quality_score: Option<u8>,
    pub completeness_score: Option<f64>,
    pub confidence_score: Option<f64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Lead {
    /// Builds a lead for `job_id` from a discovered record. Records without a
    /// source platform are attributed to `fallback_platform`.
    pub fn from_raw(job_id: &str, raw: RawLead, fallback_platform: Platform) -> Self {
        let now = Utc::now();
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            job_id: job_id.to_string(),
            name: raw.name,
            business_name: raw.business_name,
            phone: raw.phone,
            email: raw.email,
            website: raw.website,
            address: raw.address,
            industry: raw.industry,
            job_title: raw.job_title,
            source_platform: raw.source_platform.unwrap_or(fallback_platform),
            source_url: raw.source_url,
            enrichment_data: raw.enrichment_data,
            quality_score: None,
            completeness_score: None,
            confidence_score: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn apply_scores(&mut self, scores: LeadScores) {
        self.quality_score = Some(scores.quality_score);
        self.completeness_score = Some(scores.completeness_score);
        self.confidence_score = Some(scores.confidence_score);
    }

    pub fn scores(&self) -> Option<LeadScores> {
        Some(LeadScores {
            quality_score: self.quality_score?,
            completeness_score: self.completeness_score?,
            confidence_score: self.confidence_score?,
        })
    }

    /// The six contact fields completeness is measured against.
    pub fn contact_fields(&self) -> [Option<&str>; 6] {
        [
            self.name.as_deref(),
            self.business_name.as_deref(),
            self.phone.as_deref(),
            self.email.as_deref(),
            self.website.as_deref(),
            self.address.as_deref(),
        ]
    }
}

/// The three derived metrics of a lead.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LeadScores {
    pub quality_score: u8,
    pub completeness_score: f64,
    pub confidence_score: f64,
}

/// Audit row for one successful platform enrichment of a lead.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnrichmentRecord {
    pub id: String,
    pub lead_id: String,
    pub platform: Platform,
    pub data_type: String,
    pub raw_data: serde_json::Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub processed_data: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f64>,
    pub scraped_at: DateTime<Utc>,
}

impl EnrichmentRecord {
    pub fn new(lead_id: &str, platform: Platform, data_type: &str, raw_data: serde_json::Value) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            lead_id: lead_id.to_string(),
            platform,
            data_type: data_type.to_string(),
            raw_data,
            processed_data: None,
            confidence: None,
            scraped_at: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_from_raw_keeps_fields_and_platform() {
        let mut raw = RawLead::from_platform(Platform::GoogleBusiness);
        raw.business_name = Some("Flour Power".to_string());
        raw.phone = Some("+1 (555) 123-4567".to_string());

        let lead = Lead::from_raw("job-1", raw, Platform::GoogleMaps);
        assert_eq!(lead.job_id, "job-1");
        assert_eq!(lead.source_platform, Platform::GoogleBusiness);
        assert_eq!(lead.business_name.as_deref(), Some("Flour Power"));
        assert!(lead.quality_score.is_none());
    }

    #[test]
    fn test_from_raw_uses_fallback_platform() {
        let lead = Lead::from_raw("job-1", RawLead::default(), Platform::GoogleMaps);
        assert_eq!(lead.source_platform, Platform::GoogleMaps);
    }

    #[test]
    fn test_enrichment_data_serializes_with_platform_keys() {
        let mut data = EnrichmentData::new();
        data.insert(Platform::Linkedin, json!({"connections": 120}));

        let value = serde_json::to_value(&data).unwrap();
        assert_eq!(value["linkedin"]["connections"], 120);

        let back: EnrichmentData = serde_json::from_value(value).unwrap();
        assert_eq!(back, data);
    }
}
