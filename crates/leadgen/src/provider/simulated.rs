//! Deterministic stand-in providers.
//!
//! Output is derived from a hash of the request, so the same search always
//! yields the same records. No network access.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Map, Value};

use super::{DiscoveryCriteria, EnrichmentField, LeadProvider, ProviderError};
use crate::model::{Lead, Platform, RawLead};

const BUSINESS_TYPES: [&str; 6] = [
    "Restaurant",
    "Retail Store",
    "Service Provider",
    "Consulting Firm",
    "Medical Practice",
    "Law Firm",
];

const COMPANY_SIZES: [&str; 5] = ["1-10", "11-50", "51-200", "201-500", "500+"];

const TITLES: [&str; 6] = [
    "CEO",
    "Founder",
    "VP of Sales",
    "Marketing Director",
    "Operations Manager",
    "Business Development",
];

pub struct SimulatedProvider {
    platform: Platform,
    latency: Duration,
}

impl SimulatedProvider {
    pub fn new(platform: Platform, latency: Duration) -> Self {
        Self { platform, latency }
    }

    async fn pause(&self) {
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
    }
}

fn hash_of<T: Hash + ?Sized>(value: &T) -> u64 {
    let mut hasher = DefaultHasher::new();
    value.hash(&mut hasher);
    hasher.finish()
}

/// Value in `[low, high]` picked by `seed`.
fn pick(seed: u64, low: u64, high: u64) -> u64 {
    low + seed % (high - low + 1)
}

fn slug(value: Option<&str>, fallback: &str, sep: &str) -> String {
    value
        .unwrap_or(fallback)
        .to_lowercase()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(sep)
}

fn phone(seed: u64) -> String {
    format!(
        "+1 (555) {}-{}",
        pick(seed, 100, 999),
        pick(seed >> 16, 1000, 9999)
    )
}

fn merge(target: &mut Map<String, Value>, extra: Value) {
    if let Value::Object(extra) = extra {
        target.extend(extra);
    }
}

impl SimulatedProvider {
    fn search_seed(&self, criteria: &DiscoveryCriteria) -> u64 {
        hash_of(&(
            self.platform.as_str(),
            &criteria.industry,
            &criteria.location,
            criteria.radius,
            &criteria.keywords,
        ))
    }

    fn google_maps(&self, criteria: &DiscoveryCriteria) -> Vec<RawLead> {
        let seed = self.search_seed(criteria);
        let count = criteria.max_results.min(20 + (seed % 31) as u32);

        (1..=count)
            .map(|i| {
                let h = hash_of(&(seed, i));
                let business_type = BUSINESS_TYPES[(h % BUSINESS_TYPES.len() as u64) as usize];
                RawLead {
                    name: Some(format!("Contact Person {}", i)),
                    business_name: Some(format!("{} {}", business_type, i)),
                    phone: Some(phone(h)),
                    email: Some(format!("contact{}@business{}.com", i, i)),
                    website: Some(format!("https://business{}.com", i)),
                    address: Some(format!(
                        "{} Main St, {}",
                        pick(h >> 32, 100, 9999),
                        criteria.location
                    )),
                    industry: Some(criteria.industry.clone()),
                    job_title: criteria.job_title.clone(),
                    source_platform: Some(Platform::GoogleMaps),
                    source_url: Some(format!("https://maps.google.com/business{}", i)),
                    ..Default::default()
                }
            })
            .collect()
    }

    fn google_business(&self, criteria: &DiscoveryCriteria) -> Vec<RawLead> {
        let seed = self.search_seed(criteria);
        let count = criteria.max_results.min(5 + (seed % 11) as u32);

        (1..=count)
            .map(|i| {
                let h = hash_of(&(seed, i));
                RawLead {
                    name: Some(format!("Business Owner {}", i)),
                    business_name: Some(format!("{} Business {}", criteria.industry, i)),
                    phone: Some(phone(h)),
                    website: Some(format!("https://business{}.com", i)),
                    address: Some(format!(
                        "{} Business Ave, {}",
                        pick(h >> 32, 100, 9999),
                        criteria.location
                    )),
                    industry: Some(criteria.industry.clone()),
                    source_platform: Some(Platform::GoogleBusiness),
                    source_url: Some(format!("https://business.google.com/listing{}", i)),
                    ..Default::default()
                }
            })
            .collect()
    }

    fn linkedin_people(&self, criteria: &DiscoveryCriteria) -> Vec<RawLead> {
        let seed = self.search_seed(criteria);
        let count = criteria.max_results.min(10 + (seed % 16) as u32);

        (1..=count)
            .map(|i| {
                let h = hash_of(&(seed, i));
                let mut raw = RawLead::from_platform(Platform::Linkedin);
                raw.name = Some(format!("Professional {}", i));
                raw.business_name = Some(format!("{} Company {}", criteria.industry, i));
                raw.job_title = criteria
                    .job_title
                    .clone()
                    .or_else(|| Some(TITLES[(h % TITLES.len() as u64) as usize].to_string()));
                raw.industry = Some(criteria.industry.clone());
                raw.source_url = Some(format!("https://linkedin.com/in/professional{}", i));
                raw
            })
            .collect()
    }

    fn enrichment_payload(&self, lead: &Lead, fields: &[EnrichmentField], depth: u8) -> Value {
        let has = |field: EnrichmentField| fields.contains(&field);
        let h = hash_of(&(self.platform.as_str(), &lead.business_name, &lead.name));
        let business = lead.business_name.as_deref();
        let mut payload = Map::new();

        match self.platform {
            Platform::Linkedin => {
                merge(
                    &mut payload,
                    json!({
                        "profile_url": format!("https://linkedin.com/in/{}", slug(lead.name.as_deref(), "unknown", "")),
                        "company_page": format!("https://linkedin.com/company/{}", slug(business, "unknown", "-")),
                    }),
                );
                if has(EnrichmentField::BasicInfo) {
                    merge(
                        &mut payload,
                        json!({
                            "headline": format!(
                                "{} at {}",
                                lead.job_title.as_deref().unwrap_or("Professional"),
                                business.unwrap_or("Company")
                            ),
                            "industry": lead.industry.as_deref().unwrap_or("Unknown"),
                            "location": lead.address.as_deref().unwrap_or("Unknown"),
                        }),
                    );
                }
                if has(EnrichmentField::SocialProfiles) && depth >= 2 {
                    merge(
                        &mut payload,
                        json!({
                            "connections": pick(h, 100, 500),
                            "company_size": COMPANY_SIZES[(h % COMPANY_SIZES.len() as u64) as usize],
                            "company_employees": pick(h >> 8, 10, 1000),
                        }),
                    );
                }
                if has(EnrichmentField::ContentAnalysis) && depth >= 3 {
                    merge(
                        &mut payload,
                        json!({
                            "recent_posts": pick(h >> 16, 1, 10),
                            "engagement_rate": pick(h >> 24, 2, 15) as f64 / 100.0,
                        }),
                    );
                }
            }
            Platform::Facebook => {
                merge(
                    &mut payload,
                    json!({ "page_url": format!("https://facebook.com/{}", slug(business, "unknown", "")) }),
                );
                if has(EnrichmentField::BasicInfo) {
                    merge(
                        &mut payload,
                        json!({
                            "page_likes": pick(h, 50, 5000),
                            "page_followers": pick(h >> 8, 60, 5500),
                            "page_category": lead.industry.as_deref().unwrap_or("Business"),
                        }),
                    );
                }
                if has(EnrichmentField::ContentAnalysis) && depth >= 2 {
                    merge(
                        &mut payload,
                        json!({
                            "recent_posts": pick(h >> 16, 1, 20),
                            "avg_engagement": pick(h >> 24, 5, 100),
                            "post_frequency": "Weekly",
                        }),
                    );
                }
            }
            Platform::Instagram => {
                merge(
                    &mut payload,
                    json!({ "profile_url": format!("https://instagram.com/{}", slug(business, "unknown", "")) }),
                );
                if has(EnrichmentField::BasicInfo) {
                    merge(
                        &mut payload,
                        json!({
                            "followers": pick(h, 100, 10000),
                            "following": pick(h >> 8, 50, 1000),
                            "posts": pick(h >> 16, 10, 500),
                        }),
                    );
                }
                if has(EnrichmentField::ContentAnalysis) && depth >= 2 {
                    merge(
                        &mut payload,
                        json!({
                            "avg_likes": pick(h >> 24, 10, 200),
                            "avg_comments": pick(h >> 32, 1, 50),
                        }),
                    );
                }
            }
            Platform::GoogleSearch => {
                merge(
                    &mut payload,
                    json!({ "search_results": format!("Found {} results", pick(h, 5, 50)) }),
                );
                if has(EnrichmentField::BasicInfo) {
                    merge(
                        &mut payload,
                        json!({
                            "business_hours": "Mon-Fri 9AM-6PM",
                            "google_rating": pick(h >> 8, 35, 50) as f64 / 10.0,
                            "review_count": pick(h >> 16, 10, 200),
                            "website_status": "Active",
                        }),
                    );
                }
                if has(EnrichmentField::ContactInfo) && depth >= 2 {
                    merge(
                        &mut payload,
                        json!({
                            "additional_phones": [phone(h >> 24)],
                            "contact_form": "Available",
                            "support_email": format!("support@{}.com", slug(business, "business", "")),
                        }),
                    );
                }
                if has(EnrichmentField::ContentAnalysis) && depth >= 3 {
                    merge(
                        &mut payload,
                        json!({
                            "seo_score": pick(h >> 32, 60, 95),
                            "online_mentions": pick(h >> 40, 5, 50),
                        }),
                    );
                }
            }
            Platform::GoogleBusiness => {
                merge(
                    &mut payload,
                    json!({
                        "listing_verified": h % 3 != 0,
                        "business_hours": "Mon-Sat 8AM-5PM",
                    }),
                );
                if has(EnrichmentField::ContactInfo) && depth >= 2 {
                    merge(&mut payload, json!({ "listing_phone": phone(h >> 8) }));
                }
            }
            Platform::GoogleMaps => {
                merge(
                    &mut payload,
                    json!({
                        "rating": pick(h, 30, 50) as f64 / 10.0,
                        "review_count": pick(h >> 8, 0, 400),
                    }),
                );
            }
        }

        Value::Object(payload)
    }
}

#[async_trait]
impl LeadProvider for SimulatedProvider {
    fn platform(&self) -> Platform {
        self.platform
    }

    async fn discover(&self, criteria: &DiscoveryCriteria) -> Result<Vec<RawLead>, ProviderError> {
        self.pause().await;
        match self.platform {
            Platform::GoogleMaps => Ok(self.google_maps(criteria)),
            Platform::GoogleBusiness => Ok(self.google_business(criteria)),
            Platform::Linkedin => Ok(self.linkedin_people(criteria)),
            platform => Err(ProviderError::Unsupported {
                platform,
                operation: "discovery",
            }),
        }
    }

    async fn enrich(
        &self,
        lead: &Lead,
        fields: &[EnrichmentField],
        depth: u8,
    ) -> Result<Value, ProviderError> {
        self.pause().await;
        Ok(self.enrichment_payload(lead, fields, depth))
    }
}
