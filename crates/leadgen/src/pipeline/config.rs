use std::time::Duration;

use crate::config::{Config, ZeroResultsPolicy};
use crate::model::{Intensity, Platform};
use crate::provider::EnrichmentField;

/// Enrichment depth, field groups and batch size for one intensity level.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IntensityProfile {
    pub depth: u8,
    pub fields: Vec<EnrichmentField>,
    pub concurrency: usize,
}

impl IntensityProfile {
    pub fn for_intensity(intensity: Intensity) -> Self {
        use EnrichmentField::*;
        match intensity {
            Intensity::Basic => Self {
                depth: 1,
                fields: vec![BasicInfo],
                concurrency: 5,
            },
            Intensity::Standard => Self {
                depth: 2,
                fields: vec![BasicInfo, ContactInfo, SocialProfiles],
                concurrency: 3,
            },
            Intensity::Premium => Self {
                depth: 3,
                fields: vec![
                    BasicInfo,
                    ContactInfo,
                    SocialProfiles,
                    ContentAnalysis,
                    NetworkData,
                ],
                concurrency: 2,
            },
        }
    }

    /// Field groups joined with `+`, as recorded on enrichment records.
    pub fn data_type(&self) -> String {
        self.fields
            .iter()
            .map(|f| f.as_str())
            .collect::<Vec<_>>()
            .join("+")
    }
}

#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub primary_platform: Platform,
    /// Queried only when the primary platform under-fills `max_results`.
    pub secondary_platform: Option<Platform>,
    pub zero_results_policy: ZeroResultsPolicy,
    pub batch_pause: Duration,
}

impl PipelineConfig {
    pub fn from_config(config: &Config) -> Self {
        let settings = &config.pipeline;
        Self {
            primary_platform: Platform::PRIMARY,
            secondary_platform: settings
                .query_secondary
                .then_some(settings.secondary_platform)
                .filter(|p| *p != Platform::PRIMARY),
            zero_results_policy: settings.zero_results_policy,
            batch_pause: Duration::from_millis(settings.batch_pause_ms),
        }
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_profiles() {
        let basic = IntensityProfile::for_intensity(Intensity::Basic);
        assert_eq!((basic.depth, basic.concurrency), (1, 5));
        assert_eq!(basic.data_type(), "basic_info");

        let standard = IntensityProfile::for_intensity(Intensity::Standard);
        assert_eq!((standard.depth, standard.concurrency), (2, 3));
        assert_eq!(
            standard.data_type(),
            "basic_info+contact_info+social_profiles"
        );

        let premium = IntensityProfile::for_intensity(Intensity::Premium);
        assert_eq!((premium.depth, premium.concurrency), (3, 2));
        assert_eq!(premium.fields.len(), 5);
    }

    #[test]
    fn test_from_config() {
        let config = PipelineConfig::default();
        assert_eq!(config.primary_platform, Platform::GoogleMaps);
        assert_eq!(config.secondary_platform, Some(Platform::GoogleBusiness));
        assert_eq!(config.batch_pause, Duration::from_secs(1));

        let mut raw = Config::default();
        raw.pipeline.query_secondary = false;
        assert_eq!(PipelineConfig::from_config(&raw).secondary_platform, None);

        raw.pipeline.query_secondary = true;
        raw.pipeline.secondary_platform = Platform::GoogleMaps;
        assert_eq!(PipelineConfig::from_config(&raw).secondary_platform, None);
    }
}
