use chrono::{FixedOffset, Offset, Utc};
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::types::DEFAULT_DATABASE;

pub const SETTINGS_FILE: &str = "listing.json";

const DEFAULT_PAGE_SIZE: usize = 20;
const DEFAULT_MAX_PAGE_SIZE: usize = 500;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ListingSettings {
    pub default_page_size: usize,
    pub max_page_size: usize,
    /// Offset of server time from UTC; start dates are shown in server time.
    pub server_utc_offset_minutes: i32,
    /// Database bare item ids in requests are looked up in.
    pub content_database: String,
    pub estimator: EstimatorSettings,
}

/// Inputs of the reference power-analysis estimator that are not part of a
/// test definition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct EstimatorSettings {
    pub baseline_conversion_rate: f64,
    pub minimum_detectable_effect: f64,
}

impl Default for ListingSettings {
    fn default() -> Self {
        Self {
            default_page_size: DEFAULT_PAGE_SIZE,
            max_page_size: DEFAULT_MAX_PAGE_SIZE,
            server_utc_offset_minutes: 0,
            content_database: DEFAULT_DATABASE.to_string(),
            estimator: EstimatorSettings::default(),
        }
    }
}

impl Default for EstimatorSettings {
    fn default() -> Self {
        Self {
            baseline_conversion_rate: 0.05,
            minimum_detectable_effect: 0.2,
        }
    }
}

impl ListingSettings {
    /// Load settings from `{data_dir}/listing.json`, falling back to defaults
    /// when the file is missing or unreadable, then apply environment
    /// overrides.
    pub fn load_or_default(data_dir: &Path) -> Self {
        let path = data_dir.join(SETTINGS_FILE);
        let mut settings = if path.exists() {
            match std::fs::read_to_string(&path) {
                Ok(content) => match serde_json::from_str::<ListingSettings>(&content) {
                    Ok(settings) => {
                        tracing::info!(path = %path.display(), "Loaded listing settings");
                        settings
                    }
                    Err(e) => {
                        tracing::error!("Failed to parse {}: {}, using defaults", SETTINGS_FILE, e);
                        ListingSettings::default()
                    }
                },
                Err(e) => {
                    tracing::error!("Failed to read {}: {}, using defaults", SETTINGS_FILE, e);
                    ListingSettings::default()
                }
            }
        } else {
            ListingSettings::default()
        };

        settings.apply_overrides(|key| std::env::var(key).ok());
        settings.sanitize();
        settings
    }

    /// Apply `CONTENT_TESTING_*` overrides. Unparseable values are ignored.
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(v) = lookup("CONTENT_TESTING_DEFAULT_PAGE_SIZE").and_then(|v| v.parse().ok()) {
            self.default_page_size = v;
        }
        if let Some(v) = lookup("CONTENT_TESTING_MAX_PAGE_SIZE").and_then(|v| v.parse().ok()) {
            self.max_page_size = v;
        }
        if let Some(v) = lookup("CONTENT_TESTING_UTC_OFFSET_MINUTES").and_then(|v| v.parse().ok())
        {
            self.server_utc_offset_minutes = v;
        }
        if let Some(v) = lookup("CONTENT_TESTING_DATABASE").filter(|v| !v.trim().is_empty()) {
            self.content_database = v;
        }
    }

    fn sanitize(&mut self) {
        if self.default_page_size == 0 {
            tracing::warn!(
                "defaultPageSize must be positive, using {}",
                DEFAULT_PAGE_SIZE
            );
            self.default_page_size = DEFAULT_PAGE_SIZE;
        }
        if self.max_page_size < self.default_page_size {
            tracing::warn!(
                max_page_size = self.max_page_size,
                default_page_size = self.default_page_size,
                "maxPageSize below defaultPageSize, raising it"
            );
            self.max_page_size = self.default_page_size;
        }
        if self.server_offset_checked().is_none() {
            tracing::warn!(
                offset_minutes = self.server_utc_offset_minutes,
                "server UTC offset out of range, using UTC"
            );
            self.server_utc_offset_minutes = 0;
        }
    }

    fn server_offset_checked(&self) -> Option<FixedOffset> {
        self.server_utc_offset_minutes
            .checked_mul(60)
            .and_then(FixedOffset::east_opt)
    }

    pub fn server_offset(&self) -> FixedOffset {
        self.server_offset_checked().unwrap_or_else(|| Utc.fix())
    }
}
