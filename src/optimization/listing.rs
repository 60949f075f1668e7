use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::num::NonZeroUsize;
use std::sync::Arc;
use tracing::{debug, info};

use super::collaborators::{Collaborators, RegistrationObserver};
use super::duration;
use super::effect::{self, EffectClass};
use super::model::TestType;
use super::resolver::{ConfigurationRegistry, TestResolver};
use crate::error::Result;
use crate::settings::ListingSettings;
use crate::types::{ItemId, ItemUri};

pub const DEFAULT_PAGE: usize = 1;

/// One row of the active-tests listing.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TestSummary {
    pub host_page_id: ItemId,
    pub host_page_uri: ItemUri,
    pub host_page_name: String,
    pub device_id: ItemId,
    pub device_name: String,
    pub language: String,
    pub created_by: String,
    /// Start date in server time, `dd-MMM-yyyy`.
    pub date: String,
    pub experience_count: u32,
    /// Estimated days remaining; negative once the minimum duration has passed.
    pub days: i64,
    pub item_id: ItemId,
    pub content_only: bool,
    pub test_type: TestType,
    pub test_id: ItemId,
    pub effect: Option<f64>,
    #[serde(rename = "effectCss")]
    pub effect_class: Option<EffectClass>,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TestListPage {
    pub items: Vec<TestSummary>,
    /// Number of running tests the search index reported, including ones
    /// that could not be resolved.
    pub total_results: usize,
}

#[derive(Debug, Clone, Default)]
pub struct ActiveTestsQuery {
    pub page: Option<NonZeroUsize>,
    pub page_size: Option<NonZeroUsize>,
    pub host_item_id: Option<String>,
    pub search_text: Option<String>,
}

pub type Clock = Arc<dyn Fn() -> DateTime<Utc> + Send + Sync>;

pub struct TestListing {
    collaborators: Collaborators,
    settings: ListingSettings,
    observer: Option<Arc<dyn RegistrationObserver>>,
    clock: Clock,
}

impl TestListing {
    pub fn new(collaborators: Collaborators, settings: ListingSettings) -> Self {
        Self {
            collaborators,
            settings,
            observer: None,
            clock: Arc::new(Utc::now),
        }
    }

    pub fn with_observer(mut self, observer: Arc<dyn RegistrationObserver>) -> Self {
        self.observer = Some(observer);
        self
    }

    pub fn with_clock(mut self, clock: impl Fn() -> DateTime<Utc> + Send + Sync + 'static) -> Self {
        self.clock = Arc::new(clock);
        self
    }

    pub fn settings(&self) -> &ListingSettings {
        &self.settings
    }

    /// One page of running tests, sorted by estimated remaining days.
    ///
    /// Records that fail to resolve are dropped from the page but still
    /// counted in `total_results`. Effects are only computed for the tests on
    /// the returned page.
    pub fn active_tests(&self, query: &ActiveTestsQuery) -> Result<TestListPage> {
        let now = (self.clock)();
        let page = query.page.map_or(DEFAULT_PAGE, NonZeroUsize::get);
        let page_size = query
            .page_size
            .map_or(self.settings.default_page_size, NonZeroUsize::get);
        let host = self.parse_host_filter(query.host_item_id.as_deref())?;

        let records = self.collaborators.index.active_tests(
            host.as_ref(),
            query.search_text.as_deref(),
            None,
        )?;
        let total_results = records.len();

        let resolver = TestResolver::new(
            self.collaborators.content.as_ref(),
            self.collaborators.configurations.as_ref(),
        )
        .with_observer(self.observer.as_deref());
        let mut registry = ConfigurationRegistry::default();
        let server_offset = self.settings.server_offset();

        let mut candidates = Vec::with_capacity(records.len());
        for record in &records {
            let Some(resolved) = resolver.resolve(record, &mut registry)? else {
                continue;
            };
            let days = duration::remaining_days(
                self.collaborators.estimator.as_ref(),
                &resolved.host_item,
                resolved.configuration.experience_count(),
                &resolved.definition,
                now,
            )?;
            candidates.push(resolved.into_candidate(days, server_offset));
        }
        let resolved_count = candidates.len();

        candidates.sort_by_key(|summary| summary.days);
        let mut items: Vec<TestSummary> = candidates
            .into_iter()
            .skip((page - 1).saturating_mul(page_size))
            .take(page_size)
            .collect();

        for summary in &mut items {
            if self
                .collaborators
                .content
                .item(&summary.host_page_uri)?
                .is_none()
            {
                debug!(test_id = %summary.test_id, host = %summary.host_page_uri, "host item gone, leaving effect unset");
                continue;
            }
            let Some(configuration) = registry.get(&summary.test_id) else {
                continue;
            };
            let effect = effect::winning_effect(
                self.collaborators.performance.as_ref(),
                configuration,
            )?;
            summary.effect = Some(effect);
            summary.effect_class = Some(EffectClass::classify(effect));
        }

        info!(
            total_results,
            resolved = resolved_count,
            page,
            page_size,
            returned = items.len(),
            "listed active tests"
        );
        Ok(TestListPage {
            items,
            total_results,
        })
    }

    fn parse_host_filter(&self, host_item_id: Option<&str>) -> Result<Option<ItemUri>> {
        match host_item_id.map(str::trim) {
            None | Some("") => Ok(None),
            Some(raw) => {
                ItemUri::parse_with_default(raw, &self.settings.content_database).map(Some)
            }
        }
    }
}
