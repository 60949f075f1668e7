//! Lookup services the listing depends on.
//!
//! Every trait returns `Ok(None)` for "not found" and reserves `Err` for
//! failures of the service itself, which the listing propagates unchanged.

use std::sync::Arc;

use super::model::{
    ActiveTestFilter, ActiveTestRecord, DurationEstimate, EstimateRequest, ExperienceCombination,
    Item, TestConfiguration, TestDefinition,
};
use crate::error::CollaboratorError;
use crate::types::{ItemId, ItemUri};

pub type LookupResult<T> = std::result::Result<T, CollaboratorError>;

/// Search index over running tests.
pub trait ActiveTestIndex: Send + Sync {
    fn active_tests(
        &self,
        host: Option<&ItemUri>,
        search_text: Option<&str>,
        filter: Option<&ActiveTestFilter>,
    ) -> LookupResult<Vec<ActiveTestRecord>>;
}

pub trait ContentRepository: Send + Sync {
    fn item(&self, uri: &ItemUri) -> LookupResult<Option<Item>>;

    /// The test-definition facet of `item`, if the item is a test definition.
    fn test_definition(&self, item: &Item) -> LookupResult<Option<TestDefinition>>;

    /// Display name for an owner principal such as `sitecore\jdoe`.
    fn friendly_owner_name(&self, owner: &str) -> String;
}

pub trait TestConfigurationStore: Send + Sync {
    fn load_test_for_item(
        &self,
        host_item: &Item,
        definition: &TestDefinition,
    ) -> LookupResult<Option<TestConfiguration>>;
}

pub trait DurationEstimator: Send + Sync {
    fn estimate(&self, request: &EstimateRequest<'_>) -> LookupResult<DurationEstimate>;
}

/// Performance comparison of every experience of one test.
pub trait PerformanceSnapshot {
    /// `None` until enough data exists to pick a winner.
    fn best_experience(&self) -> Option<ExperienceCombination>;

    /// Effect of `combination` relative to the baseline experience.
    fn experience_effect(&self, combination: &ExperienceCombination) -> f64;
}

pub trait PerformanceProvider: Send + Sync {
    fn performance_for_test(
        &self,
        configuration: &TestConfiguration,
    ) -> LookupResult<Box<dyn PerformanceSnapshot>>;
}

/// Advisory side channel told about every registered configuration.
pub trait RegistrationObserver: Send + Sync {
    fn registered(&self, test_id: ItemId, description: &str);
}

impl<F> RegistrationObserver for F
where
    F: Fn(ItemId, &str) + Send + Sync,
{
    fn registered(&self, test_id: ItemId, description: &str) {
        self(test_id, description)
    }
}

/// The full set of services a [`super::listing::TestListing`] runs against.
#[derive(Clone)]
pub struct Collaborators {
    pub index: Arc<dyn ActiveTestIndex>,
    pub content: Arc<dyn ContentRepository>,
    pub configurations: Arc<dyn TestConfigurationStore>,
    pub estimator: Arc<dyn DurationEstimator>,
    pub performance: Arc<dyn PerformanceProvider>,
}

impl Collaborators {
    /// Wire a single backend that implements every lookup, plus an estimator.
    pub fn from_backend<B>(backend: Arc<B>, estimator: Arc<dyn DurationEstimator>) -> Self
    where
        B: ActiveTestIndex + ContentRepository + TestConfigurationStore + PerformanceProvider + 'static,
    {
        Self {
            index: backend.clone(),
            content: backend.clone(),
            configurations: backend.clone(),
            estimator,
            performance: backend,
        }
    }
}
