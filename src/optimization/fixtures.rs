//! In-memory collaborators for unit tests.

use chrono::{DateTime, Duration, TimeZone, Utc};
use std::collections::HashMap;
use std::sync::Mutex;

use super::collaborators::{
    ActiveTestIndex, ContentRepository, DurationEstimator, LookupResult, PerformanceProvider,
    PerformanceSnapshot, TestConfigurationStore,
};
use super::model::{
    ActiveTestFilter, ActiveTestRecord, DeviceRef, DurationEstimate, EstimateRequest,
    ExperienceCombination, Item, TestConfiguration, TestDefinition, TestSet, TestType,
    TestVariable,
};
use crate::error::CollaboratorError;
use crate::types::{ItemId, ItemUri};

pub(crate) fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 3, 17, 12, 0, 0).unwrap()
}

pub(crate) struct TestFixture {
    pub start_days_ago: i64,
    pub min_duration: &'static str,
    pub max_duration: &'static str,
    pub estimated_days: Option<f64>,
    pub effect: Option<f64>,
    pub variables: usize,
    pub page_level_variables: usize,
    pub host: Option<ItemId>,
}

impl Default for TestFixture {
    fn default() -> Self {
        Self {
            start_days_ago: 10,
            min_duration: "5",
            max_duration: "30",
            estimated_days: Some(12.0),
            effect: None,
            variables: 1,
            page_level_variables: 1,
            host: None,
        }
    }
}

#[derive(Default)]
pub(crate) struct FakeBackend {
    pub records: Vec<ActiveTestRecord>,
    pub items: HashMap<ItemId, Item>,
    pub definitions: HashMap<ItemId, TestDefinition>,
    pub configurations: HashMap<(ItemId, ItemId), TestConfiguration>,
    pub estimates: HashMap<ItemId, Option<f64>>,
    pub effects: HashMap<ItemId, f64>,
    /// Hosts that disappear after the given number of successful lookups.
    pub vanishing_hosts: Mutex<HashMap<ItemId, usize>>,
    pub fail_item_lookups: bool,
    pub fail_enumeration: bool,
}

fn item(id: ItemId, name: &str, path: &str) -> Item {
    Item {
        uri: ItemUri::new("master", id).with_language("en").with_version(1),
        name: name.to_string(),
        display_name: name.to_string(),
        path: path.to_string(),
        owner: Some("sitecore\\jane".to_string()),
    }
}

impl FakeBackend {
    pub fn add_test(&mut self, fixture: TestFixture) -> (ItemId, ItemId) {
        let test_id = ItemId::new_v4();
        let host_id = fixture.host.unwrap_or_else(ItemId::new_v4);

        let test_item = item(test_id, "Test", &format!("/sitecore/content/tests/{test_id}"));
        let host_item = item(host_id, "Home", "/sitecore/content/Home");

        let variables: Vec<TestVariable> = (0..fixture.variables)
            .map(|i| TestVariable {
                id: ItemId::new_v4(),
                name: format!("variable {i}"),
                value_count: 2,
            })
            .collect();
        let page_level_variables = variables
            .iter()
            .take(fixture.page_level_variables)
            .map(|variable| variable.id)
            .collect();

        let device = DeviceRef {
            id: ItemId::new_v4(),
            name: "Default".to_string(),
        };
        let definition = TestDefinition {
            id: test_id,
            path: test_item.path.clone(),
            language: "en".to_string(),
            device: Some(device.clone()),
            start_date: now() - Duration::days(fixture.start_days_ago),
            min_duration: fixture.min_duration.to_string(),
            max_duration: fixture.max_duration.to_string(),
            traffic_allocation_percentage: 100.0,
            confidence_level_percentage: 95.0,
            page_level_variables,
        };
        let configuration = TestConfiguration {
            definition: definition.clone(),
            content_item: host_item.clone(),
            test_set: TestSet {
                id: ItemId::new_v4(),
                name: "set".to_string(),
                variables,
            },
            language: "en".to_string(),
            device_id: device.id,
            device_name: device.name,
            test_type: TestType::Page,
        };

        self.records.push(ActiveTestRecord {
            uri: test_item.uri.clone(),
            host_item_uri: Some(host_item.uri.clone()),
        });
        self.items.insert(test_id, test_item);
        self.items.insert(host_id, host_item);
        self.definitions.insert(test_id, definition);
        self.configurations.insert((host_id, test_id), configuration);
        self.estimates.insert(test_id, fixture.estimated_days);
        if let Some(effect) = fixture.effect {
            self.effects.insert(test_id, effect);
        }
        (test_id, host_id)
    }
}

impl ActiveTestIndex for FakeBackend {
    fn active_tests(
        &self,
        host: Option<&ItemUri>,
        _search_text: Option<&str>,
        _filter: Option<&ActiveTestFilter>,
    ) -> LookupResult<Vec<ActiveTestRecord>> {
        if self.fail_enumeration {
            return Err(CollaboratorError::new("search index", "unavailable"));
        }
        Ok(self
            .records
            .iter()
            .filter(|record| match (host, &record.host_item_uri) {
                (Some(host), Some(record_host)) => host.same_item(record_host),
                (Some(_), None) => false,
                (None, _) => true,
            })
            .cloned()
            .collect())
    }
}

impl ContentRepository for FakeBackend {
    fn item(&self, uri: &ItemUri) -> LookupResult<Option<Item>> {
        if self.fail_item_lookups {
            return Err(CollaboratorError::new("content store", "connection reset"));
        }
        let mut vanishing = self.vanishing_hosts.lock().unwrap();
        if let Some(remaining) = vanishing.get_mut(&uri.id) {
            if *remaining == 0 {
                return Ok(None);
            }
            *remaining -= 1;
        }
        Ok(self.items.get(&uri.id).cloned())
    }

    fn test_definition(&self, item: &Item) -> LookupResult<Option<TestDefinition>> {
        Ok(self.definitions.get(&item.id()).cloned())
    }

    fn friendly_owner_name(&self, owner: &str) -> String {
        if owner == "sitecore\\jane" {
            "Jane Editor".to_string()
        } else {
            owner.to_string()
        }
    }
}

impl TestConfigurationStore for FakeBackend {
    fn load_test_for_item(
        &self,
        host_item: &Item,
        definition: &TestDefinition,
    ) -> LookupResult<Option<TestConfiguration>> {
        Ok(self
            .configurations
            .get(&(host_item.id(), definition.id))
            .cloned())
    }
}

impl DurationEstimator for FakeBackend {
    fn estimate(&self, request: &EstimateRequest<'_>) -> LookupResult<DurationEstimate> {
        Ok(DurationEstimate {
            estimated_day_count: self
                .estimates
                .get(&request.definition.id)
                .copied()
                .flatten(),
            required_visits: None,
        })
    }
}

pub(crate) struct FixedSnapshot {
    pub effect: Option<f64>,
}

impl PerformanceSnapshot for FixedSnapshot {
    fn best_experience(&self) -> Option<ExperienceCombination> {
        self.effect.map(|_| ExperienceCombination(vec![1]))
    }

    fn experience_effect(&self, combination: &ExperienceCombination) -> f64 {
        if combination.is_baseline() {
            0.0
        } else {
            self.effect.unwrap_or(0.0)
        }
    }
}

impl PerformanceProvider for FakeBackend {
    fn performance_for_test(
        &self,
        configuration: &TestConfiguration,
    ) -> LookupResult<Box<dyn PerformanceSnapshot>> {
        Ok(Box::new(FixedSnapshot {
            effect: self.effects.get(&configuration.test_id()).copied(),
        }))
    }
}
