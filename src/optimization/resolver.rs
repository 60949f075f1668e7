use chrono::{DateTime, FixedOffset, Utc};
use std::collections::hash_map::{Entry, HashMap};
use tracing::debug;

use super::collaborators::{ContentRepository, RegistrationObserver, TestConfigurationStore};
use super::listing::TestSummary;
use super::model::{ActiveTestRecord, Item, TestConfiguration, TestDefinition};
use crate::error::{ListingError, Result};
use crate::types::ItemId;

/// `dd-MMM-yyyy`, e.g. `07-Mar-2026`.
pub const START_DATE_FORMAT: &str = "%d-%b-%Y";

/// Request-scoped map of resolved configurations keyed by test id.
#[derive(Debug, Default)]
pub struct ConfigurationRegistry {
    configurations: HashMap<ItemId, TestConfiguration>,
}

impl ConfigurationRegistry {
    /// Registers `configuration`; a second registration under the same test
    /// id is an error and leaves the first one in place.
    pub fn register(&mut self, configuration: TestConfiguration) -> Result<&TestConfiguration> {
        match self.configurations.entry(configuration.test_id()) {
            Entry::Occupied(_) => Err(ListingError::DuplicateTestId {
                test_id: configuration.test_id(),
                description: configuration.describe(),
            }),
            Entry::Vacant(slot) => Ok(slot.insert(configuration)),
        }
    }

    pub fn get(&self, test_id: &ItemId) -> Option<&TestConfiguration> {
        self.configurations.get(test_id)
    }

    pub fn len(&self) -> usize {
        self.configurations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.configurations.is_empty()
    }
}

/// A record that made it through every lookup.
pub struct ResolvedTest<'r> {
    pub definition: TestDefinition,
    pub host_item: Item,
    pub created_by: String,
    pub configuration: &'r TestConfiguration,
}

impl ResolvedTest<'_> {
    /// Summary row for this test; effect fields stay empty until the page is
    /// annotated.
    pub fn into_candidate(self, days: i64, server_offset: FixedOffset) -> TestSummary {
        let configuration = self.configuration;
        TestSummary {
            host_page_id: self.host_item.id(),
            host_page_uri: self.host_item.uri,
            host_page_name: self.host_item.display_name,
            device_id: configuration.device_id,
            device_name: configuration.device_name.clone(),
            language: configuration.language.clone(),
            created_by: self.created_by,
            date: format_start_date(self.definition.start_date, server_offset),
            experience_count: configuration.experience_count(),
            days,
            item_id: self.definition.id,
            content_only: configuration.test_set.variables.len()
                == self.definition.page_level_variables.len(),
            test_type: configuration.test_type,
            test_id: configuration.test_id(),
            effect: None,
            effect_class: None,
        }
    }
}

pub fn format_start_date(start: DateTime<Utc>, server_offset: FixedOffset) -> String {
    start
        .with_timezone(&server_offset)
        .format(START_DATE_FORMAT)
        .to_string()
}

pub struct TestResolver<'a> {
    content: &'a dyn ContentRepository,
    configurations: &'a dyn TestConfigurationStore,
    observer: Option<&'a dyn RegistrationObserver>,
}

impl<'a> TestResolver<'a> {
    pub fn new(
        content: &'a dyn ContentRepository,
        configurations: &'a dyn TestConfigurationStore,
    ) -> Self {
        Self {
            content,
            configurations,
            observer: None,
        }
    }

    pub fn with_observer(mut self, observer: Option<&'a dyn RegistrationObserver>) -> Self {
        self.observer = observer;
        self
    }

    /// Resolves one active-test record and registers its configuration.
    ///
    /// Returns `Ok(None)` when any lookup along the way comes back empty.
    /// Lookup failures and duplicate test ids are errors.
    pub fn resolve<'r>(
        &self,
        record: &ActiveTestRecord,
        registry: &'r mut ConfigurationRegistry,
    ) -> Result<Option<ResolvedTest<'r>>> {
        let Some(definition_item) = self.content.item(&record.uri)? else {
            debug!(uri = %record.uri, "skipping active test: item not found");
            return Ok(None);
        };
        let Some(definition) = self.content.test_definition(&definition_item)? else {
            debug!(uri = %record.uri, "skipping active test: not a test definition");
            return Ok(None);
        };
        let Some(host_uri) = record.host_item_uri.as_ref() else {
            debug!(uri = %record.uri, "skipping active test: no host item");
            return Ok(None);
        };
        let Some(host_item) = self.content.item(host_uri)? else {
            debug!(uri = %record.uri, host = %host_uri, "skipping active test: host item not found");
            return Ok(None);
        };
        let Some(configuration) = self
            .configurations
            .load_test_for_item(&host_item, &definition)?
        else {
            debug!(uri = %record.uri, host = %host_uri, "skipping active test: no configuration");
            return Ok(None);
        };

        let test_id = configuration.test_id();
        let description = configuration.describe();
        let configuration = registry.register(configuration)?;
        debug!(test_id = %test_id, "registered {}", description);
        if let Some(observer) = self.observer {
            observer.registered(test_id, &description);
        }

        let created_by = definition_item
            .owner
            .as_deref()
            .map(|owner| self.content.friendly_owner_name(owner))
            .unwrap_or_default();

        Ok(Some(ResolvedTest {
            definition,
            host_item,
            created_by,
            configuration,
        }))
    }
}
