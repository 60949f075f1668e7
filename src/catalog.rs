use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::optimization::collaborators::{
    ActiveTestIndex, ContentRepository, LookupResult, PerformanceProvider, PerformanceSnapshot,
    TestConfigurationStore,
};
use crate::optimization::model::{
    ActiveTestFilter, ActiveTestRecord, ExperienceCombination, Item, TestConfiguration,
    TestDefinition,
};
use crate::optimization::power::TrafficSource;
use crate::types::{ItemId, ItemUri};

pub const SNAPSHOT_DIR: &str = ".content-tests";

#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    #[error("invalid snapshot: {0}")]
    InvalidSnapshot(String),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

/// One snapshot file. Every section is optional; files are merged in name
/// order.
#[derive(Serialize, Deserialize, Clone, Debug, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct CatalogSnapshot {
    pub items: Vec<Item>,
    pub definitions: Vec<TestDefinition>,
    pub configurations: Vec<HostedConfiguration>,
    pub active_tests: Vec<ActiveTestRecord>,
    pub profiles: Vec<UserProfile>,
    pub performance: Vec<TestPerformance>,
    pub traffic: Vec<PageTraffic>,
}

#[derive(Serialize, Deserialize, Clone, Debug)]
#[serde(rename_all = "camelCase")]
pub struct HostedConfiguration {
    pub host_item_id: ItemId,
    pub configuration: TestConfiguration,
}

#[derive(Serialize, Deserialize, Clone, Debug)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    pub principal: String,
    pub full_name: String,
}

#[derive(Serialize, Deserialize, Clone, Debug)]
#[serde(rename_all = "camelCase")]
pub struct PageTraffic {
    pub host_item_id: ItemId,
    pub daily_visits: f64,
}

#[derive(Serialize, Deserialize, Clone, Debug)]
#[serde(rename_all = "camelCase")]
pub struct ExperiencePerformance {
    pub combination: ExperienceCombination,
    pub visits: u64,
    /// Conversion value the experiences are compared on.
    pub value: f64,
}

#[derive(Serialize, Deserialize, Clone, Debug)]
#[serde(rename_all = "camelCase")]
pub struct TestPerformance {
    pub test_id: ItemId,
    /// Visits every experience needs before a best experience is picked.
    #[serde(default)]
    pub min_visits: u64,
    pub experiences: Vec<ExperiencePerformance>,
}

impl TestPerformance {
    fn validate(&self) -> Result<(), CatalogError> {
        if let Some(first) = self.experiences.first() {
            let width = first.combination.0.len();
            if self
                .experiences
                .iter()
                .any(|e| e.combination.0.len() != width)
            {
                return Err(CatalogError::InvalidSnapshot(format!(
                    "performance for test {} mixes combination lengths",
                    self.test_id
                )));
            }
        }
        if self.experiences.iter().any(|e| !e.value.is_finite()) {
            return Err(CatalogError::InvalidSnapshot(format!(
                "performance for test {} has a non-finite value",
                self.test_id
            )));
        }
        Ok(())
    }

    fn baseline_value(&self) -> Option<f64> {
        self.experiences
            .iter()
            .find(|e| e.combination.is_baseline())
            .map(|e| e.value)
    }
}

impl PerformanceSnapshot for TestPerformance {
    fn best_experience(&self) -> Option<ExperienceCombination> {
        if self.experiences.len() < 2 || self.experiences.iter().any(|e| e.visits < self.min_visits)
        {
            return None;
        }
        let mut best = self.experiences.first()?;
        for experience in &self.experiences[1..] {
            if experience.value > best.value {
                best = experience;
            }
        }
        Some(best.combination.clone())
    }

    fn experience_effect(&self, combination: &ExperienceCombination) -> f64 {
        let Some(baseline) = self.baseline_value().filter(|b| *b != 0.0) else {
            return 0.0;
        };
        self.experiences
            .iter()
            .find(|e| &e.combination == combination)
            .map_or(0.0, |e| (e.value - baseline) / baseline)
    }
}

/// Read-only content-testing catalog backed by JSON snapshot files in
/// `{data_dir}/.content-tests/`. Implements every lookup the listing needs.
pub struct SnapshotCatalog {
    items: DashMap<ItemId, Item>,
    definitions: DashMap<ItemId, TestDefinition>,
    configurations: DashMap<(ItemId, ItemId), TestConfiguration>,
    active_tests: Vec<ActiveTestRecord>,
    profiles: DashMap<String, String>,
    performance: DashMap<ItemId, TestPerformance>,
    traffic: DashMap<ItemId, f64>,
}

impl SnapshotCatalog {
    pub fn empty() -> Self {
        Self {
            items: DashMap::new(),
            definitions: DashMap::new(),
            configurations: DashMap::new(),
            active_tests: Vec::new(),
            profiles: DashMap::new(),
            performance: DashMap::new(),
            traffic: DashMap::new(),
        }
    }

    pub fn new(data_dir: &Path) -> Result<Self, CatalogError> {
        let dir = data_dir.join(SNAPSHOT_DIR);
        std::fs::create_dir_all(&dir)?;
        let mut catalog = Self::empty();
        catalog.load_all(&dir)?;
        Ok(catalog)
    }

    pub fn from_snapshot(snapshot: CatalogSnapshot) -> Result<Self, CatalogError> {
        let mut catalog = Self::empty();
        catalog.merge(snapshot)?;
        Ok(catalog)
    }

    fn load_all(&mut self, dir: &Path) -> Result<(), CatalogError> {
        let mut paths: Vec<PathBuf> = std::fs::read_dir(dir)?
            .map(|entry| entry.map(|e| e.path()))
            .collect::<Result<_, _>>()?;
        paths.sort();

        for path in paths {
            if path.extension().and_then(|e| e.to_str()) == Some("json") {
                let data = std::fs::read_to_string(&path)?;
                let snapshot: CatalogSnapshot = serde_json::from_str(&data)?;
                self.merge(snapshot)?;
                tracing::debug!(path = %path.display(), "loaded content-test snapshot");
            }
        }
        tracing::info!(
            items = self.items.len(),
            active_tests = self.active_tests.len(),
            configurations = self.configurations.len(),
            "content-test catalog loaded"
        );
        Ok(())
    }

    /// Adds a snapshot on top of what is already loaded. Later entries
    /// replace earlier ones with the same key; active-test records append.
    pub fn merge(&mut self, snapshot: CatalogSnapshot) -> Result<(), CatalogError> {
        for performance in &snapshot.performance {
            performance.validate()?;
        }
        if let Some(bad) = snapshot
            .traffic
            .iter()
            .find(|t| !t.daily_visits.is_finite() || t.daily_visits < 0.0)
        {
            return Err(CatalogError::InvalidSnapshot(format!(
                "daily visits for host {} must be a non-negative number",
                bad.host_item_id
            )));
        }

        for item in snapshot.items {
            self.items.insert(item.id(), item);
        }
        for definition in snapshot.definitions {
            self.definitions.insert(definition.id, definition);
        }
        for hosted in snapshot.configurations {
            self.configurations.insert(
                (hosted.host_item_id, hosted.configuration.test_id()),
                hosted.configuration,
            );
        }
        self.active_tests.extend(snapshot.active_tests);
        for profile in snapshot.profiles {
            self.profiles
                .insert(profile.principal.to_lowercase(), profile.full_name);
        }
        for performance in snapshot.performance {
            self.performance.insert(performance.test_id, performance);
        }
        for traffic in snapshot.traffic {
            self.traffic.insert(traffic.host_item_id, traffic.daily_visits);
        }
        Ok(())
    }

    fn lookup_item(&self, uri: &ItemUri) -> Option<Item> {
        self.items
            .get(&uri.id)
            .filter(|item| item.uri.same_item(uri))
            .map(|item| item.clone())
    }

    fn matches_search(&self, record: &ActiveTestRecord, needle: &str) -> bool {
        let test_item = self.lookup_item(&record.uri);
        let definition_path = self.definitions.get(&record.uri.id).map(|d| d.path.clone());
        let haystacks = [
            test_item.as_ref().map(|i| i.display_name.as_str()),
            test_item.as_ref().map(|i| i.path.as_str()),
            definition_path.as_deref(),
        ];
        haystacks
            .iter()
            .flatten()
            .any(|text| text.to_lowercase().contains(needle))
    }

    fn matches_filter(&self, record: &ActiveTestRecord, filter: &ActiveTestFilter) -> bool {
        if let Some(language) = &filter.language {
            let matches = self
                .definitions
                .get(&record.uri.id)
                .is_some_and(|d| d.language.eq_ignore_ascii_case(language));
            if !matches {
                return false;
            }
        }
        if let Some(test_type) = filter.test_type {
            let Some(host) = &record.host_item_uri else {
                return false;
            };
            let matches = self
                .configurations
                .get(&(host.id, record.uri.id))
                .is_some_and(|c| c.test_type == test_type);
            if !matches {
                return false;
            }
        }
        true
    }
}

impl ActiveTestIndex for SnapshotCatalog {
    fn active_tests(
        &self,
        host: Option<&ItemUri>,
        search_text: Option<&str>,
        filter: Option<&ActiveTestFilter>,
    ) -> LookupResult<Vec<ActiveTestRecord>> {
        let needle = search_text
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_lowercase);

        Ok(self
            .active_tests
            .iter()
            .filter(|record| {
                if let Some(host) = host {
                    if !record
                        .host_item_uri
                        .as_ref()
                        .is_some_and(|h| h.same_item(host))
                    {
                        return false;
                    }
                }
                if let Some(ref needle) = needle {
                    if !self.matches_search(record, needle) {
                        return false;
                    }
                }
                if let Some(filter) = filter {
                    if !self.matches_filter(record, filter) {
                        return false;
                    }
                }
                true
            })
            .cloned()
            .collect())
    }
}

impl ContentRepository for SnapshotCatalog {
    fn item(&self, uri: &ItemUri) -> LookupResult<Option<Item>> {
        Ok(self.lookup_item(uri))
    }

    fn test_definition(&self, item: &Item) -> LookupResult<Option<TestDefinition>> {
        Ok(self.definitions.get(&item.id()).map(|d| d.clone()))
    }

    fn friendly_owner_name(&self, owner: &str) -> String {
        if let Some(full_name) = self
            .profiles
            .get(&owner.to_lowercase())
            .filter(|name| !name.trim().is_empty())
        {
            return full_name.clone();
        }
        owner.rsplit('\\').next().unwrap_or(owner).to_string()
    }
}

impl TestConfigurationStore for SnapshotCatalog {
    fn load_test_for_item(
        &self,
        host_item: &Item,
        definition: &TestDefinition,
    ) -> LookupResult<Option<TestConfiguration>> {
        Ok(self
            .configurations
            .get(&(host_item.id(), definition.id))
            .map(|c| c.clone()))
    }
}

impl PerformanceProvider for SnapshotCatalog {
    fn performance_for_test(
        &self,
        configuration: &TestConfiguration,
    ) -> LookupResult<Box<dyn PerformanceSnapshot>> {
        let performance = self
            .performance
            .get(&configuration.test_id())
            .map(|p| p.clone())
            .unwrap_or_else(|| TestPerformance {
                test_id: configuration.test_id(),
                min_visits: 0,
                experiences: Vec::new(),
            });
        Ok(Box::new(performance))
    }
}

impl TrafficSource for SnapshotCatalog {
    fn daily_visits(
        &self,
        host_item: &Item,
        _language: &str,
        _device_name: &str,
    ) -> LookupResult<Option<f64>> {
        Ok(self.traffic.get(&host_item.id()).map(|v| *v))
    }
}
