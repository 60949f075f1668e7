use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::types::{ItemId, ItemUri};

/// Handle for one currently running test, as returned by the search index.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ActiveTestRecord {
    pub uri: ItemUri,
    #[serde(default)]
    pub host_item_uri: Option<ItemUri>,
}

/// Narrows enumeration beyond host and search text.
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ActiveTestFilter {
    pub test_type: Option<TestType>,
    pub language: Option<String>,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Item {
    pub uri: ItemUri,
    pub name: String,
    pub display_name: String,
    pub path: String,
    #[serde(default)]
    pub owner: Option<String>,
}

impl Item {
    pub fn id(&self) -> ItemId {
        self.uri.id
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct DeviceRef {
    pub id: ItemId,
    pub name: String,
}

/// Definition facet of a test item: the parameters the test was started with.
///
/// Duration bounds are stored as entered by editors and are only parsed when a
/// duration estimate needs them.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TestDefinition {
    pub id: ItemId,
    pub path: String,
    pub language: String,
    #[serde(default)]
    pub device: Option<DeviceRef>,
    pub start_date: DateTime<Utc>,
    pub min_duration: String,
    pub max_duration: String,
    pub traffic_allocation_percentage: f64,
    pub confidence_level_percentage: f64,
    #[serde(default)]
    pub page_level_variables: Vec<ItemId>,
}

impl TestDefinition {
    pub fn device_name(&self) -> &str {
        self.device.as_ref().map_or("", |device| device.name.as_str())
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TestVariable {
    pub id: ItemId,
    pub name: String,
    pub value_count: u32,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TestSet {
    pub id: ItemId,
    pub name: String,
    #[serde(default)]
    pub variables: Vec<TestVariable>,
}

impl TestSet {
    /// Number of experiences: every combination of variable values.
    pub fn experience_count(&self) -> u32 {
        self.variables
            .iter()
            .fold(1u32, |count, variable| {
                count.saturating_mul(variable.value_count.max(1))
            })
    }
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum TestType {
    Page,
    Content,
    Component,
    Personalization,
}

impl fmt::Display for TestType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            TestType::Page => "page",
            TestType::Content => "content",
            TestType::Component => "component",
            TestType::Personalization => "personalization",
        };
        f.write_str(label)
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TestConfiguration {
    pub definition: TestDefinition,
    pub content_item: Item,
    pub test_set: TestSet,
    pub language: String,
    pub device_id: ItemId,
    pub device_name: String,
    pub test_type: TestType,
}

impl TestConfiguration {
    pub fn test_id(&self) -> ItemId {
        self.definition.id
    }

    pub fn experience_count(&self) -> u32 {
        self.test_set.experience_count()
    }

    /// One-line description for diagnostics and duplicate-registration errors.
    pub fn describe(&self) -> String {
        format!(
            "test {} ({}), test set {} '{}', content item {} ({}), language {}, type {}, {} variables",
            self.test_id(),
            self.definition.path,
            self.test_set.id,
            self.test_set.name,
            self.content_item.id(),
            self.content_item.path,
            self.language,
            self.test_type,
            self.test_set.variables.len(),
        )
    }
}

/// What an estimate is measured against. The listing never scopes an
/// estimate to a single goal.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TestMeasurement {
    Undefined,
}

/// Everything a duration estimator needs for one test.
#[derive(Clone, Debug)]
pub struct EstimateRequest<'a> {
    pub language: &'a str,
    pub device_name: &'a str,
    pub host_item: &'a Item,
    pub experience_count: u32,
    pub power: f64,
    pub traffic_allocation_percentage: f64,
    pub confidence_level_percentage: f64,
    pub definition: &'a TestDefinition,
    pub measurement: TestMeasurement,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct DurationEstimate {
    pub estimated_day_count: Option<f64>,
    pub required_visits: Option<u64>,
}

/// One experience: the chosen value index for each test variable.
/// The all-zero combination is the baseline.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq, Hash)]
#[serde(transparent)]
pub struct ExperienceCombination(pub Vec<u8>);

impl ExperienceCombination {
    pub fn baseline(variables: usize) -> Self {
        Self(vec![0; variables])
    }

    pub fn is_baseline(&self) -> bool {
        self.0.iter().all(|&value| value == 0)
    }
}

impl fmt::Display for ExperienceCombination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self.0.iter().map(u8::to_string).collect();
        f.write_str(&parts.join("-"))
    }
}
