#![allow(dead_code)]

use chrono::{DateTime, Duration, TimeZone, Utc};
use content_testing::catalog::SNAPSHOT_DIR;
use content_testing::optimization::collaborators::{
    Collaborators, DurationEstimator, LookupResult,
};
use content_testing::optimization::model::{DurationEstimate, EstimateRequest};
use content_testing::{ItemId, ListingSettings, SnapshotCatalog, TestListing};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use tempfile::TempDir;
use tokio::net::TcpListener;

pub fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 3, 17, 12, 0, 0).unwrap()
}

/// One running test as it appears in a catalog snapshot.
pub struct RunningTest {
    pub name: &'static str,
    pub start_days_ago: i64,
    pub min_duration: &'static str,
    pub max_duration: &'static str,
    pub language: &'static str,
    pub owner: &'static str,
    /// `(combination, visits, value)` per experience.
    pub performance: Vec<(Vec<u8>, u64, f64)>,
    pub daily_visits: Option<f64>,
}

impl Default for RunningTest {
    fn default() -> Self {
        Self {
            name: "Home",
            start_days_ago: 10,
            min_duration: "5",
            max_duration: "30",
            language: "en",
            owner: "sitecore\\jane",
            performance: Vec::new(),
            daily_visits: None,
        }
    }
}

#[derive(Clone, Copy, Debug)]
pub struct AddedTest {
    pub test_id: ItemId,
    pub host_id: ItemId,
}

#[derive(Default)]
pub struct SnapshotBuilder {
    items: Vec<Value>,
    definitions: Vec<Value>,
    configurations: Vec<Value>,
    active_tests: Vec<Value>,
    performance: Vec<Value>,
    traffic: Vec<Value>,
}

impl SnapshotBuilder {
    pub fn add(&mut self, test: RunningTest) -> AddedTest {
        let host_id = ItemId::new_v4();
        let test_id = ItemId::new_v4();
        let lab_path = format!("/sitecore/system/Marketing Control Panel/Test Lab/{}", test.name);

        let host_item = json!({
            "uri": format!("cms://master/{host_id}"),
            "name": test.name,
            "displayName": test.name,
            "path": format!("/sitecore/content/{}", test.name),
        });
        let definition = json!({
            "id": test_id.to_string(),
            "path": lab_path,
            "language": test.language,
            "device": {"id": ItemId::new_v4().to_string(), "name": "Default"},
            "startDate": (now() - Duration::days(test.start_days_ago)).to_rfc3339(),
            "minDuration": test.min_duration,
            "maxDuration": test.max_duration,
            "trafficAllocationPercentage": 100.0,
            "confidenceLevelPercentage": 95.0,
        });

        self.items.push(host_item.clone());
        self.items.push(json!({
            "uri": format!("cms://master/{test_id}"),
            "name": format!("{} test", test.name),
            "displayName": format!("{} test", test.name),
            "path": lab_path,
            "owner": test.owner,
        }));
        self.definitions.push(definition.clone());
        self.configurations.push(json!({
            "hostItemId": host_id.to_string(),
            "configuration": {
                "definition": definition,
                "contentItem": host_item,
                "testSet": {
                    "id": ItemId::new_v4().to_string(),
                    "name": format!("{} set", test.name),
                    "variables": [
                        {"id": ItemId::new_v4().to_string(), "name": "Hero", "valueCount": 2},
                    ],
                },
                "language": test.language,
                "deviceId": ItemId::new_v4().to_string(),
                "deviceName": "Default",
                "testType": "content",
            },
        }));
        self.active_tests.push(json!({
            "uri": format!("cms://master/{test_id}?lang={}", test.language),
            "hostItemUri": format!("cms://master/{host_id}?lang={}", test.language),
        }));
        if !test.performance.is_empty() {
            let experiences: Vec<Value> = test
                .performance
                .iter()
                .map(|(combination, visits, value)| {
                    json!({"combination": combination, "visits": visits, "value": value})
                })
                .collect();
            self.performance.push(json!({
                "testId": test_id.to_string(),
                "minVisits": 100,
                "experiences": experiences,
            }));
        }
        if let Some(visits) = test.daily_visits {
            self.traffic.push(json!({"hostItemId": host_id.to_string(), "dailyVisits": visits}));
        }

        AddedTest { test_id, host_id }
    }

    /// A search-index record whose test item no longer exists.
    pub fn add_orphan_record(&mut self) {
        self.active_tests.push(json!({
            "uri": format!("cms://master/{}", ItemId::new_v4()),
            "hostItemUri": format!("cms://master/{}", ItemId::new_v4()),
        }));
    }

    /// A second index record for a test that is already listed.
    pub fn add_duplicate_record(&mut self, test: AddedTest) {
        self.active_tests.push(json!({
            "uri": format!("cms://master/{}", test.test_id),
            "hostItemUri": format!("cms://master/{}", test.host_id),
        }));
    }

    pub fn value(&self) -> Value {
        json!({
            "items": self.items,
            "definitions": self.definitions,
            "configurations": self.configurations,
            "activeTests": self.active_tests,
            "profiles": [{"principal": "sitecore\\jane", "fullName": "Jane Editor"}],
            "performance": self.performance,
            "traffic": self.traffic,
        })
    }

    pub fn write(&self, data_dir: &Path) {
        let dir = data_dir.join(SNAPSHOT_DIR);
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join("catalog.json"), self.value().to_string()).unwrap();
    }
}

/// Estimator returning a fixed day count per test id.
#[derive(Default)]
pub struct FixedEstimates(pub HashMap<ItemId, f64>);

impl DurationEstimator for FixedEstimates {
    fn estimate(&self, request: &EstimateRequest<'_>) -> LookupResult<DurationEstimate> {
        Ok(DurationEstimate {
            estimated_day_count: self.0.get(&request.definition.id).copied(),
            required_visits: None,
        })
    }
}

pub fn listing_over(
    data_dir: &Path,
    estimator: Arc<dyn DurationEstimator>,
) -> TestListing {
    let catalog = Arc::new(SnapshotCatalog::new(data_dir).unwrap());
    TestListing::new(
        Collaborators::from_backend(catalog, estimator),
        ListingSettings::default(),
    )
    .with_clock(now)
}

/// Serve the full router over a real socket. Returns the base URL.
pub async fn spawn_server(builder: &SnapshotBuilder) -> (String, TempDir) {
    let temp_dir = TempDir::new().unwrap();
    builder.write(temp_dir.path());

    let listing = content_testing_http::build_listing(temp_dir.path());
    let state = Arc::new(content_testing_http::handlers::AppState::new(listing));
    let app = content_testing_http::router(state);

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    (format!("http://{}", addr), temp_dir)
}
