use axum::{http::StatusCode, response::IntoResponse, response::Response, Json};
use content_testing::{ListingError, TestListing};
use std::sync::Arc;

pub mod health;

pub struct AppState {
    /// `None` when the content-test catalog failed to load.
    pub listing: Option<Arc<TestListing>>,
    pub start_time: std::time::Instant,
}

impl AppState {
    pub fn new(listing: Option<Arc<TestListing>>) -> Self {
        Self {
            listing,
            start_time: std::time::Instant::now(),
        }
    }
}

pub(crate) fn get_listing(state: &AppState) -> Result<Arc<TestListing>, Response> {
    state.listing.clone().ok_or_else(|| {
        (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(serde_json::json!({"message": "content-test catalog unavailable"})),
        )
            .into_response()
    })
}

pub(crate) fn listing_error_to_response(err: ListingError) -> Response {
    let status = err.status_code();
    if status.is_server_error() {
        tracing::error!(error = %err, "active-tests request failed");
    } else {
        tracing::warn!(error = %err, "rejected active-tests request");
    }
    (
        status,
        Json(serde_json::json!({ "message": err.to_string() })),
    )
        .into_response()
}

pub use active_tests::list_active_tests;
pub use health::health;
