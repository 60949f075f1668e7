use chrono::{DateTime, Utc};

use super::collaborators::DurationEstimator;
use super::model::{EstimateRequest, Item, TestDefinition, TestMeasurement};
use crate::error::{DurationBound, ListingError, Result};

/// Statistical power every listing estimate is requested at.
pub const TARGET_POWER: f64 = 0.8;

const MS_PER_DAY: f64 = 86_400_000.0;

/// Days a running test still needs, as shown in the listing.
///
/// A test whose estimate has already run out (or never existed) reports its
/// full maximum duration. Otherwise the estimate is clamped into the window
/// left between the minimum and maximum durations; the result goes negative
/// once the minimum has been exceeded.
pub fn remaining_days(
    estimator: &dyn DurationEstimator,
    host_item: &Item,
    experience_count: u32,
    definition: &TestDefinition,
    now: DateTime<Utc>,
) -> Result<i64> {
    let request = EstimateRequest {
        language: &definition.language,
        device_name: definition.device_name(),
        host_item,
        experience_count,
        power: TARGET_POWER,
        traffic_allocation_percentage: definition.traffic_allocation_percentage,
        confidence_level_percentage: definition.confidence_level_percentage,
        definition,
        measurement: TestMeasurement::Undefined,
    };
    let estimate = estimator.estimate(&request)?;

    let candidate = candidate_days(
        definition.start_date,
        estimate.estimated_day_count.unwrap_or(0.0),
        now,
    );
    let max_duration = parse_bound(DurationBound::Max, &definition.max_duration)?;
    if candidate < 1 {
        return Ok(max_duration);
    }

    let min_duration = parse_bound(DurationBound::Min, &definition.min_duration)?;
    Ok(clamp_to_window(
        candidate,
        elapsed_days(definition.start_date, now),
        min_duration,
        max_duration,
    ))
}

/// Whole days from `now` until `start + day_count`, rounded up.
pub fn candidate_days(start: DateTime<Utc>, day_count: f64, now: DateTime<Utc>) -> i64 {
    let offset_days = (start - now).num_milliseconds() as f64 / MS_PER_DAY;
    (offset_days + day_count).ceil() as i64
}

/// Whole days since `start`, truncated toward zero.
pub fn elapsed_days(start: DateTime<Utc>, now: DateTime<Utc>) -> i64 {
    (now - start).num_days()
}

pub fn clamp_to_window(candidate: i64, elapsed: i64, min_duration: i64, max_duration: i64) -> i64 {
    candidate
        .min(max_duration.saturating_sub(elapsed))
        .max(min_duration.saturating_sub(elapsed))
}

pub fn parse_bound(bound: DurationBound, value: &str) -> Result<i64> {
    value
        .trim()
        .parse()
        .map_err(|_| ListingError::MalformedDurationBound {
            bound,
            value: value.to_string(),
        })
}
