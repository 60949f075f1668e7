use std::sync::Arc;

use super::collaborators::{DurationEstimator, LookupResult};
use super::model::{DurationEstimate, EstimateRequest, Item};
use crate::settings::EstimatorSettings;

/// Daily visitor counts for host pages.
pub trait TrafficSource: Send + Sync {
    fn daily_visits(
        &self,
        host_item: &Item,
        language: &str,
        device_name: &str,
    ) -> LookupResult<Option<f64>>;
}

// ── Sample Size ─────────────────────────────────────────────────────

/// Two-proportion power analysis.
/// Returns the visits each experience needs to detect `relative_mde` over
/// `baseline_rate` at the given alpha and power, or `None` when the inputs
/// admit no finite answer.
pub fn required_visits_per_experience(
    baseline_rate: f64,
    relative_mde: f64,
    alpha: f64,
    power: f64,
) -> Option<u64> {
    if !(0.0..1.0).contains(&baseline_rate) || !(alpha > 0.0 && alpha < 1.0) {
        return None;
    }
    if !(power > 0.0 && power < 1.0) {
        return None;
    }
    let p1 = baseline_rate;
    let p2 = (baseline_rate * (1.0 + relative_mde)).clamp(0.0, 1.0);
    let delta = (p2 - p1).abs();
    if delta == 0.0 {
        return None;
    }

    // z-values for alpha/2 upper tail and power
    let z_alpha = z_from_p(1.0 - alpha / 2.0);
    let z_power = z_from_p(power);
    let p_bar = (p1 + p2) / 2.0;

    // n = (z_alpha * sqrt(2*p_bar*(1-p_bar)) + z_power * sqrt(p1*(1-p1) + p2*(1-p2)))^2 / delta^2
    let numerator = z_alpha * (2.0 * p_bar * (1.0 - p_bar)).sqrt()
        + z_power * (p1 * (1.0 - p1) + p2 * (1.0 - p2)).sqrt();
    let n = (numerator.powi(2) / delta.powi(2)).ceil();
    n.is_finite().then_some(n as u64)
}

/// Inverse normal CDF approximation (Abramowitz & Stegun 26.2.23).
/// Returns z such that P(Z < z) = p.
fn z_from_p(p: f64) -> f64 {
    if p <= 0.0 {
        return f64::NEG_INFINITY;
    }
    if p >= 1.0 {
        return f64::INFINITY;
    }

    let (p_adj, sign) = if p < 0.5 { (p, -1.0) } else { (1.0 - p, 1.0) };
    let t = (-2.0 * p_adj.ln()).sqrt();

    let c0 = 2.515517;
    let c1 = 0.802853;
    let c2 = 0.010328;
    let d1 = 1.432788;
    let d2 = 0.189269;
    let d3 = 0.001308;

    let z = t - (c0 + c1 * t + c2 * t * t) / (1.0 + d1 * t + d2 * t * t + d3 * t * t * t);

    sign * z
}

// ── Estimator ───────────────────────────────────────────────────────

/// Duration estimator that sizes a test with a two-proportion power analysis
/// and divides by the host page's allocated daily traffic.
pub struct PowerAnalysisEstimator {
    settings: EstimatorSettings,
    traffic: Arc<dyn TrafficSource>,
}

impl PowerAnalysisEstimator {
    pub fn new(settings: EstimatorSettings, traffic: Arc<dyn TrafficSource>) -> Self {
        Self { settings, traffic }
    }
}

impl DurationEstimator for PowerAnalysisEstimator {
    fn estimate(&self, request: &EstimateRequest<'_>) -> LookupResult<DurationEstimate> {
        let alpha = 1.0 - request.confidence_level_percentage / 100.0;
        let Some(per_experience) = required_visits_per_experience(
            self.settings.baseline_conversion_rate,
            self.settings.minimum_detectable_effect,
            alpha,
            request.power,
        ) else {
            return Ok(DurationEstimate::default());
        };
        let required = per_experience.saturating_mul(u64::from(request.experience_count.max(1)));

        let daily_visits = self.traffic.daily_visits(
            request.host_item,
            request.language,
            request.device_name,
        )?;
        let allocated = daily_visits.unwrap_or(0.0) * request.traffic_allocation_percentage / 100.0;
        let estimated_day_count = (allocated > 0.0).then(|| required as f64 / allocated);

        tracing::debug!(
            test_id = %request.definition.id,
            required_visits = required,
            allocated_daily_visits = allocated,
            estimated_days = ?estimated_day_count,
            "estimated test duration"
        );
        Ok(DurationEstimate {
            estimated_day_count,
            required_visits: Some(required),
        })
    }
}
