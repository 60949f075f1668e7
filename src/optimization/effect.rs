use serde::{Deserialize, Serialize};

use super::collaborators::PerformanceProvider;
use super::model::TestConfiguration;
use crate::error::Result;

/// Direction of a test's measured effect. Serialized as the CSS class the
/// listing UI styles the effect column with.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
pub enum EffectClass {
    #[serde(rename = "value-decrease")]
    Decrease,
    #[serde(rename = "value-nochange")]
    NoChange,
    #[serde(rename = "value-increase")]
    Increase,
}

impl EffectClass {
    /// Anything that is neither negative nor zero (including NaN) counts as
    /// an increase.
    pub fn classify(effect: f64) -> Self {
        if effect < 0.0 {
            EffectClass::Decrease
        } else if effect == 0.0 {
            EffectClass::NoChange
        } else {
            EffectClass::Increase
        }
    }

}

/// Effect of the best-performing experience against the baseline, or 0.0
/// while no winner has emerged.
pub fn winning_effect(
    performance: &dyn PerformanceProvider,
    configuration: &TestConfiguration,
) -> Result<f64> {
    let snapshot = performance.performance_for_test(configuration)?;
    Ok(snapshot
        .best_experience()
        .map_or(0.0, |best| snapshot.experience_effect(&best)))
}
