//! Tools the precision farming agent can call.

pub mod crop_info;
pub mod ph;
pub mod remediation;
pub mod water;
pub mod weather;

use std::sync::Arc;

pub use crop_info::GetCropInfo;
pub use ph::{DecreasePh, IncreasePh, SoilTexture};
pub use remediation::{Advisor, Problem, Remediation};
pub use water::CalculateWaterNeeded;
pub use weather::GetWeatherData;

use crate::agent::executor::ToolRegistry;

/// Builds the farming tool registry.
///
/// `advisor` backs the insect and disease tools; `remediation_template`
/// is the question they send it.
#[must_use]
pub fn farming_registry(
    advisor: Arc<dyn Advisor>,
    remediation_template: &str,
    weather: GetWeatherData,
) -> ToolRegistry {
    ToolRegistry::new()
        .with(Arc::new(DecreasePh))
        .with(Arc::new(weather))
        .with(Arc::new(GetCropInfo))
        .with(Arc::new(CalculateWaterNeeded))
        .with(Arc::new(Remediation::new(
            Problem::Insect,
            Arc::clone(&advisor),
            remediation_template,
        )))
        .with(Arc::new(Remediation::new(
            Problem::Disease,
            advisor,
            remediation_template,
        )))
        .with(Arc::new(IncreasePh))
}
