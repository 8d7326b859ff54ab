//! Irrigation requirement calculator.

use async_trait::async_trait;
use serde_json::{Map, Value, json};

use crate::agent::tool::{Tool, ToolDefinition, required_f64};
use crate::error::AgentError;

/// Depth of the managed root zone, inches.
pub const ROOT_ZONE_INCHES: f64 = 12.0;

/// Gallons in one acre-inch of water.
pub const GALLONS_PER_ACRE_INCH: f64 = 27_154.0;

const MM_PER_INCH: f64 = 25.4;

/// Irrigation still needed once expected rain is counted.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WaterNeed {
    /// Water depth needed to reach the target moisture, inches.
    pub deficit_inches: f64,
    /// Expected rain, inches.
    pub rain_inches: f64,
    /// Irrigation depth after rain, inches.
    pub irrigation_inches: f64,
    /// Irrigation volume over the field, acre-inches.
    pub acre_inches: f64,
    /// Irrigation volume over the field, gallons.
    pub gallons: f64,
}

/// Computes the irrigation needed to bring the root zone from
/// `current_moisture` to `target_moisture` (volumetric percent).
#[must_use]
pub fn water_needed(
    area_acres: f64,
    current_moisture: f64,
    target_moisture: f64,
    expected_rain_mm: f64,
) -> WaterNeed {
    let deficit_inches = ((target_moisture - current_moisture) / 100.0 * ROOT_ZONE_INCHES).max(0.0);
    let rain_inches = expected_rain_mm.max(0.0) / MM_PER_INCH;
    let irrigation_inches = (deficit_inches - rain_inches).max(0.0);
    let acre_inches = irrigation_inches * area_acres;
    WaterNeed {
        deficit_inches,
        rain_inches,
        irrigation_inches,
        acre_inches,
        gallons: acre_inches * GALLONS_PER_ACRE_INCH,
    }
}

fn round2(x: f64) -> f64 {
    (x * 100.0).round() / 100.0
}

/// `calculate_water_needed` tool.
#[derive(Debug, Clone, Copy, Default)]
pub struct CalculateWaterNeeded;

#[async_trait]
impl Tool for CalculateWaterNeeded {
    fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: "calculate_water_needed".to_string(),
            description: "Calculate how much irrigation water a field still needs to reach a target soil moisture after expected rain.".to_string(),
            parameters: json!({
                "type": "object",
                "properties": {
                    "area_acres": { "type": "number", "description": "Field area in acres" },
                    "current_moisture": { "type": "number", "description": "Current soil moisture, percent" },
                    "target_moisture": { "type": "number", "description": "Target soil moisture, percent" },
                    "expected_rain_mm": { "type": "number", "description": "Rain expected over the period, millimetres" }
                },
                "required": ["area_acres", "current_moisture", "target_moisture", "expected_rain_mm"]
            }),
        }
    }

    async fn invoke(&self, arguments: &Map<String, Value>) -> Result<Value, AgentError> {
        const NAME: &str = "calculate_water_needed";
        let area = required_f64(NAME, arguments, "area_acres")?;
        let current = required_f64(NAME, arguments, "current_moisture")?;
        let target = required_f64(NAME, arguments, "target_moisture")?;
        let rain = required_f64(NAME, arguments, "expected_rain_mm")?;

        let invalid = |message: String| AgentError::ToolExecution {
            name: NAME.to_string(),
            message,
        };
        if area <= 0.0 || !area.is_finite() {
            return Err(invalid(format!("area_acres must be positive, got {area}")));
        }
        for (key, pct) in [("current_moisture", current), ("target_moisture", target)] {
            if !(0.0..=100.0).contains(&pct) {
                return Err(invalid(format!("{key} must be a percentage, got {pct}")));
            }
        }
        if rain < 0.0 {
            return Err(invalid(format!("expected_rain_mm cannot be negative, got {rain}")));
        }

        let need = water_needed(area, current, target, rain);
        Ok(json!({
            "area_acres": area,
            "current_moisture": current,
            "target_moisture": target,
            "expected_rain_mm": rain,
            "deficit_inches": round2(need.deficit_inches),
            "rain_inches": round2(need.rain_inches),
            "irrigation_inches": round2(need.irrigation_inches),
            "acre_inches": round2(need.acre_inches),
            "gallons": need.gallons.round(),
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test_case(10.0, 20.0, 30.0, 0.0, 12.0 ; "no rain")]
    #[test_case(10.0, 20.0, 30.0, 25.4, 2.0 ; "one inch of rain")]
    #[test_case(10.0, 20.0, 30.0, 100.0, 0.0 ; "rain covers deficit")]
    #[test_case(5.0, 35.0, 30.0, 0.0, 0.0 ; "already wetter than target")]
    fn test_water_needed(area: f64, current: f64, target: f64, rain: f64, acre_inches: f64) {
        let need = water_needed(area, current, target, rain);
        assert!((need.acre_inches - acre_inches).abs() < 1e-9);
        assert!((need.gallons - acre_inches * GALLONS_PER_ACRE_INCH).abs() < 1e-6);
    }

    #[tokio::test]
    async fn test_tool_output() {
        let args = match json!({
            "area_acres": 10, "current_moisture": 20, "target_moisture": 30, "expected_rain_mm": 0
        }) {
            Value::Object(map) => map,
            _ => Map::new(),
        };
        let out = CalculateWaterNeeded.invoke(&args).await.unwrap_or_default();
        assert_eq!(out["acre_inches"].as_f64(), Some(12.0));
        assert_eq!(out["gallons"].as_f64(), Some(325_848.0));
    }

    #[tokio::test]
    async fn test_rejects_bad_percentages() {
        let args = match json!({
            "area_acres": 10, "current_moisture": 120, "target_moisture": 30, "expected_rain_mm": 0
        }) {
            Value::Object(map) => map,
            _ => Map::new(),
        };
        assert!(matches!(
            CalculateWaterNeeded.invoke(&args).await,
            Err(AgentError::ToolExecution { .. })
        ));
    }
}
