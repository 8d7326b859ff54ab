//! Agronomic reference data per crop.

use async_trait::async_trait;
use serde::Serialize;
use serde_json::{Map, Value, json};

use crate::agent::tool::{Tool, ToolDefinition, required_str};
use crate::core::Crop;
use crate::error::AgentError;

/// Target growing conditions and fertility for one crop.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct CropProfile {
    /// Crop name.
    pub crop: &'static str,
    /// Lowest ideal soil pH.
    pub ph_min: f64,
    /// Highest ideal soil pH.
    pub ph_max: f64,
    /// Lowest ideal volumetric soil moisture, percent.
    pub moisture_min: f64,
    /// Highest ideal volumetric soil moisture, percent.
    pub moisture_max: f64,
    /// Fertilizer program.
    pub fertilizer: &'static str,
    /// Conditions suited to applying fertilizer.
    pub application_conditions: &'static str,
}

/// Returns the reference profile for `crop`.
#[must_use]
pub const fn profile(crop: Crop) -> CropProfile {
    match crop {
        Crop::Corn => CropProfile {
            crop: "Corn",
            ph_min: 5.8,
            ph_max: 7.0,
            moisture_min: 25.0,
            moisture_max: 35.0,
            fertilizer: "Nitrogen 150-200 lb/acre split between pre-plant and side-dress at V6; phosphorus and potassium by soil test; sulfur 10-20 lb/acre on sandy soils.",
            application_conditions: "Apply side-dress nitrogen to moist soil with 0.5 inch of rain expected within 2 days; avoid applying before heavy rain or onto saturated ground.",
        },
        Crop::Cotton => CropProfile {
            crop: "Cotton",
            ph_min: 5.8,
            ph_max: 7.0,
            moisture_min: 20.0,
            moisture_max: 30.0,
            fertilizer: "Nitrogen 60-100 lb/acre split at planting and first square; potassium is critical during boll fill; boron foliar spray at early bloom.",
            application_conditions: "Apply when soil is moist but not saturated and no heavy rain is forecast for 48 hours; spray foliar products in calm weather below 90 F.",
        },
        Crop::Soybean => CropProfile {
            crop: "Soybean",
            ph_min: 6.0,
            ph_max: 7.0,
            moisture_min: 25.0,
            moisture_max: 35.0,
            fertilizer: "Inoculate seed instead of applying nitrogen; phosphorus and potassium by soil test; manganese foliar spray where deficiency appears on high-pH soils.",
            application_conditions: "Apply potassium in fall or pre-plant on moist soil; spray foliar micronutrients in calm, dry weather with no rain for 6 hours.",
        },
    }
}

/// `get_crop_info` tool.
#[derive(Debug, Clone, Copy, Default)]
pub struct GetCropInfo;

#[async_trait]
impl Tool for GetCropInfo {
    fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: "get_crop_info".to_string(),
            description: "Get the ideal soil pH range, soil moisture range and fertilizer guidance for a crop.".to_string(),
            parameters: json!({
                "type": "object",
                "properties": {
                    "crop": {
                        "type": "string",
                        "enum": ["Corn", "Cotton", "Soybean"],
                        "description": "Crop name"
                    }
                },
                "required": ["crop"]
            }),
        }
    }

    async fn invoke(&self, arguments: &Map<String, Value>) -> Result<Value, AgentError> {
        let name = required_str("get_crop_info", arguments, "crop")?;
        let crop: Crop = name.parse().map_err(|e: AgentError| AgentError::ToolExecution {
            name: "get_crop_info".to_string(),
            message: e.to_string(),
        })?;
        serde_json::to_value(profile(crop)).map_err(|e| AgentError::ToolExecution {
            name: "get_crop_info".to_string(),
            message: e.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_profiles_are_consistent() {
        for crop in Crop::ALL {
            let p = profile(crop);
            assert_eq!(p.crop, crop.display_name());
            assert!(p.ph_min < p.ph_max);
            assert!(p.moisture_min < p.moisture_max);
        }
    }

    #[tokio::test]
    async fn test_get_crop_info() {
        let mut args = Map::new();
        args.insert("crop".to_string(), json!("soybean"));
        let out = GetCropInfo.invoke(&args).await.unwrap_or_default();
        assert_eq!(out["crop"], "Soybean");
        assert_eq!(out["ph_min"].as_f64(), Some(6.0));
    }

    #[tokio::test]
    async fn test_unknown_crop() {
        let mut args = Map::new();
        args.insert("crop".to_string(), json!("wheat"));
        assert!(matches!(
            GetCropInfo.invoke(&args).await,
            Err(AgentError::ToolExecution { .. })
        ));
        assert!(GetCropInfo.invoke(&Map::new()).await.is_err());
    }
}
