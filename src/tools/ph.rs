//! Soil pH amendment calculators.

use std::str::FromStr;

use async_trait::async_trait;
use serde_json::{Map, Value, json};

use crate::agent::tool::{Tool, ToolDefinition, optional_str, required_f64};
use crate::error::AgentError;

/// Soil texture class, which sets how much amendment moves pH one unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SoilTexture {
    /// Sand and loamy sand.
    Sandy,
    /// Loam and silt loam.
    #[default]
    Loam,
    /// Clay and clay loam.
    Clay,
}

impl SoilTexture {
    /// Agricultural lime, tons per acre per pH unit raised.
    #[must_use]
    pub const fn lime_tons_per_unit(self) -> f64 {
        match self {
            Self::Sandy => 1.0,
            Self::Loam => 2.0,
            Self::Clay => 3.0,
        }
    }

    /// Elemental sulfur, pounds per acre per pH unit lowered.
    #[must_use]
    pub const fn sulfur_lbs_per_unit(self) -> f64 {
        match self {
            Self::Sandy => 400.0,
            Self::Loam => 800.0,
            Self::Clay => 1200.0,
        }
    }

    /// Lowercase name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Sandy => "sandy",
            Self::Loam => "loam",
            Self::Clay => "clay",
        }
    }
}

impl FromStr for SoilTexture {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "sand" | "sandy" | "loamy sand" => Ok(Self::Sandy),
            "loam" | "loamy" | "silt loam" | "silt" => Ok(Self::Loam),
            "clay" | "clay loam" | "clayey" => Ok(Self::Clay),
            other => Err(format!("unknown soil texture '{other}' (expected sandy, loam or clay)")),
        }
    }
}

/// Validated inputs shared by both calculators.
struct PhRequest {
    current: f64,
    target: f64,
    area_acres: f64,
    texture: SoilTexture,
}

fn parse_request(tool: &str, args: &Map<String, Value>) -> Result<PhRequest, AgentError> {
    let invalid = |message: String| AgentError::ToolExecution {
        name: tool.to_string(),
        message,
    };

    let current = required_f64(tool, args, "current_ph")?;
    let target = required_f64(tool, args, "target_ph")?;
    let area_acres = required_f64(tool, args, "area_acres")?;
    for (key, ph) in [("current_ph", current), ("target_ph", target)] {
        if !(0.0..=14.0).contains(&ph) {
            return Err(invalid(format!("{key} must be between 0 and 14, got {ph}")));
        }
    }
    if area_acres <= 0.0 || !area_acres.is_finite() {
        return Err(invalid(format!("area_acres must be positive, got {area_acres}")));
    }
    let texture = optional_str(args, "soil_texture")
        .map(str::parse::<SoilTexture>)
        .transpose()
        .map_err(invalid)?
        .unwrap_or_default();

    Ok(PhRequest {
        current,
        target,
        area_acres,
        texture,
    })
}

fn schema(name: &str, description: &str) -> ToolDefinition {
    ToolDefinition {
        name: name.to_string(),
        description: description.to_string(),
        parameters: json!({
            "type": "object",
            "properties": {
                "current_ph": { "type": "number", "description": "Measured soil pH" },
                "target_ph": { "type": "number", "description": "Desired soil pH" },
                "area_acres": { "type": "number", "description": "Field area in acres" },
                "soil_texture": {
                    "type": "string",
                    "enum": ["sandy", "loam", "clay"],
                    "description": "Soil texture class (default loam)"
                }
            },
            "required": ["current_ph", "target_ph", "area_acres"]
        }),
    }
}

fn round2(x: f64) -> f64 {
    (x * 100.0).round() / 100.0
}

/// `increase_ph`: agricultural lime needed to raise pH.
#[derive(Debug, Clone, Copy, Default)]
pub struct IncreasePh;

#[async_trait]
impl Tool for IncreasePh {
    fn definition(&self) -> ToolDefinition {
        schema(
            "increase_ph",
            "Calculate how much agricultural lime (tons) raises the soil pH of a field to the target.",
        )
    }

    async fn invoke(&self, arguments: &Map<String, Value>) -> Result<Value, AgentError> {
        let req = parse_request("increase_ph", arguments)?;
        let delta = (req.target - req.current).max(0.0);
        let tons = delta * req.texture.lime_tons_per_unit() * req.area_acres;
        let note = if delta > 0.0 {
            "Incorporate lime into the top 6 inches; allow several months to react."
        } else {
            "Soil pH is already at or above the target; no lime needed."
        };
        Ok(json!({
            "amendment": "agricultural lime",
            "current_ph": req.current,
            "target_ph": req.target,
            "soil_texture": req.texture.as_str(),
            "area_acres": req.area_acres,
            "tons_per_acre": round2(delta * req.texture.lime_tons_per_unit()),
            "total_tons": round2(tons),
            "note": note,
        }))
    }
}

/// `decrease_ph`: elemental sulfur needed to lower pH.
#[derive(Debug, Clone, Copy, Default)]
pub struct DecreasePh;

#[async_trait]
impl Tool for DecreasePh {
    fn definition(&self) -> ToolDefinition {
        schema(
            "decrease_ph",
            "Calculate how much elemental sulfur (pounds) lowers the soil pH of a field to the target.",
        )
    }

    async fn invoke(&self, arguments: &Map<String, Value>) -> Result<Value, AgentError> {
        let req = parse_request("decrease_ph", arguments)?;
        let delta = (req.current - req.target).max(0.0);
        let lbs = delta * req.texture.sulfur_lbs_per_unit() * req.area_acres;
        let note = if delta > 0.0 {
            "Apply sulfur when soil is warm and moist; split applications above 1000 lb per acre."
        } else {
            "Soil pH is already at or below the target; no sulfur needed."
        };
        Ok(json!({
            "amendment": "elemental sulfur",
            "current_ph": req.current,
            "target_ph": req.target,
            "soil_texture": req.texture.as_str(),
            "area_acres": req.area_acres,
            "pounds_per_acre": round2(delta * req.texture.sulfur_lbs_per_unit()),
            "total_pounds": round2(lbs),
            "note": note,
        }))
    }
}
