use std::fs;
use std::path::Path;

use heatmap::RasterOptions;
use serde::{Deserialize, Serialize};
use synth::{InflateOptions, RouteOptions};

use crate::error::ToolError;

/// Everything a synthesis run can be tuned with. Missing sections and fields
/// take their defaults, so `{}` is a valid config file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SynthConfig {
    pub airports: InflateOptions,
    pub routes: RouteOptions,
    pub heatmap: RasterOptions,
    /// Seed for route synthesis. Unset means a different network every run.
    pub route_seed: Option<u64>,
}

impl SynthConfig {
    pub fn load(path: &Path) -> Result<Self, ToolError> {
        let text = fs::read_to_string(path).map_err(|source| ToolError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json(&text).map_err(|source| ToolError::Json {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn from_json(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }
}
