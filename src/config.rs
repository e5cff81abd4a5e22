//! Tunable pipeline parameters.
//!
//! Values a deployment may want to change (input ceiling, display size,
//! filter strength, CLI defaults) live here and can be loaded from a JSON
//! file. Anything that affects reproducibility of the color reduction (the
//! bucket size, sample sizes and the clustering seed) is a constant in
//! [`crate::reduce`] instead.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{PatternError, Result};

/// Parameters for the edge-preserving smoothing pass.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SmoothingConfig {
    /// Neighbourhood radius in pixels (radius 2 = 5×5 window)
    pub radius: u32,
    /// Color-difference falloff; larger values smooth across stronger edges
    pub sigma_color: f32,
    /// Spatial falloff in pixels
    pub sigma_space: f32,
}

impl Default for SmoothingConfig {
    fn default() -> Self {
        Self {
            radius: 2,
            sigma_color: 30.0,
            sigma_space: 30.0,
        }
    }
}

/// Complete pipeline configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Inputs larger than this are rejected before decoding
    pub max_input_bytes: usize,

    /// Width of the encoded preview image
    pub display_width: u32,

    /// Upper bound on working width × height; larger requests are rejected
    pub max_working_pixels: u64,

    /// Upper bound on preview width × height; taller previews are narrowed
    /// to fit
    pub max_display_pixels: u64,

    pub smoothing: SmoothingConfig,

    /// Radius of the median blur applied when the grid filter is requested
    pub grid_filter_radius: u32,

    /// Color count used by the CLI when none is given
    pub default_n_colors: usize,

    /// Working width used by the CLI when none is given
    pub default_width: u32,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            max_input_bytes: 10 * 1024 * 1024,
            display_width: 512,
            max_working_pixels: 4_000_000,
            max_display_pixels: 4096 * 4096,
            smoothing: SmoothingConfig::default(),
            grid_filter_radius: 1,
            default_n_colors: 20,
            default_width: 100,
        }
    }
}

impl PipelineConfig {
    /// Load a configuration from a JSON file. Missing fields use defaults.
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_json_str(&content)
    }

    pub fn from_json_str(content: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(content).map_err(|e| PatternError::Config {
            message: e.to_string(),
        })?;
        config.validate()?;
        tracing::debug!(
            display_width = config.display_width,
            max_input_bytes = config.max_input_bytes,
            "Loaded pipeline configuration"
        );
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        let problem = if self.max_input_bytes == 0 {
            Some("max_input_bytes must be positive")
        } else if self.display_width == 0 {
            Some("display_width must be positive")
        } else if self.max_working_pixels == 0 {
            Some("max_working_pixels must be positive")
        } else if self.max_display_pixels < self.max_working_pixels {
            Some("max_display_pixels must be at least max_working_pixels")
        } else if self.grid_filter_radius == 0 {
            Some("grid_filter_radius must be positive")
        } else if self.smoothing.sigma_color <= 0.0 || self.smoothing.sigma_space <= 0.0 {
            Some("smoothing sigmas must be positive")
        } else if self.default_n_colors == 0 || self.default_width == 0 {
            Some("CLI defaults must be positive")
        } else {
            None
        };

        match problem {
            Some(message) => Err(PatternError::Config {
                message: message.to_string(),
            }),
            None => Ok(()),
        }
    }

    /// Reject inputs above the size ceiling.
    pub fn check_input_size(&self, size: usize) -> Result<()> {
        if size > self.max_input_bytes {
            return Err(PatternError::OversizedInput {
                size,
                max: self.max_input_bytes,
            });
        }
        Ok(())
    }
}
