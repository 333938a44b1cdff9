//! Render configuration loaded from TOML

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::error::GraphicsError;

/// Errors raised while loading a configuration document
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to parse render config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid render config: {0}")]
    Invalid(#[from] GraphicsError),
}

/// How curve segments are turned into line segments
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FlattenStrategy {
    /// Recursive subdivision until the curve is flat enough
    #[default]
    Adaptive,
    /// Estimate the curve length and use evenly spaced steps
    FixedStep,
}

/// Tunables for render batching and path filling
#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct RenderConfig {
    /// Size in bytes of each pooled vertex buffer
    pub vertex_buffer_size: usize,
    /// Number of vertex buffers in the pool ring
    pub vertex_buffer_count: usize,
    /// Number of pooled textures (and transfer buffers) per format
    pub texture_ring_count: usize,
    /// Size of the float RGBA textures holding path brush instances
    pub rgba32f_texture_width: i32,
    pub rgba32f_texture_height: i32,
    /// Edge length of the square coverage mask atlas
    pub mask_texture_size: i32,
    /// Edge length of one coverage block in device pixels
    pub mask_block_size: i32,
    /// Vertical supersampling factor of the path rasterizer
    pub antialias_level: u32,
    pub flatten_strategy: FlattenStrategy,
    /// Maximum flattening error in device pixels
    pub flatten_tolerance: f32,
    /// Distinct textures one triangle batch may reference
    pub max_batch_textures: usize,
}

fn default_vertex_buffer_size() -> usize {
    1024 * 1024
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            vertex_buffer_size: default_vertex_buffer_size(),
            vertex_buffer_count: 4,
            texture_ring_count: 4,
            rgba32f_texture_width: 1024,
            rgba32f_texture_height: 64,
            mask_texture_size: 1024,
            mask_block_size: 16,
            antialias_level: 2,
            flatten_strategy: FlattenStrategy::Adaptive,
            flatten_tolerance: 0.25,
            max_batch_textures: 4,
        }
    }
}

impl RenderConfig {
    /// Parse and validate a TOML document
    pub fn from_toml_str(source: &str) -> Result<Self, ConfigError> {
        let config: RenderConfig = toml::from_str(source)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> crate::Result<()> {
        if self.vertex_buffer_size == 0 {
            return Err(GraphicsError::invalid_argument(
                "vertex_buffer_size must be positive",
            ));
        }
        if self.vertex_buffer_count < 2 || self.texture_ring_count < 2 {
            return Err(GraphicsError::invalid_argument(
                "pool rings need at least two slots",
            ));
        }
        if self.rgba32f_texture_width <= 0 || self.rgba32f_texture_height <= 0 {
            return Err(GraphicsError::invalid_argument(
                "rgba32f texture size must be positive",
            ));
        }
        if self.mask_block_size <= 0
            || self.mask_texture_size < self.mask_block_size * 2
            || self.mask_texture_size % self.mask_block_size != 0
        {
            return Err(GraphicsError::invalid_argument(format!(
                "mask texture size {} must be a multiple of block size {} holding at least two blocks",
                self.mask_texture_size, self.mask_block_size
            )));
        }
        if self.antialias_level == 0 || self.antialias_level > 16 {
            return Err(GraphicsError::invalid_argument(
                "antialias_level must be within 1..=16",
            ));
        }
        if self.flatten_tolerance.is_nan() || self.flatten_tolerance <= 0.0 {
            return Err(GraphicsError::invalid_argument(
                "flatten_tolerance must be positive",
            ));
        }
        if self.max_batch_textures == 0 {
            return Err(GraphicsError::invalid_argument(
                "max_batch_textures must be positive",
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_valid() {
        assert!(RenderConfig::default().validate().is_ok());
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config = RenderConfig::from_toml_str(
            r#"
            vertex_buffer_size = 4096
            flatten_strategy = "fixed_step"
            "#,
        )
        .unwrap();
        assert_eq!(config.vertex_buffer_size, 4096);
        assert_eq!(config.flatten_strategy, FlattenStrategy::FixedStep);
        assert_eq!(config.mask_block_size, 16);
    }

    #[test]
    fn test_rejects_bad_block_size() {
        let err = RenderConfig::from_toml_str("mask_block_size = 24").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn test_rejects_malformed_toml() {
        let err = RenderConfig::from_toml_str("vertex_buffer_size = \"big\"").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }
}
