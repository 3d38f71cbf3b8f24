//! Configuration for the presentation pipeline
//!
//! `PresentConfig` carries everything `Presenter::init` needs to open the
//! display path. Defaults match the stock compositor setup; applications
//! that want a different layer or transfer-memory budget can load a TOML
//! file or build the struct directly.

use anyhow::{Context, Result};
use bitflags::bitflags;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use tracing::{debug, info};

bitflags! {
    /// Compositor hint bits attached to the layer when it is opened
    // Serialize/Deserialize come from the bitflags `serde` feature.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
    #[serde(transparent)]
    pub struct LayerFlags: u32 {
        /// Stock layer placement
        const DEFAULT = 1 << 0;
    }
}

impl Default for LayerFlags {
    fn default() -> Self {
        Self::DEFAULT
    }
}

/// Presentation pipeline configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PresentConfig {
    /// Target display name
    pub display_name: String,
    /// Compositor hint bits for the layer
    pub layer_flags: LayerFlags,
    /// Explicit layer slot; `None` lets the service auto-assign
    pub layer_id: Option<u64>,
    /// Shared memory reserved for the graphics backend, in bytes
    pub transfer_mem_size: usize,
    /// Buffer slots in the pool; must be a non-zero power of two
    pub total_slots: u32,
    /// Pixel format passed to every dequeue
    pub format: u32,
    /// Usage bits passed to every dequeue
    pub usage: u32,
}

impl Default for PresentConfig {
    fn default() -> Self {
        Self {
            display_name: "Default".into(),
            layer_flags: LayerFlags::default(),
            layer_id: None,
            transfer_mem_size: 0x30_0000,
            total_slots: 2,
            format: 0,
            usage: 0x300,
        }
    }
}

impl PresentConfig {
    /// Load configuration from a TOML file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();

        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {path:?}"))?;

        let config: PresentConfig =
            toml::from_str(&content).context("Failed to parse config file")?;

        info!("Configuration loaded from {:?}", path);
        debug!("Config: {:?}", config);

        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_stock_setup() {
        let config = PresentConfig::default();
        assert_eq!(config.display_name, "Default");
        assert_eq!(config.transfer_mem_size, 0x30_0000);
        assert_eq!(config.total_slots, 2);
        assert_eq!(config.usage, 0x300);
        assert!(config.layer_id.is_none());
    }

    #[test]
    fn test_partial_toml_fills_defaults() {
        let config: PresentConfig =
            toml::from_str("display_name = \"External\"\ntotal_slots = 4\n").unwrap();
        assert_eq!(config.display_name, "External");
        assert_eq!(config.total_slots, 4);
        assert_eq!(config.transfer_mem_size, 0x30_0000);
    }
}
