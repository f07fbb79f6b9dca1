//! Layer configuration loaded from YAML

use std::path::Path;

use cyclemap_common::{Error, Result};
use serde::Deserialize;

use crate::layers::{CyclingPoiLayer, MAX_ZOOM};

/// Optional layer settings. Every key has a default, unknown keys are rejected.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LayerConfig {
    /// Rental `network` values recognised as bike share, compared ignoring case
    pub bike_share_networks: Vec<String>,

    /// Normalised value written as the `network` attribute of rental stations
    pub rental_network: String,

    pub min_zoom: u8,
    pub max_zoom: u8,
}

impl Default for LayerConfig {
    fn default() -> Self {
        Self {
            bike_share_networks: vec!["bubi".to_string()],
            rental_network: "bubi".to_string(),
            min_zoom: 0,
            max_zoom: MAX_ZOOM,
        }
    }
}

impl LayerConfig {
    /// Load and validate configuration from a YAML file
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_yaml(&contents)
    }

    /// Parse and validate from a YAML string
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let config: Self = serde_yaml::from_str(yaml).map_err(|e| Error::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Override the zoom range, keeping configured values where `None`
    pub fn with_zoom_range(mut self, min_zoom: Option<u8>, max_zoom: Option<u8>) -> Result<Self> {
        if let Some(min_zoom) = min_zoom {
            self.min_zoom = min_zoom;
        }
        if let Some(max_zoom) = max_zoom {
            self.max_zoom = max_zoom;
        }
        self.validate()?;
        Ok(self)
    }

    pub fn validate(&self) -> Result<()> {
        if self.max_zoom > MAX_ZOOM {
            return Err(Error::Config(format!(
                "max_zoom {} exceeds {}",
                self.max_zoom, MAX_ZOOM
            )));
        }
        if self.min_zoom > self.max_zoom {
            return Err(Error::Config(format!(
                "min_zoom {} is greater than max_zoom {}",
                self.min_zoom, self.max_zoom
            )));
        }
        if self.rental_network.is_empty() {
            return Err(Error::Config("rental_network must not be empty".to_string()));
        }
        Ok(())
    }

    pub fn poi_layer(&self) -> CyclingPoiLayer {
        CyclingPoiLayer::new(self.bike_share_networks.clone(), &self.rental_network)
    }
}
