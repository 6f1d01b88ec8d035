use serde::{Deserialize, Serialize};
use thiserror::Error;
use url::Url;

use crate::capabilities::Endpoint;
use crate::image_processing::{WatermarkConfig, WatermarkError};
use crate::{
    AppError, ErrorKind, ADMIN_MAP_CENTER, ADMIN_MAP_ZOOM, DEFAULT_API_BASE_URL, LODGE_MAP_ZOOM,
};

const LEAFLET_IMAGES: &str = "https://cdnjs.cloudflare.com/ajax/libs/leaflet/1.7.1/images";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid API base url {url:?}: {reason}")]
    InvalidBaseUrl { url: String, reason: String },
    #[error("unsupported API url scheme {0:?}")]
    UnsupportedScheme(String),
    #[error("invalid map settings: {0}")]
    InvalidMap(String),
    #[error("invalid watermark settings: {0}")]
    Watermark(#[from] WatermarkError),
}

impl From<ConfigError> for AppError {
    fn from(e: ConfigError) -> Self {
        AppError::new(ErrorKind::Configuration, "Invalid configuration")
            .with_internal(e.to_string())
    }
}

/// Everything the shell may override at startup via `Event::Configure`.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct AppConfig {
    pub api: ApiConfig,
    pub watermark: WatermarkConfig,
    pub map: MapConfig,
    pub location: LocationConfig,
}

impl AppConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.api.parsed_base()?;
        self.watermark.validate()?;
        self.map.validate()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ApiConfig {
    pub base_url: String,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_API_BASE_URL.to_string(),
        }
    }
}

impl ApiConfig {
    fn parsed_base(&self) -> Result<Url, ConfigError> {
        let url = Url::parse(self.base_url.trim()).map_err(|e| ConfigError::InvalidBaseUrl {
            url: self.base_url.clone(),
            reason: e.to_string(),
        })?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(ConfigError::UnsupportedScheme(url.scheme().to_string()));
        }
        if url.cannot_be_a_base() {
            return Err(ConfigError::InvalidBaseUrl {
                url: self.base_url.clone(),
                reason: "cannot be a base".into(),
            });
        }
        Ok(url)
    }

    /// Resolves an endpoint below the base url, keeping any path prefix the base carries.
    pub fn url_for(&self, endpoint: &Endpoint) -> Result<Url, ConfigError> {
        let mut base = self.parsed_base()?;
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }
        let path = endpoint.path();
        base.join(path.trim_start_matches('/'))
            .map_err(|e| ConfigError::InvalidBaseUrl {
                url: self.base_url.clone(),
                reason: e.to_string(),
            })
    }
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct LocationConfig {
    pub high_accuracy: bool,
    pub timeout_ms: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct MarkerIcon {
    pub icon_url: String,
    pub icon_retina_url: String,
    pub shadow_url: String,
    pub icon_size: [u32; 2],
    pub icon_anchor: [u32; 2],
}

impl Default for MarkerIcon {
    fn default() -> Self {
        Self {
            icon_url: format!("{LEAFLET_IMAGES}/marker-icon.png"),
            icon_retina_url: format!("{LEAFLET_IMAGES}/marker-icon-2x.png"),
            shadow_url: format!("{LEAFLET_IMAGES}/marker-shadow.png"),
            icon_size: [25, 41],
            icon_anchor: [12, 41],
        }
    }
}

/// Tile source and framing for the two map surfaces.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct MapConfig {
    pub tile_url: String,
    pub attribution: String,
    pub marker: MarkerIcon,
    pub lodge_zoom: u8,
    pub admin_center: (f64, f64),
    pub admin_zoom: u8,
}

impl Default for MapConfig {
    fn default() -> Self {
        Self {
            tile_url: "https://{s}.tile.openstreetmap.org/{z}/{x}/{y}.png".into(),
            attribution: "&copy; OpenStreetMap contributors".into(),
            marker: MarkerIcon::default(),
            lodge_zoom: LODGE_MAP_ZOOM,
            admin_center: ADMIN_MAP_CENTER,
            admin_zoom: ADMIN_MAP_ZOOM,
        }
    }
}

impl MapConfig {
    const MAX_ZOOM: u8 = 19;

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.tile_url.trim().is_empty() {
            return Err(ConfigError::InvalidMap("tile_url is empty".into()));
        }
        if self.lodge_zoom > Self::MAX_ZOOM || self.admin_zoom > Self::MAX_ZOOM {
            return Err(ConfigError::InvalidMap(format!(
                "zoom must be at most {}",
                Self::MAX_ZOOM
            )));
        }
        let (lat, lng) = self.admin_center;
        crate::ValidatedCoordinate::new(lat, lng)
            .map_err(|e| ConfigError::InvalidMap(e.to_string()))?;
        Ok(())
    }
}
