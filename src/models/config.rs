//! Configuration schema (config.json).
//! schemaVersion: 1

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const SCHEMA_VERSION: u32 = 1;

const APP_DIR_NAME: &str = "ptzclick";
const CONFIG_FILE_NAME: &str = "config.json";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("unsupported config schemaVersion: expected {expected}, got {found}")]
    UnsupportedSchema { expected: u32, found: u32 },
    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Field of view at one end of the zoom range, in degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FovPair {
    pub hfov_deg: f64,
    pub vfov_deg: f64,
}

/// Wide-end (zoom 0) and tele-end (zoom 1) field of view for one camera model.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FovCalibration {
    pub wide: FovPair,
    pub tele: FovPair,
}

impl FovCalibration {
    /// Canon VB-H47 datasheet values.
    pub fn canon_vb_h47() -> Self {
        Self {
            wide: FovPair {
                hfov_deg: 61.2,
                vfov_deg: 37.0,
            },
            tele: FovPair {
                hfov_deg: 2.9,
                vfov_deg: 1.6,
            },
        }
    }
}

impl Default for FovCalibration {
    fn default() -> Self {
        Self::canon_vb_h47()
    }
}

/// Linear settle model: `clamp(distance_deg * ms_per_degree, min_ms, max_ms)`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SettleCalibration {
    pub ms_per_degree: f64,
    pub min_ms: u64,
    pub max_ms: u64,
}

impl Default for SettleCalibration {
    fn default() -> Self {
        Self {
            ms_per_degree: 50.0,
            min_ms: 1_000,
            max_ms: 3_000,
        }
    }
}

/// Normalized axis speeds sent with every absolute move. Each lies in (0, 1].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MoveSpeed {
    pub pan: f64,
    pub tilt: f64,
    pub zoom: f64,
}

impl Default for MoveSpeed {
    fn default() -> Self {
        Self {
            pan: 0.5,
            tilt: 0.5,
            zoom: 0.5,
        }
    }
}

/// What to do with clicks outside the image and targets outside [-1, 1].
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "kebab-case")]
pub enum RangePolicy {
    /// Reject before any move is issued.
    Strict,
    /// Pass values through; the hardware decides.
    #[default]
    Extrapolate,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct TargetingConfig {
    #[serde(default)]
    pub fov: FovCalibration,
    #[serde(default)]
    pub settle: SettleCalibration,
    #[serde(default)]
    pub speed: MoveSpeed,
    #[serde(default)]
    pub range_policy: RangePolicy,
}

impl TargetingConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (name, value) in [
            ("fov.wide.hfovDeg", self.fov.wide.hfov_deg),
            ("fov.wide.vfovDeg", self.fov.wide.vfov_deg),
            ("fov.tele.hfovDeg", self.fov.tele.hfov_deg),
            ("fov.tele.vfovDeg", self.fov.tele.vfov_deg),
        ] {
            if !(value.is_finite() && value > 0.0) {
                return Err(ConfigError::Invalid(format!(
                    "{name} must be a positive number of degrees, got {value}"
                )));
            }
        }

        // FOV must not grow as the camera zooms in.
        if self.fov.tele.hfov_deg > self.fov.wide.hfov_deg
            || self.fov.tele.vfov_deg > self.fov.wide.vfov_deg
        {
            return Err(ConfigError::Invalid(format!(
                "fov.tele ({}, {}) must not exceed fov.wide ({}, {})",
                self.fov.tele.hfov_deg,
                self.fov.tele.vfov_deg,
                self.fov.wide.hfov_deg,
                self.fov.wide.vfov_deg
            )));
        }

        let settle = &self.settle;
        if !(settle.ms_per_degree.is_finite() && settle.ms_per_degree >= 0.0) {
            return Err(ConfigError::Invalid(format!(
                "settle.msPerDegree must be non-negative, got {}",
                settle.ms_per_degree
            )));
        }
        if settle.min_ms == 0 {
            return Err(ConfigError::Invalid("settle.minMs must be positive".to_string()));
        }
        if settle.min_ms > settle.max_ms {
            return Err(ConfigError::Invalid(format!(
                "settle.minMs ({}) exceeds settle.maxMs ({})",
                settle.min_ms, settle.max_ms
            )));
        }

        for (name, value) in [
            ("speed.pan", self.speed.pan),
            ("speed.tilt", self.speed.tilt),
            ("speed.zoom", self.speed.zoom),
        ] {
            if !(value > 0.0 && value <= 1.0) {
                return Err(ConfigError::Invalid(format!(
                    "{name} must be in (0, 1], got {value}"
                )));
            }
        }

        Ok(())
    }
}

/// Connection settings for an ONVIF camera.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CameraConfig {
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
    /// Path of the device service, or a full URL when it starts with `http`.
    #[serde(default = "default_device_path")]
    pub device_path: String,
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,
}

fn default_port() -> u16 {
    80
}

fn default_device_path() -> String {
    "/onvif/device_service".to_string()
}

fn default_request_timeout_ms() -> u64 {
    5_000
}

fn default_snapshot_path() -> PathBuf {
    PathBuf::from("snapshots/gui_snapshot.jpg")
}

fn default_true() -> bool {
    true
}

fn default_schema_version() -> u32 {
    SCHEMA_VERSION
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            host: "192.168.1.100".to_string(),
            port: default_port(),
            username: None,
            password: None,
            device_path: default_device_path(),
            request_timeout_ms: default_request_timeout_ms(),
        }
    }
}

impl CameraConfig {
    pub fn device_service_url(&self) -> String {
        if self.device_path.starts_with("http") {
            return self.device_path.clone();
        }
        format!("http://{}:{}{}", self.host, self.port, self.device_path)
    }
}

/// Root of config.json.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppConfig {
    #[serde(default = "default_schema_version")]
    pub schema_version: u32,
    #[serde(default)]
    pub camera: CameraConfig,
    #[serde(default)]
    pub targeting: TargetingConfig,
    #[serde(default = "default_snapshot_path")]
    pub snapshot_path: PathBuf,
    #[serde(default = "default_true")]
    pub auto_refresh_after_click: bool,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            schema_version: SCHEMA_VERSION,
            camera: CameraConfig::default(),
            targeting: TargetingConfig::default(),
            snapshot_path: default_snapshot_path(),
            auto_refresh_after_click: true,
        }
    }
}

impl AppConfig {
    pub fn from_json(raw: &str, origin: &Path) -> Result<Self, ConfigError> {
        let config: AppConfig = serde_json::from_str(raw).map_err(|source| ConfigError::Parse {
            path: origin.to_path_buf(),
            source,
        })?;

        if config.schema_version != SCHEMA_VERSION {
            return Err(ConfigError::UnsupportedSchema {
                expected: SCHEMA_VERSION,
                found: config.schema_version,
            });
        }
        config.targeting.validate()?;
        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json(&raw, path)
    }

    /// Loads `path` when given; otherwise the per-user config file, or the
    /// built-in defaults when that file does not exist.
    pub fn load_or_default(path: Option<&Path>) -> Result<Self, ConfigError> {
        if let Some(path) = path {
            log::info!("config: path={}", path.display());
            return Self::load(path);
        }

        match default_config_file() {
            Some(path) if path.is_file() => {
                log::info!("config: path={}", path.display());
                Self::load(&path)
            }
            _ => {
                log::info!("config: no config file found, using built-in defaults");
                Ok(Self::default())
            }
        }
    }
}

/// `{config_dir}/ptzclick/config.json`.
pub fn default_config_file() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join(APP_DIR_NAME).join(CONFIG_FILE_NAME))
}
