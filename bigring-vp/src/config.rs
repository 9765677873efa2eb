//! Configuration management for the bigring-vp video player
//!
//! # Settings Sources Priority
//!
//! 1. Command-line arguments (`--port`, `--video-folder`, ...)
//! 2. Environment variables (`BIGRING_PORT`, `BIGRING_VIDEO_FOLDER`, `BIGRING_CONFIG`)
//! 3. TOML configuration file
//! 4. Built-in defaults (code constants)
//!
//! Command-line and environment values arrive together through clap as
//! [`ConfigOverrides`]; the video folder additionally goes through
//! [`bigring_common::config::resolve_video_folder`].

use crate::error::{Error, Result};
use crate::playback::controller::ControllerSettings;
use crate::playback::decoder::SyntheticVideo;
use bigring_common::config::{default_config_file, resolve_video_folder, VIDEO_FOLDER_ENV};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Default HTTP port
pub const DEFAULT_PORT: u16 = 5760;

/// Configuration loaded from the TOML file
///
/// Every key is optional.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct TomlConfig {
    #[serde(default = "default_port")]
    pub port: u16,

    /// Folder holding route videos
    #[serde(default)]
    pub video_folder: Option<PathBuf>,

    /// Route catalog (JSON), defaults to `routes.json` in the video folder
    #[serde(default)]
    pub routes_file: Option<PathBuf>,

    #[serde(default)]
    pub logging: LoggingConfig,

    #[serde(default)]
    pub playback: PlaybackConfig,

    #[serde(default)]
    pub simulation: SimulationConfig,

    #[serde(default)]
    pub decoder: DecoderConfig,
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,
}

/// Frame queue and tick configuration
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct PlaybackConfig {
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,

    #[serde(default = "default_low_watermark")]
    pub low_watermark: usize,

    #[serde(default = "default_frame_interval_ms")]
    pub frame_interval_ms: u64,
}

/// Simulated rider used when no sensor feeds the distance
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct SimulationConfig {
    #[serde(default = "default_speed_kmh")]
    pub speed_kmh: f64,
}

/// Synthetic decoder output
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct DecoderConfig {
    #[serde(default = "default_frame_width")]
    pub frame_width: u32,

    #[serde(default = "default_frame_height")]
    pub frame_height: u32,

    /// 0 selects the decoder's default length
    #[serde(default)]
    pub frame_count: u32,

    #[serde(default = "default_frame_rate")]
    pub frame_rate: f64,
}

fn default_port() -> u16 {
    DEFAULT_PORT
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_queue_capacity() -> usize {
    100
}

fn default_low_watermark() -> usize {
    50
}

fn default_frame_interval_ms() -> u64 {
    1000 / 30
}

fn default_speed_kmh() -> f64 {
    30.0
}

fn default_frame_width() -> u32 {
    64
}

fn default_frame_height() -> u32 {
    36
}

fn default_frame_rate() -> f64 {
    30.0
}

impl Default for TomlConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            video_folder: None,
            routes_file: None,
            logging: LoggingConfig::default(),
            playback: PlaybackConfig::default(),
            simulation: SimulationConfig::default(),
            decoder: DecoderConfig::default(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

impl Default for PlaybackConfig {
    fn default() -> Self {
        Self {
            queue_capacity: default_queue_capacity(),
            low_watermark: default_low_watermark(),
            frame_interval_ms: default_frame_interval_ms(),
        }
    }
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            speed_kmh: default_speed_kmh(),
        }
    }
}

impl Default for DecoderConfig {
    fn default() -> Self {
        Self {
            frame_width: default_frame_width(),
            frame_height: default_frame_height(),
            frame_count: 0,
            frame_rate: default_frame_rate(),
        }
    }
}

impl PlaybackConfig {
    pub fn controller_settings(&self) -> ControllerSettings {
        ControllerSettings {
            queue_capacity: self.queue_capacity,
            low_watermark: self.low_watermark,
            frame_interval: Duration::from_millis(self.frame_interval_ms),
        }
    }
}

impl DecoderConfig {
    pub fn synthetic_video(&self) -> SyntheticVideo {
        SyntheticVideo {
            frame_count: self.frame_count,
            frame_rate: self.frame_rate,
            width: self.frame_width,
            height: self.frame_height,
        }
    }
}

impl TomlConfig {
    /// Parse and validate TOML text
    pub fn from_toml_str(toml_str: &str) -> Result<Self> {
        let config: TomlConfig = toml::from_str(toml_str)
            .map_err(|e| Error::Config(format!("Failed to parse TOML: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a TOML file
    pub fn load(path: &Path) -> Result<Self> {
        let toml_str = std::fs::read_to_string(path).map_err(|e| {
            Error::Config(format!("Failed to read config file {}: {}", path.display(), e))
        })?;
        Self::from_toml_str(&toml_str)
    }

    pub fn validate(&self) -> Result<()> {
        let playback = &self.playback;
        if playback.queue_capacity == 0 {
            return Err(Error::Config("playback.queue_capacity must be > 0".to_string()));
        }
        if playback.low_watermark >= playback.queue_capacity {
            return Err(Error::Config(format!(
                "playback.low_watermark ({}) must be below playback.queue_capacity ({})",
                playback.low_watermark, playback.queue_capacity
            )));
        }
        if playback.frame_interval_ms == 0 {
            return Err(Error::Config("playback.frame_interval_ms must be > 0".to_string()));
        }
        if !(self.simulation.speed_kmh.is_finite() && self.simulation.speed_kmh >= 0.0) {
            return Err(Error::Config(format!(
                "simulation.speed_kmh must be a non-negative number, got {}",
                self.simulation.speed_kmh
            )));
        }
        if self.decoder.frame_width == 0 || self.decoder.frame_height == 0 {
            return Err(Error::Config("decoder frame size must be non-zero".to_string()));
        }
        if !(self.decoder.frame_rate.is_finite() && self.decoder.frame_rate > 0.0) {
            return Err(Error::Config("decoder.frame_rate must be > 0".to_string()));
        }
        Ok(())
    }
}

/// Values given on the command line or through environment variables
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub port: Option<u16>,
    pub video_folder: Option<PathBuf>,
    pub routes_file: Option<PathBuf>,
    pub speed_kmh: Option<f64>,
    pub log_level: Option<String>,
}

/// Resolved application configuration
#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub video_folder: PathBuf,
    pub routes_file: PathBuf,
    pub log_level: String,
    pub playback: ControllerSettings,
    pub speed_kmh: f64,
    pub decoder: SyntheticVideo,
    /// TOML file the configuration was read from
    pub config_file: Option<PathBuf>,
}

impl Config {
    /// Load configuration
    ///
    /// An explicitly given `config_file` must exist. Without one, the default
    /// location is used when present and built-in defaults otherwise.
    pub fn load(config_file: Option<&Path>, overrides: ConfigOverrides) -> Result<Self> {
        let (toml_config, config_file) = match config_file {
            Some(path) => (TomlConfig::load(path)?, Some(path.to_path_buf())),
            None => match default_config_file() {
                Ok(path) => (TomlConfig::load(&path)?, Some(path)),
                Err(_) => (TomlConfig::default(), None),
            },
        };
        Self::resolve(toml_config, config_file, overrides)
    }

    /// Merge a parsed TOML configuration with overrides
    pub fn resolve(
        toml_config: TomlConfig,
        config_file: Option<PathBuf>,
        overrides: ConfigOverrides,
    ) -> Result<Self> {
        let video_folder = resolve_video_folder(
            overrides.video_folder.as_deref(),
            VIDEO_FOLDER_ENV,
            toml_config.video_folder.as_deref(),
        );
        let routes_file = overrides
            .routes_file
            .or(toml_config.routes_file)
            .unwrap_or_else(|| video_folder.join("routes.json"));

        let speed_kmh = overrides.speed_kmh.unwrap_or(toml_config.simulation.speed_kmh);
        if !(speed_kmh.is_finite() && speed_kmh >= 0.0) {
            return Err(Error::Config(format!(
                "speed must be a non-negative number, got {}",
                speed_kmh
            )));
        }

        Ok(Self {
            port: overrides.port.unwrap_or(toml_config.port),
            video_folder,
            routes_file,
            log_level: overrides.log_level.unwrap_or(toml_config.logging.level),
            playback: toml_config.playback.controller_settings(),
            speed_kmh,
            decoder: toml_config.decoder.synthetic_video(),
            config_file,
        })
    }
}
