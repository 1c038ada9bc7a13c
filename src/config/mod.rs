//! Configuration module for ascope-rs
//!
//! Settings are read from a TOML file with one table per concern:
//!
//! ```toml
//! [link]
//! device = "/dev/ttyACM0"
//! baud_rate = 9600
//!
//! [acquisition]
//! wait_timeout_ms = 5000
//! interpolation = "sinc"
//!
//! [display]
//! v_min = -5.0
//! v_max = 5.0
//!
//! [export]
//! dump_path = "out.dump"
//! format = "text"
//!
//! [logging]
//! filter = "info,ascope_rs=debug"
//! ```
//!
//! Every key is optional; missing keys take their defaults.
//!
//! # Config Location
//!
//! Unless a path is given explicitly, the file is looked up in the
//! platform-appropriate config directory:
//! - **Linux**: `~/.config/dev.ascope.ascope-rs/config.toml`
//! - **macOS**: `~/Library/Application Support/dev.ascope.ascope-rs/config.toml`
//! - **Windows**: `%APPDATA%\dev.ascope.ascope-rs\config.toml`

use crate::error::{Result, ScopeError};
use crate::export::DumpFormat;
use crate::reactor::ReactorSettings;
use crate::types::{Interpolation, VoltageRange, ZoomState, MAX_ZOOM_POWER};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Application identifier for config directories
pub const APP_ID: &str = "dev.ascope.ascope-rs";

/// Config filename
pub const CONFIG_FILE: &str = "config.toml";

/// Default serial device
pub const DEFAULT_DEVICE: &str = "/dev/ttyACM0";

/// Default line speed of the instrument
pub const DEFAULT_BAUD_RATE: u32 = 9600;

/// Default wait timeout in milliseconds
pub const DEFAULT_WAIT_TIMEOUT_MS: u64 = 5000;

/// Default log filter
pub const DEFAULT_LOG_FILTER: &str = "info,ascope_rs=debug";

/// Path of the config file in the platform config directory
pub fn default_config_path() -> Option<PathBuf> {
    dirs_next::config_dir().map(|p| p.join(APP_ID).join(CONFIG_FILE))
}

// ==================== Link Config ====================

/// Instrument link settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LinkConfig {
    /// Serial device path
    pub device: String,

    /// Line speed
    pub baud_rate: u32,

    /// Length of a single blocking read on the port, in milliseconds
    pub read_timeout_ms: u64,

    /// Use the built-in simulated instrument instead of a serial port
    pub simulate: bool,
}

impl Default for LinkConfig {
    fn default() -> Self {
        Self {
            device: DEFAULT_DEVICE.to_string(),
            baud_rate: DEFAULT_BAUD_RATE,
            read_timeout_ms: 100,
            simulate: false,
        }
    }
}

// ==================== Acquisition Settings ====================

/// Timing and initial display settings of the acquisition loop
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AcquisitionSettings {
    /// Time without any input before the trace is marked stale
    pub wait_timeout_ms: u64,

    /// Time allowed for a started frame to complete (0 = no limit)
    pub frame_deadline_ms: u64,

    /// Zoom power at startup
    pub initial_zoom_power: u8,

    /// Interpolation at startup
    pub interpolation: Interpolation,
}

impl Default for AcquisitionSettings {
    fn default() -> Self {
        Self {
            wait_timeout_ms: DEFAULT_WAIT_TIMEOUT_MS,
            frame_deadline_ms: 2000,
            initial_zoom_power: 0,
            interpolation: Interpolation::Sinc,
        }
    }
}

// ==================== Display Config ====================

/// Display settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DisplayConfig {
    /// Voltage for ADC reading 0
    pub v_min: f64,

    /// Voltage for ADC reading 255
    pub v_max: f64,

    /// Horizontal graticule divisions on each side of the centre
    pub divisions_x: u32,

    /// Vertical graticule divisions on each side of the centre
    pub divisions_y: u32,

    /// Log snapshots instead of opening a window
    pub headless: bool,
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            v_min: -5.0,
            v_max: 5.0,
            divisions_x: 5,
            divisions_y: 4,
            headless: false,
        }
    }
}

// ==================== Export Config ====================

/// Raw buffer export settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExportConfig {
    /// Dump file path
    pub dump_path: PathBuf,

    /// Dump file format
    pub format: DumpFormat,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            dump_path: PathBuf::from("out.dump"),
            format: DumpFormat::Text,
        }
    }
}

// ==================== Logging Config ====================

/// Logging settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// `tracing_subscriber::EnvFilter` directives; `RUST_LOG` takes precedence
    pub filter: String,

    /// Also write logs to this file
    pub file: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: DEFAULT_LOG_FILTER.to_string(),
            file: None,
        }
    }
}

// ==================== App Config ====================

/// Complete application configuration
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub link: LinkConfig,
    pub acquisition: AcquisitionSettings,
    pub display: DisplayConfig,
    pub export: ExportConfig,
    pub logging: LoggingConfig,
}

impl AppConfig {
    /// Parse a config from TOML text
    pub fn from_toml(content: &str) -> Result<Self> {
        toml::from_str(content)
            .map_err(|e| ScopeError::Config(format!("Failed to parse config: {}", e)))
    }

    /// Load a config file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            ScopeError::Config(format!("Failed to read {}: {}", path.display(), e))
        })?;
        Self::from_toml(&content)
    }

    /// Load `explicit` if given, otherwise the default config file if it
    /// exists, otherwise the defaults
    pub fn load_or_default(explicit: Option<&Path>) -> Result<Self> {
        if let Some(path) = explicit {
            return Self::load(path);
        }
        match default_config_path() {
            Some(path) if path.exists() => {
                tracing::debug!("Loading config from {}", path.display());
                Self::load(&path)
            }
            _ => Ok(Self::default()),
        }
    }

    /// Write the config as TOML
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| ScopeError::Serialization(format!("Failed to serialize config: {}", e)))?;
        std::fs::write(path.as_ref(), content)
            .map_err(|e| ScopeError::Config(format!("Failed to write config: {}", e)))
    }

    /// Reject settings the application cannot run with
    pub fn validate(&self) -> Result<()> {
        if !(self.display.v_min < self.display.v_max) {
            return Err(ScopeError::Config(format!(
                "display.v_min ({}) must be below display.v_max ({})",
                self.display.v_min, self.display.v_max
            )));
        }
        if self.link.baud_rate == 0 {
            return Err(ScopeError::Config("link.baud_rate must not be zero".into()));
        }
        if self.acquisition.wait_timeout_ms == 0 {
            return Err(ScopeError::Config(
                "acquisition.wait_timeout_ms must not be zero".into(),
            ));
        }
        if self.acquisition.initial_zoom_power > MAX_ZOOM_POWER {
            return Err(ScopeError::Config(format!(
                "acquisition.initial_zoom_power must be at most {}",
                MAX_ZOOM_POWER
            )));
        }
        if self.display.divisions_x == 0 || self.display.divisions_y == 0 {
            return Err(ScopeError::Config("graticule divisions must not be zero".into()));
        }
        Ok(())
    }

    /// Input voltage range
    pub fn voltage_range(&self) -> VoltageRange {
        VoltageRange {
            v_min: self.display.v_min,
            v_max: self.display.v_max,
        }
    }

    /// Zoom state at startup
    pub fn initial_zoom(&self) -> ZoomState {
        ZoomState::new(
            self.acquisition.initial_zoom_power,
            self.acquisition.interpolation,
        )
    }

    /// Reactor timing and export settings
    pub fn reactor_settings(&self) -> ReactorSettings {
        ReactorSettings {
            wait_timeout: Duration::from_millis(self.acquisition.wait_timeout_ms),
            frame_deadline: match self.acquisition.frame_deadline_ms {
                0 => None,
                ms => Some(Duration::from_millis(ms)),
            },
            dump_path: self.export.dump_path.clone(),
            dump_format: self.export.format,
        }
    }
}
