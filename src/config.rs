//! Persisted settings
//!
//! Settings live in a JSON file (`~/.remoter.json` by default). A missing
//! file is created with defaults; missing fields fall back to defaults. Only
//! `port` reaches the relay core, everything else is handed to the
//! [`supervisor`](crate::supervisor).

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::server::config::DEFAULT_PORT;

/// File name of the settings file inside the home directory
pub const CONFIG_FILE_NAME: &str = ".remoter.json";

/// Primary capture backend
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum CaptureMode {
    /// Virtual display + desktop + x11vnc remote framebuffer
    Vnc,
    /// Screen grab encoded by ffmpeg and pushed to the relay
    #[default]
    Ffmpeg,
}

/// Application settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Primary backend
    pub mode: CaptureMode,
    /// Also run the remote-framebuffer stack
    pub vnc: bool,
    /// Also run the ffmpeg capture pipeline
    pub ffmpeg: bool,
    /// X display, e.g. ":1"
    pub display: String,
    /// Screen geometry, `WIDTHxHEIGHT[xDEPTH]`
    pub res: String,
    /// Relay listen port
    pub port: u16,
    /// Capture frame rate
    pub framerate: u32,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            mode: CaptureMode::default(),
            vnc: false,
            ffmpeg: false,
            display: ":1".into(),
            res: "1920x1080x24".into(),
            port: DEFAULT_PORT,
            framerate: 25,
        }
    }
}

impl AppConfig {
    /// Default settings path (`$HOME/.remoter.json`)
    pub fn default_path() -> Result<PathBuf> {
        dirs::home_dir()
            .map(|home| home.join(CONFIG_FILE_NAME))
            .ok_or_else(|| Error::Config("cannot determine home directory".into()))
    }

    /// Load settings, creating the file with defaults when it does not exist
    pub fn load_or_init(path: &Path) -> Result<Self> {
        match std::fs::read_to_string(path) {
            Ok(text) => Self::from_json(&text)
                .map_err(|e| Error::Config(format!("{}: {e}", path.display()))),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                let config = Self::default();
                if let Err(e) = config.save(path) {
                    tracing::warn!(path = %path.display(), error = %e, "Could not write default settings");
                } else {
                    tracing::info!(path = %path.display(), "Wrote default settings");
                }
                Ok(config)
            }
            Err(e) => Err(Error::Io(e)),
        }
    }

    /// Parse settings from JSON
    pub fn from_json(text: &str) -> std::result::Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }

    /// Write settings as pretty JSON
    pub fn save(&self, path: &Path) -> Result<()> {
        let text = serde_json::to_string_pretty(self)
            .map_err(|e| Error::Config(e.to_string()))?;
        std::fs::write(path, text)?;
        Ok(())
    }

    /// Parsed `res`
    pub fn resolution(&self) -> Option<Resolution> {
        self.res.parse().ok()
    }

    /// Whether the remote-framebuffer stack should run
    pub fn vnc_enabled(&self) -> bool {
        self.vnc || self.mode == CaptureMode::Vnc
    }

    /// Whether the capture pipeline should run
    pub fn ffmpeg_enabled(&self) -> bool {
        self.ffmpeg || self.mode == CaptureMode::Ffmpeg
    }

    /// Record the detected display and geometry
    ///
    /// Returns `true` if anything changed and the file should be saved.
    pub fn apply_detected(&mut self, display: &str, resolution: Resolution) -> bool {
        let res = resolution.to_string();
        let changed = self.display != display || self.res != res;
        self.display = display.to_string();
        self.res = res;
        changed
    }
}

/// Screen geometry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Resolution {
    pub width: u32,
    pub height: u32,
    /// Color depth in bits
    pub depth: u32,
}

impl Resolution {
    pub const DEFAULT_DEPTH: u32 = 24;

    pub fn new(width: u32, height: u32, depth: u32) -> Self {
        Self {
            width,
            height,
            depth,
        }
    }

    /// `WIDTHxHEIGHT` without depth, as ffmpeg's `-video_size` expects
    pub fn size(&self) -> String {
        format!("{}x{}", self.width, self.height)
    }
}

impl fmt::Display for Resolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}x{}", self.width, self.height, self.depth)
    }
}

impl FromStr for Resolution {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let invalid = || Error::Config(format!("invalid resolution: {s:?}"));
        let mut parts = s.trim().split('x');

        let width = parts.next().and_then(|p| p.parse().ok()).ok_or_else(invalid)?;
        let height = parts.next().and_then(|p| p.parse().ok()).ok_or_else(invalid)?;
        let depth = match parts.next() {
            Some(p) => p.parse().map_err(|_| invalid())?,
            None => Self::DEFAULT_DEPTH,
        };
        if parts.next().is_some() || width == 0 || height == 0 {
            return Err(invalid());
        }

        Ok(Self::new(width, height, depth))
    }
}
