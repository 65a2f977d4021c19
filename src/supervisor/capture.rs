//! ffmpeg screen-grab pipeline
//!
//! Grabs the X display with `x11grab`, encodes MPEG-1 video and pushes the
//! raw elementary stream to the relay's ingest path over HTTP.

use std::sync::OnceLock;

use regex::Regex;
use tokio::process::Command;

use super::process::ProcessSpec;
use super::SupervisorError;
use crate::config::{AppConfig, Resolution};

/// Geometry used when neither the display nor the settings provide one
pub const FALLBACK_RESOLUTION: Resolution = Resolution {
    width: 1366,
    height: 768,
    depth: Resolution::DEFAULT_DEPTH,
};

/// Video bitrate passed to the encoder
pub const VIDEO_BITRATE: &str = "800k";

/// Screen geometry reported by `xdpyinfo`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScreenInfo {
    pub resolution: Resolution,
}

impl ScreenInfo {
    /// Parse `xdpyinfo` output
    ///
    /// Requires the `dimensions:` line; the depth defaults to 24 when the
    /// `depth of root window:` line is missing.
    pub fn parse(output: &str) -> Result<Self, SupervisorError> {
        static DIMENSIONS: OnceLock<Option<Regex>> = OnceLock::new();
        static DEPTH: OnceLock<Option<Regex>> = OnceLock::new();

        let dimensions = DIMENSIONS
            .get_or_init(|| Regex::new(r"dimensions:\s+(\d+)x(\d+) pixels").ok())
            .as_ref();
        let depth = DEPTH
            .get_or_init(|| Regex::new(r"depth of root window:\s+(\d+)").ok())
            .as_ref();

        let parse_error = || SupervisorError::Parse {
            tool: "xdpyinfo".into(),
            what: "screen resolution".into(),
        };

        let caps = dimensions
            .and_then(|re| re.captures(output))
            .ok_or_else(parse_error)?;
        let width = caps[1].parse().map_err(|_| parse_error())?;
        let height = caps[2].parse().map_err(|_| parse_error())?;
        let depth = depth
            .and_then(|re| re.captures(output))
            .and_then(|c| c[1].parse().ok())
            .unwrap_or(Resolution::DEFAULT_DEPTH);

        Ok(Self {
            resolution: Resolution::new(width, height, depth),
        })
    }

    /// Query the X server for its geometry
    pub async fn probe(display: &str) -> Result<Self, SupervisorError> {
        let output = Command::new("xdpyinfo")
            .args(["-display", display])
            .output()
            .await
            .map_err(|source| SupervisorError::Spawn {
                program: "xdpyinfo".into(),
                source,
            })?;

        if !output.status.success() {
            return Err(SupervisorError::Parse {
                tool: "xdpyinfo".into(),
                what: format!("display {display}"),
            });
        }
        Self::parse(&String::from_utf8_lossy(&output.stdout))
    }
}

/// Resolved capture parameters
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CapturePlan {
    pub display: String,
    pub resolution: Resolution,
    pub framerate: u32,
    pub port: u16,
}

impl CapturePlan {
    /// Build a plan from settings alone, without probing the display
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            display: config.display.clone(),
            resolution: config.resolution().unwrap_or(FALLBACK_RESOLUTION),
            framerate: config.framerate,
            port: config.port,
        }
    }

    /// Build a plan against the live display
    ///
    /// `:0.0` falls back to `:0` when unreachable. The detected geometry wins
    /// over the configured one.
    pub async fn resolve(config: &AppConfig) -> Self {
        let mut plan = Self::from_config(config);

        if plan.display == ":0.0" && ScreenInfo::probe(":0.0").await.is_err() {
            tracing::warn!("Cannot access display :0.0, trying :0");
            plan.display = ":0".into();
        }

        match ScreenInfo::probe(&plan.display).await {
            Ok(info) => plan.resolution = info.resolution,
            Err(e) => {
                tracing::warn!(
                    display = %plan.display,
                    error = %e,
                    resolution = %plan.resolution,
                    "Screen probe failed, using configured geometry"
                );
            }
        }
        plan
    }

    /// Relay URL ffmpeg pushes to
    pub fn ingest_url(&self) -> String {
        format!("http://localhost:{}/stream", self.port)
    }

    /// The ffmpeg invocation
    pub fn ffmpeg_spec(&self) -> ProcessSpec {
        ProcessSpec::new("ffmpeg")
            .args(["-video_size".to_string(), self.resolution.size()])
            .args(["-framerate".to_string(), self.framerate.to_string()])
            .args(["-f", "x11grab", "-i"])
            .arg(self.display.as_str())
            .args(["-vcodec", "mpeg1video", "-b:v", VIDEO_BITRATE])
            .args(["-f", "mpeg1video"])
            .arg(self.ingest_url())
            .inherit_output()
    }
}
