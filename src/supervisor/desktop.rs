//! Virtual display and remote-framebuffer stack
//!
//! Xvfb provides the display, openbox/pcmanfm/tint2/xterm make it usable,
//! and x11vnc exposes it to VNC clients.

use std::time::Duration;

use tokio::process::Command;

use super::process::ProcessSpec;
use super::Stage;
use crate::config::{AppConfig, Resolution};

/// Time for Xvfb to accept clients
const XVFB_SETTLE: Duration = Duration::from_secs(2);

/// Time for the window manager to take the display
const WINDOW_MANAGER_SETTLE: Duration = Duration::from_secs(1);

/// Time for the desktop session before x11vnc attaches
const DESKTOP_SETTLE: Duration = Duration::from_secs(2);

/// Launch plan for the desktop stack
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DesktopPlan {
    pub display: String,
    pub resolution: Resolution,
}

impl DesktopPlan {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            display: config.display.clone(),
            resolution: config
                .resolution()
                .unwrap_or(Resolution::new(1920, 1080, Resolution::DEFAULT_DEPTH)),
        }
    }

    /// Whether an Xvfb for this display is already up
    pub async fn xvfb_running(&self) -> bool {
        Command::new("pgrep")
            .args(["-f", &format!("Xvfb {}", self.display)])
            .output()
            .await
            .map(|out| out.status.success())
            .unwrap_or(false)
    }

    /// All stages, virtual display first
    pub fn stages(&self) -> Vec<Stage> {
        let mut stages = vec![Stage::new(self.xvfb(), XVFB_SETTLE)];
        stages.extend(self.stages_without_xvfb());
        stages
    }

    /// Stages for an already running display
    pub fn stages_without_xvfb(&self) -> Vec<Stage> {
        let session = |program: &str| ProcessSpec::new(program).env("DISPLAY", self.display.as_str());

        let mut stages = vec![Stage::new(session("openbox"), WINDOW_MANAGER_SETTLE)];
        stages.push(Stage::new(
            session("pcmanfm").arg("--desktop").optional(),
            Duration::ZERO,
        ));
        stages.push(Stage::new(session("tint2").optional(), Duration::ZERO));
        stages.push(Stage::new(session("xterm").optional(), DESKTOP_SETTLE));
        stages.push(Stage::new(
            ProcessSpec::new("x11vnc").args(["-display", self.display.as_str(), "-forever"]),
            Duration::ZERO,
        ));
        stages
    }

    fn xvfb(&self) -> ProcessSpec {
        ProcessSpec::new("Xvfb")
            .arg(self.display.as_str())
            .args(["-screen".to_string(), "0".to_string(), self.resolution.to_string()])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn plan() -> DesktopPlan {
        DesktopPlan::from_config(&AppConfig::default())
    }

    #[test]
    fn test_stage_order() {
        let programs: Vec<_> = plan()
            .stages()
            .into_iter()
            .map(|s| s.spec.program)
            .collect();

        assert_eq!(
            programs,
            vec!["Xvfb", "openbox", "pcmanfm", "tint2", "xterm", "x11vnc"]
        );
    }

    #[test]
    fn test_xvfb_command() {
        let stages = plan().stages();

        assert_eq!(stages[0].spec.command_line(), "Xvfb :1 -screen 0 1920x1080x24");
        assert_eq!(stages[0].settle, XVFB_SETTLE);
    }

    #[test]
    fn test_required_components() {
        let required: Vec<_> = plan()
            .stages()
            .into_iter()
            .filter(|s| s.spec.required)
            .map(|s| s.spec.program)
            .collect();

        assert_eq!(required, vec!["Xvfb", "openbox", "x11vnc"]);
    }

    #[test]
    fn test_session_processes_get_display() {
        let stages = plan().stages_without_xvfb();

        assert_eq!(stages[0].spec.program, "openbox");
        assert!(stages[0]
            .spec
            .env
            .contains(&("DISPLAY".to_string(), ":1".to_string())));
        assert_eq!(
            stages.last().map(|s| s.spec.command_line()),
            Some("x11vnc -display :1 -forever".to_string())
        );
    }
}
