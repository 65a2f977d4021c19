//! External process supervision
//!
//! The relay consumes a byte stream produced by processes it does not
//! implement: a virtual X display, a desktop session, a remote-framebuffer
//! server and the ffmpeg screen-grab encoder. This module launches and stops
//! them and tracks each one through
//! `NotStarted → Running → {Stopped, Failed}`.
//!
//! - [`capture`]: ffmpeg screen grab pushed to the relay's ingest path
//! - [`desktop`]: Xvfb, window manager, panel, terminal and x11vnc

pub mod capture;
pub mod desktop;
pub mod process;

pub use capture::{CapturePlan, ScreenInfo};
pub use desktop::DesktopPlan;
pub use process::{ManagedProcess, ProcessSpec, ProcessState};

use std::time::Duration;

use futures::future::select_all;

use crate::config::AppConfig;

/// Error type for process supervision
#[derive(Debug, thiserror::Error)]
pub enum SupervisorError {
    /// The program could not be launched
    #[error("failed to start {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },
    /// Waiting on or signalling the process failed
    #[error("failed to control {program}: {source}")]
    Control {
        program: String,
        #[source]
        source: std::io::Error,
    },
    /// A helper tool produced output we could not understand
    #[error("could not parse {what} from {tool} output")]
    Parse { tool: String, what: String },
}

/// One launch step: a process plus the time it needs to settle
#[derive(Debug, Clone)]
pub struct Stage {
    pub spec: ProcessSpec,
    /// Pause after a successful start before launching the next stage
    pub settle: Duration,
}

impl Stage {
    pub fn new(spec: ProcessSpec, settle: Duration) -> Self {
        Self { spec, settle }
    }
}

/// A required process that ended on its own
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessExit {
    pub program: String,
    pub state: ProcessState,
}

/// Owns every process launched for this run
#[derive(Debug, Default)]
pub struct Supervisor {
    processes: Vec<ManagedProcess>,
}

impl Supervisor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Launch the stacks enabled in `config`
    ///
    /// The desktop stack starts first so the capture pipeline has a display to
    /// grab. The capture plan is resolved against the live display; when the
    /// detected geometry differs from `config` it is written back into
    /// `config` and `true` is returned so the caller can persist it.
    pub async fn start(&mut self, config: &mut AppConfig) -> crate::Result<bool> {
        let mut config_changed = false;

        if config.vnc_enabled() {
            let plan = DesktopPlan::from_config(config);
            if plan.xvfb_running().await {
                tracing::info!(display = %plan.display, "Virtual display already running");
                self.run_stages(plan.stages_without_xvfb()).await?;
            } else {
                self.run_stages(plan.stages()).await?;
            }
        }

        if config.ffmpeg_enabled() {
            let plan = CapturePlan::resolve(config).await;
            config_changed = config.apply_detected(&plan.display, plan.resolution);
            self.run_stages(vec![Stage::new(plan.ffmpeg_spec(), Duration::ZERO)])
                .await?;
        }

        Ok(config_changed)
    }

    /// Start stages in order
    ///
    /// A failing optional stage is logged and skipped; a failing required
    /// stage aborts the remaining ones.
    pub async fn run_stages(&mut self, stages: Vec<Stage>) -> crate::Result<()> {
        for stage in stages {
            let mut process = ManagedProcess::new(stage.spec);
            match process.start() {
                Ok(()) => {
                    self.processes.push(process);
                    if !stage.settle.is_zero() {
                        tokio::time::sleep(stage.settle).await;
                    }
                }
                Err(e) if !process.spec().required => {
                    tracing::warn!(error = %e, "Optional process failed to start");
                }
                Err(e) => return Err(e.into()),
            }
        }
        Ok(())
    }

    /// Processes launched so far
    pub fn processes(&self) -> &[ManagedProcess] {
        &self.processes
    }

    /// Refresh the state of every process from its exit status
    pub fn poll(&mut self) {
        for process in &mut self.processes {
            process.poll();
        }
    }

    /// Wait until a required process exits on its own
    ///
    /// The exit is recorded in that process's state. Never resolves while
    /// no required process is running.
    pub async fn watch(&mut self) -> ProcessExit {
        let waits: Vec<_> = self
            .processes
            .iter_mut()
            .filter(|p| p.spec().required && p.state() == ProcessState::Running)
            .map(|process| {
                Box::pin(async move {
                    let state = match process.wait().await {
                        Ok(state) => state,
                        Err(e) => {
                            tracing::warn!(error = %e, "Lost track of process");
                            ProcessState::Failed
                        }
                    };
                    ProcessExit {
                        program: process.spec().program.clone(),
                        state,
                    }
                })
            })
            .collect();

        if waits.is_empty() {
            return std::future::pending().await;
        }
        let (exit, _, _) = select_all(waits).await;
        exit
    }

    /// Stop every process, newest first
    pub async fn stop_all(&mut self) {
        for process in self.processes.iter_mut().rev() {
            if let Err(e) = process.stop().await {
                tracing::warn!(error = %e, "Failed to stop process");
            }
        }
    }
}
