//! Single managed child process

use std::process::{ExitStatus, Stdio};

use tokio::process::{Child, Command};

use super::SupervisorError;

/// Lifecycle state of a managed process
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessState {
    /// Not launched yet
    NotStarted,
    /// Spawned and not known to have exited
    Running,
    /// Failed to launch or exited unsuccessfully
    Failed,
    /// Stopped by us or exited successfully
    Stopped,
}

/// What to launch
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessSpec {
    pub program: String,
    pub args: Vec<String>,
    pub env: Vec<(String, String)>,
    /// Whether a launch failure should abort the plan
    pub required: bool,
    /// Forward stdout/stderr to ours instead of discarding them
    pub inherit_output: bool,
}

impl ProcessSpec {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            env: Vec::new(),
            required: true,
            inherit_output: false,
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, A>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = A>,
        A: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.push((key.into(), value.into()));
        self
    }

    /// Launch failure is logged instead of aborting the plan
    pub fn optional(mut self) -> Self {
        self.required = false;
        self
    }

    pub fn inherit_output(mut self) -> Self {
        self.inherit_output = true;
        self
    }

    /// Shell-style rendering for logs
    pub fn command_line(&self) -> String {
        std::iter::once(self.program.as_str())
            .chain(self.args.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(" ")
    }

    fn command(&self) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args)
            .envs(self.env.iter().map(|(k, v)| (k, v)))
            .stdin(Stdio::null())
            .kill_on_drop(true);
        if !self.inherit_output {
            cmd.stdout(Stdio::null()).stderr(Stdio::null());
        }
        cmd
    }
}

/// A child process and its lifecycle state
#[derive(Debug)]
pub struct ManagedProcess {
    spec: ProcessSpec,
    child: Option<Child>,
    state: ProcessState,
}

impl ManagedProcess {
    pub fn new(spec: ProcessSpec) -> Self {
        Self {
            spec,
            child: None,
            state: ProcessState::NotStarted,
        }
    }

    pub fn spec(&self) -> &ProcessSpec {
        &self.spec
    }

    pub fn state(&self) -> ProcessState {
        self.state
    }

    /// OS process id while running
    pub fn id(&self) -> Option<u32> {
        self.child.as_ref().and_then(Child::id)
    }

    /// Launch the process
    ///
    /// Starting an already running process is a no-op.
    pub fn start(&mut self) -> Result<(), SupervisorError> {
        if self.state == ProcessState::Running {
            return Ok(());
        }

        match self.spec.command().spawn() {
            Ok(child) => {
                tracing::info!(
                    command = %self.spec.command_line(),
                    pid = ?child.id(),
                    "Process started"
                );
                self.child = Some(child);
                self.state = ProcessState::Running;
                Ok(())
            }
            Err(source) => {
                self.state = ProcessState::Failed;
                Err(SupervisorError::Spawn {
                    program: self.spec.program.clone(),
                    source,
                })
            }
        }
    }

    /// Update the state if the process has exited
    pub fn poll(&mut self) -> ProcessState {
        if let Some(child) = self.child.as_mut() {
            if let Ok(Some(status)) = child.try_wait() {
                self.record_exit(status);
            }
        }
        self.state
    }

    /// Wait for the process to exit on its own
    pub async fn wait(&mut self) -> Result<ProcessState, SupervisorError> {
        if let Some(child) = self.child.as_mut() {
            let status = child.wait().await.map_err(|source| SupervisorError::Control {
                program: self.spec.program.clone(),
                source,
            })?;
            self.record_exit(status);
        }
        Ok(self.state)
    }

    /// Kill the process and reap it
    pub async fn stop(&mut self) -> Result<(), SupervisorError> {
        let Some(mut child) = self.child.take() else {
            return Ok(());
        };

        if self.state == ProcessState::Running {
            if let Err(source) = child.kill().await {
                self.child = Some(child);
                return Err(SupervisorError::Control {
                    program: self.spec.program.clone(),
                    source,
                });
            }
            self.state = ProcessState::Stopped;
            tracing::info!(program = %self.spec.program, "Process stopped");
        }
        Ok(())
    }

    fn record_exit(&mut self, status: ExitStatus) {
        if self.state != ProcessState::Running {
            return;
        }
        if status.success() {
            self.state = ProcessState::Stopped;
            tracing::info!(program = %self.spec.program, status = %status, "Process exited");
        } else {
            self.state = ProcessState::Failed;
            tracing::warn!(program = %self.spec.program, status = %status, "Process failed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_spec_builder() {
        let spec = ProcessSpec::new("x11vnc")
            .args(["-display", ":1"])
            .arg("-forever")
            .env("DISPLAY", ":1")
            .optional();

        assert_eq!(spec.command_line(), "x11vnc -display :1 -forever");
        assert_eq!(spec.env, vec![("DISPLAY".to_string(), ":1".to_string())]);
        assert!(!spec.required);
        assert!(!spec.inherit_output);
    }

    #[test]
    fn test_new_process_not_started() {
        let process = ManagedProcess::new(ProcessSpec::new("true"));

        assert_eq!(process.state(), ProcessState::NotStarted);
        assert!(process.id().is_none());
    }

    #[tokio::test]
    async fn test_spawn_failure() {
        let mut process = ManagedProcess::new(ProcessSpec::new("remoter-test-missing-binary"));

        let result = process.start();

        assert!(matches!(result, Err(SupervisorError::Spawn { .. })));
        assert_eq!(process.state(), ProcessState::Failed);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_start_and_stop() {
        let mut process = ManagedProcess::new(ProcessSpec::new("sleep").arg("5"));

        process.start().unwrap();
        assert_eq!(process.state(), ProcessState::Running);
        assert!(process.id().is_some());

        process.stop().await.unwrap();
        assert_eq!(process.state(), ProcessState::Stopped);
        // Stopping twice is harmless
        process.stop().await.unwrap();
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_exit_status_recorded() {
        let mut ok = ManagedProcess::new(ProcessSpec::new("true"));
        ok.start().unwrap();
        assert_eq!(ok.wait().await.unwrap(), ProcessState::Stopped);

        let mut failed = ManagedProcess::new(ProcessSpec::new("false"));
        failed.start().unwrap();
        assert_eq!(failed.wait().await.unwrap(), ProcessState::Failed);
    }
}
