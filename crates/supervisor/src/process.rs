use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use fleetd_domain::config::ProcessSpec;
use fleetd_domain::ServiceKind;
use serde_json::{Map, Value};
use tokio::process::{Child, Command};
use tokio::time::timeout;
use tracing::{debug, info, warn};

use crate::backend::{LaunchContext, ServiceBackend};
use crate::error::{SupervisorError, SupervisorResult};

const KILL_WAIT: Duration = Duration::from_secs(2);

/// Runs the service as an OS child process, launched as
/// `<program> <args..> --config-file <configPath>` with the service root as
/// working directory.
pub struct ProcessBackend {
    service: ServiceKind,
    spec: ProcessSpec,
    grace: Duration,
    child: Option<Child>,
    pid: Option<u32>,
}

impl ProcessBackend {
    pub fn new(service: ServiceKind, spec: ProcessSpec, grace: Duration) -> Self {
        Self {
            service,
            spec,
            grace,
            child: None,
            pid: None,
        }
    }

    /// PID of the live child, if any.
    pub fn pid(&self) -> Option<u32> {
        self.pid
    }

    /// SIGKILL with a bounded wait. The handle is kept when even that fails.
    async fn kill_now(&mut self, mut child: Child) -> SupervisorResult<()> {
        if let Err(err) = child.start_kill() {
            self.child = Some(child);
            return Err(signal_error(self.service, err.to_string()));
        }
        if timeout(KILL_WAIT, child.wait()).await.is_err() {
            warn!(service = %self.service, "child still reaping after SIGKILL");
        }
        self.pid = None;
        Ok(())
    }
}

fn signal_error(service: ServiceKind, reason: impl Into<String>) -> SupervisorError {
    SupervisorError::Signal {
        service,
        reason: reason.into(),
    }
}

cfg_if::cfg_if! {
    if #[cfg(unix)] {
        fn request_termination(service: ServiceKind, child: &mut Child) -> SupervisorResult<()> {
            use nix::errno::Errno;
            use nix::sys::signal::{kill, Signal};
            use nix::unistd::Pid;

            let Some(raw_pid) = child.id() else {
                return Ok(());
            };
            if raw_pid <= 1 || raw_pid > i32::MAX as u32 {
                return Err(signal_error(service, format!("refusing to signal pid {raw_pid}")));
            }
            match kill(Pid::from_raw(raw_pid as i32), Signal::SIGTERM) {
                Ok(()) | Err(Errno::ESRCH) => Ok(()),
                Err(err) => Err(signal_error(service, err.to_string())),
            }
        }
    } else {
        fn request_termination(service: ServiceKind, child: &mut Child) -> SupervisorResult<()> {
            child
                .start_kill()
                .map_err(|err| signal_error(service, err.to_string()))
        }
    }
}

#[async_trait]
impl ServiceBackend for ProcessBackend {
    async fn launch(&mut self, ctx: &LaunchContext<'_>) -> SupervisorResult<()> {
        let child = Command::new(&self.spec.program)
            .args(&self.spec.args)
            .arg("--config-file")
            .arg(ctx.config_path)
            .current_dir(ctx.root_path)
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .map_err(|err| SupervisorError::Spawn {
                service: ctx.service,
                reason: format!("{}: {err}", self.spec.program),
            })?;

        self.pid = child.id();
        info!(
            service = %ctx.service,
            network = %ctx.network,
            pid = ?self.pid,
            program = %self.spec.program,
            "child process spawned"
        );
        self.child = Some(child);
        Ok(())
    }

    async fn halt(&mut self) -> SupervisorResult<()> {
        let Some(mut child) = self.child.take() else {
            self.pid = None;
            return Ok(());
        };

        if let Ok(Some(status)) = child.try_wait() {
            debug!(service = %self.service, %status, "child had already exited");
            self.pid = None;
            return Ok(());
        }

        if let Err(err) = request_termination(self.service, &mut child) {
            warn!(service = %self.service, %err, "SIGTERM not delivered, killing");
            return self.kill_now(child).await;
        }

        match timeout(self.grace, child.wait()).await {
            Ok(Ok(status)) => {
                debug!(service = %self.service, %status, "child exited gracefully");
            }
            Ok(Err(err)) => {
                warn!(service = %self.service, ?err, "error waiting for child, killing");
                let _ = child.start_kill();
                let _ = timeout(KILL_WAIT, child.wait()).await;
            }
            Err(_) => {
                warn!(
                    service = %self.service,
                    grace = ?self.grace,
                    "child ignored SIGTERM, sending SIGKILL"
                );
                let _ = child.start_kill();
                let _ = timeout(KILL_WAIT, child.wait()).await;
            }
        }

        self.pid = None;
        Ok(())
    }

    fn extra_status(&self) -> Map<String, Value> {
        let mut extra = Map::new();
        extra.insert(
            "pid".into(),
            self.pid.map(Value::from).unwrap_or(Value::Null),
        );
        extra
    }
}
