//! The per-unit state machine: pre-hooks, main process, post-hooks, stop
//! sequence, kill escalation.
//!
//! The kill-escalation half (`kill_escalate`) is a direct port of
//! `ManagedSession::graceful_kill` in the reference session code — signal,
//! wait with a deadline, SIGKILL, wait again — generalized from its fixed
//! 3-second/100ms-poll shape to the configurable `timeout_stop_sec` and a
//! real wakeup (via [`Once`]) instead of a status-polling loop.

use std::collections::HashMap;
use std::os::unix::process::ExitStatusExt;
use std::sync::atomic::{AtomicI32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;

use crate::config::{CommandSpec, KillMode, ServiceConfig, UnitType};
use crate::error::StartError;
use crate::logsink::{Level, LogSink, Record, Stream};
use crate::process::once::{once, Once, OnceWaiter};
use crate::process::runner::{self, SpawnContext};

/// Observable lifecycle stage, exposed for logging/diagnostics; the actual
/// control flow lives in `start`/`stop`, not in a stored enum, since the
/// three `Once` events already capture everything callers need to await.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Idle,
    PreHooks,
    Spawning,
    Running,
    Exited,
    Stopping,
    Stopped,
    StartFailed,
}

pub struct ProcessUnit {
    tag: String,
    config: ServiceConfig,
    env: HashMap<String, String>,
    sink: Arc<dyn LogSink>,
    pid: AtomicI32,
    stage: Mutex<Stage>,
    started: Once<bool>,
    started_waiter: OnceWaiter<bool>,
    terminated: Once<i32>,
    terminated_waiter: OnceWaiter<i32>,
    stopped: Once<bool>,
    stopped_waiter: OnceWaiter<bool>,
}

impl ProcessUnit {
    pub fn new(
        tag: impl Into<String>,
        config: ServiceConfig,
        env: HashMap<String, String>,
        sink: Arc<dyn LogSink>,
    ) -> Result<ProcessUnit, StartError> {
        if config.exec_start.is_empty() {
            return Err(StartError::EmptyExecStart);
        }
        if config.unit_type == UnitType::Simple && config.exec_start.len() != 1 {
            return Err(StartError::TooManyMainCommands);
        }
        let (started, started_waiter) = once();
        let (terminated, terminated_waiter) = once();
        let (stopped, stopped_waiter) = once();
        Ok(ProcessUnit {
            tag: tag.into(),
            config,
            env,
            sink,
            pid: AtomicI32::new(0),
            stage: Mutex::new(Stage::Idle),
            started,
            started_waiter,
            terminated,
            terminated_waiter,
            stopped,
            stopped_waiter,
        })
    }

    pub fn started(&self) -> OnceWaiter<bool> {
        self.started_waiter.clone()
    }

    pub fn terminated(&self) -> OnceWaiter<i32> {
        self.terminated_waiter.clone()
    }

    pub fn stopped(&self) -> OnceWaiter<bool> {
        self.stopped_waiter.clone()
    }

    /// Current lifecycle stage, for diagnostics.
    pub async fn stage(&self) -> Stage {
        *self.stage.lock().await
    }

    fn hook_ctx(&self) -> SpawnContext {
        SpawnContext {
            cwd: self.working_directory(),
            env: self.env.clone(),
            user: self.config.user.clone(),
            group: self.config.group.clone(),
            tag: self.tag.clone(),
            sink: Arc::clone(&self.sink),
        }
    }

    fn working_directory(&self) -> Option<String> {
        match self.config.working_directory.as_deref() {
            Some("~") => match nix::unistd::User::from_uid(nix::unistd::Uid::current()) {
                Ok(Some(u)) => Some(u.dir.to_string_lossy().into_owned()),
                _ => {
                    self.log(Level::Warn, Stream::System, "could not resolve ~, using current directory".into());
                    None
                }
            },
            other => other.map(str::to_string),
        }
    }

    fn log(&self, level: Level, stream: Stream, text: String) {
        self.sink.emit(Record {
            tag: self.tag.clone(),
            stream,
            level,
            text,
        });
    }

    async fn set_stage(&self, stage: Stage) {
        *self.stage.lock().await = stage;
    }

    /// Run `ExecStartPre → ExecStart → ExecStartPost`, resolving `started`.
    /// Returns the resolved value.
    pub async fn start(&self) -> bool {
        self.set_stage(Stage::PreHooks).await;
        if let Err(i) = self.run_hook_sequence(&self.config.exec_start_pre).await {
            self.log(Level::Warn, Stream::System, format!("ExecStartPre[{i}] failed"));
            self.set_stage(Stage::StartFailed).await;
            self.started.resolve(false);
            return false;
        }

        self.set_stage(Stage::Spawning).await;
        let spawn_ok = match self.config.unit_type {
            UnitType::Simple => self.start_simple().await,
            UnitType::Oneshot => self.start_oneshot().await,
        };
        if !spawn_ok {
            self.set_stage(Stage::StartFailed).await;
            self.started.resolve(false);
            return false;
        }

        self.set_stage(Stage::Running).await;
        if let Err(i) = self.run_hook_sequence(&self.config.exec_start_post).await {
            self.log(Level::Warn, Stream::System, format!("ExecStartPost[{i}] failed"));
            // Main process (if Simple) keeps running; stop() will reap it.
            self.started.resolve(false);
            return false;
        }

        self.started.resolve(true);
        true
    }

    async fn run_hook_sequence(&self, specs: &[CommandSpec]) -> Result<(), usize> {
        let ctx = self.hook_ctx();
        for (i, spec) in specs.iter().enumerate() {
            match runner::run_hook(spec, &ctx).await {
                Ok(true) => {}
                Ok(false) | Err(_) => return Err(i),
            }
        }
        Ok(())
    }

    async fn start_simple(&self) -> bool {
        let spec = &self.config.exec_start[0];
        let ctx = self.hook_ctx();
        let spawned = match runner::spawn(spec, &ctx, true) {
            Ok(s) => s,
            Err(e) => {
                self.log(Level::Error, Stream::System, format!("spawn failed: {e}"));
                return false;
            }
        };
        self.pid.store(spawned.pid, Ordering::SeqCst);
        self.log(Level::Info, Stream::System, format!("started (pid {})", spawned.pid));

        let tag = self.tag.clone();
        let sink = Arc::clone(&self.sink);
        let terminated_tx = self.terminated.clone();
        let mut child = spawned.child;
        let (out_pump, err_pump) = spawned.pumps;
        tokio::spawn(async move {
            let code = match child.wait().await {
                Ok(status) => encode_status(status),
                Err(e) => {
                    sink.emit(Record {
                        tag: tag.clone(),
                        stream: Stream::System,
                        level: Level::Error,
                        text: format!("wait() failed: {e}"),
                    });
                    -1
                }
            };
            out_pump.abort();
            err_pump.abort();
            sink.emit(Record {
                tag,
                stream: Stream::System,
                level: Level::Info,
                text: format!("exited with code {code}"),
            });
            terminated_tx.resolve(code);
        });

        // Give the exit-watcher a chance to observe an immediate crash before
        // declaring the spawn successful — the "confirm-start" hook this
        // crate exposes by default resolves instantly, so the only other
        // contender is a premature exit.
        tokio::task::yield_now().await;
        self.terminated_waiter.peek().is_none()
    }

    async fn start_oneshot(&self) -> bool {
        let ctx = self.hook_ctx();
        let mut last_code = 0;
        for spec in &self.config.exec_start {
            let spawned = match runner::spawn(spec, &ctx, false) {
                Ok(s) => s,
                Err(e) => {
                    self.log(Level::Error, Stream::System, format!("spawn failed: {e}"));
                    self.terminated.resolve(-1);
                    return false;
                }
            };
            self.pid.store(spawned.pid, Ordering::SeqCst);
            let mut child = spawned.child;
            let status = match child.wait().await {
                Ok(s) => s,
                Err(e) => {
                    self.log(Level::Error, Stream::System, format!("wait() failed: {e}"));
                    self.terminated.resolve(-1);
                    return false;
                }
            };
            spawned.pumps.0.join().await;
            spawned.pumps.1.join().await;
            last_code = encode_status(status);
            if !status.success() && !spec.ignore_failure {
                self.terminated.resolve(last_code);
                return false;
            }
        }
        self.terminated.resolve(last_code);
        true
    }

    /// Run `ExecStop`, kill-escalate, run `ExecStopPost`, resolve `stopped`.
    pub async fn stop(&self) {
        self.set_stage(Stage::Stopping).await;
        if self.started_waiter.peek() == Some(true) {
            let ctx = self.hook_ctx();
            for spec in &self.config.exec_stop {
                let _ = runner::run_hook(spec, &ctx).await;
            }
        }

        self.kill_escalate().await;

        let ctx = self.hook_ctx();
        for spec in &self.config.exec_stop_post {
            let _ = runner::run_hook(spec, &ctx).await;
        }

        self.set_stage(Stage::Stopped).await;
        self.stopped.resolve(true);
    }

    async fn kill_escalate(&self) {
        if self.config.kill_mode == KillMode::None {
            return;
        }
        if self.terminated_waiter.peek().is_some() {
            return;
        }
        let pid = self.pid.load(Ordering::SeqCst);
        if pid <= 0 {
            return;
        }
        let target = match self.config.kill_mode {
            KillMode::ControlGroup => -pid,
            KillMode::Process => pid,
            KillMode::None => unreachable!(),
        };

        unsafe {
            libc::kill(target, self.config.kill_signal);
        }
        let mut waiter = self.terminated_waiter.clone();
        if self.await_exit(&mut waiter, self.config.timeout_stop_sec).await {
            return;
        }

        if self.config.send_sigkill {
            unsafe {
                libc::kill(target, libc::SIGKILL);
            }
            if !self.await_exit(&mut waiter, self.config.timeout_stop_sec).await {
                let err = crate::error::KillEscalationExhausted {
                    pgid: pid,
                    timeout_secs: self.config.timeout_stop_sec.unwrap_or(0),
                };
                self.log(Level::Warn, Stream::System, err.to_string());
            }
        } else {
            self.log(
                Level::Warn,
                Stream::System,
                "gave up waiting for exit, SendSIGKILL=false".to_string(),
            );
        }
    }

    async fn await_exit(&self, waiter: &mut OnceWaiter<i32>, timeout_secs: Option<u64>) -> bool {
        match timeout_secs {
            Some(secs) => tokio::time::timeout(Duration::from_secs(secs), waiter.wait())
                .await
                .is_ok(),
            None => {
                waiter.wait().await;
                true
            }
        }
    }
}

fn encode_status(status: std::process::ExitStatus) -> i32 {
    match status.code() {
        Some(code) => code,
        None => -status.signal().unwrap_or(0),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{CommandSpec, ServiceConfig, UnitType};
    use crate::logsink::NullSink;

    fn svc(exec_start: Vec<&str>, unit_type: UnitType) -> ServiceConfig {
        ServiceConfig {
            unit_type,
            exec_start: exec_start.into_iter().map(|s| CommandSpec::parse(s).unwrap()).collect(),
            ..ServiceConfig::default()
        }
    }

    #[tokio::test]
    async fn quick_exit_resolves_started_and_terminated() {
        let config = svc(vec!["/bin/true"], UnitType::Simple);
        let unit = ProcessUnit::new("t", config, HashMap::new(), Arc::new(NullSink)).unwrap();
        assert!(unit.start().await);
        let code = unit.terminated().wait().await;
        assert_eq!(code, 0);
        unit.stop().await;
        assert!(unit.stopped().wait().await);
    }

    #[tokio::test]
    async fn oneshot_runs_all_entries_serially() {
        let config = svc(vec!["/bin/true", "/bin/true"], UnitType::Oneshot);
        let unit = ProcessUnit::new("t", config, HashMap::new(), Arc::new(NullSink)).unwrap();
        assert!(unit.start().await);
        assert_eq!(unit.terminated().wait().await, 0);
        unit.stop().await;
        assert!(unit.stopped().wait().await);
    }

    #[tokio::test]
    async fn pre_hook_failure_aborts_start_without_spawning_main() {
        let mut config = svc(vec!["/bin/true"], UnitType::Simple);
        config.exec_start_pre = vec![CommandSpec::parse("/bin/false").unwrap()];
        let unit = ProcessUnit::new("t", config, HashMap::new(), Arc::new(NullSink)).unwrap();
        assert!(!unit.start().await);
        assert!(!unit.started().wait().await);
        unit.stop().await;
        assert!(unit.stopped().wait().await);
    }

    #[tokio::test]
    async fn cancellation_of_long_runner_sigterms_then_reports_signal_exit() {
        let mut config = svc(vec!["/bin/sleep 3600"], UnitType::Simple);
        config.timeout_stop_sec = Some(2);
        let unit = ProcessUnit::new("t", config, HashMap::new(), Arc::new(NullSink)).unwrap();
        assert!(unit.start().await);
        unit.stop().await;
        let code = unit.terminated().wait().await;
        assert_eq!(code, -libc::SIGTERM);
    }

    #[tokio::test]
    async fn too_many_main_commands_for_simple_is_rejected_at_construction() {
        let config = svc(vec!["/bin/true", "/bin/true"], UnitType::Simple);
        let err = ProcessUnit::new("t", config, HashMap::new(), Arc::new(NullSink));
        assert!(err.is_err());
    }
}
