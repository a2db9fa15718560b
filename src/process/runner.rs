//! Spawns one command to completion (a hook) or as the long-running main
//! process of a Simple unit.
//!
//! Grounded on the reference `shell/process.rs` (`spawn_shell_pgroup`'s
//! `pre_exec` + `setpgid` pattern, `exec_command`'s spawn/pipe/wait shape)
//! and on `original_source/unitd/process.py`/`sudo.py` for the pre-exec
//! ordering: group id before user id, and only when currently root.

use std::collections::HashMap;
use std::os::unix::process::CommandExt;
use std::process::Stdio;
use std::sync::Arc;

use nix::unistd::{Gid, Group, Uid, User};
use tokio::process::{Child, Command};

use crate::config::CommandSpec;
use crate::error::SpawnError;
use crate::logsink::{Level, LogSink, Stream};
use crate::process::pump::StdioPump;

/// Everything a spawn needs besides the command itself.
pub struct SpawnContext {
    pub cwd: Option<String>,
    pub env: HashMap<String, String>,
    pub user: Option<String>,
    pub group: Option<String>,
    pub tag: String,
    pub sink: Arc<dyn LogSink>,
}

/// A spawned child with its stdio pumps already attached.
pub struct Spawned {
    pub child: Child,
    pub pid: i32,
    pub pumps: (StdioPump, StdioPump),
}

/// Resolve `user`/`group` names (or numeric strings) to ids via NSS, the
/// same lookup the reference `sudo.py` falls back to `$SUDO_UID`/`$SUDO_GID`
/// for; this crate takes the values directly from the unit file instead.
fn resolve_ids(user: Option<&str>, group: Option<&str>) -> Result<(Option<Uid>, Option<Gid>), SpawnError> {
    let uid = match user {
        None => None,
        Some(u) => Some(resolve_uid(u)?),
    };
    let gid = match group {
        None => None,
        Some(g) => Some(resolve_gid(g)?),
    };
    Ok((uid, gid))
}

fn resolve_uid(user: &str) -> Result<Uid, SpawnError> {
    if let Ok(n) = user.parse::<u32>() {
        return Ok(Uid::from_raw(n));
    }
    match User::from_name(user) {
        Ok(Some(u)) => Ok(u.uid),
        _ => Err(SpawnError::Exec(std::io::Error::new(
            std::io::ErrorKind::NotFound,
            format!("no such user: {user}"),
        ))),
    }
}

fn resolve_gid(group: &str) -> Result<Gid, SpawnError> {
    if let Ok(n) = group.parse::<u32>() {
        return Ok(Gid::from_raw(n));
    }
    match Group::from_name(group) {
        Ok(Some(g)) => Ok(g.gid),
        _ => Err(SpawnError::Exec(std::io::Error::new(
            std::io::ErrorKind::NotFound,
            format!("no such group: {group}"),
        ))),
    }
}

/// Spawn `spec` with the given context. `become_pgroup_leader` is set for a
/// Simple unit's main process so `kill(-pgid, sig)` reaches it later; hooks
/// run in the pool's own process group instead.
pub fn spawn(
    spec: &CommandSpec,
    ctx: &SpawnContext,
    become_pgroup_leader: bool,
) -> Result<Spawned, SpawnError> {
    let (argv0, rest) = spec
        .argv
        .split_first()
        .ok_or(SpawnError::EmptyCommand)?;

    let mut cmd = Command::new(argv0);
    cmd.args(rest)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    if let Some(cwd) = &ctx.cwd {
        cmd.current_dir(cwd);
    }
    cmd.envs(&ctx.env);

    let (uid, gid) = resolve_ids(ctx.user.as_deref(), ctx.group.as_deref())?;
    let currently_root = Uid::current().is_root();

    // SAFETY: only async-signal-safe syscalls (setpgid, setgid, setuid) run
    // between fork and exec.
    unsafe {
        cmd.pre_exec(move || {
            if become_pgroup_leader {
                libc::setpgid(0, 0);
            }
            if currently_root {
                if let Some(gid) = gid {
                    if libc::setgid(gid.as_raw()) != 0 {
                        return Err(std::io::Error::last_os_error());
                    }
                }
                if let Some(uid) = uid {
                    if libc::setuid(uid.as_raw()) != 0 {
                        return Err(std::io::Error::last_os_error());
                    }
                }
            }
            Ok(())
        });
    }

    let mut child = cmd.spawn()?;
    let pid = child.id().unwrap_or(0) as i32;

    let stdout = child.stdout.take().expect("piped stdout");
    let stderr = child.stderr.take().expect("piped stderr");
    let pumped_tag = format!("{}[{pid}]", ctx.tag);
    let out_pump = StdioPump::spawn(
        stdout,
        pumped_tag.clone(),
        Stream::Stdout,
        Level::Debug,
        Arc::clone(&ctx.sink),
    );
    let err_pump = StdioPump::spawn(
        stderr,
        pumped_tag,
        Stream::Stderr,
        Level::Debug,
        Arc::clone(&ctx.sink),
    );

    Ok(Spawned {
        child,
        pid,
        pumps: (out_pump, err_pump),
    })
}

/// Run a hook command to completion. Returns `true` if it should be treated
/// as success: exit code 0, or the spec carries the `-` ignore-failure flag.
pub async fn run_hook(spec: &CommandSpec, ctx: &SpawnContext) -> Result<bool, SpawnError> {
    let mut spawned = spawn(spec, ctx, false)?;
    let status = spawned.child.wait().await.map_err(SpawnError::Exec)?;
    spawned.pumps.0.join().await;
    spawned.pumps.1.join().await;
    Ok(status.success() || spec.ignore_failure)
}
