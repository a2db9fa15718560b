//! Unit file loading: parses the INI-like grammar in [`parser`] into frozen
//! [`ServiceConfig`]/[`UnitConfig`]/[`WebrunConfig`] records.
//!
//! Precedence mirrors the reference server's `config.rs` doc comment, scaled
//! down to what this crate actually has: the unit file on disk is the only
//! source of unit configuration, and `UNITD_QUIT_SIGNAL` may override the
//! pool's default quit signal at process start.
//!
//! ```text
//! [Unit]
//! Description = demo service
//!
//! [Service]
//! Type = simple
//! ExecStartPre = -/bin/true
//! ExecStart = /usr/bin/sleep 3600
//! ExecStop = /bin/echo stopping
//! KillMode = control-group
//! KillSignal = SIGTERM
//! SendSIGKILL = yes
//! TimeoutStopSec = 5
//! ```

pub mod parser;

use std::collections::HashMap;

use crate::error::ParseError;

/// Leading flag characters `CommandSpec` recognizes ahead of the argv.
/// Only `-` has semantic effect (ignore non-zero exit); `@`/`+` are
/// recognized and stripped for forward-compatibility but otherwise inert.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct CommandSpec {
    pub argv: Vec<String>,
    pub ignore_failure: bool,
}

impl CommandSpec {
    /// Parse one `ExecStart=`-style value: strip leading `-`/`@`/`+` flag
    /// characters from the first token, then POSIX-word-split the rest.
    pub fn parse(raw: &str) -> Result<CommandSpec, String> {
        let mut s = raw.trim_start();
        let mut ignore_failure = false;
        loop {
            match s.chars().next() {
                Some('-') => {
                    ignore_failure = true;
                    s = &s[1..];
                }
                Some('@') | Some('+') => {
                    s = &s[1..];
                }
                _ => break,
            }
        }
        let argv = shlex::split(s).ok_or_else(|| format!("unbalanced quoting in: {raw}"))?;
        if argv.is_empty() {
            return Err(format!("empty command in: {raw}"));
        }
        Ok(CommandSpec { argv, ignore_failure })
    }
}

/// Whether a unit's `ExecStart` represents a single long-running process or
/// a serial sequence of short-lived commands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub enum UnitType {
    Simple,
    Oneshot,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub enum KillMode {
    /// Signal the whole process group (`kill(-pgid, sig)`).
    ControlGroup,
    /// Signal only the main process.
    Process,
    /// Never signal; rely on the process exiting on its own.
    None,
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct ServiceConfig {
    pub unit_type: UnitType,
    pub syslog_identifier: String,
    pub working_directory: Option<String>,
    pub exec_start: Vec<CommandSpec>,
    pub exec_start_pre: Vec<CommandSpec>,
    pub exec_start_post: Vec<CommandSpec>,
    pub exec_stop: Vec<CommandSpec>,
    pub exec_stop_post: Vec<CommandSpec>,
    pub kill_mode: KillMode,
    pub kill_signal: i32,
    pub send_sigkill: bool,
    pub timeout_stop_sec: Option<u64>,
    pub user: Option<String>,
    pub group: Option<String>,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        ServiceConfig {
            unit_type: UnitType::Simple,
            syslog_identifier: String::new(),
            working_directory: None,
            exec_start: Vec::new(),
            exec_start_pre: Vec::new(),
            exec_start_post: Vec::new(),
            exec_stop: Vec::new(),
            exec_stop_post: Vec::new(),
            kill_mode: KillMode::ControlGroup,
            kill_signal: libc::SIGTERM,
            send_sigkill: true,
            timeout_stop_sec: Some(2),
            user: None,
            group: None,
        }
    }
}

/// Opaque `[Unit]` section: keys this crate defines no dependency graph for
/// (see Non-goals) but still retains verbatim, matching the reference
/// `Unit.from_config` no-op dispatch.
#[derive(Debug, Clone, Default, serde::Serialize)]
pub struct UnitConfig {
    pub entries: HashMap<String, String>,
}

/// Opaque `[Webrun]` passthrough for the out-of-scope VNC/web-proxy wrapper.
#[derive(Debug, Clone, serde::Serialize)]
pub struct WebrunConfig {
    pub display_geometry: String,
    pub web_port: u16,
}

impl Default for WebrunConfig {
    fn default() -> Self {
        WebrunConfig {
            display_geometry: "800x600".to_string(),
            web_port: 6080,
        }
    }
}

#[derive(Debug, Clone, Default, serde::Serialize)]
pub struct Config {
    pub unit: UnitConfig,
    pub service: ServiceConfig,
    pub webrun: WebrunConfig,
}

impl Config {
    pub fn from_path(path: &str) -> Result<Config, ParseError> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| ParseError::new(path, 0, format!("could not read file: {e}")))?;
        Config::from_str(path, &text)
    }

    pub fn from_str(path: &str, text: &str) -> Result<Config, ParseError> {
        let mut config = Config::default();
        for (section, key, val, lineno) in parser::parse(path, text)? {
            match section.to_ascii_lowercase().as_str() {
                "service" => apply_service(&mut config.service, path, lineno, &key, &val)?,
                "unit" => {
                    config.unit.entries.insert(key, val);
                }
                "webrun" => apply_webrun(&mut config.webrun, &key, &val),
                _ => {} // unrecognized sections ignored
            }
        }
        Ok(config)
    }
}

fn apply_service(
    svc: &mut ServiceConfig,
    path: &str,
    lineno: usize,
    key: &str,
    val: &str,
) -> Result<(), ParseError> {
    match key {
        "Type" => {
            svc.unit_type = match val.to_ascii_lowercase().as_str() {
                "simple" => UnitType::Simple,
                "oneshot" => UnitType::Oneshot,
                _ => return Err(ParseError::new(path, lineno, format!("invalid Type: {val}"))),
            };
        }
        "SyslogIdentifier" => svc.syslog_identifier = val.to_string(),
        "WorkingDirectory" => svc.working_directory = Some(val.to_string()),
        "ExecStart" => svc.exec_start.push(
            CommandSpec::parse(val).map_err(|e| ParseError::new(path, lineno, e))?,
        ),
        "ExecStartPre" => svc.exec_start_pre.push(
            CommandSpec::parse(val).map_err(|e| ParseError::new(path, lineno, e))?,
        ),
        "ExecStartPost" => svc.exec_start_post.push(
            CommandSpec::parse(val).map_err(|e| ParseError::new(path, lineno, e))?,
        ),
        "ExecStop" => svc.exec_stop.push(
            CommandSpec::parse(val).map_err(|e| ParseError::new(path, lineno, e))?,
        ),
        "ExecStopPost" => svc.exec_stop_post.push(
            CommandSpec::parse(val).map_err(|e| ParseError::new(path, lineno, e))?,
        ),
        "KillMode" => {
            svc.kill_mode = match val {
                "control-group" => KillMode::ControlGroup,
                "process" => KillMode::Process,
                "none" => KillMode::None,
                _ => return Err(ParseError::new(path, lineno, format!("invalid KillMode: {val}"))),
            };
        }
        "KillSignal" => {
            svc.kill_signal = parser::parse_signal(val).ok_or_else(|| {
                ParseError::new(path, lineno, format!("invalid KillSignal: {val}"))
            })?;
        }
        "SendSIGKILL" => {
            svc.send_sigkill = parser::parse_bool(val).ok_or_else(|| {
                ParseError::new(path, lineno, format!("invalid SendSIGKILL: {val}"))
            })?;
        }
        "TimeoutSec" | "TimeoutStopSec" => {
            svc.timeout_stop_sec = parser::parse_delay(val)
                .ok_or_else(|| ParseError::new(path, lineno, format!("invalid delay: {val}")))?;
        }
        "User" => svc.user = Some(val.to_string()),
        "Group" => svc.group = Some(val.to_string()),
        _ => {} // unknown key in a known section: ignored
    }
    Ok(())
}

fn apply_webrun(webrun: &mut WebrunConfig, key: &str, val: &str) {
    match key {
        "DisplayGeometry" => webrun.display_geometry = val.to_string(),
        "WebPort" => {
            if let Ok(p) = val.parse() {
                webrun.web_port = p;
            }
        }
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn command_spec_strips_ignore_failure_flag() {
        let spec = CommandSpec::parse("-/bin/false").unwrap();
        assert!(spec.ignore_failure);
        assert_eq!(spec.argv, vec!["/bin/false"]);
    }

    #[test]
    fn command_spec_splits_words() {
        let spec = CommandSpec::parse("/usr/bin/sleep 3600").unwrap();
        assert!(!spec.ignore_failure);
        assert_eq!(spec.argv, vec!["/usr/bin/sleep", "3600"]);
    }

    #[test]
    fn full_unit_file_populates_all_sections() {
        let text = r#"
[Unit]
Description = demo service

[Service]
Type = oneshot
SyslogIdentifier = demo
ExecStartPre = -/bin/false
ExecStart = /bin/true
ExecStart = /bin/true
KillMode = process
KillSignal = SIGINT
SendSIGKILL = no
TimeoutStopSec = 1min 30sec

[Webrun]
WebPort = 8080
"#;
        let config = Config::from_str("demo.service", text).unwrap();
        assert_eq!(config.service.unit_type, UnitType::Oneshot);
        assert_eq!(config.service.syslog_identifier, "demo");
        assert_eq!(config.service.exec_start.len(), 2);
        assert_eq!(config.service.kill_mode, KillMode::Process);
        assert_eq!(config.service.kill_signal, libc::SIGINT);
        assert!(!config.service.send_sigkill);
        assert_eq!(config.service.timeout_stop_sec, Some(90));
        assert_eq!(
            config.unit.entries.get("Description").map(String::as_str),
            Some("demo service")
        );
        assert_eq!(config.webrun.web_port, 8080);
    }

    #[test]
    fn unrecognized_section_is_ignored() {
        let text = "[Bogus]\nKey = value\n";
        let config = Config::from_str("demo.service", text).unwrap();
        assert!(config.unit.entries.is_empty());
    }
}
