//! `unitd` — load a single `.service` unit file and supervise it until it
//! exits or a quit signal arrives.
//!
//! Mirrors the reference binary's `Cli`/`#[tokio::main]`/tracing-init shape
//! (`gawd-ai-sctl`'s `sctl serve`/`sctl supervise`), trimmed to the one
//! subcommand this crate's scope calls for.

use std::collections::HashMap;
use std::sync::Arc;

use clap::Parser;
use tracing::error;

use unitd::config::Config;
use unitd::logsink::TracingSink;
use unitd::pool::SupervisorPool;
use unitd::process::unit::ProcessUnit;
use unitd::signal_future::wait_for_quit_signal;

#[derive(Parser, Debug)]
#[command(name = "unitd", about = "Lightweight process supervisor for .service unit files")]
struct Cli {
    /// Path to the unit file to run.
    unit_file: String,

    /// Print the parsed configuration as JSON and exit without running it.
    #[arg(long)]
    show_config: bool,
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    let config = match Config::from_path(&cli.unit_file) {
        Ok(c) => c,
        Err(e) => {
            error!("failed to load {}: {e}", cli.unit_file);
            std::process::exit(1);
        }
    };

    if cli.show_config {
        match serde_json::to_string_pretty(&config) {
            Ok(json) => println!("{json}"),
            Err(e) => error!("failed to render config as JSON: {e}"),
        }
        return;
    }

    let tag = if config.service.syslog_identifier.is_empty() {
        cli.unit_file.clone()
    } else {
        config.service.syslog_identifier.clone()
    };

    let env = build_child_env(&config.service);

    let unit = match ProcessUnit::new(tag, config.service, env, Arc::new(TracingSink)) {
        Ok(u) => Arc::new(u),
        Err(e) => {
            error!("invalid unit: {e}");
            std::process::exit(1);
        }
    };

    let mut pool = SupervisorPool::new();
    pool.set_quit_signal(Box::pin(async {
        if let Err(e) = wait_for_quit_signal().await {
            error!("failed to install signal handler: {e}");
        }
    }));

    let started = pool.start_sync(Arc::clone(&unit)).await;
    if !started {
        error!("unit failed to start");
        pool.run().await;
        std::process::exit(1);
    }

    pool.run().await;

    let code = unit.terminated().peek().unwrap_or(0);
    std::process::exit(if code == 0 { 0 } else { 1 });
}

/// Override `LOGNAME`/`USER`/`USERNAME`/`HOME` in the child's environment
/// map when a `User=` is configured, resolved via NSS. Only the map handed
/// to the spawned child is touched; the supervisor's own `std::env` is
/// never mutated.
fn build_child_env(service: &unitd::config::ServiceConfig) -> HashMap<String, String> {
    let mut env: HashMap<String, String> = std::env::vars().collect();
    let Some(user) = service.user.as_deref() else {
        return env;
    };
    let resolved = user
        .parse::<u32>()
        .ok()
        .and_then(|uid| nix::unistd::User::from_uid(nix::unistd::Uid::from_raw(uid)).ok().flatten())
        .or_else(|| nix::unistd::User::from_name(user).ok().flatten());
    if let Some(u) = resolved {
        env.insert("LOGNAME".to_string(), u.name.clone());
        env.insert("USER".to_string(), u.name.clone());
        env.insert("USERNAME".to_string(), u.name);
        env.insert("HOME".to_string(), u.dir.to_string_lossy().into_owned());
    }
    env
}
