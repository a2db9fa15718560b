//! End-to-end scenarios against real `/bin` utilities, one per concrete
//! case this crate's lifecycle contract documents.

use std::collections::HashMap;
use std::sync::Arc;

use unitd::config::{CommandSpec, KillMode, ServiceConfig, UnitType};
use unitd::logsink::NullSink;
use unitd::process::unit::ProcessUnit;

fn base_config(unit_type: UnitType) -> ServiceConfig {
    ServiceConfig {
        unit_type,
        ..ServiceConfig::default()
    }
}

fn spec(s: &str) -> CommandSpec {
    CommandSpec::parse(s).unwrap()
}

#[tokio::test]
async fn scenario_quick_exit() {
    let mut config = base_config(UnitType::Simple);
    config.exec_start = vec![spec("/bin/true")];

    let unit = Arc::new(
        ProcessUnit::new("quick-exit", config, HashMap::new(), Arc::new(NullSink)).unwrap(),
    );
    assert!(unit.start().await);
    assert_eq!(unit.terminated().wait().await, 0);
    unit.stop().await;
    assert!(unit.stopped().wait().await);
}

#[tokio::test]
async fn scenario_cancellation_of_long_runner() {
    let mut config = base_config(UnitType::Simple);
    config.exec_start = vec![spec("/bin/sleep 3600")];
    config.kill_signal = libc::SIGTERM;
    config.timeout_stop_sec = Some(2);

    let unit = Arc::new(
        ProcessUnit::new("long-runner", config, HashMap::new(), Arc::new(NullSink)).unwrap(),
    );
    assert!(unit.start().await);

    let start = std::time::Instant::now();
    unit.stop().await;
    let elapsed = start.elapsed();

    assert_eq!(unit.terminated().wait().await, -libc::SIGTERM);
    assert!(unit.stopped().wait().await);
    assert!(elapsed < std::time::Duration::from_secs(3), "elapsed = {elapsed:?}");
}

#[tokio::test]
async fn scenario_pre_and_post_hooks_filesystem_effect() {
    let dir = tempfile::tempdir().unwrap();
    let one = dir.path().join("one");
    let two = dir.path().join("two");
    let three = dir.path().join("three");

    let mut config = base_config(UnitType::Simple);
    config.working_directory = Some(dir.path().to_string_lossy().into_owned());
    config.exec_start_pre = vec![
        spec(&format!("mkdir {}", one.display())),
        spec("-/bin/false"),
        spec("-/bin/false"),
        spec(&format!("mkdir {}", two.display())),
    ];
    config.exec_start = vec![spec("/bin/sleep 3600")];
    config.exec_start_post = vec![spec(&format!("mkdir {}", three.display()))];
    config.timeout_stop_sec = Some(2);

    let unit = Arc::new(
        ProcessUnit::new("hooks", config, HashMap::new(), Arc::new(NullSink)).unwrap(),
    );
    assert!(unit.start().await);

    assert!(one.is_dir());
    assert!(two.is_dir());
    assert!(three.is_dir());

    unit.stop().await;
    assert_eq!(unit.terminated().wait().await, -libc::SIGTERM);
}

#[tokio::test]
async fn scenario_oneshot_sequence() {
    let mut config = base_config(UnitType::Oneshot);
    config.exec_start = vec![spec("/bin/true"), spec("/bin/true")];

    let unit = Arc::new(
        ProcessUnit::new("oneshot", config, HashMap::new(), Arc::new(NullSink)).unwrap(),
    );
    assert!(unit.start().await);
    assert_eq!(unit.terminated().wait().await, 0);

    let start = std::time::Instant::now();
    unit.stop().await;
    assert!(unit.stopped().wait().await);
    // No signal is sent: terminated already resolved before stop() ran.
    assert!(start.elapsed() < std::time::Duration::from_millis(500));
}

#[tokio::test]
async fn scenario_pool_shutdown_on_unit_termination() {
    use unitd::pool::SupervisorPool;

    let mut a_config = base_config(UnitType::Simple);
    a_config.exec_start = vec![spec("/bin/sleep 3600")];
    a_config.timeout_stop_sec = Some(2);
    let mut b_config = a_config.clone();
    b_config.kill_mode = KillMode::ControlGroup;

    let a = Arc::new(ProcessUnit::new("a", a_config, HashMap::new(), Arc::new(NullSink)).unwrap());
    let b = Arc::new(ProcessUnit::new("b", b_config, HashMap::new(), Arc::new(NullSink)).unwrap());

    let mut pool = SupervisorPool::new();
    assert!(pool.start_sync(Arc::clone(&a)).await);
    assert!(pool.start_sync(Arc::clone(&b)).await);

    let mut a_term = a.terminated();
    pool.set_quit_signal(Box::pin(async move {
        a_term.wait().await;
    }));

    let start = std::time::Instant::now();
    // Drive the race: kill `a` out from under the pool to simulate the
    // "a unit terminates first" branch of the race without waiting on a
    // real external signal.
    a.stop().await;
    pool.run().await;
    let elapsed = start.elapsed();

    assert!(a.stopped().wait().await);
    assert!(b.stopped().wait().await);
    assert!(elapsed < std::time::Duration::from_secs(5), "elapsed = {elapsed:?}");
}

#[tokio::test]
async fn scenario_pre_hook_failure_aborts_start() {
    let mut config = base_config(UnitType::Simple);
    config.exec_start_pre = vec![spec("/bin/false")];
    config.exec_start = vec![spec("/bin/true")];

    let unit = Arc::new(
        ProcessUnit::new("pre-fail", config, HashMap::new(), Arc::new(NullSink)).unwrap(),
    );
    assert!(!unit.start().await);
    assert!(!unit.started().wait().await);
    assert_eq!(unit.terminated().peek(), None);

    unit.stop().await;
    assert!(unit.stopped().wait().await);
}
