//! Starts units in order, waits for the first termination event (a unit
//! exiting or a quit signal), then stops everything.
//!
//! Grounded directly on `original_source/unitd/processpool.py`'s
//! `ProcessPool`: race all tasks with `FIRST_COMPLETED`, cancel the rest,
//! then drain with `ALL_COMPLETED`. The Rust shape uses
//! `futures::future::select_all` for the race and `futures::future::join_all`
//! for the drain instead of `asyncio.wait`.

use std::sync::Arc;

use futures::future::{select_all, BoxFuture};

use crate::process::once::{once, OnceWaiter};
use crate::process::unit::ProcessUnit;

pub struct SupervisorPool {
    units: Vec<Arc<ProcessUnit>>,
    quit_signal: Option<OnceWaiter<()>>,
    failed: bool,
}

impl SupervisorPool {
    pub fn new() -> SupervisorPool {
        SupervisorPool {
            units: Vec::new(),
            quit_signal: None,
            failed: false,
        }
    }

    /// Arm a future whose completion is treated as a quit request, same as
    /// any managed unit's `terminated`. Driven to completion in the
    /// background so its firing can be peeked from `start_sync` without
    /// consuming it.
    pub fn set_quit_signal(&mut self, fut: BoxFuture<'static, ()>) {
        let (tx, waiter) = once();
        tokio::spawn(async move {
            fut.await;
            tx.resolve(());
        });
        self.quit_signal = Some(waiter);
    }

    fn quit_fired(&self) -> bool {
        self.quit_signal
            .as_ref()
            .is_some_and(|w| w.peek().is_some())
    }

    /// Start `unit` and, if it succeeded (no earlier unit already failed,
    /// and the quit signal hasn't already fired), record it so `run()`
    /// waits on it. Returns the unit's `started` outcome.
    pub async fn start_sync(&mut self, unit: Arc<ProcessUnit>) -> bool {
        if self.failed || self.quit_fired() {
            return false;
        }
        let ok = unit.start().await;
        if !ok {
            self.failed = true;
        }
        self.units.push(unit);
        ok
    }

    /// Wait for the first of: any managed unit terminating, or the quit
    /// signal firing. Then stop every unit in parallel and wait for all of
    /// them to finish stopping.
    pub async fn run(&mut self) {
        let mut waits: Vec<BoxFuture<'static, ()>> = self
            .units
            .iter()
            .map(|u| {
                let mut waiter = u.terminated();
                Box::pin(async move {
                    waiter.wait().await;
                }) as BoxFuture<'static, ()>
            })
            .collect();

        if let Some(mut quit) = self.quit_signal.clone() {
            waits.push(Box::pin(async move {
                quit.wait().await;
            }));
        }

        if !waits.is_empty() {
            select_all(waits).await;
        }

        let stops: Vec<_> = self
            .units
            .iter()
            .map(|u| {
                let u = Arc::clone(u);
                async move { u.stop().await }
            })
            .collect();
        futures::future::join_all(stops).await;
    }
}

impl Default for SupervisorPool {
    fn default() -> Self {
        SupervisorPool::new()
    }
}
