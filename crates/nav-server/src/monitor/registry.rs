//! Per-route monitoring tasks.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use tokio::sync::{broadcast, Mutex};
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};

use nav_core::RouteStatus;

use super::cycle::{CycleError, CycleOutcome, CycleRunner, MonitorExit};

struct MonitorHandle {
    generation: u64,
    shutdown: broadcast::Sender<()>,
    task: JoinHandle<()>,
}

/// Tracks one monitoring task per route.
///
/// Cycles for one route are serialised by a per-route guard that outlives
/// individual tasks, so a restart never overlaps the previous task's cycle.
pub struct RouteMonitorRegistry {
    runner: Arc<CycleRunner>,
    cycle_interval: Duration,
    monitors: DashMap<String, MonitorHandle>,
    cycle_guards: DashMap<String, Arc<Mutex<()>>>,
    exits: DashMap<String, MonitorExit>,
    next_generation: AtomicU64,
}

impl RouteMonitorRegistry {
    pub fn new(runner: Arc<CycleRunner>, cycle_interval: Duration) -> Self {
        Self {
            runner,
            cycle_interval,
            monitors: DashMap::new(),
            cycle_guards: DashMap::new(),
            exits: DashMap::new(),
            next_generation: AtomicU64::new(1),
        }
    }

    /// Start monitoring `route_id`, replacing any task already running for it.
    ///
    /// The replaced task is signalled, not aborted: it finishes its current
    /// cycle before the new task's first cycle can run.
    pub fn start(self: &Arc<Self>, route_id: &str) {
        let generation = self.next_generation.fetch_add(1, Ordering::Relaxed);
        let guard = self.cycle_guard(route_id);
        let (shutdown, shutdown_rx) = broadcast::channel(1);
        self.exits.remove(route_id);

        // Spawn while holding the entry so a task that exits immediately
        // cannot run `finish` before its handle is registered.
        let entry = self.monitors.entry(route_id.to_string());
        let task = tokio::spawn(run_monitor(
            Arc::clone(self),
            route_id.to_string(),
            generation,
            guard,
            shutdown_rx,
        ));
        let handle = MonitorHandle { generation, shutdown, task };
        match entry {
            Entry::Occupied(mut occupied) => {
                let previous = occupied.insert(handle);
                let _ = previous.shutdown.send(());
                tracing::info!("Restarting monitor for route {}", route_id);
            }
            Entry::Vacant(vacant) => {
                vacant.insert(handle);
                tracing::info!("Started monitor for route {}", route_id);
            }
        }
    }

    /// Signal the task for `route_id` to stop and wait for it to finish its
    /// current cycle. Returns `false` if nothing was running.
    pub async fn stop(&self, route_id: &str) -> bool {
        let Some((_, handle)) = self.monitors.remove(route_id) else {
            return false;
        };
        let _ = handle.shutdown.send(());
        if let Err(err) = handle.task.await {
            tracing::warn!("Monitor task for route {} ended abnormally: {}", route_id, err);
        }
        true
    }

    /// Run one cycle for `route_id` now, after any cycle already in flight.
    pub async fn run_once(&self, route_id: &str) -> Result<CycleOutcome, CycleError> {
        let guard = self.cycle_guard(route_id);
        let _cycle = guard.lock().await;
        self.runner.run_cycle(route_id).await
    }

    pub async fn stop_all(&self) {
        let route_ids: Vec<String> = self.monitors.iter().map(|m| m.key().clone()).collect();
        for route_id in route_ids {
            self.stop(&route_id).await;
        }
    }

    pub fn is_running(&self, route_id: &str) -> bool {
        self.monitors.contains_key(route_id)
    }

    pub fn running_routes(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.monitors.iter().map(|m| m.key().clone()).collect();
        ids.sort();
        ids
    }

    /// Why the most recent task for `route_id` ended, if it has.
    pub fn last_exit(&self, route_id: &str) -> Option<MonitorExit> {
        self.exits.get(route_id).map(|e| e.value().clone())
    }

    fn cycle_guard(&self, route_id: &str) -> Arc<Mutex<()>> {
        self.cycle_guards
            .entry(route_id.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    fn finish(&self, route_id: &str, generation: u64, exit: MonitorExit) {
        self.monitors.remove_if(route_id, |_, handle| handle.generation == generation);
        // A newer task owns the route now; its exit is the one that matters.
        if self.monitors.contains_key(route_id) {
            return;
        }
        if exit != MonitorExit::Stopped {
            self.runner.alerts().forget_route(route_id);
        }
        self.exits.insert(route_id.to_string(), exit);
    }
}

async fn run_monitor(
    registry: Arc<RouteMonitorRegistry>,
    route_id: String,
    generation: u64,
    guard: Arc<Mutex<()>>,
    mut shutdown: broadcast::Receiver<()>,
) {
    let mut ticker = interval(registry.cycle_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    let exit = loop {
        tokio::select! {
            biased;
            _ = shutdown.recv() => {
                tracing::info!("Monitor for route {} shutting down", route_id);
                break MonitorExit::Stopped;
            }
            _ = ticker.tick() => {
                let _cycle = guard.lock().await;
                match registry.runner.run_cycle(&route_id).await {
                    Ok(CycleOutcome::Continue(report)) if report.arrived => {
                        break MonitorExit::RouteInactive(RouteStatus::Completed);
                    }
                    Ok(CycleOutcome::Continue(_)) => {}
                    Ok(CycleOutcome::Halt(exit)) => break exit,
                    Err(err) => {
                        tracing::error!("Monitoring cycle for route {} failed: {}", route_id, err);
                    }
                }
            }
        }
    };

    tracing::info!("Monitor for route {} exited: {:?}", route_id, exit);
    registry.finish(&route_id, generation, exit);
}
