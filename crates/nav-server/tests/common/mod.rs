#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::Semaphore;

use nav_core::models::{
    EnvironmentReading, GeoPoint, NavigationAlert, NavigationEnvironment, Obstacle, ObstacleKind,
    ObstacleSeverity, Position, Route, RouteReplanHistory, RouteRequest, RouteStatus, SeaConditions, SeaState,
    Waypoint, WeatherCondition, WeatherConditions,
};
use nav_server::backoff::RetryPolicy;
use nav_server::config::Config;
use nav_server::controller::RouteController;
use nav_server::persistence::{MemoryStore, RouteStore};
use nav_server::sensors::SensorFeed;

/// Sensor feed that replays scripted scans and a fixed reading.
pub struct ScriptedSensors {
    reading: Mutex<EnvironmentReading>,
    scans: Mutex<VecDeque<Vec<Obstacle>>>,
    scan_gate: Mutex<Option<Arc<Semaphore>>>,
    scans_in_flight: AtomicUsize,
    max_scans_in_flight: AtomicUsize,
    pub fail_sample: AtomicBool,
    pub fail_scan: AtomicBool,
}

impl ScriptedSensors {
    pub fn calm() -> Self {
        Self {
            reading: Mutex::new(reading(WeatherCondition::Clear, 1.0, 10.0)),
            scans: Mutex::new(VecDeque::new()),
            scan_gate: Mutex::new(None),
            scans_in_flight: AtomicUsize::new(0),
            max_scans_in_flight: AtomicUsize::new(0),
            fail_sample: AtomicBool::new(false),
            fail_scan: AtomicBool::new(false),
        }
    }

    /// Block every scan from now on until `release_scans`.
    pub fn hold_scans(&self) {
        *self.scan_gate.lock().unwrap() = Some(Arc::new(Semaphore::new(0)));
    }

    pub fn release_scans(&self) {
        if let Some(gate) = self.scan_gate.lock().unwrap().take() {
            gate.close();
        }
    }

    pub fn scans_in_flight(&self) -> usize {
        self.scans_in_flight.load(Ordering::SeqCst)
    }

    /// Most scans ever observed running at the same time.
    pub fn max_scans_in_flight(&self) -> usize {
        self.max_scans_in_flight.load(Ordering::SeqCst)
    }

    pub fn set_reading(&self, reading: EnvironmentReading) {
        *self.reading.lock().unwrap() = reading;
    }

    /// Queue the result of the next scan; scans beyond the queue see nothing.
    pub fn push_scan(&self, obstacles: Vec<Obstacle>) {
        self.scans.lock().unwrap().push_back(obstacles);
    }
}

#[async_trait]
impl SensorFeed for ScriptedSensors {
    async fn sample(&self, position: &Position) -> Result<EnvironmentReading> {
        if self.fail_sample.load(Ordering::SeqCst) {
            return Err(anyhow!("weather feed offline"));
        }
        let mut reading = self.reading.lock().unwrap().clone();
        reading.location = position.point();
        Ok(reading)
    }

    async fn scan(&self, _position: &Position) -> Result<Vec<Obstacle>> {
        let running = self.scans_in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_scans_in_flight.fetch_max(running, Ordering::SeqCst);

        let gate = self.scan_gate.lock().unwrap().clone();
        if let Some(gate) = gate {
            // Closing the semaphore is the release signal.
            let _ = gate.acquire().await;
        }
        self.scans_in_flight.fetch_sub(1, Ordering::SeqCst);

        if self.fail_scan.load(Ordering::SeqCst) {
            return Err(anyhow!("radar offline"));
        }
        Ok(self.scans.lock().unwrap().pop_front().unwrap_or_default())
    }
}

/// A status or replan write that landed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreWrite {
    Status(RouteStatus),
    ApplyReplan,
}

/// `MemoryStore` with switchable failures that records the status writes it lets through.
#[derive(Default)]
pub struct FlakyStore {
    pub inner: MemoryStore,
    pub fail_get: AtomicBool,
    pub fail_apply: AtomicBool,
    /// Number of upcoming `update_status` calls that fail
    pub failing_status_writes: AtomicU32,
    writes: Mutex<Vec<StoreWrite>>,
}

impl FlakyStore {
    pub fn fail_next_status_writes(&self, count: u32) {
        self.failing_status_writes.store(count, Ordering::SeqCst);
    }

    pub fn take_writes(&self) -> Vec<StoreWrite> {
        std::mem::take(&mut *self.writes.lock().unwrap())
    }

    fn record(&self, write: StoreWrite) {
        self.writes.lock().unwrap().push(write);
    }
}

#[async_trait]
impl RouteStore for FlakyStore {
    async fn insert_route(&self, route: &Route) -> Result<()> {
        self.inner.insert_route(route).await
    }

    async fn get_route(&self, route_id: &str) -> Result<Option<Route>> {
        if self.fail_get.load(Ordering::SeqCst) {
            return Err(anyhow!("database is locked"));
        }
        self.inner.get_route(route_id).await
    }

    async fn list_routes_by_status(&self, statuses: &[RouteStatus]) -> Result<Vec<Route>> {
        self.inner.list_routes_by_status(statuses).await
    }

    async fn update_status(&self, route_id: &str, from: RouteStatus, to: RouteStatus) -> Result<bool> {
        let failing = self
            .failing_status_writes
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if failing {
            return Err(anyhow!("disk I/O error"));
        }
        let written = self.inner.update_status(route_id, from, to).await?;
        if written {
            self.record(StoreWrite::Status(to));
        }
        Ok(written)
    }

    async fn update_position(&self, route_id: &str, position: &Position) -> Result<bool> {
        self.inner.update_position(route_id, position).await
    }

    async fn update_obstacles(&self, route_id: &str, obstacles: &[Obstacle]) -> Result<bool> {
        self.inner.update_obstacles(route_id, obstacles).await
    }

    async fn apply_replan(&self, history: &RouteReplanHistory) -> Result<bool> {
        if self.fail_apply.load(Ordering::SeqCst) {
            return Err(anyhow!("database disk image is malformed"));
        }
        let applied = self.inner.apply_replan(history).await?;
        if applied {
            self.record(StoreWrite::ApplyReplan);
        }
        Ok(applied)
    }

    async fn insert_alert(&self, alert: &NavigationAlert) -> Result<()> {
        self.inner.insert_alert(alert).await
    }

    async fn list_alerts(&self, route_id: &str) -> Result<Vec<NavigationAlert>> {
        self.inner.list_alerts(route_id).await
    }

    async fn list_replan_history(&self, route_id: &str) -> Result<Vec<RouteReplanHistory>> {
        self.inner.list_replan_history(route_id).await
    }

    async fn insert_environment(&self, sample: &NavigationEnvironment) -> Result<()> {
        self.inner.insert_environment(sample).await
    }

    async fn list_environment(&self, route_id: &str, limit: usize) -> Result<Vec<NavigationEnvironment>> {
        self.inner.list_environment(route_id, limit).await
    }
}

pub fn test_config(cycle_interval: Duration) -> Config {
    let mut config = Config::default();
    config.cycle_interval = cycle_interval;
    config.status_retry = RetryPolicy {
        attempts: 3,
        base_delay: Duration::from_millis(1),
        max_delay: Duration::from_millis(4),
    };
    config
}

pub struct Harness<S> {
    pub store: Arc<S>,
    pub sensors: Arc<ScriptedSensors>,
    pub controller: RouteController,
}

pub fn harness_with<S: RouteStore + 'static>(store: S, cycle_interval: Duration) -> Harness<S> {
    let store = Arc::new(store);
    let sensors = Arc::new(ScriptedSensors::calm());
    let controller = RouteController::new(store.clone(), sensors.clone(), &test_config(cycle_interval));
    Harness { store, sensors, controller }
}

pub fn harness(cycle_interval: Duration) -> Harness<MemoryStore> {
    harness_with(MemoryStore::new(), cycle_interval)
}

pub fn request(name: &str) -> RouteRequest {
    RouteRequest {
        name: name.to_string(),
        origin: GeoPoint::new(37.0, -76.3),
        destination: GeoPoint::new(37.3, -76.3),
        waypoints: None,
        autonomy_level: None,
        created_by: Some("ops".to_string()),
    }
}

impl<S: RouteStore> Harness<S> {
    /// Create a route and mark it Active without spawning a monitor.
    pub async fn active_route(&self, request: RouteRequest) -> Route {
        let mut route = self.controller.create_route(request).await.unwrap();
        self.store
            .update_status(&route.route_id, RouteStatus::Planning, RouteStatus::Active)
            .await
            .unwrap();
        route.status = RouteStatus::Active;
        route
    }

    pub async fn environment_count(&self, route_id: &str) -> usize {
        self.store.list_environment(route_id, usize::MAX).await.unwrap().len()
    }
}

pub fn reading(condition: WeatherCondition, wave_height_m: f64, wind_speed_knots: f64) -> EnvironmentReading {
    EnvironmentReading {
        location: GeoPoint::new(37.0, -76.3),
        weather: WeatherConditions {
            condition,
            temperature_c: 18.0,
            humidity_pct: 70.0,
            precipitation_mm: 0.0,
        },
        sea_state: SeaConditions {
            state: SeaState::Moderate,
            wave_height_m,
            wave_period_s: 6.0,
            swell_direction_deg: 120.0,
        },
        visibility_m: 10_000.0,
        wind_speed_knots,
        wave_height_m,
    }
}

pub fn obstacle(id: &str, lat: f64, lon: f64, severity: ObstacleSeverity) -> Obstacle {
    Obstacle {
        id: id.to_string(),
        kind: ObstacleKind::Vessel,
        lat,
        lon,
        severity,
        distance_m: 1_200.0,
        detected_at: Utc::now(),
    }
}

pub fn assert_orders_increasing(waypoints: &[Waypoint]) {
    for pair in waypoints.windows(2) {
        assert!(pair[0].order < pair[1].order, "orders {:?}", waypoints);
    }
}

/// Poll `check` until it holds or about two seconds pass.
pub async fn eventually<F: Fn() -> bool>(check: F) -> bool {
    for _ in 0..200 {
        if check() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    check()
}
