//! Labelled counters and gauges backed by `DashMap`.
//!
//! Labels are flattened into sorted key vectors so rendering is deterministic
//! regardless of the order callers pass them in.

use dashmap::DashMap;
use std::fmt::Write;
use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};

fn escape_label(v: &str) -> String {
    v.replace('\\', "\\\\").replace('"', "\\\"").replace('\n', "\\n")
}

fn label_key(labels: &[(&str, &str)]) -> Vec<(String, String)> {
    let mut key: Vec<(String, String)> = labels
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
    key.sort();
    key
}

fn render_series(name: &str, key: &[(String, String)], val: impl std::fmt::Display, out: &mut String) {
    if key.is_empty() {
        let _ = writeln!(out, "{name} {val}");
        return;
    }
    let label_str = key
        .iter()
        .map(|(k, v)| format!("{}=\"{}\"", k, escape_label(v)))
        .collect::<Vec<_>>()
        .join(",");
    let _ = writeln!(out, "{name}{{{label_str}}} {val}");
}

#[derive(Default)]
pub struct CounterVec {
    map: DashMap<Vec<(String, String)>, AtomicU64>,
}

impl CounterVec {
    pub fn inc(&self, labels: &[(&str, &str)]) {
        self.add(labels, 1);
    }

    pub fn add(&self, labels: &[(&str, &str)], v: u64) {
        let counter = self
            .map
            .entry(label_key(labels))
            .or_insert_with(|| AtomicU64::new(0));
        counter.fetch_add(v, Ordering::Relaxed);
    }

    /// Current value for one label set (0 when never touched).
    pub fn get(&self, labels: &[(&str, &str)]) -> u64 {
        self.map
            .get(&label_key(labels))
            .map(|c| c.load(Ordering::Relaxed))
            .unwrap_or(0)
    }

    fn render(&self, name: &str, out: &mut String) {
        let _ = writeln!(out, "# TYPE {} counter", name);
        for r in self.map.iter() {
            render_series(name, r.key(), r.value().load(Ordering::Relaxed), out);
        }
    }
}

#[derive(Default)]
pub struct GaugeVec {
    map: DashMap<Vec<(String, String)>, AtomicI64>,
}

impl GaugeVec {
    pub fn inc(&self, labels: &[(&str, &str)]) {
        self.add(labels, 1);
    }

    pub fn dec(&self, labels: &[(&str, &str)]) {
        self.add(labels, -1);
    }

    pub fn add(&self, labels: &[(&str, &str)], v: i64) {
        let gauge = self
            .map
            .entry(label_key(labels))
            .or_insert_with(|| AtomicI64::new(0));
        gauge.fetch_add(v, Ordering::Relaxed);
    }

    pub fn get(&self, labels: &[(&str, &str)]) -> i64 {
        self.map
            .get(&label_key(labels))
            .map(|g| g.load(Ordering::Relaxed))
            .unwrap_or(0)
    }

    fn render(&self, name: &str, out: &mut String) {
        let _ = writeln!(out, "# TYPE {} gauge", name);
        for r in self.map.iter() {
            render_series(name, r.key(), r.value().load(Ordering::Relaxed), out);
        }
    }
}

#[derive(Default)]
pub struct GatewayMetrics {
    /// Upgrade attempts by `result` (ok, unauthenticated, auth_failed, failed).
    pub ws_upgrades: CounterVec,
    pub clients_active: GaugeVec,
    pub bridges_spawned: CounterVec,
    pub bridges_active: GaugeVec,
    pub frames_delivered: CounterVec,
    /// Frames not enqueued, by `reason` (queue_full, closed).
    pub frames_dropped: CounterVec,
    pub decode_errors: CounterVec,
    /// Broker failures by `op` (subscribe, stream_end).
    pub broker_errors: CounterVec,
    pub presence_errors: CounterVec,
}

impl GatewayMetrics {
    /// Render all metrics in Prometheus text format.
    pub fn render(&self, draining: bool) -> String {
        let mut out = String::new();
        self.ws_upgrades.render("roomcast_ws_upgrades_total", &mut out);
        self.clients_active.render("roomcast_clients_active", &mut out);
        self.bridges_spawned.render("roomcast_bridges_spawned_total", &mut out);
        self.bridges_active.render("roomcast_bridges_active", &mut out);
        self.frames_delivered.render("roomcast_frames_delivered_total", &mut out);
        self.frames_dropped.render("roomcast_frames_dropped_total", &mut out);
        self.decode_errors.render("roomcast_decode_errors_total", &mut out);
        self.broker_errors.render("roomcast_broker_errors_total", &mut out);
        self.presence_errors.render("roomcast_presence_errors_total", &mut out);

        let _ = writeln!(
            out,
            "# TYPE roomcast_draining gauge\nroomcast_draining {}",
            u8::from(draining)
        );
        out
    }
}
