//! Minimal metrics registry for the control plane.
//!
//! Counters with dynamic labels backed by `DashMap`. Labels are flattened
//! into sorted key vectors to keep deterministic ordering.

use dashmap::DashMap;
use std::fmt::Write;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::registry::ProbeRegistry;

/// Helper to escape label values.
fn escape_label(v: &str) -> String {
    v.replace('\\', "\\\\").replace('"', "\\\"").replace('\n', "\\n")
}

fn label_str(key: &[(String, String)]) -> String {
    key.iter()
        .map(|(k, v)| format!("{}=\"{}\"", k, escape_label(v)))
        .collect::<Vec<_>>()
        .join(",")
}

#[derive(Default)]
pub struct CounterVec {
    map: DashMap<Vec<(String, String)>, AtomicU64>,
}

impl CounterVec {
    /// Increment by 1.
    pub fn inc(&self, labels: &[(&str, &str)]) {
        self.add(labels, 1);
    }

    /// Increment by an arbitrary value.
    pub fn add(&self, labels: &[(&str, &str)], v: u64) {
        let mut key: Vec<(String, String)> = labels
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        key.sort();

        let counter = self.map.entry(key).or_insert_with(|| AtomicU64::new(0));
        counter.fetch_add(v, Ordering::Relaxed);
    }

    /// Current value for an exact label set (0 if never touched).
    pub fn get(&self, labels: &[(&str, &str)]) -> u64 {
        let mut key: Vec<(String, String)> = labels
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        key.sort();
        self.map
            .get(&key)
            .map(|c| c.load(Ordering::Relaxed))
            .unwrap_or(0)
    }

    /// Render in Prometheus text exposition format.
    fn render(&self, name: &str, out: &mut String) {
        let _ = writeln!(out, "# TYPE {} counter", name);
        let mut rows: Vec<(String, u64)> = self
            .map
            .iter()
            .map(|r| (label_str(r.key()), r.value().load(Ordering::Relaxed)))
            .collect();
        rows.sort();
        for (labels, val) in rows {
            let _ = writeln!(out, "{}{{{}}} {}", name, labels, val);
        }
    }
}

#[derive(Default)]
pub struct ControlMetrics {
    pub attr_writes: CounterVec,
    pub attr_write_errors: CounterVec,
    pub setup_requests: CounterVec,
}

impl ControlMetrics {
    /// Render control-plane counters followed by per-probe counters.
    pub fn render(&self, registry: &ProbeRegistry) -> String {
        let mut out = String::new();
        self.attr_writes.render("faultprobe_attr_writes_total", &mut out);
        self.attr_write_errors.render("faultprobe_attr_write_errors_total", &mut out);
        self.setup_requests.render("faultprobe_setup_requests_total", &mut out);

        let probes = registry.probes();
        let _ = writeln!(out, "# TYPE faultprobe_attempts_total counter");
        for p in &probes {
            let _ = writeln!(out, "faultprobe_attempts_total{{probe=\"{}\"}} {}", escape_label(p.name()), p.attempts());
        }
        let _ = writeln!(out, "# TYPE faultprobe_injected_total counter");
        for p in &probes {
            let _ = writeln!(out, "faultprobe_injected_total{{probe=\"{}\"}} {}", escape_label(p.name()), p.injected());
        }
        let _ = writeln!(out, "# TYPE faultprobe_times_remaining gauge");
        for p in &probes {
            let _ = writeln!(out, "faultprobe_times_remaining{{probe=\"{}\"}} {}", escape_label(p.name()), p.times());
        }
        out
    }
}
