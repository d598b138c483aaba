//! # Collector de Estadísticas
//! src/metrics/collector.rs
//!
//! Contadores del servidor: conexiones aceptadas, atendidas, fallidas,
//! rechazadas y descartadas, más las conexiones en proceso y su pico.

use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

/// Collector de estadísticas thread-safe, sin locks
#[derive(Clone)]
pub struct ServerStats {
    inner: Arc<Counters>,
    start_time: Instant,
}

#[derive(Default)]
struct Counters {
    accepted: AtomicU64,
    served: AtomicU64,
    read_failures: AtomicU64,
    write_failures: AtomicU64,
    rejected: AtomicU64,
    discarded: AtomicU64,
    bytes_received: AtomicU64,
    bytes_sent: AtomicU64,
    in_flight: AtomicU64,
    peak_in_flight: AtomicU64,
    worker_panics: AtomicU64,
}

impl ServerStats {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Counters::default()),
            start_time: Instant::now(),
        }
    }

    pub fn record_accepted(&self) {
        self.inner.accepted.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_served(&self, received: usize, sent: usize) {
        self.inner.served.fetch_add(1, Ordering::Relaxed);
        self.inner.bytes_received.fetch_add(received as u64, Ordering::Relaxed);
        self.inner.bytes_sent.fetch_add(sent as u64, Ordering::Relaxed);
    }

    pub fn record_read_failure(&self) {
        self.inner.read_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_write_failure(&self, received: usize, sent: usize) {
        self.inner.write_failures.fetch_add(1, Ordering::Relaxed);
        self.inner.bytes_received.fetch_add(received as u64, Ordering::Relaxed);
        self.inner.bytes_sent.fetch_add(sent as u64, Ordering::Relaxed);
    }

    pub fn record_rejected(&self) {
        self.inner.rejected.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_discarded(&self, count: usize) {
        self.inner.discarded.fetch_add(count as u64, Ordering::Relaxed);
    }

    pub fn record_worker_panic(&self) {
        self.inner.worker_panics.fetch_add(1, Ordering::Relaxed);
    }

    /// Marca el inicio del procesamiento de una conexión
    ///
    /// El guard descuenta la conexión al soltarse, incluso si el handler hace panic.
    pub fn begin_in_flight(&self) -> InFlightGuard<'_> {
        let now = self.inner.in_flight.fetch_add(1, Ordering::AcqRel) + 1;
        self.inner.peak_in_flight.fetch_max(now, Ordering::AcqRel);
        InFlightGuard { stats: self }
    }

    pub fn in_flight(&self) -> u64 {
        self.inner.in_flight.load(Ordering::Acquire)
    }

    pub fn peak_in_flight(&self) -> u64 {
        self.inner.peak_in_flight.load(Ordering::Acquire)
    }

    /// Obtiene un snapshot de las estadísticas
    pub fn snapshot(&self) -> StatsSnapshot {
        let c = &self.inner;
        StatsSnapshot {
            uptime_secs: self.start_time.elapsed().as_secs(),
            accepted: c.accepted.load(Ordering::Relaxed),
            served: c.served.load(Ordering::Relaxed),
            read_failures: c.read_failures.load(Ordering::Relaxed),
            write_failures: c.write_failures.load(Ordering::Relaxed),
            rejected: c.rejected.load(Ordering::Relaxed),
            discarded: c.discarded.load(Ordering::Relaxed),
            bytes_received: c.bytes_received.load(Ordering::Relaxed),
            bytes_sent: c.bytes_sent.load(Ordering::Relaxed),
            in_flight: c.in_flight.load(Ordering::Acquire),
            peak_in_flight: c.peak_in_flight.load(Ordering::Acquire),
            worker_panics: c.worker_panics.load(Ordering::Relaxed),
        }
    }

    /// Obtiene las estadísticas actuales en formato JSON
    pub fn to_json(&self) -> String {
        serde_json::to_string_pretty(&self.snapshot()).unwrap_or_else(|_| "{}".to_string())
    }
}

impl Default for ServerStats {
    fn default() -> Self {
        Self::new()
    }
}

/// Descuenta una conexión en proceso al soltarse
pub struct InFlightGuard<'a> {
    stats: &'a ServerStats,
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.stats.inner.in_flight.fetch_sub(1, Ordering::AcqRel);
    }
}

/// Snapshot de estadísticas (para uso externo)
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct StatsSnapshot {
    pub uptime_secs: u64,
    pub accepted: u64,
    pub served: u64,
    pub read_failures: u64,
    pub write_failures: u64,
    pub rejected: u64,
    pub discarded: u64,
    pub bytes_received: u64,
    pub bytes_sent: u64,
    pub in_flight: u64,
    pub peak_in_flight: u64,
    pub worker_panics: u64,
}
