//! # Estadísticas del Servidor
//! src/metrics/mod.rs
//!
//! Contadores de conexiones:
//! - Aceptadas / atendidas / fallidas
//! - Rechazadas por backpressure y descartadas al apagar
//! - Conexiones en proceso y su pico

pub mod collector;

pub use collector::{InFlightGuard, ServerStats, StatsSnapshot};
