//! # Señal de Apagado
//! src/server/shutdown.rs
//!
//! Reemplaza la bandera global `running`: cada servidor tiene su propia señal
//! y la comparte explícitamente con el listener y los workers.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Condvar, Mutex};
use std::time::Duration;

/// Señal de apagado compartida. Pasa de "corriendo" a "disparada" una sola vez.
#[derive(Clone, Default)]
pub struct ShutdownSignal {
    inner: Arc<Inner>,
}

#[derive(Default)]
struct Inner {
    triggered: AtomicBool,
    lock: Mutex<()>,
    condvar: Condvar,
}

impl ShutdownSignal {
    pub fn new() -> Self {
        Self::default()
    }

    /// Dispara la señal. Retorna `true` solo para la llamada que la disparó.
    pub fn trigger(&self) -> bool {
        let _guard = self.inner.lock.lock().unwrap_or_else(|e| e.into_inner());
        let first = !self.inner.triggered.swap(true, Ordering::AcqRel);
        self.inner.condvar.notify_all();
        first
    }

    pub fn is_triggered(&self) -> bool {
        self.inner.triggered.load(Ordering::Acquire)
    }

    /// Duerme hasta `timeout` o hasta que se dispare la señal.
    ///
    /// Retorna `true` si la señal está disparada al despertar.
    pub fn wait_timeout(&self, timeout: Duration) -> bool {
        let guard = self.inner.lock.lock().unwrap_or_else(|e| e.into_inner());
        let (_guard, _) = self
            .inner
            .condvar
            .wait_timeout_while(guard, timeout, |_| !self.inner.triggered.load(Ordering::Acquire))
            .unwrap_or_else(|e| e.into_inner());
        self.is_triggered()
    }
}
