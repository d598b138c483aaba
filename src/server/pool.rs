//! # Pool de Workers
//! src/server/pool.rs
//!
//! Número fijo de threads idénticos. Cada uno repite: sacar una conexión de
//! la cola, procesarla, volver a esperar. Salen cuando la cola está vacía y
//! cerrada.

use crate::error::ServerError;
use crate::metrics::ServerStats;
use crate::server::connection::Connection;
use crate::server::handler::ConnectionHandler;
use crate::server::queue::{ConnectionQueue, Pop};
use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use tracing::{debug, error, info};

/// Threads del pool; se consumen con `join`
pub struct WorkerPool {
    workers: Vec<JoinHandle<()>>,
}

impl WorkerPool {
    /// Inicia `count` workers sobre `queue`
    ///
    /// Si algún thread no se puede crear, cierra la cola, espera a los que ya
    /// arrancaron y retorna el error.
    pub fn spawn<C: Connection>(
        count: usize,
        queue: ConnectionQueue<C>,
        handler: Arc<ConnectionHandler>,
        stats: ServerStats,
    ) -> Result<Self, ServerError> {
        let mut workers = Vec::with_capacity(count);

        for id in 0..count {
            let worker_queue = queue.clone();
            let handler = Arc::clone(&handler);
            let stats = stats.clone();

            let spawned = thread::Builder::new()
                .name(format!("worker-{}", id))
                .spawn(move || Self::worker_loop(id, worker_queue, handler, stats));

            match spawned {
                Ok(handle) => workers.push(handle),
                Err(e) => {
                    queue.close();
                    WorkerPool { workers }.join();
                    return Err(ServerError::WorkerSpawn(e));
                }
            }
        }

        info!(workers = count, "worker pool started");
        Ok(Self { workers })
    }

    /// Loop principal del worker
    fn worker_loop<C: Connection>(
        id: usize,
        queue: ConnectionQueue<C>,
        handler: Arc<ConnectionHandler>,
        stats: ServerStats,
    ) {
        debug!(worker = id, "worker started");

        while let Pop::Item(conn) = queue.pop_blocking() {
            debug!(worker = id, peer = %conn.peer(), "worker picked up connection");

            // Un panic del builder no debe matar al worker; la conexión se
            // libera al desenrollar
            let result = panic::catch_unwind(AssertUnwindSafe(|| handler.handle(conn)));

            if let Err(payload) = result {
                stats.record_worker_panic();
                error!(worker = id, reason = panic_message(&*payload), "connection handler panicked");
            }
        }

        debug!(worker = id, "queue closed, worker exiting");
    }

    pub fn len(&self) -> usize {
        self.workers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.workers.is_empty()
    }

    /// Espera a que terminen todos los workers
    ///
    /// Retorna cuántos terminaron por panic fuera del handler.
    pub fn join(self) -> usize {
        let mut crashed = 0;
        for handle in self.workers {
            let name = handle.thread().name().unwrap_or("worker").to_string();
            if handle.join().is_err() {
                error!(worker = %name, "worker thread terminated abnormally");
                crashed += 1;
            }
        }
        crashed
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.as_str()
    } else {
        "unknown panic"
    }
}
