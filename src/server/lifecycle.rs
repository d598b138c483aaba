//! # Ciclo de Vida del Servidor
//! src/server/lifecycle.rs
//!
//! Orden de arranque: bind → workers → accept loop.
//! Orden de apagado: dejar de aceptar → cerrar la cola → aplicar la política
//! de drenado → esperar a los workers → liberar el socket.
//!
//! Estados: `Created → Started → Listening → ShuttingDown → Stopped`.
//! `Stopped` es terminal.

use crate::config::{Config, DrainPolicy};
use crate::error::{Result, ServerError};
use crate::metrics::{ServerStats, StatsSnapshot};
use crate::response::ResponseBuilder;
use crate::server::connection::Connection;
use crate::server::handler::ConnectionHandler;
use crate::server::listener::{Listener, ListenerOptions};
use crate::server::pool::WorkerPool;
use crate::server::queue::ConnectionQueue;
use crate::server::shutdown::ShutdownSignal;
use serde::Serialize;
use std::fmt;
use std::net::{SocketAddr, TcpListener, TcpStream};
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Instant;
use tracing::{debug, info, warn};

/// Estado del ciclo de vida
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServerState {
    Created,
    Started,
    Listening,
    ShuttingDown,
    Stopped,
}

impl ServerState {
    fn from_u8(value: u8) -> Self {
        match value {
            0 => ServerState::Created,
            1 => ServerState::Started,
            2 => ServerState::Listening,
            3 => ServerState::ShuttingDown,
            _ => ServerState::Stopped,
        }
    }
}

impl fmt::Display for ServerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

#[derive(Default)]
struct StateCell(AtomicU8);

impl StateCell {
    fn get(&self) -> ServerState {
        ServerState::from_u8(self.0.load(Ordering::Acquire))
    }

    fn set(&self, state: ServerState) {
        self.0.store(state as u8, Ordering::Release);
    }

    /// Cambia de estado solo si el actual es `from`
    fn transition(&self, from: ServerState, to: ServerState) -> bool {
        self.0
            .compare_exchange(from as u8, to as u8, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }
}

/// Resumen que retorna el servidor al apagarse
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ShutdownReport {
    pub accepted: u64,
    pub served: u64,
    pub read_failures: u64,
    pub write_failures: u64,
    pub rejected: u64,
    pub discarded: u64,
    pub peak_in_flight: u64,
    pub worker_panics: u64,
    pub worker_crashes: usize,
}

impl ShutdownReport {
    fn new(snapshot: StatsSnapshot, worker_crashes: usize) -> Self {
        Self {
            accepted: snapshot.accepted,
            served: snapshot.served,
            read_failures: snapshot.read_failures,
            write_failures: snapshot.write_failures,
            rejected: snapshot.rejected,
            discarded: snapshot.discarded,
            peak_in_flight: snapshot.peak_in_flight,
            worker_panics: snapshot.worker_panics,
            worker_crashes,
        }
    }
}

/// Servidor TCP con pool fijo de workers
pub struct Server {
    config: Config,
    local_addr: SocketAddr,
    listener: Option<Listener>,
    queue: ConnectionQueue<TcpStream>,
    handler: Arc<ConnectionHandler>,
    pool: Option<WorkerPool>,
    shutdown: ShutdownSignal,
    stats: ServerStats,
    state: Arc<StateCell>,
}

impl Server {
    /// Valida la configuración y hace bind. El servidor queda en `Created`.
    pub fn bind(config: Config, builder: Arc<dyn ResponseBuilder>) -> Result<Self> {
        config.validate().map_err(ServerError::InvalidConfig)?;
        let addr = config.socket_addr()?;

        let socket = TcpListener::bind(addr).map_err(|source| ServerError::Bind { addr, source })?;
        let local_addr = socket.local_addr()?;

        let queue = ConnectionQueue::new(config.queue_capacity);
        let shutdown = ShutdownSignal::new();
        let stats = ServerStats::new();
        let handler = Arc::new(ConnectionHandler::new(
            Arc::clone(&builder),
            stats.clone(),
            config.read_buffer_size,
        ));

        let options = ListenerOptions {
            backpressure: config.backpressure,
            io_timeout: config.io_timeout(),
            poll_interval: config.accept_poll(),
        };
        let listener = Listener::new(
            socket,
            queue.clone(),
            shutdown.clone(),
            stats.clone(),
            builder,
            options,
        )?;

        info!(address = %local_addr, "server bound");

        Ok(Self {
            config,
            local_addr,
            listener: Some(listener),
            queue,
            handler,
            pool: None,
            shutdown,
            stats,
            state: Arc::new(StateCell::default()),
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn state(&self) -> ServerState {
        self.state.get()
    }

    pub fn stats(&self) -> StatsSnapshot {
        self.stats.snapshot()
    }

    /// Handle para consultar o apagar el servidor desde otro thread
    pub fn handle(&self) -> ServerHandle {
        ServerHandle {
            local_addr: self.local_addr,
            queue: self.queue.clone(),
            shutdown: self.shutdown.clone(),
            stats: self.stats.clone(),
            state: Arc::clone(&self.state),
        }
    }

    fn expect_state(&self, expected: ServerState) -> Result<()> {
        let actual = self.state();
        if actual != expected {
            return Err(ServerError::InvalidState { expected, actual });
        }
        Ok(())
    }

    /// Inicia el pool de workers: `Created → Started`
    pub fn start(&mut self) -> Result<()> {
        self.expect_state(ServerState::Created)?;

        match WorkerPool::spawn(
            self.config.workers,
            self.queue.clone(),
            Arc::clone(&self.handler),
            self.stats.clone(),
        ) {
            Ok(pool) => {
                self.pool = Some(pool);
                self.state.set(ServerState::Started);
                Ok(())
            }
            Err(e) => {
                self.finish_shutdown();
                Err(e)
            }
        }
    }

    /// Corre el accept loop en el thread actual: `Started → Listening`
    ///
    /// Bloquea hasta que alguien llame `ServerHandle::shutdown`, luego ejecuta
    /// el apagado completo y retorna el reporte.
    pub fn listen(&mut self) -> Result<ShutdownReport> {
        self.expect_state(ServerState::Started)?;

        let listener = match self.listener.take() {
            Some(listener) => listener,
            None => {
                return Err(ServerError::InvalidState {
                    expected: ServerState::Started,
                    actual: self.state(),
                })
            }
        };

        self.state.set(ServerState::Listening);
        listener.run();

        Ok(self.finish_shutdown())
    }

    /// Arranca y escucha en un thread propio
    pub fn spawn(mut self) -> Result<(ServerHandle, JoinHandle<Result<ShutdownReport>>)> {
        if self.state() == ServerState::Created {
            self.start()?;
        }
        let handle = self.handle();

        let join = thread::Builder::new()
            .name("listener".to_string())
            .spawn(move || self.listen())
            .map_err(ServerError::WorkerSpawn)?;

        Ok((handle, join))
    }

    /// Apaga un servidor que no está escuchando (en `Created` o `Started`)
    pub fn shutdown(&mut self) -> Result<ShutdownReport> {
        match self.state() {
            ServerState::Created | ServerState::Started => Ok(self.finish_shutdown()),
            actual => Err(ServerError::InvalidState {
                expected: ServerState::Started,
                actual,
            }),
        }
    }

    fn finish_shutdown(&mut self) -> ShutdownReport {
        self.state.set(ServerState::ShuttingDown);
        self.shutdown.trigger();
        self.queue.close();

        // Si nunca se llegó a escuchar, el socket sigue aquí
        if self.listener.take().is_some() {
            info!(address = %self.local_addr, "listening socket released");
        }

        let queue = self.queue.stats();
        debug!(queued = queue.queued, capacity = queue.capacity, "queue state at shutdown");

        // Sin workers nadie va a vaciar la cola
        let drain = if self.pool.is_some() { self.config.drain } else { DrainPolicy::Discard };

        match drain {
            DrainPolicy::Drain => {
                let deadline = Instant::now() + self.config.shutdown_grace();
                if !self.queue.wait_until_empty(deadline) {
                    warn!(
                        grace_ms = self.config.shutdown_grace_ms,
                        "shutdown grace period expired with connections still queued"
                    );
                    self.discard_queued();
                }
            }
            DrainPolicy::Discard => self.discard_queued(),
        }

        let worker_crashes = self.pool.take().map(WorkerPool::join).unwrap_or(0);

        self.state.set(ServerState::Stopped);

        let report = ShutdownReport::new(self.stats.snapshot(), worker_crashes);
        info!(
            served = report.served,
            discarded = report.discarded,
            rejected = report.rejected,
            "server shut down gracefully"
        );
        report
    }

    fn discard_queued(&self) {
        let remaining = self.queue.discard_remaining();
        if remaining.is_empty() {
            return;
        }

        warn!(count = remaining.len(), "closing queued connections without processing");
        self.stats.record_discarded(remaining.len());
        for conn in remaining {
            conn.close();
        }
    }
}

impl Drop for Server {
    fn drop(&mut self) {
        if self.state() != ServerState::Stopped {
            self.finish_shutdown();
        }
    }
}

/// Handle clonable para controlar un servidor desde otro thread
#[derive(Clone)]
pub struct ServerHandle {
    local_addr: SocketAddr,
    queue: ConnectionQueue<TcpStream>,
    shutdown: ShutdownSignal,
    stats: ServerStats,
    state: Arc<StateCell>,
}

impl ServerHandle {
    /// Pide el apagado: el accept loop termina y la cola se cierra.
    ///
    /// Un servidor en `Listening` pasa a `ShuttingDown` antes de retornar.
    /// Retorna `true` solo para la primera llamada.
    pub fn shutdown(&self) -> bool {
        let first = self.shutdown.trigger();
        self.state.transition(ServerState::Listening, ServerState::ShuttingDown);
        self.queue.close();
        if first {
            info!(address = %self.local_addr, "shutdown requested");
        }
        first
    }

    pub fn is_shutdown_requested(&self) -> bool {
        self.shutdown.is_triggered()
    }

    pub fn state(&self) -> ServerState {
        self.state.get()
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Conexiones aceptadas que esperan un worker
    pub fn queued(&self) -> usize {
        self.queue.len()
    }

    pub fn stats(&self) -> StatsSnapshot {
        self.stats.snapshot()
    }

    /// Estadísticas completas en JSON, incluidos bytes y uptime
    pub fn stats_json(&self) -> String {
        self.stats.to_json()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::response::{Echo, StaticPage};

    fn test_config() -> Config {
        Config {
            port: 0,
            workers: 2,
            accept_poll_ms: 10,
            shutdown_grace_ms: 500,
            ..Config::default()
        }
    }

    #[test]
    fn test_state_transitions() {
        let mut server = Server::bind(test_config(), Arc::new(Echo)).unwrap();
        assert_eq!(server.state(), ServerState::Created);

        server.start().unwrap();
        assert_eq!(server.state(), ServerState::Started);

        let report = server.shutdown().unwrap();
        assert_eq!(server.state(), ServerState::Stopped);
        assert_eq!(report.served, 0);
        assert_eq!(report.worker_crashes, 0);
    }

    #[test]
    fn test_stopped_is_terminal() {
        let mut server = Server::bind(test_config(), Arc::new(Echo)).unwrap();
        server.shutdown().unwrap();

        assert!(matches!(
            server.start(),
            Err(ServerError::InvalidState { actual: ServerState::Stopped, .. })
        ));
        assert!(matches!(server.listen(), Err(ServerError::InvalidState { .. })));
        assert!(server.shutdown().is_err());
    }

    #[test]
    fn test_listen_requires_start() {
        let mut server = Server::bind(test_config(), Arc::new(Echo)).unwrap();
        assert!(matches!(
            server.listen(),
            Err(ServerError::InvalidState { expected: ServerState::Started, actual: ServerState::Created })
        ));
    }

    #[test]
    fn test_double_start_rejected() {
        let mut server = Server::bind(test_config(), Arc::new(Echo)).unwrap();
        server.start().unwrap();
        assert!(server.start().is_err());
    }

    #[test]
    fn test_bind_invalid_config() {
        let config = Config { workers: 0, ..test_config() };
        assert!(matches!(
            Server::bind(config, Arc::new(Echo)),
            Err(ServerError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_bind_invalid_address() {
        let config = Config { host: "not-an-ip".to_string(), ..test_config() };
        assert!(matches!(
            Server::bind(config, Arc::new(Echo)),
            Err(ServerError::InvalidAddress { .. })
        ));
    }

    #[test]
    fn test_bind_port_in_use() {
        let taken = TcpListener::bind("127.0.0.1:0").unwrap();
        let config = Config {
            port: taken.local_addr().unwrap().port(),
            ..test_config()
        };
        assert!(matches!(
            Server::bind(config, Arc::new(Echo)),
            Err(ServerError::Bind { .. })
        ));
    }

    #[test]
    fn test_drop_releases_socket() {
        let server = Server::bind(test_config(), Arc::new(StaticPage::new())).unwrap();
        let addr = server.local_addr();
        drop(server);
        assert!(TcpListener::bind(addr).is_ok());
    }

    #[test]
    fn test_handle_shutdown_unblocks_listen() {
        let server = Server::bind(test_config(), Arc::new(Echo)).unwrap();
        let (handle, join) = server.spawn().unwrap();

        let deadline = Instant::now() + std::time::Duration::from_secs(5);
        while handle.state() != ServerState::Listening && Instant::now() < deadline {
            thread::sleep(std::time::Duration::from_millis(5));
        }
        assert_eq!(handle.state(), ServerState::Listening);

        assert!(handle.shutdown());
        assert!(!handle.shutdown());

        let report = join.join().unwrap().unwrap();
        assert_eq!(report.worker_crashes, 0);
        assert_eq!(handle.state(), ServerState::Stopped);
    }

    #[test]
    fn test_handle_shutdown_moves_to_shutting_down() {
        use std::io::Write;
        use std::net::TcpStream;
        use std::sync::mpsc;
        use std::sync::Mutex;
        use std::time::Duration;

        let (release, gate) = mpsc::channel::<()>();
        let gate = Mutex::new(gate);
        let builder = Arc::new(move |req: &[u8]| {
            let _ = gate.lock().unwrap().recv();
            req.to_vec()
        });
        let server = Server::bind(test_config(), builder).unwrap();
        let (handle, join) = server.spawn().unwrap();

        let deadline = Instant::now() + Duration::from_secs(5);
        while handle.state() != ServerState::Listening && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(5));
        }

        // Un worker ocupado impide llegar a Stopped
        let mut client = TcpStream::connect(handle.local_addr()).unwrap();
        client.write_all(b"hold").unwrap();
        while handle.stats().in_flight != 1 && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(5));
        }
        assert_eq!(handle.stats().in_flight, 1);
        assert!(!handle.is_shutdown_requested());

        assert!(handle.shutdown());
        assert!(handle.is_shutdown_requested());
        assert_eq!(handle.state(), ServerState::ShuttingDown);

        release.send(()).unwrap();
        let report = join.join().unwrap().unwrap();
        assert_eq!(report.served, 1);
        assert_eq!(handle.state(), ServerState::Stopped);
    }
}
