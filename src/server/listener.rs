//! # Listener (Accept Loop)
//! src/server/listener.rs
//!
//! Acepta conexiones y las encola. El socket está en modo no bloqueante y el
//! loop revisa la señal de apagado antes de cada `accept`, así que terminar
//! no depende de cerrar el socket debajo de un `accept` bloqueado.

use crate::config::BackpressurePolicy;
use crate::metrics::ServerStats;
use crate::response::ResponseBuilder;
use crate::server::connection::Connection;
use crate::server::queue::{ConnectionQueue, PushError};
use crate::server::shutdown::ShutdownSignal;
use std::io::{self, ErrorKind, Write};
use std::net::{SocketAddr, TcpListener, TcpStream};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Pausa después de un error de `accept` que no es `WouldBlock`
/// (por ejemplo, se acabaron los descriptores)
const ACCEPT_ERROR_BACKOFF: Duration = Duration::from_millis(100);

/// Parámetros del accept loop
#[derive(Debug, Clone, Copy)]
pub struct ListenerOptions {
    pub backpressure: BackpressurePolicy,
    pub io_timeout: Option<Duration>,
    pub poll_interval: Duration,
}

pub struct Listener {
    socket: TcpListener,
    queue: ConnectionQueue<TcpStream>,
    shutdown: ShutdownSignal,
    stats: ServerStats,
    builder: Arc<dyn ResponseBuilder>,
    options: ListenerOptions,
}

impl Listener {
    /// Envuelve un socket ya enlazado
    pub fn new(
        socket: TcpListener,
        queue: ConnectionQueue<TcpStream>,
        shutdown: ShutdownSignal,
        stats: ServerStats,
        builder: Arc<dyn ResponseBuilder>,
        options: ListenerOptions,
    ) -> io::Result<Self> {
        socket.set_nonblocking(true)?;
        Ok(Self {
            socket,
            queue,
            shutdown,
            stats,
            builder,
            options,
        })
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.socket.local_addr()
    }

    /// Acepta conexiones hasta que se dispare la señal de apagado.
    ///
    /// Consume el listener: el socket se libera al retornar.
    pub fn run(self) {
        info!(address = %self.local_addr_string(), "listening for connections");

        while !self.shutdown.is_triggered() {
            match self.socket.accept() {
                Ok((stream, addr)) => self.dispatch(stream, addr),
                Err(e) if e.kind() == ErrorKind::WouldBlock => {
                    self.shutdown.wait_timeout(self.options.poll_interval);
                }
                Err(e) if e.kind() == ErrorKind::Interrupted => {}
                Err(e) => {
                    warn!(error = %e, "failed to accept incoming connection");
                    self.shutdown.wait_timeout(ACCEPT_ERROR_BACKOFF);
                }
            }
        }

        info!(address = %self.local_addr_string(), "accept loop stopped");
    }

    fn local_addr_string(&self) -> String {
        self.local_addr()
            .map(|addr| addr.to_string())
            .unwrap_or_else(|_| "unknown".to_string())
    }

    /// Prepara una conexión recién aceptada y la entrega a la cola
    fn dispatch(&self, stream: TcpStream, addr: SocketAddr) {
        self.stats.record_accepted();

        // En algunas plataformas el socket aceptado hereda el modo no bloqueante
        let prepared = stream
            .set_nonblocking(false)
            .and_then(|_| stream.set_io_timeout(self.options.io_timeout))
            .and_then(|_| stream.set_nodelay(true));
        if let Err(e) = prepared {
            warn!(peer = %addr, error = %e, "cannot configure accepted socket");
            stream.close();
            self.stats.record_discarded(1);
            return;
        }

        info!(peer = %addr, "accepted connection");

        if self.shutdown.is_triggered() {
            self.discard(stream, addr);
            return;
        }

        let pushed = match self.options.backpressure {
            BackpressurePolicy::Block => self.queue.push(stream),
            BackpressurePolicy::Reject => self.queue.try_push(stream),
        };

        match pushed {
            Ok(()) => debug!(peer = %addr, "connection queued"),
            Err(PushError::Full(stream)) => self.reject(stream, addr),
            Err(PushError::Closed(stream)) => self.discard(stream, addr),
        }
    }

    /// Responde "server busy" (best effort) y cierra
    fn reject(&self, mut stream: TcpStream, addr: SocketAddr) {
        warn!(peer = %addr, capacity = self.queue.capacity(), "queue full, rejecting connection");
        if let Err(e) = stream.write_all(&self.builder.busy()) {
            debug!(peer = %addr, error = %e, "cannot send busy response");
        }
        stream.close();
        self.stats.record_rejected();
    }

    fn discard(&self, stream: TcpStream, addr: SocketAddr) {
        warn!(peer = %addr, "server shutting down, closing connection unprocessed");
        stream.close();
        self.stats.record_discarded(1);
    }
}
