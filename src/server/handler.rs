//! # Handler de Conexiones
//! src/server/handler.rs
//!
//! Procesa una conexión de principio a fin:
//! 1. Una sola lectura (best effort) en un buffer de tamaño fijo
//! 2. Pide la respuesta al `ResponseBuilder`
//! 3. Escribe la respuesta completa, reintentando escrituras parciales
//! 4. Cierra la conexión, en todos los caminos
//!
//! Ningún error de una conexión sale de aquí: se registra y se reporta
//! como `Outcome`.

use crate::metrics::ServerStats;
use crate::response::ResponseBuilder;
use crate::server::connection::Connection;
use std::io::{self, ErrorKind, Read, Write};
use std::sync::Arc;
use std::time::Instant;
use tracing::{error, info, warn};

/// Resultado de procesar una conexión
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// La respuesta se envió completa
    Served { received: usize, sent: usize },
    /// Falló la lectura; no se pidió respuesta
    ReadFailed,
    /// Falló una escritura antes de enviar todo
    WriteFailed { sent: usize, expected: usize },
}

/// Procesa conexiones individuales; se comparte entre todos los workers
pub struct ConnectionHandler {
    builder: Arc<dyn ResponseBuilder>,
    stats: ServerStats,
    read_buffer_size: usize,
}

impl ConnectionHandler {
    pub fn new(builder: Arc<dyn ResponseBuilder>, stats: ServerStats, read_buffer_size: usize) -> Self {
        Self {
            builder,
            stats,
            read_buffer_size,
        }
    }

    /// Procesa y cierra `conn`
    pub fn handle<C: Connection>(&self, mut conn: C) -> Outcome {
        let _in_flight = self.stats.begin_in_flight();
        let start = Instant::now();
        let peer = conn.peer();

        let mut buffer = vec![0u8; self.read_buffer_size];
        let received = match read_once(&mut conn, &mut buffer) {
            Ok(n) => n,
            Err(e) => {
                warn!(peer = %peer, error = %e, "failed to receive bytes from client");
                conn.close();
                self.stats.record_read_failure();
                return Outcome::ReadFailed;
            }
        };

        info!(peer = %peer, bytes = received, "received request from client");

        let response = self.builder.build(&buffer[..received]);
        let expected = response.len();

        let outcome = match write_fully(&mut conn, &response) {
            Ok(sent) => {
                info!(
                    peer = %peer,
                    bytes = sent,
                    elapsed_ms = start.elapsed().as_secs_f64() * 1000.0,
                    "response sent to client"
                );
                self.stats.record_served(received, sent);
                Outcome::Served { received, sent }
            }
            Err((sent, e)) => {
                error!(peer = %peer, sent, expected, error = %e, "error sending response to client");
                self.stats.record_write_failure(received, sent);
                Outcome::WriteFailed { sent, expected }
            }
        };

        conn.close();
        outcome
    }
}

/// Una lectura; solo reintenta si la interrumpió una señal
fn read_once<R: Read>(reader: &mut R, buffer: &mut [u8]) -> io::Result<usize> {
    loop {
        match reader.read(buffer) {
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            result => return result,
        }
    }
}

/// Escribe `bytes` completos con `write` repetidos.
///
/// En error retorna cuántos bytes alcanzaron a salir.
fn write_fully<W: Write>(writer: &mut W, bytes: &[u8]) -> Result<usize, (usize, io::Error)> {
    let mut sent = 0;

    while sent < bytes.len() {
        match writer.write(&bytes[sent..]) {
            Ok(0) => {
                let e = io::Error::new(ErrorKind::WriteZero, "connection accepted no more bytes");
                return Err((sent, e));
            }
            Ok(n) => sent += n,
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => return Err((sent, e)),
        }
    }

    writer.flush().map_err(|e| (sent, e))?;
    Ok(sent)
}
