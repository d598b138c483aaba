//! # Conexión
//! src/server/connection.rs
//!
//! Abstracción mínima de un socket aceptado. El core solo necesita leer,
//! escribir y cerrar; `TcpStream` es la implementación de producción.

use std::io::{self, Read, Write};
use std::net::{Shutdown, TcpStream};
use std::time::Duration;

/// Un flujo de bytes bidireccional aceptado por el listener.
///
/// `close` consume la conexión, así que no se puede cerrar dos veces.
pub trait Connection: Read + Write + Send + 'static {
    /// Identificador legible del cliente, para los logs
    fn peer(&self) -> String;

    /// Aplica el deadline de lectura/escritura
    fn set_io_timeout(&self, timeout: Option<Duration>) -> io::Result<()>;

    /// Cierra la conexión
    fn close(self);
}

impl Connection for TcpStream {
    fn peer(&self) -> String {
        self.peer_addr()
            .map(|addr| addr.to_string())
            .unwrap_or_else(|_| "unknown".to_string())
    }

    fn set_io_timeout(&self, timeout: Option<Duration>) -> io::Result<()> {
        self.set_read_timeout(timeout)?;
        self.set_write_timeout(timeout)
    }

    fn close(self) {
        // El peer pudo haber cerrado ya; el drop libera el descriptor igual
        let _ = self.shutdown(Shutdown::Both);
    }
}
