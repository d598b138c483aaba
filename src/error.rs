//! # Errores del Servidor
//! src/error.rs
//!
//! Errores de arranque y de ciclo de vida. Los errores de una conexión
//! individual nunca llegan aquí: se quedan dentro del handler.

use crate::server::ServerState;
use std::net::SocketAddr;
use thiserror::Error;

/// Errores estructurados que el servidor reporta a quien lo controla
#[derive(Debug, Error)]
pub enum ServerError {
    /// La configuración no pasó la validación
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// El host no es una dirección IPv4 válida
    #[error("invalid IPv4 address '{host}': {source}")]
    InvalidAddress {
        host: String,
        #[source]
        source: std::net::AddrParseError,
    },

    /// No se pudo hacer bind/listen en la dirección
    #[error("cannot bind {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },

    /// No se pudo crear un thread del pool
    #[error("cannot spawn worker thread: {0}")]
    WorkerSpawn(#[source] std::io::Error),

    /// Operación pedida en un estado que no la admite
    #[error("invalid server state: expected {expected}, found {actual}")]
    InvalidState {
        expected: ServerState,
        actual: ServerState,
    },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, ServerError>;
