//! # Módulo del Servidor
//! src/server/mod.rs
//!
//! Núcleo concurrente del servidor:
//! 1. `listener` acepta conexiones y las encola
//! 2. `queue` las guarda en orden de llegada
//! 3. `pool` las reparte entre un número fijo de workers
//! 4. `handler` lee, pide la respuesta, escribe y cierra
//! 5. `lifecycle` coordina el arranque y el apagado

pub mod connection;
pub mod handler;
pub mod lifecycle;
pub mod listener;
pub mod pool;
pub mod queue;
pub mod shutdown;

// Re-exportar para facilitar el uso
pub use connection::Connection;
pub use handler::{ConnectionHandler, Outcome};
pub use lifecycle::{Server, ServerHandle, ServerState, ShutdownReport};
pub use queue::{ConnectionQueue, Pop, PushError};
pub use shutdown::ShutdownSignal;
