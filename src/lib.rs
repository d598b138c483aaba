//! # Pool Server
//! src/lib.rs
//!
//! Servidor TCP concurrente: un listener acepta conexiones y las pasa por una
//! cola compartida a un pool fijo de workers. Cada worker atiende una conexión
//! de principio a fin (leer, responder, cerrar).
//!
//! ## Arquitectura
//!
//! - `server`: cola de conexiones, workers, accept loop y ciclo de vida
//! - `response`: el `ResponseBuilder` que calcula el payload
//! - `metrics`: contadores del servidor
//! - `config`: configuración por CLI y variables de entorno
//! - `error`: errores de arranque
//!
//! ## Ejemplo de uso
//!
//! ```no_run
//! use pool_server::config::Config;
//! use pool_server::response::StaticPage;
//! use pool_server::server::Server;
//! use std::sync::Arc;
//!
//! let mut server = Server::bind(Config::default(), Arc::new(StaticPage::new()))?;
//! let handle = server.handle();
//! server.start()?;
//! // desde otro thread: handle.shutdown();
//! let report = server.listen()?;
//! # let _ = (handle, report);
//! # Ok::<(), pool_server::error::ServerError>(())
//! ```

pub mod config;
pub mod error;
pub mod metrics;
pub mod response;
pub mod server;
