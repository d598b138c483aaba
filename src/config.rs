//! # Configuración del Servidor
//! src/config.rs
//!
//! Configuración del servidor TCP con soporte para argumentos CLI y
//! variables de entorno.
//!
//! ## Ejemplos de uso
//!
//! ### CLI
//! ```bash
//! ./pool_server --port 8080 \
//!   --workers 4 \
//!   --queue-capacity 256 \
//!   --backpressure reject \
//!   --shutdown-grace-ms 2000
//! ```
//!
//! ### Variables de entorno
//! ```bash
//! POOL_PORT=8080 POOL_HOST=0.0.0.0 ./pool_server
//! ```

use crate::error::ServerError;
use clap::{Parser, ValueEnum};
use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4};
use std::time::Duration;

/// Tope del buffer de lectura; cada conexión reserva uno completo
pub const MAX_READ_BUFFER: usize = 16 * 1024 * 1024;

/// Qué hace el listener cuando la cola de conexiones está llena
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum BackpressurePolicy {
    /// El listener espera a que se libere un lugar en la cola
    Block,
    /// La conexión recibe la respuesta "server busy" y se cierra
    Reject,
}

/// Qué pasa con las conexiones que siguen en cola al apagar
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum DrainPolicy {
    /// Se procesan hasta que vence el periodo de gracia
    Drain,
    /// Se cierran sin procesar
    Discard,
}

/// Response builder a usar desde la línea de comandos
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum BuilderKind {
    /// Documento HTML fijo
    Static,
    /// Devuelve los bytes recibidos
    Echo,
}

/// Configuración del servidor
#[derive(Debug, Clone, Parser)]
#[command(name = "pool_server")]
#[command(about = "Servidor TCP concurrente con pool fijo de workers")]
#[command(version = "0.1.0")]
pub struct Config {
    /// IPv4 en la que escucha
    #[arg(long, default_value = "127.0.0.1", env = "POOL_HOST")]
    pub host: String,

    /// Puerto en el que escucha el servidor (0 = efímero)
    #[arg(short, long, default_value = "8080", env = "POOL_PORT")]
    pub port: u16,

    // === Workers y cola ===

    /// Número de workers del pool
    #[arg(short, long, default_value = "4", env = "POOL_WORKERS")]
    pub workers: usize,

    /// Capacidad máxima de la cola de conexiones
    #[arg(long = "queue-capacity", default_value = "1024", env = "POOL_QUEUE_CAPACITY")]
    pub queue_capacity: usize,

    /// Política cuando la cola está llena
    #[arg(long, value_enum, default_value = "block", env = "POOL_BACKPRESSURE")]
    pub backpressure: BackpressurePolicy,

    // === Apagado ===

    /// Política para las conexiones en cola al apagar
    #[arg(long, value_enum, default_value = "drain", env = "POOL_DRAIN")]
    pub drain: DrainPolicy,

    /// Tiempo máximo para vaciar la cola al apagar, en milisegundos
    #[arg(long = "shutdown-grace-ms", default_value = "5000", env = "POOL_SHUTDOWN_GRACE_MS")]
    pub shutdown_grace_ms: u64,

    // === Conexiones ===

    /// Deadline de lectura/escritura por conexión en milisegundos (0 = sin límite)
    #[arg(long = "io-timeout-ms", default_value = "30000", env = "POOL_IO_TIMEOUT_MS")]
    pub io_timeout_ms: u64,

    /// Tamaño del buffer de la única lectura por conexión
    #[arg(long = "read-buffer", default_value = "30720", env = "POOL_READ_BUFFER")]
    pub read_buffer_size: usize,

    /// Intervalo con el que el listener revisa la señal de apagado
    #[arg(long = "accept-poll-ms", default_value = "50", env = "POOL_ACCEPT_POLL_MS")]
    pub accept_poll_ms: u64,

    /// Response builder
    #[arg(long, value_enum, default_value = "static", env = "POOL_BUILDER")]
    pub builder: BuilderKind,

    /// Nivel de log (error, warn, info, debug, trace)
    #[arg(long = "log-level", default_value = "info", env = "POOL_LOG")]
    pub log_level: String,
}

impl Config {
    /// Crea una nueva configuración parseando argumentos CLI
    pub fn new() -> Self {
        Config::parse()
    }

    /// Obtiene la dirección completa para bind (host:port)
    ///
    /// # Ejemplo
    /// ```rust
    /// use pool_server::config::Config;
    ///
    /// let config = Config::default();
    /// assert_eq!(config.address(), "127.0.0.1:8080");
    /// ```
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Dirección de bind ya parseada; el host debe ser IPv4 en notación decimal
    pub fn socket_addr(&self) -> Result<SocketAddr, ServerError> {
        let ip: Ipv4Addr = self.host.parse().map_err(|source| ServerError::InvalidAddress {
            host: self.host.clone(),
            source,
        })?;
        Ok(SocketAddr::V4(SocketAddrV4::new(ip, self.port)))
    }

    pub fn io_timeout(&self) -> Option<Duration> {
        match self.io_timeout_ms {
            0 => None,
            ms => Some(Duration::from_millis(ms)),
        }
    }

    pub fn shutdown_grace(&self) -> Duration {
        Duration::from_millis(self.shutdown_grace_ms)
    }

    pub fn accept_poll(&self) -> Duration {
        Duration::from_millis(self.accept_poll_ms)
    }

    /// Valida la configuración
    ///
    /// Retorna errores si hay valores inválidos
    pub fn validate(&self) -> Result<(), String> {
        if self.workers == 0 {
            return Err("workers must be >= 1".to_string());
        }
        if self.queue_capacity == 0 {
            return Err("queue capacity must be >= 1".to_string());
        }
        if self.read_buffer_size == 0 {
            return Err("read buffer must be >= 1 byte".to_string());
        }
        if self.read_buffer_size > MAX_READ_BUFFER {
            return Err(format!("read buffer must be <= {} bytes", MAX_READ_BUFFER));
        }
        if self.accept_poll_ms == 0 {
            return Err("accept poll interval must be > 0".to_string());
        }
        Ok(())
    }

    /// Imprime un resumen de la configuración
    pub fn print_summary(&self) {
        println!("╔══════════════════════════════════════════════════════════════╗");
        println!("║               Pool Server Configuration                      ║");
        println!("╚══════════════════════════════════════════════════════════════╝");
        println!();
        println!("🌐 Network:");
        println!("   Address:      {}", self.address());
        println!("   Read buffer:  {} bytes", self.read_buffer_size);
        match self.io_timeout() {
            Some(t) => println!("   I/O timeout:  {} ms", t.as_millis()),
            None => println!("   I/O timeout:  disabled"),
        }
        println!();
        println!("👷 Workers & Queue:");
        println!("   Workers:      {}", self.workers);
        println!("   Queue cap:    {}", self.queue_capacity);
        println!("   When full:    {:?}", self.backpressure);
        println!();
        println!("🛑 Shutdown:");
        println!("   Policy:       {:?}", self.drain);
        println!("   Grace:        {} ms", self.shutdown_grace_ms);
        println!();
        println!("═══════════════════════════════════════════════════════════════");
        println!();
    }
}

impl Default for Config {
    /// Configuración por defecto
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8080,
            workers: 4,
            queue_capacity: 1024,
            backpressure: BackpressurePolicy::Block,
            drain: DrainPolicy::Drain,
            shutdown_grace_ms: 5_000,
            io_timeout_ms: 30_000,
            read_buffer_size: 30_720,
            accept_poll_ms: 50,
            builder: BuilderKind::Static,
            log_level: "info".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.port, 8080);
        assert_eq!(config.host, "127.0.0.1");
        assert_eq!(config.workers, 4);
        assert_eq!(config.read_buffer_size, 30_720);
        assert_eq!(config.backpressure, BackpressurePolicy::Block);
        assert_eq!(config.drain, DrainPolicy::Drain);
    }

    #[test]
    fn test_address_custom() {
        let mut config = Config::default();
        config.host = "0.0.0.0".to_string();
        config.port = 3000;
        assert_eq!(config.address(), "0.0.0.0:3000");
    }

    #[test]
    fn test_validate_success() {
        assert!(Config::default().validate().is_ok());
    }

    #[test]
    fn test_validate_invalid_workers() {
        let mut config = Config::default();
        config.workers = 0;
        let result = config.validate();
        assert!(result.unwrap_err().contains("workers"));
    }

    #[test]
    fn test_validate_invalid_queue_capacity() {
        let mut config = Config::default();
        config.queue_capacity = 0;
        assert!(config.validate().unwrap_err().contains("queue capacity"));
    }

    #[test]
    fn test_validate_invalid_read_buffer() {
        let mut config = Config::default();
        config.read_buffer_size = 0;
        assert!(config.validate().unwrap_err().contains("read buffer"));
    }

    #[test]
    fn test_validate_read_buffer_upper_bound() {
        let mut config = Config::default();
        config.read_buffer_size = MAX_READ_BUFFER;
        assert!(config.validate().is_ok());

        config.read_buffer_size = usize::MAX;
        assert!(config.validate().unwrap_err().contains("read buffer"));
    }

    #[test]
    fn test_validate_invalid_poll() {
        let mut config = Config::default();
        config.accept_poll_ms = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_socket_addr_ipv4() {
        let mut config = Config::default();
        config.port = 0;
        let addr = config.socket_addr().unwrap();
        assert_eq!(addr.to_string(), "127.0.0.1:0");
    }

    #[test]
    fn test_socket_addr_rejects_hostname() {
        let mut config = Config::default();
        config.host = "localhost".to_string();
        assert!(matches!(
            config.socket_addr(),
            Err(ServerError::InvalidAddress { .. })
        ));
    }

    #[test]
    fn test_io_timeout_zero_disables() {
        let mut config = Config::default();
        assert_eq!(config.io_timeout(), Some(Duration::from_secs(30)));
        config.io_timeout_ms = 0;
        assert_eq!(config.io_timeout(), None);
    }

    #[test]
    fn test_parse_from_args() {
        let config = Config::parse_from([
            "pool_server",
            "--port",
            "9000",
            "--workers",
            "2",
            "--backpressure",
            "reject",
            "--drain",
            "discard",
            "--builder",
            "echo",
        ]);
        assert_eq!(config.port, 9000);
        assert_eq!(config.workers, 2);
        assert_eq!(config.backpressure, BackpressurePolicy::Reject);
        assert_eq!(config.drain, DrainPolicy::Discard);
        assert_eq!(config.builder, BuilderKind::Echo);
    }

    #[test]
    fn test_config_print_summary() {
        // Should not panic
        Config::default().print_summary();
    }
}
