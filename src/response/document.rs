//! # Documentos de Respuesta
//! src/response/document.rs
//!
//! Arma una respuesta HTTP mínima (línea de estado, `Content-Type`,
//! `Content-Length` y body) y la convierte a bytes para enviar al cliente.
//!
//! ```text
//! HTTP/1.1 200 OK\r\n
//! Content-Type: text/html\r\n
//! Content-Length: 13\r\n
//! \r\n
//! <h1>Hola</h1>
//! ```
//!
//! ## Ejemplo de uso
//!
//! ```
//! use pool_server::response::{Document, Status};
//!
//! let bytes = Document::new(Status::Ok)
//!     .with_content_type("text/plain")
//!     .with_body("Hello")
//!     .to_bytes();
//! assert!(bytes.ends_with(b"\r\n\r\nHello"));
//! ```

/// Códigos de estado que el servidor puede emitir
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    /// 200 OK - La petición fue atendida
    Ok = 200,

    /// 503 Service Unavailable - Cola llena
    ServiceUnavailable = 503,
}

impl Status {
    pub fn as_u16(&self) -> u16 {
        *self as u16
    }

    /// Texto de razón asociado al código
    pub fn reason_phrase(&self) -> &'static str {
        match self {
            Status::Ok => "OK",
            Status::ServiceUnavailable => "Service Unavailable",
        }
    }
}

/// Una respuesta completa lista para serializar
#[derive(Debug, Clone)]
pub struct Document {
    status: Status,
    content_type: String,
    body: Vec<u8>,
}

impl Document {
    /// Crea un documento vacío de tipo `text/html`
    pub fn new(status: Status) -> Self {
        Self {
            status,
            content_type: "text/html".to_string(),
            body: Vec::new(),
        }
    }

    pub fn with_content_type(mut self, content_type: &str) -> Self {
        self.content_type = content_type.to_string();
        self
    }

    pub fn with_body(self, body: &str) -> Self {
        self.with_body_bytes(body.as_bytes().to_vec())
    }

    pub fn with_body_bytes(mut self, body: Vec<u8>) -> Self {
        self.body = body;
        self
    }

    pub fn status(&self) -> Status {
        self.status
    }

    pub fn body(&self) -> &[u8] {
        &self.body
    }

    /// Serializa el documento; `Content-Length` siempre refleja el body
    pub fn to_bytes(&self) -> Vec<u8> {
        let head = format!(
            "HTTP/1.1 {} {}\r\nContent-Type: {}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
            self.status.as_u16(),
            self.status.reason_phrase(),
            self.content_type,
            self.body.len()
        );

        let mut bytes = Vec::with_capacity(head.len() + self.body.len());
        bytes.extend_from_slice(head.as_bytes());
        bytes.extend_from_slice(&self.body);
        bytes
    }
}
