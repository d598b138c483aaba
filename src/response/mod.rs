//! # Response Builders
//! src/response/mod.rs
//!
//! El core no sabe nada del payload: le pasa los bytes recibidos a un
//! `ResponseBuilder` y escribe lo que este devuelva.
//!
//! Implementaciones incluidas:
//! - `StaticPage`: documento HTML fijo, ignora la petición
//! - `Echo`: devuelve los bytes recibidos tal cual
//! - cualquier closure `Fn(&[u8]) -> Vec<u8>`

pub mod document;

pub use document::{Document, Status};

/// Calcula la respuesta para los bytes leídos de una conexión.
///
/// Debe ser total: siempre produce alguna respuesta, incluso para una
/// petición vacía.
pub trait ResponseBuilder: Send + Sync + 'static {
    fn build(&self, request: &[u8]) -> Vec<u8>;

    /// Respuesta para conexiones rechazadas porque la cola está llena
    fn busy(&self) -> Vec<u8> {
        Document::new(Status::ServiceUnavailable)
            .with_content_type("text/plain")
            .with_body("server busy, try again later\n")
            .to_bytes()
    }
}

impl<F> ResponseBuilder for F
where
    F: Fn(&[u8]) -> Vec<u8> + Send + Sync + 'static,
{
    fn build(&self, request: &[u8]) -> Vec<u8> {
        self(request)
    }
}

const HOME_PAGE: &str = "<!DOCTYPE html><html lang=\"en\"><body><h1> HOME </h1>\
<p> Hello from multithreaded Rust TCP Server</p></body></html>";

/// Documento HTML fijo para cualquier petición
#[derive(Debug, Clone)]
pub struct StaticPage {
    rendered: Vec<u8>,
}

impl StaticPage {
    pub fn new() -> Self {
        Self::with_html(HOME_PAGE)
    }

    pub fn with_html(html: &str) -> Self {
        Self {
            rendered: Document::new(Status::Ok).with_body(html).to_bytes(),
        }
    }
}

impl Default for StaticPage {
    fn default() -> Self {
        Self::new()
    }
}

impl ResponseBuilder for StaticPage {
    fn build(&self, _request: &[u8]) -> Vec<u8> {
        self.rendered.clone()
    }
}

/// Devuelve los bytes recibidos
#[derive(Debug, Clone, Copy, Default)]
pub struct Echo;

impl ResponseBuilder for Echo {
    fn build(&self, request: &[u8]) -> Vec<u8> {
        request.to_vec()
    }
}
