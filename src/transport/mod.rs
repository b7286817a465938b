//! Blocking HTTP transport seam.
//!
//! The trigger engine only ever issues fully-formed URLs (query included), so
//! a transport request is just method + URL + headers. Responses come back
//! for every status code; classifying non-2xx bodies is the caller's job.

mod ureq_blocking;

pub use ureq_blocking::UreqBlocking;

use crate::Error;
use http::{HeaderMap, Method, StatusCode};
use std::sync::Arc;
use url::Url;

#[derive(Clone, Debug)]
pub struct TransportRequest {
    pub method: Method,
    pub url: Url,
    pub headers: HeaderMap,
}

#[derive(Clone, Debug)]
pub struct TransportResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Vec<u8>,
}

/// Trait implemented by any blocking HTTP layer.
pub trait BlockingTransport: Send + Sync + 'static {
    fn send(&self, req: TransportRequest) -> Result<TransportResponse, Error>;
}

pub type DynBlockingTransport = Arc<dyn BlockingTransport>;

impl<T: BlockingTransport + ?Sized> BlockingTransport for Arc<T> {
    fn send(&self, req: TransportRequest) -> Result<TransportResponse, Error> {
        (**self).send(req)
    }
}
