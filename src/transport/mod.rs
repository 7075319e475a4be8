//! The request capability the settings resource depends on.
//!
//! A [`Transport`] issues one synchronous request and returns the parsed
//! JSON object. [`HttpTransport`] is the production implementation; tests
//! substitute an in-memory double.

pub mod http;

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use crate::error::TransportError;

pub use http::HttpTransport;

/// Request parameters, ordered by key.
pub type Params = BTreeMap<String, String>;

/// A flat JSON object as returned by the remote service.
pub type Response = serde_json::Map<String, serde_json::Value>;

/// HTTP verbs understood by a transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
    Get,
    Post,
    Put,
    Delete,
}

impl Method {
    /// Upper-case verb as sent on the wire.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Post => "POST",
            Self::Put => "PUT",
            Self::Delete => "DELETE",
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Issues a single request against the remote API.
///
/// Implementations make exactly one attempt; retries and timeouts are
/// their own business and surface to callers only as a [`TransportError`].
pub trait Transport {
    fn request(
        &self,
        method: Method,
        path: &str,
        params: &Params,
    ) -> Result<Response, TransportError>;
}

impl<T: Transport + ?Sized> Transport for &T {
    fn request(
        &self,
        method: Method,
        path: &str,
        params: &Params,
    ) -> Result<Response, TransportError> {
        (**self).request(method, path, params)
    }
}

impl<T: Transport + ?Sized> Transport for Box<T> {
    fn request(
        &self,
        method: Method,
        path: &str,
        params: &Params,
    ) -> Result<Response, TransportError> {
        (**self).request(method, path, params)
    }
}

impl<T: Transport + ?Sized> Transport for Arc<T> {
    fn request(
        &self,
        method: Method,
        path: &str,
        params: &Params,
    ) -> Result<Response, TransportError> {
        (**self).request(method, path, params)
    }
}
