//! `email-settings` — lazy lookup of an email account's provider-discovery
//! settings.
//!
//! An [`EmailSettings`] is built from an address and a source type without
//! any I/O. Reading an attribute it does not yet hold issues one request
//! through a [`Transport`] and caches everything the service returned.

pub mod config;
pub mod error;
pub mod model;
pub mod settings;
pub mod transport;

pub use error::{Error, Result, TransportError};
pub use model::attributes::Attributes;
pub use settings::{EmailSettings, DEFAULT_SOURCE_TYPE, RESOURCE_URL};
pub use transport::{HttpTransport, Method, Params, Response, Transport};
