//! Provider-discovery settings for one email account.
//!
//! [`EmailSettings`] knows only the address and source type when it is
//! built. The first read of an unknown attribute issues a single
//! `GET discovery` through the [`Transport`], merges every returned key,
//! and all later reads of those keys are served from memory.

use std::fmt;
use std::sync::{Mutex, MutexGuard, PoisonError};

use serde_json::Value;
use tracing::{debug, trace};

use crate::error::{Error, Result};
use crate::model::attributes::Attributes;
use crate::transport::{Method, Params, Transport};

/// Source type used when the caller does not name one.
pub const DEFAULT_SOURCE_TYPE: &str = "IMAP";

/// Path of the discovery endpoint, relative to the API base URL.
pub const RESOURCE_URL: &str = "discovery";

const FOUND: &str = "found";
const DOCUMENTATION: &str = "documentation";
const TYPE: &str = "type";

/// Lazily resolved discovery settings for an email address.
///
/// Attributes sit behind a mutex that is held across the check, the fetch
/// and the merge, so concurrent readers of a missing attribute cause one
/// request between them.
pub struct EmailSettings<T> {
    transport: T,
    email: String,
    source_type: String,
    attributes: Mutex<Attributes>,
}

impl<T: Transport> EmailSettings<T> {
    /// Settings for `email` with the default `IMAP` source type. No I/O.
    pub fn new(transport: T, email: impl Into<String>) -> Self {
        Self::with_source_type(transport, email, DEFAULT_SOURCE_TYPE)
    }

    /// Settings for `email` with an explicit source type. No I/O.
    pub fn with_source_type(
        transport: T,
        email: impl Into<String>,
        source_type: impl Into<String>,
    ) -> Self {
        Self {
            transport,
            email: email.into(),
            source_type: source_type.into(),
            attributes: Mutex::new(Attributes::new()),
        }
    }

    /// Seed attributes that were already resolved elsewhere.
    pub fn with_attributes(mut self, attributes: Attributes) -> Self {
        self.attributes
            .get_mut()
            .unwrap_or_else(PoisonError::into_inner)
            .merge(attributes.into_inner());
        self
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn email(&self) -> &str {
        &self.email
    }

    pub fn source_type(&self) -> &str {
        &self.source_type
    }

    pub fn resource_url(&self) -> &'static str {
        RESOURCE_URL
    }

    /// Whether `name` is already resolved. Never touches the network.
    ///
    /// Waits on the attribute lock, so while another thread is fetching
    /// this blocks until that request finishes or times out.
    pub fn has(&self, name: &str) -> bool {
        self.lock().contains(name)
    }

    /// Snapshot of everything resolved so far. Never touches the network,
    /// but blocks like [`has`](Self::has) during another thread's fetch.
    pub fn attributes(&self) -> Attributes {
        self.lock().clone()
    }

    /// Read any attribute by name, fetching once if it is not yet known.
    ///
    /// Returns [`Error::AttributeNotFound`] when the fetch succeeds but the
    /// remote service did not send `name`.
    pub fn get(&self, name: &str) -> Result<Value> {
        let mut attrs = self.lock();
        if let Some(value) = attrs.get(name) {
            trace!(attribute = name, "Attribute served from cache");
            return Ok(value.clone());
        }

        self.fetch_into(&mut attrs)?;
        attrs
            .get(name)
            .cloned()
            .ok_or_else(|| Error::AttributeNotFound(name.to_string()))
    }

    /// Provider documentation links.
    pub fn documentation(&self) -> Result<Vec<String>> {
        serde_json::from_value(self.get(DOCUMENTATION)?)
            .map_err(|_| Error::attribute_type(DOCUMENTATION, "a list of strings"))
    }

    /// Provider type, the remote `type` attribute (e.g. `"gmail"`).
    pub fn provider_type(&self) -> Result<String> {
        match self.get(TYPE)? {
            Value::String(s) => Ok(s),
            _ => Err(Error::attribute_type(TYPE, "a string")),
        }
    }

    /// Whether the service recognised the address. Resolves if needed.
    pub fn found(&self) -> Result<bool> {
        expect_bool(&self.get(FOUND)?)
    }

    /// Like [`found`](Self::found), but returns a resolved value without
    /// any network call. Meant for repeated existence probes.
    pub fn is_found(&self) -> Result<bool> {
        let mut attrs = self.lock();
        if let Some(value) = attrs.get(FOUND) {
            return expect_bool(value);
        }

        self.fetch_into(&mut attrs)?;
        match attrs.get(FOUND) {
            Some(value) => expect_bool(value),
            None => Err(Error::AttributeNotFound(FOUND.to_string())),
        }
    }

    /// Issue the discovery request and merge every returned key.
    ///
    /// Returns the number of keys merged. Already resolved keys are
    /// overwritten with the fresh values.
    pub fn fetch_attributes(&self) -> Result<usize> {
        let mut attrs = self.lock();
        self.fetch_into(&mut attrs)
    }

    fn fetch_into(&self, attrs: &mut Attributes) -> Result<usize> {
        debug!(
            email = %self.email,
            source_type = %self.source_type,
            "Resolving email settings"
        );
        let response = self
            .transport
            .request(Method::Get, self.resource_url(), &self.params())?;
        let merged = attrs.merge(response);
        debug!(email = %self.email, merged, "Merged discovery attributes");
        Ok(merged)
    }

    fn params(&self) -> Params {
        Params::from([
            ("email".to_string(), self.email.clone()),
            ("source_type".to_string(), self.source_type.clone()),
        ])
    }

    fn lock(&self) -> MutexGuard<'_, Attributes> {
        // Attributes are only ever replaced by a whole merge, so a poisoned
        // guard still holds a consistent map.
        self.attributes.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl<T> fmt::Debug for EmailSettings<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EmailSettings")
            .field("email", &self.email)
            .field("source_type", &self.source_type)
            .field("attributes", &self.attributes)
            .finish_non_exhaustive()
    }
}

fn expect_bool(value: &Value) -> Result<bool> {
    value
        .as_bool()
        .ok_or_else(|| Error::attribute_type(FOUND, "a boolean"))
}
