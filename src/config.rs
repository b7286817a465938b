//! Remote server configuration.
//!
//! The server list is owned by the host's global configuration; the core only
//! looks servers up by display name and never mutates them.

use crate::{Auth, Error};
use std::sync::{Arc, PoisonError, RwLock};
use url::Url;

/// One configured remote Jenkins server.
#[derive(Clone, Debug)]
pub struct RemoteServer {
    display_name: String,
    address: Url,
    has_build_token_root: bool,
    auth: Option<Auth>,
}

impl RemoteServer {
    /// Create a server entry. The address must be an absolute URL without
    /// query or fragment.
    pub fn new(display_name: impl Into<String>, address: impl AsRef<str>) -> Result<Self, Error> {
        let address = Url::parse(address.as_ref()).map_err(|err| Error::InvalidConfig {
            message: "invalid remote server address".into(),
            source: Some(Box::new(err)),
        })?;
        if address.query().is_some() || address.fragment().is_some() {
            return Err(Error::invalid_config(
                "remote server address must not include query or fragment",
            ));
        }
        Ok(Self {
            display_name: display_name.into(),
            address,
            has_build_token_root: false,
            auth: None,
        })
    }

    /// Whether the server exposes the `/buildByToken` root (Build Token Root
    /// plugin) for token-based triggering.
    #[must_use]
    pub fn with_build_token_root(mut self, yes: bool) -> Self {
        self.has_build_token_root = yes;
        self
    }

    /// Default credentials used when a run does not override them.
    #[must_use]
    pub fn with_auth(mut self, auth: Auth) -> Self {
        self.auth = Some(auth);
        self
    }

    #[must_use]
    pub fn display_name(&self) -> &str {
        &self.display_name
    }

    #[must_use]
    pub fn address(&self) -> &Url {
        &self.address
    }

    #[must_use]
    pub fn has_build_token_root(&self) -> bool {
        self.has_build_token_root
    }

    #[must_use]
    pub fn auth(&self) -> Option<&Auth> {
        self.auth.as_ref()
    }
}

/// Copy-on-write list of configured servers.
///
/// Readers clone the current snapshot; an administrative replacement swaps
/// the whole slice, so a reader never observes a partially updated list.
#[derive(Clone, Default)]
pub struct ServerRegistry {
    servers: Arc<RwLock<Arc<[RemoteServer]>>>,
}

impl ServerRegistry {
    #[must_use]
    pub fn new(servers: impl IntoIterator<Item = RemoteServer>) -> Self {
        Self {
            servers: Arc::new(RwLock::new(servers.into_iter().collect())),
        }
    }

    /// Replace the whole server list.
    pub fn replace_all(&self, servers: impl IntoIterator<Item = RemoteServer>) {
        let next: Arc<[RemoteServer]> = servers.into_iter().collect();
        let mut guard = self
            .servers
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        *guard = next;
    }

    #[must_use]
    pub fn snapshot(&self) -> Arc<[RemoteServer]> {
        self.servers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Look a server up by display name. First match wins when the
    /// configuration holds duplicates.
    #[must_use]
    pub fn find(&self, display_name: &str) -> Option<RemoteServer> {
        self.snapshot()
            .iter()
            .find(|server| server.display_name() == display_name)
            .cloned()
    }
}
