//! Service endpoint descriptor.
//!
//! An endpoint is the remote target a container is bound to. Once the
//! container's pool is live it publishes itself into the endpoint so that
//! status can be reported from either side. The association is non-owning:
//! the endpoint holds a `Weak` and never keeps the container alive.

use std::fmt;
use std::sync::{Arc, PoisonError, RwLock, Weak};

use crate::config::EndpointConfig;
use crate::connection::ConnectionStatus;
use crate::pool::ConnectionContainer;

pub struct ServiceEndpoint {
    name: String,
    url: String,
    container: RwLock<Option<Weak<dyn ConnectionContainer>>>,
}

impl ServiceEndpoint {
    pub fn new(name: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            url: url.into(),
            container: RwLock::new(None),
        }
    }

    pub fn from_config(config: &EndpointConfig) -> Self {
        Self::new(config.name.clone(), config.url.clone())
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// Publish the container serving this endpoint.
    pub fn attach(&self, container: Weak<dyn ConnectionContainer>) {
        *self.container.write().unwrap_or_else(PoisonError::into_inner) = Some(container);
    }

    /// The attached container, if it is still alive.
    pub fn container(&self) -> Option<Arc<dyn ConnectionContainer>> {
        self.container
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .and_then(Weak::upgrade)
    }

    /// Aggregate status of the attached container.
    pub fn status(&self) -> ConnectionStatus {
        self.container()
            .map(|container| container.status())
            .unwrap_or(ConnectionStatus::Disconnected)
    }

    pub fn is_online(&self) -> bool {
        self.status() == ConnectionStatus::Connected
    }
}

impl fmt::Debug for ServiceEndpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceEndpoint")
            .field("name", &self.name)
            .field("url", &self.url)
            .field("attached", &self.container().is_some())
            .finish()
    }
}
