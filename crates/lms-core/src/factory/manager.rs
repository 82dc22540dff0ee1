//! Named HTTP client registry
//!
//! The HttpClientFactory is responsible for:
//! - Creating one HttpClient per name, first configuration wins
//! - Installing the default auth, 401 and 429 interceptors
//! - Sharing a transport across clients when one is injected

use lms_http::{HttpClient, HttpClientConfig, Interceptor, Transport};
use lms_storage::KeyValueStore;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info};

use super::interceptors::{
    AuthInterceptor, ClientIdentity, RateLimitInterceptor, UnauthorizedInterceptor,
};
use crate::error::CoreError;

/// Builds and caches named [`HttpClient`]s
pub struct HttpClientFactory {
    clients: RwLock<HashMap<String, Arc<HttpClient>>>,
    token_store: Arc<dyn KeyValueStore>,
    identity: ClientIdentity,
    defaults: HttpClientConfig,
    transport: Option<Arc<dyn Transport>>,
}

impl HttpClientFactory {
    pub fn new(
        token_store: Arc<dyn KeyValueStore>,
        identity: ClientIdentity,
        defaults: HttpClientConfig,
    ) -> Self {
        info!(
            "Initializing HTTP client factory for {} {}",
            identity.name, identity.version
        );

        Self {
            clients: RwLock::new(HashMap::new()),
            token_store,
            identity,
            defaults,
            transport: None,
        }
    }

    /// Send every client's requests through `transport` instead of reqwest
    pub fn with_transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.transport = Some(transport);
        self
    }

    pub fn token_store(&self) -> &Arc<dyn KeyValueStore> {
        &self.token_store
    }

    /// Get the client registered under `name`, creating it on first use
    pub fn create(
        &self,
        name: &str,
        config: Option<HttpClientConfig>,
    ) -> Result<Arc<HttpClient>, CoreError> {
        if let Some(client) = self.clients.read().get(name) {
            if config.is_some() {
                debug!("HTTP client {} already exists, ignoring new config", name);
            }
            return Ok(client.clone());
        }

        let mut clients = self.clients.write();
        if let Some(client) = clients.get(name) {
            return Ok(client.clone());
        }

        let config = config.unwrap_or_else(|| self.defaults.clone());
        let client = match &self.transport {
            Some(transport) => HttpClient::with_transport(name, config, transport.clone())?,
            None => HttpClient::new(name, config)?,
        };

        client.add_interceptor(Interceptor::request(AuthInterceptor::new(
            self.token_store.clone(),
            self.identity.clone(),
        )));
        client.add_interceptor(Interceptor::error(UnauthorizedInterceptor::new(
            self.token_store.clone(),
        )));
        client.add_interceptor(Interceptor::error(RateLimitInterceptor));

        let client = Arc::new(client);
        clients.insert(name.to_string(), client.clone());
        Ok(client)
    }

    /// Client registered under `name`, without creating one
    pub fn get(&self, name: &str) -> Option<Arc<HttpClient>> {
        self.clients.read().get(name).cloned()
    }

    /// Unregister a client; holders of the `Arc` keep a working client
    pub fn remove(&self, name: &str) -> bool {
        let removed = self.clients.write().remove(name).is_some();
        if removed {
            info!("Removed HTTP client {}", name);
        }
        removed
    }

    /// Registered client names, sorted
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.clients.read().keys().cloned().collect();
        names.sort();
        names
    }
}
