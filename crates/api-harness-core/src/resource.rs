// crates/api-harness-core/src/resource.rs
// ============================================================================
// Module: Resource Service
// Description: CRUD calls against the configured resource endpoint.
// Purpose: Give test bodies one call per operation with the common template.
// Dependencies: api-harness-config, reqwest, serde, serde_json, tracing
// ============================================================================

//! ## Overview
//! [`ResourceService`] issues create, get, update, delete, and list calls
//! against `api.users.endpoint` through a configured [`ClientRegistry`]. The
//! request template is rebuilt from the current configuration on every call,
//! so token changes in the store take effect immediately.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::Arc;
use std::time::SystemTime;
use std::time::UNIX_EPOCH;

use api_harness_config::ConfigStore;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::info;

use crate::client::ApiRequest;
use crate::client::ClientError;
use crate::client::ClientRegistry;
use crate::response::ApiResponse;
use crate::template::RequestTemplate;

// ============================================================================
// SECTION: Service
// ============================================================================

/// CRUD client for one resource collection.
#[derive(Debug, Clone)]
pub struct ResourceService<'a> {
    /// Shared configuration.
    config: Arc<ConfigStore>,
    /// Configured transport.
    registry: &'a ClientRegistry,
    /// Collection path, e.g. `/api/users`.
    endpoint: String,
}

impl<'a> ResourceService<'a> {
    /// Creates a service over `api.users.endpoint`.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Config`] when the endpoint is not configured.
    pub fn new(config: Arc<ConfigStore>, registry: &'a ClientRegistry) -> Result<Self, ClientError> {
        let endpoint = config.users_endpoint()?;
        Ok(Self::with_endpoint(config, registry, endpoint))
    }

    /// Creates a service over an explicit collection path.
    #[must_use]
    pub fn with_endpoint(
        config: Arc<ConfigStore>,
        registry: &'a ClientRegistry,
        endpoint: impl Into<String>,
    ) -> Self {
        Self {
            config,
            registry,
            endpoint: endpoint.into(),
        }
    }

    /// Collection path.
    #[must_use]
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Creates a resource.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError`] when the request cannot be completed.
    pub fn create(&self, body: &Value) -> Result<ApiResponse, ClientError> {
        info!(endpoint = %self.endpoint, "creating resource");
        self.send(ApiRequest::post(self.endpoint.clone(), body.clone()))
    }

    /// Fetches a resource by id.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError`] when the request cannot be completed.
    pub fn get(&self, id: &str) -> Result<ApiResponse, ClientError> {
        info!(endpoint = %self.endpoint, id, "retrieving resource");
        self.send(ApiRequest::get(self.item_path(id)))
    }

    /// Replaces a resource by id.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError`] when the request cannot be completed.
    pub fn update(&self, id: &str, body: &Value) -> Result<ApiResponse, ClientError> {
        info!(endpoint = %self.endpoint, id, "updating resource");
        self.send(ApiRequest::put(self.item_path(id), body.clone()))
    }

    /// Deletes a resource by id.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError`] when the request cannot be completed.
    pub fn delete(&self, id: &str) -> Result<ApiResponse, ClientError> {
        info!(endpoint = %self.endpoint, id, "deleting resource");
        self.send(ApiRequest::delete(self.item_path(id)))
    }

    /// Lists the collection, optionally at a page.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError`] when the request cannot be completed.
    pub fn list(&self, page: Option<u32>) -> Result<ApiResponse, ClientError> {
        info!(endpoint = %self.endpoint, page, "listing resources");
        let mut request = ApiRequest::get(self.endpoint.clone());
        if let Some(page) = page {
            request = request.with_query("page", page.to_string());
        }
        self.send(request)
    }

    /// Decodes a response body into `T`.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Decode`] with the status and body text when the
    /// body does not decode.
    pub fn parse<T: DeserializeOwned>(response: &ApiResponse) -> Result<T, ClientError> {
        serde_json::from_slice(response.body()).map_err(|err| ClientError::Decode {
            status: response.status(),
            body: response.body_text().into_owned(),
            message: err.to_string(),
        })
    }

    /// Path for one item.
    fn item_path(&self, id: &str) -> String {
        format!("{}/{id}", self.endpoint.trim_end_matches('/'))
    }

    /// Sends with a template built from current configuration.
    fn send(&self, request: ApiRequest) -> Result<ApiResponse, ClientError> {
        let template = RequestTemplate::build_common(&self.config);
        self.registry.send(&template, request)
    }
}

/// Returns `prefix_<unix millis>` for unique test data.
#[must_use]
pub fn unique_name(prefix: &str) -> String {
    let millis = SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default().as_millis();
    format!("{prefix}_{millis}")
}
