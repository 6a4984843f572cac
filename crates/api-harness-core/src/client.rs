// crates/api-harness-core/src/client.rs
// ============================================================================
// Module: Client Registry
// Description: Process-shared HTTP client configuration and blocking transport.
// Purpose: Apply base URL, timeouts, and diagnostic filters exactly once.
// Dependencies: api-harness-config, reqwest, serde_json, thiserror, tracing
// ============================================================================

//! ## Overview
//! [`ClientRegistry`] owns the process-wide HTTP client state. The first
//! [`ClientRegistry::configure`] call builds a blocking client from the
//! configured base URL and timeouts and installs the default
//! [`LogExchangeFilter`]; later calls are no-ops until [`ClientRegistry::reset`].
//! Configure and reset serialize on one lock, so the configured flag never
//! disagrees with the installed state.
//!
//! [`ClientRegistry::send`] applies a [`RequestTemplate`] to an [`ApiRequest`].
//! The lock is held only to snapshot the client and filters; the request
//! itself runs unlocked.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::Arc;
use std::sync::Mutex;
use std::sync::MutexGuard;
use std::sync::OnceLock;
use std::sync::PoisonError;
use std::time::Duration;
use std::time::Instant;

use api_harness_config::ConfigError;
use api_harness_config::ConfigStore;
use reqwest::Method;
use reqwest::Url;
use reqwest::blocking::Client;
use serde_json::Value;
use thiserror::Error;
use tracing::debug;
use tracing::info;
use tracing::warn;

use crate::response::ApiResponse;
use crate::template::RequestTemplate;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Header names whose values are masked in diagnostics.
const SENSITIVE_HEADERS: [&str; 2] = ["authorization", "x-api-key"];
/// Replacement text for masked header values.
const REDACTED: &str = "<redacted>";

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Errors raised by the client registry and transport.
#[derive(Debug, Error)]
pub enum ClientError {
    /// `send` was called before `configure`.
    #[error("client registry is not configured")]
    NotConfigured,
    /// Required configuration is missing or malformed.
    #[error(transparent)]
    Config(#[from] ConfigError),
    /// Base URL or joined request URL is invalid.
    #[error("invalid url `{url}`: {message}")]
    InvalidUrl {
        /// Offending URL text.
        url: String,
        /// Parser message.
        message: String,
    },
    /// The HTTP client could not be constructed.
    #[error("http client build failed: {0}")]
    Build(String),
    /// The request could not be completed.
    #[error("{method} {url} failed: {message}")]
    Transport {
        /// Request method.
        method: String,
        /// Request URL.
        url: String,
        /// Transport message.
        message: String,
    },
    /// The request body could not be encoded.
    #[error("request body encoding failed: {0}")]
    Encode(String),
    /// The server answered but the body could not be decoded.
    #[error("status {status}: response body could not be decoded: {message}")]
    Decode {
        /// Response status.
        status: u16,
        /// Response body text.
        body: String,
        /// Decoder message.
        message: String,
    },
}

// ============================================================================
// SECTION: Settings and Requests
// ============================================================================

/// Connection settings derived from configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientSettings {
    /// Base URL every relative path is joined to.
    pub base_url: String,
    /// Whole-request timeout.
    pub request_timeout: Duration,
    /// Connection establishment timeout.
    pub connection_timeout: Duration,
}

impl ClientSettings {
    /// Reads settings from configuration.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError`] when `api.base.url` is missing or not a URL.
    pub fn from_config(config: &ConfigStore) -> Result<Self, ClientError> {
        let base_url = config.base_url()?;
        Url::parse(&base_url).map_err(|err| ClientError::InvalidUrl {
            url: base_url.clone(),
            message: err.to_string(),
        })?;
        Ok(Self {
            base_url,
            request_timeout: config.request_timeout(),
            connection_timeout: config.connection_timeout(),
        })
    }

    /// Joins `path` to the base URL; absolute URLs pass through.
    #[must_use]
    pub fn resolve(&self, path: &str) -> String {
        if path.starts_with("http://") || path.starts_with("https://") {
            return path.to_string();
        }
        let base = self.base_url.trim_end_matches('/');
        if path.is_empty() {
            base.to_string()
        } else if path.starts_with('/') {
            format!("{base}{path}")
        } else {
            format!("{base}/{path}")
        }
    }
}

/// One outbound call relative to the configured base URL.
#[derive(Debug, Clone, PartialEq)]
pub struct ApiRequest {
    /// HTTP method.
    pub method: Method,
    /// Path relative to the base URL, or an absolute URL.
    pub path: String,
    /// Query parameters in order.
    pub query: Vec<(String, String)>,
    /// Optional JSON body.
    pub body: Option<Value>,
}

impl ApiRequest {
    /// Creates a request with no query or body.
    #[must_use]
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            query: Vec::new(),
            body: None,
        }
    }

    /// GET request.
    #[must_use]
    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::GET, path)
    }

    /// POST request with a JSON body.
    #[must_use]
    pub fn post(path: impl Into<String>, body: Value) -> Self {
        Self::new(Method::POST, path).with_body(body)
    }

    /// PUT request with a JSON body.
    #[must_use]
    pub fn put(path: impl Into<String>, body: Value) -> Self {
        Self::new(Method::PUT, path).with_body(body)
    }

    /// DELETE request.
    #[must_use]
    pub fn delete(path: impl Into<String>) -> Self {
        Self::new(Method::DELETE, path)
    }

    /// Adds a query parameter.
    #[must_use]
    pub fn with_query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((key.into(), value.into()));
        self
    }

    /// Sets the JSON body.
    #[must_use]
    pub fn with_body(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }
}

// ============================================================================
// SECTION: Diagnostic Filters
// ============================================================================

/// Outbound request as seen by diagnostic filters.
#[derive(Debug, Clone, Copy)]
pub struct Exchange<'a> {
    /// Request method.
    pub method: &'a Method,
    /// Fully resolved URL.
    pub url: &'a str,
    /// Headers applied from the template.
    pub headers: &'a [(String, String)],
    /// JSON body, if any.
    pub body: Option<&'a Value>,
    /// Whether the template asks for full logging.
    pub verbose: bool,
}

/// Observer attached to every exchange sent through the registry.
pub trait DiagnosticFilter: Send + Sync {
    /// Stable filter name for diagnostics.
    fn name(&self) -> &str;

    /// Called before the request is sent.
    fn on_request(&self, exchange: &Exchange<'_>);

    /// Called after a response has been fully read.
    fn on_response(&self, exchange: &Exchange<'_>, response: &ApiResponse);
}

/// Default filter: logs requests and responses through `tracing`.
///
/// Authorization and API key values are masked unless empty.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogExchangeFilter;

impl LogExchangeFilter {
    /// Name reported by [`DiagnosticFilter::name`].
    pub const NAME: &'static str = "log-exchange";
}

impl DiagnosticFilter for LogExchangeFilter {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn on_request(&self, exchange: &Exchange<'_>) {
        if !exchange.verbose {
            debug!(method = %exchange.method, url = exchange.url, "request");
            return;
        }
        let headers = redact_headers(exchange.headers);
        let body = exchange.body.map(Value::to_string).unwrap_or_default();
        info!(
            method = %exchange.method,
            url = exchange.url,
            headers = ?headers,
            body = %body,
            "request"
        );
    }

    fn on_response(&self, exchange: &Exchange<'_>, response: &ApiResponse) {
        let elapsed_ms = u64::try_from(response.elapsed().as_millis()).unwrap_or(u64::MAX);
        if !exchange.verbose {
            debug!(status = response.status(), elapsed_ms, url = exchange.url, "response");
            return;
        }
        info!(
            status = response.status(),
            elapsed_ms,
            url = exchange.url,
            headers = ?response.headers(),
            body = %response.body_text(),
            "response"
        );
    }
}

/// Returns header pairs with sensitive non-empty values masked.
#[must_use]
pub fn redact_headers(headers: &[(String, String)]) -> Vec<(String, String)> {
    headers
        .iter()
        .map(|(name, value)| {
            let sensitive =
                SENSITIVE_HEADERS.iter().any(|candidate| name.eq_ignore_ascii_case(candidate));
            let visible = value.is_empty() || value.trim_end() == "Bearer";
            if sensitive && !visible {
                (name.clone(), REDACTED.to_string())
            } else {
                (name.clone(), value.clone())
            }
        })
        .collect()
}

// ============================================================================
// SECTION: Registry
// ============================================================================

/// Mutable registry state; always accessed under the registry lock.
#[derive(Default)]
struct RegistryState {
    /// True once `configure` has applied settings.
    configured: bool,
    /// Applied settings.
    settings: Option<ClientSettings>,
    /// Blocking client built from the settings.
    client: Option<Client>,
    /// Filters applied to every exchange.
    filters: Vec<Arc<dyn DiagnosticFilter>>,
}

/// Process-shared client configuration.
#[derive(Default)]
pub struct ClientRegistry {
    /// Guarded registry state.
    state: Mutex<RegistryState>,
}

impl std::fmt::Debug for ClientRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.lock();
        f.debug_struct("ClientRegistry")
            .field("configured", &state.configured)
            .field("settings", &state.settings)
            .field("filters", &state.filters.len())
            .finish()
    }
}

impl ClientRegistry {
    /// Creates an unconfigured registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the process-wide registry.
    pub fn global() -> &'static Self {
        /// Registry shared by the whole process.
        static GLOBAL: OnceLock<ClientRegistry> = OnceLock::new();
        GLOBAL.get_or_init(Self::new)
    }

    /// Applies configuration once.
    ///
    /// Returns `true` when this call applied the settings and `false` when
    /// the registry was already configured.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError`] when settings are missing or the client cannot
    /// be built. The registry stays unconfigured on error.
    pub fn configure(&self, config: &ConfigStore) -> Result<bool, ClientError> {
        let mut state = self.lock();
        if state.configured {
            debug!("client registry already configured");
            return Ok(false);
        }
        let settings = ClientSettings::from_config(config)?;
        let client = Client::builder()
            .timeout(settings.request_timeout)
            .connect_timeout(settings.connection_timeout)
            .build()
            .map_err(|err| ClientError::Build(err.to_string()))?;
        info!(
            base_url = %settings.base_url,
            request_timeout_ms = duration_ms(settings.request_timeout),
            connection_timeout_ms = duration_ms(settings.connection_timeout),
            "client registry configured"
        );
        state.settings = Some(settings);
        state.client = Some(client);
        state.filters.push(Arc::new(LogExchangeFilter));
        state.configured = true;
        Ok(true)
    }

    /// Clears settings, client, filters and the configured flag.
    pub fn reset(&self) {
        let mut state = self.lock();
        *state = RegistryState::default();
        debug!("client registry reset");
    }

    /// True once `configure` has applied settings.
    #[must_use]
    pub fn is_configured(&self) -> bool {
        self.lock().configured
    }

    /// Applied settings, if configured.
    #[must_use]
    pub fn settings(&self) -> Option<ClientSettings> {
        self.lock().settings.clone()
    }

    /// Number of installed filters.
    #[must_use]
    pub fn filter_count(&self) -> usize {
        self.lock().filters.len()
    }

    /// Names of installed filters, in install order.
    #[must_use]
    pub fn filter_names(&self) -> Vec<String> {
        self.lock().filters.iter().map(|filter| filter.name().to_string()).collect()
    }

    /// Installs an additional filter.
    pub fn add_filter(&self, filter: Arc<dyn DiagnosticFilter>) {
        self.lock().filters.push(filter);
    }

    /// Sends `request` with the headers of `template`.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError`] when the registry is unconfigured, the URL is
    /// invalid, the body cannot be encoded, or the transport fails.
    pub fn send(
        &self,
        template: &RequestTemplate,
        request: ApiRequest,
    ) -> Result<ApiResponse, ClientError> {
        let (client, settings, filters) = {
            let state = self.lock();
            match (&state.client, &state.settings) {
                (Some(client), Some(settings)) if state.configured => {
                    (client.clone(), settings.clone(), state.filters.clone())
                }
                _ => return Err(ClientError::NotConfigured),
            }
        };

        let url_text = settings.resolve(&request.path);
        let url = Url::parse(&url_text).map_err(|err| ClientError::InvalidUrl {
            url: url_text.clone(),
            message: err.to_string(),
        })?;

        let exchange = Exchange {
            method: &request.method,
            url: &url_text,
            headers: template.headers(),
            body: request.body.as_ref(),
            verbose: template.logs_all(),
        };
        for filter in &filters {
            filter.on_request(&exchange);
        }

        let mut builder = client
            .request(request.method.clone(), url)
            .header(reqwest::header::ACCEPT, template.accept());
        for (name, value) in template.headers() {
            builder = builder.header(name.as_str(), value.as_str());
        }
        if !request.query.is_empty() {
            builder = builder.query(&request.query);
        }
        if let Some(body) = &request.body {
            let bytes = serde_json::to_vec(body).map_err(|err| ClientError::Encode(err.to_string()))?;
            builder = builder.header(reqwest::header::CONTENT_TYPE, template.content_type()).body(bytes);
        }

        let transport_error = |err: reqwest::Error| ClientError::Transport {
            method: request.method.to_string(),
            url: url_text.clone(),
            message: err.to_string(),
        };
        let started = Instant::now();
        let response = builder.send().map_err(transport_error)?;
        let status = response.status().as_u16();
        let headers: Vec<(String, String)> = response
            .headers()
            .iter()
            .map(|(name, value)| {
                (name.as_str().to_string(), String::from_utf8_lossy(value.as_bytes()).into_owned())
            })
            .collect();
        let body = response.bytes().map_err(transport_error)?.to_vec();
        let api_response = ApiResponse::new(status, headers, body, started.elapsed());

        for filter in &filters {
            filter.on_response(&exchange, &api_response);
        }
        if status >= 500 {
            warn!(status, url = %url_text, "server error response");
        }
        Ok(api_response)
    }

    /// Locks the state, recovering from a poisoned lock.
    fn lock(&self) -> MutexGuard<'_, RegistryState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Converts a duration to whole milliseconds for log fields.
fn duration_ms(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}
