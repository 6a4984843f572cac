// crates/api-harness-core/tests/common/mod.rs
// ============================================================================
// Module: Integration Test Helpers
// Description: Scripted local HTTP server and config builders.
// Purpose: Exercise the transport against a real socket without external services.
// Dependencies: tiny_http, api-harness-config
// ============================================================================

//! ## Overview
//! Scripted `tiny_http` server and config builders shared by integration tests.

#![allow(
    dead_code,
    clippy::unwrap_used,
    clippy::expect_used,
    reason = "Shared helpers; not every test binary uses every helper."
)]

use std::sync::Arc;
use std::thread;
use std::time::Duration;

use api_harness_config::ConfigOverrides;
use api_harness_config::ConfigStore;
use api_harness_config::keys;
use serde_json::Value;
use tiny_http::Header;
use tiny_http::Response;
use tiny_http::Server;

/// One request as the server saw it.
#[derive(Debug, Clone)]
pub struct RecordedRequest {
    /// Request method.
    pub method: String,
    /// Path and query as sent.
    pub url: String,
    /// Header pairs in arrival order.
    pub headers: Vec<(String, String)>,
    /// Body text.
    pub body: String,
}

impl RecordedRequest {
    /// First header value named `name`, case-insensitively.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }
}

/// Canned reply: status plus optional JSON body.
pub type Scripted = (u16, Option<Value>);

/// Local server answering a fixed script of responses.
pub struct ScriptedServer {
    /// `http://` address of the server.
    pub base_url: String,
    /// Server thread returning what it recorded.
    handle: thread::JoinHandle<Vec<RecordedRequest>>,
}

impl ScriptedServer {
    /// Waits for the script to finish and returns what was received.
    pub fn finish(self) -> Vec<RecordedRequest> {
        self.handle.join().expect("server thread")
    }
}

/// Starts a server that answers `script` in order, one response per request.
pub fn serve(script: Vec<Scripted>) -> ScriptedServer {
    let server = Server::http("127.0.0.1:0").unwrap();
    let addr = server.server_addr().to_ip().unwrap();
    let base_url = format!("http://{addr}");
    let handle = thread::spawn(move || {
        let mut recorded = Vec::new();
        for (status, body) in script {
            let Ok(Some(mut request)) = server.recv_timeout(Duration::from_secs(5)) else {
                break;
            };
            let mut text = String::new();
            let _ = request.as_reader().read_to_string(&mut text);
            recorded.push(RecordedRequest {
                method: request.method().to_string(),
                url: request.url().to_string(),
                headers: request
                    .headers()
                    .iter()
                    .map(|header| (header.field.to_string(), header.value.to_string()))
                    .collect(),
                body: text,
            });
            let _ = match body {
                Some(value) => {
                    let content_type =
                        Header::from_bytes(&b"Content-Type"[..], &b"application/json"[..]).unwrap();
                    request.respond(
                        Response::from_string(value.to_string())
                            .with_status_code(status)
                            .with_header(content_type),
                    )
                }
                None => request.respond(Response::empty(status)),
            };
        }
        recorded
    });
    ScriptedServer {
        base_url,
        handle,
    }
}

/// Store pointing at `base_url` with a token and the users endpoint.
pub fn store_for(base_url: &str, token: &str) -> Arc<ConfigStore> {
    Arc::new(ConfigStore::from_values(
        [
            (keys::BASE_URL, base_url),
            (keys::USERS_ENDPOINT, "/api/users"),
            (keys::API_TOKEN, token),
            (keys::REQUEST_TIMEOUT, "5000"),
            (keys::CONNECTION_TIMEOUT, "2000"),
        ],
        ConfigOverrides::none(),
    ))
}
