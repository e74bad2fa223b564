use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{AuthError, AuthResult};

/// HTTP methods the relay can proxy
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HttpMethod {
    #[default]
    Get,
    Post,
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HttpMethod::Get => write!(f, "GET"),
            HttpMethod::Post => write!(f, "POST"),
        }
    }
}

/// A completed HTTP exchange: status plus raw body
#[derive(Debug, Clone)]
pub struct HttpReply {
    status: u16,
    body: String,
}

impl HttpReply {
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    pub fn status(&self) -> u16 {
        self.status
    }

    pub fn body(&self) -> &str {
        &self.body
    }

    /// Parse the body as a typed JSON value
    pub fn json<T: serde::de::DeserializeOwned>(&self) -> AuthResult<T> {
        serde_json::from_str(&self.body)
            .map_err(|e| AuthError::Internal(format!("Invalid JSON response body: {}", e)))
    }

    /// Body as a JSON value, tolerating empty and non-JSON bodies
    pub fn json_value(&self) -> serde_json::Value {
        if self.body.trim().is_empty() {
            return serde_json::Value::Null;
        }
        serde_json::from_str(&self.body)
            .unwrap_or_else(|_| serde_json::Value::String(self.body.clone()))
    }

    /// Check if successful (2xx status)
    pub fn is_success(&self) -> bool {
        self.status >= 200 && self.status < 300
    }
}

/// HTTP client abstraction so the authority can be exercised without a
/// network.
#[async_trait::async_trait]
pub trait HttpClient: Send + Sync {
    async fn send(
        &self,
        method: HttpMethod,
        url: &str,
        headers: HashMap<String, String>,
        body: Option<String>,
    ) -> AuthResult<HttpReply>;
}

/// Implementation of [`HttpClient`] using reqwest
pub struct ReqwestHttpClient {
    client: reqwest::Client,
}

impl ReqwestHttpClient {
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::new(),
        }
    }

    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

impl Default for ReqwestHttpClient {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl HttpClient for ReqwestHttpClient {
    async fn send(
        &self,
        method: HttpMethod,
        url: &str,
        headers: HashMap<String, String>,
        body: Option<String>,
    ) -> AuthResult<HttpReply> {
        let mut request = match method {
            HttpMethod::Get => self.client.get(url),
            HttpMethod::Post => self.client.post(url),
        };

        for (key, value) in headers {
            request = request.header(key, value);
        }
        if let Some(body) = body {
            request = request.body(body);
        }

        let response = request
            .send()
            .await
            .map_err(|e| AuthError::Internal(format!("HTTP request failed: {}", e)))?;

        let status = response.status().as_u16();
        let body = response
            .text()
            .await
            .map_err(|e| AuthError::Internal(format!("Failed to read response body: {}", e)))?;

        Ok(HttpReply::new(status, body))
    }
}

/// Mock implementation of [`HttpClient`] for testing
#[cfg(test)]
pub mod mock {
    use super::*;
    use std::sync::{Arc, Mutex};

    /// A request the mock observed: method, url, headers, body
    #[derive(Debug, Clone)]
    pub struct RecordedRequest {
        pub method: HttpMethod,
        pub url: String,
        pub headers: HashMap<String, String>,
        pub body: Option<String>,
    }

    /// A mock HTTP client that returns predefined responses and records
    /// every request, headers included, so tests can assert that the
    /// credential only ever travels in the `Authorization` header.
    pub struct MockHttpClient {
        responses: Arc<Mutex<HashMap<(HttpMethod, String), HttpReply>>>,
        requests: Arc<Mutex<Vec<RecordedRequest>>>,
    }

    impl MockHttpClient {
        pub fn new() -> Self {
            Self {
                responses: Arc::new(Mutex::new(HashMap::new())),
                requests: Arc::new(Mutex::new(Vec::new())),
            }
        }

        /// Register a mock response for a method + URL
        pub fn mock_response(
            &self,
            method: HttpMethod,
            url: impl Into<String>,
            status: u16,
            body: impl Into<String>,
        ) {
            self.responses
                .lock()
                .unwrap()
                .insert((method, url.into()), HttpReply::new(status, body));
        }

        /// Register a JSON response
        pub fn mock_json<T: serde::Serialize>(
            &self,
            method: HttpMethod,
            url: impl Into<String>,
            status: u16,
            data: &T,
        ) {
            let body = serde_json::to_string(data).expect("mock body serializes");
            self.mock_response(method, url, status, body);
        }

        /// Requests observed so far
        pub fn requests(&self) -> Vec<RecordedRequest> {
            self.requests.lock().unwrap().clone()
        }

        /// The `Authorization` header of the most recent request to `url`
        pub fn last_authorization_for(&self, url: &str) -> Option<String> {
            self.requests
                .lock()
                .unwrap()
                .iter()
                .rev()
                .find(|req| req.url == url)
                .and_then(|req| req.headers.get("Authorization").cloned())
        }
    }

    #[async_trait::async_trait]
    impl HttpClient for MockHttpClient {
        async fn send(
            &self,
            method: HttpMethod,
            url: &str,
            headers: HashMap<String, String>,
            body: Option<String>,
        ) -> AuthResult<HttpReply> {
            self.requests.lock().unwrap().push(RecordedRequest {
                method,
                url: url.to_string(),
                headers,
                body,
            });

            self.responses
                .lock()
                .unwrap()
                .get(&(method, url.to_string()))
                .cloned()
                .ok_or_else(|| {
                    AuthError::Internal(format!("No mock response configured for {} {}", method, url))
                })
        }
    }
}
