//! Client configuration: endpoint addresses, reconnect delay, HTTP timeouts.
//!
//! DESIGN
//! ======
//! Every collaborator receives its addresses from a `ClientConfig` built at
//! startup, so tests can point the REST client and push channel at a local
//! mock server. The websocket address defaults to `/ws` on the API host.

#[cfg(test)]
#[path = "config_test.rs"]
mod config_test;

use std::time::Duration;

use crate::net::types::DishId;

pub const DEFAULT_API_BASE_URL: &str = "http://localhost:8000/api";
pub const DEFAULT_RECONNECT_DELAY_MS: u64 = 3000;
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 10;

/// Errors produced while building or validating a [`ClientConfig`].
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ConfigError {
    /// The REST base URL does not use `http://` or `https://`.
    #[error("invalid API base URL: {0}")]
    InvalidApiUrl(String),

    /// The push channel URL does not use `ws://` or `wss://`.
    #[error("invalid websocket URL: {0}")]
    InvalidWsUrl(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HttpTimeouts {
    pub request_secs: u64,
    pub connect_secs: u64,
}

impl Default for HttpTimeouts {
    fn default() -> Self {
        Self { request_secs: DEFAULT_REQUEST_TIMEOUT_SECS, connect_secs: DEFAULT_CONNECT_TIMEOUT_SECS }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    /// REST base, e.g. `http://localhost:8000/api`. Never ends with `/`.
    pub api_base_url: String,
    /// Push channel address, e.g. `ws://localhost:8000/ws`.
    pub ws_url: String,
    /// Fixed delay between a close and the next connection attempt.
    pub reconnect_delay: Duration,
    pub timeouts: HttpTimeouts,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self::new(DEFAULT_API_BASE_URL)
    }
}

impl ClientConfig {
    /// Build a config for the given API base, deriving the websocket address
    /// from its host.
    #[must_use]
    pub fn new(api_base_url: impl Into<String>) -> Self {
        let api_base_url = api_base_url.into().trim_end_matches('/').to_owned();
        let ws_url = derive_ws_url(&api_base_url).unwrap_or_default();
        Self {
            api_base_url,
            ws_url,
            reconnect_delay: Duration::from_millis(DEFAULT_RECONNECT_DELAY_MS),
            timeouts: HttpTimeouts::default(),
        }
    }

    #[must_use]
    pub fn with_ws_url(mut self, ws_url: impl Into<String>) -> Self {
        self.ws_url = ws_url.into();
        self
    }

    #[must_use]
    pub fn with_reconnect_delay(mut self, delay: Duration) -> Self {
        self.reconnect_delay = delay;
        self
    }

    #[must_use]
    pub fn with_timeouts(mut self, timeouts: HttpTimeouts) -> Self {
        self.timeouts = timeouts;
        self
    }

    /// Check that both addresses use a scheme their client can speak.
    ///
    /// # Errors
    ///
    /// Returns the first offending address.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !has_scheme(&self.api_base_url, &["http://", "https://"]) {
            return Err(ConfigError::InvalidApiUrl(self.api_base_url.clone()));
        }
        if !has_scheme(&self.ws_url, &["ws://", "wss://"]) {
            return Err(ConfigError::InvalidWsUrl(self.ws_url.clone()));
        }
        Ok(())
    }

    /// `GET` endpoint returning the full catalog.
    #[must_use]
    pub fn dishes_url(&self) -> String {
        format!("{}/dishes", self.api_base_url)
    }

    /// `PATCH` endpoint flipping one dish's published flag.
    #[must_use]
    pub fn toggle_url(&self, dish_id: DishId) -> String {
        format!("{}/dishes/{dish_id}/toggle", self.api_base_url)
    }
}

fn has_scheme(url: &str, schemes: &[&str]) -> bool {
    schemes
        .iter()
        .any(|scheme| url.strip_prefix(scheme).is_some_and(|rest| !rest.is_empty()))
}

/// Map `http(s)://host[:port]/anything` to `ws(s)://host[:port]/ws`.
fn derive_ws_url(api_base_url: &str) -> Option<String> {
    let (scheme, rest) = if let Some(rest) = api_base_url.strip_prefix("http://") {
        ("ws", rest)
    } else if let Some(rest) = api_base_url.strip_prefix("https://") {
        ("wss", rest)
    } else {
        return None;
    };
    let host = rest.split('/').next().filter(|host| !host.is_empty())?;
    Some(format!("{scheme}://{host}/ws"))
}
