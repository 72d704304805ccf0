//! REST client for the dish catalog endpoints.
//!
//! Thin HTTP wrapper over `GET /dishes` and `PATCH /dishes/{id}/toggle`.
//! Status checks and body parsing are pure functions so they can be tested
//! without a server.
//!
//! ERROR HANDLING
//! ==============
//! Every failure maps onto [`ApiError`]; nothing here retries. Callers decide
//! whether a failure becomes a banner (fetch) or a notice (toggle).

#[cfg(test)]
#[path = "api_test.rs"]
mod api_test;

use std::time::Duration;

use tracing::{debug, warn};

use super::types::{ApiError, Dish, DishId};
use crate::config::ClientConfig;

/// Fetch and mutation collaborators used by the reconciler.
#[async_trait::async_trait]
pub trait DishApi: Send + Sync {
    /// Fetch the full catalog in server order.
    async fn fetch_dishes(&self) -> Result<Vec<Dish>, ApiError>;

    /// Ask the server to flip one dish's published flag. The returned dish
    /// is informational; the catalog is updated from the push channel.
    async fn toggle_dish(&self, dish_id: DishId) -> Result<Dish, ApiError>;
}

// =============================================================================
// CLIENT
// =============================================================================

pub struct HttpDishApi {
    http: reqwest::Client,
    config: ClientConfig,
}

impl HttpDishApi {
    /// Build a client with the configured request and connect timeouts.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::ClientBuild`] if the TLS backend fails to initialize.
    pub fn new(config: ClientConfig) -> Result<Self, ApiError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeouts.request_secs))
            .connect_timeout(Duration::from_secs(config.timeouts.connect_secs))
            .build()
            .map_err(|e| ApiError::ClientBuild(e.to_string()))?;
        Ok(Self { http, config })
    }

    async fn send(&self, request: reqwest::RequestBuilder) -> Result<String, ApiError> {
        let response = request
            .send()
            .await
            .map_err(|e| ApiError::Request(e.to_string()))?;
        let status = response.status().as_u16();
        let body = response
            .text()
            .await
            .map_err(|e| ApiError::Request(e.to_string()))?;
        check_status(status, body)
    }
}

#[async_trait::async_trait]
impl DishApi for HttpDishApi {
    async fn fetch_dishes(&self) -> Result<Vec<Dish>, ApiError> {
        let url = self.config.dishes_url();
        debug!(%url, "fetching dishes");
        let body = self.send(self.http.get(&url)).await.inspect_err(|e| {
            warn!(%url, error = %e, "dish fetch failed");
        })?;
        parse_dishes(&body)
    }

    async fn toggle_dish(&self, dish_id: DishId) -> Result<Dish, ApiError> {
        let url = self.config.toggle_url(dish_id);
        debug!(%url, %dish_id, "toggling dish");
        let body = self.send(self.http.patch(&url)).await.inspect_err(|e| {
            warn!(%url, %dish_id, error = %e, "dish toggle failed");
        })?;
        parse_dish(&body)
    }
}

// =============================================================================
// RESPONSE HANDLING
// =============================================================================

fn check_status(status: u16, body: String) -> Result<String, ApiError> {
    if (200..300).contains(&status) {
        Ok(body)
    } else {
        Err(ApiError::Status { status, body })
    }
}

fn parse_dishes(body: &str) -> Result<Vec<Dish>, ApiError> {
    serde_json::from_str(body).map_err(|e| ApiError::Parse(e.to_string()))
}

fn parse_dish(body: &str) -> Result<Dish, ApiError> {
    serde_json::from_str(body).map_err(|e| ApiError::Parse(e.to_string()))
}
