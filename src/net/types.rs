//! Wire types shared by the REST client and the push channel.
//!
//! Field names follow the backend's camelCase JSON. Unknown fields are
//! ignored so the server can grow its payloads (timestamps, names on push
//! events) without breaking the client.

#[cfg(test)]
#[path = "types_test.rs"]
mod types_test;

use std::fmt;

use serde::{Deserialize, Serialize};

// =============================================================================
// ERROR
// =============================================================================

/// Errors produced by REST calls against the dish API.
#[derive(Clone, Debug, thiserror::Error)]
pub enum ApiError {
    /// The underlying HTTP client could not be constructed.
    #[error("HTTP client build failed: {0}")]
    ClientBuild(String),

    /// The request never produced a response (DNS, connect, timeout).
    #[error("request failed: {0}")]
    Request(String),

    /// The server answered with a non-success status.
    #[error("server returned status {status}")]
    Status { status: u16, body: String },

    /// The response body could not be decoded.
    #[error("response parse failed: {0}")]
    Parse(String),
}

// =============================================================================
// DISH
// =============================================================================

/// Server-assigned dish key. Stable for the lifetime of a dish.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DishId(pub i64);

impl fmt::Display for DishId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

impl std::str::FromStr for DishId {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim().parse().map(Self)
    }
}

/// A catalog entry as served by `GET /api/dishes`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Dish {
    pub dish_id: DishId,
    pub dish_name: String,
    pub image_url: String,
    pub is_published: bool,
}

// =============================================================================
// PUSH EVENTS
// =============================================================================

pub const DISH_STATUS_CHANGED: &str = "dishStatusChanged";

/// Payload of a `dishStatusChanged` push message.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DishStatusChange {
    pub dish_id: DishId,
    pub is_published: bool,
}

/// Raw `{ type, data }` envelope as it appears on the wire.
#[derive(Debug, Deserialize)]
struct Envelope {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    data: serde_json::Value,
}

/// A parsed push-channel message.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PushEvent {
    DishStatusChanged(DishStatusChange),
    /// Any envelope whose type this client does not act on.
    Other { kind: String },
}

impl PushEvent {
    /// Decode one websocket message body.
    ///
    /// # Errors
    ///
    /// Fails when the body is not a JSON envelope, or when a recognized type
    /// carries a payload of the wrong shape.
    pub fn parse(payload: &[u8]) -> Result<Self, serde_json::Error> {
        let envelope: Envelope = serde_json::from_slice(payload)?;
        if envelope.kind == DISH_STATUS_CHANGED {
            let change = serde_json::from_value(envelope.data)?;
            return Ok(Self::DishStatusChanged(change));
        }
        Ok(Self::Other { kind: envelope.kind })
    }

    /// The envelope's `type` string.
    #[must_use]
    pub fn kind(&self) -> &str {
        match self {
            Self::DishStatusChanged(_) => DISH_STATUS_CHANGED,
            Self::Other { kind } => kind,
        }
    }
}
