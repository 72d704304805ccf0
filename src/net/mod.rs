//! Networking modules for the REST catalog API and the push channel.
//!
//! SYSTEM CONTEXT
//! ==============
//! `api` handles REST calls, `push_client` manages the websocket lifecycle,
//! and `types` defines the shared wire schema.

pub mod api;
pub mod push_client;
pub mod types;
