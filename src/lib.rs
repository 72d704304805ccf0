//! Dish catalog client: REST snapshot plus live publish-state updates.
//!
//! SYSTEM CONTEXT
//! ==============
//! `net::push_client` keeps one websocket open and forwards parsed events;
//! `services::reconciler` owns the catalog, applies those events, and issues
//! REST fetches and toggles through `net::api`. `console` renders snapshots
//! for the terminal binary.

pub mod config;
pub mod console;
pub mod net;
pub mod services;
pub mod state;
