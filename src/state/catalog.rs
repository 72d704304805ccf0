//! Catalog state: the local projection of the dish list plus UI flags.
//!
//! DESIGN
//! ======
//! All transitions are synchronous methods on `CatalogState` so the
//! reconciler task is the only writer and tests can drive it directly.
//! The dish list is replaced wholesale on load and patched one field at a
//! time by push events; a toggle request never edits dish data itself.

#[cfg(test)]
#[path = "catalog_test.rs"]
mod catalog_test;

use tracing::{debug, warn};

use crate::net::types::{ApiError, Dish, DishId, PushEvent};

pub const LOAD_FAILED_MESSAGE: &str = "Failed to load dishes. Please check if the backend is running.";
pub const TOGGLE_FAILED_MESSAGE: &str = "Failed to update dish status";

/// Push channel connection status.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ConnectionStatus {
    /// No socket; either never opened or closed and waiting to reconnect.
    #[default]
    Disconnected,
    /// Handshake in progress.
    Connecting,
    /// Socket open and receiving events.
    Connected,
}

/// Everything the console view needs to render one frame.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CatalogState {
    /// Dishes in server order.
    pub dishes: Vec<Dish>,
    /// True while a full fetch is in flight.
    pub loading: bool,
    /// Banner text from the last failed fetch; cleared by a successful one.
    pub error: Option<String>,
    /// Dish whose toggle request is awaiting its round trip.
    pub pending: Option<DishId>,
    /// Blocking notice from the last failed toggle.
    pub notice: Option<String>,
    /// Mirror of the push channel status.
    pub connection: ConnectionStatus,
}

impl CatalogState {
    #[must_use]
    pub fn dish(&self, dish_id: DishId) -> Option<&Dish> {
        self.dishes.iter().find(|d| d.dish_id == dish_id)
    }

    #[must_use]
    pub fn is_updating(&self, dish_id: DishId) -> bool {
        self.pending == Some(dish_id)
    }

    pub fn begin_load(&mut self) {
        self.loading = true;
    }

    /// Apply the outcome of a full fetch. A failure keeps the last good list.
    pub fn finish_load(&mut self, result: Result<Vec<Dish>, ApiError>) {
        match result {
            Ok(dishes) => {
                self.dishes = dishes;
                self.error = None;
            }
            Err(e) => {
                warn!(error = %e, "catalog load failed");
                self.error = Some(LOAD_FAILED_MESSAGE.to_owned());
            }
        }
        self.loading = false;
    }

    /// Patch one dish from a push event. Returns `true` if a dish changed.
    ///
    /// Unknown ids and unrecognized event types are ignored.
    pub fn apply_event(&mut self, event: &PushEvent) -> bool {
        let PushEvent::DishStatusChanged(change) = event else {
            debug!(kind = event.kind(), "ignoring push event");
            return false;
        };
        let Some(dish) = self.dishes.iter_mut().find(|d| d.dish_id == change.dish_id) else {
            debug!(dish_id = %change.dish_id, "status change for unknown dish");
            return false;
        };
        if dish.is_published == change.is_published {
            return false;
        }
        dish.is_published = change.is_published;
        true
    }

    /// Mark `dish_id` as updating. Refused while another toggle is pending.
    pub fn begin_toggle(&mut self, dish_id: DishId) -> bool {
        if self.pending.is_some() {
            return false;
        }
        self.pending = Some(dish_id);
        true
    }

    /// Settle the round trip for `dish_id`. Dish data is never touched here;
    /// the flag flip arrives through [`CatalogState::apply_event`].
    pub fn finish_toggle(&mut self, dish_id: DishId, result: Result<(), ApiError>) {
        if self.pending == Some(dish_id) {
            self.pending = None;
        }
        if let Err(e) = result {
            warn!(%dish_id, error = %e, "toggle request failed");
            self.notice = Some(TOGGLE_FAILED_MESSAGE.to_owned());
        }
    }

    pub fn dismiss_notice(&mut self) {
        self.notice = None;
    }

    pub fn set_connection(&mut self, status: ConnectionStatus) {
        self.connection = status;
    }
}
