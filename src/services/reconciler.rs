//! Reconciler: merges REST snapshots with push-channel updates.
//!
//! DESIGN
//! ======
//! The reconciler owns the only mutable `CatalogState`. Its `run` loop is the
//! single execution context of the client: push events, connection status
//! changes, user commands and REST completions are all handled on one task,
//! so no locking is needed and each field follows last-writer-wins.
//!
//! REST calls are spawned and report back through a completion channel, so
//! push events keep applying while a fetch or toggle is in flight. A toggle's
//! response only settles the pending marker; the published flag changes when
//! the server's `dishStatusChanged` event arrives, whichever comes first.
//!
//! ERROR HANDLING
//! ==============
//! Fetch failures leave the last good list and set the banner. Toggle
//! failures clear the marker and set the notice. Neither is retried.

#[cfg(test)]
#[path = "reconciler_test.rs"]
mod reconciler_test;

use std::sync::Arc;

use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::net::api::DishApi;
use crate::net::push_client::EventStream;
use crate::net::types::{ApiError, Dish, DishId, PushEvent};
use crate::state::catalog::{CatalogState, ConnectionStatus};

/// Errors returned by the direct reconciler operations.
#[derive(Debug, thiserror::Error)]
pub enum ReconcileError {
    #[error("failed to load dishes: {0}")]
    Fetch(#[source] ApiError),

    #[error("failed to toggle dish {dish_id}: {source}")]
    Mutation {
        dish_id: DishId,
        #[source]
        source: ApiError,
    },

    #[error("toggle already in flight for dish {0}")]
    MutationInFlight(DishId),
}

/// User intents sent from the front end.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Command {
    Refresh,
    Toggle(DishId),
    DismissNotice,
    Shutdown,
}

/// A spawned REST call reporting back to the run loop.
#[derive(Debug)]
enum Completion {
    Load(Result<Vec<Dish>, ApiError>),
    Toggle(DishId, Result<(), ApiError>),
}

pub struct Reconciler {
    api: Arc<dyn DishApi>,
    state: CatalogState,
}

impl Reconciler {
    #[must_use]
    pub fn new(api: Arc<dyn DishApi>) -> Self {
        Self { api, state: CatalogState::default() }
    }

    #[must_use]
    pub fn state(&self) -> &CatalogState {
        &self.state
    }

    #[must_use]
    pub fn dishes(&self) -> &[Dish] {
        &self.state.dishes
    }

    /// Replace the catalog with a fresh fetch.
    ///
    /// # Errors
    ///
    /// Returns [`ReconcileError::Fetch`]; the previous catalog is kept and the
    /// error banner is set.
    pub async fn load_all(&mut self) -> Result<&[Dish], ReconcileError> {
        self.state.begin_load();
        let result = self.api.fetch_dishes().await;
        self.state.finish_load(result.clone());
        match result {
            Ok(_) => Ok(self.state.dishes.as_slice()),
            Err(e) => Err(ReconcileError::Fetch(e)),
        }
    }

    /// Patch the catalog from one push event. Returns `true` if a dish changed.
    pub fn apply_event(&mut self, event: &PushEvent) -> bool {
        self.state.apply_event(event)
    }

    /// Send a toggle request and wait for its round trip. The marker is set
    /// for the duration of the call and cleared on every outcome.
    ///
    /// # Errors
    ///
    /// Returns [`ReconcileError::MutationInFlight`] without touching the
    /// marker if another toggle is pending, or [`ReconcileError::Mutation`]
    /// if the request fails.
    pub async fn request_toggle(&mut self, dish_id: DishId) -> Result<(), ReconcileError> {
        if !self.state.begin_toggle(dish_id) {
            let pending = self.state.pending.unwrap_or(dish_id);
            return Err(ReconcileError::MutationInFlight(pending));
        }
        let result = self.api.toggle_dish(dish_id).await.map(|_| ());
        self.state.finish_toggle(dish_id, result.clone());
        result.map_err(|source| ReconcileError::Mutation { dish_id, source })
    }

    /// Start the run loop on its own task.
    #[must_use]
    pub fn spawn(
        self,
        events: EventStream,
        status: watch::Receiver<ConnectionStatus>,
    ) -> (CatalogHandle, JoinHandle<()>) {
        let (command_tx, command_rx) = mpsc::unbounded_channel();
        let (snapshot_tx, snapshot_rx) = watch::channel(self.state.clone());
        let task = tokio::spawn(self.run(events, status, command_rx, snapshot_tx));
        (CatalogHandle { commands: command_tx, snapshot: snapshot_rx }, task)
    }

    /// Drive the catalog until a `Shutdown` command or every handle is gone.
    ///
    /// Issues the initial load, then publishes a snapshot after every input.
    pub async fn run(
        mut self,
        mut events: EventStream,
        mut status: watch::Receiver<ConnectionStatus>,
        mut commands: mpsc::UnboundedReceiver<Command>,
        snapshot: watch::Sender<CatalogState>,
    ) {
        let (done_tx, mut done_rx) = mpsc::unbounded_channel::<Completion>();
        let mut events_open = true;
        let mut status_open = true;

        self.state.set_connection(*status.borrow_and_update());
        self.start_load(&done_tx);
        self.publish(&snapshot);

        loop {
            tokio::select! {
                event = events.recv(), if events_open => match event {
                    Some(event) => {
                        self.state.apply_event(&event);
                    }
                    None => {
                        debug!("push event stream ended");
                        events_open = false;
                    }
                },
                changed = status.changed(), if status_open => {
                    if changed.is_ok() {
                        let current = *status.borrow_and_update();
                        self.state.set_connection(current);
                    } else {
                        status_open = false;
                        self.state.set_connection(ConnectionStatus::Disconnected);
                    }
                }
                command = commands.recv() => match command {
                    Some(Command::Refresh) => self.start_load(&done_tx),
                    Some(Command::Toggle(dish_id)) => self.start_toggle(dish_id, &done_tx),
                    Some(Command::DismissNotice) => self.state.dismiss_notice(),
                    Some(Command::Shutdown) | None => break,
                },
                Some(done) = done_rx.recv() => self.complete(done),
            }
            self.publish(&snapshot);
        }

        info!("reconciler stopped");
    }

    fn start_load(&mut self, done: &mpsc::UnboundedSender<Completion>) {
        if self.state.loading {
            debug!("catalog load already in flight");
            return;
        }
        self.state.begin_load();
        let api = Arc::clone(&self.api);
        let done = done.clone();
        tokio::spawn(async move {
            let result = api.fetch_dishes().await;
            let _ = done.send(Completion::Load(result));
        });
    }

    fn start_toggle(&mut self, dish_id: DishId, done: &mpsc::UnboundedSender<Completion>) {
        if !self.state.begin_toggle(dish_id) {
            warn!(%dish_id, pending = ?self.state.pending, "toggle refused while another is in flight");
            return;
        }
        let api = Arc::clone(&self.api);
        let done = done.clone();
        tokio::spawn(async move {
            let result = api.toggle_dish(dish_id).await.map(|_| ());
            let _ = done.send(Completion::Toggle(dish_id, result));
        });
    }

    fn complete(&mut self, done: Completion) {
        match done {
            Completion::Load(result) => {
                if let Ok(dishes) = &result {
                    info!(count = dishes.len(), "catalog loaded");
                }
                self.state.finish_load(result);
            }
            Completion::Toggle(dish_id, result) => self.state.finish_toggle(dish_id, result),
        }
    }

    fn publish(&self, snapshot: &watch::Sender<CatalogState>) {
        snapshot.send_if_modified(|current| {
            if *current == self.state {
                return false;
            }
            current.clone_from(&self.state);
            true
        });
    }
}

// =============================================================================
// HANDLE
// =============================================================================

/// Front-end side of a running reconciler: send commands, read snapshots.
#[derive(Clone)]
pub struct CatalogHandle {
    commands: mpsc::UnboundedSender<Command>,
    snapshot: watch::Receiver<CatalogState>,
}

impl CatalogHandle {
    /// Queue a command. Returns `false` if the reconciler has stopped.
    pub fn send(&self, command: Command) -> bool {
        self.commands.send(command).is_ok()
    }

    pub fn refresh(&self) -> bool {
        self.send(Command::Refresh)
    }

    pub fn toggle(&self, dish_id: DishId) -> bool {
        self.send(Command::Toggle(dish_id))
    }

    pub fn dismiss_notice(&self) -> bool {
        self.send(Command::DismissNotice)
    }

    pub fn shutdown(&self) -> bool {
        self.send(Command::Shutdown)
    }

    /// Latest published state.
    #[must_use]
    pub fn snapshot(&self) -> CatalogState {
        self.snapshot.borrow().clone()
    }

    /// A receiver that wakes on every published change.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<CatalogState> {
        self.snapshot.clone()
    }
}
