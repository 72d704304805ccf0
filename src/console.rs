//! Terminal front end: renders catalog snapshots and parses stdin commands.
//!
//! Rendering is a pure function of `CatalogState`, mirroring the web card
//! layout: a header with the live indicator, the error banner, the toggle
//! notice, and one row per dish with its badge and action label.

#[cfg(test)]
#[path = "console_test.rs"]
mod console_test;

use std::fmt::Write;

use crate::net::types::{Dish, DishId};
use crate::services::reconciler::Command;
use crate::state::catalog::{CatalogState, ConnectionStatus};

pub const HELP: &str = "commands: list | refresh | toggle <id> | dismiss | help | quit";

/// One parsed line of user input.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Input {
    /// Forward to the reconciler.
    Command(Command),
    /// Re-render the current snapshot.
    List,
    Help,
    Quit,
    /// Blank line.
    Nothing,
}

/// Parse one console line.
///
/// # Errors
///
/// Returns a user-facing message for unknown commands or bad dish ids.
pub fn parse_input(line: &str) -> Result<Input, String> {
    let mut parts = line.split_whitespace();
    let Some(verb) = parts.next() else {
        return Ok(Input::Nothing);
    };
    let input = match verb.to_ascii_lowercase().as_str() {
        "list" | "ls" => Input::List,
        "refresh" | "r" => Input::Command(Command::Refresh),
        "dismiss" | "ok" => Input::Command(Command::DismissNotice),
        "help" | "?" => Input::Help,
        "quit" | "exit" | "q" => Input::Quit,
        "toggle" | "t" => {
            let Some(raw) = parts.next() else {
                return Err("usage: toggle <id>".to_owned());
            };
            let dish_id = raw
                .parse::<DishId>()
                .map_err(|_| format!("invalid dish id: {raw}"))?;
            Input::Command(Command::Toggle(dish_id))
        }
        other => return Err(format!("unknown command: {other} ({HELP})")),
    };
    if parts.next().is_some() {
        return Err(format!("too many arguments ({HELP})"));
    }
    Ok(input)
}

#[must_use]
pub fn connection_label(status: ConnectionStatus) -> &'static str {
    match status {
        ConnectionStatus::Connected => "LIVE",
        ConnectionStatus::Connecting => "CONNECTING",
        ConnectionStatus::Disconnected => "OFFLINE",
    }
}

#[must_use]
pub fn badge(dish: &Dish) -> &'static str {
    if dish.is_published { "LIVE" } else { "DRAFT" }
}

/// Label of the dish's action control.
#[must_use]
pub fn action_label(state: &CatalogState, dish: &Dish) -> &'static str {
    if state.is_updating(dish.dish_id) {
        "UPDATING..."
    } else if dish.is_published {
        "UNPUBLISH"
    } else {
        "PUBLISH"
    }
}

/// Render the whole screen for one snapshot.
#[must_use]
pub fn render(state: &CatalogState) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "DISH MANAGEMENT  [{}]", connection_label(state.connection));

    if let Some(error) = &state.error {
        let _ = writeln!(out, "!! {error}");
    }
    if let Some(notice) = &state.notice {
        let _ = writeln!(out, "** {notice} (type `dismiss`)");
    }

    if state.loading {
        let _ = writeln!(out, "loading...");
        return out;
    }

    let _ = writeln!(out, "ALL DISHES: {} items in catalog", state.dishes.len());
    if state.dishes.is_empty() {
        let _ = writeln!(out, "No dishes available");
        return out;
    }

    let id_width = state
        .dishes
        .iter()
        .map(|d| d.dish_id.to_string().len())
        .max()
        .unwrap_or(1);
    for dish in &state.dishes {
        let _ = writeln!(
            out,
            "  #{:<id_width$}  [{:<5}]  {}  <{}>",
            dish.dish_id,
            badge(dish),
            dish.dish_name,
            action_label(state, dish),
        );
    }
    out
}
