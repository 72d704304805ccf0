//! Client-side state models.
//!
//! SYSTEM CONTEXT
//! ==============
//! `catalog` holds the dish list projection and its UI flags. It is mutated
//! only by the reconciler task and published to the view as snapshots.

pub mod catalog;
