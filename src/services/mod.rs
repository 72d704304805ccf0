//! Services: long-running tasks that own client state.

pub mod reconciler;
