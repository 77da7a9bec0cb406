//! # Runtime
//!
//! - `initialization`: logging, metrics, server and client setup
//! - `watch_loop`: the secret controller and its restart loop
//! - `triggers`: mapping of replica and namespace events to owner secrets
//! - `error_policy`: requeue of failed reconciliations, watch error classification

pub mod error_policy;
pub mod initialization;
pub mod triggers;
pub mod watch_loop;
