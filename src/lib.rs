//! Secret Sync Controller Library
//!
//! Replicates secrets annotated with `secret.sync.klst.pw/all-namespaces` or
//! `secret.sync.klst.pw/namespace-selector` into the selected namespaces and
//! keeps the replicas in line with their owner.
//!
//! ## Quick Start
//!
//! ```rust
//! use secret_sync_controller::prelude::*;
//! ```
//!
//! This brings commonly used types and traits into scope. For more specific imports,
//! use the individual modules.

pub mod cli;
pub mod config;
pub mod constants;
pub mod controller;
pub mod observability;
pub mod prelude;
pub mod runtime;
pub mod server;
