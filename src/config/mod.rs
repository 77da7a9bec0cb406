//! # Configuration
//!
//! - `controller`: controller-level settings and their defaults

pub mod controller;

pub use controller::{ControllerConfig, LogFormat};
