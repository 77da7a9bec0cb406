//! # Secret Sync Controller
//!
//! A Kubernetes controller that replicates annotated secrets into other
//! namespaces.
//!
//! ## Overview
//!
//! A secret annotated with one of
//!
//! - `secret.sync.klst.pw/all-namespaces: "true"`
//! - `secret.sync.klst.pw/namespace-selector: "<label selector>"`
//!
//! is copied into every (respectively every matching) namespace. Replicas carry
//! an owner reference to the original secret and are updated when it changes,
//! deleted when their namespace stops being targeted and garbage collected by
//! the cluster when the original is deleted.

use anyhow::Result;
use clap::Parser;
use secret_sync_controller::cli::Cli;
use secret_sync_controller::runtime::initialization::initialize;
use secret_sync_controller::runtime::watch_loop::run_watch_loop;

#[tokio::main]
async fn main() -> Result<()> {
    let config = Cli::parse().into_config();
    let init = initialize(config).await?;

    run_watch_loop(init.client, init.reconciler, init.server_state).await
}
