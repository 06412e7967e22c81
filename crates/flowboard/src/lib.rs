#![forbid(unsafe_code)]

//! FlowBoard terminal client.
//!
//! Polls a kanban-flow simulation server, feeds each board snapshot through
//! the [`flowboard_core::Reconciler`] and renders the board as text with
//! in-flight card glides. Control actions (set-config, start, stop,
//! clear-metrics) are available both from the `watch` loop and as one-shot
//! subcommands.

pub mod api;
pub mod app;
pub mod cancellation;
pub mod cli;
pub mod config;
pub mod error;
pub mod input;
pub mod layout;
pub mod logging;
pub mod poller;
pub mod program;
pub mod render;
pub mod subscription;
pub mod wire;

pub use cli::{run, run_from_env};
pub use error::{ClientError, Result};
