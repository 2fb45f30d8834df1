//! Host connection engine behind the `rhc` command.
//!
//! Connects a Linux host to Red Hat subscription management, the
//! Lightspeed telemetry service and the remote management daemon, and
//! tears those connections down again.
//!
//! The public API is organised into four layers:
//!
//! - **[`features`]**: the feature registry, dependency resolution and
//!   stored preferences
//! - **[`rhsm`], [`telemetry`], [`systemd`]**: collaborator adapters over
//!   D-Bus and external programs
//! - **[`orchestrator`]**: connect, disconnect and status sequencing
//! - **[`commands`]**: subcommand adapters wiring configuration, logging and
//!   the [`report`] sink together
#![deny(clippy::or_fun_call)]
#![deny(clippy::bool_to_int_with_if)]

pub mod cli;
pub mod commands;
pub mod config;
pub mod context;
pub mod error;
pub mod exec;
pub mod features;
pub mod logging;
pub mod marker;
pub mod orchestrator;
pub mod platform;
pub mod report;
pub mod rhsm;
pub mod systemd;
pub mod telemetry;
