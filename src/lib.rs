//! Declarative host provisioning engine.
//!
//! Dependencies are named, per-system declarations of "is this already
//! true?" and "make it true", resolved recursively against the current host.
//! The library is organised around four cores:
//!
//! - **[`context`]**: the closed accessor vocabulary and per-host payload
//!   resolution behind every dependency body
//! - **[`vars`]**: variables with layered defaults, prompting, and a saved
//!   snapshot carried between runs
//! - **[`pkg`]**: package-manager backends with version-aware detection and
//!   installation (RubyGems today)
//! - **[`report`]**: a durable, crash-safe queue of run outcomes delivered to
//!   a collector
//!
//! [`dep`] drives them, [`run`] wires them to the host, and [`commands`]
//! exposes them through the `rig` binary.
#![deny(clippy::or_fun_call)]
#![deny(clippy::bool_to_int_with_if)]

pub mod cli;
pub mod commands;
pub mod config;
pub mod context;
pub mod dep;
pub mod error;
pub mod exec;
pub mod ip;
pub mod logging;
pub mod operations;
pub mod pkg;
pub mod platform;
pub mod report;
pub mod run;
pub mod vars;
