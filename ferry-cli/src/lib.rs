//! CLI interface for ferry
//!
//! This crate provides the command-line interface for ferry: argument
//! parsing, logging setup and the subcommand implementations.

pub mod args;
pub mod commands;

pub use args::{BridgeArgs, Cli, Commands};
pub use commands::{init_tracing, interfaces_report};
