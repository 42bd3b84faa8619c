//! CLI module for wakeup.
//!
//! This module provides the command-line interface:
//! - `commands`: Command definitions using clap derive
//! - `client`: IPC client for daemon communication
//! - `display`: Output formatting and display logic
//! - `watch`: Event follower that renders the ringing screen

pub mod client;
pub mod commands;
pub mod display;
pub mod watch;

pub use client::IpcClient;
pub use commands::{Cli, Commands, RingArgs, ScheduleArgs};
pub use display::Display;
pub use watch::run_watch;
