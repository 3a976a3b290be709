//! Command-line interface components
//!
//! This module contains CLI-specific code for the catalog loader,
//! including argument parsing, command handlers and progress display.

pub mod args;
pub mod commands;
pub mod progress;

pub use args::{CatalogArgs, Cli, Commands, ConfigAction, ConfigArgs, GlobalArgs, LoadArgs};
pub use commands::{handle_config, handle_load, handle_plan};
pub use progress::LoadProgress;
