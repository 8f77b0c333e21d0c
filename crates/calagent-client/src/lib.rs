//! calagent command-line interface.
//!
//! Thin commands over [`calagent_providers::CalendarProvider`] plus an
//! interactive chat session with the calendar assistant.

pub mod cli;
pub mod commands;
pub mod config;
pub mod error;
pub mod secret;

pub use cli::Cli;
pub use config::Settings;
pub use error::{ClientError, ClientResult};
