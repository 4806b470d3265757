//! Chat and console command routing.
//!
//! Extensions register callbacks by name in a [`CommandTable`]; the
//! [`CommandDispatcher`] tokenizes raw input and routes it to them.

use thiserror::Error;

pub mod core_commands;
mod dispatcher;
mod parse;
mod table;

pub use dispatcher::{CommandDispatcher, DEFAULT_CHAT_PREFIXES};
pub use parse::{parse_command, ParsedCommand};
pub use table::{normalize_name, CommandCallback, CommandTable, OverridePolicy};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CommandError {
    #[error("Invalid command name: {0:?}")]
    InvalidName(String),

    #[error("Command '{name}' is already registered by {owner}")]
    AlreadyExists { name: String, owner: String },

    #[error("Command '{name}' belongs to protected owner {owner}")]
    Protected { name: String, owner: String },

    #[error("Command '{name}' is owned by {owner}, not by {caller}")]
    NotOwner {
        name: String,
        owner: String,
        caller: String,
    },
}

#[cfg(test)]
mod tests;
