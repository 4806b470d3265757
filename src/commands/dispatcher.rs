use anyhow::{Context, Result};
use log::debug;

use super::parse::parse_command;
use super::table::CommandTable;
use super::CommandError;
use crate::backend::Caller;

pub const DEFAULT_CHAT_PREFIXES: [char; 2] = ['/', '!'];

/// Routes raw chat and console text to the handlers in a [`CommandTable`].
///
/// The dispatcher never talks to the user itself: `Ok(false)` means nothing
/// handled the text and the caller reports that in its own words.
pub struct CommandDispatcher<C> {
    table: CommandTable<C>,
    chat_prefixes: Vec<char>,
}

impl<C> CommandDispatcher<C> {
    pub fn new(table: CommandTable<C>) -> Self {
        Self {
            table,
            chat_prefixes: DEFAULT_CHAT_PREFIXES.to_vec(),
        }
    }

    pub fn with_chat_prefixes(mut self, prefixes: impl IntoIterator<Item = char>) -> Self {
        self.chat_prefixes = prefixes.into_iter().collect();
        self
    }

    pub fn table(&self) -> &CommandTable<C> {
        &self.table
    }

    pub fn table_mut(&mut self) -> &mut CommandTable<C> {
        &mut self.table
    }

    pub fn register_command<F>(&mut self, name: &str, owner: &str, callback: F) -> Result<(), CommandError>
    where
        F: FnMut(&mut C, &dyn Caller, &str, &[String]) -> Result<bool> + 'static,
    {
        self.table.register(name, owner, callback)
    }

    pub fn unregister_command(&mut self, name: &str, owner: &str) -> Result<bool, CommandError> {
        self.table.unregister(name, owner)
    }

    /// Chat line from a player. Only text starting with a command prefix is
    /// considered, everything else is plain chat and yields `Ok(false)`.
    pub fn handle_chat_message(&mut self, ctx: &mut C, caller: &dyn Caller, text: &str) -> Result<bool> {
        let text = text.trim_start();
        let Some(command) = text.strip_prefix(|c: char| self.chat_prefixes.contains(&c)) else {
            return Ok(false);
        };
        self.dispatch(ctx, caller, command)
    }

    /// Console input, taken verbatim.
    pub fn handle_console_message(&mut self, ctx: &mut C, caller: &dyn Caller, text: &str) -> Result<bool> {
        self.dispatch(ctx, caller, text)
    }

    fn dispatch(&mut self, ctx: &mut C, caller: &dyn Caller, text: &str) -> Result<bool> {
        let Some(parsed) = parse_command(text) else {
            return Ok(false);
        };
        let Some(registration) = self.table.get_mut(&parsed.command) else {
            debug!("No handler for '{}' from {}", parsed.command, caller.id());
            return Ok(false);
        };
        debug!(
            "{} runs '{}' {:?} (owner {})",
            caller.id(),
            parsed.command,
            parsed.args,
            registration.owner
        );
        (registration.callback)(ctx, caller, &parsed.command, &parsed.args)
            .with_context(|| format!("Command '{}' failed", parsed.command))
    }
}
