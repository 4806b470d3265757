//! A backend that lives on the terminal: stdin lines stand in for the
//! notifications and chat a game server would deliver.
//!
//! Lines starting with `:` simulate the server side:
//!
//! ```text
//! :join <id> <name>   a player connects
//! :leave <id>         a player disconnects
//! :say <id> <text>    a connected player types in chat
//! ```
//!
//! Any other line is console command input.

use std::cell::RefCell;
use std::io::{BufRead, Write};
use std::rc::Rc;

use anyhow::{Context, Result};
use gatehouse_model::PlayerId;
use gatestore::DocumentStore;
use itertools::Itertools;
use log::{info, warn};

use crate::backend::{Caller, PlayerActions, PlayerHandle, ServerActions};
use crate::commands::core_commands::register_core_commands;
use crate::commands::{parse_command, CommandDispatcher, CommandTable};
use crate::config::{Config, Messages};
use crate::registry::PlayerRegistry;
use crate::services::Services;
use crate::utils::ResultExt;

/// Shared output every simulated party writes to.
#[derive(Clone)]
pub struct Console {
    out: Rc<RefCell<dyn Write>>,
}

impl Console {
    pub fn new(out: impl Write + 'static) -> Self {
        Self {
            out: Rc::new(RefCell::new(out)),
        }
    }

    pub fn say(&self, text: &str) {
        let mut out = self.out.borrow_mut();
        if let Err(e) = writeln!(out, "{text}").and_then(|_| out.flush()) {
            warn!("Cannot write to console: {e}");
        }
    }
}

pub struct ConsolePlayer {
    id: PlayerId,
    name: String,
    console: Console,
}

impl PlayerHandle for ConsolePlayer {
    fn id(&self) -> PlayerId {
        self.id.clone()
    }

    fn display_name(&self) -> String {
        self.name.clone()
    }
}

impl PlayerActions for ConsolePlayer {
    fn message(&self, text: &str) {
        self.console.say(&format!("[to {}] {text}", self.name));
    }

    fn kick(&self, reason: &str) -> Result<()> {
        self.console.say(&format!("[kick {}] {reason}", self.name));
        Ok(())
    }

    fn ban(&self, reason: &str) -> Result<()> {
        self.console.say(&format!("[ban {}] {reason}", self.name));
        Ok(())
    }

    fn teleport(&self, x: f32, y: f32, z: f32) -> Result<()> {
        self.console
            .say(&format!("[teleport {}] {x} {y} {z}", self.name));
        Ok(())
    }
}

struct ConsoleServer {
    console: Console,
}

impl ServerActions for ConsoleServer {
    fn broadcast(&self, text: &str) {
        self.console.say(&format!("[broadcast] {text}"));
    }

    fn run_command(&self, command: &str, args: &[String]) -> Result<()> {
        self.console
            .say(&format!("[server] {command} {}", args.join(" ")));
        Ok(())
    }
}

struct ConsoleCaller {
    console: Console,
}

impl Caller for ConsoleCaller {
    fn id(&self) -> PlayerId {
        PlayerId::from("console")
    }

    fn name(&self) -> String {
        "Server".into()
    }

    fn is_console(&self) -> bool {
        true
    }

    fn reply(&self, text: &str) {
        self.console.say(text);
    }
}

struct ChatCaller {
    id: PlayerId,
    name: String,
    console: Console,
}

impl Caller for ChatCaller {
    fn id(&self) -> PlayerId {
        self.id.clone()
    }

    fn name(&self) -> String {
        self.name.clone()
    }

    fn reply(&self, text: &str) {
        self.console.say(&format!("[to {}] {text}", self.name));
    }
}

pub struct ConsoleBackend {
    console: Console,
    services: Services<ConsolePlayer>,
    dispatcher: CommandDispatcher<Services<ConsolePlayer>>,
    chat_prefixes: Vec<char>,
}

impl ConsoleBackend {
    pub fn new(config: &Config, out: impl Write + 'static) -> Result<Self> {
        let console = Console::new(out);
        let open_store = || {
            DocumentStore::open(&config.store_root)
                .map(|store| store.with_backups(config.keep_backups))
                .with_context(|| format!("Cannot open store at {}", config.store_root.display()))
        };
        let registry: PlayerRegistry<ConsolePlayer> = PlayerRegistry::load(open_store()?)
            .context("Cannot load players")?
            .with_write_through(config.write_through);
        let services = Services::new(
            registry,
            open_store()?,
            config.messages.clone(),
            Box::new(ConsoleServer {
                console: console.clone(),
            }),
        );

        let mut table: CommandTable<Services<ConsolePlayer>> = CommandTable::new()
            .with_policy(config.command_override)
            .with_protected_owners(config.protected_owners.iter().cloned());
        register_core_commands(&mut table)?;
        let dispatcher = CommandDispatcher::new(table)
            .with_chat_prefixes(config.chat_command_prefixes.iter().copied());

        Ok(Self {
            console,
            services,
            dispatcher,
            chat_prefixes: config.chat_command_prefixes.clone(),
        })
    }

    pub fn dispatcher_mut(&mut self) -> &mut CommandDispatcher<Services<ConsolePlayer>> {
        &mut self.dispatcher
    }

    /// Feeds every line of `input` and saves whatever is pending at the end.
    pub fn run(&mut self, input: impl BufRead) -> Result<()> {
        for line in input.lines() {
            let line = line.context("Cannot read console input")?;
            self.handle_line(&line).print_err();
        }
        info!("Console input closed");
        self.services.flush()
    }

    pub fn handle_line(&mut self, line: &str) -> Result<()> {
        let line = line.trim();
        if line.is_empty() {
            return Ok(());
        }
        match line.strip_prefix(':') {
            Some(event) => self.handle_event(event),
            None => {
                let caller = ConsoleCaller {
                    console: self.console.clone(),
                };
                self.dispatch(&caller, line, false)
            }
        }
    }

    fn handle_event(&mut self, event: &str) -> Result<()> {
        let (kind, rest) = split_word(event);
        match kind {
            "join" => {
                let (id, name) = split_word(rest);
                if id.is_empty() || name.is_empty() {
                    self.console.say("Usage: :join <id> <name>");
                    return Ok(());
                }
                self.join(PlayerId::from(id), name)
            }
            "leave" => {
                let id = PlayerId::from(rest);
                if self.services.registry.disconnect_id(&id).is_none() {
                    self.console.say(&format!("{id} is not connected"));
                }
                Ok(())
            }
            "say" => {
                let (id, text) = split_word(rest);
                let Some(record) = self.services.registry.find_connected_by_id(&PlayerId::from(id))
                else {
                    self.console.say(&format!("{id} is not connected"));
                    return Ok(());
                };
                let caller = ChatCaller {
                    id: record.id,
                    name: record.name,
                    console: self.console.clone(),
                };
                self.dispatch(&caller, text, true)
            }
            _ => {
                self.console.say(&format!("Unknown event :{kind}"));
                Ok(())
            }
        }
    }

    fn join(&mut self, id: PlayerId, name: &str) -> Result<()> {
        if self.services.is_banned(&id)? {
            let reason = self.services.ban_reason(&id)?.unwrap_or_default();
            self.console.say(&Messages::render(
                &self.services.messages.player_refused,
                &[("name", name), ("reason", &reason)],
            ));
            return Ok(());
        }
        let player = ConsolePlayer {
            id,
            name: name.to_owned(),
            console: self.console.clone(),
        };
        let record = self.services.registry.notify_connect(player)?;
        self.console.say(&format!("{} joined", record.name));
        Ok(())
    }

    /// Unhandled commands are answered here. `commands` falls back to the
    /// listing of registered names unless an extension took the name.
    fn dispatch(&mut self, caller: &dyn Caller, text: &str, chat: bool) -> Result<()> {
        let handled = if chat {
            self.dispatcher
                .handle_chat_message(&mut self.services, caller, text)
        } else {
            self.dispatcher
                .handle_console_message(&mut self.services, caller, text)
        };
        let command_text = if chat {
            self.strip_chat_prefix(text)
        } else {
            Some(text)
        };
        let messages = &self.services.messages;
        match handled {
            Ok(true) => Ok(()),
            Ok(false) => {
                let Some(command_text) = command_text else {
                    self.console.say(&format!("{}: {text}", caller.name()));
                    return Ok(());
                };
                let Some(parsed) = parse_command(command_text) else {
                    return Ok(());
                };
                if parsed.command == "commands" {
                    let names = self.dispatcher.table().names().iter().join(", ");
                    caller.reply(&Messages::render(
                        &messages.command_list,
                        &[("commands", &names)],
                    ));
                } else {
                    caller.reply(&Messages::render(
                        &messages.unknown_command,
                        &[("command", &parsed.command)],
                    ));
                }
                Ok(())
            }
            Err(e) => {
                let command = command_text
                    .and_then(parse_command)
                    .map(|p| p.command)
                    .unwrap_or_default();
                caller.reply(&Messages::render(
                    &messages.command_failed,
                    &[("command", &command)],
                ));
                Err(e)
            }
        }
    }

    fn strip_chat_prefix<'a>(&self, text: &'a str) -> Option<&'a str> {
        text.trim_start()
            .strip_prefix(|c: char| self.chat_prefixes.contains(&c))
    }
}

fn split_word(text: &str) -> (&str, &str) {
    let text = text.trim();
    match text.split_once(char::is_whitespace) {
        Some((word, rest)) => (word, rest.trim()),
        None => (text, ""),
    }
}
