use std::collections::BTreeSet;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::commands::{OverridePolicy, DEFAULT_CHAT_PREFIXES};
use crate::store;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    /// Directory every persisted document lives under.
    #[serde(default = "default_store_root")]
    pub store_root: PathBuf,

    #[serde(default = "default_log_spec")]
    pub log_spec: String,

    #[serde(default = "default_chat_command_prefixes")]
    pub chat_command_prefixes: Vec<char>,

    #[serde(default)]
    pub command_override: OverridePolicy,

    /// Owners whose commands can never be replaced by another registration.
    #[serde(default = "default_protected_owners")]
    pub protected_owners: BTreeSet<String>,

    #[serde(default = "default_true")]
    pub keep_backups: bool,

    /// When disabled, player changes are only written on shutdown.
    #[serde(default = "default_true")]
    pub write_through: bool,

    #[serde(default)]
    pub messages: Messages,
}

fn default_store_root() -> PathBuf {
    store::data_dir().join("data")
}

fn default_log_spec() -> String {
    "warn,gatehouse=debug,gatestore=debug".into()
}

fn default_chat_command_prefixes() -> Vec<char> {
    DEFAULT_CHAT_PREFIXES.to_vec()
}

fn default_protected_owners() -> BTreeSet<String> {
    BTreeSet::from([crate::commands::core_commands::CORE_OWNER.to_owned()])
}

fn default_true() -> bool {
    true
}

impl Default for Config {
    fn default() -> Self {
        Self {
            store_root: default_store_root(),
            log_spec: default_log_spec(),
            chat_command_prefixes: default_chat_command_prefixes(),
            command_override: Default::default(),
            protected_owners: default_protected_owners(),
            keep_backups: true,
            write_through: true,
            messages: Default::default(),
        }
    }
}

/// User-facing texts. `{name}` style placeholders are substituted by [`Messages::render`].
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct Messages {
    pub unknown_command: String,
    pub player_not_found: String,
    pub player_ambiguous: String,
    pub player_list: String,
    pub no_players_connected: String,
    pub command_failed: String,
    pub player_info: String,
    pub player_kicked: String,
    pub player_banned: String,
    pub player_unbanned: String,
    pub player_not_banned: String,
    pub player_refused: String,
    pub not_allowed: String,
    pub command_list: String,
    pub first_seen_unknown: String,
    pub status_online: String,
    pub status_offline: String,
    pub default_kick_reason: String,
    pub default_ban_reason: String,
    pub usage_find: String,
    pub usage_whois: String,
    pub usage_kick: String,
    pub usage_ban: String,
    pub usage_unban: String,
}

impl Default for Messages {
    fn default() -> Self {
        Self {
            unknown_command: "Unknown command: {command}".into(),
            player_not_found: "No player matches '{query}'".into(),
            player_ambiguous: "Several players match '{query}': {matches}".into(),
            player_list: "Players online ({count}): {players}".into(),
            no_players_connected: "Nobody is online".into(),
            command_failed: "Command {command} failed".into(),
            player_info: "{name} ({id}), first seen {firstSeen}, {status}".into(),
            player_kicked: "{name} was kicked: {reason}".into(),
            player_banned: "{name} was banned: {reason}".into(),
            player_unbanned: "{name} is no longer banned".into(),
            player_not_banned: "{name} is not banned".into(),
            player_refused: "{name} is banned: {reason}".into(),
            not_allowed: "You are not allowed to use {command}".into(),
            command_list: "Commands: {commands}".into(),
            first_seen_unknown: "unknown".into(),
            status_online: "online".into(),
            status_offline: "offline".into(),
            default_kick_reason: "Kicked".into(),
            default_ban_reason: "Banned".into(),
            usage_find: "Usage: find <name or id>".into(),
            usage_whois: "Usage: whois <id>".into(),
            usage_kick: "Usage: kick <player> [reason]".into(),
            usage_ban: "Usage: ban <player> [reason]".into(),
            usage_unban: "Usage: unban <player>".into(),
        }
    }
}

impl Messages {
    /// Replaces every `{key}` in `template` in a single pass, so substituted
    /// values are never expanded again. Unknown placeholders are left as they are.
    pub fn render(template: &str, vars: &[(&str, &str)]) -> String {
        let mut out = String::with_capacity(template.len());
        let mut rest = template;
        while let Some(start) = rest.find('{') {
            out.push_str(&rest[..start]);
            let Some(len) = rest[start..].find('}') else {
                rest = &rest[start..];
                break;
            };
            let placeholder = &rest[start..=start + len];
            let key = &placeholder[1..placeholder.len() - 1];
            match vars.iter().find(|(k, _)| *k == key) {
                Some((_, value)) => out.push_str(value),
                None => out.push_str(placeholder),
            }
            rest = &rest[start + len + 1..];
        }
        out.push_str(rest);
        out
    }
}
