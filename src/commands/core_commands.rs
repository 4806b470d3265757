//! Commands every installation has, registered under the protected `core` owner.

use anyhow::Result;
use gatehouse_model::player::PlayerRecord;
use gatehouse_model::PlayerId;
use itertools::Itertools;

use super::{CommandError, CommandTable};
use crate::backend::{Caller, PlayerActions};
use crate::config::Messages;
use crate::services::Services;

pub const CORE_OWNER: &str = "core";

pub fn register_core_commands<H>(table: &mut CommandTable<Services<H>>) -> Result<(), CommandError>
where
    H: PlayerActions + 'static,
{
    table.register("players", CORE_OWNER, players::<H>)?;
    table.register("find", CORE_OWNER, find::<H>)?;
    table.register("whois", CORE_OWNER, whois::<H>)?;
    table.register("kick", CORE_OWNER, kick::<H>)?;
    table.register("ban", CORE_OWNER, ban::<H>)?;
    table.register("unban", CORE_OWNER, unban::<H>)?;
    Ok(())
}

fn players<H: PlayerActions>(
    services: &mut Services<H>,
    caller: &dyn Caller,
    _command: &str,
    _args: &[String],
) -> Result<bool> {
    let online = services.registry.connected();
    let messages = &services.messages;
    if online.is_empty() {
        caller.reply(&messages.no_players_connected);
        return Ok(true);
    }
    let names = online.iter().map(describe).join(", ");
    caller.reply(&Messages::render(
        &messages.player_list,
        &[("count", &online.len().to_string()), ("players", &names)],
    ));
    Ok(true)
}

fn find<H: PlayerActions>(
    services: &mut Services<H>,
    caller: &dyn Caller,
    _command: &str,
    args: &[String],
) -> Result<bool> {
    if args.is_empty() {
        return usage(caller, &services.messages.usage_find);
    }
    if let Some(record) = lookup(services, caller, &args.join(" "), false) {
        caller.reply(&player_info(services, &record));
    }
    Ok(true)
}

fn whois<H: PlayerActions>(
    services: &mut Services<H>,
    caller: &dyn Caller,
    _command: &str,
    args: &[String],
) -> Result<bool> {
    let [id] = args else {
        return usage(caller, &services.messages.usage_whois);
    };
    match services.registry.find_by_id(&PlayerId::from(id.as_str())) {
        Some(record) => caller.reply(&player_info(services, &record)),
        None => caller.reply(&Messages::render(
            &services.messages.player_not_found,
            &[("query", id)],
        )),
    }
    Ok(true)
}

fn kick<H: PlayerActions>(
    services: &mut Services<H>,
    caller: &dyn Caller,
    command: &str,
    args: &[String],
) -> Result<bool> {
    if !console_only(services, caller, command) {
        return Ok(true);
    }
    let Some((query, reason)) = args.split_first() else {
        return usage(caller, &services.messages.usage_kick);
    };
    let Some(record) = lookup(services, caller, query, true) else {
        return Ok(true);
    };
    let reason = reason_or(reason, &services.messages.default_kick_reason);
    if let Some(handle) = services.registry.connected_handle(&record.id) {
        handle.kick(&reason)?;
    }
    services.registry.disconnect_id(&record.id);
    services.server.broadcast(&Messages::render(
        &services.messages.player_kicked,
        &[("name", &record.name), ("reason", &reason)],
    ));
    Ok(true)
}

fn ban<H: PlayerActions>(
    services: &mut Services<H>,
    caller: &dyn Caller,
    command: &str,
    args: &[String],
) -> Result<bool> {
    if !console_only(services, caller, command) {
        return Ok(true);
    }
    let Some((query, reason)) = args.split_first() else {
        return usage(caller, &services.messages.usage_ban);
    };
    let Some(record) = lookup(services, caller, query, false) else {
        return Ok(true);
    };
    let reason = reason_or(reason, &services.messages.default_ban_reason);
    services.record_ban(&record.id, &record.name, &reason, &caller.name())?;
    if let Some(handle) = services.registry.connected_handle(&record.id) {
        handle.ban(&reason)?;
    }
    services.registry.disconnect_id(&record.id);
    services.server.broadcast(&Messages::render(
        &services.messages.player_banned,
        &[("name", &record.name), ("reason", &reason)],
    ));
    Ok(true)
}

fn unban<H: PlayerActions>(
    services: &mut Services<H>,
    caller: &dyn Caller,
    command: &str,
    args: &[String],
) -> Result<bool> {
    if !console_only(services, caller, command) {
        return Ok(true);
    }
    if args.is_empty() {
        return usage(caller, &services.messages.usage_unban);
    }
    let Some(record) = lookup(services, caller, &args.join(" "), false) else {
        return Ok(true);
    };
    let template = if services.remove_ban(&record.id)? {
        &services.messages.player_unbanned
    } else {
        &services.messages.player_not_banned
    };
    caller.reply(&Messages::render(template, &[("name", &record.name)]));
    Ok(true)
}

/// Exact id first, then a partial name. Misses and ambiguous names are
/// reported to the caller.
fn lookup<H: PlayerActions>(
    services: &Services<H>,
    caller: &dyn Caller,
    query: &str,
    connected_only: bool,
) -> Option<PlayerRecord> {
    let registry = &services.registry;
    let id = PlayerId::from(query.trim());
    let exact = if connected_only {
        registry.find_connected_by_id(&id)
    } else {
        registry.find_by_id(&id)
    };
    if exact.is_some() {
        return exact;
    }
    let mut matches = if connected_only {
        registry.find_connected_by_partial_name(query)
    } else {
        registry.find_by_partial_name(query)
    };
    let messages = &services.messages;
    match matches.len() {
        1 => matches.pop(),
        0 => {
            caller.reply(&Messages::render(
                &messages.player_not_found,
                &[("query", query)],
            ));
            None
        }
        _ => {
            let names = matches.iter().map(describe).join(", ");
            caller.reply(&Messages::render(
                &messages.player_ambiguous,
                &[("query", query), ("matches", &names)],
            ));
            None
        }
    }
}

fn console_only<H>(services: &Services<H>, caller: &dyn Caller, command: &str) -> bool {
    if !caller.is_console() {
        caller.reply(&Messages::render(
            &services.messages.not_allowed,
            &[("command", command)],
        ));
        return false;
    }
    true
}

fn usage(caller: &dyn Caller, text: &str) -> Result<bool> {
    caller.reply(text);
    Ok(true)
}

fn player_info<H: PlayerActions>(services: &Services<H>, record: &PlayerRecord) -> String {
    let messages = &services.messages;
    let first_seen = record
        .first_seen
        .map(|t| t.format("%Y-%m-%d %H:%M").to_string())
        .unwrap_or_else(|| messages.first_seen_unknown.clone());
    let status = if services.registry.is_connected(&record.id) {
        &messages.status_online
    } else {
        &messages.status_offline
    };
    Messages::render(
        &messages.player_info,
        &[
            ("name", &record.name),
            ("id", record.id.as_str()),
            ("firstSeen", &first_seen),
            ("status", status),
        ],
    )
}

fn describe(record: &PlayerRecord) -> String {
    format!("{} ({})", record.name, record.id)
}

fn reason_or(words: &[String], default: &str) -> String {
    if words.is_empty() {
        default.to_owned()
    } else {
        words.join(" ")
    }
}
