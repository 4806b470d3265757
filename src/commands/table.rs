use std::collections::{BTreeSet, HashMap};

use anyhow::Result;
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};

use super::CommandError;
use crate::backend::Caller;

/// Handler invoked with the dispatch context, the caller, the command name and
/// its arguments. `Ok(false)` declines the command so another path may try it.
pub type CommandCallback<C> = Box<dyn FnMut(&mut C, &dyn Caller, &str, &[String]) -> Result<bool>>;

/// What happens when a name is registered a second time.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum OverridePolicy {
    /// Fail with [`CommandError::AlreadyExists`].
    #[default]
    Reject,
    /// Replace the previous registration unless its owner is protected.
    ReplaceUnprotected,
}

pub(super) struct CommandRegistration<C> {
    pub(super) owner: String,
    pub(super) callback: CommandCallback<C>,
}

/// Trimmed, lower-cased command name.
pub fn normalize_name(name: &str) -> String {
    name.trim().to_lowercase()
}

/// Command name to handler, at most one registration per name.
pub struct CommandTable<C> {
    commands: HashMap<String, CommandRegistration<C>>,
    policy: OverridePolicy,
    protected_owners: BTreeSet<String>,
}

impl<C> Default for CommandTable<C> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C> CommandTable<C> {
    pub fn new() -> Self {
        Self {
            commands: Default::default(),
            policy: Default::default(),
            protected_owners: Default::default(),
        }
    }

    pub fn with_policy(mut self, policy: OverridePolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Owners whose commands can never be replaced, whatever the policy.
    pub fn with_protected_owners<S: Into<String>>(
        mut self,
        owners: impl IntoIterator<Item = S>,
    ) -> Self {
        self.protected_owners = owners.into_iter().map(Into::into).collect();
        self
    }

    pub fn policy(&self) -> OverridePolicy {
        self.policy
    }

    pub fn register<F>(&mut self, name: &str, owner: &str, callback: F) -> Result<(), CommandError>
    where
        F: FnMut(&mut C, &dyn Caller, &str, &[String]) -> Result<bool> + 'static,
    {
        let name = normalize_name(name);
        if name.is_empty() || name.contains(char::is_whitespace) || name.contains('"') {
            return Err(CommandError::InvalidName(name));
        }
        if let Some(existing) = self.commands.get(&name) {
            let previous = existing.owner.clone();
            match self.policy {
                OverridePolicy::Reject => {
                    return Err(CommandError::AlreadyExists {
                        name,
                        owner: previous,
                    });
                }
                OverridePolicy::ReplaceUnprotected if self.protected_owners.contains(&previous) => {
                    return Err(CommandError::Protected {
                        name,
                        owner: previous,
                    });
                }
                OverridePolicy::ReplaceUnprotected => {
                    warn!(
                        "{owner} has replaced the '{name}' command previously registered by {previous}"
                    );
                }
            }
        }
        debug!("Registered command '{name}' for {owner}");
        self.commands.insert(
            name,
            CommandRegistration {
                owner: owner.to_owned(),
                callback: Box::new(callback),
            },
        );
        Ok(())
    }

    /// Removes `name` if `owner` registered it. `Ok(false)` when nothing was registered.
    pub fn unregister(&mut self, name: &str, owner: &str) -> Result<bool, CommandError> {
        let name = normalize_name(name);
        let Some(existing) = self.commands.get(&name) else {
            return Ok(false);
        };
        if existing.owner != owner {
            return Err(CommandError::NotOwner {
                owner: existing.owner.clone(),
                caller: owner.to_owned(),
                name,
            });
        }
        self.commands.remove(&name);
        debug!("Unregistered command '{name}' of {owner}");
        Ok(true)
    }

    /// Drops everything `owner` registered, e.g. when an extension unloads.
    pub fn unregister_owner(&mut self, owner: &str) -> usize {
        let before = self.commands.len();
        self.commands.retain(|_, c| c.owner != owner);
        let removed = before - self.commands.len();
        if removed > 0 {
            info!("Removed {removed} commands of {owner}");
        }
        removed
    }

    pub fn contains(&self, name: &str) -> bool {
        self.commands.contains_key(&normalize_name(name))
    }

    pub fn owner_of(&self, name: &str) -> Option<&str> {
        self.commands
            .get(&normalize_name(name))
            .map(|c| c.owner.as_str())
    }

    pub fn is_protected(&self, name: &str) -> bool {
        self.owner_of(name)
            .is_some_and(|owner| self.protected_owners.contains(owner))
    }

    /// Registered names, sorted.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<_> = self.commands.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    pub fn len(&self) -> usize {
        self.commands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    pub(super) fn get_mut(&mut self, name: &str) -> Option<&mut CommandRegistration<C>> {
        self.commands.get_mut(name)
    }
}
