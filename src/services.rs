use anyhow::{Context, Result};
use chrono::Utc;
use gatehouse_model::{Mapping, PlayerId, Value};
use gatestore::DocumentStore;
use log::info;

use crate::backend::{PlayerHandle, ServerActions};
use crate::config::Messages;
use crate::registry::PlayerRegistry;

/// Document with one entry per banned player id.
pub const BANS_DOCUMENT: &str = "bans";

/// Everything a command callback gets to work with.
pub struct Services<H> {
    pub registry: PlayerRegistry<H>,
    /// Extension state other than the player records.
    pub data: DocumentStore,
    pub messages: Messages,
    pub server: Box<dyn ServerActions>,
}

impl<H: PlayerHandle> Services<H> {
    pub fn new(
        registry: PlayerRegistry<H>,
        data: DocumentStore,
        messages: Messages,
        server: Box<dyn ServerActions>,
    ) -> Self {
        Self {
            registry,
            data,
            messages,
            server,
        }
    }

    pub fn is_banned(&mut self, id: &PlayerId) -> Result<bool> {
        Ok(self.data.get_value(BANS_DOCUMENT, &[id.as_str()])?.is_some())
    }

    pub fn ban_reason(&mut self, id: &PlayerId) -> Result<Option<String>> {
        let reason = self
            .data
            .get_as(BANS_DOCUMENT, &[id.as_str(), "reason"])
            .with_context(|| format!("Broken ban entry for {id}"))?;
        Ok(reason)
    }

    pub fn record_ban(&mut self, id: &PlayerId, name: &str, reason: &str, by: &str) -> Result<()> {
        let entry = Mapping::from([
            ("name".to_owned(), Value::from(name)),
            ("reason".to_owned(), Value::from(reason)),
            ("by".to_owned(), Value::from(by)),
            ("at".to_owned(), Value::from(Utc::now().to_rfc3339())),
        ]);
        self.data.set_value(BANS_DOCUMENT, &[id.as_str()], entry)?;
        self.data.save(BANS_DOCUMENT)?;
        info!("{by} banned {id} ({name}): {reason}");
        Ok(())
    }

    /// Returns `false` if `id` was not banned.
    pub fn remove_ban(&mut self, id: &PlayerId) -> Result<bool> {
        if self.data.remove_value(BANS_DOCUMENT, &[id.as_str()])?.is_none() {
            return Ok(false);
        }
        self.data.save(BANS_DOCUMENT)?;
        info!("Unbanned {id}");
        Ok(true)
    }

    /// Writes everything still pending, called on shutdown.
    pub fn flush(&mut self) -> Result<()> {
        self.registry.flush().context("Cannot save players")?;
        self.data.flush().context("Cannot save extension data")?;
        Ok(())
    }
}
