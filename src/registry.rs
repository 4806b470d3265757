use std::collections::{BTreeMap, HashMap};

use gatehouse_model::player::PlayerRecord;
use gatehouse_model::{PlayerId, Value};
use gatestore::{DocumentStore, StoreError};
use itertools::Itertools;
use log::{debug, info, warn};
use thiserror::Error;

use crate::backend::PlayerHandle;

/// Document holding every known player, keyed by id.
pub const PLAYERS_DOCUMENT: &str = "players";

#[derive(Error, Debug)]
pub enum RegistryError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("Player {0} is connected")]
    PlayerConnected(PlayerId),

    #[error("Field {0:?} is reserved")]
    ReservedField(String),
}

pub type Result<T, E = RegistryError> = std::result::Result<T, E>;

/// Known players (durable) plus the players connected right now (volatile).
///
/// Every id in the connected index has a record: connecting always goes
/// through [`PlayerRegistry::notify_join`] first. Records are never removed
/// implicitly, only through [`PlayerRegistry::purge`].
pub struct PlayerRegistry<H> {
    store: DocumentStore,
    players: BTreeMap<PlayerId, PlayerRecord>,
    connected: HashMap<PlayerId, H>,
    write_through: bool,
    dirty: bool,
}

impl<H: PlayerHandle> PlayerRegistry<H> {
    /// Reads the players document. A corrupt document is an error, the caller
    /// decides whether to start over.
    pub fn load(mut store: DocumentStore) -> Result<Self> {
        let mut players: BTreeMap<PlayerId, PlayerRecord> = store.load_as(PLAYERS_DOCUMENT)?;
        for (id, record) in players.iter_mut() {
            if &record.id != id {
                warn!("Player record {id} carries id {}, using the key", record.id);
                record.id = id.clone();
            }
        }
        let n = players.len();
        info!("Loaded {n} known players");
        Ok(Self {
            store,
            players,
            connected: Default::default(),
            write_through: true,
            dirty: false,
        })
    }

    /// With write-through disabled changes are kept in memory until [`Self::flush`].
    pub fn with_write_through(mut self, write_through: bool) -> Self {
        self.write_through = write_through;
        self
    }

    /// Records that a player joined: creates the record on first sight and
    /// refreshes the display name otherwise.
    pub fn notify_join(&mut self, handle: &impl PlayerHandle) -> Result<PlayerRecord> {
        let id = handle.id();
        let name = handle.display_name();
        let record = match self.players.get_mut(&id) {
            Some(record) if record.name == name => {
                let record = record.clone();
                // an earlier write may have failed
                if self.dirty {
                    self.persist()?;
                }
                return Ok(record);
            }
            Some(record) => {
                info!("Player {id} renamed: {} -> {name}", record.name);
                record.name = name;
                record.clone()
            }
            None => {
                info!("New player {id} ({name})");
                let record = PlayerRecord::new(id.clone(), name);
                self.players.insert(id, record.clone());
                record
            }
        };
        self.persist()?;
        Ok(record)
    }

    pub fn notify_connect(&mut self, handle: H) -> Result<PlayerRecord> {
        let record = self.notify_join(&handle)?;
        if self.connected.insert(record.id.clone(), handle).is_some() {
            warn!("Player {} connected twice, replacing the old session", record.id);
        }
        debug!("{} connected ({} online)", record.id, self.connected.len());
        Ok(record)
    }

    /// Drops the session. The durable record stays untouched.
    pub fn notify_disconnect(&mut self, handle: &impl PlayerHandle) -> Option<H> {
        self.disconnect_id(&handle.id())
    }

    pub fn disconnect_id(&mut self, id: &PlayerId) -> Option<H> {
        let session = self.connected.remove(id);
        if session.is_some() {
            debug!("{id} disconnected ({} online)", self.connected.len());
        }
        session
    }

    pub fn find_by_id(&self, id: &PlayerId) -> Option<PlayerRecord> {
        self.players.get(id).cloned()
    }

    pub fn find_connected_by_id(&self, id: &PlayerId) -> Option<PlayerRecord> {
        if !self.is_connected(id) {
            return None;
        }
        self.find_by_id(id)
    }

    pub fn find_by_handle(&self, handle: &impl PlayerHandle) -> Option<PlayerRecord> {
        self.find_by_id(&handle.id())
    }

    pub fn is_connected(&self, id: &PlayerId) -> bool {
        self.connected.contains_key(id)
    }

    /// Native handle of a connected player.
    pub fn connected_handle(&self, id: &PlayerId) -> Option<&H> {
        self.connected.get(id)
    }

    /// Case-insensitive substring search over every known name, in id order.
    pub fn find_by_partial_name(&self, text: &str) -> Vec<PlayerRecord> {
        self.search(text, false)
    }

    pub fn find_connected_by_partial_name(&self, text: &str) -> Vec<PlayerRecord> {
        self.search(text, true)
    }

    /// The single player whose name contains `text`. Zero or several matches are `None`.
    pub fn find_unambiguous(&self, text: &str) -> Option<PlayerRecord> {
        single(self.find_by_partial_name(text))
    }

    pub fn find_connected_unambiguous(&self, text: &str) -> Option<PlayerRecord> {
        single(self.find_connected_by_partial_name(text))
    }

    /// Exact id first, then an unambiguous partial name.
    pub fn find(&self, name_or_id: &str) -> Option<PlayerRecord> {
        self.find_by_id(&PlayerId::from(name_or_id.trim()))
            .or_else(|| self.find_unambiguous(name_or_id))
    }

    /// Snapshot of every known player.
    pub fn all(&self) -> Vec<PlayerRecord> {
        self.players.values().cloned().collect()
    }

    /// Snapshot of connected players, ordered by id.
    pub fn connected(&self) -> Vec<PlayerRecord> {
        self.connected
            .keys()
            .sorted()
            .filter_map(|id| self.players.get(id))
            .cloned()
            .collect()
    }

    pub fn connected_count(&self) -> usize {
        self.connected.len()
    }

    /// Stores a backend-specific field on the record. Returns `false` for unknown ids.
    pub fn set_extra(&mut self, id: &PlayerId, key: &str, value: impl Into<Value>) -> Result<bool> {
        if PlayerRecord::is_reserved_field(key) {
            return Err(RegistryError::ReservedField(key.to_owned()));
        }
        let Some(record) = self.players.get_mut(id) else {
            return Ok(false);
        };
        record.extra.insert(key.to_owned(), value.into());
        self.persist()?;
        Ok(true)
    }

    /// Deletes a record for good. Connected players cannot be purged.
    pub fn purge(&mut self, id: &PlayerId) -> Result<Option<PlayerRecord>> {
        if self.is_connected(id) {
            return Err(RegistryError::PlayerConnected(id.clone()));
        }
        let removed = self.players.remove(id);
        if removed.is_some() {
            info!("Purged player {id}");
            self.persist()?;
        }
        Ok(removed)
    }

    /// Writes pending changes when running without write-through.
    pub fn flush(&mut self) -> Result<()> {
        if self.dirty {
            self.store.save_as(PLAYERS_DOCUMENT, &self.players)?;
            self.dirty = false;
        }
        Ok(())
    }

    fn persist(&mut self) -> Result<()> {
        self.dirty = true;
        if self.write_through {
            self.flush()?;
        }
        Ok(())
    }

    fn search(&self, text: &str, connected_only: bool) -> Vec<PlayerRecord> {
        let needle = text.trim().to_lowercase();
        if needle.is_empty() {
            return vec![];
        }
        self.players
            .values()
            .filter(|p| !connected_only || self.is_connected(&p.id))
            .filter(|p| p.name_contains(&needle))
            .cloned()
            .collect()
    }
}

fn single(mut matches: Vec<PlayerRecord>) -> Option<PlayerRecord> {
    if matches.len() == 1 {
        matches.pop()
    } else {
        None
    }
}
