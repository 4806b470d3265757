//! Persisted key/value documents confined to a root directory.

mod error;
pub mod sandbox;
mod store;

pub use error::StoreError;
pub use gatehouse_model::{split_path, FromValue, Mapping, Value};
pub use store::{DocumentStore, Result};
