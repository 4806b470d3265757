use std::path::PathBuf;

use gatehouse_model::CoerceError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Invalid document name: {0:?}")]
    InvalidName(String),

    #[error("Document {name:?} resolves outside of store root {}", .root.display())]
    OutsideRoot { name: String, root: PathBuf },

    #[error("Cannot parse document {name:?} ({})", .path.display())]
    Parse {
        name: String,
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("I/O failure on {}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Cannot convert document {name:?}")]
    Convert {
        name: String,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("Document {name:?}: {source}")]
    Coerce {
        name: String,
        #[source]
        source: CoerceError,
    },
}

impl StoreError {
    pub(crate) fn io(path: impl Into<PathBuf>) -> impl FnOnce(std::io::Error) -> StoreError {
        let path = path.into();
        move |source| StoreError::Io { path, source }
    }
}
