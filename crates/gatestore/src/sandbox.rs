use std::path::{Component, Path, PathBuf};

use log::warn;

use crate::error::StoreError;

pub const DOCUMENT_EXTENSION: &str = "yaml";

/// Maps document names to files and refuses anything that would land outside
/// the root directory. All checks happen before a file is opened.
#[derive(Debug, Clone)]
pub struct Sandbox {
    root: PathBuf,
}

impl Sandbox {
    /// Creates the root directory if needed and pins its canonical form.
    pub fn new(root: impl AsRef<Path>) -> Result<Self, StoreError> {
        let root = root.as_ref();
        std::fs::create_dir_all(root).map_err(StoreError::io(root))?;
        let root = root.canonicalize().map_err(StoreError::io(root))?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// `<root>/<name>.yaml`. Names may contain `/` to address subdirectories.
    pub fn document_path(&self, name: &str) -> Result<PathBuf, StoreError> {
        self.locate(name).map(|(_, path)| path)
    }

    /// Canonical name and file of a document. Aliases such as `./kits` and
    /// `plugins/../kits` share the canonical name `kits`.
    pub fn locate(&self, name: &str) -> Result<(String, PathBuf), StoreError> {
        if name.trim().is_empty() || name.contains('\0') || name.ends_with('/') {
            return Err(StoreError::InvalidName(name.to_owned()));
        }
        let outside = || StoreError::OutsideRoot {
            name: name.to_owned(),
            root: self.root.clone(),
        };

        let file_name = format!("{name}.{DOCUMENT_EXTENSION}");
        let mut relative = PathBuf::new();
        for component in Path::new(&file_name).components() {
            match component {
                Component::Normal(part) => relative.push(part),
                Component::CurDir => {}
                Component::ParentDir => {
                    if !relative.pop() {
                        return Err(outside());
                    }
                }
                Component::RootDir | Component::Prefix(_) => return Err(outside()),
            }
        }
        if relative.as_os_str().is_empty() {
            return Err(StoreError::InvalidName(name.to_owned()));
        }
        let canonical = relative_name(&relative);
        let path = self.root.join(relative);

        // Lexically fine, now make sure no symlink on the way points elsewhere.
        let existing = path.ancestors().find(|p| p.exists()).unwrap_or(self.root.as_path());
        let resolved = existing.canonicalize().map_err(StoreError::io(existing))?;
        if !resolved.starts_with(&self.root) {
            warn!(
                "Document {name:?} escapes store root via {}",
                resolved.display()
            );
            return Err(outside());
        }
        Ok((canonical, path))
    }

    /// Inverse of [`Sandbox::document_path`] for files found under the root.
    pub fn document_name(&self, path: &Path) -> Option<String> {
        if path.extension()? != DOCUMENT_EXTENSION {
            return None;
        }
        Some(relative_name(path.strip_prefix(&self.root).ok()?))
    }
}

/// `plugins/kits.yaml` -> `plugins/kits`, `/` separated on every platform.
fn relative_name(relative: &Path) -> String {
    relative
        .with_extension("")
        .components()
        .map(|c| c.as_os_str().to_string_lossy().into_owned())
        .collect::<Vec<_>>()
        .join("/")
}
