//! Persistence of API definitions.
//!
//! One JSON file per API under a per-server directory:
//! ```text
//! conf/
//!   server.toml
//!   api_8080/
//!     user.json
//!     order.json
//! ```

use std::fmt::Debug;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use crate::api::definition::Api;
use crate::error::StoreError;

/// Storage backend for API definitions.
pub trait ApiStore: Send + Sync + Debug {
    /// Read the definition stored under `name`.
    fn read_definition(&self, name: &str) -> Result<Api, StoreError>;

    /// Create or overwrite the definition for `api.name`.
    fn write_definition(&self, api: &Api) -> Result<(), StoreError>;

    /// Remove the definition. Removing a missing definition succeeds.
    fn remove_definition(&self, name: &str) -> Result<(), StoreError>;

    /// Names of every stored definition.
    fn list_names(&self) -> Result<Vec<String>, StoreError>;
}

/// Directory of `<name>.json` files.
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    dir: PathBuf,
}

impl JsonFileStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn path_for(&self, name: &str) -> PathBuf {
        self.dir.join(format!("{}.json", name))
    }
}

/// API name of a definition file, or `None` for anything that is not `*.json`.
pub fn definition_name(path: &Path) -> Option<String> {
    if path.extension().and_then(|e| e.to_str()) != Some("json") {
        return None;
    }
    let stem = path.file_stem()?.to_str()?;
    if stem.is_empty() || stem.starts_with('.') {
        return None;
    }
    Some(stem.to_string())
}

impl ApiStore for JsonFileStore {
    fn read_definition(&self, name: &str) -> Result<Api, StoreError> {
        let path = self.path_for(name);
        let content = fs::read_to_string(&path).map_err(|source| match source.kind() {
            io::ErrorKind::NotFound => StoreError::NotFound(name.to_string()),
            _ => StoreError::Io {
                name: name.to_string(),
                source,
            },
        })?;
        let mut api: Api = serde_json::from_str(&content).map_err(|source| StoreError::Parse {
            name: name.to_string(),
            source,
        })?;
        // The file name is the key.
        api.name = name.to_string();
        Ok(api)
    }

    fn write_definition(&self, api: &Api) -> Result<(), StoreError> {
        let io_err = |source| StoreError::Io {
            name: api.name.clone(),
            source,
        };
        fs::create_dir_all(&self.dir).map_err(io_err)?;

        let content = serde_json::to_string_pretty(api).map_err(|source| StoreError::Parse {
            name: api.name.clone(),
            source,
        })?;

        // Write-then-rename so readers never see a partial file.
        let tmp = self.dir.join(format!(".{}.json.tmp", api.name));
        fs::write(&tmp, content).map_err(io_err)?;
        fs::rename(&tmp, self.path_for(&api.name)).map_err(io_err)?;

        tracing::debug!(api = %api.name, dir = ?self.dir, "Definition written");
        Ok(())
    }

    fn remove_definition(&self, name: &str) -> Result<(), StoreError> {
        match fs::remove_file(self.path_for(name)) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(source) => Err(StoreError::Io {
                name: name.to_string(),
                source,
            }),
        }
    }

    fn list_names(&self) -> Result<Vec<String>, StoreError> {
        let entries = match fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(source) => {
                return Err(StoreError::Io {
                    name: self.dir.display().to_string(),
                    source,
                })
            }
        };

        let mut names: Vec<String> = entries
            .filter_map(|entry| entry.ok())
            .filter(|entry| entry.path().is_file())
            .filter_map(|entry| definition_name(&entry.path()))
            .collect();
        names.sort();
        Ok(names)
    }
}
