use std::path::{Path, PathBuf};

use crate::core::error::{BootstrapError, BootstrapResult};

const APP_DIR_NAME: &str = "vinestrap";
const STATE_FILE: &str = "state.json";
const SETTINGS_FILE: &str = "settings.json";

/// Every on-disk location the bootstrapper touches.
///
/// - `cache/`            advisory files (raw manifests)
/// - `cache/downloads/`  package cache, one file per checksum
/// - `data/versions/`    one install directory per build identifier
/// - `data/state.json`   install state
/// - `config/settings.json`
#[derive(Debug, Clone)]
pub struct Dirs {
    cache: PathBuf,
    downloads: PathBuf,
    versions: PathBuf,
    data: PathBuf,
    config: PathBuf,
}

impl Dirs {
    /// Platform defaults (`~/.cache/vinestrap`, `~/.local/share/vinestrap`, ...).
    pub fn from_user_dirs() -> BootstrapResult<Self> {
        let cache = dirs::cache_dir()
            .ok_or_else(|| BootstrapError::Other("No cache directory for this user".into()))?;
        let data = dirs::data_dir()
            .ok_or_else(|| BootstrapError::Other("No data directory for this user".into()))?;
        let config = dirs::config_dir()
            .ok_or_else(|| BootstrapError::Other("No config directory for this user".into()))?;

        Ok(Self::with_roots(
            cache.join(APP_DIR_NAME),
            data.join(APP_DIR_NAME),
            config.join(APP_DIR_NAME),
        ))
    }

    pub fn with_roots(cache: PathBuf, data: PathBuf, config: PathBuf) -> Self {
        Self {
            downloads: cache.join("downloads"),
            versions: data.join("versions"),
            cache,
            data,
            config,
        }
    }

    /// Everything below a single root; used for portable installs and tests.
    pub fn under(root: &Path) -> Self {
        Self::with_roots(root.join("cache"), root.join("data"), root.join("config"))
    }

    pub fn cache(&self) -> &Path {
        &self.cache
    }

    pub fn downloads(&self) -> &Path {
        &self.downloads
    }

    pub fn versions(&self) -> &Path {
        &self.versions
    }

    pub fn data(&self) -> &Path {
        &self.data
    }

    pub fn config(&self) -> &Path {
        &self.config
    }

    pub fn version_dir(&self, guid: &str) -> PathBuf {
        self.versions.join(guid)
    }

    pub fn state_file(&self) -> PathBuf {
        self.data.join(STATE_FILE)
    }

    pub fn settings_file(&self) -> PathBuf {
        self.config.join(SETTINGS_FILE)
    }
}

/// Create `path` (and parents) if missing. New directories are private to
/// the owner.
pub fn ensure_dir(path: &Path) -> BootstrapResult<&Path> {
    let mut builder = std::fs::DirBuilder::new();
    builder.recursive(true);

    #[cfg(unix)]
    {
        use std::os::unix::fs::DirBuilderExt;
        builder.mode(0o700);
    }

    builder
        .create(path)
        .map_err(|source| BootstrapError::io(path, source))?;
    Ok(path)
}
