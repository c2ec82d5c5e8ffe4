use std::collections::{BTreeMap, HashSet};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::core::binary::BinaryType;
use crate::core::error::{BootstrapError, BootstrapResult};
use crate::core::gc::is_stale;
use crate::core::version::Manifest;

/// Temporaries of an atomic write older than this were left by a crash.
const TEMP_MAX_AGE: Duration = Duration::from_secs(60 * 60);

/// Last successful installation of a binary.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct InstalledBinary {
    pub manifest: Manifest,
    pub installed_at: DateTime<Utc>,
}

/// Everything persisted between runs, serialized as `state.json`.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct InstallState {
    /// Whether the GPU translation layer is installed in the prefix.
    #[serde(default)]
    pub dxvk: bool,
    #[serde(default)]
    pub binaries: BTreeMap<BinaryType, InstalledBinary>,
}

impl InstallState {
    pub fn manifest(&self, binary: BinaryType) -> Option<&Manifest> {
        self.binaries.get(&binary).map(|b| &b.manifest)
    }

    /// Cache file names of every package of every remembered manifest.
    pub fn referenced_packages(&self) -> HashSet<&str> {
        self.binaries
            .values()
            .flat_map(|b| b.manifest.packages.iter())
            .map(|p| p.cache_name())
            .collect()
    }

    /// Build identifiers of every remembered manifest.
    pub fn referenced_versions(&self) -> HashSet<&str> {
        self.binaries
            .values()
            .map(|b| b.manifest.version.guid.as_str())
            .collect()
    }
}

/// Sole owner of the state file.
///
/// The file is loaded once; every save rewrites it whole through a temporary
/// file and a rename, and only then updates the in-memory copy.
#[derive(Debug)]
pub struct InstallStateStore {
    path: PathBuf,
    state: InstallState,
}

impl InstallStateStore {
    /// Load `path`. A missing file is an empty state; an unreadable one is
    /// `CorruptState` and is left untouched.
    pub fn load(path: impl Into<PathBuf>) -> BootstrapResult<Self> {
        let path = path.into();

        let state = match std::fs::read_to_string(&path) {
            Ok(raw) => serde_json::from_str(&raw).map_err(|source| {
                BootstrapError::CorruptState {
                    path: path.clone(),
                    source,
                }
            })?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!("No install state at {:?}, starting empty", path);
                InstallState::default()
            }
            Err(e) => return Err(BootstrapError::io(&path, e)),
        };

        sweep_stale_temps(&path);
        Ok(Self { path, state })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn state(&self) -> &InstallState {
        &self.state
    }

    /// Manifest last installed for `binary`; `None` if it never was.
    pub fn load_manifest(&self, binary: BinaryType) -> Option<&Manifest> {
        self.state.manifest(binary)
    }

    pub fn save_manifest(&mut self, binary: BinaryType, manifest: &Manifest) -> BootstrapResult<()> {
        let mut next = self.state.clone();
        next.binaries.insert(
            binary,
            InstalledBinary {
                manifest: manifest.clone(),
                installed_at: Utc::now(),
            },
        );
        self.commit(next)?;
        info!("Recorded {} as {}", binary, manifest.version.guid);
        Ok(())
    }

    pub fn dxvk_installed(&self) -> bool {
        self.state.dxvk
    }

    pub fn save_dxvk_installed(&mut self, installed: bool) -> BootstrapResult<()> {
        let mut next = self.state.clone();
        next.dxvk = installed;
        self.commit(next)
    }

    fn commit(&mut self, next: InstallState) -> BootstrapResult<()> {
        let payload = serde_json::to_vec_pretty(&next)?;
        write_atomic(&self.path, &payload)?;
        self.state = next;
        Ok(())
    }
}

fn temp_prefix(path: &Path) -> String {
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    format!(".{file_name}.")
}

/// Remove temporaries that `write_atomic` left next to `path` when a process
/// died before renaming them. Failures are logged and skipped.
fn sweep_stale_temps(path: &Path) {
    let Some(dir) = path.parent() else {
        return;
    };
    let Ok(entries) = std::fs::read_dir(dir) else {
        return;
    };
    let prefix = temp_prefix(path);

    for entry in entries.flatten() {
        let name = entry.file_name().to_string_lossy().into_owned();
        if !name.starts_with(&prefix) || !name.ends_with(".tmp") {
            continue;
        }
        let stale = entry
            .metadata()
            .map(|m| m.is_file() && is_stale(&m, TEMP_MAX_AGE))
            .unwrap_or(false);
        if !stale {
            continue;
        }
        match std::fs::remove_file(entry.path()) {
            Ok(()) => debug!("Removed leftover state temporary {:?}", entry.path()),
            Err(e) => warn!("Failed to remove {:?}: {}", entry.path(), e),
        }
    }
}

/// Replace `path` with `bytes` so readers see either the old or the new
/// content, never a mix.
pub fn write_atomic(path: &Path, bytes: &[u8]) -> BootstrapResult<()> {
    let dir = path
        .parent()
        .ok_or_else(|| BootstrapError::Other(format!("{path:?} has no parent directory")))?;
    std::fs::create_dir_all(dir).map_err(|e| BootstrapError::io(dir, e))?;

    let temp = dir.join(format!("{}{}.tmp", temp_prefix(path), Uuid::new_v4()));

    let written = (|| -> std::io::Result<()> {
        let mut file = std::fs::File::create(&temp)?;
        file.write_all(bytes)?;
        file.sync_all()
    })();

    if let Err(e) = written {
        let _ = std::fs::remove_file(&temp);
        return Err(BootstrapError::io(&temp, e));
    }

    if let Err(e) = std::fs::rename(&temp, path) {
        let _ = std::fs::remove_file(&temp);
        return Err(BootstrapError::io(path, e));
    }

    // Persist the rename itself.
    #[cfg(unix)]
    {
        if let Ok(dir) = std::fs::File::open(dir) {
            let _ = dir.sync_all();
        }
    }

    Ok(())
}
