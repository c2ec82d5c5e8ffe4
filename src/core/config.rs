use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::core::binary::BinaryType;
use crate::core::error::{BootstrapError, BootstrapResult};
use crate::core::state::write_atomic;
use crate::core::version::DEFAULT_CHANNEL;

pub const DEFAULT_CLIENT_SETTINGS_URL: &str = "https://clientsettingscdn.roblox.com";
pub const DEFAULT_DEPLOY_MIRROR: &str = "https://setup.rbxcdn.com";
const DEFAULT_DOWNLOAD_CONCURRENCY: usize = 8;

/// Per-binary settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct BinarySettings {
    /// Deployment channel; wins over any channel a launch URI asks for.
    pub channel: String,
    /// Pin a build identifier and skip the deployment lookup.
    pub forced_version: Option<String>,
}

/// User settings, read from `settings.json`. Absent keys take defaults.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct Settings {
    pub player: BinarySettings,
    pub studio: BinarySettings,
    /// md5-check packages after download.
    pub verify_packages: bool,
    pub download_concurrency: usize,
    pub client_settings_url: String,
    pub deploy_mirror: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            player: BinarySettings {
                channel: DEFAULT_CHANNEL.to_string(),
                forced_version: None,
            },
            studio: BinarySettings {
                channel: DEFAULT_CHANNEL.to_string(),
                forced_version: None,
            },
            verify_packages: false,
            download_concurrency: DEFAULT_DOWNLOAD_CONCURRENCY,
            client_settings_url: DEFAULT_CLIENT_SETTINGS_URL.to_string(),
            deploy_mirror: DEFAULT_DEPLOY_MIRROR.to_string(),
        }
    }
}

impl Settings {
    /// Read `path`. A missing file yields the defaults; a file that does not
    /// parse or holds invalid values is a `Config` error.
    pub fn load(path: &Path) -> BootstrapResult<Self> {
        let raw = match std::fs::read_to_string(path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!("No settings at {:?}, using defaults", path);
                return Ok(Self::default());
            }
            Err(e) => return Err(BootstrapError::io(path, e)),
        };

        let settings: Settings = serde_json::from_str(&raw)
            .map_err(|e| BootstrapError::Config(format!("{path:?}: {e}")))?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn save(&self, path: &Path) -> BootstrapResult<()> {
        self.validate()?;
        let json = serde_json::to_vec_pretty(self)?;
        write_atomic(path, &json)
    }

    pub fn validate(&self) -> BootstrapResult<()> {
        if self.download_concurrency == 0 {
            return Err(BootstrapError::Config(
                "download_concurrency must be at least 1".into(),
            ));
        }
        for (name, url) in [
            ("client_settings_url", &self.client_settings_url),
            ("deploy_mirror", &self.deploy_mirror),
        ] {
            if !(url.starts_with("https://") || url.starts_with("http://")) {
                return Err(BootstrapError::Config(format!(
                    "{name} is not an http(s) URL: {url:?}"
                )));
            }
        }
        Ok(())
    }

    pub fn binary(&self, binary: BinaryType) -> &BinarySettings {
        match binary {
            BinaryType::Player => &self.player,
            BinaryType::Studio => &self.studio,
        }
    }

    pub fn binary_mut(&mut self, binary: BinaryType) -> &mut BinarySettings {
        match binary {
            BinaryType::Player => &mut self.player,
            BinaryType::Studio => &mut self.studio,
        }
    }
}
