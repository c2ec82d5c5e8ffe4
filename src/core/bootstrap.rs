// ─── Bootstrapper ───
// Brings a binary up to date and says how to start it.

use std::path::PathBuf;
use std::sync::Arc;

use serde::Serialize;
use tracing::{info, instrument, warn};

use crate::core::binary::BinaryType;
use crate::core::config::Settings;
use crate::core::downloader::Downloader;
use crate::core::error::BootstrapResult;
use crate::core::gc::{clean_packages, clean_versions, SweepReport};
use crate::core::http::{build_http_client, HttpTransport, Transport};
use crate::core::install::{extract_manifest, is_installed, write_app_settings};
use crate::core::paths::{ensure_dir, Dirs};
use crate::core::state::InstallStateStore;
use crate::core::version::{
    fetch_manifest, is_launch_uri, latest_version, parse_launch_uri, select_channel, Manifest,
    Version,
};

/// Everything needed to start an installed binary. Running it is up to the
/// caller.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct LaunchPlan {
    pub binary: BinaryType,
    pub version: Version,
    pub executable: PathBuf,
    pub args: Vec<String>,
}

/// Per-process context: directories, settings, the remote side and the
/// install state.
pub struct Bootstrapper {
    dirs: Dirs,
    settings: Settings,
    transport: Arc<dyn Transport>,
    downloader: Downloader,
    store: InstallStateStore,
}

impl Bootstrapper {
    pub fn new(
        dirs: Dirs,
        settings: Settings,
        transport: Arc<dyn Transport>,
    ) -> BootstrapResult<Self> {
        settings.validate()?;
        let store = InstallStateStore::load(dirs.state_file())?;
        let downloader = Downloader::new(transport.clone())
            .with_concurrency(settings.download_concurrency)
            .with_verification(settings.verify_packages);

        Ok(Self {
            dirs,
            settings,
            transport,
            downloader,
            store,
        })
    }

    /// Settings from `dirs`, talking to the real deployment servers.
    pub fn from_dirs(dirs: Dirs) -> BootstrapResult<Self> {
        let settings = Settings::load(&dirs.settings_file())?;
        let transport = Arc::new(HttpTransport::new(build_http_client()?));
        Self::new(dirs, settings, transport)
    }

    pub fn dirs(&self) -> &Dirs {
        &self.dirs
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn store(&self) -> &InstallStateStore {
        &self.store
    }

    pub fn dxvk_installed(&self) -> bool {
        self.store.dxvk_installed()
    }

    pub fn set_dxvk_installed(&mut self, installed: bool) -> BootstrapResult<()> {
        self.store.save_dxvk_installed(installed)
    }

    // ── Resolution ──────────────────────────────────────

    /// The build `binary` should run. The configured channel wins over
    /// `requested`; a forced version skips the lookup.
    pub async fn resolve_version(
        &self,
        binary: BinaryType,
        requested: Option<&str>,
    ) -> BootstrapResult<Version> {
        let configured = self.settings.binary(binary);
        let decision = select_channel(&configured.channel, requested);

        if let Some(guid) = configured.forced_version.as_deref().map(str::trim) {
            if !guid.is_empty() {
                info!("Using forced {} version {}", binary, guid);
                return Ok(Version::new(binary, &decision.channel, guid));
            }
        }

        latest_version(
            self.transport.as_ref(),
            &self.settings.client_settings_url,
            binary,
            &decision.channel,
        )
        .await
    }

    // ── Preparation ─────────────────────────────────────

    /// Resolve, install if needed, and return how to start `binary` with
    /// `args`. A Player launch URI in `args[0]` is decoded into flags.
    #[instrument(skip(self, args))]
    pub async fn prepare(
        &mut self,
        binary: BinaryType,
        args: Vec<String>,
    ) -> BootstrapResult<LaunchPlan> {
        let (args, requested) = launch_args(binary, args);
        let version = self.resolve_version(binary, requested.as_deref()).await?;
        let version_dir = self.dirs.version_dir(&version.guid);

        let recorded = self
            .store
            .load_manifest(binary)
            .is_some_and(|m| m.version.guid == version.guid);

        if recorded && is_installed(&version_dir) {
            info!("{} is up to date ({})", binary, version.guid);
        } else {
            self.install(&version).await?;
        }

        Ok(LaunchPlan {
            binary,
            executable: version_dir.join(binary.executable()),
            version,
            args,
        })
    }

    /// Download, lay out, mark and record `version`, then sweep whatever it
    /// replaced.
    #[instrument(skip(self), fields(binary = %version.binary, guid = %version.guid))]
    pub async fn install(&mut self, version: &Version) -> BootstrapResult<Manifest> {
        let binary = version.binary;
        let mirror = self.settings.deploy_mirror.clone();
        info!("Installing {} {}", binary, version.guid);

        ensure_dir(self.dirs.downloads())?;
        ensure_dir(self.dirs.versions())?;

        let manifest =
            fetch_manifest(self.transport.as_ref(), &mirror, version, self.dirs.cache()).await?;

        let summary = self
            .downloader
            .download(&manifest, &mirror, self.dirs.downloads())
            .await?;
        info!(
            "Packages ready: {} fetched ({} bytes), {} from cache",
            summary.fetched, summary.bytes, summary.cached
        );

        let version_dir = self.dirs.version_dir(&version.guid);
        ensure_dir(&version_dir)?;
        extract_manifest(
            &manifest,
            self.dirs.downloads(),
            &version_dir,
            &binary.directories(),
        )
        .await
        .into_result()?;

        write_app_settings(&version_dir).await?;
        self.store.save_manifest(binary, &manifest)?;

        if let Err(e) = self.collect_garbage().await {
            warn!("Cleanup after installing {} failed: {}", version.guid, e);
        }

        info!("Installed {} {}", binary, version.guid);
        Ok(manifest)
    }

    // ── Cleanup ─────────────────────────────────────────

    /// Remove packages and version directories no remembered manifest needs.
    pub async fn collect_garbage(&self) -> BootstrapResult<(SweepReport, SweepReport)> {
        let state = self.store.state();
        let packages = clean_packages(state, self.dirs.downloads()).await?;
        let versions = clean_versions(state, self.dirs.versions()).await?;
        Ok((packages, versions))
    }
}

/// Split a Player launch URI into flags and the channel it asks for. Other
/// arguments pass through untouched.
fn launch_args(binary: BinaryType, args: Vec<String>) -> (Vec<String>, Option<String>) {
    let is_uri = args.first().is_some_and(|first| is_launch_uri(first));
    if binary != BinaryType::Player || !is_uri {
        return (args, None);
    }

    let uri = parse_launch_uri(&args[0]);
    let mut flags = uri.args;
    flags.extend(args.into_iter().skip(1));
    (flags, uri.channel)
}
