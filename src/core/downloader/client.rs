use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use futures_util::stream::{self, StreamExt, TryStreamExt};
use md5::{Digest, Md5};
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use crate::core::error::{BootstrapError, BootstrapResult};
use crate::core::http::Transport;
use crate::core::version::{Manifest, Package, Version};

/// Suffix of in-flight downloads inside the package cache.
pub const PARTIAL_SUFFIX: &str = "part";

/// What a `Downloader::download` pass did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DownloadSummary {
    pub fetched: usize,
    pub cached: usize,
    pub bytes: u64,
}

/// Concurrent package fetcher backed by a content-addressed cache.
pub struct Downloader {
    transport: Arc<dyn Transport>,
    /// Maximum number of parallel downloads.
    concurrency: usize,
    /// md5-check freshly downloaded packages.
    verify: bool,
}

impl Downloader {
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self {
            transport,
            concurrency: 8,
            verify: false,
        }
    }

    pub fn with_concurrency(mut self, n: usize) -> Self {
        self.concurrency = n.max(1);
        self
    }

    pub fn with_verification(mut self, verify: bool) -> Self {
        self.verify = verify;
        self
    }

    /// Where `package` lives inside the cache.
    pub fn cache_path(cache_dir: &Path, package: &Package) -> PathBuf {
        cache_dir.join(package.cache_name())
    }

    // ── Whole manifest ──────────────────────────────────

    /// Bring every package of `manifest` into `cache_dir`.
    ///
    /// Packages already cached are trusted as-is and never requested. The
    /// first failure is returned; packages that finished stay cached.
    #[instrument(skip_all, fields(guid = %manifest.version.guid))]
    pub async fn download(
        &self,
        manifest: &Manifest,
        mirror: &str,
        cache_dir: &Path,
    ) -> BootstrapResult<DownloadSummary> {
        tokio::fs::create_dir_all(cache_dir)
            .await
            .map_err(|e| BootstrapError::io(cache_dir, e))?;

        let missing: Vec<&Package> = manifest
            .packages
            .iter()
            .filter(|p| !Self::cache_path(cache_dir, p).exists())
            .collect();

        let mut summary = DownloadSummary {
            cached: manifest.packages.len() - missing.len(),
            ..Default::default()
        };

        if missing.is_empty() {
            info!("All {} packages already cached", summary.cached);
            return Ok(summary);
        }

        let needed = missing
            .iter()
            .try_fold(0u64, |total, p| total.checked_add(p.size))
            .ok_or_else(|| {
                BootstrapError::Protocol(format!(
                    "package sizes for {} overflow",
                    manifest.version.guid
                ))
            })?;
        ensure_free_space(cache_dir, needed)?;

        info!(
            "Downloading {} packages ({} bytes, {} cached), concurrency={}",
            missing.len(),
            needed,
            summary.cached,
            self.concurrency
        );

        let version = &manifest.version;
        let sizes: Vec<u64> = stream::iter(missing)
            .map(|package| self.fetch_package(mirror, version, package, cache_dir))
            .buffer_unordered(self.concurrency)
            .try_collect()
            .await?;

        summary.fetched = sizes.len();
        summary.bytes = sizes.iter().fold(0u64, |total, n| total.saturating_add(*n));
        Ok(summary)
    }

    // ── Single package ──────────────────────────────────

    /// Stream one package into the cache.
    ///
    /// The body goes to a uniquely named `.part` file next to its final
    /// path and is renamed into place only once complete.
    pub async fn fetch_package(
        &self,
        mirror: &str,
        version: &Version,
        package: &Package,
        cache_dir: &Path,
    ) -> BootstrapResult<u64> {
        let url = version.file_url(mirror, &package.name);
        let dest = Self::cache_path(cache_dir, package);
        let partial = cache_dir.join(format!(
            "{}.{}.{}",
            package.cache_name(),
            Uuid::new_v4(),
            PARTIAL_SUFFIX
        ));

        let written = match self.transport.download_to(&url, &partial).await {
            Ok(written) => written,
            Err(e) => {
                discard(&partial).await;
                return Err(e);
            }
        };

        if self.verify && !package.checksum.is_empty() {
            if let Err(e) = verify_md5(&partial, package).await {
                discard(&partial).await;
                return Err(e);
            }
        }

        if let Err(source) = tokio::fs::rename(&partial, &dest).await {
            discard(&partial).await;
            return Err(BootstrapError::io(&dest, source));
        }

        debug!("Downloaded: {} -> {:?}", url, dest);
        Ok(written)
    }
}

async fn discard(partial: &Path) {
    if let Err(e) = tokio::fs::remove_file(partial).await {
        if e.kind() != std::io::ErrorKind::NotFound {
            warn!("Failed to remove partial download {:?}: {}", partial, e);
        }
    }
}

/// Compare the md5 of `path` with the checksum listed for `package`.
pub async fn verify_md5(path: &Path, package: &Package) -> BootstrapResult<()> {
    let actual = md5_file(path.to_path_buf()).await?;
    if !actual.eq_ignore_ascii_case(&package.checksum) {
        return Err(BootstrapError::ChecksumMismatch {
            package: package.name.clone(),
            expected: package.checksum.clone(),
            actual,
        });
    }
    Ok(())
}

async fn md5_file(path: PathBuf) -> BootstrapResult<String> {
    tokio::task::spawn_blocking(move || -> BootstrapResult<String> {
        let mut file = std::fs::File::open(&path).map_err(|e| BootstrapError::io(&path, e))?;
        let mut hasher = Md5::new();
        let mut buf = vec![0_u8; 64 * 1024];
        loop {
            let n = file.read(&mut buf).map_err(|e| BootstrapError::io(&path, e))?;
            if n == 0 {
                break;
            }
            hasher.update(&buf[..n]);
        }
        Ok(hex::encode(hasher.finalize()))
    })
    .await
    .map_err(|e| BootstrapError::Other(format!("Task join error: {e}")))?
}

/// Fail with `DiskFull` when the volume holding `path` has less than
/// `needed` bytes available. Unknown volumes pass.
fn ensure_free_space(path: &Path, needed: u64) -> BootstrapResult<()> {
    let disks = sysinfo::Disks::new_with_refreshed_list();
    let canonical = std::fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf());

    let mut best_len = 0usize;
    let mut available = None;
    for disk in disks.list() {
        let mount = disk.mount_point();
        if canonical.starts_with(mount) {
            let len = mount.as_os_str().len();
            if len >= best_len {
                best_len = len;
                available = Some(disk.available_space());
            }
        }
    }

    match available {
        Some(bytes) if bytes < needed => {
            warn!(
                "Insufficient space at {:?}: available={} required={}",
                path, bytes, needed
            );
            Err(BootstrapError::DiskFull {
                path: path.to_path_buf(),
            })
        }
        _ => Ok(()),
    }
}
