// ─── Version Installation ───
// Lays cached packages out into a version directory and marks it complete.

pub mod extract;

use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::{info, instrument, warn};

use crate::core::binary::DirectoryMap;
use crate::core::downloader::Downloader;
use crate::core::error::{BootstrapError, BootstrapResult};
use crate::core::version::Manifest;

/// Written last; its presence means the version directory is complete.
pub const INSTALLED_MARKER: &str = "AppSettings.xml";

#[derive(Serialize)]
#[serde(rename = "Settings")]
struct AppSettings {
    #[serde(rename = "ContentFolder")]
    content_folder: &'static str,
    #[serde(rename = "BaseUrl")]
    base_url: &'static str,
}

/// Result of extracting a single package.
#[derive(Debug)]
pub struct PackageOutcome {
    pub package: String,
    pub result: BootstrapResult<()>,
}

/// Per-package results of `extract_manifest`, in manifest order.
#[derive(Debug, Default)]
pub struct ExtractReport {
    pub outcomes: Vec<PackageOutcome>,
}

impl ExtractReport {
    pub fn is_complete(&self) -> bool {
        self.outcomes.iter().all(|o| o.result.is_ok())
    }

    pub fn failures(&self) -> impl Iterator<Item = &PackageOutcome> {
        self.outcomes.iter().filter(|o| o.result.is_err())
    }

    /// The first failure, if any.
    pub fn into_result(self) -> BootstrapResult<()> {
        self.outcomes
            .into_iter()
            .map(|o| o.result)
            .find(Result::is_err)
            .unwrap_or(Ok(()))
    }
}

/// Unpack every package of `manifest` from `cache_dir` into `dest`.
///
/// Packages are independent: a failure is recorded and the remaining
/// packages are still extracted. Nothing already written is rolled back.
#[instrument(skip_all, fields(guid = %manifest.version.guid))]
pub async fn extract_manifest(
    manifest: &Manifest,
    cache_dir: &Path,
    dest: &Path,
    directories: &DirectoryMap,
) -> ExtractReport {
    let mut report = ExtractReport::default();

    for package in &manifest.packages {
        let cached = Downloader::cache_path(cache_dir, package);
        let target = directories.destination(dest, &package.name);
        let name = package.name.clone();
        let zip = package.zip;

        let result = tokio::task::spawn_blocking(move || -> BootstrapResult<()> {
            if zip {
                extract::extract_zip_file(&name, &cached, &target).map(|_| ())
            } else {
                extract::copy_plain_file(&name, &cached, &target)
            }
        })
        .await
        .map_err(|e| BootstrapError::Other(format!("Task join error: {e}")))
        .and_then(|r| r);

        if let Err(e) = &result {
            warn!("Failed to extract {}: {}", package.name, e);
        }

        report.outcomes.push(PackageOutcome {
            package: package.name.clone(),
            result,
        });
    }

    info!(
        "Extracted {}/{} packages into {:?}",
        report.outcomes.len() - report.failures().count(),
        report.outcomes.len(),
        dest
    );
    report
}

pub fn marker_path(version_dir: &Path) -> PathBuf {
    version_dir.join(INSTALLED_MARKER)
}

pub fn is_installed(version_dir: &Path) -> bool {
    marker_path(version_dir).is_file()
}

/// Write `AppSettings.xml`, which the binary needs to find its content and
/// which marks the directory as fully installed.
pub async fn write_app_settings(version_dir: &Path) -> BootstrapResult<()> {
    let settings = AppSettings {
        content_folder: "content",
        base_url: "http://www.roblox.com",
    };
    let xml = quick_xml::se::to_string(&settings)
        .map_err(|e| BootstrapError::Other(format!("AppSettings serialization failed: {e}")))?;

    let path = marker_path(version_dir);
    tokio::fs::write(&path, xml)
        .await
        .map_err(|e| BootstrapError::io(&path, e))
}
