// ─── Garbage Collection ───
// Reclaims cached packages and version directories the install state no
// longer references. Callers save state first, then sweep.

use std::path::Path;
use std::time::{Duration, SystemTime};

use tracing::{debug, info, instrument, warn};

use crate::core::downloader::PARTIAL_SUFFIX;
use crate::core::error::{BootstrapError, BootstrapResult};
use crate::core::state::InstallState;

/// Partial downloads younger than this may still be written by another
/// process and are left alone.
const PARTIAL_MAX_AGE: Duration = Duration::from_secs(60 * 60);

/// Outcome of one sweep. Failures are logged and skipped.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepReport {
    pub removed: usize,
    pub kept: usize,
    pub failed: usize,
}

/// Delete every file in `downloads` that no remembered manifest refers to,
/// plus stale partial downloads.
#[instrument(skip(state))]
pub async fn clean_packages(state: &InstallState, downloads: &Path) -> BootstrapResult<SweepReport> {
    let referenced = state.referenced_packages();
    let mut report = SweepReport::default();

    let Some(mut entries) = read_dir(downloads).await? else {
        return Ok(report);
    };

    while let Some(entry) = entries
        .next_entry()
        .await
        .map_err(|e| BootstrapError::io(downloads, e))?
    {
        let path = entry.path();
        let name = entry.file_name().to_string_lossy().into_owned();

        let metadata = match entry.metadata().await {
            Ok(metadata) => metadata,
            Err(e) => {
                warn!("Cannot stat {:?}: {}", path, e);
                report.failed += 1;
                continue;
            }
        };

        if !metadata.is_file() || referenced.contains(name.as_str()) {
            report.kept += 1;
            continue;
        }

        let partial = path.extension().is_some_and(|ext| ext == PARTIAL_SUFFIX);
        if partial && !is_stale(&metadata, PARTIAL_MAX_AGE) {
            debug!("Keeping in-flight download {:?}", path);
            report.kept += 1;
            continue;
        }

        match tokio::fs::remove_file(&path).await {
            Ok(()) => {
                debug!("Removed unreferenced package {:?}", path);
                report.removed += 1;
            }
            Err(e) => {
                warn!("Failed to remove package {:?}: {}", path, e);
                report.failed += 1;
            }
        }
    }

    info!(
        "Package sweep: removed={} kept={} failed={}",
        report.removed, report.kept, report.failed
    );
    Ok(report)
}

/// Delete every directory in `versions` that is not the remembered build of
/// some binary.
#[instrument(skip(state))]
pub async fn clean_versions(state: &InstallState, versions: &Path) -> BootstrapResult<SweepReport> {
    let referenced = state.referenced_versions();
    let mut report = SweepReport::default();

    let Some(mut entries) = read_dir(versions).await? else {
        return Ok(report);
    };

    while let Some(entry) = entries
        .next_entry()
        .await
        .map_err(|e| BootstrapError::io(versions, e))?
    {
        let path = entry.path();
        let name = entry.file_name().to_string_lossy().into_owned();

        let is_dir = entry.file_type().await.map(|t| t.is_dir()).unwrap_or(false);
        if !is_dir || referenced.contains(name.as_str()) {
            report.kept += 1;
            continue;
        }

        match tokio::fs::remove_dir_all(&path).await {
            Ok(()) => {
                info!("Removed old version {}", name);
                report.removed += 1;
            }
            Err(e) => {
                warn!("Failed to remove version {:?}: {}", path, e);
                report.failed += 1;
            }
        }
    }

    Ok(report)
}

async fn read_dir(dir: &Path) -> BootstrapResult<Option<tokio::fs::ReadDir>> {
    match tokio::fs::read_dir(dir).await {
        Ok(entries) => Ok(Some(entries)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(BootstrapError::io(dir, e)),
    }
}

/// Modified more than `max_age` away from now. A skewed clock can put the
/// time in the future; that distance counts the same way.
pub(crate) fn is_stale(metadata: &std::fs::Metadata, max_age: Duration) -> bool {
    let Ok(modified) = metadata.modified() else {
        return false;
    };
    match SystemTime::now().duration_since(modified) {
        Ok(age) => age > max_age,
        Err(ahead) => ahead.duration() > max_age,
    }
}
