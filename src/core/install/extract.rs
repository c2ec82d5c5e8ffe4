// ─── Package Extraction ───
// Unpacks cached packages into a version directory.

use std::path::{Path, PathBuf};

use tracing::debug;

use crate::core::error::{BootstrapError, BootstrapResult};

/// Unpack `zip_path` below `dest`, overwriting existing files.
///
/// Entry names use either separator. Any entry that would land outside
/// `dest` fails the whole package. Unix permission bits are kept.
pub fn extract_zip_file(package: &str, zip_path: &Path, dest: &Path) -> BootstrapResult<usize> {
    let zip_file = std::fs::File::open(zip_path).map_err(|e| BootstrapError::io(zip_path, e))?;
    let mut archive = zip::ZipArchive::new(zip_file)?;

    std::fs::create_dir_all(dest).map_err(|e| BootstrapError::io(dest, e))?;

    let mut written = 0;
    for index in 0..archive.len() {
        let mut zipped = archive.by_index(index)?;
        let name = zipped.name().replace('\\', "/");

        let rel_path = entry_path(&name).ok_or_else(|| BootstrapError::PathTraversal {
            package: package.to_string(),
            entry: zipped.name().to_string(),
        })?;

        if rel_path.as_os_str().is_empty() {
            continue;
        }

        let out_path = dest.join(rel_path);
        if name.ends_with('/') {
            std::fs::create_dir_all(&out_path).map_err(|e| BootstrapError::io(&out_path, e))?;
            continue;
        }

        if let Some(parent) = out_path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| BootstrapError::io(parent, e))?;
        }

        remove_existing(&out_path)?;
        let mut out =
            std::fs::File::create(&out_path).map_err(|e| BootstrapError::io(&out_path, e))?;
        std::io::copy(&mut zipped, &mut out).map_err(|e| BootstrapError::io(&out_path, e))?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            if let Some(mode) = zipped.unix_mode() {
                // Owner keeps write access so later runs can replace the file.
                let perms = std::fs::Permissions::from_mode((mode & 0o777) | 0o200);
                std::fs::set_permissions(&out_path, perms)
                    .map_err(|e| BootstrapError::io(&out_path, e))?;
            }
        }

        written += 1;
    }

    debug!("Extracted {} files of {} into {:?}", written, package, dest);
    Ok(written)
}

/// Copy a plain-file package to `dest/<package>`.
pub fn copy_plain_file(package: &str, cached: &Path, dest: &Path) -> BootstrapResult<()> {
    std::fs::create_dir_all(dest).map_err(|e| BootstrapError::io(dest, e))?;
    let target = dest.join(package);
    remove_existing(&target)?;
    std::fs::copy(cached, &target).map_err(|e| BootstrapError::io(&target, e))?;
    debug!("Copied {} into {:?}", package, dest);
    Ok(())
}

/// Unlink a previous copy of `path`, which may be read-only.
fn remove_existing(path: &Path) -> BootstrapResult<()> {
    match std::fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(BootstrapError::io(path, e)),
    }
}

/// Relative path for an archive entry, or `None` when it is absolute or
/// climbs out of its root.
fn entry_path(name: &str) -> Option<PathBuf> {
    if name.starts_with('/') {
        return None;
    }

    let mut rel_path = PathBuf::new();
    for part in name.split('/') {
        match part {
            "" | "." => continue,
            ".." => return None,
            // Drive letters and alternate data streams.
            part if part.contains(':') => return None,
            part => rel_path.push(part),
        }
    }
    Some(rel_path)
}
