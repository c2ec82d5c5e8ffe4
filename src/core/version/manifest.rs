// ─── Package Manifest ───
// Fetches and parses the package list (`v0` format) of a deployment.

use std::collections::HashSet;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument};

use crate::core::error::{BootstrapError, BootstrapResult};
use crate::core::http::Transport;

use super::deployment::{Version, PACKAGE_MANIFEST};

const MANIFEST_HEADER: &str = "v0";
/// Indirection files may point at further indirection files, up to this depth.
const MAX_MANIFEST_HOPS: usize = 4;

/// One downloadable file of a deployment.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Package {
    pub name: String,
    /// Lowercase hex md5 of the package bytes.
    pub checksum: String,
    /// Compressed (download) size in bytes.
    pub size: u64,
    /// Size once unpacked.
    #[serde(default)]
    pub installed_size: u64,
    /// ZIP archive rather than a plain file.
    pub zip: bool,
}

impl Package {
    /// Name of the package file inside the download cache.
    pub fn cache_name(&self) -> &str {
        if self.checksum.is_empty() {
            &self.name
        } else {
            &self.checksum
        }
    }
}

/// A version plus the packages composing it. Names are unique.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Manifest {
    pub version: Version,
    pub packages: Vec<Package>,
}

enum ManifestBody<'a> {
    Packages(Vec<&'a str>),
    Redirect(&'a str),
}

impl Manifest {
    /// Parse a `v0` package list.
    ///
    /// ```text
    /// v0
    /// RobloxApp.zip
    /// 1a2b3c...        md5
    /// 41234567         compressed size
    /// 98765432         installed size
    /// ...
    /// ```
    pub fn parse(version: Version, text: &str) -> BootstrapResult<Self> {
        match classify(text)? {
            ManifestBody::Packages(lines) => Self::from_lines(version, &lines),
            ManifestBody::Redirect(location) => Err(BootstrapError::Protocol(format!(
                "expected a package list, got a reference to {location}"
            ))),
        }
    }

    fn from_lines(version: Version, lines: &[&str]) -> BootstrapResult<Self> {
        if lines.len() % 4 != 0 {
            return Err(BootstrapError::Protocol(format!(
                "package list for {} ends with an incomplete entry",
                version.guid
            )));
        }

        let mut seen = HashSet::new();
        let mut packages = Vec::with_capacity(lines.len() / 4);
        let mut download_total = 0u64;
        let mut installed_total = 0u64;

        for entry in lines.chunks(4) {
            let name = entry[0];
            let checksum = entry[1].to_ascii_lowercase();

            for field in [name, checksum.as_str()] {
                if !is_plain_file_name(field) {
                    return Err(BootstrapError::Protocol(format!(
                        "package list for {} has an unusable file name {field:?}",
                        version.guid
                    )));
                }
            }

            if !seen.insert(name) {
                return Err(BootstrapError::Protocol(format!(
                    "package {name} listed twice for {}",
                    version.guid
                )));
            }

            let size = parse_size(name, entry[2])?;
            let installed_size = parse_size(name, entry[3])?;

            let totals = download_total
                .checked_add(size)
                .zip(installed_total.checked_add(installed_size));
            let Some((download, installed)) = totals else {
                return Err(BootstrapError::Protocol(format!(
                    "package sizes for {} overflow at {name}",
                    version.guid
                )));
            };
            download_total = download;
            installed_total = installed;

            packages.push(Package {
                name: name.to_string(),
                checksum,
                size,
                installed_size,
                zip: name.to_ascii_lowercase().ends_with(".zip"),
            });
        }

        Ok(Self { version, packages })
    }

    pub fn package(&self, name: &str) -> Option<&Package> {
        self.packages.iter().find(|p| p.name == name)
    }

    /// Sum of the compressed sizes of all packages, saturating at `u64::MAX`.
    pub fn download_size(&self) -> u64 {
        self.packages
            .iter()
            .fold(0u64, |total, p| total.saturating_add(p.size))
    }
}

fn classify(text: &str) -> BootstrapResult<ManifestBody<'_>> {
    let lines: Vec<&str> = text
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .collect();

    match lines.as_slice() {
        [header, rest @ ..] if *header == MANIFEST_HEADER => {
            Ok(ManifestBody::Packages(rest.to_vec()))
        }
        [location] => Ok(ManifestBody::Redirect(*location)),
        [] => Err(BootstrapError::Protocol("empty manifest".into())),
        [header, ..] => Err(BootstrapError::Protocol(format!(
            "unknown manifest header {header:?}"
        ))),
    }
}

fn parse_size(name: &str, raw: &str) -> BootstrapResult<u64> {
    raw.parse().map_err(|_| {
        BootstrapError::Protocol(format!("package {name} has an invalid size {raw:?}"))
    })
}

fn is_plain_file_name(name: &str) -> bool {
    !name.is_empty() && name != "." && name != ".." && !name.contains(['/', '\\'])
}

/// Retrieve the package list of `version`, following indirection files.
///
/// The raw list is copied to `cache_dir` for diagnostics; failing to do so is
/// not an error.
#[instrument(skip(transport, mirror, version, cache_dir), fields(guid = %version.guid))]
pub async fn fetch_manifest(
    transport: &dyn Transport,
    mirror: &str,
    version: &Version,
    cache_dir: &Path,
) -> BootstrapResult<Manifest> {
    let mut location = version.manifest.clone();

    for _ in 0..=MAX_MANIFEST_HOPS {
        let url = version.file_url(mirror, &location);
        let text = transport.get_text(&url).await?;

        match classify(&text)? {
            ManifestBody::Redirect(next) => {
                debug!("Manifest {} points at {}", location, next);
                location = next.to_string();
            }
            ManifestBody::Packages(lines) => {
                let manifest = Manifest::from_lines(version.clone(), &lines)?;
                save_raw(cache_dir, version, &text).await;
                info!(
                    "Loaded {} packages for {} ({} bytes to fetch at most)",
                    manifest.packages.len(),
                    version.guid,
                    manifest.download_size()
                );
                return Ok(manifest);
            }
        }
    }

    Err(BootstrapError::Protocol(format!(
        "manifest for {} exceeds {} levels of indirection",
        version.guid, MAX_MANIFEST_HOPS
    )))
}

async fn save_raw(cache_dir: &Path, version: &Version, text: &str) {
    let path = cache_dir.join(format!("{}-{}", version.guid, PACKAGE_MANIFEST));
    if let Err(e) = tokio::fs::create_dir_all(cache_dir).await {
        debug!("Not keeping raw manifest, {:?}: {}", cache_dir, e);
        return;
    }
    if let Err(e) = tokio::fs::write(&path, text).await {
        debug!("Not keeping raw manifest {:?}: {}", path, e);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::binary::BinaryType;
    use crate::core::testing::FakeTransport;
    use tempfile::TempDir;

    const MIRROR: &str = "https://setup.example.com";

    fn version() -> Version {
        Version::new(BinaryType::Player, "", "version-abc")
    }

    const LIST: &str = "v0\r\nRobloxApp.zip\r\nD41D8CD98F00B204E9800998ECF8427E\r\n120\r\n300\r\n\
                        RobloxPlayerLauncher.exe\r\n0cc175b9c0f1b6a831c399e269772661\r\n10\r\n10\r\n";

    #[test]
    fn parses_package_list() {
        let manifest = Manifest::parse(version(), LIST).unwrap();
        assert_eq!(manifest.packages.len(), 2);

        let app = manifest.package("RobloxApp.zip").unwrap();
        assert!(app.zip);
        assert_eq!(app.checksum, "d41d8cd98f00b204e9800998ecf8427e");
        assert_eq!(app.cache_name(), "d41d8cd98f00b204e9800998ecf8427e");
        assert_eq!(app.size, 120);
        assert_eq!(app.installed_size, 300);

        let launcher = manifest.package("RobloxPlayerLauncher.exe").unwrap();
        assert!(!launcher.zip);
        assert_eq!(manifest.download_size(), 130);
    }

    #[test]
    fn rejects_malformed_lists() {
        let cases = [
            "v1\na\nb\n1\n1\n",
            "v0\nRobloxApp.zip\nabc\n12\n",
            "v0\nRobloxApp.zip\nabc\ntwelve\n1\n",
            "v0\nRobloxApp.zip\nabc\n1\n1\nRobloxApp.zip\ndef\n1\n1\n",
            "v0\n../escape.zip\nabc\n1\n1\n",
            "",
        ];
        for case in cases {
            assert!(
                matches!(
                    Manifest::parse(version(), case),
                    Err(BootstrapError::Protocol(_))
                ),
                "accepted {case:?}"
            );
        }
    }

    #[test]
    fn overflowing_sizes_are_rejected() {
        let half = u64::MAX / 2 + 1;
        let list = format!("v0\na.zip\naaaa\n{half}\n1\nb.zip\nbbbb\n{half}\n1\n");
        assert!(matches!(
            Manifest::parse(version(), &list),
            Err(BootstrapError::Protocol(_))
        ));

        let list = format!("v0\na.zip\naaaa\n1\n{half}\nb.zip\nbbbb\n1\n{half}\n");
        assert!(matches!(
            Manifest::parse(version(), &list),
            Err(BootstrapError::Protocol(_))
        ));
    }

    #[tokio::test]
    async fn follows_indirection() {
        let temp = TempDir::new().unwrap();
        let v = version();
        let transport = FakeTransport::new()
            .with_text(&v.file_url(MIRROR, "rbxPkgManifest.txt"), "pkgs-2.txt\n")
            .with_text(&v.file_url(MIRROR, "pkgs-2.txt"), LIST);

        let manifest = fetch_manifest(&transport, MIRROR, &v, temp.path())
            .await
            .unwrap();
        assert_eq!(manifest.packages.len(), 2);
        assert_eq!(manifest.version, v);
        assert!(temp
            .path()
            .join("version-abc-rbxPkgManifest.txt")
            .exists());
    }

    #[tokio::test]
    async fn indirection_loops_are_cut_off() {
        let temp = TempDir::new().unwrap();
        let v = version();
        let transport = FakeTransport::new()
            .with_text(&v.file_url(MIRROR, "rbxPkgManifest.txt"), "rbxPkgManifest.txt");

        let err = fetch_manifest(&transport, MIRROR, &v, temp.path())
            .await
            .unwrap_err();
        assert!(matches!(err, BootstrapError::Protocol(_)));
    }

    #[tokio::test]
    async fn removed_deployment_is_not_found() {
        let temp = TempDir::new().unwrap();
        let v = version();
        let transport =
            FakeTransport::new().with_status(&v.file_url(MIRROR, "rbxPkgManifest.txt"), 403);

        let err = fetch_manifest(&transport, MIRROR, &v, temp.path())
            .await
            .unwrap_err();
        assert!(matches!(err, BootstrapError::NotFound { .. }));
    }
}
