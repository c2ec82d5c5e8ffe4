// ─── Deployment Lookup ───
// Resolves the current build of a binary on a channel.

use serde::{Deserialize, Serialize};
use tracing::{info, instrument};

use crate::core::binary::BinaryType;
use crate::core::error::{BootstrapError, BootstrapResult};
use crate::core::http::Transport;

/// Location token of the package list of a freshly resolved version.
pub const PACKAGE_MANIFEST: &str = "rbxPkgManifest.txt";

/// Channel every binary follows unless configured otherwise.
pub const DEFAULT_CHANNEL: &str = "";

/// One installable build of a binary.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Version {
    pub binary: BinaryType,
    /// Normalized channel name, empty for the default channel.
    pub channel: String,
    /// Globally unique build identifier, e.g. `version-0123456789abcdef`.
    pub guid: String,
    /// Location token of the package list, relative to the deployment base.
    pub manifest: String,
}

/// Response of the client-version endpoint.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ClientVersion {
    #[serde(default)]
    version: Option<String>,
    client_version_upload: String,
}

impl Version {
    pub fn new(binary: BinaryType, channel: &str, guid: impl Into<String>) -> Self {
        Self {
            binary,
            channel: normalize_channel(channel),
            guid: guid.into(),
            manifest: PACKAGE_MANIFEST.to_string(),
        }
    }

    /// Base URL every file of this deployment hangs off, with a trailing `/`.
    pub fn base_url(&self, mirror: &str) -> String {
        let mirror = mirror.trim_end_matches('/');
        if self.channel.is_empty() {
            format!("{mirror}/")
        } else {
            format!("{mirror}/channel/{}/", self.channel)
        }
    }

    /// URL of a deployment file, e.g. a package or the package list.
    pub fn file_url(&self, mirror: &str, file: &str) -> String {
        format!("{}{}-{}", self.base_url(mirror), self.guid, file)
    }
}

/// `""` and `live` (any case) are the default channel; everything else is
/// lower-cased.
pub fn normalize_channel(channel: &str) -> String {
    let channel = channel.trim().to_ascii_lowercase();
    if channel == "live" {
        String::new()
    } else {
        channel
    }
}

pub fn client_version_url(endpoint: &str, binary: BinaryType, channel: &str) -> String {
    let endpoint = endpoint.trim_end_matches('/');
    let channel = normalize_channel(channel);
    if channel.is_empty() {
        format!("{endpoint}/v2/client-version/{}", binary.api_name())
    } else {
        format!(
            "{endpoint}/v2/client-version/{}/channel/{channel}",
            binary.api_name()
        )
    }
}

/// Ask the deployment tracker which build `binary` currently runs on `channel`.
#[instrument(skip(transport, endpoint))]
pub async fn latest_version(
    transport: &dyn Transport,
    endpoint: &str,
    binary: BinaryType,
    channel: &str,
) -> BootstrapResult<Version> {
    let url = client_version_url(endpoint, binary, channel);
    let body = transport.get_text(&url).await?;

    let response: ClientVersion = serde_json::from_str(&body).map_err(|e| {
        BootstrapError::Protocol(format!("client version response from {url}: {e}"))
    })?;

    let guid = response.client_version_upload.trim();
    if guid.is_empty() {
        return Err(BootstrapError::Protocol(format!(
            "client version response from {url} has no build identifier"
        )));
    }

    info!(
        "Latest {} on channel {:?}: {} ({})",
        binary,
        normalize_channel(channel),
        guid,
        response.version.as_deref().unwrap_or("unknown")
    );

    Ok(Version::new(binary, channel, guid))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::testing::FakeTransport;

    const ENDPOINT: &str = "https://clientsettings.example.com";

    #[test]
    fn lookup_url_depends_on_channel() {
        assert_eq!(
            client_version_url(ENDPOINT, BinaryType::Player, ""),
            "https://clientsettings.example.com/v2/client-version/WindowsPlayer"
        );
        assert_eq!(
            client_version_url(ENDPOINT, BinaryType::Player, "LIVE"),
            "https://clientsettings.example.com/v2/client-version/WindowsPlayer"
        );
        assert_eq!(
            client_version_url(ENDPOINT, BinaryType::Studio, "ZBeta"),
            "https://clientsettings.example.com/v2/client-version/WindowsStudio64/channel/zbeta"
        );
    }

    #[test]
    fn deployment_urls() {
        let live = Version::new(BinaryType::Player, "", "version-abc");
        assert_eq!(
            live.file_url("https://setup.example.com/", "RobloxApp.zip"),
            "https://setup.example.com/version-abc-RobloxApp.zip"
        );

        let beta = Version::new(BinaryType::Player, "Beta", "version-abc");
        assert_eq!(
            beta.file_url("https://setup.example.com", PACKAGE_MANIFEST),
            "https://setup.example.com/channel/beta/version-abc-rbxPkgManifest.txt"
        );
    }

    #[tokio::test]
    async fn resolves_latest_version() {
        let transport = FakeTransport::new().with_text(
            &client_version_url(ENDPOINT, BinaryType::Player, "beta"),
            r#"{"version":"0.600.1.6000","clientVersionUpload":"version-1234","bootstrapperVersion":"1, 6"}"#,
        );

        let version = latest_version(&transport, ENDPOINT, BinaryType::Player, "beta")
            .await
            .unwrap();
        assert_eq!(version.guid, "version-1234");
        assert_eq!(version.channel, "beta");
        assert_eq!(version.manifest, PACKAGE_MANIFEST);
    }

    #[tokio::test]
    async fn garbage_response_is_protocol_error() {
        let transport = FakeTransport::new()
            .with_text(
                &client_version_url(ENDPOINT, BinaryType::Player, ""),
                "<html>maintenance</html>",
            )
            .with_text(
                &client_version_url(ENDPOINT, BinaryType::Studio, ""),
                r#"{"version":"1","clientVersionUpload":"  "}"#,
            );

        let err = latest_version(&transport, ENDPOINT, BinaryType::Player, "")
            .await
            .unwrap_err();
        assert!(matches!(err, BootstrapError::Protocol(_)));

        let err = latest_version(&transport, ENDPOINT, BinaryType::Studio, "")
            .await
            .unwrap_err();
        assert!(matches!(err, BootstrapError::Protocol(_)));
    }

    #[tokio::test]
    async fn transport_failures_propagate() {
        let transport = FakeTransport::new();
        let err = latest_version(&transport, ENDPOINT, BinaryType::Player, "")
            .await
            .unwrap_err();
        assert!(matches!(err, BootstrapError::NotFound { .. }));
    }
}
