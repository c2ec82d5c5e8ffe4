mod core;

use tracing_subscriber::EnvFilter;

pub use crate::core::binary::{BinaryType, DirectoryMap};
pub use crate::core::bootstrap::{Bootstrapper, LaunchPlan};
pub use crate::core::config::{BinarySettings, Settings};
pub use crate::core::downloader::{DownloadSummary, Downloader};
pub use crate::core::error::{BootstrapError, BootstrapResult};
pub use crate::core::gc::{clean_packages, clean_versions, SweepReport};
pub use crate::core::http::{build_http_client, HttpTransport, Transport};
pub use crate::core::install::{extract_manifest, is_installed, ExtractReport};
pub use crate::core::paths::{ensure_dir, Dirs};
pub use crate::core::state::{InstallState, InstallStateStore};
pub use crate::core::version::{
    fetch_manifest, latest_version, parse_launch_uri, select_channel, ChannelDecision, LaunchUri,
    Manifest, Package, Version,
};

/// Install the global tracing subscriber. `RUST_LOG` overrides the default
/// filter.
pub fn init_logging() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,vinestrap_lib=debug")),
        )
        .with_writer(std::io::stderr)
        .init();
}
