pub mod deployment;
pub mod launch_uri;
pub mod manifest;

pub use deployment::{
    latest_version, normalize_channel, Version, DEFAULT_CHANNEL, PACKAGE_MANIFEST,
};
pub use launch_uri::{
    is_launch_uri, parse_launch_uri, select_channel, ChannelDecision, LaunchUri,
};
pub use manifest::{fetch_manifest, Manifest, Package};
