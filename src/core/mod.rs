// ─── Vinestrap Core ───
// Installs and updates deployment builds of a closed-source binary.
//
// Architecture:
//   core/
//     paths       on-disk layout
//     config      user settings
//     binary      binary flavors + package directory tables
//     http        Transport seam + reqwest implementation
//     version/    deployment lookup, launch URIs, package manifests
//     downloader/ concurrent package cache
//     install/    extraction + installed marker
//     state/      persisted install state
//     gc          cache and version sweeps
//     bootstrap   ties the above into a launch plan

pub mod binary;
pub mod bootstrap;
pub mod config;
pub mod downloader;
pub mod error;
pub mod gc;
pub mod http;
pub mod install;
pub mod paths;
pub mod state;
pub mod version;

#[cfg(test)]
pub mod testing;
