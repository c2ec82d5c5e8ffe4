pub mod client;

pub use client::{verify_md5, DownloadSummary, Downloader, PARTIAL_SUFFIX};
