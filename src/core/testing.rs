//! In-memory stand-ins shared by the unit tests.

use std::collections::HashMap;
use std::io::Write;
use std::path::Path;
use std::sync::Mutex;

use async_trait::async_trait;
use reqwest::StatusCode;

use crate::core::error::{BootstrapError, BootstrapResult};
use crate::core::http::{check_status, Transport};

/// Serves canned bodies and records every URL it was asked for.
/// Unknown URLs answer 404.
#[derive(Default)]
pub struct FakeTransport {
    bodies: HashMap<String, Vec<u8>>,
    statuses: HashMap<String, u16>,
    requests: Mutex<Vec<String>>,
}

impl FakeTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_text(self, url: &str, body: &str) -> Self {
        self.with_bytes(url, body.as_bytes().to_vec())
    }

    pub fn with_bytes(mut self, url: &str, body: Vec<u8>) -> Self {
        self.bodies.insert(url.to_string(), body);
        self
    }

    pub fn with_status(mut self, url: &str, status: u16) -> Self {
        self.statuses.insert(url.to_string(), status);
        self
    }

    pub fn requests(&self) -> Vec<String> {
        self.requests.lock().unwrap().clone()
    }

    pub fn request_count(&self, url: &str) -> usize {
        self.requests().iter().filter(|u| *u == url).count()
    }

    fn respond(&self, url: &str) -> BootstrapResult<&[u8]> {
        self.requests.lock().unwrap().push(url.to_string());

        if let Some(status) = self.statuses.get(url) {
            let status = StatusCode::from_u16(*status).unwrap();
            check_status(url, status)?;
        }

        self.bodies
            .get(url)
            .map(Vec::as_slice)
            .ok_or_else(|| BootstrapError::NotFound {
                url: url.to_string(),
            })
    }
}

#[async_trait]
impl Transport for FakeTransport {
    async fn get_text(&self, url: &str) -> BootstrapResult<String> {
        Ok(String::from_utf8_lossy(self.respond(url)?).into_owned())
    }

    async fn download_to(&self, url: &str, dest: &Path) -> BootstrapResult<u64> {
        let body = self.respond(url)?.to_vec();
        tokio::fs::write(dest, &body)
            .await
            .map_err(|e| BootstrapError::io(dest, e))?;
        Ok(body.len() as u64)
    }
}

/// Build a zip archive in memory from `(name, contents, unix mode)` triples.
/// Names ending in `/` become directory entries.
pub fn zip_bytes(entries: &[(&str, &str, u32)]) -> Vec<u8> {
    let mut writer = zip::ZipWriter::new(std::io::Cursor::new(Vec::new()));

    for (name, contents, mode) in entries {
        // Fixed timestamps keep archives, and so their checksums, reproducible.
        let options = zip::write::SimpleFileOptions::default()
            .last_modified_time(zip::DateTime::default())
            .unix_permissions(*mode);
        if name.ends_with('/') {
            writer.add_directory(*name, options).unwrap();
        } else {
            writer.start_file(*name, options).unwrap();
            writer.write_all(contents.as_bytes()).unwrap();
        }
    }

    writer.finish().unwrap().into_inner()
}

/// Lowercase hex md5 of `bytes`, as listed in package manifests.
pub fn md5_hex(bytes: &[u8]) -> String {
    use md5::{Digest, Md5};
    hex::encode(Md5::digest(bytes))
}
