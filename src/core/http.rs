use std::path::Path;

use async_trait::async_trait;
use futures_util::StreamExt;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT_ENCODING};
use reqwest::{Client, StatusCode};
use tokio::io::AsyncWriteExt;
use tracing::debug;

use crate::core::error::{BootstrapError, BootstrapResult};

const APP_USER_AGENT: &str = concat!("Vinestrap/", env!("CARGO_PKG_VERSION"));

pub fn build_http_client() -> Result<Client, reqwest::Error> {
    let mut default_headers = HeaderMap::new();
    default_headers.insert(ACCEPT_ENCODING, HeaderValue::from_static("identity"));

    Client::builder()
        .user_agent(APP_USER_AGENT)
        .default_headers(default_headers)
        .build()
}

/// Remote side of the bootstrapper: deployment lookups, manifests and
/// package bodies all go through this seam.
#[async_trait]
pub trait Transport: Send + Sync {
    /// GET `url` and return the body as text.
    async fn get_text(&self, url: &str) -> BootstrapResult<String>;

    /// GET `url` and stream the body into a freshly created `dest`.
    /// Returns the number of bytes written.
    async fn download_to(&self, url: &str, dest: &Path) -> BootstrapResult<u64>;
}

/// `Transport` backed by a shared reqwest client.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: Client,
}

impl HttpTransport {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    async fn get(&self, url: &str) -> BootstrapResult<reqwest::Response> {
        let response = self.client.get(url).send().await?;
        check_status(url, response.status())?;
        Ok(response)
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn get_text(&self, url: &str) -> BootstrapResult<String> {
        Ok(self.get(url).await?.text().await?)
    }

    async fn download_to(&self, url: &str, dest: &Path) -> BootstrapResult<u64> {
        let response = self.get(url).await?;

        let mut file = tokio::fs::File::create(dest)
            .await
            .map_err(|e| BootstrapError::io(dest, e))?;

        let mut stream = response.bytes_stream();
        let mut written = 0_u64;
        while let Some(chunk) = stream.next().await {
            let chunk = chunk?;
            file.write_all(&chunk)
                .await
                .map_err(|e| BootstrapError::io(dest, e))?;
            written += chunk.len() as u64;
        }

        file.flush().await.map_err(|e| BootstrapError::io(dest, e))?;
        file.sync_all()
            .await
            .map_err(|e| BootstrapError::io(dest, e))?;

        debug!("Fetched {} bytes: {} -> {:?}", written, url, dest);
        Ok(written)
    }
}

/// Deleted deployments answer 403 or 404 depending on the CDN edge.
pub(crate) fn check_status(url: &str, status: StatusCode) -> BootstrapResult<()> {
    if status.is_success() {
        return Ok(());
    }

    match status {
        StatusCode::NOT_FOUND | StatusCode::FORBIDDEN => Err(BootstrapError::NotFound {
            url: url.to_string(),
        }),
        _ => Err(BootstrapError::Status {
            url: url.to_string(),
            status: status.as_u16(),
        }),
    }
}
