//! Object stores backed by HTTP, and routing between local and remote.

use std::io::Write;
use std::time::Duration;

use reqwest::StatusCode;
use tokio::runtime::Handle;
use tracing::debug;

use rinf_core::error::StorageError;
use rinf_core::storage::{scheme, LocalStore, ObjectStore};

const GCS_ENDPOINT: &str = "https://storage.googleapis.com";

/// HTTP(S) URL for a remote locator.
///
/// `gs://bucket/object` maps to the public Cloud Storage endpoint.
pub fn http_url(locator: &str) -> Option<String> {
    match scheme(locator)? {
        "http" | "https" => Some(locator.to_string()),
        "gs" => Some(format!("{}/{}", GCS_ENDPOINT, &locator["gs://".len()..])),
        _ => None,
    }
}

/// Read-only store for `http://`, `https://` and `gs://` locators.
///
/// Blocking reads are driven on the given runtime, so this must be called
/// from outside async code (worker threads or `spawn_blocking`).
pub struct HttpStore {
    client: reqwest::Client,
    runtime: Handle,
}

impl HttpStore {
    pub fn new(runtime: Handle) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("rinf-cli/", env!("CARGO_PKG_VERSION")))
            .timeout(Duration::from_secs(300))
            .build()?;
        Ok(Self { client, runtime })
    }

    async fn fetch(&self, locator: &str, url: &str) -> Result<Vec<u8>, StorageError> {
        let remote = |reason: String| StorageError::Remote {
            locator: locator.to_string(),
            reason,
        };

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| remote(e.to_string()))?;

        match response.status() {
            StatusCode::NOT_FOUND => return Err(StorageError::NotFound(locator.to_string())),
            status if !status.is_success() => return Err(remote(format!("HTTP {}", status))),
            _ => {}
        }

        let bytes = response.bytes().await.map_err(|e| remote(e.to_string()))?;
        Ok(bytes.to_vec())
    }
}

impl ObjectStore for HttpStore {
    fn read(&self, locator: &str) -> Result<Vec<u8>, StorageError> {
        let url = http_url(locator).ok_or_else(|| {
            StorageError::Unsupported(format!("not a remote locator: {}", locator))
        })?;
        debug!("Fetching {}", url);
        self.runtime.block_on(self.fetch(locator, &url))
    }

    fn create(&self, locator: &str) -> Result<Box<dyn Write + Send>, StorageError> {
        Err(StorageError::Unsupported(format!(
            "cannot write to remote locator {}",
            locator
        )))
    }
}

/// Routes each locator to the local or the HTTP store by its scheme.
pub struct SchemeStore {
    local: LocalStore,
    remote: HttpStore,
}

impl SchemeStore {
    pub fn new(runtime: Handle) -> anyhow::Result<Self> {
        Ok(Self {
            local: LocalStore::new(),
            remote: HttpStore::new(runtime)?,
        })
    }

    fn route(&self, locator: &str) -> &dyn ObjectStore {
        match scheme(locator) {
            Some("http" | "https" | "gs") => &self.remote,
            _ => &self.local,
        }
    }
}

impl ObjectStore for SchemeStore {
    fn read(&self, locator: &str) -> Result<Vec<u8>, StorageError> {
        self.route(locator).read(locator)
    }

    fn create(&self, locator: &str) -> Result<Box<dyn Write + Send>, StorageError> {
        self.route(locator).create(locator)
    }
}
