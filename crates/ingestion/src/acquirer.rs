//! Document acquisition
//!
//! Downloads the source PDF into a local directory. Google Drive sharing links
//! are rewritten to their direct-download form; any other http(s) URL is
//! fetched as-is. There is exactly one attempt per call.

use docchat_common::errors::{AppError, Result};
use regex_lite::Regex;
use reqwest::Url;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info, instrument};

/// Leading bytes of every PDF file
pub const PDF_MAGIC: &[u8] = b"%PDF-";

const DRIVE_HOST: &str = "drive.google.com";
const DRIVE_DOWNLOAD_URL: &str = "https://drive.google.com/uc";

fn malformed(locator: &str, reason: impl Into<String>) -> AppError {
    AppError::MalformedLocator {
        locator: locator.to_string(),
        reason: reason.into(),
    }
}

/// Turn a user-supplied locator into the URL that serves the raw bytes
pub fn resolve_download_url(locator: &str) -> Result<Url> {
    let url = Url::parse(locator.trim()).map_err(|e| malformed(locator, e.to_string()))?;

    match url.scheme() {
        "http" | "https" => {}
        other => return Err(malformed(locator, format!("unsupported scheme '{}'", other))),
    }

    if url.host_str() != Some(DRIVE_HOST) {
        return Ok(url);
    }

    let file_id = drive_file_id(&url)?
        .ok_or_else(|| malformed(locator, "no file id in Google Drive link"))?;

    Url::parse_with_params(DRIVE_DOWNLOAD_URL, &[("export", "download"), ("id", file_id.as_str())])
        .map_err(|e| malformed(locator, e.to_string()))
}

/// File id from `/file/d/<ID>/...` or an `id=` query parameter
fn drive_file_id(url: &Url) -> Result<Option<String>> {
    let pattern = Regex::new(r"/file/d/([A-Za-z0-9_-]+)").map_err(|e| AppError::Internal {
        message: format!("Invalid Drive id pattern: {}", e),
    })?;

    if let Some(caps) = pattern.captures(url.path()) {
        return Ok(caps.get(1).map(|m| m.as_str().to_string()));
    }

    Ok(url
        .query_pairs()
        .find(|(k, v)| k == "id" && !v.is_empty())
        .map(|(_, v)| v.into_owned()))
}

/// Fetches a single remote document into local storage
pub struct DocumentAcquirer {
    client: reqwest::Client,
}

impl DocumentAcquirer {
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| AppError::Internal {
                message: format!("Failed to create HTTP client: {}", e),
            })?;
        Ok(Self { client })
    }

    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }

    /// Download `locator` into `save_dir/file_name`, replacing any existing file
    #[instrument(skip(self), fields(dir = %save_dir.display()))]
    pub async fn acquire(&self, locator: &str, save_dir: &Path, file_name: &str) -> Result<PathBuf> {
        let url = resolve_download_url(locator)?;
        let acquisition_err = |message: String| AppError::Acquisition {
            url: url.to_string(),
            message,
        };

        tokio::fs::create_dir_all(save_dir)
            .await
            .map_err(|e| acquisition_err(format!("cannot create {}: {}", save_dir.display(), e)))?;

        debug!(url = %url, "Fetching document");

        let response = self
            .client
            .get(url.clone())
            .send()
            .await
            .map_err(|e| acquisition_err(format!("request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(acquisition_err(format!("server returned {}", status)));
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| acquisition_err(format!("failed to read body: {}", e)))?;

        if !bytes.starts_with(PDF_MAGIC) {
            return Err(AppError::NotAPdf {
                url: url.to_string(),
            });
        }

        let path = save_dir.join(file_name);
        tokio::fs::write(&path, &bytes)
            .await
            .map_err(|e| acquisition_err(format!("cannot write {}: {}", path.display(), e)))?;

        info!(
            path = %path.display(),
            bytes = bytes.len(),
            "Document downloaded"
        );

        Ok(path)
    }
}
