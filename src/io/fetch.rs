use std::fs;
use std::path::Path;
use std::time::Duration;

use reqwest::blocking::Client as HttpClient;
use tracing::{info, instrument};

use crate::error::{Result, ToolError};

const DOWNLOAD_TIMEOUT: Duration = Duration::from_secs(120);

/// Downloads `url` into `destination`.
///
/// Any file already at `destination` is removed before the request is made, so
/// a failed download never leaves a stale copy behind to be mistaken for a
/// fresh one.
#[instrument(level = "info", skip_all, fields(url = %url, path = %destination.display()))]
pub fn download(url: &str, destination: &Path) -> Result<()> {
    if destination.exists() {
        fs::remove_file(destination)?;
    }

    let client = HttpClient::builder().timeout(DOWNLOAD_TIMEOUT).build()?;
    let response = client.get(url).send()?;
    let status = response.status();
    if !status.is_success() {
        return Err(ToolError::Fetch {
            url: url.to_string(),
            status: status.as_u16(),
        });
    }

    let bytes = response.bytes()?;
    if let Some(parent) = destination.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    fs::write(destination, &bytes)?;
    info!(bytes = bytes.len(), "download complete");
    Ok(())
}
