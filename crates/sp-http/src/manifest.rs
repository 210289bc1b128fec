//! Manifest download.

use reqwest::Client;

use sp_core::{Catalog, Error};

/// GET `url` and parse the body as a segment manifest.
pub async fn fetch_manifest(client: &Client, url: &str) -> sp_core::Result<Catalog> {
    tracing::debug!(url, "Fetching segment manifest");

    let response = client
        .get(url)
        .send()
        .await
        .map_err(|e| Error::transport(format!("GET {url}: {e}")))?;

    if !response.status().is_success() {
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        return Err(Error::transport(format!(
            "GET {url} returned {status}: {body}"
        )));
    }

    let body = response
        .text()
        .await
        .map_err(|e| Error::transport(format!("read manifest from {url}: {e}")))?;

    let catalog = Catalog::from_json(&body)?;
    tracing::info!(url, segments = catalog.len(), "Loaded segment manifest");
    Ok(catalog)
}
