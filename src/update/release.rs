use async_trait::async_trait;
use reqwest::header::ACCEPT;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info};

use super::version::VersionTag;
use crate::core::UpdateConfig;
use crate::error::{map_io_err, ReplacerError, ReplacerResult};

/// Suffix of the optional checksum asset published next to a binary
pub const CHECKSUM_SUFFIX: &str = ".sha256";

/// Latest release as described by the release index
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReleaseDescriptor {
    pub tag_name: VersionTag,
    #[serde(default)]
    pub assets: Vec<ReleaseAsset>,
}

/// One downloadable file of a release
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReleaseAsset {
    pub name: String,
    pub browser_download_url: String,
    #[serde(default)]
    pub size: u64,
}

impl ReleaseDescriptor {
    /// Find the asset for `pattern`: an exact name first, otherwise the first
    /// binary asset whose name contains it
    pub fn find_asset(&self, pattern: &str) -> Option<&ReleaseAsset> {
        self.assets
            .iter()
            .find(|a| a.name == pattern)
            .or_else(|| {
                self.assets
                    .iter()
                    .find(|a| a.name.contains(pattern) && !a.name.ends_with(CHECKSUM_SUFFIX))
            })
    }

    /// Checksum file published for `asset`, if any
    pub fn checksum_for(&self, asset: &ReleaseAsset) -> Option<&ReleaseAsset> {
        let wanted = format!("{}{}", asset.name, CHECKSUM_SUFFIX);
        self.assets.iter().find(|a| a.name == wanted)
    }
}

/// Where release metadata and binaries come from
#[async_trait]
pub trait ReleaseSource: Send + Sync {
    /// Fetch the latest release descriptor
    async fn latest_release(&self) -> ReplacerResult<ReleaseDescriptor>;

    /// Stream the asset into `dest`, returning the number of bytes written
    async fn download_asset(&self, asset: &ReleaseAsset, dest: &Path) -> ReplacerResult<u64>;

    /// Fetch a small text asset such as a checksum file
    async fn fetch_text(&self, url: &str) -> ReplacerResult<String>;
}

/// Release source backed by the GitHub-style HTTP API
pub struct HttpReleaseSource {
    client: reqwest::Client,
    index_url: String,
    check_timeout: Duration,
    download_timeout: Duration,
}

impl HttpReleaseSource {
    pub fn new(config: &UpdateConfig) -> ReplacerResult<Self> {
        let client = reqwest::Client::builder()
            .user_agent(format!("multreplacer/{}", crate::version()))
            .connect_timeout(config.check_timeout())
            .build()?;

        Ok(Self {
            client,
            index_url: config.release_index_url(),
            check_timeout: config.check_timeout(),
            download_timeout: config.download_timeout(),
        })
    }

    async fn get(&self, url: &str, timeout: Duration) -> ReplacerResult<reqwest::Response> {
        let response = self
            .client
            .get(url)
            .header(ACCEPT, "application/vnd.github.v3+json")
            .timeout(timeout)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(ReplacerError::network(format!(
                "{} returned {}",
                url,
                response.status()
            )));
        }
        Ok(response)
    }
}

#[async_trait]
impl ReleaseSource for HttpReleaseSource {
    async fn latest_release(&self) -> ReplacerResult<ReleaseDescriptor> {
        debug!("Fetching release index {}", self.index_url);
        let response = self.get(&self.index_url, self.check_timeout).await?;
        let body = response.text().await?;
        let release: ReleaseDescriptor = serde_json::from_str(&body)
            .map_err(|e| ReplacerError::parse_error(format!("release index: {}", e)))?;
        Ok(release)
    }

    async fn download_asset(&self, asset: &ReleaseAsset, dest: &Path) -> ReplacerResult<u64> {
        info!("Downloading {} to {}", asset.browser_download_url, dest.display());
        let mut response = self
            .get(&asset.browser_download_url, self.download_timeout)
            .await?;

        let mut file = tokio::fs::File::create(dest)
            .await
            .map_err(map_io_err(dest))?;
        let mut written: u64 = 0;
        while let Some(chunk) = response.chunk().await? {
            file.write_all(&chunk).await.map_err(map_io_err(dest))?;
            written += chunk.len() as u64;
        }
        file.flush().await.map_err(map_io_err(dest))?;
        file.sync_all().await.map_err(map_io_err(dest))?;

        if asset.size > 0 && written != asset.size {
            return Err(ReplacerError::network(format!(
                "incomplete download of {}: {} of {} bytes",
                asset.name, written, asset.size
            )));
        }
        Ok(written)
    }

    async fn fetch_text(&self, url: &str) -> ReplacerResult<String> {
        let response = self.get(url, self.check_timeout).await?;
        Ok(response.text().await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const INDEX_JSON: &str = r#"{
        "tag_name": "v1.1.0",
        "name": "v1.1.0",
        "assets": [
            {"name": "app.exe.sha256", "browser_download_url": "https://example.com/app.exe.sha256", "size": 75},
            {"name": "app.exe", "browser_download_url": "https://example.com/app.exe", "size": 1024},
            {"name": "app.dmg", "browser_download_url": "https://example.com/app.dmg"}
        ]
    }"#;

    #[test]
    fn test_parse_release_index() {
        let release: ReleaseDescriptor = serde_json::from_str(INDEX_JSON).unwrap();
        assert_eq!(release.tag_name, VersionTag::from("v1.1.0"));
        assert_eq!(release.assets.len(), 3);
        assert_eq!(release.assets[2].size, 0);
    }

    #[test]
    fn test_find_asset_skips_checksum_files() {
        let release: ReleaseDescriptor = serde_json::from_str(INDEX_JSON).unwrap();
        let asset = release.find_asset("app.exe").unwrap();
        assert_eq!(asset.name, "app.exe");

        let asset = release.find_asset(".dmg").unwrap();
        assert_eq!(asset.name, "app.dmg");

        assert!(release.find_asset("app.AppImage").is_none());
    }

    #[test]
    fn test_checksum_for() {
        let release: ReleaseDescriptor = serde_json::from_str(INDEX_JSON).unwrap();
        let exe = release.find_asset("app.exe").unwrap();
        let dmg = release.find_asset("app.dmg").unwrap();
        assert_eq!(release.checksum_for(exe).unwrap().name, "app.exe.sha256");
        assert!(release.checksum_for(dmg).is_none());
    }

    #[test]
    fn test_missing_assets_field_defaults_empty() {
        let release: ReleaseDescriptor = serde_json::from_str(r#"{"tag_name": "v2"}"#).unwrap();
        assert!(release.assets.is_empty());
    }

    #[test]
    fn test_http_source_uses_configured_index() {
        let mut config = UpdateConfig::default();
        config.api_base = "http://127.0.0.1:9".to_string();
        let source = HttpReleaseSource::new(&config).unwrap();
        assert_eq!(
            source.index_url,
            "http://127.0.0.1:9/repos/eightman999/MultReplacerApp/releases/latest"
        );
    }

    #[tokio::test]
    async fn test_unreachable_index_is_network_error() {
        let mut config = UpdateConfig::default();
        // port 9 (discard) is not expected to serve HTTP
        config.api_base = "http://127.0.0.1:9".to_string();
        config.check_timeout_seconds = 2;
        let source = HttpReleaseSource::new(&config).unwrap();

        let err = source.latest_release().await.unwrap_err();
        assert_eq!(err.kind(), "network");
    }
}
