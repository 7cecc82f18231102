use crate::core::roster::parse_roster;
use crate::domain::model::Participant;
use crate::domain::ports::ParticipantSource;
use crate::utils::error::{CertError, Result};
use async_trait::async_trait;
use reqwest::Client;
use std::path::PathBuf;
use std::time::Duration;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// 從試算表的 CSV 匯出端點取得名冊
pub struct RemoteSheetSource {
    client: Client,
    export_url: String,
}

impl RemoteSheetSource {
    pub fn new(base_url: &str, sheet_id: &str) -> Result<Self> {
        let client = Client::builder().timeout(REQUEST_TIMEOUT).build()?;
        Ok(Self {
            client,
            export_url: Self::export_url(base_url, sheet_id),
        })
    }

    pub fn export_url(base_url: &str, sheet_id: &str) -> String {
        format!(
            "{}/{}/export?format=csv",
            base_url.trim_end_matches('/'),
            sheet_id.trim()
        )
    }
}

#[async_trait]
impl ParticipantSource for RemoteSheetSource {
    fn describe(&self) -> String {
        format!("remote sheet {}", self.export_url)
    }

    async fn probe(&self) -> Result<()> {
        tracing::debug!("Probing roster endpoint: {}", self.export_url);
        let response = self
            .client
            .head(&self.export_url)
            .send()
            .await
            .map_err(|e| CertError::source_unavailable(format!("HEAD {}: {}", self.export_url, e)))?;

        tracing::debug!("Probe response status: {}", response.status());

        if !response.status().is_success() {
            return Err(CertError::source_unavailable(format!(
                "HEAD {} returned {}",
                self.export_url,
                response.status()
            )));
        }
        Ok(())
    }

    async fn fetch(&self) -> Result<Vec<Participant>> {
        tracing::debug!("Making roster request to: {}", self.export_url);
        let response = self
            .client
            .get(&self.export_url)
            .send()
            .await
            .map_err(|e| CertError::source_unavailable(format!("GET {}: {}", self.export_url, e)))?;

        tracing::debug!("Roster response status: {}", response.status());

        if !response.status().is_success() {
            return Err(CertError::source_unavailable(format!(
                "GET {} returned {}",
                self.export_url,
                response.status()
            )));
        }

        let payload = response.bytes().await.map_err(|e| {
            CertError::source_unavailable(format!("reading roster body failed: {}", e))
        })?;

        parse_roster(&payload)
    }
}

/// 本地 CSV 名冊
pub struct LocalFileSource {
    path: PathBuf,
}

impl LocalFileSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl ParticipantSource for LocalFileSource {
    fn describe(&self) -> String {
        format!("local file {}", self.path.display())
    }

    async fn probe(&self) -> Result<()> {
        match tokio::fs::metadata(&self.path).await {
            Ok(meta) if meta.is_file() => Ok(()),
            Ok(_) => Err(CertError::source_unavailable(format!(
                "{} is not a file",
                self.path.display()
            ))),
            Err(e) => Err(CertError::source_unavailable(format!(
                "{}: {}",
                self.path.display(),
                e
            ))),
        }
    }

    async fn fetch(&self) -> Result<Vec<Participant>> {
        let payload = tokio::fs::read(&self.path).await.map_err(|e| {
            CertError::source_unavailable(format!("{}: {}", self.path.display(), e))
        })?;
        parse_roster(&payload)
    }
}
