use crate::domain::ports::LedgerStore;
use crate::utils::error::{CertError, Result};
use async_trait::async_trait;
use std::io::ErrorKind;
use std::path::PathBuf;
use tokio::io::AsyncWriteExt;

/// 一行一個 email 的純文字帳本檔
#[derive(Debug, Clone)]
pub struct FileLedgerStore {
    path: PathBuf,
}

impl FileLedgerStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl LedgerStore for FileLedgerStore {
    async fn read_all(&self) -> Result<Option<String>> {
        match tokio::fs::read_to_string(&self.path).await {
            Ok(content) => Ok(Some(content)),
            Err(e) if e.kind() == ErrorKind::NotFound => {
                tracing::debug!("No ledger at {} yet", self.path.display());
                Ok(None)
            }
            Err(e) => Err(CertError::ledger(format!(
                "cannot read {}: {}",
                self.path.display(),
                e
            ))),
        }
    }

    async fn append_line(&self, line: &str) -> Result<()> {
        let write_err = |e: std::io::Error| {
            CertError::ledger(format!("cannot append to {}: {}", self.path.display(), e))
        };

        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await
            .map_err(write_err)?;

        file.write_all(format!("{}\n", line).as_bytes())
            .await
            .map_err(write_err)?;
        file.sync_data().await.map_err(write_err)?;
        Ok(())
    }
}
