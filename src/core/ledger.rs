use crate::domain::model::normalize_email;
use crate::domain::ports::LedgerStore;
use crate::utils::error::{CertError, Result};
use std::collections::HashSet;

/// 已寄送名單：只附加、不刪除，載入後是一個集合
pub struct SentLedger<S: LedgerStore> {
    store: S,
    snapshot: HashSet<String>,
    // 既有檔案最後一行沒有換行時，第一次附加要先補上
    needs_newline: bool,
}

impl<S: LedgerStore> SentLedger<S> {
    /// 讀取帳本；檔案不存在視為空集合，其他讀取錯誤直接回傳
    pub async fn load(store: S) -> Result<Self> {
        let content = store.read_all().await?;

        let (snapshot, needs_newline) = match content {
            Some(text) => {
                let entries = text
                    .lines()
                    .map(normalize_email)
                    .filter(|line| !line.is_empty())
                    .collect::<HashSet<_>>();
                let dangling = !text.is_empty() && !text.ends_with('\n');
                (entries, dangling)
            }
            None => (HashSet::new(), false),
        };

        tracing::debug!("Ledger loaded with {} entries", snapshot.len());

        Ok(Self {
            store,
            snapshot,
            needs_newline,
        })
    }

    pub fn len(&self) -> usize {
        self.snapshot.len()
    }

    pub fn is_empty(&self) -> bool {
        self.snapshot.is_empty()
    }

    pub fn contains(&self, email: &str) -> bool {
        self.snapshot.contains(&normalize_email(email))
    }

    /// 寫入一筆寄送紀錄。已在本次快照中則不重複附加，回傳 `false`。
    pub async fn record(&mut self, email: &str) -> Result<bool> {
        let normalized = normalize_email(email);
        if normalized.is_empty() {
            return Err(CertError::ledger("refusing to record an empty address"));
        }

        if self.snapshot.contains(&normalized) {
            return Ok(false);
        }

        let line = if self.needs_newline {
            format!("\n{}", normalized)
        } else {
            normalized.clone()
        };

        self.store.append_line(&line).await?;
        self.needs_newline = false;
        self.snapshot.insert(normalized);
        Ok(true)
    }
}
