use crate::domain::model::{OutgoingMail, PageSetup, Participant};
use crate::utils::error::Result;
use async_trait::async_trait;
use std::path::Path;

/// 參與者名冊來源（遠端試算表或本地 CSV）
#[async_trait]
pub trait ParticipantSource: Send + Sync {
    /// 用於日誌的來源描述
    fn describe(&self) -> String;

    /// 執行前的可達性檢查
    async fn probe(&self) -> Result<()>;

    async fn fetch(&self) -> Result<Vec<Participant>>;
}

/// 已寄送帳本的持久層
#[async_trait]
pub trait LedgerStore: Send + Sync {
    /// 帳本尚未建立時回傳 `None`
    async fn read_all(&self) -> Result<Option<String>>;

    /// 附加一行並落盤
    async fn append_line(&self, line: &str) -> Result<()>;
}

/// 一個已啟動的 PDF 渲染工作階段，整批共用、依序使用
#[async_trait]
pub trait PdfEngine: Send + Sync {
    async fn print_pdf(&self, html_path: &Path, setup: &PageSetup) -> Result<Vec<u8>>;
}

/// 啟動 PDF 渲染工作階段；回傳值被 drop 時即釋放
#[async_trait]
pub trait PdfBackend: Send + Sync {
    type Engine: PdfEngine;

    async fn launch(&self) -> Result<Self::Engine>;
}

#[async_trait]
pub trait MailTransport: Send + Sync {
    async fn deliver(&self, mail: OutgoingMail) -> Result<()>;
}
