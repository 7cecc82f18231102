use serde::Serialize;
use std::path::PathBuf;

/// 名冊中的一位參與者，解析後不再變動
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Participant {
    pub code: String,
    pub name: String,
    pub registration: String,
    pub email: String,
}

impl Participant {
    pub fn new(name: impl Into<String>, email: impl Into<String>) -> Self {
        Self {
            code: String::new(),
            name: name.into(),
            registration: String::new(),
            email: email.into(),
        }
    }

    /// 去重用的鍵
    pub fn normalized_email(&self) -> String {
        normalize_email(&self.email)
    }
}

/// trim + 小寫，帳本與比對都用這個形式
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// 一位參與者對應磁碟上的一份 PDF
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CertificateArtifact {
    pub participant: Participant,
    pub file_path: PathBuf,
}

/// PDF 版面設定
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PageSetup {
    /// 英吋
    pub paper_width: f64,
    pub paper_height: f64,
    pub landscape: bool,
    pub print_background: bool,
    pub scale: f64,
}

impl Default for PageSetup {
    // A4，由 landscape 轉成橫向
    fn default() -> Self {
        Self {
            paper_width: 8.27,
            paper_height: 11.69,
            landscape: true,
            print_background: true,
            scale: 1.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MailAttachment {
    pub filename: String,
    pub content_type: String,
    pub data: Vec<u8>,
}

/// 交給郵件傳輸層的一封信
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutgoingMail {
    pub to_name: String,
    pub to_address: String,
    pub subject: String,
    pub text_body: String,
    pub attachment: MailAttachment,
}
