#![allow(dead_code)]

use async_trait::async_trait;
use certmail::core::{OutgoingMail, PageSetup, PdfBackend, PdfEngine};
use certmail::{CertError, PipelineSettings, Result};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;

pub const TEMPLATE: &str = "<html><body><h1>{{name}}</h1></body></html>";

/// 假的 PDF 後端：HTML 中含有指定字串時列印失敗
#[derive(Clone, Default)]
pub struct FakeBackend {
    pub launches: Arc<AtomicUsize>,
    pub fail_launch: bool,
    pub fail_when_contains: Option<String>,
}

impl FakeBackend {
    pub fn failing_for(marker: &str) -> Self {
        Self {
            fail_when_contains: Some(marker.to_string()),
            ..Default::default()
        }
    }

    pub fn launch_count(&self) -> usize {
        self.launches.load(Ordering::SeqCst)
    }
}

pub struct FakeEngine {
    fail_when_contains: Option<String>,
}

#[async_trait]
impl PdfEngine for FakeEngine {
    async fn print_pdf(&self, html_path: &Path, _setup: &PageSetup) -> Result<Vec<u8>> {
        let html = std::fs::read_to_string(html_path)?;
        if let Some(marker) = &self.fail_when_contains {
            if html.contains(marker.as_str()) {
                return Err(CertError::render("fake", "page crashed"));
            }
        }
        Ok(format!("%PDF-fake {}", html).into_bytes())
    }
}

#[async_trait]
impl PdfBackend for FakeBackend {
    type Engine = FakeEngine;

    async fn launch(&self) -> Result<FakeEngine> {
        self.launches.fetch_add(1, Ordering::SeqCst);
        if self.fail_launch {
            return Err(CertError::render("fake", "no browser installed"));
        }
        Ok(FakeEngine {
            fail_when_contains: self.fail_when_contains.clone(),
        })
    }
}

/// 記錄寄出的信；指定地址會被拒收
#[derive(Clone, Default)]
pub struct RecordingTransport {
    pub sent: Arc<Mutex<Vec<OutgoingMail>>>,
    pub reject: Vec<String>,
}

impl RecordingTransport {
    pub fn rejecting(address: &str) -> Self {
        Self {
            reject: vec![address.to_string()],
            ..Default::default()
        }
    }

    pub fn recipients(&self) -> Vec<String> {
        self.sent
            .lock()
            .unwrap()
            .iter()
            .map(|mail| mail.to_address.clone())
            .collect()
    }
}

#[async_trait]
impl certmail::core::MailTransport for RecordingTransport {
    async fn deliver(&self, mail: OutgoingMail) -> Result<()> {
        if self.reject.contains(&mail.to_address) {
            return Err(CertError::delivery(&mail.to_address, "550 mailbox unavailable"));
        }
        self.sent.lock().unwrap().push(mail);
        Ok(())
    }
}

pub struct Workspace {
    pub dir: TempDir,
}

impl Workspace {
    pub fn new() -> Self {
        let dir = TempDir::new().unwrap();
        std::fs::create_dir_all(dir.path().join("templates")).unwrap();
        std::fs::write(dir.path().join("templates/certificate.html"), TEMPLATE).unwrap();
        Self { dir }
    }

    pub fn ledger_path(&self) -> PathBuf {
        self.dir.path().join("sent_emails.txt")
    }

    pub fn output_dir(&self) -> PathBuf {
        self.dir.path().join("certificates")
    }

    pub fn write_roster(&self, csv: &str) -> PathBuf {
        let path = self.dir.path().join("participants.csv");
        std::fs::write(&path, csv).unwrap();
        path
    }

    pub fn ledger_lines(&self) -> Vec<String> {
        std::fs::read_to_string(self.ledger_path())
            .unwrap_or_default()
            .lines()
            .map(str::to_string)
            .collect()
    }

    pub fn settings(&self) -> PipelineSettings {
        PipelineSettings {
            template_path: self.dir.path().join("templates/certificate.html"),
            output_dir: self.output_dir(),
            page_setup: PageSetup::default(),
            sender_name: "Event Team".to_string(),
            send_interval: Duration::ZERO,
        }
    }
}
