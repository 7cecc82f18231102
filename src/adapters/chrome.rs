//! 以 headless Chrome 將 HTML 列印成 PDF。
//!
//! 整批只啟動一次瀏覽器；`ChromeSession` 被 drop 時瀏覽器程序隨之結束。
//! headless_chrome 是同步 API，所有呼叫都放在 `spawn_blocking` 中執行。

use crate::domain::model::PageSetup;
use crate::domain::ports::{PdfBackend, PdfEngine};
use crate::utils::error::{CertError, Result};
use async_trait::async_trait;
use headless_chrome::types::PrintToPdfOptions;
use headless_chrome::{Browser, LaunchOptions, Tab};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use url::Url;

const ENGINE: &str = "chrome";

#[derive(Debug, Clone, Default)]
pub struct ChromeBackend {
    chrome_path: Option<PathBuf>,
}

impl ChromeBackend {
    /// `chrome_path` 為 `None` 時自動尋找已安裝的 Chrome/Chromium
    pub fn new(chrome_path: Option<PathBuf>) -> Self {
        Self { chrome_path }
    }
}

#[async_trait]
impl PdfBackend for ChromeBackend {
    type Engine = ChromeSession;

    async fn launch(&self) -> Result<ChromeSession> {
        let chrome_path = self.chrome_path.clone();
        tokio::task::spawn_blocking(move || ChromeSession::start(chrome_path))
            .await
            .map_err(|e| CertError::render(ENGINE, format!("launch task failed: {}", e)))?
    }
}

pub struct ChromeSession {
    // 先於 browser 釋放
    tab: Arc<Tab>,
    _browser: Browser,
}

impl ChromeSession {
    fn start(chrome_path: Option<PathBuf>) -> Result<Self> {
        let options = LaunchOptions::default_builder()
            .headless(true)
            .sandbox(false)
            .path(chrome_path)
            .build()
            .map_err(|e| CertError::render(ENGINE, format!("invalid launch options: {}", e)))?;

        let browser = Browser::new(options)
            .map_err(|e| CertError::render(ENGINE, format!("cannot start browser: {}", e)))?;
        let tab = browser
            .new_tab()
            .map_err(|e| CertError::render(ENGINE, format!("cannot open tab: {}", e)))?;

        tracing::info!("🖨️ PDF renderer started");
        Ok(Self {
            tab,
            _browser: browser,
        })
    }
}

fn pdf_options(setup: &PageSetup) -> PrintToPdfOptions {
    PrintToPdfOptions {
        landscape: Some(setup.landscape),
        print_background: Some(setup.print_background),
        scale: Some(setup.scale),
        paper_width: Some(setup.paper_width),
        paper_height: Some(setup.paper_height),
        margin_top: Some(0.0),
        margin_bottom: Some(0.0),
        margin_left: Some(0.0),
        margin_right: Some(0.0),
        ..Default::default()
    }
}

fn file_url(html_path: &Path) -> Result<Url> {
    let absolute = html_path
        .canonicalize()
        .map_err(|e| CertError::render(ENGINE, format!("{}: {}", html_path.display(), e)))?;
    Url::from_file_path(&absolute).map_err(|_| {
        CertError::render(
            ENGINE,
            format!("cannot build file URL for {}", absolute.display()),
        )
    })
}

#[async_trait]
impl PdfEngine for ChromeSession {
    async fn print_pdf(&self, html_path: &Path, setup: &PageSetup) -> Result<Vec<u8>> {
        let url = file_url(html_path)?;
        let options = pdf_options(setup);
        let tab = Arc::clone(&self.tab);

        let printed = tokio::task::spawn_blocking(move || -> anyhow::Result<Vec<u8>> {
            tab.navigate_to(url.as_str())?.wait_until_navigated()?;
            tab.print_to_pdf(Some(options))
        })
        .await
        .map_err(|e| CertError::render(ENGINE, format!("print task failed: {}", e)))?;

        printed.map_err(|e| CertError::render(ENGINE, format!("print failed: {}", e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_pdf_options_follow_page_setup() {
        let options = pdf_options(&PageSetup {
            scale: 0.8,
            ..PageSetup::default()
        });

        assert_eq!(options.landscape, Some(true));
        assert_eq!(options.print_background, Some(true));
        assert_eq!(options.scale, Some(0.8));
        assert_eq!(options.paper_width, Some(8.27));
        assert_eq!(options.margin_top, Some(0.0));
    }

    #[test]
    fn test_file_url_is_absolute() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("page.html");
        std::fs::write(&path, "<p>x</p>").unwrap();

        let url = file_url(&path).unwrap();
        assert_eq!(url.scheme(), "file");
        assert!(url.path().ends_with("/page.html"));
    }

    #[test]
    fn test_file_url_for_missing_file_fails() {
        assert!(file_url(Path::new("/nonexistent/page.html")).is_err());
    }
}
