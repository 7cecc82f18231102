//! 執行設定，全部來自環境變數（若有 `.env` 會先載入）。
//!
//! 缺漏或不合法的項目會一次全部列出，而不是遇到第一個就停止。

use crate::adapters::smtp::{self, SmtpSettings};
use crate::core::pipeline::PipelineSettings;
use crate::domain::model::PageSetup;
use crate::utils::error::Result;
use crate::utils::logger::LogFormat;
use crate::utils::validation::{
    validate_existing_dir, validate_existing_file, validate_path, validate_range,
    validate_required, validate_url, Problems, Validate,
};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

pub const DEFAULT_SHEET_EXPORT_BASE_URL: &str = "https://docs.google.com/spreadsheets/d";
pub const DEFAULT_SMTP_HOST: &str = "smtp.gmail.com";
pub const DEFAULT_SMTP_PORT: u16 = 465;
pub const DEFAULT_SEND_INTERVAL_MS: u64 = 2000;

/// 名冊位置：遠端試算表或本地 CSV
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RosterLocation {
    RemoteSheet { base_url: String, sheet_id: String },
    LocalFile(PathBuf),
}

#[derive(Clone)]
pub struct AppConfig {
    pub email_address: String,
    pub email_password: String,
    pub sender_name: String,
    pub smtp_host: String,
    pub smtp_port: u16,
    pub roster: RosterLocation,
    pub template_dir: PathBuf,
    pub template_file: String,
    pub output_dir: PathBuf,
    pub ledger_path: PathBuf,
    pub send_interval: Duration,
    pub chrome_path: Option<PathBuf>,
    pub pdf_scale: f64,
    pub verbose: bool,
    pub log_format: LogFormat,
    pub monitor: bool,
}

// 不輸出密碼
impl fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AppConfig")
            .field("email_address", &self.email_address)
            .field("email_password", &"***")
            .field("sender_name", &self.sender_name)
            .field("smtp_host", &self.smtp_host)
            .field("smtp_port", &self.smtp_port)
            .field("roster", &self.roster)
            .field("template_dir", &self.template_dir)
            .field("template_file", &self.template_file)
            .field("output_dir", &self.output_dir)
            .field("ledger_path", &self.ledger_path)
            .field("send_interval", &self.send_interval)
            .field("chrome_path", &self.chrome_path)
            .field("pdf_scale", &self.pdf_scale)
            .finish()
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn parse_flag(value: Option<String>) -> bool {
    matches!(
        non_empty(value).map(|v| v.to_ascii_lowercase()).as_deref(),
        Some("1" | "true" | "yes" | "on")
    )
}

fn parse_or<T: FromStr>(
    problems: &mut Problems,
    field_name: &str,
    value: Option<String>,
    default: T,
) -> T {
    match non_empty(value) {
        None => default,
        Some(raw) => match raw.parse() {
            Ok(parsed) => parsed,
            Err(_) => {
                problems.push(format!("{} has an invalid value: {}", field_name, raw));
                default
            }
        },
    }
}

impl AppConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// 以任意查詢函式讀取設定，方便測試
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut problems = Problems::new();

        let mut required = |name: &str| -> String {
            match validate_required(name, &lookup(name)) {
                Ok(value) => value.to_string(),
                Err(problem) => {
                    problems.push(problem);
                    String::new()
                }
            }
        };

        let email_address = required("EMAIL_ADDRESS");
        let email_password = required("EMAIL_PASSWORD");
        let sender_name = required("EMAIL_SENDER_NAME");

        let roster = match non_empty(lookup("ROSTER_FILE")) {
            Some(path) => RosterLocation::LocalFile(PathBuf::from(path)),
            None => RosterLocation::RemoteSheet {
                base_url: non_empty(lookup("SHEET_EXPORT_BASE_URL"))
                    .unwrap_or_else(|| DEFAULT_SHEET_EXPORT_BASE_URL.to_string()),
                sheet_id: required("SHEET_ID"),
            },
        };

        let smtp_host =
            non_empty(lookup("SMTP_HOST")).unwrap_or_else(|| DEFAULT_SMTP_HOST.to_string());
        let smtp_port = parse_or(&mut problems, "SMTP_PORT", lookup("SMTP_PORT"), DEFAULT_SMTP_PORT);
        let send_interval_ms = parse_or(
            &mut problems,
            "SEND_INTERVAL_MS",
            lookup("SEND_INTERVAL_MS"),
            DEFAULT_SEND_INTERVAL_MS,
        );
        let pdf_scale = parse_or(&mut problems, "PDF_SCALE", lookup("PDF_SCALE"), 1.0f64);

        let config = Self {
            email_address,
            email_password,
            sender_name,
            smtp_host,
            smtp_port,
            roster,
            template_dir: PathBuf::from(
                non_empty(lookup("TEMPLATE_DIR")).unwrap_or_else(|| "templates".to_string()),
            ),
            template_file: non_empty(lookup("TEMPLATE_FILE"))
                .unwrap_or_else(|| "certificate.html".to_string()),
            output_dir: PathBuf::from(
                non_empty(lookup("OUTPUT_DIR")).unwrap_or_else(|| "certificates".to_string()),
            ),
            ledger_path: PathBuf::from(
                non_empty(lookup("LEDGER_PATH"))
                    .unwrap_or_else(|| "data/sent_emails.txt".to_string()),
            ),
            send_interval: Duration::from_millis(send_interval_ms),
            chrome_path: non_empty(lookup("CHROME_PATH")).map(PathBuf::from),
            pdf_scale,
            verbose: parse_flag(lookup("VERBOSE")),
            log_format: LogFormat::from_env_value(lookup("LOG_FORMAT").as_deref()),
            monitor: parse_flag(lookup("MONITOR")),
        };

        config.collect_problems(&mut problems);
        problems.into_result()?;
        Ok(config)
    }

    fn collect_problems(&self, problems: &mut Problems) {
        // 空值已在 required 報過
        if !self.email_address.is_empty() {
            if let Err(e) = smtp::sender_mailbox(&self.sender_name, &self.email_address) {
                problems.absorb(e);
            }
        }
        problems.check(validate_range("SMTP_PORT", self.smtp_port, 1, u16::MAX));
        if let Err(e) = smtp::relay_builder(&self.smtp_host, self.smtp_port) {
            problems.absorb(e);
        }
        // Chrome 的 printToPDF 只接受 0.1 ~ 2.0
        problems.check(validate_range("PDF_SCALE", self.pdf_scale, 0.1, 2.0));

        match &self.roster {
            RosterLocation::RemoteSheet { base_url, .. } => {
                problems.check(validate_url("SHEET_EXPORT_BASE_URL", base_url));
            }
            RosterLocation::LocalFile(path) => {
                problems.check(validate_existing_file("ROSTER_FILE", path));
            }
        }

        problems.check(validate_existing_dir("TEMPLATE_DIR", &self.template_dir));
        if self.template_dir.is_dir() {
            problems.check(validate_existing_file("TEMPLATE_FILE", &self.template_path()));
        }

        problems.check(validate_path(
            "OUTPUT_DIR",
            &self.output_dir.to_string_lossy(),
        ));
        problems.check(validate_path(
            "LEDGER_PATH",
            &self.ledger_path.to_string_lossy(),
        ));
        if self.ledger_path.is_dir() {
            problems.push(format!(
                "LEDGER_PATH points to a directory: {}",
                self.ledger_path.display()
            ));
        }
    }

    pub fn template_path(&self) -> PathBuf {
        self.template_dir.join(&self.template_file)
    }

    /// 建立輸出目錄與帳本所在目錄
    pub fn bootstrap(&self) -> Result<()> {
        std::fs::create_dir_all(&self.output_dir)?;
        if let Some(parent) = self.ledger_path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        tracing::debug!(
            "Bootstrapped {} and {}",
            self.output_dir.display(),
            self.ledger_path
                .parent()
                .unwrap_or_else(|| Path::new("."))
                .display()
        );
        Ok(())
    }

    pub fn pipeline_settings(&self) -> PipelineSettings {
        PipelineSettings {
            template_path: self.template_path(),
            output_dir: self.output_dir.clone(),
            page_setup: PageSetup {
                scale: self.pdf_scale,
                ..PageSetup::default()
            },
            sender_name: self.sender_name.clone(),
            send_interval: self.send_interval,
        }
    }

    pub fn smtp_settings(&self) -> SmtpSettings {
        SmtpSettings {
            host: self.smtp_host.clone(),
            port: self.smtp_port,
            username: self.email_address.clone(),
            password: self.email_password.clone(),
            sender_name: self.sender_name.clone(),
        }
    }
}

impl Validate for AppConfig {
    fn validate(&self) -> Result<()> {
        let mut problems = Problems::new();
        self.collect_problems(&mut problems);
        problems.into_result()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::error::CertError;
    use std::collections::HashMap;
    use tempfile::TempDir;

    fn template_dir() -> TempDir {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("certificate.html"), "{{name}}").unwrap();
        dir
    }

    fn lookup_from(vars: HashMap<&'static str, String>) -> impl Fn(&str) -> Option<String> {
        move |key| vars.get(key).cloned()
    }

    fn complete_vars(templates: &TempDir) -> HashMap<&'static str, String> {
        HashMap::from([
            ("EMAIL_ADDRESS", "events@example.com".to_string()),
            ("EMAIL_PASSWORD", "app-password".to_string()),
            ("EMAIL_SENDER_NAME", "Event Team".to_string()),
            ("SHEET_ID", "sheet-123".to_string()),
            ("TEMPLATE_DIR", templates.path().display().to_string()),
        ])
    }

    #[test]
    fn test_complete_config_uses_defaults() {
        let templates = template_dir();
        let config = AppConfig::from_lookup(lookup_from(complete_vars(&templates))).unwrap();

        assert_eq!(config.smtp_host, DEFAULT_SMTP_HOST);
        assert_eq!(config.smtp_port, 465);
        assert_eq!(config.send_interval, Duration::from_millis(2000));
        assert_eq!(
            config.roster,
            RosterLocation::RemoteSheet {
                base_url: DEFAULT_SHEET_EXPORT_BASE_URL.to_string(),
                sheet_id: "sheet-123".to_string(),
            }
        );
        assert!(config.template_path().ends_with("certificate.html"));
    }

    #[test]
    fn test_every_missing_item_is_listed() {
        let templates = template_dir();
        let vars = HashMap::from([("TEMPLATE_DIR", templates.path().display().to_string())]);

        match AppConfig::from_lookup(lookup_from(vars)) {
            Err(CertError::ConfigError { problems }) => {
                let joined = problems.join("\n");
                assert!(joined.contains("EMAIL_ADDRESS"));
                assert!(joined.contains("EMAIL_PASSWORD"));
                assert!(joined.contains("EMAIL_SENDER_NAME"));
                assert!(joined.contains("SHEET_ID"));
                assert_eq!(problems.len(), 4);
            }
            other => panic!("expected config error, got {:?}", other.map(|_| ())),
        }
    }

    #[test]
    fn test_local_roster_does_not_need_sheet_id() {
        let templates = template_dir();
        let roster = templates.path().join("participants.csv");
        std::fs::write(&roster, "name,email\n").unwrap();

        let mut vars = complete_vars(&templates);
        vars.remove("SHEET_ID");
        vars.insert("ROSTER_FILE", roster.display().to_string());

        let config = AppConfig::from_lookup(lookup_from(vars)).unwrap();
        assert_eq!(config.roster, RosterLocation::LocalFile(roster));
    }

    #[test]
    fn test_missing_template_dir_and_bad_numbers_reported() {
        let templates = template_dir();
        let mut vars = complete_vars(&templates);
        vars.insert("TEMPLATE_DIR", "/nonexistent/templates".to_string());
        vars.insert("SMTP_PORT", "smtp".to_string());
        vars.insert("PDF_SCALE", "9".to_string());

        match AppConfig::from_lookup(lookup_from(vars)) {
            Err(CertError::ConfigError { problems }) => {
                let joined = problems.join("\n");
                assert!(joined.contains("TEMPLATE_DIR"));
                assert!(joined.contains("SMTP_PORT"));
                assert!(joined.contains("PDF_SCALE"));
            }
            other => panic!("expected config error, got {:?}", other.map(|_| ())),
        }
    }

    #[test]
    fn test_malformed_sender_address_listed_with_other_problems() {
        let templates = template_dir();
        let work = TempDir::new().unwrap();
        let output = work.path().join("out");
        let mut vars = complete_vars(&templates);
        vars.insert("EMAIL_ADDRESS", "not-an-address".to_string());
        vars.insert("PDF_SCALE", "9".to_string());
        vars.insert("OUTPUT_DIR", output.display().to_string());

        match AppConfig::from_lookup(lookup_from(vars)) {
            Err(CertError::ConfigError { problems }) => {
                assert_eq!(problems.len(), 2);
                let joined = problems.join("\n");
                assert!(joined.contains("EMAIL_ADDRESS is not a valid address"));
                assert!(joined.contains("PDF_SCALE"));
            }
            other => panic!("expected config error, got {:?}", other.map(|_| ())),
        }
        // 設定錯誤時不能建立任何目錄
        assert!(!output.exists());
    }

    #[test]
    fn test_debug_hides_password() {
        let templates = template_dir();
        let config = AppConfig::from_lookup(lookup_from(complete_vars(&templates))).unwrap();
        let printed = format!("{:?}", config);
        assert!(!printed.contains("app-password"));
    }

    #[test]
    fn test_bootstrap_creates_directories() {
        let templates = template_dir();
        let work = TempDir::new().unwrap();
        let mut vars = complete_vars(&templates);
        vars.insert("OUTPUT_DIR", work.path().join("out").display().to_string());
        vars.insert(
            "LEDGER_PATH",
            work.path().join("data/sent.txt").display().to_string(),
        );

        let config = AppConfig::from_lookup(lookup_from(vars)).unwrap();
        config.bootstrap().unwrap();

        assert!(work.path().join("out").is_dir());
        assert!(work.path().join("data").is_dir());
        assert!(config.validate().is_ok());
    }
}
