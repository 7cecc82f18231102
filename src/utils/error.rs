use thiserror::Error;

#[derive(Error, Debug)]
pub enum CertError {
    #[error("Configuration error: {}", .problems.join("; "))]
    ConfigError { problems: Vec<String> },

    #[error("Roster source unavailable: {message}")]
    SourceUnavailable { message: String },

    #[error("Roster parse error: {message}")]
    ParseError { message: String },

    #[error("Render failed for {participant}: {message}")]
    RenderError { participant: String, message: String },

    #[error("Delivery to {recipient} failed: {cause}")]
    DeliveryError { recipient: String, cause: String },

    #[error("Ledger error: {message}")]
    LedgerError { message: String },

    #[error("HTTP request failed: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Configuration,
    Source,
    Render,
    Delivery,
    Ledger,
    System,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ErrorSeverity {
    /// 單筆失敗，流程繼續
    Low,
    /// 可重試（下次排程再跑）
    Medium,
    /// 設定錯誤，需人工處理
    High,
    Critical,
}

impl CertError {
    pub fn config(problems: Vec<String>) -> Self {
        CertError::ConfigError { problems }
    }

    pub fn source_unavailable(message: impl Into<String>) -> Self {
        CertError::SourceUnavailable {
            message: message.into(),
        }
    }

    pub fn parse(message: impl Into<String>) -> Self {
        CertError::ParseError {
            message: message.into(),
        }
    }

    pub fn render(participant: impl Into<String>, message: impl Into<String>) -> Self {
        CertError::RenderError {
            participant: participant.into(),
            message: message.into(),
        }
    }

    pub fn delivery(recipient: impl Into<String>, cause: impl Into<String>) -> Self {
        CertError::DeliveryError {
            recipient: recipient.into(),
            cause: cause.into(),
        }
    }

    pub fn ledger(message: impl Into<String>) -> Self {
        CertError::LedgerError {
            message: message.into(),
        }
    }

    pub fn category(&self) -> ErrorCategory {
        match self {
            CertError::ConfigError { .. } => ErrorCategory::Configuration,
            CertError::SourceUnavailable { .. }
            | CertError::ParseError { .. }
            | CertError::HttpError(_) => ErrorCategory::Source,
            CertError::RenderError { .. } => ErrorCategory::Render,
            CertError::DeliveryError { .. } => ErrorCategory::Delivery,
            CertError::LedgerError { .. } => ErrorCategory::Ledger,
            CertError::IoError(_) => ErrorCategory::System,
        }
    }

    pub fn severity(&self) -> ErrorSeverity {
        match self.category() {
            ErrorCategory::Render | ErrorCategory::Delivery => ErrorSeverity::Low,
            ErrorCategory::Source | ErrorCategory::Ledger => ErrorSeverity::Medium,
            ErrorCategory::Configuration => ErrorSeverity::High,
            ErrorCategory::System => ErrorSeverity::Critical,
        }
    }

    /// 對應的程序結束碼
    pub fn exit_code(&self) -> i32 {
        match self.severity() {
            ErrorSeverity::Low => 0,
            ErrorSeverity::Medium => 2,
            ErrorSeverity::High => 1,
            ErrorSeverity::Critical => 3,
        }
    }

    pub fn recovery_suggestion(&self) -> &'static str {
        match self {
            CertError::ConfigError { .. } => {
                "Set the listed environment variables (or add them to .env) and run again"
            }
            CertError::SourceUnavailable { .. } | CertError::HttpError(_) => {
                "Check network access and that the roster sheet is shared for export"
            }
            CertError::ParseError { .. } => {
                "Check that the roster has a header row with name and email columns"
            }
            CertError::RenderError { .. } => {
                "Check the certificate template and that Chrome/Chromium is installed"
            }
            CertError::DeliveryError { .. } => {
                "Check the recipient address and the SMTP credentials; the next run retries it"
            }
            CertError::LedgerError { .. } => {
                "Check permissions on the ledger file and its directory"
            }
            CertError::IoError(_) => "Check disk space and file permissions",
        }
    }

    pub fn user_friendly_message(&self) -> String {
        match self {
            CertError::ConfigError { problems } => {
                let mut message = String::from("Configuration is incomplete:");
                for problem in problems {
                    message.push_str("\n  - ");
                    message.push_str(problem);
                }
                message
            }
            CertError::SourceUnavailable { .. } | CertError::HttpError(_) => {
                format!("Could not reach the participant roster ({})", self)
            }
            CertError::ParseError { .. } => {
                format!("Could not read the participant roster ({})", self)
            }
            CertError::LedgerError { message } => {
                format!("Could not access the sent-certificates ledger: {}", message)
            }
            other => other.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, CertError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_item_errors_are_low_severity() {
        assert_eq!(
            CertError::render("Ana", "template missing").severity(),
            ErrorSeverity::Low
        );
        assert_eq!(
            CertError::delivery("ana@x.com", "550 mailbox unavailable").severity(),
            ErrorSeverity::Low
        );
    }

    #[test]
    fn test_setup_errors_outrank_item_errors() {
        for err in [
            CertError::config(vec!["EMAIL_ADDRESS is not set".into()]),
            CertError::source_unavailable("HTTP 404"),
            CertError::parse("empty payload"),
            CertError::ledger("permission denied"),
        ] {
            assert!(err.severity() > ErrorSeverity::Low, "{}", err);
        }
    }

    #[test]
    fn test_exit_codes() {
        assert_eq!(CertError::config(vec![]).exit_code(), 1);
        assert_eq!(CertError::source_unavailable("down").exit_code(), 2);
        assert_eq!(CertError::ledger("denied").exit_code(), 2);
    }

    #[test]
    fn test_config_message_lists_every_problem() {
        let err = CertError::config(vec![
            "EMAIL_ADDRESS is not set".to_string(),
            "SHEET_ID is not set".to_string(),
        ]);
        let message = err.user_friendly_message();
        assert!(message.contains("EMAIL_ADDRESS"));
        assert!(message.contains("SHEET_ID"));
    }
}
