pub mod adapters;
pub mod config;
pub mod core;
pub mod domain;
pub mod utils;

pub use adapters::{ChromeBackend, FileLedgerStore, LocalFileSource, RemoteSheetSource, SmtpMailTransport};
pub use config::{AppConfig, RosterLocation};
pub use core::pipeline::{CertificatePipeline, PipelineSettings, RunReport, RunState, RunSummary};
pub use utils::error::{CertError, Result};
