use certmail::core::ParticipantSource;
use certmail::utils::logger::{self, LogFormat};
use certmail::utils::monitor::SystemMonitor;
use certmail::{
    AppConfig, CertError, CertificatePipeline, ChromeBackend, FileLedgerStore, LocalFileSource,
    RemoteSheetSource, RosterLocation, RunReport, SmtpMailTransport,
};

async fn run_with<S: ParticipantSource>(
    source: S,
    transport: SmtpMailTransport,
    config: &AppConfig,
) -> certmail::Result<RunReport> {
    let pipeline = CertificatePipeline::new(
        source,
        ChromeBackend::new(config.chrome_path.clone()),
        transport,
        FileLedgerStore::new(config.ledger_path.clone()),
        config.pipeline_settings(),
    )
    .with_monitor(SystemMonitor::new(config.monitor));

    pipeline.run().await
}

fn exit_with(e: &CertError) -> ! {
    tracing::error!(
        "❌ {} (Category: {:?}, Severity: {:?})",
        e,
        e.category(),
        e.severity()
    );
    tracing::error!("💡 Recovery suggestion: {}", e.recovery_suggestion());
    eprintln!("❌ {}", e.user_friendly_message());
    eprintln!("💡 {}", e.recovery_suggestion());
    std::process::exit(e.exit_code().max(1));
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    // 設定尚未驗證前就要能記錄錯誤，所以直接讀這兩個變數
    let verbose = matches!(
        std::env::var("VERBOSE").ok().as_deref(),
        Some("1" | "true" | "yes" | "on")
    );
    let log_format = LogFormat::from_env_value(std::env::var("LOG_FORMAT").ok().as_deref());
    logger::init_logger(verbose, log_format);

    tracing::info!("Starting certmail");

    let config = match AppConfig::from_env() {
        Ok(config) => config,
        Err(e) => exit_with(&e),
    };
    tracing::debug!("Config: {:?}", config);

    // 建立目錄之前先確認 SMTP 設定可用
    let transport = match SmtpMailTransport::new(&config.smtp_settings()) {
        Ok(transport) => transport,
        Err(e) => exit_with(&e),
    };

    if let Err(e) = config.bootstrap() {
        exit_with(&e);
    }

    let outcome = match &config.roster {
        RosterLocation::RemoteSheet { base_url, sheet_id } => {
            match RemoteSheetSource::new(base_url, sheet_id) {
                Ok(source) => run_with(source, transport, &config).await,
                Err(e) => Err(e),
            }
        }
        RosterLocation::LocalFile(path) => {
            run_with(LocalFileSource::new(path), transport, &config).await
        }
    };

    let report = match outcome {
        Ok(report) => report,
        Err(e) => exit_with(&e),
    };

    if report.has_failures() {
        tracing::warn!("⚠️ {} participant(s) failed:", report.failures.len());
        for failure in &report.failures {
            tracing::warn!(
                "  {:?} {}: {}",
                failure.stage,
                failure.recipient,
                failure.cause
            );
        }
    }
    if config.log_format == LogFormat::Json {
        tracing::info!(summary = %serde_json::to_string(&report)?, "run report");
    }

    let summary = &report.summary;
    println!(
        "✅ Done: {} fetched, {} already sent, {} invalid, {} rendered ({} failed), {} sent ({} failed)",
        summary.fetched,
        summary.skipped_duplicate,
        summary.skipped_invalid,
        summary.rendered,
        summary.failed_render,
        summary.sent,
        summary.failed_send
    );
    if summary.ledger_write_failures > 0 {
        println!(
            "⚠️ {} sent certificates could not be recorded and may be sent again",
            summary.ledger_write_failures
        );
    }

    Ok(())
}
