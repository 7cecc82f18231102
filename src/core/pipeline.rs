use crate::core::dispatcher::Dispatcher;
use crate::core::ledger::SentLedger;
use crate::core::renderer::CertificateRenderer;
use crate::domain::model::{CertificateArtifact, PageSetup, Participant};
use crate::domain::ports::{LedgerStore, MailTransport, ParticipantSource, PdfBackend};
use crate::utils::error::{CertError, Result};
use crate::utils::monitor::SystemMonitor;
use chrono::{DateTime, Utc};
use regex::Regex;
use serde::Serialize;
use std::collections::HashSet;
use std::fmt;
use std::path::PathBuf;
use std::sync::LazyLock;
use std::time::Duration;

static EMAIL_SHAPE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").expect("email pattern is valid")
});

/// 單次執行的狀態；只能往前走，不會回到先前狀態
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum RunState {
    Idle,
    RosterLoaded,
    Filtered,
    Rendering,
    Dispatching,
    Done,
    Aborted,
}

impl RunState {
    fn order(self) -> u8 {
        match self {
            RunState::Idle => 0,
            RunState::RosterLoaded => 1,
            RunState::Filtered => 2,
            RunState::Rendering => 3,
            RunState::Dispatching => 4,
            RunState::Done => 5,
            RunState::Aborted => 6,
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, RunState::Done | RunState::Aborted)
    }

    pub fn can_advance_to(self, next: RunState) -> bool {
        if self.is_terminal() {
            return false;
        }
        match next {
            // 只有取得帳本或名冊時會中止
            RunState::Aborted => self == RunState::Idle,
            _ => next.order() == self.order() + 1,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum FailureStage {
    Validation,
    Render,
    Delivery,
    Ledger,
}

/// 單筆失敗，供最後的摘要使用
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ItemFailure {
    pub stage: FailureStage,
    pub recipient: String,
    pub cause: String,
}

#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    pub fetched: usize,
    pub skipped_duplicate: usize,
    pub skipped_invalid: usize,
    pub rendered: usize,
    pub failed_render: usize,
    pub sent: usize,
    pub failed_send: usize,
    /// 已寄出但未寫入帳本，下次執行可能重寄
    pub ledger_write_failures: usize,
}

impl fmt::Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "fetched={} skipped_duplicate={} skipped_invalid={} rendered={} failed_render={} sent={} failed_send={} ledger_write_failures={}",
            self.fetched,
            self.skipped_duplicate,
            self.skipped_invalid,
            self.rendered,
            self.failed_render,
            self.sent,
            self.failed_send,
            self.ledger_write_failures
        )
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub state: RunState,
    pub summary: RunSummary,
    pub failures: Vec<ItemFailure>,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl RunReport {
    pub fn has_failures(&self) -> bool {
        !self.failures.is_empty()
    }
}

#[derive(Debug, Clone)]
pub struct PipelineSettings {
    pub template_path: PathBuf,
    pub output_dir: PathBuf,
    pub page_setup: PageSetup,
    pub sender_name: String,
    pub send_interval: Duration,
}

struct RunTracker {
    state: RunState,
    summary: RunSummary,
    failures: Vec<ItemFailure>,
    started_at: DateTime<Utc>,
}

impl RunTracker {
    fn new() -> Self {
        Self {
            state: RunState::Idle,
            summary: RunSummary::default(),
            failures: Vec::new(),
            started_at: Utc::now(),
        }
    }

    fn advance(&mut self, next: RunState) {
        debug_assert!(
            self.state.can_advance_to(next),
            "invalid transition {:?} -> {:?}",
            self.state,
            next
        );
        tracing::debug!("Run state: {:?} -> {:?}", self.state, next);
        self.state = next;
    }

    fn abort(&mut self, error: CertError) -> CertError {
        let from = self.state;
        self.advance(RunState::Aborted);
        tracing::error!(
            state = ?self.state,
            "❌ Run {:?} -> {:?} before processing: {}",
            from,
            self.state,
            error
        );
        error
    }

    fn fail(&mut self, stage: FailureStage, recipient: &str, cause: String) {
        self.failures.push(ItemFailure {
            stage,
            recipient: recipient.trim().to_string(),
            cause,
        });
    }

    fn finish(mut self) -> RunReport {
        self.advance(RunState::Done);
        RunReport {
            state: self.state,
            summary: self.summary,
            failures: self.failures,
            started_at: self.started_at,
            finished_at: Utc::now(),
        }
    }
}

/// 取名冊 → 過濾已寄送 → 產生證書 → 寄送 → 寫入帳本
pub struct CertificatePipeline<S, B, T, L>
where
    S: ParticipantSource,
    B: PdfBackend,
    T: MailTransport,
    L: LedgerStore,
{
    source: S,
    backend: B,
    transport: T,
    ledger_store: L,
    settings: PipelineSettings,
    monitor: SystemMonitor,
}

impl<S, B, T, L> CertificatePipeline<S, B, T, L>
where
    S: ParticipantSource,
    B: PdfBackend,
    T: MailTransport,
    L: LedgerStore,
{
    pub fn new(
        source: S,
        backend: B,
        transport: T,
        ledger_store: L,
        settings: PipelineSettings,
    ) -> Self {
        Self {
            source,
            backend,
            transport,
            ledger_store,
            settings,
            monitor: SystemMonitor::default(),
        }
    }

    pub fn with_monitor(mut self, monitor: SystemMonitor) -> Self {
        self.monitor = monitor;
        self
    }

    pub async fn run(self) -> Result<RunReport> {
        let mut tracker = RunTracker::new();
        tracing::info!("🚀 Starting certificate run ({})", self.source.describe());

        // 帳本讀不到就無法保證不重寄
        let mut ledger = match SentLedger::load(self.ledger_store).await {
            Ok(ledger) => ledger,
            Err(e) => return Err(tracker.abort(e)),
        };
        tracing::info!("📒 Ledger holds {} recipients", ledger.len());

        let roster = match self.source.probe().await {
            Ok(()) => self.source.fetch().await,
            Err(e) => Err(e),
        };
        let roster = match roster {
            Ok(roster) => roster,
            Err(e) => return Err(tracker.abort(e)),
        };
        tracker.summary.fetched = roster.len();
        tracker.advance(RunState::RosterLoaded);
        tracing::info!("📥 Fetched {} participants", roster.len());
        self.monitor.log_stats("Roster");

        let queue = filter_pending(roster, &ledger, &mut tracker);
        tracker.advance(RunState::Filtered);
        tracing::info!(
            "🔎 {} pending, {} already sent, {} invalid",
            queue.len(),
            tracker.summary.skipped_duplicate,
            tracker.summary.skipped_invalid
        );

        tracker.advance(RunState::Rendering);
        let artifacts = render_all(&self.backend, &self.settings, &queue, &mut tracker).await;
        self.monitor.log_stats("Render");

        tracker.advance(RunState::Dispatching);
        let mut dispatcher = Dispatcher::new(
            self.transport,
            self.settings.sender_name.clone(),
            self.settings.send_interval,
        );
        for artifact in &artifacts {
            dispatch_one(&mut dispatcher, &mut ledger, artifact, &mut tracker).await;
        }
        self.monitor.log_stats("Dispatch");

        let report = tracker.finish();
        tracing::info!("✅ Run finished: {}", report.summary);
        self.monitor.log_final_stats();
        Ok(report)
    }
}

/// 排除帳本中已有的、同一名冊內重複的、以及沒有有效 email 的參與者
fn filter_pending<St: LedgerStore>(
    roster: Vec<Participant>,
    ledger: &SentLedger<St>,
    tracker: &mut RunTracker,
) -> Vec<Participant> {
    let mut seen = HashSet::new();
    let mut queue = Vec::new();

    for participant in roster {
        let key = participant.normalized_email();

        if !EMAIL_SHAPE.is_match(&key) {
            tracing::warn!(
                "⚠️ Skipping {:?}: invalid email {:?}",
                participant.name,
                participant.email
            );
            tracker.summary.skipped_invalid += 1;
            tracker.fail(
                FailureStage::Validation,
                &participant.email,
                format!("invalid email for {:?}", participant.name),
            );
            continue;
        }

        if ledger.contains(&key) || !seen.insert(key) {
            tracing::debug!("Skipping {}: already sent", participant.email.trim());
            tracker.summary.skipped_duplicate += 1;
            continue;
        }

        queue.push(participant);
    }

    queue
}

async fn render_all<B: PdfBackend>(
    backend: &B,
    settings: &PipelineSettings,
    queue: &[Participant],
    tracker: &mut RunTracker,
) -> Vec<CertificateArtifact> {
    let mut artifacts = Vec::new();
    if queue.is_empty() {
        return artifacts;
    }

    let engine = match backend.launch().await {
        Ok(engine) => engine,
        Err(e) => {
            tracing::error!("❌ Cannot start PDF renderer: {}", e);
            for participant in queue {
                tracker.summary.failed_render += 1;
                tracker.fail(FailureStage::Render, &participant.email, e.to_string());
            }
            return artifacts;
        }
    };

    // renderer 離開作用域時釋放渲染工作階段
    let renderer = CertificateRenderer::new(
        engine,
        settings.output_dir.clone(),
        settings.page_setup,
    );

    for participant in queue {
        match renderer.render(&settings.template_path, participant).await {
            Ok(artifact) => {
                tracker.summary.rendered += 1;
                tracing::info!("📄 Rendered {}", artifact.file_path.display());
                artifacts.push(artifact);
            }
            Err(e) => {
                tracker.summary.failed_render += 1;
                tracing::warn!("⚠️ {}", e);
                tracker.fail(FailureStage::Render, &participant.email, e.to_string());
            }
        }
    }

    artifacts
}

async fn dispatch_one<T: MailTransport, St: LedgerStore>(
    dispatcher: &mut Dispatcher<T>,
    ledger: &mut SentLedger<St>,
    artifact: &CertificateArtifact,
    tracker: &mut RunTracker,
) {
    let recipient = artifact.participant.email.trim();

    if let Err(e) = dispatcher.send(artifact).await {
        tracker.summary.failed_send += 1;
        tracing::warn!("⚠️ {}", e);
        tracker.fail(FailureStage::Delivery, recipient, e.to_string());
        return;
    }

    tracker.summary.sent += 1;
    tracing::info!("📧 Sent certificate to {}", recipient);

    if let Err(e) = ledger.record(recipient).await {
        tracker.summary.ledger_write_failures += 1;
        tracing::error!(
            "❌ Sent to {} but could not record it ({}); a later run may send it again",
            recipient,
            e
        );
        tracker.fail(FailureStage::Ledger, recipient, e.to_string());
    }
}
