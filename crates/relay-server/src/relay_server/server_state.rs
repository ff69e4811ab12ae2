//! Per-process relay state: configuration, store, forge client, counters.

use super::*;

/// Static configuration for one relay server process.
#[derive(Debug, Clone)]
pub struct RelayServerConfig {
    pub bind: String,
    pub state_dir: PathBuf,
    pub relay_key: String,
    pub forge_api_base: String,
    pub forge_app_id: String,
    pub forge_installation_id: String,
    pub forge_private_key_pem: String,
    pub forge_timeout_ms: u64,
    pub label_rules: LabelRuleSet,
    pub max_evidence_bytes: u64,
}

/// Shared state threaded through every handler. Requests share nothing else;
/// forge sessions are opened per request.
pub(super) struct RelayServerState {
    pub(super) config: RelayServerConfig,
    pub(super) store: SqliteRelayStore,
    pub(super) forge: ForgeClient,
    pub(super) objects: EvidenceObjectStore,
    pub(super) pipeline_log: PipelineEventLog,
    pub(super) started_unix_ms: u64,
    pub(super) counters: RelayCounters,
}

#[derive(Debug, Default)]
pub(super) struct RelayCounters {
    pub(super) events_stored: AtomicU64,
    pub(super) idempotent_replays: AtomicU64,
    pub(super) payload_conflicts: AtomicU64,
    pub(super) validation_rejects: AtomicU64,
    pub(super) auth_failures: AtomicU64,
    pub(super) comments_created: AtomicU64,
    pub(super) comments_updated: AtomicU64,
    pub(super) evidence_uploads: AtomicU64,
}

impl RelayServerState {
    pub(super) fn new(config: RelayServerConfig) -> Result<Self> {
        std::fs::create_dir_all(&config.state_dir)
            .with_context(|| format!("failed to create {}", config.state_dir.display()))?;
        let store = SqliteRelayStore::new(config.state_dir.join("relay.sqlite"))
            .context("failed to open relay store")?;
        let forge = ForgeClient::new(ForgeClientConfig {
            api_base: config.forge_api_base.clone(),
            app_id: config.forge_app_id.clone(),
            installation_id: config.forge_installation_id.clone(),
            private_key_pem: config.forge_private_key_pem.clone(),
            request_timeout_ms: config.forge_timeout_ms,
        })?;
        let objects = EvidenceObjectStore::new(config.state_dir.join("objects"));
        let pipeline_log = PipelineEventLog::open(config.state_dir.join("runtime-events.jsonl"))?;
        Ok(Self {
            config,
            store,
            forge,
            objects,
            pipeline_log,
            started_unix_ms: current_unix_timestamp_ms(),
            counters: RelayCounters::default(),
        })
    }

    pub(super) fn bump(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    /// Best-effort structured log line; a failed append never fails the
    /// request it describes.
    pub(super) fn record_pipeline_event(
        &self,
        reason_code: &str,
        repo: &str,
        issue_number: u64,
        event_id: Option<&str>,
        extra: Value,
    ) {
        let line = pipeline_log_line(reason_code, repo, issue_number, event_id, extra);
        if let Err(error) = self.pipeline_log.append(&line) {
            eprintln!("failed to append pipeline log line: {error}");
        }
    }
}
