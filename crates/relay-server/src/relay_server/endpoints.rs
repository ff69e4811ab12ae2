//! Route and header constants for the v2 relay surface.

pub(super) const EVENTS_ENDPOINT: &str = "/v2/events";
pub(super) const EVIDENCE_ENDPOINT: &str = "/v2/evidence";
pub(super) const EVIDENCE_DETAIL_ENDPOINT: &str = "/v2/evidence/{evidence_id}";
pub(super) const STATUS_ENDPOINT: &str = "/v2/status";

pub(super) const RELAY_KEY_HEADER: &str = "x-relay-key";

pub(super) const DEV_EVENT_TYPE_PREFIX: &str = "dev.";
pub(super) const QA_EVENT_TYPE_PREFIX: &str = "qa.";
pub(super) const RECENT_ACTIVITY_LIMIT: usize = 5;

pub(super) const COMMENT_SCAN_MAX_PAGES: u64 = 3;
pub(super) const DEFAULT_EVIDENCE_FILENAME: &str = "upload.bin";
