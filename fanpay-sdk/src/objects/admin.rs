//! Operator (admin) API request and response types.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::ErrorBody;

// ---------------------------------------------------------------------------
// Failover queue
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationKind {
    Payment,
    Payout,
    TierRecalculation,
}

/// Lifecycle of a failover record.
///
/// `Exhausted` is terminal-but-unresolved: the record used up its automatic
/// retries and only a manual retry touches it again.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackupStatus {
    Pending,
    Success,
    Exhausted,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FailoverRecordResponse {
    pub id: Uuid,
    pub operation_kind: OperationKind,
    pub cause: String,
    pub payload: serde_json::Value,
    pub retry_count: u32,
    pub max_retries: u32,
    pub backup_status: BackupStatus,
    pub last_error: Option<String>,
    pub created_at: i64,
    pub resolved_at: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailoverQueueStatus {
    pub total: u64,
    pub pending: u64,
    pub success: u64,
    pub exhausted: u64,
    pub in_flight: u64,
    pub capacity: u64,
    pub evicted_total: u64,
    pub oldest_pending_at: Option<i64>,
}

// ---------------------------------------------------------------------------
// Operation log
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Severity {
    Debug,
    Info,
    Warn,
    Error,
    Critical,
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Severity::Debug => write!(f, "DEBUG"),
            Severity::Info => write!(f, "INFO"),
            Severity::Warn => write!(f, "WARN"),
            Severity::Error => write!(f, "ERROR"),
            Severity::Critical => write!(f, "CRITICAL"),
        }
    }
}

/// Query parameters for `GET /logs`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LogQuery {
    pub severity: Option<Severity>,
    pub min_severity: Option<Severity>,
    pub operation: Option<String>,
    /// Matches any correlating id (payer, creator, transaction, payout,
    /// failover record).
    pub correlation_id: Option<Uuid>,
    /// Unix timestamp, inclusive.
    pub since: Option<i64>,
    /// Unix timestamp, inclusive.
    pub until: Option<i64>,
    pub limit: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogEntryResponse {
    pub sequence: u64,
    pub severity: Severity,
    pub operation: String,
    pub message: String,
    pub payer_id: Option<Uuid>,
    pub creator_id: Option<Uuid>,
    pub transaction_id: Option<Uuid>,
    pub payout_id: Option<Uuid>,
    pub failover_id: Option<Uuid>,
    pub metadata: serde_json::Value,
    pub timestamp: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeverityCounts {
    pub debug: u64,
    pub info: u64,
    pub warn: u64,
    pub error: u64,
    pub critical: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogSummaryResponse {
    pub total: u64,
    pub capacity: u64,
    pub by_severity: SeverityCounts,
    pub errors_last_24h: u64,
    pub critical_last_24h: u64,
    pub oldest_at: Option<i64>,
}

// ---------------------------------------------------------------------------
// Reports
// ---------------------------------------------------------------------------

/// Fee invariant check of a single transaction row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IntegrityCheckResponse {
    pub transaction_id: Uuid,
    pub passed: bool,
    pub fault: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IntegrityDiscrepancy {
    pub transaction_id: Uuid,
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReconciliationReportResponse {
    pub generated_at: i64,
    pub transaction_count: u64,
    pub total_collected: i64,
    pub creator_earnings: i64,
    pub platform_earnings: i64,
    pub discrepancies: Vec<IntegrityDiscrepancy>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PayoutDiscrepancyResponse {
    pub payout_id: Uuid,
    pub kind: String,
    pub detail: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PayoutIntegrityReportResponse {
    pub generated_at: i64,
    pub checked: u64,
    pub discrepancies: Vec<PayoutDiscrepancyResponse>,
}

// ---------------------------------------------------------------------------
// Scheduled tasks
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ScheduledTask {
    MonthlyTierRecalculation,
    DailyBatchPayouts,
    WeeklyReconciliation,
    FailoverSweep,
}

impl ScheduledTask {
    pub const ALL: [ScheduledTask; 4] = [
        ScheduledTask::MonthlyTierRecalculation,
        ScheduledTask::DailyBatchPayouts,
        ScheduledTask::WeeklyReconciliation,
        ScheduledTask::FailoverSweep,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ScheduledTask::MonthlyTierRecalculation => "monthly-tier-recalculation",
            ScheduledTask::DailyBatchPayouts => "daily-batch-payouts",
            ScheduledTask::WeeklyReconciliation => "weekly-reconciliation",
            ScheduledTask::FailoverSweep => "failover-sweep",
        }
    }
}

impl std::fmt::Display for ScheduledTask {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskOutcome {
    Completed,
    Skipped,
    Failed,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskRunResponse {
    pub task: ScheduledTask,
    pub outcome: TaskOutcome,
    pub duration_ms: u64,
    pub summary: Option<String>,
    pub error: Option<ErrorBody>,
}

// ---------------------------------------------------------------------------
// Pagination
// ---------------------------------------------------------------------------

const DEFAULT_LIMIT: u32 = 100;

/// Clamp a requested result count to `1..=max`, defaulting when absent.
pub fn clamp_limit(limit: Option<u32>, max: u32) -> u32 {
    limit.unwrap_or(DEFAULT_LIMIT).clamp(1, max.max(1))
}
