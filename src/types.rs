//! Shared types for the gauge trading agent.
//!
//! These types form the data model used across all modules.
//! They are designed to be stable so that publisher, strategy,
//! and engine modules can depend on them without circular references.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

// ---------------------------------------------------------------------------
// Gauge catalog
// ---------------------------------------------------------------------------

/// A reward gauge candidate, snapshotted once per cycle.
///
/// Created by the catalog fetcher and read-only from then on.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GaugeRecord {
    /// Chain identifier, e.g. "ethereum" or "arbitrum".
    pub chain: String,
    /// On-chain gauge contract address.
    pub address: String,
    /// Identifier of the pool the gauge rewards.
    pub pool: String,
    /// Token the gauge pays rewards in.
    pub reward_token: String,
    /// Estimated reward APR as a fraction (0.09 = 9%).
    pub reward_apr: Decimal,
    /// Pool liquidity depth in USD.
    pub liquidity_usd: Decimal,
    /// Estimated entry slippage as a fraction.
    pub est_slippage: Decimal,
}

impl fmt::Display for GaugeRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}] {} (apr: {:.2}% | depth: ${:.0} | slip: {:.3}%)",
            self.chain,
            self.address,
            self.reward_apr * Decimal::ONE_HUNDRED,
            self.liquidity_usd,
            self.est_slippage * Decimal::ONE_HUNDRED,
        )
    }
}

/// A fully computed trade ready for preflight and (maybe) execution.
/// Never mutated after creation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TradeDecision {
    pub gauge: GaugeRecord,
    /// Token deposited into the pool, e.g. "USDC".
    pub deposit_token: String,
    /// Position size in USD after sizing caps.
    pub amount_usd: Decimal,
    /// Effective-yield score the selector ranked this gauge by.
    pub score: Decimal,
    /// Why this gauge won the cycle.
    pub rationale: String,
}

impl fmt::Display for TradeDecision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} -> {} (${:.2}, score={:.4})",
            self.gauge.chain, self.deposit_token, self.gauge.address, self.amount_usd, self.score,
        )
    }
}

// ---------------------------------------------------------------------------
// Signer
// ---------------------------------------------------------------------------

/// Signer mode selected by configuration. Closed set: local keypair
/// or hardware wallet with externally delegated signing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SignerMode {
    Local,
    Ledger,
}

impl fmt::Display for SignerMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SignerMode::Local => write!(f, "local"),
            SignerMode::Ledger => write!(f, "ledger"),
        }
    }
}

impl std::str::FromStr for SignerMode {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "local" => Ok(SignerMode::Local),
            "ledger" => Ok(SignerMode::Ledger),
            _ => Err(anyhow::anyhow!("Unknown signer mode: {s}")),
        }
    }
}

// ---------------------------------------------------------------------------
// Publisher binding
// ---------------------------------------------------------------------------

/// Probe state of a resolved RPC publisher.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProbeStatus {
    Unprobed,
    Ok,
    Failed,
}

impl fmt::Display for ProbeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProbeStatus::Unprobed => write!(f, "unprobed"),
            ProbeStatus::Ok => write!(f, "ok"),
            ProbeStatus::Failed => write!(f, "failed"),
        }
    }
}

/// Where a publisher slug came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PublisherSource {
    ConfigOverride,
    CatalogDiscovery,
}

/// Chain → publisher binding for one cycle. Publishers may rotate,
/// so bindings are never carried across cycles.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PublisherBinding {
    pub chain: String,
    pub publisher: String,
    pub source: PublisherSource,
    pub status: ProbeStatus,
    /// "METHOD /path" of the probe that succeeded, when one did.
    pub probe: Option<String>,
}

impl PublisherBinding {
    pub fn is_ok(&self) -> bool {
        self.status == ProbeStatus::Ok
    }
}

impl fmt::Display for PublisherBinding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} -> {} ({:?}, probe={})",
            self.chain, self.publisher, self.source, self.status,
        )
    }
}

// ---------------------------------------------------------------------------
// Cycle outcome
// ---------------------------------------------------------------------------

/// Pipeline stages in strict execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Stage {
    Fetching,
    Selecting,
    ProvisioningSigner,
    ResolvingPublisher,
    Preflighting,
    Guarding,
    Executing,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Stage::Fetching => write!(f, "fetching"),
            Stage::Selecting => write!(f, "selecting"),
            Stage::ProvisioningSigner => write!(f, "provisioning_signer"),
            Stage::ResolvingPublisher => write!(f, "resolving_publisher"),
            Stage::Preflighting => write!(f, "preflighting"),
            Stage::Guarding => write!(f, "guarding"),
            Stage::Executing => write!(f, "executing"),
        }
    }
}

/// Outcome reported by a single stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StageOutcome {
    Ok,
    Skip,
    Abort,
    Error,
}

/// Terminal classification of one full cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CycleStatus {
    Success,
    Skip,
    Abort,
    Error,
}

impl CycleStatus {
    /// Process exit code contract: zero on Success or Skip,
    /// non-zero on Abort or Error.
    pub fn exit_code(&self) -> u8 {
        match self {
            CycleStatus::Success | CycleStatus::Skip => 0,
            CycleStatus::Abort => 1,
            CycleStatus::Error => 2,
        }
    }
}

impl fmt::Display for CycleStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CycleStatus::Success => write!(f, "success"),
            CycleStatus::Skip => write!(f, "skip"),
            CycleStatus::Abort => write!(f, "abort"),
            CycleStatus::Error => write!(f, "error"),
        }
    }
}

/// Whether the cycle was allowed to move real funds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RunMode {
    DryRun,
    Live,
}

impl fmt::Display for RunMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunMode::DryRun => write!(f, "dry-run"),
            RunMode::Live => write!(f, "live"),
        }
    }
}

/// One stage's entry in the cycle log.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StageRecord {
    pub stage: Stage,
    pub outcome: StageOutcome,
    pub at: DateTime<Utc>,
    /// Error or rationale detail, when the stage produced one.
    pub detail: Option<String>,
}

impl StageRecord {
    pub fn ok(stage: Stage) -> Self {
        Self {
            stage,
            outcome: StageOutcome::Ok,
            at: Utc::now(),
            detail: None,
        }
    }

    pub fn with_detail(stage: Stage, outcome: StageOutcome, detail: impl Into<String>) -> Self {
        Self {
            stage,
            outcome,
            at: Utc::now(),
            detail: Some(detail.into()),
        }
    }
}

/// Complete record of a single cycle. Created fresh per cycle and
/// terminal once any stage reports Skip/Abort/Error or execution
/// completes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunResult {
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub mode: RunMode,
    pub status: CycleStatus,
    pub stages: Vec<StageRecord>,
    /// The trade the selector chose, when one cleared the threshold.
    pub decision: Option<TradeDecision>,
    /// Publisher binding used for the selected chain.
    pub binding: Option<PublisherBinding>,
    /// Raw preflight report (this doubles as the paper-trade record).
    pub preflight: Option<serde_json::Value>,
    /// Broadcast receipt, only present after live execution.
    pub broadcast: Option<serde_json::Value>,
    /// Error detail when status is Abort or Error.
    pub error: Option<String>,
}

impl RunResult {
    /// Stage that terminated the cycle (the last recorded stage).
    pub fn terminal_stage(&self) -> Option<Stage> {
        self.stages.last().map(|s| s.stage)
    }
}

impl fmt::Display for RunResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} [{}] stages={} error={}",
            self.status,
            self.mode,
            self.stages.len(),
            self.error.as_deref().unwrap_or("none"),
        )
    }
}

// ---------------------------------------------------------------------------
// Error taxonomy
// ---------------------------------------------------------------------------

/// Domain errors. Every variant maps to a distinct, observable
/// RunResult classification; nothing is silently swallowed.
#[derive(Debug, thiserror::Error)]
pub enum TraderError {
    /// Remote data-source failure. Surfaced to the orchestrator; retry
    /// is delegated to the next scheduled tick.
    #[error("connector error ({publisher}): {message}")]
    Connector { publisher: String, message: String },

    /// Publisher probe failed — fatal for the current cycle/chain only.
    #[error("no usable RPC publisher for chain '{chain}': {reason}")]
    UnsupportedChain { chain: String, reason: String },

    /// Simulated trade invalid. Abort, no in-cycle retry.
    #[error("preflight failed: {0}")]
    Preflight(String),

    /// Configured signer mode cannot produce a usable signer.
    #[error("signer unusable ({mode}): {reason}")]
    SignerCapability { mode: SignerMode, reason: String },

    /// Broadcast was attempted and failed. The trade intent had
    /// real-world effect, so this is flagged for manual review.
    #[error("broadcast failed (manual review required): {0}")]
    Execution(String),

    #[error("configuration error: {0}")]
    Config(String),
}

impl TraderError {
    /// Terminal cycle classification for this error.
    /// Abort: probe/signer/preflight/config failures, before or instead
    /// of any irreversible action. Error: connector and execution
    /// failures.
    pub fn cycle_status(&self) -> CycleStatus {
        match self {
            TraderError::Connector { .. } | TraderError::Execution(_) => CycleStatus::Error,
            TraderError::UnsupportedChain { .. }
            | TraderError::Preflight(_)
            | TraderError::SignerCapability { .. }
            | TraderError::Config(_) => CycleStatus::Abort,
        }
    }

    /// Stage outcome corresponding to `cycle_status`.
    pub fn stage_outcome(&self) -> StageOutcome {
        match self.cycle_status() {
            CycleStatus::Error => StageOutcome::Error,
            _ => StageOutcome::Abort,
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn sample_gauge(address: &str, apr: Decimal, liquidity: Decimal) -> GaugeRecord {
        GaugeRecord {
            chain: "ethereum".to_string(),
            address: address.to_string(),
            pool: format!("pool-{address}"),
            reward_token: "CRV".to_string(),
            reward_apr: apr,
            liquidity_usd: liquidity,
            est_slippage: dec!(0.001),
        }
    }

    #[test]
    fn test_signer_mode_from_str() {
        assert_eq!("local".parse::<SignerMode>().unwrap(), SignerMode::Local);
        assert_eq!("LEDGER".parse::<SignerMode>().unwrap(), SignerMode::Ledger);
        assert!("trezor".parse::<SignerMode>().is_err());
    }

    #[test]
    fn test_signer_mode_serialization_roundtrip() {
        for mode in [SignerMode::Local, SignerMode::Ledger] {
            let json = serde_json::to_string(&mode).unwrap();
            let parsed: SignerMode = serde_json::from_str(&json).unwrap();
            assert_eq!(mode, parsed);
        }
        assert_eq!(serde_json::to_string(&SignerMode::Local).unwrap(), "\"local\"");
    }

    #[test]
    fn test_probe_status_display() {
        assert_eq!(format!("{}", ProbeStatus::Unprobed), "unprobed");
        assert_eq!(format!("{}", ProbeStatus::Ok), "ok");
        assert_eq!(format!("{}", ProbeStatus::Failed), "failed");
    }

    #[test]
    fn test_binding_is_ok() {
        let mut binding = PublisherBinding {
            chain: "ethereum".to_string(),
            publisher: "seren-eth".to_string(),
            source: PublisherSource::CatalogDiscovery,
            status: ProbeStatus::Unprobed,
            probe: None,
        };
        assert!(!binding.is_ok());
        binding.status = ProbeStatus::Ok;
        assert!(binding.is_ok());
        binding.status = ProbeStatus::Failed;
        assert!(!binding.is_ok());
    }

    #[test]
    fn test_cycle_status_exit_codes() {
        assert_eq!(CycleStatus::Success.exit_code(), 0);
        assert_eq!(CycleStatus::Skip.exit_code(), 0);
        assert_eq!(CycleStatus::Abort.exit_code(), 1);
        assert_eq!(CycleStatus::Error.exit_code(), 2);
    }

    #[test]
    fn test_error_cycle_status_mapping() {
        let connector = TraderError::Connector {
            publisher: "curve-finance".to_string(),
            message: "timeout".to_string(),
        };
        assert_eq!(connector.cycle_status(), CycleStatus::Error);
        assert_eq!(connector.stage_outcome(), StageOutcome::Error);

        let chain = TraderError::UnsupportedChain {
            chain: "scroll".to_string(),
            reason: "all probes failed".to_string(),
        };
        assert_eq!(chain.cycle_status(), CycleStatus::Abort);
        assert_eq!(chain.stage_outcome(), StageOutcome::Abort);

        assert_eq!(
            TraderError::Preflight("revert".to_string()).cycle_status(),
            CycleStatus::Abort
        );
        let signer = TraderError::SignerCapability {
            mode: SignerMode::Local,
            reason: "wallet file missing".to_string(),
        };
        assert_eq!(signer.cycle_status(), CycleStatus::Abort);
        assert_eq!(
            TraderError::Execution("rpc 500".to_string()).cycle_status(),
            CycleStatus::Error
        );
    }

    #[test]
    fn test_error_display() {
        let e = TraderError::UnsupportedChain {
            chain: "base".to_string(),
            reason: "probe timed out".to_string(),
        };
        let msg = format!("{e}");
        assert!(msg.contains("base"));
        assert!(msg.contains("probe timed out"));

        let e = TraderError::Execution("nonce too low".to_string());
        assert!(format!("{e}").contains("manual review"));
    }

    #[test]
    fn test_gauge_record_display() {
        let gauge = sample_gauge("0xabc", dec!(0.12), dec!(50000));
        let display = format!("{gauge}");
        assert!(display.contains("ethereum"));
        assert!(display.contains("0xabc"));
    }

    #[test]
    fn test_gauge_record_serialization_roundtrip() {
        let gauge = sample_gauge("0xdef", dec!(0.09), dec!(120000));
        let json = serde_json::to_string(&gauge).unwrap();
        let parsed: GaugeRecord = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.address, "0xdef");
        assert_eq!(parsed.reward_apr, dec!(0.09));
    }

    #[test]
    fn test_run_result_terminal_stage() {
        let mut result = RunResult {
            started_at: Utc::now(),
            finished_at: Utc::now(),
            mode: RunMode::DryRun,
            status: CycleStatus::Abort,
            stages: vec![
                StageRecord::ok(Stage::Fetching),
                StageRecord::ok(Stage::Selecting),
                StageRecord::with_detail(
                    Stage::ResolvingPublisher,
                    StageOutcome::Abort,
                    "probe failed",
                ),
            ],
            decision: None,
            binding: None,
            preflight: None,
            broadcast: None,
            error: Some("probe failed".to_string()),
        };
        assert_eq!(result.terminal_stage(), Some(Stage::ResolvingPublisher));
        result.stages.clear();
        assert_eq!(result.terminal_stage(), None);
    }

    #[test]
    fn test_run_result_serialization_roundtrip() {
        let result = RunResult {
            started_at: Utc::now(),
            finished_at: Utc::now(),
            mode: RunMode::Live,
            status: CycleStatus::Success,
            stages: vec![StageRecord::ok(Stage::Executing)],
            decision: None,
            binding: None,
            preflight: Some(serde_json::json!({"status": "ok"})),
            broadcast: Some(serde_json::json!({"tx_hash": "0x1"})),
            error: None,
        };
        let json = serde_json::to_string(&result).unwrap();
        let parsed: RunResult = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.status, CycleStatus::Success);
        assert_eq!(parsed.mode, RunMode::Live);
        assert_eq!(parsed.stages.len(), 1);
    }
}
