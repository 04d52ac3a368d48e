//! Execution connector.
//!
//! All chain-touching operations (preflight simulation, broadcast,
//! position sync) go through one trait so the orchestrator never talks
//! to the wire directly. The production implementation delegates to
//! the execution publisher through the gateway.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{debug, info};

use crate::publisher::PublisherGateway;
use crate::signer::SignerHandle;
use crate::types::{TradeDecision, TraderError};

/// Publisher executing on-chain liquidity operations.
const EXEC_PUBLISHER: &str = "evm-exec";

const PREFLIGHT_PATH: &str = "/preflight/liquidity";
const TRADE_PATH: &str = "/trade/liquidity";

/// The single action this agent performs on-chain.
const TRADE_ACTION: &str = "add_liquidity_to_curve_gauge";

// ---------------------------------------------------------------------------
// Reports
// ---------------------------------------------------------------------------

/// Result of simulating the planned trade against current chain state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PreflightReport {
    /// Simulation reverted.
    #[serde(default)]
    pub reverted: bool,
    /// Estimated gas for the real transaction.
    #[serde(default)]
    pub gas_estimate: u64,
    /// Publisher-supplied diagnostic, if any.
    #[serde(default)]
    pub detail: Option<String>,
}

impl PreflightReport {
    /// Passes when the simulation completed without revert and the gas
    /// estimate stays within the configured ceiling.
    pub fn ok(&self, max_gas_estimate: u64) -> bool {
        !self.reverted && self.gas_estimate <= max_gas_estimate
    }

    pub fn failure_reason(&self, max_gas_estimate: u64) -> Option<String> {
        if self.reverted {
            return Some(format!(
                "simulation reverted{}",
                self.detail
                    .as_deref()
                    .map(|d| format!(": {d}"))
                    .unwrap_or_default()
            ));
        }
        if self.gas_estimate > max_gas_estimate {
            return Some(format!(
                "gas estimate {} exceeds ceiling {}",
                self.gas_estimate, max_gas_estimate
            ));
        }
        None
    }
}

/// Receipt for a broadcast trade.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BroadcastReceipt {
    #[serde(default)]
    pub tx_hash: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(flatten)]
    pub extra: Value,
}

// ---------------------------------------------------------------------------
// Connector trait
// ---------------------------------------------------------------------------

/// Chain execution seam. Preflight is read-only simulation; broadcast
/// submits the real transaction and must only ever be called behind
/// the live guard.
#[async_trait]
pub trait ExecutionConnector: Send + Sync {
    async fn preflight(
        &self,
        decision: &TradeDecision,
        signer: &SignerHandle,
    ) -> Result<PreflightReport, TraderError>;

    async fn broadcast(
        &self,
        decision: &TradeDecision,
        signer: &SignerHandle,
    ) -> Result<BroadcastReceipt, TraderError>;

    /// Push the agent's position book to the tracking endpoint.
    async fn sync_positions(&self, positions: &Value) -> Result<(), TraderError>;
}

// ---------------------------------------------------------------------------
// Publisher-backed connector
// ---------------------------------------------------------------------------

pub struct EvmExecConnector<'a> {
    gateway: &'a dyn PublisherGateway,
    position_sync_path: String,
}

impl<'a> EvmExecConnector<'a> {
    pub fn new(gateway: &'a dyn PublisherGateway, position_sync_path: String) -> Self {
        Self {
            gateway,
            position_sync_path,
        }
    }

    fn trade_plan(decision: &TradeDecision, signer: &SignerHandle) -> Value {
        json!({
            "chain": decision.gauge.chain,
            "action": TRADE_ACTION,
            "signer_mode": signer.mode().to_string(),
            "signer_address": signer.address(),
            "trade_plan": {
                "gauge_address": decision.gauge.address,
                "pool": decision.gauge.pool,
                "deposit_token": decision.deposit_token,
                "amount_usd": decision.amount_usd,
                "reward_token": decision.gauge.reward_token,
            },
        })
    }
}

#[async_trait]
impl ExecutionConnector for EvmExecConnector<'_> {
    async fn preflight(
        &self,
        decision: &TradeDecision,
        signer: &SignerHandle,
    ) -> Result<PreflightReport, TraderError> {
        let body = Self::trade_plan(decision, signer);
        debug!(gauge = %decision.gauge.address, "Running preflight simulation");
        let payload = self
            .gateway
            .call(EXEC_PUBLISHER, "POST", PREFLIGHT_PATH, &body)
            .await?;
        let report: PreflightReport =
            serde_json::from_value(payload).map_err(|e| TraderError::Connector {
                publisher: EXEC_PUBLISHER.to_string(),
                message: format!("Invalid preflight response: {e}"),
            })?;
        info!(
            reverted = report.reverted,
            gas_estimate = report.gas_estimate,
            "Preflight complete"
        );
        Ok(report)
    }

    async fn broadcast(
        &self,
        decision: &TradeDecision,
        signer: &SignerHandle,
    ) -> Result<BroadcastReceipt, TraderError> {
        let body = Self::trade_plan(decision, signer);
        info!(
            gauge = %decision.gauge.address,
            amount_usd = %decision.amount_usd,
            "Broadcasting live trade"
        );
        let payload = self
            .gateway
            .call(EXEC_PUBLISHER, "POST", TRADE_PATH, &body)
            .await
            .map_err(|e| TraderError::Execution(e.to_string()))?;
        let receipt: BroadcastReceipt =
            serde_json::from_value(payload).map_err(|e| TraderError::Execution(format!(
                "Invalid broadcast response: {e}"
            )))?;
        info!(tx_hash = ?receipt.tx_hash, "Trade broadcast");
        Ok(receipt)
    }

    async fn sync_positions(&self, positions: &Value) -> Result<(), TraderError> {
        self.gateway
            .call(EXEC_PUBLISHER, "POST", &self.position_sync_path, positions)
            .await?;
        debug!("Position book synced");
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
