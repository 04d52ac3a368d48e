//! Trade-cycle orchestrator.
//!
//! Runs one cycle through the fixed stage order: fetch, select,
//! provision signer, resolve publisher, preflight, guard, execute.
//! Stages short-circuit strictly: a Skip/Abort/Error terminates the
//! cycle and no later stage runs. A cycle never touches more than one
//! gauge, and broadcast only happens behind an Execute verdict from
//! the live guard.

use chrono::Utc;
use serde_json::json;
use std::path::Path;
use tracing::{error, info, warn};

use crate::catalog::GaugeSource;
use crate::config::AppConfig;
use crate::connector::ExecutionConnector;
use crate::engine::guard::{self, GuardDecision, GuardInputs};
use crate::publisher::resolver::PublisherResolver;
use crate::publisher::PublisherGateway;
use crate::signer;
use crate::strategy::GaugeSelector;
use crate::types::{
    CycleStatus, ProbeStatus, RunMode, RunResult, Stage, StageOutcome, StageRecord, TradeDecision,
    TraderError,
};

pub struct RunCycleOrchestrator<'a> {
    config: &'a AppConfig,
    gauges: &'a dyn GaugeSource,
    gateway: &'a dyn PublisherGateway,
    connector: &'a dyn ExecutionConnector,
    /// Out-of-config operator authorization for live trading.
    live_authorized: bool,
}

impl<'a> RunCycleOrchestrator<'a> {
    pub fn new(
        config: &'a AppConfig,
        gauges: &'a dyn GaugeSource,
        gateway: &'a dyn PublisherGateway,
        connector: &'a dyn ExecutionConnector,
        live_authorized: bool,
    ) -> Self {
        Self {
            config,
            gauges,
            gateway,
            connector,
            live_authorized,
        }
    }

    /// Run one complete cycle. Failures are folded into the returned
    /// `RunResult`; this never panics and never returns early without
    /// a terminal classification.
    pub async fn run_cycle(&self) -> RunResult {
        let started_at = Utc::now();
        let mut result = RunResult {
            started_at,
            finished_at: started_at,
            mode: RunMode::DryRun,
            status: CycleStatus::Success,
            stages: Vec::new(),
            decision: None,
            binding: None,
            preflight: None,
            broadcast: None,
            error: None,
        };

        info!(agent = %self.config.agent.name, "Cycle started");
        self.run_stages(&mut result).await;
        result.finished_at = Utc::now();
        info!(
            status = %result.status,
            mode = %result.mode,
            stages = result.stages.len(),
            "Cycle finished"
        );
        result
    }

    async fn run_stages(&self, result: &mut RunResult) {
        // ---- fetch ----
        let candidates = match self
            .gauges
            .fetch_gauges(&self.config.agent.chains, self.config.agent.top_n_gauges)
            .await
        {
            Ok(candidates) => {
                result.stages.push(StageRecord::ok(Stage::Fetching));
                candidates
            }
            Err(e) => return fail(result, Stage::Fetching, e),
        };

        // ---- select ----
        let selector = GaugeSelector::new(
            self.config.selection.clone(),
            self.config.agent.deposit_token.clone(),
            self.config.agent.deposit_amount_usd,
        );
        let Some(decision) = selector.select(&candidates) else {
            result.stages.push(StageRecord::with_detail(
                Stage::Selecting,
                StageOutcome::Skip,
                "no gauge cleared the selection threshold",
            ));
            result.status = CycleStatus::Skip;
            return;
        };
        result.stages.push(StageRecord::ok(Stage::Selecting));
        info!(gauge = %decision.gauge.address, chain = %decision.gauge.chain, "Trade decision made");
        result.decision = Some(decision.clone());

        // ---- provision signer ----
        let signer = match signer::provision(
            self.config.agent.wallet_mode,
            Path::new(&self.config.wallet.path),
            self.config.wallet.ledger_address.as_deref(),
        ) {
            Ok(signer) => {
                result.stages.push(StageRecord::ok(Stage::ProvisioningSigner));
                signer
            }
            Err(e) => return fail(result, Stage::ProvisioningSigner, e),
        };

        // ---- resolve publisher ----
        let resolver = PublisherResolver::new(
            self.gateway,
            &self.config.rpc_publishers,
            &self.config.probe,
        );
        let binding = match resolver.resolve_and_probe(&decision.gauge.chain).await {
            Ok(binding) => {
                result.stages.push(StageRecord::ok(Stage::ResolvingPublisher));
                binding
            }
            Err(e) => return fail(result, Stage::ResolvingPublisher, e),
        };
        let probe_ok = binding.status == ProbeStatus::Ok;
        result.binding = Some(binding);

        // ---- preflight ----
        let report = match self.connector.preflight(&decision, &signer).await {
            Ok(report) => report,
            Err(e) => return fail(result, Stage::Preflighting, e),
        };
        result.preflight = serde_json::to_value(&report).ok();
        if let Some(reason) = report.failure_reason(self.config.preflight.max_gas_estimate) {
            return fail(result, Stage::Preflighting, TraderError::Preflight(reason));
        }
        result.stages.push(StageRecord::ok(Stage::Preflighting));

        // ---- guard ----
        let verdict = guard::evaluate(GuardInputs {
            live_mode: self.config.agent.live_mode,
            live_authorized: self.live_authorized,
            probe_ok,
            preflight_ok: true,
            can_sign: signer.can_sign(),
        });
        result.stages.push(StageRecord::with_detail(
            Stage::Guarding,
            StageOutcome::Ok,
            match verdict {
                GuardDecision::Execute => "execute",
                GuardDecision::DryRunOnly => "dry-run only",
            },
        ));

        // ---- execute ----
        match verdict {
            GuardDecision::DryRunOnly => {
                result.mode = RunMode::DryRun;
                result.stages.push(StageRecord::with_detail(
                    Stage::Executing,
                    StageOutcome::Ok,
                    "paper trade recorded",
                ));
                info!(
                    gauge = %decision.gauge.address,
                    amount_usd = %decision.amount_usd,
                    "Dry-run: trade recorded without broadcast"
                );
                if let Err(e) = self.sync_positions(&decision, "dry-run", None).await {
                    warn!(error = %e, "Position sync failed (dry-run)");
                }
            }
            GuardDecision::Execute => {
                result.mode = RunMode::Live;
                match self.connector.broadcast(&decision, &signer).await {
                    Ok(receipt) => {
                        let tx_hash = receipt.tx_hash.clone();
                        result.broadcast = serde_json::to_value(&receipt).ok();
                        // The broadcast landed; a failed sync leaves the
                        // position book out of step with the chain, so it
                        // escalates the cycle and is recorded as the
                        // terminal stage detail.
                        match self.sync_positions(&decision, "live", tx_hash.as_deref()).await {
                            Ok(()) => result.stages.push(StageRecord::ok(Stage::Executing)),
                            Err(e) => {
                                let detail = format!("position sync failed after broadcast: {e}");
                                error!(error = %e, "Position sync failed after live broadcast");
                                result.stages.push(StageRecord::with_detail(
                                    Stage::Executing,
                                    StageOutcome::Error,
                                    detail.clone(),
                                ));
                                result.status = CycleStatus::Error;
                                result.error = Some(detail);
                            }
                        }
                    }
                    Err(e) => return fail(result, Stage::Executing, e),
                }
            }
        }
    }

    /// Push the cycle's position to the tracking endpoint. No-op when
    /// sync is disabled; the caller decides how a failure classifies
    /// the cycle.
    async fn sync_positions(
        &self,
        decision: &TradeDecision,
        mode: &str,
        tx_hash: Option<&str>,
    ) -> Result<(), TraderError> {
        if !self.config.position_sync.enabled {
            return Ok(());
        }
        let positions = json!({
            "positions": [{
                "chain": decision.gauge.chain,
                "gauge_address": decision.gauge.address,
                "deposit_token": decision.deposit_token,
                "amount_usd": decision.amount_usd,
                "mode": mode,
                "tx_hash": tx_hash,
            }],
        });
        self.connector.sync_positions(&positions).await
    }
}

/// Record the terminal stage and classify the cycle from the error.
fn fail(result: &mut RunResult, stage: Stage, err: TraderError) {
    error!(stage = %stage, error = %err, "Stage failed");
    result
        .stages
        .push(StageRecord::with_detail(stage, err.stage_outcome(), err.to_string()));
    result.status = err.cycle_status();
    result.error = Some(err.to_string());
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
