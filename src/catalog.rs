//! Gauge catalog fetching.
//!
//! Retrieves candidate reward gauges from the gauge-data publisher.
//! Failures are surfaced to the orchestrator as `Connector` errors and
//! never retried here — the next scheduled tick is the retry.

use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, info, warn};

use crate::publisher::PublisherGateway;
use crate::types::{GaugeRecord, TraderError};

/// Publisher serving gauge reward data.
const GAUGE_PUBLISHER: &str = "curve-finance";

/// Endpoint returning gauges ranked by reward rate.
const HIGHEST_REWARDS_PATH: &str = "/gauges/highest-rewards";

// ---------------------------------------------------------------------------
// Source trait
// ---------------------------------------------------------------------------

/// Source of gauge candidates for one cycle.
#[async_trait]
pub trait GaugeSource: Send + Sync {
    /// Fetch up to `limit` candidate gauges per chain, in catalog order.
    /// An empty result is a valid outcome (the cycle will Skip).
    async fn fetch_gauges(
        &self,
        chains: &[String],
        limit: u32,
    ) -> Result<Vec<GaugeRecord>, TraderError>;
}

// ---------------------------------------------------------------------------
// Wire format
// ---------------------------------------------------------------------------

/// One gauge as returned by the publisher. Field names vary slightly
/// between catalog versions, hence the aliases and defaults.
#[derive(Debug, Deserialize)]
struct WireGauge {
    address: String,
    #[serde(default)]
    pool: Option<String>,
    #[serde(default)]
    reward_token: Option<String>,
    #[serde(default, alias = "apr")]
    reward_apy: Option<Decimal>,
    #[serde(default, alias = "tvl_usd")]
    liquidity_usd: Option<Decimal>,
    #[serde(default)]
    est_slippage: Option<Decimal>,
}

#[derive(Debug, Deserialize)]
struct GaugesResponse {
    #[serde(default)]
    gauges: Vec<WireGauge>,
}

// ---------------------------------------------------------------------------
// HTTP fetcher
// ---------------------------------------------------------------------------

/// Fetches gauges from the gauge-data publisher through the gateway.
pub struct GaugeCatalogFetcher<'a> {
    gateway: &'a dyn PublisherGateway,
}

impl<'a> GaugeCatalogFetcher<'a> {
    pub fn new(gateway: &'a dyn PublisherGateway) -> Self {
        Self { gateway }
    }
}

#[async_trait]
impl GaugeSource for GaugeCatalogFetcher<'_> {
    async fn fetch_gauges(
        &self,
        chains: &[String],
        limit: u32,
    ) -> Result<Vec<GaugeRecord>, TraderError> {
        let mut records = Vec::new();

        for chain in chains {
            let body = json!({ "chain": chain, "limit": limit });
            let payload = self
                .gateway
                .call(GAUGE_PUBLISHER, "GET", HIGHEST_REWARDS_PATH, &body)
                .await?;

            let response: GaugesResponse =
                serde_json::from_value(payload).map_err(|e| TraderError::Connector {
                    publisher: GAUGE_PUBLISHER.to_string(),
                    message: format!("Invalid gauges response for chain '{chain}': {e}"),
                })?;

            let mut parsed = 0usize;
            for gauge in response.gauges {
                let Some(apr) = gauge.reward_apy else {
                    warn!(chain, address = %gauge.address, "Gauge missing reward rate, skipping");
                    continue;
                };
                let Some(liquidity) = gauge.liquidity_usd else {
                    warn!(chain, address = %gauge.address, "Gauge missing liquidity, skipping");
                    continue;
                };
                records.push(GaugeRecord {
                    chain: chain.clone(),
                    address: gauge.address,
                    pool: gauge.pool.unwrap_or_default(),
                    reward_token: gauge.reward_token.unwrap_or_else(|| "CRV".to_string()),
                    reward_apr: apr,
                    liquidity_usd: liquidity,
                    est_slippage: gauge.est_slippage.unwrap_or(Decimal::ZERO),
                });
                parsed += 1;
            }
            debug!(chain, count = parsed, "Gauges fetched");
        }

        info!(total = records.len(), chains = chains.len(), "Gauge catalog snapshot complete");
        Ok(records)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
