//! Configuration loading from TOML with environment variable resolution.
//!
//! Reads `config.toml` and deserializes into strongly-typed structs.
//! Secrets (the gateway API key) are referenced by env-var name in the
//! config and resolved at runtime via `std::env::var`. The config is
//! loaded once and treated as immutable for the duration of a cycle.

use anyhow::{Context, Result};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::Deserialize;
use std::collections::HashMap;
use std::fs;

use crate::types::SignerMode;

/// Chains the agent knows how to trade on. Config values outside this
/// set are rejected at load time rather than failing mid-cycle.
pub const SUPPORTED_CHAINS: &[&str] = &[
    "ethereum",
    "arbitrum",
    "base",
    "optimism",
    "polygon",
    "avalanche",
    "bsc",
    "gnosis",
    "zksync",
    "scroll",
];

/// Top-level application configuration.
#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    pub agent: AgentConfig,
    pub api: ApiConfig,
    pub wallet: WalletConfig,
    pub selection: SelectionConfig,
    pub preflight: PreflightConfig,
    #[serde(default)]
    pub probe: ProbeConfig,
    /// Chain → publisher-slug override mapping. Consulted before the
    /// live catalog when resolving an RPC publisher.
    #[serde(default)]
    pub rpc_publishers: HashMap<String, String>,
    #[serde(default)]
    pub position_sync: PositionSyncConfig,
    #[serde(default)]
    pub scheduler: SchedulerConfig,
    #[serde(default)]
    pub storage: StorageConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct AgentConfig {
    pub name: String,
    /// Chains the catalog fetcher is allowed to consider.
    pub chains: Vec<String>,
    pub wallet_mode: SignerMode,
    /// Permits real on-chain execution, subject to the additional
    /// explicit `--yes-live` authorization flag.
    #[serde(default)]
    pub live_mode: bool,
    pub deposit_token: String,
    pub deposit_amount_usd: Decimal,
    /// How many top gauges to request from the catalog per chain.
    #[serde(default = "default_top_n")]
    pub top_n_gauges: u32,
}

fn default_top_n() -> u32 {
    3
}

#[derive(Debug, Deserialize, Clone)]
pub struct ApiConfig {
    /// Publisher gateway base URL.
    pub base_url: String,
    /// Env var holding the gateway API key.
    pub api_key_env: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct WalletConfig {
    /// Path to the local wallet state file (wallet_mode = "local").
    pub path: String,
    /// Hardware wallet address (wallet_mode = "ledger").
    #[serde(default)]
    pub ledger_address: Option<String>,
}

/// Gauge selection and position sizing parameters.
#[derive(Debug, Deserialize, Clone)]
pub struct SelectionConfig {
    /// Gauges with less liquidity than this are discarded outright.
    pub min_liquidity_usd: Decimal,
    /// Liquidity at which the depth factor reaches 0.5. Deeper pools
    /// asymptotically approach the raw APR.
    #[serde(default = "default_depth_half_life")]
    pub depth_half_life_usd: Decimal,
    /// Cap on position size as a fraction of pool liquidity.
    #[serde(default = "default_max_pool_share")]
    pub max_pool_share: Decimal,
}

fn default_depth_half_life() -> Decimal {
    dec!(100000)
}

fn default_max_pool_share() -> Decimal {
    dec!(0.01)
}

#[derive(Debug, Deserialize, Clone)]
pub struct PreflightConfig {
    /// Preflight fails when the simulated gas estimate exceeds this.
    pub max_gas_estimate: u64,
}

/// RPC capability probe configuration.
#[derive(Debug, Deserialize, Clone)]
pub struct ProbeConfig {
    /// When false, a failed probe downgrades to a warning instead of
    /// aborting the cycle.
    #[serde(default = "default_true")]
    pub required: bool,
    /// Ordered probe attempts; the first success marks the binding ok.
    /// Empty means the built-in default probes are used.
    #[serde(default)]
    pub probes: Vec<ProbeSpec>,
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self {
            required: true,
            probes: Vec::new(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct ProbeSpec {
    pub method: String,
    pub path: String,
    #[serde(default)]
    pub body: serde_json::Value,
}

#[derive(Debug, Deserialize, Clone)]
pub struct PositionSyncConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_sync_path")]
    pub path: String,
}

impl Default for PositionSyncConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            path: default_sync_path(),
        }
    }
}

fn default_sync_path() -> String {
    "/positions/update".to_string()
}

/// What to do with a scheduler tick that arrives mid-cycle.
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum OverlapPolicy {
    /// Reject the tick; the in-flight cycle keeps running.
    Drop,
    /// Wait for the in-flight cycle, then run.
    Queue,
}

#[derive(Debug, Deserialize, Clone)]
pub struct SchedulerConfig {
    #[serde(default = "default_overlap")]
    pub overlap: OverlapPolicy,
    /// Port for the HTTP trigger server.
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            overlap: default_overlap(),
            port: default_port(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct StorageConfig {
    /// Where the run-history JSON lives.
    #[serde(default = "default_history_path")]
    pub history_path: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            history_path: default_history_path(),
        }
    }
}

fn default_history_path() -> String {
    "state/runs.json".to_string()
}

fn default_overlap() -> OverlapPolicy {
    OverlapPolicy::Drop
}

fn default_port() -> u16 {
    8080
}

fn default_true() -> bool {
    true
}

impl AppConfig {
    /// Load configuration from a TOML file and validate it.
    pub fn load(path: &str) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {path}"))?;
        let config: AppConfig = toml::from_str(&contents)
            .with_context(|| format!("Failed to parse config file: {path}"))?;
        config.validate()?;
        Ok(config)
    }

    /// Validate cross-field invariants that serde can't express.
    pub fn validate(&self) -> Result<()> {
        if self.agent.chains.is_empty() {
            anyhow::bail!("agent.chains must list at least one chain");
        }
        for chain in &self.agent.chains {
            if !SUPPORTED_CHAINS.contains(&chain.as_str()) {
                anyhow::bail!("Unsupported chain '{chain}' in agent.chains");
            }
        }
        for (chain, slug) in &self.rpc_publishers {
            if !SUPPORTED_CHAINS.contains(&chain.as_str()) {
                anyhow::bail!("rpc_publishers has unsupported chain key '{chain}'");
            }
            if slug.trim().is_empty() {
                anyhow::bail!("rpc_publishers['{chain}'] must be a non-empty slug");
            }
        }
        if self.agent.deposit_amount_usd <= Decimal::ZERO {
            anyhow::bail!("agent.deposit_amount_usd must be > 0");
        }
        if self.agent.top_n_gauges < 1 {
            anyhow::bail!("agent.top_n_gauges must be >= 1");
        }
        for (index, probe) in self.probe.probes.iter().enumerate() {
            let method = probe.method.to_uppercase();
            if !matches!(method.as_str(), "GET" | "POST" | "PUT" | "PATCH" | "DELETE") {
                anyhow::bail!("probe.probes[{index}].method '{}' is not supported", probe.method);
            }
            if !probe.path.starts_with('/') {
                anyhow::bail!("probe.probes[{index}].path must start with '/'");
            }
        }
        if !self.position_sync.path.starts_with('/') {
            anyhow::bail!("position_sync.path must start with '/'");
        }
        Ok(())
    }

    /// Resolve an environment variable name to its value.
    /// Useful for loading secrets referenced in the config.
    pub fn resolve_env(env_name: &str) -> Result<String> {
        std::env::var(env_name)
            .with_context(|| format!("Environment variable not set: {env_name}"))
    }
}
