//! Mock publisher gateway for integration testing.
//!
//! Provides a deterministic `PublisherGateway` implementation that
//! serves gauge data, probe responses, preflight reports, and trade
//! receipts — all in-memory with no external dependencies. Every call
//! is recorded so tests can assert stage ordering.

use async_trait::async_trait;
use serde_json::{json, Value};
use std::sync::{Arc, Mutex};

use gauge_trader::publisher::{PublisherGateway, PublisherInfo};
use gauge_trader::types::TraderError;

/// One recorded gateway call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallRecord {
    pub publisher: String,
    pub method: String,
    pub path: String,
}

/// A mock gateway for deterministic testing.
///
/// All state is in-memory. Gauge payloads, probe health, preflight
/// reports, and broadcast receipts are fully controllable from test
/// code.
pub struct MockGateway {
    gauges: Mutex<Value>,
    probe_healthy: Mutex<bool>,
    preflight: Mutex<Value>,
    broadcast: Mutex<Value>,
    calls: Arc<Mutex<Vec<CallRecord>>>,
    /// If set, all operations will return this error.
    force_error: Mutex<Option<String>>,
}

impl MockGateway {
    /// Gateway with a healthy probe, one rich gauge, and a passing
    /// preflight.
    pub fn healthy() -> Self {
        Self {
            gauges: Mutex::new(Self::default_gauges()),
            probe_healthy: Mutex::new(true),
            preflight: Mutex::new(json!({ "reverted": false, "gas_estimate": 180000 })),
            broadcast: Mutex::new(json!({ "tx_hash": "0xfeed", "status": "submitted" })),
            calls: Arc::new(Mutex::new(Vec::new())),
            force_error: Mutex::new(None),
        }
    }

    pub fn set_gauges(&self, gauges: Value) {
        *self.gauges.lock().unwrap() = gauges;
    }

    pub fn set_probe_healthy(&self, healthy: bool) {
        *self.probe_healthy.lock().unwrap() = healthy;
    }

    pub fn set_preflight(&self, report: Value) {
        *self.preflight.lock().unwrap() = report;
    }

    /// Force all subsequent operations to return an error.
    pub fn set_error(&self, msg: &str) {
        *self.force_error.lock().unwrap() = Some(msg.to_string());
    }

    /// All calls recorded so far.
    pub fn recorded_calls(&self) -> Vec<CallRecord> {
        self.calls.lock().unwrap().clone()
    }

    /// Paths of recorded calls, in order.
    pub fn called_paths(&self) -> Vec<String> {
        self.recorded_calls().into_iter().map(|c| c.path).collect()
    }

    fn default_gauges() -> Value {
        json!({
            "gauges": [
                {
                    "address": "0xdeepgauge",
                    "pool": "3pool",
                    "reward_token": "CRV",
                    "reward_apy": 0.11,
                    "liquidity_usd": 800000.0,
                    "est_slippage": 0.001
                },
                {
                    "address": "0xthingauge",
                    "pool": "meta",
                    "reward_token": "CRV",
                    "reward_apy": 0.30,
                    "liquidity_usd": 5000.0,
                    "est_slippage": 0.02
                }
            ]
        })
    }
}

#[async_trait]
impl PublisherGateway for MockGateway {
    async fn call(
        &self,
        publisher: &str,
        method: &str,
        path: &str,
        _body: &Value,
    ) -> Result<Value, TraderError> {
        self.calls.lock().unwrap().push(CallRecord {
            publisher: publisher.to_string(),
            method: method.to_string(),
            path: path.to_string(),
        });

        if let Some(msg) = self.force_error.lock().unwrap().clone() {
            return Err(TraderError::Connector {
                publisher: publisher.to_string(),
                message: msg,
            });
        }

        match (publisher, path) {
            ("curve-finance", "/gauges/highest-rewards") => {
                Ok(self.gauges.lock().unwrap().clone())
            }
            ("evm-exec", "/preflight/liquidity") => Ok(self.preflight.lock().unwrap().clone()),
            ("evm-exec", "/trade/liquidity") => Ok(self.broadcast.lock().unwrap().clone()),
            ("evm-exec", "/positions/update") => Ok(json!({ "ok": true })),
            ("seren-cron", _) => Ok(json!({ "ok": true })),
            // Anything else is treated as an RPC probe.
            _ => {
                if *self.probe_healthy.lock().unwrap() {
                    Ok(json!({ "status": "ok" }))
                } else {
                    Err(TraderError::Connector {
                        publisher: publisher.to_string(),
                        message: "probe refused".to_string(),
                    })
                }
            }
        }
    }

    async fn list_publishers(&self) -> Result<Vec<PublisherInfo>, TraderError> {
        Ok(vec![PublisherInfo {
            slug: "seren-ethereum-rpc".to_string(),
            name: "Ethereum RPC".to_string(),
            description: "JSON-RPC access to Ethereum mainnet".to_string(),
            categories: vec!["rpc".to_string()],
            is_active: Some(true),
        }])
    }
}
