//! End-to-end pipeline tests.
//!
//! Wire the real fetcher, selector, resolver, and connector over the
//! mock gateway and drive full cycles through the orchestrator and the
//! trigger server.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use serde_json::json;
use tower::ServiceExt;

use gauge_trader::catalog::GaugeCatalogFetcher;
use gauge_trader::config::{AppConfig, OverlapPolicy};
use gauge_trader::connector::EvmExecConnector;
use gauge_trader::engine::RunCycleOrchestrator;
use gauge_trader::scheduler::CycleGate;
use gauge_trader::server::{build_router, CycleRunner, ServerState};
use gauge_trader::signer;
use gauge_trader::storage::RunStore;
use gauge_trader::types::{CycleStatus, ProbeStatus, RunMode, RunResult, Stage};

use crate::mock_connector::MockGateway;

fn test_config(live_mode: bool, wallet_mode: &str, wallet_path: &str) -> AppConfig {
    let toml = format!(
        r#"
        [agent]
        name = "pipeline-test"
        chains = ["ethereum"]
        wallet_mode = "{wallet_mode}"
        live_mode = {live_mode}
        deposit_token = "USDC"
        deposit_amount_usd = 500

        [api]
        base_url = "https://gateway.example"
        api_key_env = "PIPELINE_TEST_KEY"

        [wallet]
        path = "{wallet_path}"
        ledger_address = "0x000000000000000000000000000000000000dEaD"

        [selection]
        min_liquidity_usd = 50000

        [preflight]
        max_gas_estimate = 1500000

        [probe]
        required = true
        probes = [{{ method = "GET", path = "/health" }}]

        [rpc_publishers]
        ethereum = "seren-ethereum-rpc"
        "#
    );
    toml::from_str(&toml).expect("test config parses")
}

async fn run_once(config: &AppConfig, gateway: &MockGateway, yes_live: bool) -> RunResult {
    let fetcher = GaugeCatalogFetcher::new(gateway);
    let connector = EvmExecConnector::new(gateway, config.position_sync.path.clone());
    let orchestrator =
        RunCycleOrchestrator::new(config, &fetcher, gateway, &connector, yes_live);
    orchestrator.run_cycle().await
}

fn temp_wallet() -> String {
    let mut path = std::env::temp_dir();
    path.push(format!("pipeline_wallet_{}.json", uuid::Uuid::new_v4()));
    path.to_string_lossy().into_owned()
}

#[tokio::test]
async fn test_dry_run_cycle_records_paper_trade() {
    let config = test_config(false, "ledger", "/nonexistent");
    let gateway = MockGateway::healthy();

    let result = run_once(&config, &gateway, false).await;

    assert_eq!(result.status, CycleStatus::Success);
    assert_eq!(result.mode, RunMode::DryRun);
    assert_eq!(result.status.exit_code(), 0);
    // The deep gauge wins despite the thin one's higher APR.
    assert_eq!(result.decision.as_ref().unwrap().gauge.address, "0xdeepgauge");
    assert!(result.preflight.is_some());
    assert!(result.broadcast.is_none());

    let paths = gateway.called_paths();
    assert!(paths.contains(&"/preflight/liquidity".to_string()));
    assert!(!paths.contains(&"/trade/liquidity".to_string()));
}

#[tokio::test]
async fn test_live_cycle_with_local_wallet_broadcasts() {
    let wallet_path = temp_wallet();
    signer::init_wallet(Path::new(&wallet_path)).unwrap();
    let config = test_config(true, "local", &wallet_path);
    let gateway = MockGateway::healthy();

    let result = run_once(&config, &gateway, true).await;

    assert_eq!(result.status, CycleStatus::Success);
    assert_eq!(result.mode, RunMode::Live);
    assert!(result.broadcast.is_some());

    // Preflight before trade, position sync after.
    let paths = gateway.called_paths();
    let preflight = paths.iter().position(|p| p == "/preflight/liquidity").unwrap();
    let trade = paths.iter().position(|p| p == "/trade/liquidity").unwrap();
    let sync = paths.iter().position(|p| p == "/positions/update").unwrap();
    assert!(preflight < trade);
    assert!(trade < sync);

    std::fs::remove_file(&wallet_path).unwrap();
}

#[tokio::test]
async fn test_live_config_without_authorization_never_broadcasts() {
    let wallet_path = temp_wallet();
    signer::init_wallet(Path::new(&wallet_path)).unwrap();
    let config = test_config(true, "local", &wallet_path);
    let gateway = MockGateway::healthy();

    let result = run_once(&config, &gateway, false).await;

    assert_eq!(result.status, CycleStatus::Success);
    assert_eq!(result.mode, RunMode::DryRun);
    assert!(!gateway.called_paths().contains(&"/trade/liquidity".to_string()));

    std::fs::remove_file(&wallet_path).unwrap();
}

#[tokio::test]
async fn test_probe_failure_aborts_before_preflight() {
    let config = test_config(true, "ledger", "/nonexistent");
    let gateway = MockGateway::healthy();
    gateway.set_probe_healthy(false);

    let result = run_once(&config, &gateway, true).await;

    assert_eq!(result.status, CycleStatus::Abort);
    assert_eq!(result.status.exit_code(), 1);
    assert_eq!(result.terminal_stage(), Some(Stage::ResolvingPublisher));

    let paths = gateway.called_paths();
    assert!(!paths.contains(&"/preflight/liquidity".to_string()));
    assert!(!paths.contains(&"/trade/liquidity".to_string()));
}

#[tokio::test]
async fn test_no_eligible_gauge_skips_cleanly() {
    let config = test_config(false, "ledger", "/nonexistent");
    let gateway = MockGateway::healthy();
    gateway.set_gauges(json!({
        "gauges": [
            { "address": "0xtiny", "reward_apy": 0.40, "liquidity_usd": 100.0 }
        ]
    }));

    let result = run_once(&config, &gateway, false).await;

    assert_eq!(result.status, CycleStatus::Skip);
    assert_eq!(result.status.exit_code(), 0);
    assert_eq!(result.terminal_stage(), Some(Stage::Selecting));
    // Only the catalog was hit; no probe, preflight, or trade.
    assert!(gateway
        .recorded_calls()
        .iter()
        .all(|c| c.publisher == "curve-finance"));
}

#[tokio::test]
async fn test_catalog_outage_is_cycle_error() {
    let config = test_config(false, "ledger", "/nonexistent");
    let gateway = MockGateway::healthy();
    gateway.set_error("gateway unavailable");

    let result = run_once(&config, &gateway, false).await;

    assert_eq!(result.status, CycleStatus::Error);
    assert_eq!(result.status.exit_code(), 2);
    assert_eq!(result.terminal_stage(), Some(Stage::Fetching));
}

#[tokio::test]
async fn test_preflight_revert_aborts_live_cycle() {
    let wallet_path = temp_wallet();
    signer::init_wallet(Path::new(&wallet_path)).unwrap();
    let config = test_config(true, "local", &wallet_path);
    let gateway = MockGateway::healthy();
    gateway.set_preflight(json!({
        "reverted": true,
        "gas_estimate": 0,
        "detail": "insufficient allowance"
    }));

    let result = run_once(&config, &gateway, true).await;

    assert_eq!(result.status, CycleStatus::Abort);
    assert_eq!(result.terminal_stage(), Some(Stage::Preflighting));
    assert!(!gateway.called_paths().contains(&"/trade/liquidity".to_string()));
    // The failed report is preserved for audit.
    assert!(result.preflight.is_some());

    std::fs::remove_file(&wallet_path).unwrap();
}

#[tokio::test]
async fn test_probe_failure_is_isolated_to_one_cycle() {
    // A failed cycle leaves no state behind; the next cycle with a
    // recovered probe succeeds.
    let config = test_config(false, "ledger", "/nonexistent");
    let gateway = MockGateway::healthy();

    gateway.set_probe_healthy(false);
    let first = run_once(&config, &gateway, false).await;
    assert_eq!(first.status, CycleStatus::Abort);

    gateway.set_probe_healthy(true);
    let second = run_once(&config, &gateway, false).await;
    assert_eq!(second.status, CycleStatus::Success);
    assert_eq!(
        second.binding.as_ref().unwrap().status,
        ProbeStatus::Ok
    );
}

// ---------------------------------------------------------------------------
// Trigger server over the full pipeline
// ---------------------------------------------------------------------------

struct PipelineRunner {
    config: AppConfig,
    gateway: Arc<MockGateway>,
    delay: Duration,
}

#[async_trait::async_trait]
impl CycleRunner for PipelineRunner {
    async fn run(&self) -> RunResult {
        tokio::time::sleep(self.delay).await;
        run_once(&self.config, &self.gateway, false).await
    }
}

fn server_state(delay: Duration) -> (Arc<ServerState>, Arc<MockGateway>) {
    let gateway = Arc::new(MockGateway::healthy());
    let mut history = std::env::temp_dir();
    history.push(format!("pipeline_runs_{}.json", uuid::Uuid::new_v4()));
    let state = Arc::new(ServerState {
        runner: Box::new(PipelineRunner {
            config: test_config(false, "ledger", "/nonexistent"),
            gateway: Arc::clone(&gateway),
            delay,
        }),
        gate: CycleGate::new(OverlapPolicy::Drop),
        store: RunStore::new(history),
        agent_name: "pipeline-test".to_string(),
    });
    (state, gateway)
}

fn post_run() -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/run")
        .body(Body::empty())
        .unwrap()
}

#[tokio::test]
async fn test_server_runs_full_cycle() {
    let (state, gateway) = server_state(Duration::ZERO);
    let app = build_router(Arc::clone(&state));

    let resp = app.oneshot(post_run()).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);

    let body = axum::body::to_bytes(resp.into_body(), 100_000).await.unwrap();
    let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(json["status"], "success");
    assert_eq!(json["exit_code"], 0);
    assert!(gateway.called_paths().contains(&"/preflight/liquidity".to_string()));

    // Persisted to the run history.
    assert_eq!(state.store.load().unwrap().len(), 1);
    std::fs::remove_file(state.store.path()).unwrap();
}

#[tokio::test]
async fn test_server_rejects_overlapping_ticks() {
    let (state, _gateway) = server_state(Duration::from_millis(100));
    let app = build_router(Arc::clone(&state));

    let first = {
        let app = app.clone();
        tokio::spawn(async move { app.oneshot(post_run()).await.unwrap() })
    };
    tokio::time::sleep(Duration::from_millis(20)).await;

    let second = app.oneshot(post_run()).await.unwrap();
    assert_eq!(second.status(), StatusCode::CONFLICT);

    let first = first.await.unwrap();
    assert_eq!(first.status(), StatusCode::OK);
    assert_eq!(state.store.load().unwrap().len(), 1);
    std::fs::remove_file(state.store.path()).unwrap();
}
