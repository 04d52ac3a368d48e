//! Gauge Trader — autonomous gauge yield trading agent.
//!
//! Entry point. Loads configuration, initialises structured logging,
//! and dispatches the CLI: one-shot cycle runs, the HTTP trigger
//! server, wallet initialisation, and cron job management.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::Path;
use std::process::ExitCode;
use std::sync::Arc;
use tracing::info;

use gauge_trader::catalog::GaugeCatalogFetcher;
use gauge_trader::config::AppConfig;
use gauge_trader::connector::EvmExecConnector;
use gauge_trader::engine::RunCycleOrchestrator;
use gauge_trader::publisher::PublisherClient;
use gauge_trader::scheduler::{CronScheduler, CycleGate};
use gauge_trader::server::{self, CycleRunner, ServerState};
use gauge_trader::signer;
use gauge_trader::storage::RunStore;
use gauge_trader::types::RunResult;

const BANNER: &str = r#"
  ____                        _____              _
 / ___| __ _ _   _  __ _  ___|_   _| __ __ _  __| | ___ _ __
| |  _ / _` | | | |/ _` |/ _ \ | || '__/ _` |/ _` |/ _ \ '__|
| |_| | (_| | |_| | (_| |  __/ | || | | (_| | (_| |  __/ |
 \____|\__,_|\__,_|\__, |\___| |_||_|  \__,_|\__,_|\___|_|
                   |___/
  Paper-first gauge yield trading agent
"#;

#[derive(Parser)]
#[command(name = "gauge-trader", version, about = "Autonomous gauge yield trading agent")]
struct Cli {
    /// Path to the TOML configuration file.
    #[arg(long, default_value = "config.toml", global = true)]
    config: String,

    /// Explicit authorization for live trading. Without this flag the
    /// agent never broadcasts, regardless of config.
    #[arg(long = "yes-live", global = true)]
    yes_live: bool,

    /// Override the wallet-state file path from the config.
    #[arg(long, global = true)]
    wallet_path: Option<String>,

    /// Override the hardware wallet address from the config.
    #[arg(long, global = true)]
    ledger_address: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run one trade cycle and exit (exit code reflects the outcome).
    Run,
    /// Serve the HTTP trigger endpoints.
    Serve {
        /// Override the configured port.
        #[arg(long)]
        port: Option<u16>,
    },
    /// Generate a local wallet-state file.
    InitWallet,
    /// Manage recurring trigger jobs on the cron publisher.
    Cron {
        #[command(subcommand)]
        action: CronAction,
    },
}

#[derive(Subcommand)]
enum CronAction {
    /// Register a recurring trigger job.
    Create {
        /// URL the job should hit on each tick.
        #[arg(long)]
        url: String,
        /// Five-field cron expression.
        #[arg(long, default_value = "0 * * * *")]
        schedule: String,
        #[arg(long, default_value = "gauge-trader-cycle")]
        name: String,
        #[arg(long, default_value = "POST")]
        method: String,
    },
    /// List registered jobs.
    List,
    Pause {
        #[arg(long)]
        job_id: String,
    },
    Resume {
        #[arg(long)]
        job_id: String,
    },
    Delete {
        #[arg(long)]
        job_id: String,
    },
}

/// Owns everything one cycle needs; builds the stage pipeline fresh
/// per run so no state leaks between cycles.
struct AgentRunner {
    config: AppConfig,
    client: PublisherClient,
    live_authorized: bool,
}

#[async_trait::async_trait]
impl CycleRunner for AgentRunner {
    async fn run(&self) -> RunResult {
        let fetcher = GaugeCatalogFetcher::new(&self.client);
        let connector =
            EvmExecConnector::new(&self.client, self.config.position_sync.path.clone());
        let orchestrator = RunCycleOrchestrator::new(
            &self.config,
            &fetcher,
            &self.client,
            &connector,
            self.live_authorized,
        );
        orchestrator.run_cycle().await
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    match run().await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {e:#}");
            ExitCode::from(2)
        }
    }
}

async fn run() -> Result<ExitCode> {
    // Load .env file if present (non-fatal if missing)
    let _ = dotenv::dotenv();

    let cli = Cli::parse();
    init_logging();

    let mut cfg = AppConfig::load(&cli.config)?;
    if let Some(path) = &cli.wallet_path {
        cfg.wallet.path = path.clone();
    }
    if let Some(address) = &cli.ledger_address {
        cfg.wallet.ledger_address = Some(address.clone());
    }

    match cli.command {
        Command::Run => {
            println!("{BANNER}");
            info!(
                agent = %cfg.agent.name,
                live_mode = cfg.agent.live_mode,
                authorized = cli.yes_live,
                "One-shot cycle"
            );
            let runner = build_runner(cfg.clone(), cli.yes_live)?;
            let store = RunStore::new(&cfg.storage.history_path);
            let result = runner.run().await;
            store.append(&result)?;
            info!(outcome = %result, "Cycle result");
            Ok(ExitCode::from(result.status.exit_code()))
        }
        Command::Serve { port } => {
            println!("{BANNER}");
            let port = port.unwrap_or(cfg.scheduler.port);
            let gate = CycleGate::new(cfg.scheduler.overlap);
            let store = RunStore::new(&cfg.storage.history_path);
            let agent_name = cfg.agent.name.clone();
            let runner = build_runner(cfg, cli.yes_live)?;
            let state = Arc::new(ServerState {
                runner: Box::new(runner),
                gate,
                store,
                agent_name,
            });
            server::serve(state, port).await?;
            Ok(ExitCode::SUCCESS)
        }
        Command::InitWallet => {
            let address = signer::init_wallet(Path::new(&cfg.wallet.path))?;
            println!("Wallet created at {} with address {address}", cfg.wallet.path);
            println!("Fund this wallet before enabling live trading.");
            Ok(ExitCode::SUCCESS)
        }
        Command::Cron { action } => {
            let client = build_client(&cfg)?;
            let scheduler = CronScheduler::new(&client);
            match action {
                CronAction::Create {
                    url,
                    schedule,
                    name,
                    method,
                } => {
                    let job = scheduler.create_job(&name, &schedule, &url, &method).await?;
                    println!("Created job {} ({} -> {})", job.id, job.schedule, job.url);
                }
                CronAction::List => {
                    let jobs = scheduler.list_jobs().await?;
                    if jobs.is_empty() {
                        println!("No jobs registered.");
                    }
                    for job in jobs {
                        println!(
                            "{}  {}  {}  {}{}",
                            job.id,
                            job.schedule,
                            job.method.as_deref().unwrap_or("POST"),
                            job.url,
                            if job.paused { "  [paused]" } else { "" },
                        );
                    }
                }
                CronAction::Pause { job_id } => {
                    scheduler.pause_job(&job_id).await?;
                    println!("Paused job {job_id}");
                }
                CronAction::Resume { job_id } => {
                    scheduler.resume_job(&job_id).await?;
                    println!("Resumed job {job_id}");
                }
                CronAction::Delete { job_id } => {
                    scheduler.delete_job(&job_id).await?;
                    println!("Deleted job {job_id}");
                }
            }
            Ok(ExitCode::SUCCESS)
        }
    }
}

fn build_client(cfg: &AppConfig) -> Result<PublisherClient> {
    let api_key = AppConfig::resolve_env(&cfg.api.api_key_env)?;
    PublisherClient::new(api_key, &cfg.api.base_url).context("Failed to build gateway client")
}

fn build_runner(cfg: AppConfig, yes_live: bool) -> Result<AgentRunner> {
    let client = build_client(&cfg)?;
    Ok(AgentRunner {
        config: cfg,
        client,
        live_authorized: yes_live,
    })
}

/// Initialise the `tracing` subscriber.
fn init_logging() {
    use tracing_subscriber::{fmt, EnvFilter};

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("gauge_trader=info"));

    let json_logging = std::env::var("GAUGE_TRADER_LOG_JSON").is_ok();

    if json_logging {
        fmt()
            .json()
            .with_env_filter(env_filter)
            .with_target(true)
            .with_thread_ids(true)
            .init();
    } else {
        fmt()
            .with_env_filter(env_filter)
            .with_target(true)
            .init();
    }
}
