//! SecurePool client: connect a wallet and submit identity-verified staking
//! and coverage actions.

mod config;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tokio::sync::oneshot;

use securepool_types::{
    Catalog, CoverageRequest, PendingFinancialAction, StakeRequest, SystemClock, TokenAmount,
    WalletAddress,
};
use securepool_utils::{init_logging, LogFormat};
use securepool_verification::{
    ActionVerificationGate, GateOutcome, RequireSession, TimedApproval, VerificationMethod,
};
use securepool_wallet_core::{
    AuthorizeHook, BackendKind, ConfirmationStage, DiscoveryAdapter, ExtensionAdapter, HttpAuthn,
    NoExtension, ProviderAdapter, SessionStore,
};

use crate::config::ClientConfig;

#[derive(Parser)]
#[command(name = "securepool", about = "SecurePool wallet session client")]
struct Cli {
    /// Wallet backend: "discovery" or "extension".
    /// When a config file is provided, defaults to the file's backend value.
    #[arg(long, env = "SECUREPOOL_BACKEND")]
    backend: Option<BackendKind>,

    /// Discovery service endpoint that starts an authorization.
    #[arg(long, env = "SECUREPOOL_AUTHN_ENDPOINT")]
    authn_endpoint: Option<String>,

    /// Network the wallet authorizes on.
    #[arg(long, env = "SECUREPOOL_NETWORK")]
    network: Option<String>,

    /// Budget for one connect attempt, in milliseconds.
    #[arg(long, env = "SECUREPOOL_CONNECT_TIMEOUT_MS")]
    connect_timeout_ms: Option<u64>,

    /// Log output: "human" or "json".
    #[arg(long, env = "SECUREPOOL_LOG_FORMAT")]
    log_format: Option<LogFormat>,

    /// Log level: "trace", "debug", "info", "warn", "error".
    #[arg(long, env = "SECUREPOOL_LOG_LEVEL")]
    log_level: Option<String>,

    /// Path to a TOML configuration file. If provided, file settings
    /// are used as the base; CLI flags and env vars override them.
    #[arg(long, env = "SECUREPOOL_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(clap::Subcommand)]
enum Command {
    /// Print the resolved configuration and catalog.
    Status,

    /// Connect a wallet, show the confirmation, then disconnect.
    Connect,

    /// Stake into an insurance pool.
    Stake {
        #[arg(long)]
        pool: String,
        #[arg(long)]
        amount: TokenAmount,
        /// Lock period; defaults to the pool's lockup.
        #[arg(long)]
        days: Option<u32>,
    },

    /// Buy coverage under an insurance policy.
    Cover {
        #[arg(long)]
        policy: String,
        #[arg(long)]
        amount: TokenAmount,
        #[arg(long)]
        days: u32,
    },
}

impl Cli {
    fn apply_overrides(&self, config: &mut ClientConfig) {
        if let Some(backend) = self.backend {
            config.backend = backend;
        }
        if let Some(endpoint) = &self.authn_endpoint {
            config.discovery.authn_endpoint = endpoint.clone();
        }
        if let Some(network) = &self.network {
            config.discovery.network = network.clone();
        }
        if let Some(ms) = self.connect_timeout_ms {
            config.connect_timeout_ms = ms;
        }
        if let Some(format) = self.log_format {
            config.log_format = format;
        }
        if let Some(level) = &self.log_level {
            config.log_level = level.clone();
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => ClientConfig::from_toml_file(path)
            .with_context(|| format!("loading {}", path.display()))?,
        None => ClientConfig::default(),
    };
    cli.apply_overrides(&mut config);
    config.validate()?;

    init_logging(config.log_format, &config.log_level);
    if let Some(path) = &cli.config {
        tracing::info!("loaded config from {}", path.display());
    }

    if let Command::Status = cli.command {
        return print_status(&config);
    }

    let adapter = build_adapter(&config)?;
    let store = SessionStore::init(adapter, config.store_config(), Arc::new(SystemClock));

    let result = tokio::select! {
        result = run(&cli.command, &config, &store) => result,
        signal = tokio::signal::ctrl_c() => {
            signal.context("listening for ctrl-c")?;
            tracing::info!("interrupted, shutting down");
            Ok(())
        }
    };

    store.teardown().await;
    result
}

fn build_adapter(config: &ClientConfig) -> anyhow::Result<Arc<dyn ProviderAdapter>> {
    tracing::info!(backend = %config.backend, "selecting wallet backend");
    match config.backend {
        BackendKind::Discovery => {
            let hook: AuthorizeHook = Arc::new(|url: &str| {
                println!("Approve the connection in your wallet: {url}");
            });
            let authn = HttpAuthn::new(config.discovery.clone())?.with_authorize_hook(hook);
            Ok(Arc::new(DiscoveryAdapter::new(Arc::new(authn))))
        }
        BackendKind::Extension => Ok(Arc::new(ExtensionAdapter::new(Arc::new(NoExtension)))),
    }
}

fn build_gate(config: &ClientConfig, store: &SessionStore) -> ActionVerificationGate {
    let timed = TimedApproval::new(config.verification.delay());
    let method: Arc<dyn VerificationMethod> = if config.verification.require_session {
        Arc::new(RequireSession::new(store.watch(), timed))
    } else {
        Arc::new(timed)
    };
    ActionVerificationGate::new(method, config.verification.success_hold(), Arc::new(SystemClock))
}

fn print_status(config: &ClientConfig) -> anyhow::Result<()> {
    println!("{}", config.to_toml_string()?);
    let catalog = config.catalog();
    for pool in &catalog.pools {
        println!(
            "pool {:>4}  {:<28} stake {}..{}  lockup {}d  apy {}%",
            pool.id, pool.name, pool.min_stake, pool.max_stake, pool.lockup_days, pool.apy
        );
    }
    for policy in &catalog.policies {
        println!(
            "policy {:>2}  {:<28} cover {}..{}  premium {}%",
            policy.id, policy.name, policy.min_amount, policy.max_amount, policy.premium_rate
        );
    }
    Ok(())
}

async fn run(command: &Command, config: &ClientConfig, store: &SessionStore) -> anyhow::Result<()> {
    match command {
        Command::Status => print_status(config),
        Command::Connect => {
            connect(store).await?;
            wait_for_notice(store).await?;
            store.disconnect().await;
            Ok(())
        }
        Command::Stake { pool, amount, days } => {
            let catalog = config.catalog();
            let lockup = catalog.pool(pool).map(|p| p.lockup_days).unwrap_or_default();
            let action = PendingFinancialAction::Stake(StakeRequest {
                pool_id: pool.clone(),
                amount: *amount,
                duration_days: days.unwrap_or(lockup),
            });
            submit(action, &catalog, config, store).await
        }
        Command::Cover { policy, amount, days } => {
            let action = PendingFinancialAction::Coverage(CoverageRequest {
                policy_id: policy.clone(),
                amount: *amount,
                duration_days: *days,
            });
            submit(action, &config.catalog(), config, store).await
        }
    }
}

async fn connect(store: &SessionStore) -> anyhow::Result<WalletAddress> {
    println!("Connecting to wallet via {}...", store.backend());
    match store.connect().await {
        Ok(address) => {
            println!("Connected: {}", address.abbreviated());
            Ok(address)
        }
        Err(e) => {
            tracing::warn!("wallet connection failed: {e}");
            anyhow::bail!(e.user_message())
        }
    }
}

/// Follow the confirmation notice until it hides itself.
async fn wait_for_notice(store: &SessionStore) -> anyhow::Result<()> {
    let mut stages = store.flow().notice().subscribe();
    loop {
        let stage = *stages.borrow_and_update();
        match stage {
            ConfirmationStage::Confirming => println!("Confirming wallet connection..."),
            ConfirmationStage::Confirmed => println!("Successfully connected"),
            ConfirmationStage::Hidden => return Ok(()),
        }
        stages.changed().await.context("confirmation notice dropped")?;
    }
}

async fn submit(
    action: PendingFinancialAction,
    catalog: &Catalog,
    config: &ClientConfig,
    store: &SessionStore,
) -> anyhow::Result<()> {
    catalog
        .validate(&action)
        .with_context(|| format!("cannot {action}"))?;

    let address = connect(store).await?;
    let gate = build_gate(config, store);
    println!(
        "Verifying identity for {} ({})...",
        action.kind().label(),
        gate.method_name()
    );

    let (released_tx, released_rx) = oneshot::channel();
    let pending = action.clone();
    let ticket = gate.open(action.kind(), move || {
        let _ = released_tx.send(pending);
    });

    let result = match ticket.outcome().await {
        GateOutcome::Proceeded => match released_rx.await {
            Ok(released) => {
                tracing::info!(%address, action = %released, "submitting verified action");
                println!("Submitted: {released}");
                Ok(())
            }
            Err(_) => Err(anyhow::anyhow!("verified action was never released")),
        },
        GateOutcome::Failed(reason) => Err(anyhow::anyhow!("identity verification failed: {reason}")),
        other => Err(anyhow::anyhow!("verification ended early: {other:?}")),
    };

    gate.close();
    store.disconnect().await;
    result
}
