//! Operator CLI for the wallet service: database lifecycle, layered config
//! inspection, one-shot wallet operations dispatched on the same
//! command/query bus the daemon runs, and a manual outbox drain.
//!
//! Every subcommand connects, does one piece of work, and exits - there is
//! no long-lived state here, unlike `wallet-daemon`.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};
use rust_decimal::Decimal;
use uuid::Uuid;

use wallet_cache::RedisCache;
use wallet_config::{load_layered_yaml, resolve_secrets};
use wallet_daemon::adapters::{PgOutboxStore, PgPrimaryStore, PgReplicaStore};
use wallet_engine::bus::{CommandBus, QueryBus};
use wallet_engine::handlers::{
    CreateWalletHandler, DepositHandler, GetHistoricalBalanceHandler, GetWalletHandler,
    TransferHandler, WithdrawHandler,
};
use wallet_engine::outbox::{OutboxPublisher, PublisherConfig};
use wallet_engine::outcomes::{CommandOutcome, QueryOutcome};
use wallet_engine::requests::{
    CreateWalletCommand, DepositCommand, GetHistoricalBalanceQuery, GetWalletQuery, TransferCommand,
    WalletCommand, WalletQuery, WithdrawCommand,
};
use wallet_eventlog::KafkaEventLog;
use wallet_resilience::{CircuitBreaker, DegradationManager, Metrics, RetryPolicy};

#[derive(Parser)]
#[command(name = "wallet")]
#[command(about = "wallet service operator CLI", long_about = None)]
struct Cli {
    #[command(subcommand)]
    cmd: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Database lifecycle commands
    Db {
        #[command(subcommand)]
        cmd: DbCmd,
    },

    /// Compute the layered config hash and print the canonical JSON
    ConfigHash {
        /// Paths in merge order (base -> env -> overrides)
        #[arg(required = true)]
        paths: Vec<String>,
    },

    /// Wallet read/write operations
    Wallet {
        #[command(subcommand)]
        cmd: WalletCmd,
    },

    /// Manually drain the outbox once (outside the daemon's background loop)
    OutboxDrain,
}

#[derive(Subcommand)]
enum DbCmd {
    Status,
    Migrate,
}

#[derive(Subcommand)]
enum WalletCmd {
    /// Open a new wallet for a user
    Create {
        #[arg(long)]
        user_id: String,
    },
    /// Credit a wallet
    Deposit {
        #[arg(long)]
        wallet_id: Uuid,
        #[arg(long)]
        amount: Decimal,
        #[arg(long)]
        reference_id: String,
    },
    /// Debit a wallet
    Withdraw {
        #[arg(long)]
        wallet_id: Uuid,
        #[arg(long)]
        amount: Decimal,
        #[arg(long)]
        reference_id: String,
    },
    /// Move funds between two wallets
    Transfer {
        #[arg(long)]
        source_wallet_id: Uuid,
        #[arg(long)]
        destination_wallet_id: Uuid,
        #[arg(long)]
        amount: Decimal,
        #[arg(long)]
        reference_id: String,
    },
    /// Current wallet state (cache-aside read)
    Get {
        #[arg(long)]
        wallet_id: Uuid,
    },
    /// Reconstructed balance as of a point in time
    HistoricalBalance {
        #[arg(long)]
        wallet_id: Uuid,
        #[arg(long)]
        as_of: DateTime<Utc>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let _ = dotenvy::from_filename(".env.local");
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "warn".into()))
        .init();

    let cli = Cli::parse();

    match cli.cmd {
        Commands::Db { cmd } => {
            let pool = wallet_db::connect_primary_from_env().await?;
            match cmd {
                DbCmd::Status => {
                    let s = wallet_db::status(&pool).await?;
                    println!("db_ok={} has_wallets_table={}", s.ok, s.has_wallets_table);
                }
                DbCmd::Migrate => {
                    wallet_db::migrate(&pool).await?;
                    println!("migrations_applied=true");
                }
            }
        }

        Commands::ConfigHash { paths } => {
            let path_refs: Vec<&str> = paths.iter().map(|s| s.as_str()).collect();
            let loaded = load_layered_yaml(&path_refs)?;
            println!("config_hash={}", loaded.config_hash);
            println!("{}", loaded.canonical_json);
        }

        Commands::Wallet { cmd } => run_wallet_cmd(cmd).await?,

        Commands::OutboxDrain => {
            let secrets = resolve_secrets()?;
            let primary = wallet_db::connect_primary_from_env().await?;
            let event_log = Arc::new(KafkaEventLog::new(&secrets.eventlog_brokers, "wallet.events")?);
            let publisher = OutboxPublisher::new(
                Arc::new(PgOutboxStore::new(primary)),
                event_log,
                Arc::new(CircuitBreaker::new("event_log", 0.5, Duration::from_secs(30))),
                Arc::new(DegradationManager::new()),
                Arc::new(Metrics::new()),
                PublisherConfig {
                    poll_interval: Duration::from_millis(0),
                    batch_size: 500,
                    publisher_id: "wallet-cli".to_string(),
                },
            );
            let drained = publisher.publish_all_pending().await?;
            println!("outbox_rows_published={drained}");
        }
    }

    Ok(())
}

async fn run_wallet_cmd(cmd: WalletCmd) -> Result<()> {
    let secrets = resolve_secrets()?;
    let primary_pool = wallet_db::connect_primary_from_env().await?;
    let replica_pool = wallet_db::connect_replica_from_env(&primary_pool).await?;
    let cache = RedisCache::connect(&secrets.cache_url).await?;

    let metrics = Arc::new(Metrics::new());
    let degradation = Arc::new(DegradationManager::new());
    let cache_breaker = Arc::new(CircuitBreaker::new("cache", 0.5, Duration::from_secs(5)));
    let optimistic_lock_retry = RetryPolicy::new(5, Duration::from_millis(20));
    let transient_retry = RetryPolicy::new(4, Duration::from_millis(100));

    let primary_store = PgPrimaryStore::new(primary_pool);
    let replica_store = PgReplicaStore::new(replica_pool);

    match cmd {
        WalletCmd::Create { user_id } => {
            let mut bus = CommandBus::new(metrics.clone());
            bus.register(Box::new(CreateWalletHandler::new(
                primary_store,
                degradation,
                transient_retry,
                metrics,
            )))?;
            let outcome = bus
                .dispatch(WalletCommand::CreateWallet(CreateWalletCommand { user_id }))
                .await?;
            if let CommandOutcome::WalletCreated { wallet_id } = outcome {
                println!("wallet_id={wallet_id}");
            }
        }

        WalletCmd::Deposit {
            wallet_id,
            amount,
            reference_id,
        } => {
            let mut bus = CommandBus::new(metrics.clone());
            bus.register(Box::new(DepositHandler::new(
                primary_store,
                cache,
                cache_breaker,
                degradation,
                optimistic_lock_retry,
                transient_retry,
                metrics,
            )))?;
            let outcome = bus
                .dispatch(WalletCommand::Deposit(DepositCommand {
                    wallet_id,
                    amount,
                    reference_id,
                }))
                .await?;
            if let CommandOutcome::TransactionRecorded { transaction_id } = outcome {
                println!("transaction_id={transaction_id}");
            }
        }

        WalletCmd::Withdraw {
            wallet_id,
            amount,
            reference_id,
        } => {
            let mut bus = CommandBus::new(metrics.clone());
            bus.register(Box::new(WithdrawHandler::new(
                primary_store,
                cache,
                cache_breaker,
                degradation,
                optimistic_lock_retry,
                transient_retry,
                metrics,
            )))?;
            let outcome = bus
                .dispatch(WalletCommand::Withdraw(WithdrawCommand {
                    wallet_id,
                    amount,
                    reference_id,
                }))
                .await?;
            if let CommandOutcome::TransactionRecorded { transaction_id } = outcome {
                println!("transaction_id={transaction_id}");
            }
        }

        WalletCmd::Transfer {
            source_wallet_id,
            destination_wallet_id,
            amount,
            reference_id,
        } => {
            let mut bus = CommandBus::new(metrics.clone());
            bus.register(Box::new(TransferHandler::new(
                primary_store,
                cache,
                cache_breaker,
                degradation,
                optimistic_lock_retry,
                transient_retry,
                metrics,
            )))?;
            let outcome = bus
                .dispatch(WalletCommand::Transfer(TransferCommand {
                    source_wallet_id,
                    destination_wallet_id,
                    amount,
                    reference_id,
                }))
                .await?;
            if let CommandOutcome::TransferRecorded {
                source_transaction_id,
                destination_transaction_id,
            } = outcome
            {
                println!("source_transaction_id={source_transaction_id}");
                println!("destination_transaction_id={destination_transaction_id}");
            }
        }

        WalletCmd::Get { wallet_id } => {
            let mut bus = QueryBus::new(metrics.clone());
            bus.register(Box::new(GetWalletHandler::new(
                replica_store,
                cache,
                cache_breaker,
                degradation,
                Duration::from_secs(60),
            )))?;
            let outcome = bus.dispatch(WalletQuery::GetWallet(GetWalletQuery { wallet_id })).await?;
            if let QueryOutcome::Wallet(view) = outcome {
                println!("wallet_id={}", view.id);
                println!("user_id={}", view.user_id);
                println!("balance={}", view.balance);
                println!("status={:?}", view.status);
                println!("updated_at={}", view.updated_at);
            }
        }

        WalletCmd::HistoricalBalance { wallet_id, as_of } => {
            let mut bus = QueryBus::new(metrics.clone());
            bus.register(Box::new(GetHistoricalBalanceHandler::new(replica_store)))?;
            let outcome = bus
                .dispatch(WalletQuery::GetHistoricalBalance(GetHistoricalBalanceQuery {
                    wallet_id,
                    as_of,
                }))
                .await?;
            if let QueryOutcome::HistoricalBalance(view) = outcome {
                println!("wallet_id={}", view.wallet_id);
                println!("balance={}", view.balance);
                println!("as_of={}", view.timestamp);
            }
        }
    }

    Ok(())
}
