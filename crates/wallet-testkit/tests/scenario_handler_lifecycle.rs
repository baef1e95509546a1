//! End-to-end coverage of the six handlers wired to the in-memory fakes,
//! one test per canonical scenario (create-then-query, idempotent deposit,
//! insufficient funds, transfer atomicity, same-wallet transfer, historical
//! fold, read-only degradation).

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, TimeZone, Utc};
use rust_decimal::Decimal;
use uuid::Uuid;

use wallet_engine::bus::{CommandBus, QueryBus};
use wallet_engine::ports::ReplicaStore;
use wallet_engine::handlers::{
    CreateWalletHandler, DepositHandler, GetHistoricalBalanceHandler, GetWalletHandler,
    TransferHandler, WithdrawHandler,
};
use wallet_engine::outcomes::{CommandOutcome, QueryOutcome};
use wallet_engine::requests::{
    CreateWalletCommand, DepositCommand, GetHistoricalBalanceQuery, GetWalletQuery, TransferCommand,
    WalletCommand, WalletQuery, WithdrawCommand,
};
use wallet_resilience::{CircuitBreaker, DegradationManager, Metrics, RetryPolicy};
use wallet_schemas::{DegradationCode, NewTransaction, Transaction, TransactionStatus, TransactionType, Wallet, WalletError};
use wallet_testkit::{InMemoryCache, InMemoryStore};

fn harness() -> (Arc<Metrics>, Arc<DegradationManager>, Arc<CircuitBreaker>, RetryPolicy, RetryPolicy) {
    let metrics = Arc::new(Metrics::new());
    let degradation = Arc::new(DegradationManager::new());
    let cache_breaker = Arc::new(CircuitBreaker::new("cache", 0.5, Duration::from_secs(5)));
    let optimistic_lock_retry = RetryPolicy::new(5, Duration::from_millis(1));
    let transient_retry = RetryPolicy::new(3, Duration::from_millis(1));
    (metrics, degradation, cache_breaker, optimistic_lock_retry, transient_retry)
}

fn ts(hour: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 1, 1, hour, 0, 0).unwrap()
}

#[tokio::test]
async fn s1_create_then_query_returns_zero_balance_active_wallet() {
    let (metrics, degradation, _breaker, _ol, transient) = harness();
    let store = InMemoryStore::new();
    let cache = InMemoryCache::new();
    let cache_breaker = Arc::new(CircuitBreaker::new("cache", 0.5, Duration::from_secs(5)));

    let mut commands = CommandBus::new(metrics.clone());
    commands
        .register(Box::new(CreateWalletHandler::new(
            store.clone(),
            degradation.clone(),
            transient,
            metrics.clone(),
        )))
        .unwrap();

    let mut queries = QueryBus::new(metrics.clone());
    queries
        .register(Box::new(GetWalletHandler::new(
            store.clone(),
            cache,
            cache_breaker,
            degradation,
            Duration::from_secs(60),
        )))
        .unwrap();

    let outcome = commands
        .dispatch(WalletCommand::CreateWallet(CreateWalletCommand {
            user_id: "u1".to_string(),
        }))
        .await
        .unwrap();
    let CommandOutcome::WalletCreated { wallet_id } = outcome else {
        panic!("expected WalletCreated");
    };

    let outcome = queries.dispatch(WalletQuery::GetWallet(GetWalletQuery { wallet_id })).await.unwrap();
    let QueryOutcome::Wallet(view) = outcome else {
        panic!("expected Wallet view");
    };
    assert_eq!(view.balance, Decimal::ZERO);
    assert_eq!(view.status, wallet_schemas::WalletStatus::Active);
}

#[tokio::test]
async fn s2_repeating_a_deposit_reference_id_returns_the_same_transaction_and_does_not_double_credit() {
    let (metrics, degradation, cache_breaker, optimistic_lock, transient) = harness();
    let store = InMemoryStore::new();
    let cache = InMemoryCache::new();

    let wallet = Wallet::new(Uuid::new_v4(), "u2", ts(0));
    let wallet_id = wallet.id;
    store.seed_wallet(wallet).await;

    let mut commands = CommandBus::new(metrics.clone());
    commands
        .register(Box::new(DepositHandler::new(
            store.clone(),
            cache,
            cache_breaker,
            degradation,
            optimistic_lock,
            transient,
            metrics.clone(),
        )))
        .unwrap();

    let cmd = || {
        WalletCommand::Deposit(DepositCommand {
            wallet_id,
            amount: Decimal::new(10000, 2),
            reference_id: "r1".to_string(),
        })
    };

    let first = commands.dispatch(cmd()).await.unwrap();
    let second = commands.dispatch(cmd()).await.unwrap();

    let CommandOutcome::TransactionRecorded { transaction_id: first_id } = first else {
        panic!("expected TransactionRecorded");
    };
    let CommandOutcome::TransactionRecorded { transaction_id: second_id } = second else {
        panic!("expected TransactionRecorded");
    };
    assert_eq!(first_id, second_id);

    let final_wallet = store.find_wallet(wallet_id).await.unwrap().unwrap();
    assert_eq!(final_wallet.balance, Decimal::new(10000, 2));
}

#[tokio::test]
async fn s3_withdraw_past_the_available_balance_is_rejected_and_balance_is_unchanged() {
    let (metrics, degradation, cache_breaker, optimistic_lock, transient) = harness();
    let store = InMemoryStore::new();
    let cache = InMemoryCache::new();

    let mut wallet = Wallet::new(Uuid::new_v4(), "u1", ts(0));
    wallet.balance = Decimal::new(1000, 2);
    let wallet_id = wallet.id;
    store.seed_wallet(wallet).await;

    let mut commands = CommandBus::new(metrics.clone());
    commands
        .register(Box::new(WithdrawHandler::new(
            store.clone(),
            cache,
            cache_breaker,
            degradation,
            optimistic_lock,
            transient,
            metrics.clone(),
        )))
        .unwrap();

    let err = commands
        .dispatch(WalletCommand::Withdraw(WithdrawCommand {
            wallet_id,
            amount: Decimal::new(5000, 2),
            reference_id: "r2".to_string(),
        }))
        .await
        .unwrap_err();

    let wallet_engine::bus::DispatchError::Handler(WalletError::InsufficientFunds { available, requested }) = err
    else {
        panic!("expected InsufficientFunds, got {err:?}");
    };
    assert_eq!(available, Decimal::new(1000, 2));
    assert_eq!(requested, Decimal::new(5000, 2));

    let unchanged = store.find_wallet(wallet_id).await.unwrap().unwrap();
    assert_eq!(unchanged.balance, Decimal::new(1000, 2));
}

#[tokio::test]
async fn s4_a_transfer_moves_funds_atomically_and_writes_both_outbox_sides() {
    let (metrics, degradation, cache_breaker, optimistic_lock, transient) = harness();
    let store = InMemoryStore::new();
    let cache = InMemoryCache::new();

    let mut a = Wallet::new(Uuid::new_v4(), "a", ts(0));
    a.balance = Decimal::new(30000, 2);
    let mut b = Wallet::new(Uuid::new_v4(), "b", ts(0));
    b.balance = Decimal::ZERO;
    let (a_id, b_id) = (a.id, b.id);
    store.seed_wallet(a).await;
    store.seed_wallet(b).await;

    let mut commands = CommandBus::new(metrics.clone());
    commands
        .register(Box::new(TransferHandler::new(
            store.clone(),
            cache,
            cache_breaker,
            degradation,
            optimistic_lock,
            transient,
            metrics.clone(),
        )))
        .unwrap();

    let outcome = commands
        .dispatch(WalletCommand::Transfer(TransferCommand {
            source_wallet_id: a_id,
            destination_wallet_id: b_id,
            amount: Decimal::new(12550, 2),
            reference_id: "r3".to_string(),
        }))
        .await
        .unwrap();
    assert!(matches!(outcome, CommandOutcome::TransferRecorded { .. }));

    let a_after = store.find_wallet(a_id).await.unwrap().unwrap();
    let b_after = store.find_wallet(b_id).await.unwrap().unwrap();
    assert_eq!(a_after.balance, Decimal::new(17450, 2));
    assert_eq!(b_after.balance, Decimal::new(12550, 2));

    let events = store.outbox_events().await;
    assert!(events.iter().any(|e| e.event_type == "FUNDS_TRANSFERRED" && e.aggregate_id == a_id));
    assert!(events.iter().any(|e| e.event_type == "FUNDS_TRANSFERRED" && e.aggregate_id == b_id));
}

#[tokio::test]
async fn s4b_two_sources_transferring_to_one_destination_may_reuse_the_same_reference_id() {
    let (metrics, degradation, cache_breaker, optimistic_lock, transient) = harness();
    let store = InMemoryStore::new();
    let cache = InMemoryCache::new();

    let mut a = Wallet::new(Uuid::new_v4(), "a", ts(0));
    a.balance = Decimal::new(30000, 2);
    let mut b = Wallet::new(Uuid::new_v4(), "b", ts(0));
    b.balance = Decimal::new(30000, 2);
    let c = Wallet::new(Uuid::new_v4(), "c", ts(0));
    let (a_id, b_id, c_id) = (a.id, b.id, c.id);
    store.seed_wallet(a).await;
    store.seed_wallet(b).await;
    store.seed_wallet(c).await;

    let mut commands = CommandBus::new(metrics.clone());
    commands
        .register(Box::new(TransferHandler::new(
            store.clone(),
            cache,
            cache_breaker,
            degradation,
            optimistic_lock,
            transient,
            metrics.clone(),
        )))
        .unwrap();

    // T1: A -> C, reusing reference_id "r1".
    let outcome = commands
        .dispatch(WalletCommand::Transfer(TransferCommand {
            source_wallet_id: a_id,
            destination_wallet_id: c_id,
            amount: Decimal::new(10000, 2),
            reference_id: "r1".to_string(),
        }))
        .await
        .unwrap();
    assert!(matches!(outcome, CommandOutcome::TransferRecorded { .. }));

    // T2: B -> C, independently reusing the same reference_id "r1". Must
    // succeed rather than colliding on C's (wallet_id, reference_id).
    let outcome = commands
        .dispatch(WalletCommand::Transfer(TransferCommand {
            source_wallet_id: b_id,
            destination_wallet_id: c_id,
            amount: Decimal::new(5000, 2),
            reference_id: "r1".to_string(),
        }))
        .await
        .unwrap();
    assert!(matches!(outcome, CommandOutcome::TransferRecorded { .. }));

    let a_after = store.find_wallet(a_id).await.unwrap().unwrap();
    let b_after = store.find_wallet(b_id).await.unwrap().unwrap();
    let c_after = store.find_wallet(c_id).await.unwrap().unwrap();
    assert_eq!(a_after.balance, Decimal::new(20000, 2));
    assert_eq!(b_after.balance, Decimal::new(25000, 2));
    assert_eq!(c_after.balance, Decimal::new(15000, 2));
}

#[tokio::test]
async fn s5_transferring_a_wallet_to_itself_is_rejected_with_no_state_change() {
    let (metrics, degradation, cache_breaker, optimistic_lock, transient) = harness();
    let store = InMemoryStore::new();
    let cache = InMemoryCache::new();

    let mut a = Wallet::new(Uuid::new_v4(), "a", ts(0));
    a.balance = Decimal::new(5000, 2);
    let a_id = a.id;
    store.seed_wallet(a).await;

    let mut commands = CommandBus::new(metrics.clone());
    commands
        .register(Box::new(TransferHandler::new(
            store.clone(),
            cache,
            cache_breaker,
            degradation,
            optimistic_lock,
            transient,
            metrics.clone(),
        )))
        .unwrap();

    let err = commands
        .dispatch(WalletCommand::Transfer(TransferCommand {
            source_wallet_id: a_id,
            destination_wallet_id: a_id,
            amount: Decimal::new(5000, 2),
            reference_id: "r4".to_string(),
        }))
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        wallet_engine::bus::DispatchError::Handler(WalletError::InvalidTransfer { .. })
    ));

    let unchanged = store.find_wallet(a_id).await.unwrap().unwrap();
    assert_eq!(unchanged.balance, Decimal::new(5000, 2));
}

#[tokio::test]
async fn s6_historical_balance_folds_completed_transactions_up_to_the_requested_instant() {
    let (metrics, _degradation, _breaker, _ol, _transient) = harness();
    let store = InMemoryStore::new();

    let wallet = Wallet::new(Uuid::new_v4(), "u1", ts(0));
    let wallet_id = wallet.id;
    store.seed_wallet(wallet).await;

    let seed_txn = |transaction_type, amount: i64, hour: u32| Transaction {
        id: Uuid::new_v4(),
        wallet_id,
        transaction_type,
        amount: Decimal::new(amount, 2),
        reference_id: format!("seed-{hour}"),
        counterparty_wallet_id: None,
        correlation_id: None,
        status: TransactionStatus::Completed,
        created_at: ts(hour),
    };

    store.seed_transaction(seed_txn(TransactionType::Deposit, 10000, 1)).await;
    store.seed_transaction(seed_txn(TransactionType::Deposit, 5000, 2)).await;
    store.seed_transaction(seed_txn(TransactionType::Withdrawal, 2500, 3)).await;

    let mut queries = QueryBus::new(metrics.clone());
    queries
        .register(Box::new(GetHistoricalBalanceHandler::new(store.clone())))
        .unwrap();

    let balance_at = |hour: u32| {
        let queries = &queries;
        async move {
            let outcome = queries
                .dispatch(WalletQuery::GetHistoricalBalance(GetHistoricalBalanceQuery {
                    wallet_id,
                    as_of: ts(hour),
                }))
                .await
                .unwrap();
            let QueryOutcome::HistoricalBalance(view) = outcome else {
                panic!("expected HistoricalBalance");
            };
            view.balance
        }
    };

    assert_eq!(balance_at(0).await, Decimal::ZERO);
    assert_eq!(balance_at(1).await, Decimal::new(10000, 2));
    assert_eq!(balance_at(2).await, Decimal::new(15000, 2));
    assert_eq!(balance_at(3).await, Decimal::new(12500, 2));
    assert_eq!(balance_at(99).await, Decimal::new(12500, 2));
}

#[tokio::test]
async fn s7_read_only_mode_blocks_mutation_but_not_reads() {
    let (metrics, degradation, cache_breaker, optimistic_lock, transient) = harness();
    let store = InMemoryStore::new();
    let cache = InMemoryCache::new();

    let mut wallet = Wallet::new(Uuid::new_v4(), "u1", ts(0));
    wallet.balance = Decimal::new(2000, 2);
    let wallet_id = wallet.id;
    store.seed_wallet(wallet).await;

    degradation.enter_read_only();

    let mut commands = CommandBus::new(metrics.clone());
    commands
        .register(Box::new(DepositHandler::new(
            store.clone(),
            cache.clone(),
            cache_breaker.clone(),
            degradation.clone(),
            optimistic_lock,
            transient,
            metrics.clone(),
        )))
        .unwrap();

    let err = commands
        .dispatch(WalletCommand::Deposit(DepositCommand {
            wallet_id,
            amount: Decimal::new(100, 2),
            reference_id: "r5".to_string(),
        }))
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        wallet_engine::bus::DispatchError::Handler(WalletError::ServiceDegraded {
            code: DegradationCode::ReadOnlyMode
        })
    ));

    let mut queries = QueryBus::new(metrics.clone());
    queries
        .register(Box::new(GetWalletHandler::new(
            store.clone(),
            cache,
            cache_breaker,
            degradation,
            Duration::from_secs(60),
        )))
        .unwrap();

    let outcome = queries.dispatch(WalletQuery::GetWallet(GetWalletQuery { wallet_id })).await.unwrap();
    let QueryOutcome::Wallet(view) = outcome else {
        panic!("expected Wallet view");
    };
    assert_eq!(view.balance, Decimal::new(2000, 2));
}

#[tokio::test]
async fn s8_sustained_cache_failures_enter_and_exit_cache_bypass_mode() {
    let (metrics, degradation, _breaker, _ol, _transient) = harness();
    let store = InMemoryStore::new();
    let cache = InMemoryCache::new();
    let cache_breaker = Arc::new(CircuitBreaker::new("cache", 0.5, Duration::from_millis(0)));

    let wallet = Wallet::new(Uuid::new_v4(), "u8", ts(0));
    let wallet_id = wallet.id;
    store.seed_wallet(wallet).await;

    let mut queries = QueryBus::new(metrics.clone());
    queries
        .register(Box::new(GetWalletHandler::new(
            store.clone(),
            cache.clone(),
            cache_breaker.clone(),
            degradation.clone(),
            Duration::from_secs(60),
        )))
        .unwrap();

    assert!(!degradation.is_cache_bypass());

    // Five consecutive cache-get failures trip the breaker's failure ratio
    // and open it; the read still succeeds via the replica.
    cache.fail_next_get(5);
    for _ in 0..5 {
        let outcome = queries.dispatch(WalletQuery::GetWallet(GetWalletQuery { wallet_id })).await.unwrap();
        let QueryOutcome::Wallet(view) = outcome else {
            panic!("expected Wallet view");
        };
        assert_eq!(view.balance, Decimal::ZERO);
    }
    assert!(degradation.is_cache_bypass());

    // Cool-down is zero, so the next dispatch is the half-open probe; the
    // cache is healthy again so it succeeds and closes the breaker.
    let outcome = queries.dispatch(WalletQuery::GetWallet(GetWalletQuery { wallet_id })).await.unwrap();
    let QueryOutcome::Wallet(_) = outcome else {
        panic!("expected Wallet view");
    };
    assert!(!degradation.is_cache_bypass());
}
