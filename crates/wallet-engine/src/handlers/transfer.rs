//! `Transfer`: moves funds between two wallets as one
//! atomic unit of work. Both wallet rows are locked in ascending id order
//! (enforced by [`crate::ports::WalletUnitOfWork::load_many_for_update_ordered`])
//! so two transfers crossing the same pair of wallets in opposite directions
//! cannot deadlock each other.

use super::cache_support::invalidate_best_effort;
use super::validation::{validate_amount, validate_reference_id};
use crate::bus::CommandHandler;
use crate::outcomes::CommandOutcome;
use crate::ports::{PrimaryStore, WalletUnitOfWork};
use crate::requests::{CommandKind, TransferCommand, WalletCommand};
use chrono::Utc;
use futures_util::future::BoxFuture;
use std::sync::Arc;
use uuid::Uuid;
use wallet_cache::CachePort;
use wallet_resilience::{run_with_retry, CircuitBreaker, DegradationManager, Metrics, RetryPolicy, RetryPolicyKind};
use wallet_schemas::{NewTransaction, TransactionStatus, TransactionType, Wallet, WalletError, WalletEvent};

pub struct TransferHandler<S: PrimaryStore, C: CachePort> {
    store: S,
    cache: C,
    cache_breaker: Arc<CircuitBreaker>,
    degradation: Arc<DegradationManager>,
    optimistic_lock_retry: RetryPolicy,
    transient_retry: RetryPolicy,
    metrics: Arc<Metrics>,
}

struct TransferResult {
    source_transaction_id: Uuid,
    destination_transaction_id: Uuid,
}

impl<S: PrimaryStore, C: CachePort> TransferHandler<S, C> {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        store: S,
        cache: C,
        cache_breaker: Arc<CircuitBreaker>,
        degradation: Arc<DegradationManager>,
        optimistic_lock_retry: RetryPolicy,
        transient_retry: RetryPolicy,
        metrics: Arc<Metrics>,
    ) -> Self {
        Self {
            store,
            cache,
            cache_breaker,
            degradation,
            optimistic_lock_retry,
            transient_retry,
            metrics,
        }
    }

    async fn execute(&self, cmd: TransferCommand) -> Result<TransferResult, WalletError> {
        self.degradation.gate_mutation()?;
        validate_amount(cmd.amount)?;
        validate_reference_id(&cmd.reference_id)?;
        if cmd.source_wallet_id == cmd.destination_wallet_id {
            return Err(WalletError::InvalidTransfer {
                message: "source and destination wallets must differ".to_string(),
            });
        }

        let metrics = &self.metrics;
        let cmd = &cmd;

        let result = run_with_retry(
            "transfer",
            RetryPolicyKind::Transient,
            &self.transient_retry,
            WalletError::is_transient_retryable,
            |_, _| metrics.incr("retry.transient.transfer"),
            || async {
                run_with_retry(
                    "transfer",
                    RetryPolicyKind::OptimisticLock,
                    &self.optimistic_lock_retry,
                    WalletError::is_optimistic_lock_retryable,
                    |_, _| metrics.incr("retry.optimistic_lock.transfer"),
                    || self.try_transfer(cmd),
                )
                .await
            },
        )
        .await?;

        invalidate_best_effort(&self.cache, &self.cache_breaker, &self.degradation, cmd.source_wallet_id).await;
        invalidate_best_effort(&self.cache, &self.cache_breaker, &self.degradation, cmd.destination_wallet_id).await;
        Ok(result)
    }

    async fn try_transfer(&self, cmd: &TransferCommand) -> Result<TransferResult, WalletError> {
        let mut uow = self.store.begin().await.map_err(as_transient)?;

        if let Some(existing_source) = uow
            .find_transaction_by_reference(cmd.source_wallet_id, &cmd.reference_id)
            .await
            .map_err(as_transient)?
        {
            let correlation_id = existing_source
                .correlation_id
                .ok_or_else(|| WalletError::internal("transfer source leg recorded without a correlation id"))?;
            let existing_destination = uow
                .find_transaction_by_correlation(cmd.destination_wallet_id, correlation_id)
                .await
                .map_err(as_transient)?
                .ok_or_else(|| {
                    WalletError::internal("source transfer leg recorded without its destination leg")
                })?;
            return Ok(TransferResult {
                source_transaction_id: existing_source.id,
                destination_transaction_id: existing_destination.id,
            });
        }

        let wallets = uow
            .load_many_for_update_ordered(vec![cmd.source_wallet_id, cmd.destination_wallet_id])
            .await
            .map_err(as_transient)?;

        let mut source = take_wallet(&wallets, cmd.source_wallet_id)
            .ok_or_else(|| WalletError::wallet_not_found(cmd.source_wallet_id.to_string()))?;
        let mut destination = take_wallet(&wallets, cmd.destination_wallet_id)
            .ok_or_else(|| WalletError::wallet_not_found(cmd.destination_wallet_id.to_string()))?;

        for wallet in [&source, &destination] {
            if !wallet.status.permits_mutation() {
                return Err(WalletError::WalletStatusViolation {
                    wallet_id: wallet.id.to_string(),
                    status: wallet.status.as_str().to_string(),
                });
            }
        }

        if source.balance < cmd.amount {
            return Err(WalletError::InsufficientFunds {
                available: source.balance,
                requested: cmd.amount,
            });
        }

        let source_expected_version = source.version;
        let destination_expected_version = destination.version;
        let now = Utc::now();

        source.balance -= cmd.amount;
        source.version += 1;
        source.updated_at = now;

        destination.balance += cmd.amount;
        destination.version += 1;
        destination.updated_at = now;

        if !uow
            .persist_mutation(&source, source_expected_version)
            .await
            .map_err(as_transient)?
        {
            return Err(WalletError::OptimisticLock {
                wallet_id: source.id.to_string(),
            });
        }
        if !uow
            .persist_mutation(&destination, destination_expected_version)
            .await
            .map_err(as_transient)?
        {
            return Err(WalletError::OptimisticLock {
                wallet_id: destination.id.to_string(),
            });
        }

        let correlation_id = Uuid::new_v4();
        let source_transaction_id = Uuid::new_v4();
        let destination_transaction_id = Uuid::new_v4();

        let source_txn = NewTransaction {
            id: source_transaction_id,
            wallet_id: source.id,
            transaction_type: TransactionType::TransferOut,
            amount: cmd.amount,
            reference_id: cmd.reference_id.clone(),
            counterparty_wallet_id: Some(destination.id),
            correlation_id: Some(correlation_id),
            status: TransactionStatus::Completed,
            created_at_override: None,
        };
        let destination_txn = NewTransaction {
            id: destination_transaction_id,
            wallet_id: destination.id,
            transaction_type: TransactionType::TransferIn,
            amount: cmd.amount,
            // Must not reuse `cmd.reference_id`: uniqueness on
            // `(wallet_id, reference_id)` only needs to hold for the source
            // wallet. Keying the destination leg off the correlation id
            // instead means two distinct transfers from different sources
            // into the same destination can safely reuse the same
            // caller-supplied reference_id.
            reference_id: correlation_id.to_string(),
            counterparty_wallet_id: Some(source.id),
            correlation_id: Some(correlation_id),
            status: TransactionStatus::Completed,
            created_at_override: None,
        };

        let source_inserted = uow.insert_transaction(&source_txn).await.map_err(as_transient)?;
        let destination_inserted = uow.insert_transaction(&destination_txn).await.map_err(as_transient)?;

        let (source_transaction_id, destination_transaction_id) =
            match (source_inserted, destination_inserted) {
                (Some(s), Some(d)) => (s, d),
                _ => {
                    // Either leg raced with a prior commit of this reference.
                    // Our mutation hasn't committed; drop `uow` (rollback)
                    // and replay the transfer that already went through.
                    let existing_source = uow
                        .find_transaction_by_reference(cmd.source_wallet_id, &cmd.reference_id)
                        .await
                        .map_err(as_transient)?
                        .ok_or_else(|| WalletError::internal("duplicate insert raced but no row is visible"))?;
                    // The row that won the race is whichever attempt
                    // committed first, so its correlation id is not
                    // necessarily the one generated above - always read it
                    // back off the source leg that is actually visible.
                    let winning_correlation_id = existing_source
                        .correlation_id
                        .ok_or_else(|| WalletError::internal("transfer source leg recorded without a correlation id"))?;
                    let existing_destination = uow
                        .find_transaction_by_correlation(cmd.destination_wallet_id, winning_correlation_id)
                        .await
                        .map_err(as_transient)?
                        .ok_or_else(|| WalletError::internal("duplicate insert raced but no row is visible"))?;
                    return Ok(TransferResult {
                        source_transaction_id: existing_source.id,
                        destination_transaction_id: existing_destination.id,
                    });
                }
            };

        let event = WalletEvent::FundsTransferred {
            source_wallet_id: source.id,
            destination_wallet_id: destination.id,
            source_transaction_id,
            destination_transaction_id,
            amount: cmd.amount,
            reference_id: cmd.reference_id.clone(),
            created_at: now,
        };
        let payload = serde_json::to_value(&event).map_err(|e| WalletError::internal(e.to_string()))?;

        // Two outbox rows, keyed by each side's own wallet id, so the event
        // log's per-wallet partition ordering holds for both legs
        // independently (see `wallet_schemas::WalletEvent::aggregate_id`).
        uow.store_outbox_event(source.id, event.event_type(), payload.clone())
            .await
            .map_err(as_transient)?;
        uow.store_outbox_event(destination.id, event.event_type(), payload)
            .await
            .map_err(as_transient)?;

        self.store.commit(uow).await.map_err(as_transient)?;

        Ok(TransferResult {
            source_transaction_id,
            destination_transaction_id,
        })
    }
}

fn take_wallet(wallets: &[Wallet], wallet_id: Uuid) -> Option<Wallet> {
    wallets.iter().find(|w| w.id == wallet_id).cloned()
}

fn as_transient(error: anyhow::Error) -> WalletError {
    WalletError::Transient {
        message: error.to_string(),
    }
}

impl<S: PrimaryStore + 'static, C: CachePort + 'static> CommandHandler for TransferHandler<S, C> {
    fn kind(&self) -> CommandKind {
        CommandKind::Transfer
    }

    fn handle(&self, cmd: WalletCommand) -> BoxFuture<'_, Result<CommandOutcome, WalletError>> {
        Box::pin(async move {
            let WalletCommand::Transfer(cmd) = cmd else {
                return Err(WalletError::internal("bus dispatched wrong command kind to TransferHandler"));
            };
            let result = self.execute(cmd).await?;
            Ok(CommandOutcome::TransferRecorded {
                source_transaction_id: result.source_transaction_id,
                destination_transaction_id: result.destination_transaction_id,
            })
        })
    }
}
