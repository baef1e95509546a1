//! `Withdraw`: debits a wallet, rejecting the attempt
//! outright (no retry, no row lock held past the check) if it would drive
//! the balance negative.

use super::cache_support::invalidate_best_effort;
use super::validation::{validate_amount, validate_reference_id};
use crate::bus::CommandHandler;
use crate::outcomes::CommandOutcome;
use crate::ports::{PrimaryStore, WalletUnitOfWork};
use crate::requests::{CommandKind, WalletCommand, WithdrawCommand};
use chrono::Utc;
use futures_util::future::BoxFuture;
use std::sync::Arc;
use uuid::Uuid;
use wallet_cache::CachePort;
use wallet_resilience::{run_with_retry, CircuitBreaker, DegradationManager, Metrics, RetryPolicy, RetryPolicyKind};
use wallet_schemas::{NewTransaction, TransactionStatus, TransactionType, WalletError, WalletEvent};

pub struct WithdrawHandler<S: PrimaryStore, C: CachePort> {
    store: S,
    cache: C,
    cache_breaker: Arc<CircuitBreaker>,
    degradation: Arc<DegradationManager>,
    optimistic_lock_retry: RetryPolicy,
    transient_retry: RetryPolicy,
    metrics: Arc<Metrics>,
}

impl<S: PrimaryStore, C: CachePort> WithdrawHandler<S, C> {
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

    async fn execute(&self, cmd: WithdrawCommand) -> Result<Uuid, WalletError> {
        self.degradation.gate_mutation()?;
        validate_amount(cmd.amount)?;
        validate_reference_id(&cmd.reference_id)?;

        let metrics = &self.metrics;
        let cmd = &cmd;

        let transaction_id = run_with_retry(
            "withdraw",
            RetryPolicyKind::Transient,
            &self.transient_retry,
            WalletError::is_transient_retryable,
            |_, _| metrics.incr("retry.transient.withdraw"),
            || async {
                run_with_retry(
                    "withdraw",
                    RetryPolicyKind::OptimisticLock,
                    &self.optimistic_lock_retry,
                    WalletError::is_optimistic_lock_retryable,
                    |_, _| metrics.incr("retry.optimistic_lock.withdraw"),
                    || self.try_withdraw(cmd),
                )
                .await
            },
        )
        .await?;

        invalidate_best_effort(&self.cache, &self.cache_breaker, &self.degradation, cmd.wallet_id).await;
        Ok(transaction_id)
    }

    async fn try_withdraw(&self, cmd: &WithdrawCommand) -> Result<Uuid, WalletError> {
        let mut uow = self.store.begin().await.map_err(as_transient)?;

        if let Some(existing) = uow
            .find_transaction_by_reference(cmd.wallet_id, &cmd.reference_id)
            .await
            .map_err(as_transient)?
        {
            return Ok(existing.id);
        }

        let Some(mut wallet) = uow.load_for_update(cmd.wallet_id).await.map_err(as_transient)? else {
            return Err(WalletError::wallet_not_found(cmd.wallet_id.to_string()));
        };

        if !wallet.status.permits_mutation() {
            return Err(WalletError::WalletStatusViolation {
                wallet_id: wallet.id.to_string(),
                status: wallet.status.as_str().to_string(),
            });
        }

        if wallet.balance < cmd.amount {
            return Err(WalletError::InsufficientFunds {
                available: wallet.balance,
                requested: cmd.amount,
            });
        }

        let expected_version = wallet.version;
        let now = Utc::now();
        wallet.balance -= cmd.amount;
        wallet.version += 1;
        wallet.updated_at = now;

        let persisted = uow
            .persist_mutation(&wallet, expected_version)
            .await
            .map_err(as_transient)?;
        if !persisted {
            return Err(WalletError::OptimisticLock {
                wallet_id: wallet.id.to_string(),
            });
        }

        let transaction_id = Uuid::new_v4();
        let new_txn = NewTransaction {
            id: transaction_id,
            wallet_id: wallet.id,
            transaction_type: TransactionType::Withdrawal,
            amount: cmd.amount,
            reference_id: cmd.reference_id.clone(),
            counterparty_wallet_id: None,
            correlation_id: None,
            status: TransactionStatus::Completed,
            created_at_override: None,
        };

        let inserted = uow.insert_transaction(&new_txn).await.map_err(as_transient)?;
        let Some(transaction_id) = inserted else {
            let existing = uow
                .find_transaction_by_reference(cmd.wallet_id, &cmd.reference_id)
                .await
                .map_err(as_transient)?
                .ok_or_else(|| WalletError::internal("duplicate insert raced but no row is visible"))?;
            return Ok(existing.id);
        };

        let event = WalletEvent::FundsWithdrawn {
            wallet_id: wallet.id,
            transaction_id,
            amount: cmd.amount,
            new_balance: wallet.balance,
            reference_id: cmd.reference_id.clone(),
            created_at: now,
        };
        let payload = serde_json::to_value(&event).map_err(|e| WalletError::internal(e.to_string()))?;
        uow.store_outbox_event(wallet.id, event.event_type(), payload)
            .await
            .map_err(as_transient)?;

        self.store.commit(uow).await.map_err(as_transient)?;
        Ok(transaction_id)
    }
}

fn as_transient(error: anyhow::Error) -> WalletError {
    WalletError::Transient {
        message: error.to_string(),
    }
}

impl<S: PrimaryStore + 'static, C: CachePort + 'static> CommandHandler for WithdrawHandler<S, C> {
    fn kind(&self) -> CommandKind {
        CommandKind::Withdraw
    }

    fn handle(&self, cmd: WalletCommand) -> BoxFuture<'_, Result<CommandOutcome, WalletError>> {
        Box::pin(async move {
            let WalletCommand::Withdraw(cmd) = cmd else {
                return Err(WalletError::internal("bus dispatched wrong command kind to WithdrawHandler"));
            };
            let transaction_id = self.execute(cmd).await?;
            Ok(CommandOutcome::TransactionRecorded { transaction_id })
        })
    }
}
