//! `CreateWallet`: the only write operation with no
//! idempotency key and no existing row to lock - just an insert plus its
//! outbox event, under the transient-failure retry policy.

use crate::bus::CommandHandler;
use crate::outcomes::CommandOutcome;
use crate::ports::{PrimaryStore, WalletUnitOfWork};
use crate::requests::{CommandKind, WalletCommand};
use chrono::Utc;
use futures_util::future::BoxFuture;
use std::sync::Arc;
use uuid::Uuid;
use wallet_resilience::{run_with_retry, DegradationManager, Metrics, RetryPolicy, RetryPolicyKind};
use wallet_schemas::{Wallet, WalletError, WalletEvent};

pub struct CreateWalletHandler<S: PrimaryStore> {
    store: S,
    degradation: Arc<DegradationManager>,
    transient_retry: RetryPolicy,
    metrics: Arc<Metrics>,
}

impl<S: PrimaryStore> CreateWalletHandler<S> {
    pub fn new(
        store: S,
        degradation: Arc<DegradationManager>,
        transient_retry: RetryPolicy,
        metrics: Arc<Metrics>,
    ) -> Self {
        Self {
            store,
            degradation,
            transient_retry,
            metrics,
        }
    }

    async fn execute(&self, user_id: String) -> Result<Uuid, WalletError> {
        self.degradation.gate_mutation()?;

        if user_id.trim().is_empty() {
            return Err(WalletError::validation("user_id must not be empty"));
        }

        let metrics = &self.metrics;
        run_with_retry(
            "create_wallet",
            RetryPolicyKind::Transient,
            &self.transient_retry,
            WalletError::is_transient_retryable,
            |_, _| metrics.incr("retry.transient.create_wallet"),
            || self.try_create(&user_id),
        )
        .await
    }

    async fn try_create(&self, user_id: &str) -> Result<Uuid, WalletError> {
        let wallet_id = Uuid::new_v4();
        let now = Utc::now();
        let wallet = Wallet::new(wallet_id, user_id, now);

        let mut uow = self.store.begin().await.map_err(as_transient)?;
        uow.insert_wallet(&wallet).await.map_err(as_transient)?;

        let event = WalletEvent::WalletCreated {
            wallet_id,
            user_id: user_id.to_string(),
            created_at: now,
        };
        let payload = serde_json::to_value(&event).map_err(|e| WalletError::internal(e.to_string()))?;
        uow.store_outbox_event(wallet_id, event.event_type(), payload)
            .await
            .map_err(as_transient)?;

        self.store.commit(uow).await.map_err(as_transient)?;
        Ok(wallet_id)
    }
}

fn as_transient(error: anyhow::Error) -> WalletError {
    WalletError::Transient {
        message: error.to_string(),
    }
}

impl<S: PrimaryStore + 'static> CommandHandler for CreateWalletHandler<S> {
    fn kind(&self) -> CommandKind {
        CommandKind::CreateWallet
    }

    fn handle(&self, cmd: WalletCommand) -> BoxFuture<'_, Result<CommandOutcome, WalletError>> {
        Box::pin(async move {
            let WalletCommand::CreateWallet(cmd) = cmd else {
                return Err(WalletError::internal("bus dispatched wrong command kind to CreateWalletHandler"));
            };
            let wallet_id = self.execute(cmd.user_id).await?;
            Ok(CommandOutcome::WalletCreated { wallet_id })
        })
    }
}
