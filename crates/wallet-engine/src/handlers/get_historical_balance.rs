//! `GetHistoricalBalance`: folds every `COMPLETED`
//! transaction up to `as_of` to reconstruct the balance a wallet held at a
//! point in time. Never touches the cache - a point-in-time query is not
//! the cache-aside read path's concern.

use super::validation::validate_wallet_exists;
use crate::bus::QueryHandler;
use crate::outcomes::{HistoricalBalanceView, QueryOutcome};
use crate::ports::ReplicaStore;
use crate::requests::{GetHistoricalBalanceQuery, QueryKind, WalletQuery};
use futures_util::future::BoxFuture;
use rust_decimal::Decimal;
use wallet_schemas::WalletError;

pub struct GetHistoricalBalanceHandler<R: ReplicaStore> {
    replica: R,
}

impl<R: ReplicaStore> GetHistoricalBalanceHandler<R> {
    pub fn new(replica: R) -> Self {
        Self { replica }
    }

    async fn execute(&self, query: GetHistoricalBalanceQuery) -> Result<HistoricalBalanceView, WalletError> {
        // Confirms the wallet exists; the fold itself tolerates a wallet
        // with zero transactions (balance zero) either way.
        validate_wallet_exists(self.replica.find_wallet(query.wallet_id).await, query.wallet_id)?;

        let transactions = self
            .replica
            .completed_transactions_up_to(query.wallet_id, query.as_of)
            .await
            .map_err(|e| WalletError::Transient {
                message: e.to_string(),
            })?;

        let balance = transactions
            .iter()
            .fold(Decimal::ZERO, |acc, txn| {
                acc + txn.amount * Decimal::from(txn.transaction_type.fold_sign())
            });

        Ok(HistoricalBalanceView {
            wallet_id: query.wallet_id,
            balance,
            timestamp: query.as_of,
        })
    }
}

impl<R: ReplicaStore + 'static> QueryHandler for GetHistoricalBalanceHandler<R> {
    fn kind(&self) -> QueryKind {
        QueryKind::GetHistoricalBalance
    }

    fn handle(&self, query: WalletQuery) -> BoxFuture<'_, Result<QueryOutcome, WalletError>> {
        Box::pin(async move {
            let WalletQuery::GetHistoricalBalance(query) = query else {
                return Err(WalletError::internal(
                    "bus dispatched wrong query kind to GetHistoricalBalanceHandler",
                ));
            };
            let view = self.execute(query).await?;
            Ok(QueryOutcome::HistoricalBalance(view))
        })
    }
}
