//! Request and response bodies for every wallet-daemon HTTP endpoint.
//!
//! These types are pure data - they deserialize a request, or serialize a
//! bus outcome. No validation or business logic lives here; that is the
//! handlers' job.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use wallet_engine::{CommandOutcome, HistoricalBalanceView, QueryOutcome, WalletView};
use wallet_schemas::WalletStatus;

#[derive(Debug, Deserialize)]
pub struct CreateWalletRequest {
    pub user_id: String,
}

#[derive(Debug, Serialize)]
pub struct CreateWalletResponse {
    pub wallet_id: Uuid,
}

#[derive(Debug, Deserialize)]
pub struct DepositRequest {
    pub amount: Decimal,
    pub reference_id: String,
}

#[derive(Debug, Deserialize)]
pub struct WithdrawRequest {
    pub amount: Decimal,
    pub reference_id: String,
}

#[derive(Debug, Serialize)]
pub struct TransactionResponse {
    pub transaction_id: Uuid,
}

#[derive(Debug, Deserialize)]
pub struct TransferRequest {
    pub source_wallet_id: Uuid,
    pub destination_wallet_id: Uuid,
    pub amount: Decimal,
    pub reference_id: String,
}

#[derive(Debug, Serialize)]
pub struct TransferResponse {
    pub source_transaction_id: Uuid,
    pub destination_transaction_id: Uuid,
}

#[derive(Debug, Serialize)]
pub struct WalletResponse {
    pub id: Uuid,
    pub user_id: String,
    pub balance: Decimal,
    pub status: WalletStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<WalletView> for WalletResponse {
    fn from(v: WalletView) -> Self {
        Self {
            id: v.id,
            user_id: v.user_id,
            balance: v.balance,
            status: v.status,
            created_at: v.created_at,
            updated_at: v.updated_at,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct HistoricalBalanceParams {
    pub as_of: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
pub struct HistoricalBalanceResponse {
    pub wallet_id: Uuid,
    pub balance: Decimal,
    pub timestamp: DateTime<Utc>,
}

impl From<HistoricalBalanceView> for HistoricalBalanceResponse {
    fn from(v: HistoricalBalanceView) -> Self {
        Self {
            wallet_id: v.wallet_id,
            balance: v.balance,
            timestamp: v.timestamp,
        }
    }
}

/// A bus-dispatched command never returns anything other than the three
/// outcome shapes a route actually expects; this only exists so a route
/// handler can `match` without repeating `unreachable!()` boilerplate.
pub(crate) fn command_outcome_into_response(outcome: CommandOutcome) -> axum::response::Response {
    use axum::response::IntoResponse;
    use axum::Json;

    match outcome {
        CommandOutcome::WalletCreated { wallet_id } => {
            (axum::http::StatusCode::CREATED, Json(CreateWalletResponse { wallet_id })).into_response()
        }
        CommandOutcome::TransactionRecorded { transaction_id } => {
            (axum::http::StatusCode::OK, Json(TransactionResponse { transaction_id })).into_response()
        }
        CommandOutcome::TransferRecorded {
            source_transaction_id,
            destination_transaction_id,
        } => (
            axum::http::StatusCode::OK,
            Json(TransferResponse {
                source_transaction_id,
                destination_transaction_id,
            }),
        )
            .into_response(),
    }
}

pub(crate) fn query_outcome_into_response(outcome: QueryOutcome) -> axum::response::Response {
    use axum::response::IntoResponse;
    use axum::Json;

    match outcome {
        QueryOutcome::Wallet(view) => (axum::http::StatusCode::OK, Json(WalletResponse::from(view))).into_response(),
        QueryOutcome::HistoricalBalance(view) => {
            (axum::http::StatusCode::OK, Json(HistoricalBalanceResponse::from(view))).into_response()
        }
    }
}

/// Error body for every non-2xx response.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub code: String,
    pub message: String,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub ok: bool,
    pub service: &'static str,
    pub version: &'static str,
}

#[derive(Debug, Serialize)]
pub struct ReadinessResponse {
    pub ready: bool,
    pub primary_ok: bool,
    pub replica_ok: bool,
    pub cache_ok: bool,
    pub event_log_ok: bool,
}

#[derive(Debug, Serialize)]
pub struct DegradationResponse {
    pub score: u8,
    pub summary: String,
    pub read_only_mode: bool,
    pub cache_bypass_mode: bool,
    pub event_processing_degraded: bool,
}
