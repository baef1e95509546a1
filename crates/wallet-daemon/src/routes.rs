//! Axum router and HTTP handlers for wallet-daemon.
//!
//! `build_router` is the single entry point; `main.rs` calls it and attaches
//! the tracing/CORS middleware layers. Every business-operation handler only
//! deserializes its request, dispatches it on the matching bus, and
//! serializes the outcome or the mapped error - no retry,
//! caching or persistence decision is made here.

use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use uuid::Uuid;

use crate::api_types::{
    command_outcome_into_response, query_outcome_into_response, CreateWalletRequest,
    DegradationResponse, DepositRequest, ErrorResponse, HealthResponse, HistoricalBalanceParams,
    ReadinessResponse, TransferRequest, WithdrawRequest,
};
use crate::state::AppState;
use wallet_engine::bus::DispatchError;
use wallet_engine::requests::{
    CreateWalletCommand, DepositCommand, GetHistoricalBalanceQuery, GetWalletQuery, TransferCommand,
    WalletCommand, WalletQuery, WithdrawCommand,
};
use wallet_schemas::WalletError;

/// Build the complete application router wired to the given shared state.
/// Middleware layers are attached by `main.rs`, not here, so tests can use
/// the bare router.
pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/v1/health", get(health))
        .route("/v1/ready", get(readiness))
        .route("/v1/degradation", get(degradation))
        .route("/v1/metrics", get(metrics))
        .route("/v1/wallets", post(create_wallet))
        .route("/v1/wallets/:wallet_id", get(get_wallet))
        .route("/v1/wallets/:wallet_id/deposit", post(deposit))
        .route("/v1/wallets/:wallet_id/withdraw", post(withdraw))
        .route("/v1/wallets/:wallet_id/historical_balance", get(get_historical_balance))
        .route("/v1/transfers", post(transfer))
        .with_state(state)
}

// ---------------------------------------------------------------------------
// Health probes
// ---------------------------------------------------------------------------

async fn health(State(st): State<Arc<AppState>>) -> impl IntoResponse {
    (
        StatusCode::OK,
        Json(HealthResponse {
            ok: true,
            service: st.build.service,
            version: st.build.version,
        }),
    )
}

async fn readiness(State(st): State<Arc<AppState>>) -> impl IntoResponse {
    let primary_ok = sqlx::query("select 1").execute(&st.readiness.primary).await.is_ok();
    let replica_ok = sqlx::query("select 1").execute(&st.readiness.replica).await.is_ok();
    let cache_ok = st.degradation.is_cache_bypass() || (st.readiness.cache_ping)().await.is_ok();
    let event_log_ok =
        st.degradation.is_event_processing_degraded() || (st.readiness.event_log_ping)().await.is_ok();

    let ready = primary_ok && replica_ok && cache_ok && event_log_ok;
    let status = if ready { StatusCode::OK } else { StatusCode::SERVICE_UNAVAILABLE };

    (
        status,
        Json(ReadinessResponse {
            ready,
            primary_ok,
            replica_ok,
            cache_ok,
            event_log_ok,
        }),
    )
}

async fn degradation(State(st): State<Arc<AppState>>) -> impl IntoResponse {
    let snap = st.degradation.snapshot();
    (
        StatusCode::OK,
        Json(DegradationResponse {
            score: snap.score,
            summary: snap.summary,
            read_only_mode: snap.read_only_mode,
            cache_bypass_mode: snap.cache_bypass_mode,
            event_processing_degraded: snap.event_processing_degraded,
        }),
    )
}

async fn metrics(State(st): State<Arc<AppState>>) -> impl IntoResponse {
    (StatusCode::OK, Json(st.metrics.snapshot()))
}

// ---------------------------------------------------------------------------
// Business operations
// ---------------------------------------------------------------------------

async fn create_wallet(State(st): State<Arc<AppState>>, Json(body): Json<CreateWalletRequest>) -> Response {
    dispatch_command(
        &st,
        WalletCommand::CreateWallet(CreateWalletCommand { user_id: body.user_id }),
    )
    .await
}

async fn deposit(
    State(st): State<Arc<AppState>>,
    Path(wallet_id): Path<Uuid>,
    Json(body): Json<DepositRequest>,
) -> Response {
    dispatch_command(
        &st,
        WalletCommand::Deposit(DepositCommand {
            wallet_id,
            amount: body.amount,
            reference_id: body.reference_id,
        }),
    )
    .await
}

async fn withdraw(
    State(st): State<Arc<AppState>>,
    Path(wallet_id): Path<Uuid>,
    Json(body): Json<WithdrawRequest>,
) -> Response {
    dispatch_command(
        &st,
        WalletCommand::Withdraw(WithdrawCommand {
            wallet_id,
            amount: body.amount,
            reference_id: body.reference_id,
        }),
    )
    .await
}

async fn transfer(State(st): State<Arc<AppState>>, Json(body): Json<TransferRequest>) -> Response {
    dispatch_command(
        &st,
        WalletCommand::Transfer(TransferCommand {
            source_wallet_id: body.source_wallet_id,
            destination_wallet_id: body.destination_wallet_id,
            amount: body.amount,
            reference_id: body.reference_id,
        }),
    )
    .await
}

async fn get_wallet(State(st): State<Arc<AppState>>, Path(wallet_id): Path<Uuid>) -> Response {
    dispatch_query(&st, WalletQuery::GetWallet(GetWalletQuery { wallet_id })).await
}

async fn get_historical_balance(
    State(st): State<Arc<AppState>>,
    Path(wallet_id): Path<Uuid>,
    Query(params): Query<HistoricalBalanceParams>,
) -> Response {
    dispatch_query(
        &st,
        WalletQuery::GetHistoricalBalance(GetHistoricalBalanceQuery {
            wallet_id,
            as_of: params.as_of,
        }),
    )
    .await
}

// ---------------------------------------------------------------------------
// Dispatch + error mapping
// ---------------------------------------------------------------------------

async fn dispatch_command(st: &AppState, cmd: WalletCommand) -> Response {
    match st.command_bus.dispatch(cmd).await {
        Ok(outcome) => command_outcome_into_response(outcome),
        Err(e) => dispatch_error_response(e),
    }
}

async fn dispatch_query(st: &AppState, query: WalletQuery) -> Response {
    match st.query_bus.dispatch(query).await {
        Ok(outcome) => query_outcome_into_response(outcome),
        Err(e) => dispatch_error_response(e),
    }
}

fn dispatch_error_response(err: DispatchError) -> Response {
    match err {
        DispatchError::Bus(bus_err) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(ErrorResponse {
                code: "BUS_ERROR".to_string(),
                message: bus_err.to_string(),
            }),
        )
            .into_response(),
        DispatchError::Handler(wallet_err) => wallet_error_response(wallet_err),
    }
}

fn wallet_error_response(err: WalletError) -> Response {
    let status = match &err {
        WalletError::Validation { .. } => StatusCode::BAD_REQUEST,
        WalletError::WalletNotFound { .. } => StatusCode::NOT_FOUND,
        WalletError::InsufficientFunds { .. } => StatusCode::CONFLICT,
        WalletError::InvalidTransfer { .. } => StatusCode::BAD_REQUEST,
        WalletError::WalletStatusViolation { .. } => StatusCode::CONFLICT,
        WalletError::OptimisticLock { .. } => StatusCode::CONFLICT,
        WalletError::Transient { .. } => StatusCode::SERVICE_UNAVAILABLE,
        WalletError::ServiceDegraded { .. } => StatusCode::SERVICE_UNAVAILABLE,
        WalletError::DuplicateReference { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        WalletError::Internal { .. } => StatusCode::INTERNAL_SERVER_ERROR,
    };

    (
        status,
        Json(ErrorResponse {
            code: err.code().to_string(),
            message: err.to_string(),
        }),
    )
        .into_response()
}
