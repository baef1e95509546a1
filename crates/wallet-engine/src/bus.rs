//! The command/query dispatch core.
//!
//! Two independent, type-indexed registries: one for commands (mutating,
//! return a result value), one for queries (read-only). Each request type
//! maps to at most one handler. Dispatch is synchronous from the caller's
//! perspective and resolves the handler's future.
//!
//! The bus itself never retries, never opens a transaction, and never
//! translates an error other than the no-handler case - those are handler
//! responsibilities. It only widens a single
//! point for cross-cutting concerns: per-kind dispatch counters and
//! latency, plus a bus-level error counter distinct from handler errors.

use crate::outcomes::{CommandOutcome, QueryOutcome};
use crate::requests::{CommandKind, QueryKind, WalletCommand, WalletQuery};
use futures_util::future::BoxFuture;
use std::collections::HashMap;
use std::time::Instant;
use wallet_resilience::Metrics;
use wallet_schemas::WalletError;

/// Bus-level failure, distinct from any `WalletError` a handler returns.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BusError {
    NoHandlerRegistered { kind: &'static str },
    HandlerAlreadyRegistered { kind: &'static str },
}

impl std::fmt::Display for BusError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BusError::NoHandlerRegistered { kind } => write!(f, "no handler registered for {kind}"),
            BusError::HandlerAlreadyRegistered { kind } => {
                write!(f, "a handler is already registered for {kind}")
            }
        }
    }
}

impl std::error::Error for BusError {}

/// Outcome of `dispatch`: either a handler error (surfaced to the transport
/// layer with its stable code) or a bus-level routing error.
#[derive(Debug, Clone, PartialEq)]
pub enum DispatchError {
    Handler(WalletError),
    Bus(BusError),
}

impl std::fmt::Display for DispatchError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DispatchError::Handler(e) => write!(f, "{e}"),
            DispatchError::Bus(e) => write!(f, "{e}"),
        }
    }
}

impl std::error::Error for DispatchError {}

/// Object-safe command handler: boxes its future so many differently-typed
/// generic handlers (each instantiated over a concrete `PrimaryStore` /
/// `CachePort`) can live behind one `Box<dyn CommandHandler>` in the
/// registry.
pub trait CommandHandler: Send + Sync {
    fn kind(&self) -> CommandKind;
    fn handle(&self, cmd: WalletCommand) -> BoxFuture<'_, Result<CommandOutcome, WalletError>>;
}

pub trait QueryHandler: Send + Sync {
    fn kind(&self) -> QueryKind;
    fn handle(&self, query: WalletQuery) -> BoxFuture<'_, Result<QueryOutcome, WalletError>>;
}

/// The command (write) registry.
pub struct CommandBus {
    handlers: HashMap<CommandKind, Box<dyn CommandHandler>>,
    metrics: std::sync::Arc<Metrics>,
}

impl CommandBus {
    pub fn new(metrics: std::sync::Arc<Metrics>) -> Self {
        Self {
            handlers: HashMap::new(),
            metrics,
        }
    }

    /// Register `handler` for its `kind()`. At most one handler per kind;
    /// registering a second handler for the same kind is a construction-time
    /// error, not something a caller should recover from at request time.
    pub fn register(&mut self, handler: Box<dyn CommandHandler>) -> Result<(), BusError> {
        let kind = handler.kind();
        if self.handlers.contains_key(&kind) {
            return Err(BusError::HandlerAlreadyRegistered {
                kind: kind_name(kind),
            });
        }
        self.handlers.insert(kind, handler);
        Ok(())
    }

    pub async fn dispatch(&self, cmd: WalletCommand) -> Result<CommandOutcome, DispatchError> {
        let kind = cmd.kind();
        let metric_name = kind_name(kind);
        let Some(handler) = self.handlers.get(&kind) else {
            self.metrics.incr("bus.no_handler_registered");
            return Err(DispatchError::Bus(BusError::NoHandlerRegistered {
                kind: metric_name,
            }));
        };

        self.metrics.incr(&format!("bus.command.{metric_name}.dispatched"));
        let start = Instant::now();
        let result = handler.handle(cmd).await;
        self.metrics
            .record_timer(&format!("bus.command.{metric_name}.latency"), start.elapsed());

        result.map_err(|e| {
            self.metrics.incr(&format!("bus.command.{metric_name}.error"));
            DispatchError::Handler(e)
        })
    }
}

/// The query (read) registry. Structurally identical to [`CommandBus`]; kept
/// as a distinct type so the command/query separation invariant (queries
/// never mutate) is visible at the type level, not just by convention.
pub struct QueryBus {
    handlers: HashMap<QueryKind, Box<dyn QueryHandler>>,
    metrics: std::sync::Arc<Metrics>,
}

impl QueryBus {
    pub fn new(metrics: std::sync::Arc<Metrics>) -> Self {
        Self {
            handlers: HashMap::new(),
            metrics,
        }
    }

    pub fn register(&mut self, handler: Box<dyn QueryHandler>) -> Result<(), BusError> {
        let kind = handler.kind();
        if self.handlers.contains_key(&kind) {
            return Err(BusError::HandlerAlreadyRegistered {
                kind: query_kind_name(kind),
            });
        }
        self.handlers.insert(kind, handler);
        Ok(())
    }

    pub async fn dispatch(&self, query: WalletQuery) -> Result<QueryOutcome, DispatchError> {
        let kind = query.kind();
        let metric_name = query_kind_name(kind);
        let Some(handler) = self.handlers.get(&kind) else {
            self.metrics.incr("bus.no_handler_registered");
            return Err(DispatchError::Bus(BusError::NoHandlerRegistered {
                kind: metric_name,
            }));
        };

        self.metrics.incr(&format!("bus.query.{metric_name}.dispatched"));
        let start = Instant::now();
        let result = handler.handle(query).await;
        self.metrics
            .record_timer(&format!("bus.query.{metric_name}.latency"), start.elapsed());

        result.map_err(|e| {
            self.metrics.incr(&format!("bus.query.{metric_name}.error"));
            DispatchError::Handler(e)
        })
    }
}

fn kind_name(kind: CommandKind) -> &'static str {
    match kind {
        CommandKind::CreateWallet => "create_wallet",
        CommandKind::Deposit => "deposit",
        CommandKind::Withdraw => "withdraw",
        CommandKind::Transfer => "transfer",
    }
}

fn query_kind_name(kind: QueryKind) -> &'static str {
    match kind {
        QueryKind::GetWallet => "get_wallet",
        QueryKind::GetHistoricalBalance => "get_historical_balance",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::requests::CreateWalletCommand;
    use std::sync::Arc;
    use uuid::Uuid;

    struct StubCreateWalletHandler;

    impl CommandHandler for StubCreateWalletHandler {
        fn kind(&self) -> CommandKind {
            CommandKind::CreateWallet
        }

        fn handle(&self, _cmd: WalletCommand) -> BoxFuture<'_, Result<CommandOutcome, WalletError>> {
            Box::pin(async move {
                Ok(CommandOutcome::WalletCreated {
                    wallet_id: Uuid::nil(),
                })
            })
        }
    }

    #[tokio::test]
    async fn dispatch_routes_to_the_registered_handler() {
        let metrics = Arc::new(Metrics::new());
        let mut bus = CommandBus::new(metrics.clone());
        bus.register(Box::new(StubCreateWalletHandler)).unwrap();

        let outcome = bus
            .dispatch(WalletCommand::CreateWallet(CreateWalletCommand {
                user_id: "u1".into(),
            }))
            .await
            .unwrap();

        assert_eq!(
            outcome,
            CommandOutcome::WalletCreated {
                wallet_id: Uuid::nil()
            }
        );
        assert_eq!(metrics.counter_value("bus.command.create_wallet.dispatched"), 1);
    }

    #[tokio::test]
    async fn dispatch_without_a_registered_handler_fails_with_no_handler_registered() {
        let metrics = Arc::new(Metrics::new());
        let bus = CommandBus::new(metrics);

        let err = bus
            .dispatch(WalletCommand::CreateWallet(CreateWalletCommand {
                user_id: "u1".into(),
            }))
            .await
            .unwrap_err();

        assert_eq!(
            err,
            DispatchError::Bus(BusError::NoHandlerRegistered {
                kind: "create_wallet"
            })
        );
    }

    #[test]
    fn registering_a_second_handler_for_the_same_kind_is_rejected() {
        let metrics = Arc::new(Metrics::new());
        let mut bus = CommandBus::new(metrics);
        bus.register(Box::new(StubCreateWalletHandler)).unwrap();
        let err = bus.register(Box::new(StubCreateWalletHandler)).unwrap_err();
        assert_eq!(
            err,
            BusError::HandlerAlreadyRegistered {
                kind: "create_wallet"
            }
        );
    }
}
