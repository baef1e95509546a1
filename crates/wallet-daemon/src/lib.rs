//! A thin, non-authoritative `axum` binding of the wallet state engine
//!. This crate performs no business logic of its own: every
//! route only deserializes a request, dispatches it on the command or query
//! bus, and serializes the outcome. All monetary correctness lives in
//! `wallet-engine`; all persistence lives in `wallet-db`.

pub mod adapters;
pub mod api_types;
pub mod routes;
pub mod state;
