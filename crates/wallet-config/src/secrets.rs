//! Secret resolution.
//!
//! # Contract
//! - Config YAML never carries secret *values*, only environment variable
//!   names (or, for the wallet service, fixed well-known variable names).
//! - Connection strings (primary/replica database, cache, event log) are
//!   read from the environment only; they are never written into the
//!   merged config dump exposed to a diagnostics endpoint.
//! - `Debug` impls redact every field.

use std::env;

pub const ENV_PRIMARY_DATABASE_URL: &str = "WALLET_PRIMARY_DATABASE_URL";
pub const ENV_REPLICA_DATABASE_URL: &str = "WALLET_REPLICA_DATABASE_URL";
pub const ENV_CACHE_URL: &str = "WALLET_CACHE_URL";
pub const ENV_EVENTLOG_BROKERS: &str = "WALLET_EVENTLOG_BROKERS";

/// Connection secrets resolved once at process start and passed into
/// constructors. Never scatter `std::env::var` calls across the codebase.
#[derive(Clone)]
pub struct ResolvedSecrets {
    pub primary_database_url: String,
    pub replica_database_url: String,
    pub cache_url: String,
    pub eventlog_brokers: String,
}

impl std::fmt::Debug for ResolvedSecrets {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResolvedSecrets")
            .field("primary_database_url", &"<REDACTED>")
            .field("replica_database_url", &"<REDACTED>")
            .field("cache_url", &"<REDACTED>")
            .field("eventlog_brokers", &"<REDACTED>")
            .finish()
    }
}

fn resolve_env(var_name: &str) -> Option<String> {
    match env::var(var_name) {
        Ok(v) if !v.trim().is_empty() => Some(v),
        _ => None,
    }
}

/// Resolve every connection secret from the environment.
///
/// # Errors
/// Returns `Err` naming the first missing variable (never its value).
/// The replica URL falls back to the primary URL when unset, matching a
/// single-node deployment where no read replica exists yet.
pub fn resolve_secrets() -> anyhow::Result<ResolvedSecrets> {
    let primary_database_url = resolve_env(ENV_PRIMARY_DATABASE_URL)
        .ok_or_else(|| anyhow::anyhow!("missing required env var {ENV_PRIMARY_DATABASE_URL}"))?;
    let replica_database_url =
        resolve_env(ENV_REPLICA_DATABASE_URL).unwrap_or_else(|| primary_database_url.clone());
    let cache_url = resolve_env(ENV_CACHE_URL)
        .ok_or_else(|| anyhow::anyhow!("missing required env var {ENV_CACHE_URL}"))?;
    let eventlog_brokers = resolve_env(ENV_EVENTLOG_BROKERS)
        .ok_or_else(|| anyhow::anyhow!("missing required env var {ENV_EVENTLOG_BROKERS}"))?;

    Ok(ResolvedSecrets {
        primary_database_url,
        replica_database_url,
        cache_url,
        eventlog_brokers,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn debug_impl_redacts_every_field() {
        let s = ResolvedSecrets {
            primary_database_url: "postgres://u:p@host/db".into(),
            replica_database_url: "postgres://u:p@host2/db".into(),
            cache_url: "redis://host:6379".into(),
            eventlog_brokers: "kafka://host:9092".into(),
        };
        let dbg = format!("{s:?}");
        assert!(!dbg.contains("postgres://"));
        assert!(!dbg.contains("redis://"));
        assert!(!dbg.contains("kafka://"));
        assert!(dbg.contains("<REDACTED>"));
    }
}
