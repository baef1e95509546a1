//! Layered YAML configuration, secret resolution and typed settings for the
//! wallet service.
//!
//! Config files carry tunables (retry budgets, cache TTLs, outbox batch
//! sizes); connection strings always come from the environment (see
//! [`secrets`]). The merged, canonicalized config is hashed so two
//! deployments can be compared by `config_hash` alone.

pub mod loader;
pub mod secrets;
pub mod settings;

pub use loader::{load_layered_yaml, LoadedConfig};
pub use secrets::{resolve_secrets, ResolvedSecrets};
pub use settings::{
    enforce_unused_keys, unused_pointers, CacheConfig, CircuitConfig, DegradationConfig,
    EventLogConfig, OutboxConfig, RetryConfig, RetryPolicyConfig, ServerConfig, WalletSettings,
};
