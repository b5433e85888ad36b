//! Resilient client facade for the two external dependencies.
//!
//! Every outbound request to the ERP or the context store goes through
//! [`Resilience::call`], which layers a per-target circuit breaker and a
//! retry-with-backoff policy over the raw client. The clients themselves are
//! trait seams ([`ErpClient`], [`ContextStore`]) with in-memory
//! implementations for tests and `reqwest`-backed implementations for
//! production.
//!
//! All facade operations are idempotent by construction — reads,
//! deterministic upserts, idempotent deletes and patches — so retrying any
//! of them is safe.

pub mod breaker;
pub mod context;
pub mod erp;
pub mod error;
pub mod http;
pub mod resilience;
pub mod retry;

pub use breaker::{BreakerConfig, BreakerState, CircuitBreaker};
pub use context::{ContextStore, InMemoryContextStore};
pub use erp::{ErpClient, InMemoryErp};
pub use error::{ClientError, Target};
pub use http::{ErpConfig, HttpContextStore, HttpErpClient};
pub use resilience::Resilience;
pub use retry::RetryPolicy;
