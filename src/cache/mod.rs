//! Status override cache
//!
//! Holds the latest status reported for a payment by an asynchronous
//! notification. Reads of payment status consult this store and let its entry
//! win over the processor's answer.

pub mod error;
pub mod memory;
#[cfg(feature = "cache")]
pub mod redis;

pub use error::{CacheError, CacheResult};
pub use memory::InMemoryStatusStore;
#[cfg(feature = "cache")]
pub use self::redis::RedisStatusStore;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Most recently reported status for a payment.
///
/// This is a status-only shadow of the processor's record: it never carries
/// amounts or other payment fields.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentStatusOverride {
    pub payment_id: String,
    pub status: String,
    pub updated_at: DateTime<Utc>,
}

impl PaymentStatusOverride {
    pub fn new(payment_id: impl Into<String>, status: impl Into<String>) -> Self {
        Self {
            payment_id: payment_id.into(),
            status: status.into(),
            updated_at: Utc::now(),
        }
    }
}

/// Keyed store of status overrides, one entry per payment id.
///
/// `set` replaces any previous entry outright. Entries never expire.
#[async_trait]
pub trait StatusOverrideStore: Send + Sync {
    /// Record `status` for `payment_id`, stamped with the current time
    async fn set(&self, payment_id: &str, status: &str) -> CacheResult<PaymentStatusOverride>;

    /// Look up the override for `payment_id`; `None` when nothing was recorded
    async fn get(&self, payment_id: &str) -> CacheResult<Option<PaymentStatusOverride>>;

    /// Short backend name for diagnostics
    fn backend(&self) -> &'static str;

    /// Whether the backend is reachable; stores without a remote side are
    /// always healthy
    async fn health_check(&self) -> CacheResult<()> {
        Ok(())
    }
}
