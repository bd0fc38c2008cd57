//! Admission backend trait consumed by the request surface.

use async_trait::async_trait;

use super::attempt::{AuthAttempt, BucketKey};
use crate::error::Result;

/// Trait for admission control implementations.
///
/// The gRPC service is generic over this so it can be exercised against a
/// stub in tests.
#[async_trait]
pub trait AdmissionBackend: Send + Sync {
    /// Decide whether `attempt` may proceed.
    async fn is_allowed(&self, attempt: &AuthAttempt) -> Result<bool>;

    /// Drop the counters selected by `key`. Returns whether any existed.
    async fn delete_bucket(&self, key: &BucketKey) -> Result<bool>;
}
