//! Core rate limiter implementation.

use async_trait::async_trait;
use tracing::{debug, trace};

use super::attempt::{AuthAttempt, BucketKey};
use super::backend::AdmissionBackend;
use super::key::WindowKey;
use super::registry::WindowRegistry;
use crate::error::Result;
use crate::lists::IpLists;

/// Per-namespace thresholds: the maximum estimated attempts allowed in the
/// trailing window before further attempts are rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Policy {
    pub limit_ip: u64,
    pub limit_login: u64,
    pub limit_password: u64,
}

/// The admission controller.
///
/// Holds no per-call state of its own: counters live in the registry and
/// networks in the list repositories. Safe to share across tasks.
pub struct RateLimiter {
    registry: WindowRegistry,
    lists: IpLists,
    policy: Policy,
}

impl RateLimiter {
    /// Create a limiter over an existing registry and list pair.
    pub fn new(policy: Policy, lists: IpLists, registry: WindowRegistry) -> Self {
        Self {
            registry,
            lists,
            policy,
        }
    }

    pub fn policy(&self) -> Policy {
        self.policy
    }

    pub fn registry(&self) -> &WindowRegistry {
        &self.registry
    }

    pub fn lists(&self) -> &IpLists {
        &self.lists
    }

    /// Decide whether `attempt` may proceed.
    ///
    /// The blacklist is checked first and wins over the whitelist. Neither
    /// list hit touches any counter. Otherwise the IP, login and password
    /// counters are all incremented and checked concurrently, and the
    /// attempt passes only if none of them is over its limit.
    pub async fn is_allowed(&self, attempt: &AuthAttempt) -> Result<bool> {
        if self.lists.blacklist.exists(attempt.ip).await? {
            debug!(ip = %attempt.ip, "Address is blacklisted");
            return Ok(false);
        }

        if self.lists.whitelist.exists(attempt.ip).await? {
            debug!(ip = %attempt.ip, "Address is whitelisted");
            return Ok(true);
        }

        let (ip_ok, login_ok, password_ok) = futures::join!(
            self.check(WindowKey::ip(attempt.ip), self.policy.limit_ip),
            self.check(WindowKey::login(&attempt.login), self.policy.limit_login),
            self.check(WindowKey::password(&attempt.password), self.policy.limit_password),
        );

        let allowed = ip_ok && login_ok && password_ok;
        if !allowed {
            debug!(
                ip = %attempt.ip,
                login = %attempt.login,
                ip_ok,
                login_ok,
                password_ok,
                "Rate limit exceeded"
            );
        }

        Ok(allowed)
    }

    /// Record one attempt against `key` and report whether it is still
    /// within `limit`.
    async fn check(&self, key: WindowKey, limit: u64) -> bool {
        let counter = self.registry.record(&key);
        let within_limit = !counter.is_limit_exceeded(limit);

        trace!(key = %key, count = counter.count(), limit, within_limit, "Checked counter");
        within_limit
    }

    /// Drop the login and/or IP counters selected by `key`.
    ///
    /// Returns `true` if at least one counter existed.
    pub async fn delete_bucket(&self, key: &BucketKey) -> Result<bool> {
        let login_removed = key
            .login()
            .is_some_and(|login| self.registry.remove(&WindowKey::login(login)));
        let ip_removed = key
            .ip()
            .is_some_and(|ip| self.registry.remove(&WindowKey::ip(ip)));

        debug!(
            login = ?key.login(),
            ip = ?key.ip(),
            login_removed,
            ip_removed,
            "Bucket reset"
        );

        Ok(login_removed || ip_removed)
    }
}

#[async_trait]
impl AdmissionBackend for RateLimiter {
    async fn is_allowed(&self, attempt: &AuthAttempt) -> Result<bool> {
        self.is_allowed(attempt).await
    }

    async fn delete_bucket(&self, key: &BucketKey) -> Result<bool> {
        self.delete_bucket(key).await
    }
}
