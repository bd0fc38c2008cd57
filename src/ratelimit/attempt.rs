//! Inputs to the rate limiter.

use std::net::IpAddr;

use crate::error::{GuardError, Result};

/// A single login attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthAttempt {
    pub login: String,
    pub password: String,
    pub ip: IpAddr,
}

impl AuthAttempt {
    pub fn new(login: impl Into<String>, password: impl Into<String>, ip: IpAddr) -> Self {
        Self {
            login: login.into(),
            password: password.into(),
            ip,
        }
    }
}

/// Selects the counters to drop on a bucket reset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BucketKey {
    login: Option<String>,
    ip: Option<IpAddr>,
}

impl BucketKey {
    /// Build a key from an optional login and IP; at least one is required.
    pub fn new(login: Option<String>, ip: Option<IpAddr>) -> Result<Self> {
        let login = login.filter(|l| !l.is_empty());
        if login.is_none() && ip.is_none() {
            return Err(GuardError::InvalidBucketKey);
        }
        Ok(Self { login, ip })
    }

    pub fn login(&self) -> Option<&str> {
        self.login.as_deref()
    }

    pub fn ip(&self) -> Option<IpAddr> {
        self.ip
    }
}
