//! Counter key generation for the three attempt dimensions.

use std::fmt;
use std::net::IpAddr;

/// The attempt dimension a counter tracks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Namespace {
    Ip,
    Login,
    Password,
}

impl Namespace {
    /// Tag prepended to the raw value when building a key.
    pub fn tag(&self) -> &'static str {
        match self {
            Namespace::Ip => "ip",
            Namespace::Login => "login",
            Namespace::Password => "password",
        }
    }
}

/// A key that uniquely identifies a sliding window counter.
///
/// The namespace is part of the key, so `login:admin` and `password:admin`
/// never share a counter.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct WindowKey {
    namespace: Namespace,
    value: String,
}

impl WindowKey {
    /// Create a key in an arbitrary namespace.
    pub fn new(namespace: Namespace, value: impl Into<String>) -> Self {
        Self {
            namespace,
            value: value.into(),
        }
    }

    pub fn ip(addr: IpAddr) -> Self {
        Self::new(Namespace::Ip, addr.to_string())
    }

    pub fn login(login: &str) -> Self {
        Self::new(Namespace::Login, login)
    }

    pub fn password(password: &str) -> Self {
        Self::new(Namespace::Password, password)
    }

    pub fn namespace(&self) -> Namespace {
        self.namespace
    }

    pub fn value(&self) -> &str {
        &self.value
    }
}

impl fmt::Display for WindowKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Passwords end up in debug logs otherwise
        match self.namespace {
            Namespace::Password => write!(f, "{}:<redacted>", self.namespace.tag()),
            _ => write!(f, "{}:{}", self.namespace.tag(), self.value),
        }
    }
}
