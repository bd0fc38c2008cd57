//! Antibrute - Anti-Bruteforce Admission Control
//!
//! This crate decides in real time whether a login attempt may proceed. Each
//! attempt is rate limited by source IP, by login and by password using
//! per-key sliding window counters; static whitelist and blacklist networks
//! override the limits.

pub mod cli;
pub mod config;
pub mod ctl;
pub mod error;
pub mod grpc;
pub mod lists;
pub mod ratelimit;
pub mod telemetry;
