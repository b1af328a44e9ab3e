//! osintgate - Quota-Gated OSINT Lookup Proxy
//!
//! This crate implements a thin authentication and proxying layer in front of
//! a third-party OSINT lookup API. Callers authenticate with static credentials
//! or by holding an NFT on one of two chains, receive an opaque bearer token,
//! and spend that token against a per-identity fixed-window request quota.

pub mod clock;
pub mod config;
pub mod credentials;
pub mod error;
pub mod gateway;
pub mod oracle;
pub mod ratelimit;
pub mod token;
