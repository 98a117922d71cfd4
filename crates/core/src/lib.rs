//! AttrSync Core — configuration, rule evaluation, domain models, and the
//! cache-backed resilient fetch protocol.

pub mod cache;
pub mod config;
pub mod error;
pub mod fetch;
pub mod models;
pub mod rules;
