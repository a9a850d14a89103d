//! Integration tests for the gateway
//!
//! These tests drive the real router over in-memory stores, covering the
//! request flow from authentication through quota, forwarding and metering.

mod chat_completions;
mod health;
mod models;
mod quota;
mod usage_stats;
