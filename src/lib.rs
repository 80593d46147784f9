//! Incremental ingestion of HOP card transactions from the Auckland Transport
//! portal into a local SQLite store, with tap-mismatch detection and
//! best-effort Slack notifications.

pub mod config;
pub mod detector;
pub mod engine;
pub mod fetch;
pub mod models;
pub mod notify;
pub mod storage;
pub mod types;
