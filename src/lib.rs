//! Gauge Trader — autonomous gauge yield trading agent.
//!
//! Library crate exposing all modules for use by integration tests
//! and the binary entry point.

pub mod catalog;
pub mod config;
pub mod connector;
pub mod engine;
pub mod publisher;
pub mod scheduler;
pub mod server;
pub mod signer;
pub mod storage;
pub mod strategy;
pub mod types;
