//! CLUBLEDGER: investment club contribution and crypto ledger
//!
//! Library crate exposing all modules for use by integration tests
//! and the binary entry point.

pub mod config;
pub mod types;
pub mod prices;
pub mod storage;
pub mod engine;
pub mod export;
pub mod dashboard;
pub mod cli;
