//! Integration tests for the club ledger.
//!
//! Run against the public library API only: file-backed store, price
//! service and accountant wired together the way the binary wires them.

mod mock_prices;
mod scenarios;
mod file_store;
