//! Core engine: accounting over the club's record history.
//!
//! `accounting` holds the pure portfolio computations, `performance` the
//! week-over-week analytics, `accountant` assembles them into a report and
//! `club` runs the load → compute → append cycle against a record store.

pub mod accounting;
pub mod performance;
pub mod accountant;
pub mod club;

pub use accountant::{Accountant, ClubReport, ReportWarning};
pub use club::{Club, PurchaseRequest};
