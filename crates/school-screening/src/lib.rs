//! Health screening records for school nurses: which screenings each student
//! owes, and how partial multi-visit results accumulate into one record.

pub mod config;
pub mod error;
pub mod roster;
pub mod screening;
pub mod telemetry;
