//! Core types and trait definitions for the dosewatch reminder service.
//!
//! This crate is deliberately free of HTTP and database dependencies.
//! All other crates depend on it; it depends on nothing proprietary.

pub mod error;
pub mod medicine;
pub mod schedule;
pub mod store;
pub mod subject;
pub mod timeparse;

pub use error::{Error, Result};
pub use timeparse::DoseTime;
