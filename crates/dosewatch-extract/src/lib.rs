//! Prescription image extraction.
//!
//! Takes a photographed or scanned prescription and turns it into structured
//! [`NewMedicine`](dosewatch_core::medicine::NewMedicine) entries via a
//! vision-capable LLM. The pipeline is three stages, each separately
//! testable:
//!
//! 1. [`client`] — ship the image to the model, get raw text back;
//! 2. [`parse`] — dig the JSON object out of the (possibly chatty) reply;
//! 3. [`shape`] — normalize the loosely-typed fields into validated
//!    domain values, applying defaults for whatever the model omitted.

mod client;
mod parse;
mod schema;
mod shape;

pub mod error;

pub use client::{GeminiExtractor, VisionExtractor};
pub use error::{Error, Result};
pub use schema::RawMedicine;
pub use shape::shape;
