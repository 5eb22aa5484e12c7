//! Data models for the application
//!
//! Source records and attachment tasks feed the image sync; the run report is its
//! output. Vehicles are the read side of the same inventory cache.

mod record;
mod report;
mod vehicle;

pub use record::*;
pub use report::*;
pub use vehicle::*;
