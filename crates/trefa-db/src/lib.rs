//! TREFA database layer
//!
//! Postgres repositories over the inventory cache: the image upsert used by the sync
//! and the read queries behind the vehicle listing.

pub mod db;

pub use db::*;
