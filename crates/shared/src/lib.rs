//! Shared utilities for the Rescue Dispatch backend.
//!
//! This crate provides functionality used across the other crates:
//! - Great-circle distance between coordinates
//! - Coordinate and telemetry validation

pub mod distance;
pub mod validation;

pub use distance::{haversine_km, GeoPoint};
