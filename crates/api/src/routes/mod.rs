//! HTTP route handlers.

pub mod emergencies;
pub mod health;
pub mod technicians;
