//! Application services: the dispatch engine, live tracking and the
//! emergency facade the routes call into.

pub mod dispatch;
pub mod emergency;
pub mod registry;
pub mod tracking;
pub mod versioned;

pub use dispatch::{DispatchEngine, DispatchOutcome, DispatchPolicy};
pub use emergency::{Collaborators, EmergencyService, TrackingSettings};
pub use registry::{DispatchRegistry, OfferResponse};
pub use tracking::{TrackingHub, TrackingService};
