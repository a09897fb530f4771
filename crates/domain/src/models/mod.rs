//! Domain models for the rescue dispatch engine.

pub mod emergency;
pub mod pricing;
pub mod sla;
pub mod technician;
pub mod tracking;

pub use emergency::{
    Actor, AssignmentRecord, AssignmentResponse, CancelEmergencyRequest, CreateEmergencyRequest,
    EmergencyCategory, EmergencyLocation, EmergencyRequest, EmergencyStatus, PaymentStatus,
    RequestStatus, StatusUpdate, UrgencyLevel,
};
pub use pricing::{FinalPrice, FinalPriceRequest, LaborTier, PartUsed, PricingRule};
pub use sla::{SlaMetrics, SlaOutcome, SlaStatus};
pub use technician::{
    AvailabilityQuery, MatchCriteria, Technician, TechnicianCandidate, TechnicianMatch,
    TechnicianStatus,
};
pub use tracking::{
    ReportLocationRequest, TechnicianLocation, TrackingSnapshot, TrackingStatus, TrackingUpdate,
};
