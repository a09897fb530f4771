//! Domain services for the rescue dispatch engine.
//!
//! Pure calculators plus the collaborator traits the engine is written against.

pub mod matching;
pub mod notification;
pub mod pricing;
pub mod sla;
pub mod store;
pub mod tracking;

pub use matching::{
    candidate_eta_minutes, rank_candidates, CandidateMatcher, ScoreBreakdown, ScoreWeights,
    MAX_CANDIDATES,
};
pub use notification::{
    CustomerUpdatePayload, JobOfferPayload, MockNotificationService, NotificationPayload,
    NotificationResult, NotificationService, NotificationType, SentNotification,
    SupportAlertPayload,
};
pub use pricing::PricingEngine;
pub use store::{
    EmergencyStore, LocationCache, PageCursor, SlaStore, StoreResult, TechnicianStore,
};
pub use tracking::TrackingPolicy;
