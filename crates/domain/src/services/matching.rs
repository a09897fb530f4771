//! Candidate matching and multi-factor scoring.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::sync::Arc;

use super::pricing::PricingEngine;
use super::store::{StoreResult, TechnicianStore};
use crate::models::{
    AvailabilityQuery, MatchCriteria, TechnicianCandidate, TechnicianMatch, UrgencyLevel,
};

/// Rows fetched per matching pass.
pub const MAX_CANDIDATES: usize = 20;

/// Minutes added when a technician has no arrival history.
const NO_HISTORY_BUFFER_MINUTES: f64 = 5.0;

/// Relative weight of each scoring factor.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScoreWeights {
    pub distance: f64,
    pub eta: f64,
    pub rating: f64,
}

impl ScoreWeights {
    pub fn for_urgency(urgency: UrgencyLevel) -> Self {
        let (distance, eta, rating) = match urgency {
            UrgencyLevel::Critical => (0.5, 0.4, 0.1),
            UrgencyLevel::Urgent => (0.4, 0.4, 0.2),
            UrgencyLevel::SameDay | UrgencyLevel::Scheduled => (0.3, 0.3, 0.4),
        };
        Self {
            distance,
            eta,
            rating,
        }
    }
}

/// Per-factor contributions to a candidate's score.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScoreBreakdown {
    pub distance_score: f64,
    pub eta_score: f64,
    pub rating_score: f64,
}

impl ScoreBreakdown {
    pub fn compute(weights: ScoreWeights, distance_km: f64, eta_minutes: f64, rating: f64) -> Self {
        Self {
            distance_score: weights.distance / (1.0 + distance_km / 10.0),
            eta_score: weights.eta / (1.0 + eta_minutes / 30.0),
            rating_score: weights.rating * rating / 5.0,
        }
    }

    pub fn total(&self) -> f64 {
        self.distance_score + self.eta_score + self.rating_score
    }
}

/// Travel-time guess of two minutes per km, blended with history when present.
pub fn candidate_eta_minutes(distance_km: f64, avg_arrival_minutes: f64) -> f64 {
    let travel = distance_km * 2.0;
    if avg_arrival_minutes > 0.0 {
        (travel + avg_arrival_minutes) / 2.0
    } else {
        travel + NO_HISTORY_BUFFER_MINUTES
    }
}

/// Best score first, ties by technician id.
fn rank_order(a: &TechnicianCandidate, b: &TechnicianCandidate) -> Ordering {
    b.score
        .total_cmp(&a.score)
        .then_with(|| a.technician_id.cmp(&b.technician_id))
}

/// Scores and ranks the availability rows for one pass.
pub fn rank_candidates(
    matches: Vec<TechnicianMatch>,
    criteria: &MatchCriteria,
    pricing: &PricingEngine,
    now: DateTime<Utc>,
) -> Vec<TechnicianCandidate> {
    let weights = ScoreWeights::for_urgency(criteria.urgency);
    let mut candidates: Vec<TechnicianCandidate> = matches
        .into_iter()
        .filter_map(|m| {
            let location = m.technician.location?;
            let eta_minutes =
                candidate_eta_minutes(m.distance_km, m.technician.avg_arrival_minutes);
            let score =
                ScoreBreakdown::compute(weights, m.distance_km, eta_minutes, m.technician.rating)
                    .total();
            Some(TechnicianCandidate {
                technician_id: m.technician.id,
                name: m.technician.name,
                photo_url: m.technician.photo_url,
                location,
                rating: m.technician.rating,
                avg_arrival_minutes: m.technician.avg_arrival_minutes,
                distance_km: m.distance_km,
                eta_minutes,
                price_estimate: pricing.estimate(
                    criteria.category,
                    criteria.urgency,
                    m.distance_km,
                    now,
                ),
                score,
            })
        })
        .collect();
    candidates.sort_by(rank_order);
    candidates
}

/// Finds and ranks technicians for a request.
#[derive(Clone)]
pub struct CandidateMatcher {
    technicians: Arc<dyn TechnicianStore>,
    pricing: Arc<PricingEngine>,
    limit: usize,
}

impl CandidateMatcher {
    pub fn new(technicians: Arc<dyn TechnicianStore>, pricing: Arc<PricingEngine>) -> Self {
        Self {
            technicians,
            pricing,
            limit: MAX_CANDIDATES,
        }
    }

    pub fn pricing(&self) -> &PricingEngine {
        &self.pricing
    }

    pub async fn find_candidates(
        &self,
        criteria: &MatchCriteria,
        now: DateTime<Utc>,
    ) -> StoreResult<Vec<TechnicianCandidate>> {
        let query = AvailabilityQuery {
            category: criteria.category,
            origin: criteria.origin,
            radius_km: criteria.radius_km,
            limit: self.limit,
        };
        let matches = self.technicians.find_available(&query).await?;
        tracing::debug!(
            category = %criteria.category,
            radius_km = criteria.radius_km,
            found = matches.len(),
            "Availability query returned"
        );
        Ok(rank_candidates(matches, criteria, &self.pricing, now))
    }
}
