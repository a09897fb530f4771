//! Pricing rule table and final-price breakdown.

use serde::{Deserialize, Serialize};
use validator::Validate;

use super::emergency::{EmergencyCategory, UrgencyLevel};

pub const CURRENCY: &str = "NGN";

/// Per-category tariff. Premiums are percentages.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PricingRule {
    pub call_out_fee: f64,
    pub minimum_charge: f64,
    pub standard_rate: f64,
    pub after_hours_rate: f64,
    pub holiday_rate: f64,
    pub critical_premium: f64,
    pub urgent_premium: f64,
    pub free_distance_km: f64,
    pub per_km_charge: f64,
}

impl PricingRule {
    /// Default tariff for a category.
    pub fn for_category(category: EmergencyCategory) -> Self {
        let (call_out_fee, minimum_charge) = match category {
            EmergencyCategory::Locksmith => (10_000.0, 15_000.0),
            EmergencyCategory::Hvac => (20_000.0, 30_000.0),
            EmergencyCategory::Roofing => (25_000.0, 40_000.0),
            EmergencyCategory::Pest => (12_000.0, 20_000.0),
            EmergencyCategory::General => (15_000.0, 20_000.0),
            _ => (15_000.0, 25_000.0),
        };
        let (standard_rate, after_hours_rate, holiday_rate) = match category {
            EmergencyCategory::Electrical | EmergencyCategory::Security => {
                (12_000.0, 18_000.0, 24_000.0)
            }
            EmergencyCategory::Locksmith | EmergencyCategory::Pest => (8_000.0, 12_000.0, 16_000.0),
            EmergencyCategory::Hvac | EmergencyCategory::Roofing => (15_000.0, 22_000.0, 30_000.0),
            _ => (10_000.0, 15_000.0, 20_000.0),
        };
        let (critical_premium, urgent_premium) = match category {
            EmergencyCategory::Locksmith | EmergencyCategory::Glass | EmergencyCategory::General => {
                (30.0, 15.0)
            }
            EmergencyCategory::Hvac | EmergencyCategory::Pest => (40.0, 20.0),
            _ => (50.0, 25.0),
        };
        let (free_distance_km, per_km_charge) = match category {
            EmergencyCategory::Roofing => (10.0, 700.0),
            EmergencyCategory::Hvac => (5.0, 600.0),
            EmergencyCategory::Locksmith | EmergencyCategory::Pest => (5.0, 400.0),
            _ => (5.0, 500.0),
        };
        Self {
            call_out_fee,
            minimum_charge,
            standard_rate,
            after_hours_rate,
            holiday_rate,
            critical_premium,
            urgent_premium,
            free_distance_km,
            per_km_charge,
        }
    }

    /// Urgency surcharge as a fraction.
    pub fn premium_fraction(&self, urgency: UrgencyLevel) -> f64 {
        match urgency {
            UrgencyLevel::Critical => self.critical_premium / 100.0,
            UrgencyLevel::Urgent => self.urgent_premium / 100.0,
            UrgencyLevel::SameDay | UrgencyLevel::Scheduled => 0.0,
        }
    }

    /// Charge for travel beyond the free distance.
    pub fn distance_surcharge(&self, distance_km: f64) -> f64 {
        (distance_km - self.free_distance_km).max(0.0) * self.per_km_charge
    }
}

/// Labor tier applied at the moment of calculation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LaborTier {
    Standard,
    AfterHours,
    Holiday,
}

impl LaborTier {
    pub fn rate(&self, rule: &PricingRule) -> f64 {
        match self {
            LaborTier::Standard => rule.standard_rate,
            LaborTier::AfterHours => rule.after_hours_rate,
            LaborTier::Holiday => rule.holiday_rate,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct PartUsed {
    #[validate(length(min = 1, max = 200))]
    pub name: String,

    #[validate(range(min = 1, message = "Quantity must be at least 1"))]
    pub quantity: u32,

    #[validate(custom(function = "shared::validation::validate_amount"))]
    pub unit_price: f64,

    #[serde(default)]
    pub is_warranty: bool,
}

impl PartUsed {
    pub fn total_price(&self) -> f64 {
        self.unit_price * f64::from(self.quantity)
    }
}

/// Inputs for pricing a finished job.
#[derive(Debug, Clone, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct FinalPriceRequest {
    #[validate(custom(function = "shared::validation::validate_amount"))]
    pub labor_hours: f64,

    #[validate(nested)]
    #[serde(default)]
    pub parts: Vec<PartUsed>,

    /// Technician travel distance; zero when omitted.
    #[validate(custom(function = "shared::validation::validate_amount"))]
    pub distance_km: Option<f64>,

    #[validate(length(max = 50))]
    pub discount_code: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FinalPrice {
    pub call_out_fee: f64,
    pub labor_tier: LaborTier,
    pub labor_rate: f64,
    pub labor_hours: f64,
    pub labor_cost: f64,
    pub parts_cost: f64,
    pub emergency_premium: f64,
    pub distance_charge: f64,
    pub subtotal: f64,
    pub discount: f64,
    pub tax: f64,
    pub total: f64,
    pub currency: String,
}
