//! Emergency pricing engine: candidate estimates and final job prices.

use chrono::{DateTime, Datelike, FixedOffset, NaiveDate, Timelike, Utc, Weekday};
use std::collections::{HashMap, HashSet};

use crate::models::pricing::CURRENCY;
use crate::models::{
    EmergencyCategory, FinalPrice, FinalPriceRequest, LaborTier, PricingRule, UrgencyLevel,
};

/// Business hours are [08:00, 18:00) local time on weekdays.
const BUSINESS_DAY_START_HOUR: u32 = 8;
const BUSINESS_DAY_END_HOUR: u32 = 18;

pub const DEFAULT_TAX_RATE: f64 = 0.075;

#[derive(Debug, Clone)]
pub struct PricingEngine {
    rules: HashMap<EmergencyCategory, PricingRule>,
    offset: FixedOffset,
    holidays: HashSet<NaiveDate>,
    /// Upper-cased code -> percentage off the subtotal.
    discount_codes: HashMap<String, f64>,
    tax_rate: f64,
}

impl PricingEngine {
    pub fn new(offset: FixedOffset) -> Self {
        Self {
            rules: EmergencyCategory::ALL
                .into_iter()
                .map(|c| (c, PricingRule::for_category(c)))
                .collect(),
            offset,
            holidays: HashSet::new(),
            discount_codes: HashMap::new(),
            tax_rate: DEFAULT_TAX_RATE,
        }
    }

    pub fn with_holidays(mut self, holidays: impl IntoIterator<Item = NaiveDate>) -> Self {
        self.holidays.extend(holidays);
        self
    }

    pub fn with_discount_codes(mut self, codes: impl IntoIterator<Item = (String, f64)>) -> Self {
        self.discount_codes.extend(
            codes
                .into_iter()
                .map(|(code, pct)| (code.trim().to_uppercase(), pct.clamp(0.0, 100.0))),
        );
        self
    }

    pub fn with_tax_rate(mut self, tax_rate: f64) -> Self {
        self.tax_rate = tax_rate;
        self
    }

    pub fn with_rule(mut self, category: EmergencyCategory, rule: PricingRule) -> Self {
        self.rules.insert(category, rule);
        self
    }

    pub fn rule(&self, category: EmergencyCategory) -> PricingRule {
        self.rules
            .get(&category)
            .copied()
            .unwrap_or_else(|| PricingRule::for_category(category))
    }

    /// Labor tier in effect at `now`, evaluated in the configured local offset.
    pub fn labor_tier(&self, now: DateTime<Utc>) -> LaborTier {
        let local = now.with_timezone(&self.offset);
        if self.holidays.contains(&local.date_naive()) {
            return LaborTier::Holiday;
        }
        let weekend = matches!(local.weekday(), Weekday::Sat | Weekday::Sun);
        let hour = local.hour();
        if weekend || !(BUSINESS_DAY_START_HOUR..BUSINESS_DAY_END_HOUR).contains(&hour) {
            LaborTier::AfterHours
        } else {
            LaborTier::Standard
        }
    }

    /// Candidate estimate: call-out plus one labor hour, urgency premium,
    /// distance surcharge, floored at the minimum charge.
    pub fn estimate(
        &self,
        category: EmergencyCategory,
        urgency: UrgencyLevel,
        distance_km: f64,
        now: DateTime<Utc>,
    ) -> f64 {
        let rule = self.rule(category);
        let labor = self.labor_tier(now).rate(&rule);
        let base = (rule.call_out_fee + labor) * (1.0 + rule.premium_fraction(urgency));
        (base + rule.distance_surcharge(distance_km)).max(rule.minimum_charge)
    }

    /// Percentage off for a code; unknown codes give nothing.
    pub fn discount_percentage(&self, code: &str) -> f64 {
        self.discount_codes
            .get(&code.trim().to_uppercase())
            .copied()
            .unwrap_or(0.0)
    }

    /// Itemised final price for a finished job.
    pub fn final_price(
        &self,
        category: EmergencyCategory,
        urgency: UrgencyLevel,
        input: &FinalPriceRequest,
        now: DateTime<Utc>,
    ) -> FinalPrice {
        let rule = self.rule(category);
        let labor_tier = self.labor_tier(now);
        let labor_rate = labor_tier.rate(&rule);
        let labor_cost = labor_rate * input.labor_hours;
        let parts_cost: f64 = input
            .parts
            .iter()
            .filter(|p| !p.is_warranty)
            .map(|p| p.total_price())
            .sum();
        let emergency_premium = (rule.call_out_fee + labor_cost) * rule.premium_fraction(urgency);
        let distance_charge = rule.distance_surcharge(input.distance_km.unwrap_or(0.0));

        let subtotal =
            rule.call_out_fee + labor_cost + parts_cost + emergency_premium + distance_charge;
        let discount = input
            .discount_code
            .as_deref()
            .map_or(0.0, |code| subtotal * self.discount_percentage(code) / 100.0);
        let tax = (subtotal - discount) * self.tax_rate;

        FinalPrice {
            call_out_fee: rule.call_out_fee,
            labor_tier,
            labor_rate,
            labor_hours: input.labor_hours,
            labor_cost,
            parts_cost,
            emergency_premium,
            distance_charge,
            subtotal,
            discount,
            tax,
            total: subtotal - discount + tax,
            currency: CURRENCY.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::PartUsed;
    use chrono::TimeZone;

    fn utc_plus_one() -> FixedOffset {
        FixedOffset::east_opt(3600).unwrap()
    }

    /// Wednesday 2024-03-13 at the given local (UTC+1) hour.
    fn wednesday_at(hour: u32) -> DateTime<Utc> {
        utc_plus_one()
            .with_ymd_and_hms(2024, 3, 13, hour, 0, 0)
            .unwrap()
            .with_timezone(&Utc)
    }

    fn assert_close(a: f64, b: f64) {
        assert!((a - b).abs() < 1e-6, "{a} != {b}");
    }

    #[test]
    fn test_labor_tier_by_local_time() {
        let engine = PricingEngine::new(utc_plus_one());
        assert_eq!(engine.labor_tier(wednesday_at(10)), LaborTier::Standard);
        assert_eq!(engine.labor_tier(wednesday_at(7)), LaborTier::AfterHours);
        assert_eq!(engine.labor_tier(wednesday_at(18)), LaborTier::AfterHours);
        assert_eq!(engine.labor_tier(wednesday_at(17)), LaborTier::Standard);

        let saturday = utc_plus_one()
            .with_ymd_and_hms(2024, 3, 16, 11, 0, 0)
            .unwrap()
            .with_timezone(&Utc);
        assert_eq!(engine.labor_tier(saturday), LaborTier::AfterHours);
    }

    #[test]
    fn test_offset_shifts_business_hours() {
        // 07:30 UTC is 08:30 in UTC+1 but still 07:30 in UTC
        let instant = Utc.with_ymd_and_hms(2024, 3, 13, 7, 30, 0).unwrap();
        assert_eq!(
            PricingEngine::new(utc_plus_one()).labor_tier(instant),
            LaborTier::Standard
        );
        assert_eq!(
            PricingEngine::new(FixedOffset::east_opt(0).unwrap()).labor_tier(instant),
            LaborTier::AfterHours
        );
    }

    #[test]
    fn test_holiday_calendar_wins() {
        let engine = PricingEngine::new(utc_plus_one())
            .with_holidays([NaiveDate::from_ymd_opt(2024, 3, 13).unwrap()]);
        assert_eq!(engine.labor_tier(wednesday_at(10)), LaborTier::Holiday);
    }

    #[test]
    fn test_estimate_critical_plumbing() {
        let engine = PricingEngine::new(utc_plus_one());
        // (15000 + 10000) * 1.5, within free distance
        assert_close(
            engine.estimate(
                EmergencyCategory::Plumbing,
                UrgencyLevel::Critical,
                2.0,
                wednesday_at(10),
            ),
            37_500.0,
        );
        // plus 3 km * 500
        assert_close(
            engine.estimate(
                EmergencyCategory::Plumbing,
                UrgencyLevel::Critical,
                8.0,
                wednesday_at(10),
            ),
            39_000.0,
        );
    }

    #[test]
    fn test_estimate_floors_at_minimum_charge() {
        let cheap = PricingRule {
            call_out_fee: 1_000.0,
            standard_rate: 1_000.0,
            ..PricingRule::for_category(EmergencyCategory::Glass)
        };
        let engine =
            PricingEngine::new(utc_plus_one()).with_rule(EmergencyCategory::Glass, cheap);
        assert_close(
            engine.estimate(
                EmergencyCategory::Glass,
                UrgencyLevel::Scheduled,
                1.0,
                wednesday_at(10),
            ),
            25_000.0,
        );
    }

    #[test]
    fn test_final_price_breakdown() {
        let engine = PricingEngine::new(utc_plus_one())
            .with_discount_codes([("rescue10".to_string(), 10.0)]);
        let input = FinalPriceRequest {
            labor_hours: 2.0,
            parts: vec![
                PartUsed {
                    name: "Valve".into(),
                    quantity: 1,
                    unit_price: 5_000.0,
                    is_warranty: false,
                },
                PartUsed {
                    name: "Seal".into(),
                    quantity: 3,
                    unit_price: 1_000.0,
                    is_warranty: true,
                },
            ],
            distance_km: Some(7.0),
            discount_code: Some("RESCUE10".into()),
        };
        let price = engine.final_price(
            EmergencyCategory::Plumbing,
            UrgencyLevel::Urgent,
            &input,
            wednesday_at(10),
        );

        assert_eq!(price.labor_tier, LaborTier::Standard);
        assert_close(price.labor_cost, 20_000.0);
        assert_close(price.parts_cost, 5_000.0);
        assert_close(price.emergency_premium, 8_750.0);
        assert_close(price.distance_charge, 1_000.0);
        assert_close(price.subtotal, 49_750.0);
        assert_close(price.discount, 4_975.0);
        assert_close(price.tax, (49_750.0 - 4_975.0) * 0.075);
        assert_close(price.total, 49_750.0 - 4_975.0 + price.tax);
        assert_eq!(price.currency, "NGN");
    }

    #[test]
    fn test_unknown_discount_code_is_ignored() {
        let engine = PricingEngine::new(utc_plus_one());
        let input = FinalPriceRequest {
            labor_hours: 1.0,
            discount_code: Some("BOGUS".into()),
            ..Default::default()
        };
        let price = engine.final_price(
            EmergencyCategory::Locksmith,
            UrgencyLevel::Scheduled,
            &input,
            wednesday_at(10),
        );
        assert_eq!(price.discount, 0.0);
        assert_close(price.subtotal, 18_000.0);
    }
}
