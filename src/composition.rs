//! Body composition estimation
//!
//! No skinfold or DEXA data is available, so body fat is estimated from BMI and age
//! with a population-average regression (Deurenberg). The result is approximate and
//! every user-facing rendering should say so.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use crate::models::UserProfile;

/// Disclaimer shown next to any estimated composition value
pub const APPROXIMATION_NOTICE: &str =
    "Body fat is estimated from BMI and age; treat it as a rough guide, not a measurement.";

/// Fat/lean split of a body weight
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BodyComposition {
    /// Estimated body fat percentage
    pub body_fat_pct: Decimal,

    /// Estimated fat mass in kilograms
    pub fat_mass_kg: Decimal,

    /// Remaining (lean) mass in kilograms
    pub lean_mass_kg: Decimal,
}

impl BodyComposition {
    /// Estimate composition for a weight using the profile's height and age
    pub fn estimate(weight_kg: Decimal, profile: &UserProfile) -> Self {
        let body_fat_pct = estimate_body_fat_pct(weight_kg, profile.height_cm, profile.age);
        let (fat_mass_kg, lean_mass_kg) = estimate_composition(weight_kg, body_fat_pct);

        BodyComposition {
            body_fat_pct,
            fat_mass_kg,
            lean_mass_kg,
        }
    }
}

/// Estimate body fat percentage: `1.20 * BMI + 0.23 * age - 16.2`, clamped to [0, 100].
///
/// Callers must pass a positive weight and height.
pub fn estimate_body_fat_pct(weight_kg: Decimal, height_cm: Decimal, age: u16) -> Decimal {
    let height_m = height_cm / dec!(100);
    let bmi = weight_kg / (height_m * height_m);
    let bf_pct = dec!(1.20) * bmi + dec!(0.23) * Decimal::from(age) - dec!(16.2);

    bf_pct.clamp(Decimal::ZERO, dec!(100))
}

/// Split a weight into (fat mass, lean mass) for a body fat percentage
pub fn estimate_composition(weight_kg: Decimal, body_fat_pct: Decimal) -> (Decimal, Decimal) {
    let fat_mass_kg = weight_kg * body_fat_pct / dec!(100);
    let lean_mass_kg = weight_kg - fat_mass_kg;
    (fat_mass_kg, lean_mass_kg)
}
