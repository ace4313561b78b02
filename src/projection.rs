//! Completion-date projection for a phase
//!
//! Projects the remaining weeks to a phase target either from the configured pace
//! band (once a real downward trend exists) or from the phase's default duration.

use chrono::{Days, NaiveDate};
use rust_decimal::prelude::*;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::models::{Phase, PhaseId, WeighIn};
use crate::trend::{self, MEANINGFUL_TREND_KG};

/// Window used to decide whether a trend is established
pub const PROJECTION_TREND_WEEKS: usize = 4;

/// How the week range was obtained
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProjectionBasis {
    /// Target already reached
    GoalReached,
    /// Remaining kg divided by the phase pace band
    Trend,
    /// Phase default duration (no established trend yet)
    PhaseDefaults,
}

/// Projected completion window
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Projection {
    /// Fewest weeks to the target
    pub weeks_min: u32,

    /// Most weeks to the target
    pub weeks_max: u32,

    /// Earliest completion date
    pub date_min: NaiveDate,

    /// Latest completion date
    pub date_max: NaiveDate,

    /// Source of the estimate
    pub basis: ProjectionBasis,
}

impl Projection {
    fn goal_reached(today: NaiveDate) -> Self {
        Projection {
            weeks_min: 0,
            weeks_max: 0,
            date_min: today,
            date_max: today,
            basis: ProjectionBasis::GoalReached,
        }
    }

    /// e.g. "Jan 5 – Mar 2, 2025"
    pub fn date_range_label(&self) -> String {
        format!(
            "{} – {}",
            self.date_min.format("%b %-d"),
            self.date_max.format("%b %-d, %Y")
        )
    }
}

/// Entries recorded while the given phase was active
pub fn phase_history(history: &[WeighIn], phase_id: PhaseId) -> Vec<WeighIn> {
    history
        .iter()
        .filter(|w| w.phase_id == phase_id)
        .cloned()
        .collect()
}

/// Project the week and date range to reach `target_kg`.
///
/// `phase_history` must only contain entries of the projected phase. Note that the
/// faster pace bound gives the smaller week count, so `weeks_min` uses
/// `weekly_loss_max_kg` and `weeks_max` uses `weekly_loss_min_kg`.
pub fn project(
    current_kg: Decimal,
    target_kg: Decimal,
    phase: &Phase,
    phase_history: &[WeighIn],
    today: NaiveDate,
) -> Projection {
    let remaining = current_kg - target_kg;
    if remaining <= Decimal::ZERO {
        return Projection::goal_reached(today);
    }

    let avg_loss_per_week = trend::trend_slope(phase_history, PROJECTION_TREND_WEEKS);

    let (weeks_min, weeks_max, basis) = if avg_loss_per_week > MEANINGFUL_TREND_KG {
        (
            weeks_at_pace(remaining, phase.weekly_loss_max_kg, phase.estimated_duration_weeks_min),
            weeks_at_pace(remaining, phase.weekly_loss_min_kg, phase.estimated_duration_weeks_max),
            ProjectionBasis::Trend,
        )
    } else {
        (
            phase.estimated_duration_weeks_min,
            phase.estimated_duration_weeks_max,
            ProjectionBasis::PhaseDefaults,
        )
    };

    tracing::debug!(
        phase = %phase.id,
        %remaining,
        %avg_loss_per_week,
        weeks_min,
        weeks_max,
        ?basis,
        "Projected phase completion"
    );

    Projection {
        weeks_min,
        weeks_max,
        date_min: add_weeks(today, weeks_min),
        date_max: add_weeks(today, weeks_max),
        basis,
    }
}

/// Remaining kg over a weekly pace, rounded up to whole weeks.
/// A non-positive pace falls back to the phase default.
fn weeks_at_pace(remaining: Decimal, pace: Decimal, fallback: u32) -> u32 {
    if pace <= Decimal::ZERO {
        return fallback;
    }
    (remaining / pace).ceil().to_u32().unwrap_or(u32::MAX)
}

fn add_weeks(today: NaiveDate, weeks: u32) -> NaiveDate {
    today
        .checked_add_days(Days::new(u64::from(weeks) * 7))
        .unwrap_or(NaiveDate::MAX)
}
