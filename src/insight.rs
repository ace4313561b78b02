//! Weekly insight classification and rendering
//!
//! Classification is a pure function over the weekly delta, the 4-week trend and the
//! phase pace band. Turning a classified insight into prose is a separate step behind
//! [`InsightFormatter`].

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::models::{Phase, PhaseId};

/// Absolute weekly change below which a week counts as flat
pub const STALL_THRESHOLD_KG: Decimal = dec!(0.1);

/// Narrative category, first match wins in declaration order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InsightCategory {
    /// Loss within the phase pace band
    OnTrack,
    /// Loss above the phase's upper pace bound
    FasterThanExpected,
    /// Weight went up
    Gain,
    /// Effectively no change
    Stall,
    /// Loss below the expected pace
    SlowProgress,
}

/// A classified weigh-in with the numbers its message is built from
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Insight {
    pub category: InsightCategory,

    /// Change versus the previous weigh-in (negative = loss)
    pub weekly_delta_kg: Decimal,

    /// 4-week trend in kg per week (positive = losing)
    pub trend_kg: Decimal,

    /// Kg lost across the 4-week window (negative = gained)
    pub window_loss_kg: Decimal,

    /// Kg left to the phase target
    pub remaining_kg: Decimal,

    /// Phase the weigh-in belongs to
    pub phase_id: PhaseId,
}

/// Classify a weigh-in
pub fn classify(
    weekly_delta_kg: Decimal,
    trend_kg: Decimal,
    phase: &Phase,
    current_weight_kg: Decimal,
) -> Insight {
    let fastest = -phase.weekly_loss_max_kg;
    let slowest = -phase.weekly_loss_min_kg;

    let category = if weekly_delta_kg >= fastest && weekly_delta_kg <= slowest {
        InsightCategory::OnTrack
    } else if weekly_delta_kg < fastest {
        InsightCategory::FasterThanExpected
    } else if weekly_delta_kg > Decimal::ZERO {
        InsightCategory::Gain
    } else if weekly_delta_kg.abs() < STALL_THRESHOLD_KG {
        InsightCategory::Stall
    } else {
        InsightCategory::SlowProgress
    };

    Insight {
        category,
        weekly_delta_kg,
        trend_kg,
        window_loss_kg: Decimal::ZERO,
        remaining_kg: current_weight_kg - phase.target_weight_kg,
        phase_id: phase.id,
    }
}

/// Turns a classified insight into user-facing text
pub trait InsightFormatter {
    fn format(&self, insight: &Insight) -> String;
}

/// Default wording
#[derive(Debug, Clone, Copy, Default)]
pub struct StandardFormatter;

impl InsightFormatter for StandardFormatter {
    fn format(&self, insight: &Insight) -> String {
        let delta = insight.weekly_delta_kg.abs().round_dp(1);
        let lost = insight.window_loss_kg.abs().round_dp(1);

        match insight.category {
            InsightCategory::OnTrack => format!(
                "You lost {} kg this week, which is right in the expected range for Phase {}. \
                 Your 4-week trend shows consistent progress with {} kg lost overall. Keep doing what you're doing.",
                delta, insight.phase_id, lost
            ),
            InsightCategory::FasterThanExpected => format!(
                "You lost {} kg this week, which is above the typical range. This might include water weight. \
                 Let's see how next week goes while keeping your 4-week downward trend of {} kg.",
                delta, lost
            ),
            InsightCategory::Gain => format!(
                "Your weight increased by {} kg this week. Weekly fluctuations are normal, and your 4-week \
                 trend still shows {} kg lost. Stay consistent.",
                delta, lost
            ),
            InsightCategory::Stall => {
                let phase_message = if insight.phase_id == PhaseId::Three {
                    "In Phase 3, progress often slows. Your body is adjusting."
                } else {
                    "Weight can stabilize for a week."
                };
                format!(
                    "No significant change this week. {} Your 4-week trend shows {} kg lost. Consistency wins.",
                    phase_message, lost
                )
            }
            InsightCategory::SlowProgress => format!(
                "You lost {} kg this week. Progress is happening. Your 4-week trend confirms steady movement \
                 with {} kg total loss. {} kg to go in this phase.",
                delta,
                lost,
                insight.remaining_kg.max(Decimal::ZERO).round_dp(1)
            ),
        }
    }
}

impl Insight {
    /// Attach the total loss over the trend window quoted in the message
    pub fn with_window_loss(mut self, window_loss_kg: Decimal) -> Self {
        self.window_loss_kg = window_loss_kg;
        self
    }

    /// Render with the default wording
    pub fn render(&self) -> String {
        StandardFormatter.format(self)
    }
}

impl fmt::Display for Insight {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.render())
    }
}
