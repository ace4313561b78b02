//! Trend engine over the ordered weigh-in history
//!
//! Weekly deltas, rolling averages, the per-week slope and plateau detection. Every
//! windowed function falls back to the whole history when it is shorter than the window.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use crate::models::WeighIn;

/// Window used for the stored rolling average on every weigh-in
pub const ROLLING_AVERAGE_WEEKS: usize = 4;

/// Default number of weigh-ins inspected for plateau detection
pub const PLATEAU_THRESHOLD_WEEKS: usize = 3;

/// Spread below which a window counts as flat
pub const PLATEAU_SPREAD_KG: Decimal = dec!(0.3);

/// Weekly slope above which progress counts as a real trend rather than noise
pub const MEANINGFUL_TREND_KG: Decimal = dec!(0.1);

/// Direction of the weight trend
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TrendDirection {
    Losing,
    Stable,
    Gaining,
}

impl TrendDirection {
    /// Classify a weekly slope (positive = losing)
    pub fn from_slope(slope: Decimal) -> Self {
        if slope > MEANINGFUL_TREND_KG {
            TrendDirection::Losing
        } else if slope < -MEANINGFUL_TREND_KG {
            TrendDirection::Gaining
        } else {
            TrendDirection::Stable
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            TrendDirection::Losing => "Trending down",
            TrendDirection::Stable => "Holding steady",
            TrendDirection::Gaining => "Trending up",
        }
    }
}

/// Trend metrics over one window of the history
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrendAnalysis {
    /// Number of weeks requested
    pub window_weeks: usize,

    /// Entries actually available in the window
    pub entries_in_window: usize,

    /// Mean weight over the window
    pub rolling_average_kg: Decimal,

    /// Average kg lost per week (positive = losing)
    pub slope_kg_per_week: Decimal,

    /// Total kg lost from the first to the last entry of the window
    pub total_change_kg: Decimal,

    /// Direction derived from the slope
    pub direction: TrendDirection,

    /// Plateau flag over the default threshold window
    pub plateau: bool,
}

/// Trailing `window` entries. A zero window, or one longer than the history, covers everything.
fn tail(history: &[WeighIn], window: usize) -> &[WeighIn] {
    if window == 0 || window >= history.len() {
        history
    } else {
        &history[history.len() - window..]
    }
}

fn mean(weights: &[Decimal]) -> Decimal {
    if weights.is_empty() {
        return Decimal::ZERO;
    }
    weights.iter().sum::<Decimal>() / Decimal::from(weights.len())
}

/// Weight change versus the previous entry. The first entry is a baseline, not a delta.
pub fn weekly_delta(current_kg: Decimal, previous_kg: Option<Decimal>) -> Decimal {
    match previous_kg {
        Some(previous) => current_kg - previous,
        None => Decimal::ZERO,
    }
}

/// Mean weight of the last `window` entries (all of them if fewer); 0 for an empty history
pub fn rolling_average(history: &[WeighIn], window: usize) -> Decimal {
    let weights: Vec<Decimal> = tail(history, window).iter().map(|w| w.weight_kg).collect();
    mean(&weights)
}

/// Rewrite every entry's stored rolling average so that each reflects the
/// window ending at that entry
pub fn recompute_rolling_averages(history: &[WeighIn], window: usize) -> Vec<WeighIn> {
    history
        .iter()
        .enumerate()
        .map(|(index, entry)| WeighIn {
            four_week_avg_kg: rolling_average(&history[..=index], window),
            ..entry.clone()
        })
        .collect()
}

/// Average kg lost per week across the window: `(first - last) / (n - 1)`.
/// Needs at least two entries, otherwise 0.
pub fn trend_slope(history: &[WeighIn], window: usize) -> Decimal {
    let recent = tail(history, window);
    match (recent.first(), recent.last()) {
        (Some(first), Some(last)) if recent.len() >= 2 => {
            (first.weight_kg - last.weight_kg) / Decimal::from(recent.len() - 1)
        }
        _ => Decimal::ZERO,
    }
}

/// Total kg lost from the first to the last entry of the window (0 with fewer than two)
pub fn window_change(history: &[WeighIn], window: usize) -> Decimal {
    let recent = tail(history, window);
    match (recent.first(), recent.last()) {
        (Some(first), Some(last)) if recent.len() >= 2 => first.weight_kg - last.weight_kg,
        _ => Decimal::ZERO,
    }
}

/// Heuristic plateau check over the last `threshold_weeks` entries.
///
/// A plateau is either a spread under 0.3 kg, or no net downward movement between
/// the two-entry average at the start of the window and the one at the end.
/// Windows shorter than three compare single entries instead of pairs.
pub fn detect_plateau(history: &[WeighIn], threshold_weeks: usize) -> bool {
    if threshold_weeks == 0 || history.len() < threshold_weeks {
        return false;
    }

    let weights: Vec<Decimal> = tail(history, threshold_weeks)
        .iter()
        .map(|w| w.weight_kg)
        .collect();

    let max = weights.iter().copied().max().unwrap_or(Decimal::ZERO);
    let min = weights.iter().copied().min().unwrap_or(Decimal::ZERO);
    if max - min < PLATEAU_SPREAD_KG {
        return true;
    }

    let pair = if weights.len() >= 3 { 2 } else { 1 };
    let first_avg = mean(&weights[..pair]);
    let last_avg = mean(&weights[weights.len() - pair..]);

    last_avg >= first_avg
}

/// Collect all trend metrics for one window
pub fn analyze(history: &[WeighIn], window_weeks: usize) -> TrendAnalysis {
    let slope = trend_slope(history, window_weeks);

    TrendAnalysis {
        window_weeks,
        entries_in_window: tail(history, window_weeks).len(),
        rolling_average_kg: rolling_average(history, window_weeks),
        slope_kg_per_week: slope,
        total_change_kg: window_change(history, window_weeks),
        direction: TrendDirection::from_slope(slope),
        plateau: detect_plateau(history, PLATEAU_THRESHOLD_WEEKS),
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use crate::models::PhaseId;
    use chrono::{Duration, TimeZone, Utc};

    /// Weekly weigh-ins starting on Sunday 2024-09-01
    pub fn weigh_ins(weights: &[Decimal]) -> Vec<WeighIn> {
        let start = Utc.with_ymd_and_hms(2024, 9, 1, 7, 0, 0).unwrap();
        weights
            .iter()
            .enumerate()
            .map(|(i, weight)| {
                let date = start + Duration::weeks(i as i64);
                WeighIn {
                    id: format!("weigh_in_{}", i + 1),
                    date,
                    weight_kg: *weight,
                    phase_id: PhaseId::One,
                    weekly_delta_kg: Decimal::ZERO,
                    four_week_avg_kg: Decimal::ZERO,
                    estimated_bf_pct: Decimal::ZERO,
                    estimated_fat_mass_kg: Decimal::ZERO,
                    notes: String::new(),
                    insight: String::new(),
                    photo_path: None,
                    is_edited: false,
                    edited_at: None,
                    created_at: date,
                }
            })
            .collect()
    }
}
