//! Read-only dashboard view over the tracker aggregates

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use crate::composition::BodyComposition;
use crate::models::{AppState, PhaseId, PhasePlan, UserProfile, WeighIn};
use crate::phases;
use crate::projection::{self, Projection};
use crate::schedule;
use crate::trend::{self, TrendAnalysis};

/// Half-width of the band drawn around the expected trajectory
pub const TRAJECTORY_TOLERANCE_KG: Decimal = dec!(0.5);

/// Everything the status screen shows
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DashboardSummary {
    pub current_weight_kg: Decimal,
    pub current_phase: PhaseId,
    pub phase_name: String,
    pub phase_start_kg: Decimal,
    pub phase_target_kg: Decimal,

    /// Kg left to the phase target, never negative
    pub remaining_kg: Decimal,

    /// Share of the phase's planned loss achieved, 0-100
    pub progress_pct: Decimal,

    /// 1-based week number within the current phase
    pub week_in_phase: u32,

    /// Where a straight line from phase start to target puts the user this week
    pub expected_weight_kg: Decimal,

    /// Kg lost since the program start (negative if above it)
    pub total_lost_kg: Decimal,

    /// Latest entry's change versus the one before it
    pub weekly_change_kg: Decimal,

    /// Composition estimate at the current weight
    pub composition: BodyComposition,

    /// Trend over the selected view window
    pub trend: TrendAnalysis,

    pub projection: Projection,
    pub plateau_mode: bool,
    pub program_complete: bool,
    pub weigh_in_count: usize,
    pub next_weigh_in_date: DateTime<Utc>,

    /// Days until the next weigh-in is due (0 once due)
    pub days_until_next_weigh_in: i64,
}

/// Build the dashboard for the current aggregates
pub fn summarize(
    profile: &UserProfile,
    phases: &PhasePlan,
    history: &[WeighIn],
    state: &AppState,
    now: DateTime<Utc>,
) -> DashboardSummary {
    let phase = phases.get(state.current_phase);
    let current_weight = history
        .last()
        .map(|w| w.weight_kg)
        .unwrap_or(profile.starting_weight_kg);

    let phase_entries = projection::phase_history(history, phase.id);
    let phase_start = phases::phase_start_weight(phases, phase.id, profile);
    let completed_weeks = u32::try_from(phase_entries.len()).unwrap_or(u32::MAX);

    DashboardSummary {
        current_weight_kg: current_weight,
        current_phase: phase.id,
        phase_name: phase.name.clone(),
        phase_start_kg: phase_start,
        phase_target_kg: phase.target_weight_kg,
        remaining_kg: (current_weight - phase.target_weight_kg).max(Decimal::ZERO),
        progress_pct: phases::phase_progress_pct(current_weight, phase_start, phase.target_weight_kg),
        week_in_phase: completed_weeks.saturating_add(1),
        expected_weight_kg: phases::expected_trajectory(
            phase_start,
            phase.target_weight_kg,
            phase.estimated_duration_weeks_max,
            completed_weeks,
        ),
        total_lost_kg: profile.starting_weight_kg - current_weight,
        weekly_change_kg: history.last().map(|w| w.weekly_delta_kg).unwrap_or(Decimal::ZERO),
        composition: BodyComposition::estimate(current_weight, profile),
        trend: trend::analyze(history, state.trend_view_weeks.weeks()),
        projection: projection::project(
            current_weight,
            phase.target_weight_kg,
            phase,
            &phase_entries,
            now.date_naive(),
        ),
        plateau_mode: state.plateau_mode,
        program_complete: phases.is_program_complete(),
        weigh_in_count: history.len(),
        next_weigh_in_date: state.next_weigh_in_date,
        days_until_next_weigh_in: schedule::days_until(now, state.next_weigh_in_date),
    }
}

/// One point of the progress chart
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrajectoryPoint {
    pub week: u32,
    pub actual_kg: Decimal,
    pub average_kg: Decimal,
    pub expected_kg: Decimal,
}

impl TrajectoryPoint {
    /// Within the tolerance band around the expected line
    pub fn on_course(&self) -> bool {
        (self.actual_kg - self.expected_kg).abs() <= TRAJECTORY_TOLERANCE_KG
    }
}

/// Actual, averaged and expected weight for every entry, measured against the current
/// phase's line from the program start weight
pub fn trajectory(
    profile: &UserProfile,
    phases: &PhasePlan,
    history: &[WeighIn],
    state: &AppState,
) -> Vec<TrajectoryPoint> {
    let phase = phases.get(state.current_phase);

    history
        .iter()
        .zip(1u32..)
        .map(|(entry, week)| TrajectoryPoint {
            week,
            actual_kg: entry.weight_kg,
            average_kg: entry.four_week_avg_kg,
            expected_kg: phases::expected_trajectory(
                profile.starting_weight_kg,
                phase.target_weight_kg,
                phase.estimated_duration_weeks_max,
                week,
            ),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::projection::ProjectionBasis;
    use crate::trend::test_support::weigh_ins;
    use chrono::TimeZone;

    fn test_now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 9, 24, 12, 0, 0).unwrap()
    }

    fn create_test_state(profile: &UserProfile) -> AppState {
        AppState::default_at(profile, test_now())
    }

    #[test]
    fn test_summary_without_history() {
        let profile = UserProfile::default_at(test_now());
        let state = create_test_state(&profile);
        let summary = summarize(&profile, &PhasePlan::default(), &[], &state, test_now());

        assert_eq!(summary.current_weight_kg, dec!(114));
        assert_eq!(summary.remaining_kg, dec!(14));
        assert_eq!(summary.progress_pct, Decimal::ZERO);
        assert_eq!(summary.week_in_phase, 1);
        assert_eq!(summary.expected_weight_kg, dec!(114));
        assert_eq!(summary.weekly_change_kg, Decimal::ZERO);
        assert_eq!(summary.projection.basis, ProjectionBasis::PhaseDefaults);
        assert_eq!(summary.projection.weeks_min, 14);
        assert_eq!(summary.projection.weeks_max, 28);
        // Tuesday 24th to Sunday 29th
        assert_eq!(summary.days_until_next_weigh_in, 5);
    }

    #[test]
    fn test_summary_with_history() {
        let profile = UserProfile::default_at(test_now());
        let state = AppState {
            trend_view_weeks: crate::models::TrendWindow::Four,
            ..create_test_state(&profile)
        };
        let history = trend::recompute_rolling_averages(
            &weigh_ins(&[dec!(114), dec!(113.2), dec!(112.5), dec!(111.8)]),
            4,
        );

        let summary = summarize(&profile, &PhasePlan::default(), &history, &state, test_now());

        assert_eq!(summary.current_weight_kg, dec!(111.8));
        assert_eq!(summary.remaining_kg, dec!(11.8));
        assert_eq!(summary.total_lost_kg, dec!(2.2));
        assert_eq!(summary.week_in_phase, 5);
        assert_eq!(summary.trend.total_change_kg, dec!(2.2));
        assert_eq!(summary.projection.basis, ProjectionBasis::Trend);
        assert_eq!(summary.weigh_in_count, 4);
        // 2.2 of 14 kg
        assert!(summary.progress_pct > dec!(15.7) && summary.progress_pct < dec!(15.8));
    }

    #[test]
    fn test_remaining_is_floored_at_zero() {
        let profile = UserProfile::default_at(test_now());
        let state = create_test_state(&profile);
        let history = weigh_ins(&[dec!(99.4)]);

        let summary = summarize(&profile, &PhasePlan::default(), &history, &state, test_now());
        assert_eq!(summary.remaining_kg, Decimal::ZERO);
        assert_eq!(summary.progress_pct, dec!(100));
        assert_eq!(summary.projection.basis, ProjectionBasis::GoalReached);
    }

    #[test]
    fn test_trajectory_points() {
        let profile = UserProfile::default_at(test_now());
        let state = create_test_state(&profile);
        let history = weigh_ins(&[dec!(113.5), dec!(113.4)]);

        let points = trajectory(&profile, &PhasePlan::default(), &history, &state);

        assert_eq!(points.len(), 2);
        assert_eq!(points[0].week, 1);
        // 14 kg over 28 weeks
        assert_eq!(points[0].expected_kg, dec!(113.5));
        assert_eq!(points[1].expected_kg, dec!(113.0));
        assert!(points[0].on_course());
        assert!(points[1].on_course());
    }
}
