//! Weigh-in reducer
//!
//! `(profile, phases, history, state, new weigh-in, now) -> outcome`. Nothing is held
//! between calls: the caller owns every aggregate and persists whatever comes back.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::composition::BodyComposition;
use crate::error::{LeanRsError, Result};
use crate::insight::{self, Insight};
use crate::models::{AppState, PhaseId, PhasePlan, UserProfile, WeighIn, MAX_WEIGHT_KG};
use crate::phases::{self, PhaseEvent};
use crate::schedule;
use crate::trend::{self, ROLLING_AVERAGE_WEEKS};

/// Window of the trend quoted in insights
pub const INSIGHT_TREND_WEEKS: usize = 4;

/// A weigh-in as entered by the user, before any derived field exists
#[derive(Debug, Clone, PartialEq)]
pub struct NewWeighIn {
    pub weight_kg: Decimal,
    pub date: DateTime<Utc>,
    pub notes: String,
    pub photo_path: Option<String>,
}

impl NewWeighIn {
    pub fn new(weight_kg: Decimal, date: DateTime<Utc>) -> Self {
        NewWeighIn {
            weight_kg,
            date,
            notes: String::new(),
            photo_path: None,
        }
    }

    pub fn with_notes(mut self, notes: impl Into<String>) -> Self {
        self.notes = notes.into();
        self
    }

    pub fn with_photo(mut self, photo_path: impl Into<String>) -> Self {
        self.photo_path = Some(photo_path.into());
        self
    }

    /// Boundary checks the engine relies on: a weight in (0, 1000] kg, and a date that
    /// does not precede the last recorded weigh-in
    pub fn validate(&self, history: &[WeighIn]) -> Result<()> {
        validate_weight(self.weight_kg)?;

        if let Some(last) = history.last() {
            if self.date < last.date {
                return Err(LeanRsError::Validation(format!(
                    "weigh-in date {} is before the last recorded weigh-in ({})",
                    self.date.format("%Y-%m-%d"),
                    last.date.format("%Y-%m-%d")
                )));
            }
        }

        Ok(())
    }
}

fn validate_weight(weight_kg: Decimal) -> Result<()> {
    if weight_kg <= Decimal::ZERO {
        return Err(LeanRsError::Validation(format!(
            "weight must be positive, got {}",
            weight_kg
        )));
    }
    if weight_kg > MAX_WEIGHT_KG {
        return Err(LeanRsError::Validation(format!(
            "weight must be at most {} kg, got {}",
            MAX_WEIGHT_KG, weight_kg
        )));
    }
    Ok(())
}

/// Parse a user-entered weight in kilograms
pub fn parse_weight(input: &str) -> Result<Decimal> {
    let trimmed = input.trim();
    let weight = Decimal::from_str(trimmed)
        .map_err(|_| LeanRsError::Validation(format!("'{}' is not a valid weight", trimmed)))?;

    validate_weight(weight)?;
    Ok(weight)
}

/// Everything a saved weigh-in changes
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeighInOutcome {
    /// The new entry with every derived field populated
    pub weigh_in: WeighIn,

    /// Full history including the new entry, rolling averages recomputed
    pub history: Vec<WeighIn>,

    /// Phase plan after any completion
    pub phases: PhasePlan,

    /// Replacement app state
    pub state: AppState,

    /// Phase milestone, if any
    pub phase_event: PhaseEvent,

    /// Classified insight for the entry
    pub insight: Insight,

    /// Lower than the previous current weight
    pub new_low: bool,
}

/// Record a new weigh-in.
///
/// Callers are expected to have run [`NewWeighIn::validate`] first.
pub fn record_weigh_in(
    profile: &UserProfile,
    phases: &PhasePlan,
    history: &[WeighIn],
    state: &AppState,
    new_weigh_in: NewWeighIn,
    now: DateTime<Utc>,
) -> WeighInOutcome {
    let entry = WeighIn {
        id: uuid::Uuid::new_v4().to_string(),
        date: new_weigh_in.date,
        weight_kg: new_weigh_in.weight_kg,
        phase_id: state.current_phase,
        weekly_delta_kg: Decimal::ZERO,
        four_week_avg_kg: Decimal::ZERO,
        estimated_bf_pct: Decimal::ZERO,
        estimated_fat_mass_kg: Decimal::ZERO,
        notes: new_weigh_in.notes,
        insight: String::new(),
        photo_path: new_weigh_in.photo_path,
        is_edited: false,
        edited_at: None,
        created_at: now,
    };

    apply_entry(profile, phases, history, state, entry, now)
}

/// Derive every field of `entry` against the history before it and fold it into the state
fn apply_entry(
    profile: &UserProfile,
    phases: &PhasePlan,
    history: &[WeighIn],
    state: &AppState,
    entry: WeighIn,
    now: DateTime<Utc>,
) -> WeighInOutcome {
    let weight = entry.weight_kg;
    let weekly_delta_kg = trend::weekly_delta(weight, history.last().map(|w| w.weight_kg));
    let composition = BodyComposition::estimate(weight, profile);
    let phase = phases.get(state.current_phase);

    let derived = WeighIn {
        phase_id: state.current_phase,
        weekly_delta_kg,
        estimated_bf_pct: composition.body_fat_pct,
        estimated_fat_mass_kg: composition.fat_mass_kg,
        ..entry
    };

    let mut updated_history = history.to_vec();
    updated_history.push(derived);
    let mut updated_history = trend::recompute_rolling_averages(&updated_history, ROLLING_AVERAGE_WEEKS);

    let trend_kg = trend::trend_slope(&updated_history, INSIGHT_TREND_WEEKS);
    let insight = insight::classify(weekly_delta_kg, trend_kg, phase, weight)
        .with_window_loss(trend::window_change(&updated_history, INSIGHT_TREND_WEEKS));

    let last_index = updated_history.len() - 1;
    updated_history[last_index].insight = insight.render();
    let weigh_in = updated_history[last_index].clone();

    let progress = phases::evaluate_phase_completion(phases, state.current_phase, weight, now);

    let advanced = AppState {
        current_phase: progress.current_phase,
        current_weight_kg: weight,
        last_weigh_in_date: Some(weigh_in.date),
        next_weigh_in_date: schedule::next_sunday(weigh_in.date),
        ..state.clone()
    };
    let new_state = phases::update_plateau(&advanced, &updated_history, now);

    tracing::debug!(
        weight = %weight,
        delta = %weigh_in.weekly_delta_kg,
        rolling_avg = %weigh_in.four_week_avg_kg,
        trend = %trend_kg,
        category = ?insight.category,
        plateau = new_state.plateau_mode,
        "Weigh-in recorded"
    );

    WeighInOutcome {
        new_low: weight < state.current_weight_kg,
        weigh_in,
        history: updated_history,
        phases: progress.phases,
        state: new_state,
        phase_event: progress.event,
        insight,
    }
}

/// Correct the weight of a recorded entry.
///
/// The entry is flagged as edited; its delta, composition estimate and insight are
/// recomputed, as are the following entry's delta and insight and every rolling
/// average. Phase progress is not touched here: use [`amend_and_replay`] to carry the
/// correction through phases and state.
pub fn amend_weigh_in(
    profile: &UserProfile,
    phases: &PhasePlan,
    history: &[WeighIn],
    id: &str,
    new_weight_kg: Decimal,
    now: DateTime<Utc>,
) -> Result<Vec<WeighIn>> {
    validate_weight(new_weight_kg)?;

    let index = history
        .iter()
        .position(|w| w.id == id)
        .ok_or_else(|| LeanRsError::Validation(format!("no weigh-in with id {}", id)))?;

    let mut amended = history.to_vec();
    let previous = index.checked_sub(1).map(|i| amended[i].weight_kg);
    let composition = BodyComposition::estimate(new_weight_kg, profile);

    {
        let entry = &mut amended[index];
        entry.weight_kg = new_weight_kg;
        entry.weekly_delta_kg = trend::weekly_delta(new_weight_kg, previous);
        entry.estimated_bf_pct = composition.body_fat_pct;
        entry.estimated_fat_mass_kg = composition.fat_mass_kg;
        entry.is_edited = true;
        entry.edited_at = Some(now);
    }

    if let Some(next) = amended.get_mut(index + 1) {
        next.weekly_delta_kg = trend::weekly_delta(next.weight_kg, Some(new_weight_kg));
    }

    let mut amended = trend::recompute_rolling_averages(&amended, ROLLING_AVERAGE_WEEKS);

    for i in index..amended.len().min(index + 2) {
        let insight = classify_entry(&amended[..=i], &amended[i], phases);
        amended[i].insight = insight.render();
    }

    tracing::info!(id, weight = %new_weight_kg, "Weigh-in amended");
    Ok(amended)
}

/// Insight for `entry` given the history up to and including it
fn classify_entry(history: &[WeighIn], entry: &WeighIn, phases: &PhasePlan) -> Insight {
    let trend_kg = trend::trend_slope(history, INSIGHT_TREND_WEEKS);
    insight::classify(
        entry.weekly_delta_kg,
        trend_kg,
        phases.get(entry.phase_id),
        entry.weight_kg,
    )
    .with_window_loss(trend::window_change(history, INSIGHT_TREND_WEEKS))
}

/// Amend an entry, then replay the whole history so phase attribution, phase
/// progress and state all follow the corrected weight
pub fn amend_and_replay(
    profile: &UserProfile,
    phases: &PhasePlan,
    history: &[WeighIn],
    state: &AppState,
    id: &str,
    new_weight_kg: Decimal,
    now: DateTime<Utc>,
) -> Result<Replay> {
    let amended = amend_weigh_in(profile, phases, history, id, new_weight_kg, now)?;
    Ok(replay(profile, phases, &amended, state))
}

/// State rebuilt from scratch by replaying the whole history
#[derive(Debug, Clone, PartialEq)]
pub struct Replay {
    pub history: Vec<WeighIn>,
    pub phases: PhasePlan,
    pub state: AppState,
}

/// Re-derive phases, app state and every derived weigh-in field from the profile,
/// the phase configuration and the ordered history.
///
/// Phase progress starts over from `phases` with its completion state reset. Each
/// entry is replayed at its own `created_at`. Preferences (trend window, reminders,
/// onboarding) are taken from `preferences`.
pub fn replay(
    profile: &UserProfile,
    phases: &PhasePlan,
    history: &[WeighIn],
    preferences: &AppState,
) -> Replay {
    let mut plan = reset_progress(phases);
    let mut state = AppState {
        current_phase: PhaseId::One,
        current_weight_kg: profile.starting_weight_kg,
        plateau_mode: false,
        plateau_detected_at: None,
        last_weigh_in_date: None,
        ..preferences.clone()
    };
    let mut rebuilt: Vec<WeighIn> = Vec::with_capacity(history.len());

    for entry in history {
        let outcome = apply_entry(profile, &plan, &rebuilt, &state, entry.clone(), entry.created_at);
        rebuilt = outcome.history;
        plan = outcome.phases;
        state = outcome.state;
    }

    tracing::debug!(entries = rebuilt.len(), phase = %state.current_phase, "History replayed");

    Replay {
        history: rebuilt,
        phases: plan,
        state,
    }
}

/// Plan with the same configuration but no progress: phase 1 unlocked, nothing completed
pub fn reset_progress(phases: &PhasePlan) -> PhasePlan {
    let mut plan = phases.clone();
    for id in PhaseId::ALL {
        let phase = plan.get_mut(id);
        phase.is_unlocked = id == PhaseId::One;
        phase.completed_at = None;
    }
    plan
}

/// Mark onboarding as done
pub fn complete_onboarding(state: &AppState) -> AppState {
    AppState {
        has_completed_onboarding: true,
        ..state.clone()
    }
}
