//! Phase state machine
//!
//! The three phases form a strict linear sequence. Reaching the active phase's target
//! weight completes it, unlocks the successor and moves `current_phase` forward.
//! Phase 3 has no successor: completing it leaves `current_phase` at 3.
//! Progress is monotonic; nothing here ever re-locks or un-completes a phase.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::models::{AppState, Phase, PhaseId, PhasePlan, UserProfile, WeighIn};
use crate::trend::{self, PLATEAU_THRESHOLD_WEEKS};

/// Phase change caused by a weigh-in, for the presentation layer to celebrate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PhaseEvent {
    /// Routine weigh-in
    None,
    /// A phase target was reached and the next phase unlocked
    PhaseCompleted {
        completed: PhaseId,
        unlocked: PhaseId,
    },
    /// The final phase target was reached
    ProgramCompleted,
}

impl PhaseEvent {
    pub fn is_milestone(&self) -> bool {
        !matches!(self, PhaseEvent::None)
    }
}

/// Result of evaluating a weigh-in against the active phase
#[derive(Debug, Clone, PartialEq)]
pub struct PhaseProgress {
    /// Plan with any completion/unlock applied
    pub phases: PhasePlan,

    /// Phase active after the weigh-in
    pub current_phase: PhaseId,

    /// What happened
    pub event: PhaseEvent,
}

/// Apply the completion rule for one weigh-in.
///
/// Only one phase can complete per weigh-in, even if the weight already lies below
/// a later phase's target too.
pub fn evaluate_phase_completion(
    phases: &PhasePlan,
    current_phase: PhaseId,
    weight_kg: Decimal,
    now: DateTime<Utc>,
) -> PhaseProgress {
    let active = phases.get(current_phase);

    if active.is_completed() || weight_kg > active.target_weight_kg {
        return PhaseProgress {
            phases: phases.clone(),
            current_phase,
            event: PhaseEvent::None,
        };
    }

    let mut updated = phases.clone();
    updated.get_mut(current_phase).completed_at = Some(now);

    match current_phase.next() {
        Some(next) => {
            updated.get_mut(next).is_unlocked = true;
            tracing::info!(
                completed = %current_phase,
                unlocked = %next,
                weight = %weight_kg,
                "Phase completed"
            );

            PhaseProgress {
                phases: updated,
                current_phase: next,
                event: PhaseEvent::PhaseCompleted {
                    completed: current_phase,
                    unlocked: next,
                },
            }
        }
        None => {
            tracing::info!(weight = %weight_kg, "Final phase completed");

            PhaseProgress {
                phases: updated,
                current_phase,
                event: PhaseEvent::ProgramCompleted,
            }
        }
    }
}

/// Refresh the plateau flag from the full history.
///
/// A newly detected plateau is stamped with `now`; an ongoing one keeps its original
/// timestamp; a cleared one drops it.
pub fn update_plateau(state: &AppState, history: &[WeighIn], now: DateTime<Utc>) -> AppState {
    let plateau = trend::detect_plateau(history, PLATEAU_THRESHOLD_WEEKS);

    let detected_at = match (plateau, state.plateau_mode) {
        (true, true) => state.plateau_detected_at.or(Some(now)),
        (true, false) => {
            tracing::info!(entries = history.len(), "Plateau detected");
            Some(now)
        }
        (false, was_plateau) => {
            if was_plateau {
                tracing::info!("Plateau cleared");
            }
            None
        }
    };

    AppState {
        plateau_mode: plateau,
        plateau_detected_at: detected_at,
        ..state.clone()
    }
}

/// Weight the phase starts from: the profile's starting weight for phase 1,
/// the previous phase's target otherwise
pub fn phase_start_weight(phases: &PhasePlan, phase: PhaseId, profile: &UserProfile) -> Decimal {
    match phase.previous() {
        Some(previous) => phases.get(previous).target_weight_kg,
        None => profile.starting_weight_kg,
    }
}

/// Percentage of the phase's planned loss already achieved, clamped to [0, 100]
pub fn phase_progress_pct(current_kg: Decimal, phase_start_kg: Decimal, target_kg: Decimal) -> Decimal {
    let total_loss = phase_start_kg - target_kg;
    if total_loss <= Decimal::ZERO {
        return Decimal::ONE_HUNDRED;
    }

    let current_loss = phase_start_kg - current_kg;
    (current_loss / total_loss * Decimal::ONE_HUNDRED).clamp(Decimal::ZERO, Decimal::ONE_HUNDRED)
}

/// Weight expected after `current_week` weeks on a straight line from start to target
pub fn expected_trajectory(
    start_kg: Decimal,
    target_kg: Decimal,
    total_weeks: u32,
    current_week: u32,
) -> Decimal {
    if total_weeks == 0 {
        return target_kg;
    }
    let loss_per_week = (start_kg - target_kg) / Decimal::from(total_weeks);
    start_kg - loss_per_week * Decimal::from(current_week)
}

/// Human-readable lock state
pub fn status_label(phase: &Phase, current_phase: PhaseId) -> &'static str {
    if phase.is_completed() {
        "completed"
    } else if phase.id == current_phase {
        "active"
    } else if phase.is_unlocked {
        "unlocked"
    } else {
        "locked"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::trend::test_support::weigh_ins;
    use chrono::{Duration, TimeZone};
    use rust_decimal_macros::dec;

    fn test_now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 9, 22, 8, 0, 0).unwrap()
    }

    fn test_state() -> AppState {
        let profile = UserProfile::default_at(test_now());
        AppState::default_at(&profile, test_now())
    }

    #[test]
    fn test_weight_above_target_is_routine() {
        let plan = PhasePlan::default();
        let progress = evaluate_phase_completion(&plan, PhaseId::One, dec!(100.1), test_now());

        assert_eq!(progress.event, PhaseEvent::None);
        assert_eq!(progress.current_phase, PhaseId::One);
        assert_eq!(progress.phases, plan);
    }

    #[test]
    fn test_reaching_target_completes_and_unlocks() {
        let plan = PhasePlan::default();
        let progress = evaluate_phase_completion(&plan, PhaseId::One, dec!(100), test_now());

        assert_eq!(
            progress.event,
            PhaseEvent::PhaseCompleted {
                completed: PhaseId::One,
                unlocked: PhaseId::Two
            }
        );
        assert_eq!(progress.current_phase, PhaseId::Two);
        assert_eq!(progress.phases.get(PhaseId::One).completed_at, Some(test_now()));
        assert!(progress.phases.get(PhaseId::Two).is_unlocked);
        assert!(!progress.phases.get(PhaseId::Three).is_unlocked);
    }

    #[test]
    fn test_one_phase_per_weigh_in() {
        // Below both phase 1 and phase 2 targets
        let plan = PhasePlan::default();
        let progress = evaluate_phase_completion(&plan, PhaseId::One, dec!(93), test_now());

        assert_eq!(progress.current_phase, PhaseId::Two);
        assert!(!progress.phases.get(PhaseId::Two).is_completed());
    }

    #[test]
    fn test_final_phase_is_terminal() {
        let mut plan = PhasePlan::default();
        let now = test_now();
        plan = evaluate_phase_completion(&plan, PhaseId::One, dec!(99), now).phases;
        plan = evaluate_phase_completion(&plan, PhaseId::Two, dec!(93), now).phases;

        let progress = evaluate_phase_completion(&plan, PhaseId::Three, dec!(87.5), now);

        assert_eq!(progress.event, PhaseEvent::ProgramCompleted);
        assert_eq!(progress.current_phase, PhaseId::Three);
        assert!(progress.phases.get(PhaseId::Three).is_completed());
        assert!(progress.phases.is_program_complete());
    }

    #[test]
    fn test_completion_is_idempotent() {
        let plan = PhasePlan::default();
        let mut progress = evaluate_phase_completion(&plan, PhaseId::One, dec!(99), test_now());
        progress = evaluate_phase_completion(&progress.phases, PhaseId::Two, dec!(93.5), test_now());
        progress = evaluate_phase_completion(&progress.phases, PhaseId::Three, dec!(87), test_now());
        assert_eq!(progress.event, PhaseEvent::ProgramCompleted);

        let later = test_now() + Duration::weeks(1);
        let again = evaluate_phase_completion(&progress.phases, PhaseId::Three, dec!(86), later);

        assert_eq!(again.event, PhaseEvent::None);
        assert_eq!(again.phases.get(PhaseId::Three).completed_at, Some(test_now()));
    }

    #[test]
    fn test_plateau_flag_lifecycle() {
        let state = test_state();
        let flat = weigh_ins(&[dec!(100.0), dec!(100.1), dec!(100.0)]);

        let detected = update_plateau(&state, &flat, test_now());
        assert!(detected.plateau_mode);
        assert_eq!(detected.plateau_detected_at, Some(test_now()));

        // Still flat a week later: the original timestamp is kept
        let later = test_now() + Duration::weeks(1);
        let mut still_flat = flat.clone();
        still_flat.extend(weigh_ins(&[dec!(100.05)]));
        let ongoing = update_plateau(&detected, &still_flat, later);
        assert!(ongoing.plateau_mode);
        assert_eq!(ongoing.plateau_detected_at, Some(test_now()));

        let losing = weigh_ins(&[dec!(100.0), dec!(99.2), dec!(98.4)]);
        let cleared = update_plateau(&ongoing, &losing, later);
        assert!(!cleared.plateau_mode);
        assert_eq!(cleared.plateau_detected_at, None);
    }

    #[test]
    fn test_phase_start_weight_uses_keyed_lookup() {
        let plan = PhasePlan::default();
        let profile = UserProfile::default_at(test_now());

        assert_eq!(phase_start_weight(&plan, PhaseId::One, &profile), dec!(114));
        assert_eq!(phase_start_weight(&plan, PhaseId::Two, &profile), dec!(100));
        assert_eq!(phase_start_weight(&plan, PhaseId::Three, &profile), dec!(94));
    }

    #[test]
    fn test_phase_progress_pct() {
        assert_eq!(phase_progress_pct(dec!(107), dec!(114), dec!(100)), dec!(50));
        assert_eq!(phase_progress_pct(dec!(115), dec!(114), dec!(100)), Decimal::ZERO);
        assert_eq!(phase_progress_pct(dec!(98), dec!(114), dec!(100)), dec!(100));
    }

    #[test]
    fn test_expected_trajectory() {
        assert_eq!(expected_trajectory(dec!(114), dec!(100), 14, 7), dec!(107));
        assert_eq!(expected_trajectory(dec!(114), dec!(100), 14, 0), dec!(114));
        assert_eq!(expected_trajectory(dec!(114), dec!(100), 0, 3), dec!(100));
    }

    #[test]
    fn test_status_labels() {
        let plan = PhasePlan::default();
        assert_eq!(status_label(plan.get(PhaseId::One), PhaseId::One), "active");
        assert_eq!(status_label(plan.get(PhaseId::Two), PhaseId::One), "locked");
    }
}
