use chrono::{DateTime, Duration, TimeZone, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use tempfile::tempdir;

use leanrs::dashboard;
use leanrs::error::LeanRsError;
use leanrs::export::{self, ExportFormat};
use leanrs::insight::InsightCategory;
use leanrs::models::{AppState, PhaseId, PhasePlan, ProfileSettings, UserProfile};
use leanrs::phases::PhaseEvent;
use leanrs::projection::ProjectionBasis;
use leanrs::storage::{JsonStore, TrackerData};
use leanrs::tracker::{self, NewWeighIn, WeighInOutcome};

/// Integration tests that exercise complete tracker workflows

fn first_sunday() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 9, 1, 7, 30, 0).unwrap()
}

fn create_test_data() -> TrackerData {
    let onboarded_at = first_sunday() - Duration::days(2);
    let profile = UserProfile::default_at(onboarded_at);
    let state = tracker::complete_onboarding(&AppState::default_at(&profile, onboarded_at));

    TrackerData {
        profile,
        phases: PhasePlan::default(),
        weigh_ins: Vec::new(),
        state,
    }
}

/// Record one weigh-in a week after the last one and fold the outcome back into the data
fn record_next(data: &mut TrackerData, weight: Decimal) -> WeighInOutcome {
    let date = first_sunday() + Duration::weeks(data.weigh_ins.len() as i64);
    let new_weigh_in = NewWeighIn::new(weight, date);
    new_weigh_in.validate(&data.weigh_ins).unwrap();

    let outcome = tracker::record_weigh_in(
        &data.profile,
        &data.phases,
        &data.weigh_ins,
        &data.state,
        new_weigh_in,
        date,
    );

    data.phases = outcome.phases.clone();
    data.weigh_ins = outcome.history.clone();
    data.state = outcome.state.clone();
    outcome
}

fn without_ids(mut data: TrackerData) -> TrackerData {
    for entry in &mut data.weigh_ins {
        entry.id.clear();
    }
    data
}

/// 0.75 kg a week from the 114 kg start, enough to finish all three phases
fn steady_loss_weights() -> Vec<Decimal> {
    (1..=35).map(|week| dec!(114) - dec!(0.75) * Decimal::from(week)).collect()
}

#[test]
fn test_complete_program_workflow() {
    let mut data = create_test_data();
    let mut milestones = Vec::new();

    for (index, weight) in steady_loss_weights().into_iter().enumerate() {
        let outcome = record_next(&mut data, weight);

        if index > 0 {
            assert_eq!(
                outcome.insight.category,
                InsightCategory::OnTrack,
                "week {} at {} kg",
                index + 1,
                weight
            );
            assert!(outcome.new_low);
        }
        assert!(!outcome.state.plateau_mode);

        if outcome.phase_event.is_milestone() {
            milestones.push((index, outcome.phase_event));
        }
    }

    assert_eq!(
        milestones,
        vec![
            (
                18,
                PhaseEvent::PhaseCompleted {
                    completed: PhaseId::One,
                    unlocked: PhaseId::Two
                }
            ),
            (
                26,
                PhaseEvent::PhaseCompleted {
                    completed: PhaseId::Two,
                    unlocked: PhaseId::Three
                }
            ),
            (34, PhaseEvent::ProgramCompleted),
        ]
    );

    assert!(data.phases.is_program_complete());
    assert_eq!(data.state.current_phase, PhaseId::Three);
    assert_eq!(data.state.current_weight_kg, dec!(87.75));

    // Entries are attributed to the phase active when they were recorded
    assert_eq!(data.weigh_ins[18].phase_id, PhaseId::One);
    assert_eq!(data.weigh_ins[19].phase_id, PhaseId::Two);
    assert_eq!(data.weigh_ins[27].phase_id, PhaseId::Three);
}

#[test]
fn test_workflow_survives_storage_round_trips() {
    let dir = tempdir().unwrap();
    let store = JsonStore::new(dir.path());
    let mut in_memory = create_test_data();
    store.save(&in_memory).unwrap();

    for weight in steady_loss_weights().into_iter().take(22) {
        // Continue from what was persisted, not from memory
        let mut persisted = store.load().unwrap();
        record_next(&mut persisted, weight);
        store.save(&persisted).unwrap();

        record_next(&mut in_memory, weight);
    }

    // Entry ids are random; everything else must match exactly
    let reloaded = without_ids(store.load().unwrap());
    assert_eq!(reloaded, without_ids(in_memory));
    assert!(reloaded.phases.get(PhaseId::One).is_completed());
}

#[test]
fn test_replay_matches_incremental_history() {
    let mut data = create_test_data();
    let weights = [
        dec!(113.2),
        dec!(112.5),
        dec!(112.1),
        dec!(112.2),
        dec!(112.0),
        dec!(111.1),
        dec!(99.9),
        dec!(99.8),
    ];
    for weight in weights {
        record_next(&mut data, weight);
    }

    let replayed = tracker::replay(&data.profile, &data.phases, &data.weigh_ins, &data.state);

    assert_eq!(replayed.history, data.weigh_ins);
    assert_eq!(replayed.phases, data.phases);
    assert_eq!(replayed.state, data.state);
}

#[test]
fn test_amend_then_replay_updates_state() {
    let mut data = create_test_data();
    for weight in [dec!(113.2), dec!(112.5), dec!(111.9)] {
        record_next(&mut data, weight);
    }

    // The last weigh-in was mistyped: it should have completed phase 1
    let last_id = data.weigh_ins[2].id.clone();
    let amended_at = first_sunday() + Duration::weeks(2) + Duration::hours(3);
    let amended = tracker::amend_weigh_in(
        &data.profile,
        &data.phases,
        &data.weigh_ins,
        &last_id,
        dec!(99.9),
        amended_at,
    )
    .unwrap();
    let rebuilt = tracker::replay(&data.profile, &data.phases, &amended, &data.state);

    assert_eq!(rebuilt.state.current_weight_kg, dec!(99.9));
    assert_eq!(rebuilt.state.current_phase, PhaseId::Two);
    assert!(rebuilt.phases.get(PhaseId::One).is_completed());
    assert!(rebuilt.history[2].is_edited);
    assert_eq!(rebuilt.history[2].edited_at, Some(amended_at));
    assert_eq!(rebuilt.history[2].weekly_delta_kg, dec!(-12.6));
}

#[test]
fn test_amended_history_is_persisted_consistently() {
    let dir = tempdir().unwrap();
    let store = JsonStore::new(dir.path());
    let mut data = create_test_data();
    for weight in [dec!(100.5), dec!(99.8), dec!(99.5)] {
        record_next(&mut data, weight);
    }
    assert_eq!(data.weigh_ins[2].phase_id, PhaseId::Two);
    store.save(&data).unwrap();

    // Correcting week 2 moves phase 1's completion to week 3
    let persisted = store.load().unwrap();
    let week_two = persisted.weigh_ins[1].id.clone();
    let amended_at = first_sunday() + Duration::weeks(2) + Duration::hours(1);
    let rebuilt = tracker::amend_and_replay(
        &persisted.profile,
        &persisted.phases,
        &persisted.weigh_ins,
        &persisted.state,
        &week_two,
        dec!(100.2),
        amended_at,
    )
    .unwrap();
    store
        .save(&TrackerData {
            profile: persisted.profile,
            phases: rebuilt.phases,
            weigh_ins: rebuilt.history,
            state: rebuilt.state,
        })
        .unwrap();

    let stored = store.load().unwrap();
    let phase_ids: Vec<PhaseId> = stored.weigh_ins.iter().map(|w| w.phase_id).collect();
    assert_eq!(phase_ids, vec![PhaseId::One, PhaseId::One, PhaseId::One]);
    assert_eq!(
        stored.phases.get(PhaseId::One).completed_at,
        Some(stored.weigh_ins[2].created_at)
    );
    assert_eq!(stored.state.current_phase, PhaseId::Two);
    assert!(stored.weigh_ins[1].is_edited);
    assert!(stored.weigh_ins[2].insight.contains("expected range for Phase 1"));

    // Everything on disk is re-derivable from what is on disk
    let again = tracker::replay(&stored.profile, &stored.phases, &stored.weigh_ins, &stored.state);
    assert_eq!(again.history, stored.weigh_ins);
    assert_eq!(again.phases, stored.phases);
    assert_eq!(again.state, stored.state);
}

#[test]
fn test_invalid_profile_settings_are_rejected() {
    let data = create_test_data();
    let zero_height = ProfileSettings {
        height_cm: Some(dec!(0)),
        ..ProfileSettings::default()
    };
    assert!(matches!(zero_height.validate(), Err(LeanRsError::Validation(_))));

    // A valid edit still flows through the replay
    let taller = ProfileSettings {
        height_cm: Some(dec!(185)),
        ..ProfileSettings::default()
    };
    taller.validate().unwrap();
    let profile = data.profile.apply_settings(&taller, first_sunday());
    assert_eq!(profile.height_cm, dec!(185));
}

#[test]
fn test_profile_edit_recomputes_estimates() {
    let mut data = create_test_data();
    for weight in [dec!(113.2), dec!(112.5)] {
        record_next(&mut data, weight);
    }
    let before = data.weigh_ins[1].estimated_bf_pct;

    let edited_at = first_sunday() + Duration::weeks(2);
    let profile = data.profile.apply_settings(
        &ProfileSettings {
            height_cm: Some(dec!(190)),
            ..ProfileSettings::default()
        },
        edited_at,
    );
    let rebuilt = tracker::replay(&profile, &data.phases, &data.weigh_ins, &data.state);

    // Taller at the same weight means a lower BMI estimate
    assert!(rebuilt.history[1].estimated_bf_pct < before);
    assert_eq!(rebuilt.history[1].weight_kg, dec!(112.5));
    assert_eq!(rebuilt.state.current_weight_kg, dec!(112.5));
}

#[test]
fn test_plateau_then_recovery() {
    let mut data = create_test_data();
    for weight in [dec!(110.0), dec!(109.2), dec!(109.3), dec!(109.2)] {
        record_next(&mut data, weight);
    }
    assert!(data.state.plateau_mode);
    let detected_at = data.state.plateau_detected_at;
    assert!(detected_at.is_some());

    let still_flat = record_next(&mut data, dec!(109.15));
    assert!(still_flat.state.plateau_mode);
    assert_eq!(still_flat.state.plateau_detected_at, detected_at);
    assert_eq!(still_flat.insight.category, InsightCategory::Stall);

    record_next(&mut data, dec!(108.4));
    let recovered = record_next(&mut data, dec!(107.6));
    assert!(!recovered.state.plateau_mode);
    assert_eq!(recovered.state.plateau_detected_at, None);
}

#[test]
fn test_dashboard_after_a_month() {
    let mut data = create_test_data();
    for weight in [dec!(113.2), dec!(112.5), dec!(112.1), dec!(111.3)] {
        record_next(&mut data, weight);
    }

    let now = first_sunday() + Duration::weeks(3) + Duration::days(1);
    let summary = dashboard::summarize(&data.profile, &data.phases, &data.weigh_ins, &data.state, now);

    assert_eq!(summary.current_weight_kg, dec!(111.3));
    assert_eq!(summary.week_in_phase, 5);
    assert_eq!(summary.remaining_kg, dec!(11.3));
    assert_eq!(summary.total_lost_kg, dec!(2.7));
    assert_eq!(summary.weekly_change_kg, dec!(-0.8));
    assert_eq!(summary.projection.basis, ProjectionBasis::Trend);
    // 11.3 kg at 1.0 and 0.5 kg/week
    assert_eq!(summary.projection.weeks_min, 12);
    assert_eq!(summary.projection.weeks_max, 23);
    assert_eq!(summary.days_until_next_weigh_in, 6);
}

#[test]
fn test_export_after_workflow() {
    let mut data = create_test_data();
    for weight in steady_loss_weights().into_iter().take(5) {
        record_next(&mut data, weight);
    }

    let dir = tempdir().unwrap();
    let now = first_sunday() + Duration::weeks(5);

    let csv_path = dir.path().join("history.csv");
    export::export(&data, ExportFormat::Csv, &csv_path, now).unwrap();
    let csv_content = std::fs::read_to_string(&csv_path).unwrap();
    assert_eq!(csv_content.lines().count(), 6);

    let json_path = dir.path().join("snapshot.json");
    export::export(&data, ExportFormat::Json, &json_path, now).unwrap();
    let snapshot: export::json::ExportSnapshot =
        serde_json::from_str(&std::fs::read_to_string(&json_path).unwrap()).unwrap();
    assert_eq!(snapshot.into_data(), data);
}
