use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use crate::error::{self, LeanRsError};
use crate::schedule;
use crate::storage::tagged_date;

/// Heaviest weight accepted anywhere a weight is entered
pub const MAX_WEIGHT_KG: Decimal = dec!(1000);

/// Tallest height accepted for a profile
pub const MAX_HEIGHT_CM: Decimal = dec!(300);

/// User identity and biometric assumptions
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserProfile {
    /// Unique profile identifier
    pub id: String,

    /// Age in years
    pub age: u16,

    /// Height in centimeters
    pub height_cm: Decimal,

    /// Weight at the start of the program in kilograms
    pub starting_weight_kg: Decimal,

    /// Body fat percentage at the start of the program
    pub starting_body_fat_pct: Decimal,

    /// Goal body fat percentage at the end of phase 3
    pub goal_body_fat_pct: Decimal,

    /// Lean mass in kilograms (user-supplied, never recomputed)
    pub lean_mass_kg: Decimal,

    /// Creation timestamp
    #[serde(with = "tagged_date")]
    pub created_at: DateTime<Utc>,

    /// Last time any of the assumptions above were edited
    #[serde(with = "tagged_date")]
    pub assumptions_last_updated: DateTime<Utc>,
}

/// Explicit edits to the profile assumptions. `None` leaves a field untouched.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProfileSettings {
    pub age: Option<u16>,
    pub height_cm: Option<Decimal>,
    pub starting_weight_kg: Option<Decimal>,
    pub starting_body_fat_pct: Option<Decimal>,
    pub goal_body_fat_pct: Option<Decimal>,
    pub lean_mass_kg: Option<Decimal>,
}

impl ProfileSettings {
    pub fn is_empty(&self) -> bool {
        *self == ProfileSettings::default()
    }

    /// Reject edits the composition estimate cannot work with
    pub fn validate(&self) -> error::Result<()> {
        if self.age == Some(0) {
            return Err(LeanRsError::Validation("age must be positive".to_string()));
        }
        if let Some(height) = self.height_cm {
            check_range("height", height, Decimal::ZERO, MAX_HEIGHT_CM, "cm")?;
        }
        if let Some(weight) = self.starting_weight_kg {
            check_range("starting weight", weight, Decimal::ZERO, MAX_WEIGHT_KG, "kg")?;
        }
        if let Some(lean_mass) = self.lean_mass_kg {
            check_range("lean mass", lean_mass, Decimal::ZERO, MAX_WEIGHT_KG, "kg")?;
        }
        for (name, pct) in [
            ("starting body fat", self.starting_body_fat_pct),
            ("goal body fat", self.goal_body_fat_pct),
        ] {
            if let Some(pct) = pct {
                if pct < Decimal::ZERO || pct > dec!(100) {
                    return Err(LeanRsError::Validation(format!(
                        "{} must be between 0 and 100%, got {}",
                        name, pct
                    )));
                }
            }
        }
        Ok(())
    }
}

/// Lower bound exclusive, upper bound inclusive
fn check_range(name: &str, value: Decimal, min: Decimal, max: Decimal, unit: &str) -> error::Result<()> {
    if value <= min || value > max {
        return Err(LeanRsError::Validation(format!(
            "{} must be above {} and at most {} {}, got {}",
            name, min, max, unit, value
        )));
    }
    Ok(())
}

impl UserProfile {
    /// Profile used before onboarding has been completed
    pub fn default_at(now: DateTime<Utc>) -> Self {
        UserProfile {
            id: "user-1".to_string(),
            age: 25,
            height_cm: dec!(180),
            starting_weight_kg: dec!(114),
            starting_body_fat_pct: dec!(34),
            goal_body_fat_pct: dec!(15),
            lean_mass_kg: dec!(75.24),
            created_at: now,
            assumptions_last_updated: now,
        }
    }

    /// Apply explicit settings edits, stamping the assumption timestamp when anything changed
    pub fn apply_settings(&self, settings: &ProfileSettings, now: DateTime<Utc>) -> Self {
        if settings.is_empty() {
            return self.clone();
        }

        UserProfile {
            age: settings.age.unwrap_or(self.age),
            height_cm: settings.height_cm.unwrap_or(self.height_cm),
            starting_weight_kg: settings.starting_weight_kg.unwrap_or(self.starting_weight_kg),
            starting_body_fat_pct: settings
                .starting_body_fat_pct
                .unwrap_or(self.starting_body_fat_pct),
            goal_body_fat_pct: settings.goal_body_fat_pct.unwrap_or(self.goal_body_fat_pct),
            lean_mass_kg: settings.lean_mass_kg.unwrap_or(self.lean_mass_kg),
            assumptions_last_updated: now,
            ..self.clone()
        }
    }
}

/// Identifier of one of the three program phases
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum PhaseId {
    One,
    Two,
    Three,
}

impl PhaseId {
    pub const ALL: [PhaseId; 3] = [PhaseId::One, PhaseId::Two, PhaseId::Three];

    /// Successor phase, if any. Phase 3 is terminal.
    pub fn next(self) -> Option<PhaseId> {
        match self {
            PhaseId::One => Some(PhaseId::Two),
            PhaseId::Two => Some(PhaseId::Three),
            PhaseId::Three => None,
        }
    }

    /// Predecessor phase, if any
    pub fn previous(self) -> Option<PhaseId> {
        match self {
            PhaseId::One => None,
            PhaseId::Two => Some(PhaseId::One),
            PhaseId::Three => Some(PhaseId::Two),
        }
    }

    pub fn number(self) -> u8 {
        u8::from(self)
    }
}

impl From<PhaseId> for u8 {
    fn from(id: PhaseId) -> Self {
        match id {
            PhaseId::One => 1,
            PhaseId::Two => 2,
            PhaseId::Three => 3,
        }
    }
}

impl TryFrom<u8> for PhaseId {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(PhaseId::One),
            2 => Ok(PhaseId::Two),
            3 => Ok(PhaseId::Three),
            other => Err(format!("Invalid phase id: {} (expected 1-3)", other)),
        }
    }
}

impl fmt::Display for PhaseId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.number())
    }
}

/// One stage of the weight-loss program
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Phase {
    /// Phase identifier (1-3)
    pub id: PhaseId,

    /// Display name
    pub name: String,

    /// Body fat percentage at phase start
    pub start_bf_pct: Decimal,

    /// Body fat percentage at phase end
    pub end_bf_pct: Decimal,

    /// Weight that completes the phase
    pub target_weight_kg: Decimal,

    /// Lower bound of the expected weekly loss
    pub weekly_loss_min_kg: Decimal,

    /// Upper bound of the expected weekly loss
    pub weekly_loss_max_kg: Decimal,

    /// Shortest expected phase duration
    pub estimated_duration_weeks_min: u32,

    /// Longest expected phase duration
    pub estimated_duration_weeks_max: u32,

    /// Whether the phase has been unlocked
    pub is_unlocked: bool,

    /// When the target weight was reached
    #[serde(with = "tagged_date::option", default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
}

impl Phase {
    pub fn is_completed(&self) -> bool {
        self.completed_at.is_some()
    }
}

/// The three phases keyed by id. Serialized as the ordered phase array.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Vec<Phase>", into = "Vec<Phase>")]
pub struct PhasePlan {
    phases: BTreeMap<PhaseId, Phase>,
}

impl PhasePlan {
    /// Build a plan from exactly one phase per id
    pub fn new(phases: Vec<Phase>) -> Result<Self, String> {
        let mut map = BTreeMap::new();
        for phase in phases {
            let id = phase.id;
            if map.insert(id, phase).is_some() {
                return Err(format!("Duplicate phase id: {}", id));
            }
        }

        if let Some(missing) = PhaseId::ALL.iter().find(|id| !map.contains_key(id)) {
            return Err(format!("Missing phase id: {}", missing));
        }

        Ok(PhasePlan { phases: map })
    }

    /// Look up a phase by id
    pub fn get(&self, id: PhaseId) -> &Phase {
        // Construction guarantees every id is present
        &self.phases[&id]
    }

    pub(crate) fn get_mut(&mut self, id: PhaseId) -> &mut Phase {
        self.phases
            .get_mut(&id)
            .unwrap_or_else(|| unreachable!("phase plan is missing phase {}", id))
    }

    /// Phases in id order
    pub fn iter(&self) -> impl Iterator<Item = &Phase> {
        self.phases.values()
    }

    /// Lowest-id phase without a completion timestamp (None once every phase is done)
    pub fn active_phase(&self) -> Option<&Phase> {
        self.iter().find(|phase| !phase.is_completed())
    }

    pub fn is_program_complete(&self) -> bool {
        self.active_phase().is_none()
    }
}

impl Default for PhasePlan {
    fn default() -> Self {
        let phases = vec![
            Phase {
                id: PhaseId::One,
                name: "Foundation".to_string(),
                start_bf_pct: dec!(34),
                end_bf_pct: dec!(25),
                target_weight_kg: dec!(100),
                weekly_loss_min_kg: dec!(0.5),
                weekly_loss_max_kg: dec!(1.0),
                estimated_duration_weeks_min: 14,
                estimated_duration_weeks_max: 28,
                is_unlocked: true,
                completed_at: None,
            },
            Phase {
                id: PhaseId::Two,
                name: "Refinement".to_string(),
                start_bf_pct: dec!(25),
                end_bf_pct: dec!(20),
                target_weight_kg: dec!(94),
                weekly_loss_min_kg: dec!(0.5),
                weekly_loss_max_kg: dec!(0.75),
                estimated_duration_weeks_min: 10,
                estimated_duration_weeks_max: 14,
                is_unlocked: false,
                completed_at: None,
            },
            Phase {
                id: PhaseId::Three,
                name: "Precision".to_string(),
                start_bf_pct: dec!(20),
                end_bf_pct: dec!(15),
                target_weight_kg: dec!(88),
                weekly_loss_min_kg: dec!(0.5),
                weekly_loss_max_kg: dec!(1.0),
                estimated_duration_weeks_min: 10,
                estimated_duration_weeks_max: 16,
                is_unlocked: false,
                completed_at: None,
            },
        ];

        PhasePlan {
            phases: phases.into_iter().map(|p| (p.id, p)).collect(),
        }
    }
}

impl TryFrom<Vec<Phase>> for PhasePlan {
    type Error = String;

    fn try_from(phases: Vec<Phase>) -> Result<Self, Self::Error> {
        PhasePlan::new(phases)
    }
}

impl From<PhasePlan> for Vec<Phase> {
    fn from(plan: PhasePlan) -> Self {
        plan.phases.into_values().collect()
    }
}

/// A single weigh-in observation with its derived metrics
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeighIn {
    /// Unique identifier
    pub id: String,

    /// Date of the observation
    #[serde(with = "tagged_date")]
    pub date: DateTime<Utc>,

    /// Raw scale weight
    pub weight_kg: Decimal,

    /// Phase that was active when the weigh-in was recorded
    pub phase_id: PhaseId,

    /// Change versus the previous entry (0 for the first entry)
    pub weekly_delta_kg: Decimal,

    /// Rolling average over the four entries ending at this one
    pub four_week_avg_kg: Decimal,

    /// Estimated body fat percentage (approximate)
    pub estimated_bf_pct: Decimal,

    /// Estimated fat mass (approximate)
    pub estimated_fat_mass_kg: Decimal,

    /// Free-text note
    pub notes: String,

    /// Generated commentary
    pub insight: String,

    /// Optional progress photo reference
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub photo_path: Option<String>,

    /// Whether the weight was amended after recording
    pub is_edited: bool,

    /// When the amendment happened
    #[serde(with = "tagged_date::option", default, skip_serializing_if = "Option::is_none")]
    pub edited_at: Option<DateTime<Utc>>,

    /// Creation timestamp
    #[serde(with = "tagged_date")]
    pub created_at: DateTime<Utc>,
}

/// Trend view window in weeks
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum TrendWindow {
    #[default]
    Four,
    Six,
    Eight,
    Twelve,
}

impl TrendWindow {
    pub fn weeks(self) -> usize {
        match self {
            TrendWindow::Four => 4,
            TrendWindow::Six => 6,
            TrendWindow::Eight => 8,
            TrendWindow::Twelve => 12,
        }
    }
}

impl From<TrendWindow> for u8 {
    fn from(window: TrendWindow) -> Self {
        window.weeks() as u8
    }
}

impl TryFrom<u8> for TrendWindow {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            4 => Ok(TrendWindow::Four),
            6 => Ok(TrendWindow::Six),
            8 => Ok(TrendWindow::Eight),
            12 => Ok(TrendWindow::Twelve),
            other => Err(format!("Invalid trend window: {} (expected 4, 6, 8 or 12)", other)),
        }
    }
}

impl std::str::FromStr for TrendWindow {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let weeks: u8 = s
            .trim()
            .parse()
            .map_err(|_| format!("Invalid trend window: {}", s))?;
        TrendWindow::try_from(weeks)
    }
}

/// Aggregate application state, re-derivable from profile, phases and history
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppState {
    /// Phase currently being worked on
    pub current_phase: PhaseId,

    /// Most recent recorded weight
    pub current_weight_kg: Decimal,

    /// Whether progress has stalled
    pub plateau_mode: bool,

    /// When the current plateau was first detected
    #[serde(with = "tagged_date::option", default, skip_serializing_if = "Option::is_none")]
    pub plateau_detected_at: Option<DateTime<Utc>>,

    /// Selected trend view window
    pub trend_view_weeks: TrendWindow,

    /// Date of the most recent weigh-in
    #[serde(with = "tagged_date::option", default, skip_serializing_if = "Option::is_none")]
    pub last_weigh_in_date: Option<DateTime<Utc>>,

    /// Date the next weigh-in is due
    #[serde(with = "tagged_date")]
    pub next_weigh_in_date: DateTime<Utc>,

    /// Whether Sunday photo reminders are shown
    pub photo_reminders_enabled: bool,

    /// Whether onboarding has been completed
    pub has_completed_onboarding: bool,
}

impl AppState {
    /// Fresh state for a profile that has not recorded anything yet
    pub fn default_at(profile: &UserProfile, now: DateTime<Utc>) -> Self {
        AppState {
            current_phase: PhaseId::One,
            current_weight_kg: profile.starting_weight_kg,
            plateau_mode: false,
            plateau_detected_at: None,
            trend_view_weeks: TrendWindow::default(),
            last_weigh_in_date: None,
            next_weigh_in_date: schedule::next_sunday(now),
            photo_reminders_enabled: true,
            has_completed_onboarding: false,
        }
    }
}
