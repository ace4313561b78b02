use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::io::Write;
use std::path::Path;

use crate::error::ExportError;
use crate::models::{AppState, PhasePlan, UserProfile, WeighIn};
use crate::storage::{tagged_date, TrackerData};

/// Everything persisted, keyed by the storage document names
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExportSnapshot {
    #[serde(with = "tagged_date")]
    pub exported_at: DateTime<Utc>,

    #[serde(rename = "weightloss_user_profile")]
    pub profile: UserProfile,

    #[serde(rename = "weightloss_phases")]
    pub phases: PhasePlan,

    #[serde(rename = "weightloss_weigh_ins")]
    pub weigh_ins: Vec<WeighIn>,

    #[serde(rename = "weightloss_app_state")]
    pub state: AppState,
}

impl ExportSnapshot {
    pub fn new(data: &TrackerData, exported_at: DateTime<Utc>) -> Self {
        ExportSnapshot {
            exported_at,
            profile: data.profile.clone(),
            phases: data.phases.clone(),
            weigh_ins: data.weigh_ins.clone(),
            state: data.state.clone(),
        }
    }

    pub fn into_data(self) -> TrackerData {
        TrackerData {
            profile: self.profile,
            phases: self.phases,
            weigh_ins: self.weigh_ins,
            state: self.state,
        }
    }
}

/// Export the full tracker snapshot to JSON
pub fn export_snapshot<P: AsRef<Path>>(
    data: &TrackerData,
    exported_at: DateTime<Utc>,
    output_path: P,
) -> Result<(), ExportError> {
    export_json(&ExportSnapshot::new(data, exported_at), output_path)
}

/// Export any serializable data structure to JSON
pub fn export_json<T, P>(data: &T, output_path: P) -> Result<(), ExportError>
where
    T: Serialize,
    P: AsRef<Path>,
{
    let json_data = serde_json::to_string_pretty(data)
        .map_err(|e| ExportError::Serialization(e.to_string()))?;

    let mut file = std::fs::File::create(output_path)?;
    file.write_all(json_data.as_bytes())?;

    Ok(())
}
