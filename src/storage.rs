//! JSON persistence for the four tracker aggregates
//!
//! Profile, phases, weigh-ins and app state are stored as independent JSON documents
//! (`<key>.json` in the data directory). Dates are written as tagged objects,
//! `{"__type": "Date", "value": "2024-09-22T08:00:00.000Z"}`, so they survive a
//! text-only store with millisecond precision.

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::StorageError;
use crate::models::{AppState, PhasePlan, UserProfile, WeighIn};

/// Storage keys, one document each
pub const USER_PROFILE_KEY: &str = "weightloss_user_profile";
pub const PHASES_KEY: &str = "weightloss_phases";
pub const WEIGH_INS_KEY: &str = "weightloss_weigh_ins";
pub const APP_STATE_KEY: &str = "weightloss_app_state";

pub const ALL_KEYS: [&str; 4] = [USER_PROFILE_KEY, PHASES_KEY, WEIGH_INS_KEY, APP_STATE_KEY];

/// Serde adapter for `DateTime<Utc>` as a tagged date object
pub mod tagged_date {
    use chrono::{DateTime, SecondsFormat, Utc};
    use serde::de::Error as _;
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    const DATE_TAG: &str = "Date";

    #[derive(Serialize, Deserialize)]
    struct TaggedDate {
        #[serde(rename = "__type")]
        kind: String,
        value: String,
    }

    pub fn serialize<S>(date: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        TaggedDate {
            kind: DATE_TAG.to_string(),
            value: date.to_rfc3339_opts(SecondsFormat::Millis, true),
        }
        .serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let tagged = TaggedDate::deserialize(deserializer)?;
        if tagged.kind != DATE_TAG {
            return Err(D::Error::custom(format!(
                "Expected tagged Date, found __type={}",
                tagged.kind
            )));
        }

        DateTime::parse_from_rfc3339(&tagged.value)
            .map(|date| date.with_timezone(&Utc))
            .map_err(|e| D::Error::custom(format!("Invalid date '{}': {}", tagged.value, e)))
    }

    /// Same encoding for optional dates; `None` is written as `null` or omitted
    pub mod option {
        use chrono::{DateTime, Utc};
        use serde::{Deserialize, Deserializer, Serialize, Serializer};

        #[derive(Serialize, Deserialize)]
        struct Wrapper(#[serde(with = "super")] DateTime<Utc>);

        pub fn serialize<S>(date: &Option<DateTime<Utc>>, serializer: S) -> Result<S::Ok, S::Error>
        where
            S: Serializer,
        {
            date.map(Wrapper).serialize(serializer)
        }

        pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
        where
            D: Deserializer<'de>,
        {
            let wrapped = Option::<Wrapper>::deserialize(deserializer)?;
            Ok(wrapped.map(|Wrapper(date)| date))
        }
    }
}

/// Everything the tracker persists
#[derive(Debug, Clone, PartialEq)]
pub struct TrackerData {
    pub profile: UserProfile,
    pub phases: PhasePlan,
    pub weigh_ins: Vec<WeighIn>,
    pub state: AppState,
}

impl TrackerData {
    /// Freshly initialized defaults
    pub fn defaults(now: DateTime<Utc>) -> Self {
        let profile = UserProfile::default_at(now);
        let state = AppState::default_at(&profile, now);
        TrackerData {
            profile,
            phases: PhasePlan::default(),
            weigh_ins: Vec::new(),
            state,
        }
    }
}

/// File-backed key/value store of JSON documents
#[derive(Debug, Clone)]
pub struct JsonStore {
    root: PathBuf,
}

impl JsonStore {
    pub fn new<P: AsRef<Path>>(root: P) -> Self {
        JsonStore {
            root: root.as_ref().to_path_buf(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.root.join(format!("{}.json", key))
    }

    /// Read and decode a document; `Ok(None)` if it has never been written
    pub fn get<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>, StorageError> {
        let path = self.path_for(key);
        if !path.exists() {
            return Ok(None);
        }

        let content = fs::read_to_string(&path)?;
        serde_json::from_str(&content)
            .map(Some)
            .map_err(|e| StorageError::Corrupted {
                key: key.to_string(),
                reason: e.to_string(),
            })
    }

    /// Encode and write a document, creating the data directory if needed
    pub fn set<T: Serialize>(&self, key: &str, value: &T) -> Result<(), StorageError> {
        fs::create_dir_all(&self.root)?;

        let json = serde_json::to_string_pretty(value).map_err(|e| StorageError::Serialization {
            key: key.to_string(),
            reason: e.to_string(),
        })?;

        fs::write(self.path_for(key), json)?;
        tracing::debug!(key, root = %self.root.display(), "Document saved");
        Ok(())
    }

    pub fn remove(&self, key: &str) -> Result<(), StorageError> {
        let path = self.path_for(key);
        if path.exists() {
            fs::remove_file(path)?;
        }
        Ok(())
    }

    /// Load all four documents. Fails if any required one is missing or unreadable.
    pub fn load(&self) -> Result<TrackerData, StorageError> {
        let missing = |key: &str| StorageError::NotFound {
            key: key.to_string(),
        };

        Ok(TrackerData {
            profile: self.get(USER_PROFILE_KEY)?.ok_or_else(|| missing(USER_PROFILE_KEY))?,
            phases: self.get(PHASES_KEY)?.ok_or_else(|| missing(PHASES_KEY))?,
            weigh_ins: self.get(WEIGH_INS_KEY)?.unwrap_or_default(),
            state: self.get(APP_STATE_KEY)?.ok_or_else(|| missing(APP_STATE_KEY))?,
        })
    }

    /// Load all documents, falling back to fresh defaults when anything is missing or corrupted
    pub fn load_or_default(&self, now: DateTime<Utc>) -> TrackerData {
        match self.load() {
            Ok(data) => data,
            Err(StorageError::NotFound { key }) => {
                tracing::info!(key, "No saved data found, starting from defaults");
                TrackerData::defaults(now)
            }
            Err(e) => {
                tracing::warn!(error = %e, "Saved data unreadable, starting from defaults");
                TrackerData::defaults(now)
            }
        }
    }

    /// Persist all four documents
    pub fn save(&self, data: &TrackerData) -> Result<(), StorageError> {
        self.set(USER_PROFILE_KEY, &data.profile)?;
        self.set(PHASES_KEY, &data.phases)?;
        self.set(WEIGH_INS_KEY, &data.weigh_ins)?;
        self.set(APP_STATE_KEY, &data.state)?;
        Ok(())
    }

    /// Delete every document
    pub fn clear(&self) -> Result<(), StorageError> {
        for key in ALL_KEYS {
            self.remove(key)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use tempfile::tempdir;

    fn test_now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 9, 22, 8, 0, 0).unwrap() + chrono::Duration::milliseconds(123)
    }

    #[derive(Debug, PartialEq, Serialize, serde::Deserialize)]
    struct Stamped {
        #[serde(with = "tagged_date")]
        at: DateTime<Utc>,
        #[serde(with = "tagged_date::option", default)]
        maybe: Option<DateTime<Utc>>,
    }

    #[test]
    fn test_tagged_date_shape() {
        let value = serde_json::to_value(Stamped {
            at: test_now(),
            maybe: None,
        })
        .unwrap();

        assert_eq!(value["at"]["__type"], "Date");
        assert_eq!(value["at"]["value"], "2024-09-22T08:00:00.123Z");
        assert!(value["maybe"].is_null());
    }

    #[test]
    fn test_tagged_date_round_trip() {
        let original = Stamped {
            at: test_now(),
            maybe: Some(test_now() + chrono::Duration::days(1)),
        };
        let json = serde_json::to_string(&original).unwrap();
        let parsed: Stamped = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, original);
    }

    #[test]
    fn test_tagged_date_rejects_other_tags() {
        let json = r#"{"at": {"__type": "Map", "value": "2024-09-22T08:00:00.000Z"}}"#;
        assert!(serde_json::from_str::<Stamped>(json).is_err());

        let missing = r#"{}"#;
        assert!(serde_json::from_str::<Stamped>(missing).is_err());
    }

    #[test]
    fn test_store_round_trip() {
        let dir = tempdir().unwrap();
        let store = JsonStore::new(dir.path());
        let data = TrackerData::defaults(test_now());

        store.save(&data).unwrap();
        let loaded = store.load().unwrap();

        assert_eq!(loaded, data);
        for key in ALL_KEYS {
            assert!(dir.path().join(format!("{}.json", key)).exists());
        }
    }

    #[test]
    fn test_missing_documents() {
        let dir = tempdir().unwrap();
        let store = JsonStore::new(dir.path());

        assert!(store.get::<UserProfile>(USER_PROFILE_KEY).unwrap().is_none());
        assert!(matches!(store.load(), Err(StorageError::NotFound { .. })));

        let data = store.load_or_default(test_now());
        assert_eq!(data, TrackerData::defaults(test_now()));
    }

    #[test]
    fn test_corrupted_document_falls_back_to_defaults() {
        let dir = tempdir().unwrap();
        let store = JsonStore::new(dir.path());
        store.save(&TrackerData::defaults(test_now())).unwrap();

        fs::write(dir.path().join("weightloss_phases.json"), "{ not json").unwrap();

        assert!(matches!(store.load(), Err(StorageError::Corrupted { .. })));
        let data = store.load_or_default(test_now());
        assert_eq!(data.phases, PhasePlan::default());
    }

    #[test]
    fn test_clear() {
        let dir = tempdir().unwrap();
        let store = JsonStore::new(dir.path());
        store.save(&TrackerData::defaults(test_now())).unwrap();

        store.clear().unwrap();
        assert!(matches!(store.load(), Err(StorageError::NotFound { .. })));
    }
}
