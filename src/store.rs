//! Versioned persistence of cycles, health records and preferences on top of a
//! [`KeyValueStore`].
//!
//! Each collection lives under one key and is always rewritten whole, so a
//! collection is either the old or the new version, never a mix. Records are
//! keyed by calendar day: saving a second record for a day replaces the first.

use chrono::{DateTime, Local, NaiveDate, Utc};
use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::error::Result;
use crate::models::{
    CycleRecord, HealthRecord, Preferences, PreferencesUpdate, Snapshot, StorageUsage,
};
use crate::storage::{KeyValueStore, StorageError};
use crate::validation::{self, ValidationError};

pub const SCHEMA_VERSION: &str = "1.0.0";

pub mod keys {
    pub const CYCLES: &str = "cycles";
    pub const HEALTH_RECORDS: &str = "health_records";
    pub const PREFERENCES: &str = "preferences";
    pub const SCHEMA_VERSION: &str = "schema_version";
}

const COLLECTION_KEYS: [&str; 3] = [keys::CYCLES, keys::HEALTH_RECORDS, keys::PREFERENCES];

type Backup = Vec<(&'static str, Option<Vec<u8>>)>;

/// Records stored one per calendar day.
trait DayKeyed: Clone {
    fn id(&self) -> Uuid;
    fn day(&self) -> NaiveDate;
    fn created_at(&self) -> DateTime<Utc>;
    fn stamp(&mut self, id: Uuid, created_at: DateTime<Utc>, updated_at: DateTime<Utc>);
}

impl DayKeyed for CycleRecord {
    fn id(&self) -> Uuid {
        self.id
    }

    fn day(&self) -> NaiveDate {
        self.start_date
    }

    fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    fn stamp(&mut self, id: Uuid, created_at: DateTime<Utc>, updated_at: DateTime<Utc>) {
        self.id = id;
        self.created_at = created_at;
        self.updated_at = updated_at;
    }
}

impl DayKeyed for HealthRecord {
    fn id(&self) -> Uuid {
        self.id
    }

    fn day(&self) -> NaiveDate {
        self.date
    }

    fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    fn stamp(&mut self, id: Uuid, created_at: DateTime<Utc>, updated_at: DateTime<Utc>) {
        self.id = id;
        self.created_at = created_at;
        self.updated_at = updated_at;
    }
}

/// Insert or merge `incoming` into `items`. An entry on the same day is
/// replaced and keeps its id and `created_at`. If the incoming id already
/// exists on another day the record was moved: that entry is replaced, or
/// dropped when the new day is already taken.
fn upsert<T: DayKeyed>(items: &mut Vec<T>, mut incoming: T, now: DateTime<Utc>) -> T {
    let same_day = items.iter().position(|e| e.day() == incoming.day());
    let same_id = items.iter().position(|e| e.id() == incoming.id());

    match (same_day, same_id) {
        (Some(day_idx), same_id) => {
            let existing = &items[day_idx];
            incoming.stamp(existing.id(), existing.created_at(), now);
            items[day_idx] = incoming.clone();
            if let Some(id_idx) = same_id.filter(|&i| i != day_idx) {
                items.remove(id_idx);
            }
        }
        (None, Some(id_idx)) => {
            let existing = &items[id_idx];
            incoming.stamp(existing.id(), existing.created_at(), now);
            items[id_idx] = incoming.clone();
        }
        (None, None) => {
            let id = incoming.id();
            incoming.stamp(id, now, now);
            items.push(incoming.clone());
        }
    }
    incoming
}

pub struct HealthStore<S> {
    medium: S,
}

impl<S: KeyValueStore> HealthStore<S> {
    pub fn new(medium: S) -> Self {
        Self { medium }
    }

    pub fn medium(&self) -> &S {
        &self.medium
    }

    /// Stamp the schema version and make sure preferences exist. Safe to call
    /// any number of times.
    pub fn initialize(&self) -> Result<(), StorageError> {
        let stored = self
            .medium
            .get(keys::SCHEMA_VERSION)?
            .map(|raw| String::from_utf8_lossy(&raw).into_owned());

        match stored.as_deref() {
            Some(SCHEMA_VERSION) => {}
            Some(previous) => {
                warn!(from = previous, to = SCHEMA_VERSION, "stored schema version differs");
                self.migrate(previous)?;
            }
            None => info!(version = SCHEMA_VERSION, "initializing new store"),
        }
        self.medium
            .set(keys::SCHEMA_VERSION, SCHEMA_VERSION.as_bytes())?;

        if self.medium.get(keys::PREFERENCES)?.is_none() {
            self.write(keys::PREFERENCES, &Preferences::default())?;
        }
        Ok(())
    }

    /// Upgrade data written under an older schema. 1.0.0 is the first
    /// version, so there is nothing to convert yet.
    fn migrate(&self, from: &str) -> Result<(), StorageError> {
        debug!(from, "no migration registered");
        Ok(())
    }

    pub fn save_cycle(&self, record: CycleRecord) -> Result<CycleRecord, StorageError> {
        let mut cycles: Vec<CycleRecord> = self.read_collection(keys::CYCLES)?;
        let stored = upsert(&mut cycles, record, Utc::now());
        self.write(keys::CYCLES, &cycles)?;
        debug!(id = %stored.id, start = %stored.start_date, "saved cycle");
        Ok(stored)
    }

    /// All cycles, most recent first.
    pub fn get_cycles(&self) -> Result<Vec<CycleRecord>, StorageError> {
        let mut cycles: Vec<CycleRecord> = self.read_collection(keys::CYCLES)?;
        cycles.sort_by(|a, b| b.start_date.cmp(&a.start_date));
        Ok(cycles)
    }

    pub fn delete_cycle(&self, id: Uuid) -> Result<(), StorageError> {
        let mut cycles: Vec<CycleRecord> = self.read_collection(keys::CYCLES)?;
        cycles.retain(|c| c.id != id);
        self.write(keys::CYCLES, &cycles)
    }

    pub fn save_health_record(&self, record: HealthRecord) -> Result<HealthRecord, StorageError> {
        let mut records: Vec<HealthRecord> = self.read_collection(keys::HEALTH_RECORDS)?;
        let stored = upsert(&mut records, record, Utc::now());
        self.write(keys::HEALTH_RECORDS, &records)?;
        debug!(id = %stored.id, date = %stored.date, "saved health record");
        Ok(stored)
    }

    /// All health records, most recent first.
    pub fn get_health_records(&self) -> Result<Vec<HealthRecord>, StorageError> {
        let mut records: Vec<HealthRecord> = self.read_collection(keys::HEALTH_RECORDS)?;
        records.sort_by(|a, b| b.date.cmp(&a.date));
        Ok(records)
    }

    pub fn get_health_record_by_date(
        &self,
        date: NaiveDate,
    ) -> Result<Option<HealthRecord>, StorageError> {
        let records: Vec<HealthRecord> = self.read_collection(keys::HEALTH_RECORDS)?;
        Ok(records.into_iter().find(|r| r.date == date))
    }

    pub fn delete_health_record(&self, id: Uuid) -> Result<(), StorageError> {
        let mut records: Vec<HealthRecord> = self.read_collection(keys::HEALTH_RECORDS)?;
        records.retain(|r| r.id != id);
        self.write(keys::HEALTH_RECORDS, &records)
    }

    /// Stored preferences, or fresh defaults if none were ever written.
    pub fn get_preferences(&self) -> Result<Preferences, StorageError> {
        Ok(self.read_value(keys::PREFERENCES)?.unwrap_or_default())
    }

    pub fn save_preferences(&self, update: &PreferencesUpdate) -> Result<Preferences, StorageError> {
        let mut prefs = self.get_preferences()?;
        prefs.apply(update);
        prefs.updated_at = Utc::now();
        self.write(keys::PREFERENCES, &prefs)?;
        Ok(prefs)
    }

    pub fn export_all(&self) -> Result<Snapshot, StorageError> {
        Ok(Snapshot {
            cycles: self.get_cycles()?,
            records: self.get_health_records()?,
            preferences: self.get_preferences()?,
            export_date: Utc::now(),
            schema_version: SCHEMA_VERSION.to_string(),
        })
    }

    /// Replace all three collections. The snapshot is validated first and
    /// nothing is written if it fails. If any write fails the previous
    /// contents are put back before the error is returned.
    pub fn import_all(&self, snapshot: &Snapshot) -> Result<()> {
        validation::validate_snapshot(snapshot, Local::now().date_naive())?;
        if snapshot.schema_version != SCHEMA_VERSION {
            warn!(
                version = %snapshot.schema_version,
                current = SCHEMA_VERSION,
                "importing snapshot from another schema version"
            );
        }

        let backup = self.stage_backup()?;
        let written = self
            .write(keys::CYCLES, &snapshot.cycles)
            .and_then(|()| self.write(keys::HEALTH_RECORDS, &snapshot.records))
            .and_then(|()| self.write(keys::PREFERENCES, &snapshot.preferences));

        if let Err(err) = written {
            warn!(error = %err, "import failed, restoring previous data");
            if let Err(restore_err) = self.restore(&backup) {
                error!(error = %restore_err, "restoring pre-import data failed");
            }
            return Err(err.into());
        }

        info!(
            cycles = snapshot.cycles.len(),
            records = snapshot.records.len(),
            "imported snapshot"
        );
        Ok(())
    }

    /// Parse and import an exported JSON document. Anything without the
    /// `cycles`, `records` and `preferences` members, or with items that
    /// would not pass validation, is rejected before the store is touched.
    pub fn import_json(&self, text: &str) -> Result<()> {
        let value: Value = serde_json::from_str(text)
            .map_err(|e| ValidationError::MalformedSnapshot(e.to_string()))?;
        check_snapshot_shape(&value)?;
        let snapshot: Snapshot = serde_json::from_value(value)
            .map_err(|e| ValidationError::MalformedSnapshot(e.to_string()))?;
        self.import_all(&snapshot)
    }

    /// Empty both collections and forget preferences.
    pub fn clear_all(&self) -> Result<(), StorageError> {
        self.write::<[CycleRecord]>(keys::CYCLES, &[])?;
        self.write::<[HealthRecord]>(keys::HEALTH_RECORDS, &[])?;
        self.medium.remove(keys::PREFERENCES)?;
        info!("cleared all data");
        Ok(())
    }

    pub fn storage_usage(&self) -> Result<StorageUsage, StorageError> {
        let cycles_size = serde_json::to_vec(&self.get_cycles()?)?.len();
        let records_size = serde_json::to_vec(&self.get_health_records()?)?.len();
        let preferences_size = serde_json::to_vec(&self.get_preferences()?)?.len();
        Ok(StorageUsage {
            total_size: cycles_size + records_size + preferences_size,
            cycles_size,
            records_size,
            preferences_size,
        })
    }

    fn stage_backup(&self) -> Result<Backup, StorageError> {
        COLLECTION_KEYS
            .iter()
            .map(|&key| -> Result<_, StorageError> { Ok((key, self.medium.get(key)?)) })
            .collect()
    }

    fn restore(&self, backup: &Backup) -> Result<(), StorageError> {
        for (key, value) in backup {
            match value {
                Some(bytes) => self.medium.set(key, bytes)?,
                None => self.medium.remove(key)?,
            }
        }
        Ok(())
    }

    fn read_value<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>, StorageError> {
        match self.medium.get(key)? {
            Some(raw) => serde_json::from_slice(&raw)
                .map(Some)
                .map_err(|source| StorageError::Corrupt {
                    key: key.to_string(),
                    source,
                }),
            None => Ok(None),
        }
    }

    fn read_collection<T: DeserializeOwned>(&self, key: &str) -> Result<Vec<T>, StorageError> {
        Ok(self.read_value(key)?.unwrap_or_default())
    }

    fn write<T: Serialize + ?Sized>(&self, key: &str, value: &T) -> Result<(), StorageError> {
        let json = serde_json::to_vec(value)?;
        self.medium.set(key, &json)
    }
}

fn check_snapshot_shape(value: &Value) -> Result<(), ValidationError> {
    let expect = |member: &str, ok: fn(&Value) -> bool, what: &str| {
        if value.get(member).is_some_and(ok) {
            Ok(())
        } else {
            Err(ValidationError::MalformedSnapshot(format!(
                "`{member}` must be {what}"
            )))
        }
    };
    expect("cycles", Value::is_array, "an array")?;
    expect("records", Value::is_array, "an array")?;
    expect("preferences", Value::is_object, "an object")
}
