use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum CyclePhase {
    Menstrual,
    Follicular,
    Ovulation,
    Luteal,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum Theme {
    Light,
    Dark,
    #[default]
    Auto,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Regularity {
    VeryRegular,
    Regular,
    Irregular,
}

/// One observed cycle. `cycle_length` is the gap to the next cycle's start.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CycleRecord {
    #[serde(deserialize_with = "record_id::deserialize")]
    pub id: Uuid,
    #[serde(with = "calendar_date")]
    pub start_date: NaiveDate,
    pub cycle_length: u32,
    pub period_length: u32,
    #[serde(default)]
    pub symptoms: BTreeSet<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Caller-supplied draft of a cycle, before an id is assigned.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CycleEntry {
    #[serde(with = "calendar_date")]
    pub start_date: NaiveDate,
    pub cycle_length: u32,
    pub period_length: u32,
    #[serde(default)]
    pub symptoms: BTreeSet<String>,
    #[serde(default)]
    pub notes: Option<String>,
}

/// Partial edit of an existing cycle. `None` leaves the field unchanged.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct CyclePatch {
    #[serde(with = "calendar_date::option")]
    pub start_date: Option<NaiveDate>,
    pub cycle_length: Option<u32>,
    pub period_length: Option<u32>,
    pub symptoms: Option<BTreeSet<String>>,
    pub notes: Option<String>,
}

impl CycleRecord {
    pub fn new(entry: CycleEntry) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            start_date: entry.start_date,
            cycle_length: entry.cycle_length,
            period_length: entry.period_length,
            symptoms: entry.symptoms,
            notes: entry.notes,
            created_at: now,
            updated_at: now,
        }
    }

    /// Copy of this record with the patch applied. Id and timestamps are kept.
    pub fn patched(&self, patch: CyclePatch) -> Self {
        let mut updated = self.clone();
        if let Some(start_date) = patch.start_date {
            updated.start_date = start_date;
        }
        if let Some(cycle_length) = patch.cycle_length {
            updated.cycle_length = cycle_length;
        }
        if let Some(period_length) = patch.period_length {
            updated.period_length = period_length;
        }
        if let Some(symptoms) = patch.symptoms {
            updated.symptoms = symptoms;
        }
        if patch.notes.is_some() {
            updated.notes = patch.notes;
        }
        updated
    }
}

/// One day's observation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct HealthRecord {
    #[serde(deserialize_with = "record_id::deserialize")]
    pub id: Uuid,
    #[serde(with = "calendar_date")]
    pub date: NaiveDate,
    pub cycle_phase: CyclePhase,
    #[serde(default)]
    pub symptoms: BTreeSet<String>,
    pub mood: u8, // 1-5
    #[serde(default)]
    pub medication: Vec<String>,
    #[serde(default)]
    pub notes: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub weight: Option<f64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct HealthEntry {
    #[serde(with = "calendar_date")]
    pub date: NaiveDate,
    pub cycle_phase: CyclePhase,
    #[serde(default)]
    pub symptoms: BTreeSet<String>,
    pub mood: u8,
    #[serde(default)]
    pub medication: Vec<String>,
    #[serde(default)]
    pub notes: String,
    #[serde(default)]
    pub temperature: Option<f64>,
    #[serde(default)]
    pub weight: Option<f64>,
}

impl HealthRecord {
    pub fn new(entry: HealthEntry) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            date: entry.date,
            cycle_phase: entry.cycle_phase,
            symptoms: entry.symptoms,
            mood: entry.mood,
            medication: entry.medication,
            notes: entry.notes,
            temperature: entry.temperature,
            weight: entry.weight,
            created_at: now,
            updated_at: now,
        }
    }
}

/// The single preferences row. `cycle_length` is the expected length,
/// independent of any observed cycle.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Preferences {
    pub cycle_length: u32,
    pub period_length: u32,
    pub enable_notifications: bool,
    pub notification_time: String, // HH:mm
    pub theme: Theme,
    pub show_fertility_window: bool,
    pub show_ovulation_prediction: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Preferences {
    pub fn defaults_at(now: DateTime<Utc>) -> Self {
        Self {
            cycle_length: 28,
            period_length: 5,
            enable_notifications: true,
            notification_time: "09:00".to_string(),
            theme: Theme::Auto,
            show_fertility_window: true,
            show_ovulation_prediction: true,
            created_at: now,
            updated_at: now,
        }
    }

    /// Merge a partial update in place. Timestamps are left to the store.
    pub fn apply(&mut self, update: &PreferencesUpdate) {
        if let Some(cycle_length) = update.cycle_length {
            self.cycle_length = cycle_length;
        }
        if let Some(period_length) = update.period_length {
            self.period_length = period_length;
        }
        if let Some(enabled) = update.enable_notifications {
            self.enable_notifications = enabled;
        }
        if let Some(ref time) = update.notification_time {
            self.notification_time = time.clone();
        }
        if let Some(theme) = update.theme {
            self.theme = theme;
        }
        if let Some(show) = update.show_fertility_window {
            self.show_fertility_window = show;
        }
        if let Some(show) = update.show_ovulation_prediction {
            self.show_ovulation_prediction = show;
        }
    }
}

impl Default for Preferences {
    fn default() -> Self {
        Self::defaults_at(Utc::now())
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct PreferencesUpdate {
    pub cycle_length: Option<u32>,
    pub period_length: Option<u32>,
    pub enable_notifications: Option<bool>,
    pub notification_time: Option<String>,
    pub theme: Option<Theme>,
    pub show_fertility_window: Option<bool>,
    pub show_ovulation_prediction: Option<bool>,
}

impl From<&Preferences> for PreferencesUpdate {
    fn from(prefs: &Preferences) -> Self {
        Self {
            cycle_length: Some(prefs.cycle_length),
            period_length: Some(prefs.period_length),
            enable_notifications: Some(prefs.enable_notifications),
            notification_time: Some(prefs.notification_time.clone()),
            theme: Some(prefs.theme),
            show_fertility_window: Some(prefs.show_fertility_window),
            show_ovulation_prediction: Some(prefs.show_ovulation_prediction),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CyclePrediction {
    pub next_period_start: NaiveDate,
    pub next_period_end: NaiveDate,
    pub ovulation_date: NaiveDate,
    pub fertile_window_start: NaiveDate,
    pub fertile_window_end: NaiveDate,
    pub cycle_length: u32,
    pub confidence: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CycleStatistics {
    pub average_cycle_length: f64,
    pub average_period_length: f64,
    pub cycle_regularity: Regularity,
    pub longest_cycle: u32,
    pub shortest_cycle: u32,
    pub total_cycles: usize,
    pub last_cycle_length: Option<u32>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum CalendarEventKind {
    PeriodStart,
    PeriodEnd,
    Ovulation,
    FertileWindowStart,
    FertileWindowEnd,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CalendarEvent {
    pub date: NaiveDate,
    pub kind: CalendarEventKind,
    pub title: String,
    pub color: String,
    pub is_prediction: bool,
}

/// Full export of the store, also the accepted import shape.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Snapshot {
    pub cycles: Vec<CycleRecord>,
    pub records: Vec<HealthRecord>,
    pub preferences: Preferences,
    #[serde(default = "Utc::now")]
    pub export_date: DateTime<Utc>,
    #[serde(default)]
    pub schema_version: String,
}

/// Serialized size in bytes of each collection.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct StorageUsage {
    pub total_size: usize,
    pub cycles_size: usize,
    pub records_size: usize,
    pub preferences_size: usize,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SymptomStat {
    pub count: usize,
    pub percentage: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct HealthAnalytics {
    pub cycle_stats: CycleStatistics,
    pub mood_trend: Vec<u8>,
    pub recent_mood_average: f64,
    pub symptom_frequency: BTreeMap<String, usize>,
    pub cycle_length_trend: Vec<u32>,
    pub period_length_trend: Vec<u32>,
}

/// Data returned to the frontend for a month view.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MonthView {
    pub year: i32,
    pub month: u32,
    pub cycles: Vec<CycleRecord>,
    pub records: Vec<HealthRecord>,
    pub events: Vec<CalendarEvent>,
    pub prediction: Option<CyclePrediction>,
    pub statistics: CycleStatistics,
}

/// Calendar dates as `YYYY-MM-DD`. Full ISO-8601 date-times are accepted on
/// input and reduced to the local calendar day.
pub mod calendar_date {
    use chrono::{DateTime, Local, NaiveDate, NaiveDateTime};
    use serde::{de, Deserialize, Deserializer, Serializer};

    const FORMAT: &str = "%Y-%m-%d";

    pub fn serialize<S: Serializer>(date: &NaiveDate, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(&date.format(FORMAT))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<NaiveDate, D::Error> {
        let raw = String::deserialize(deserializer)?;
        parse(&raw).ok_or_else(|| de::Error::custom(format!("invalid calendar date: {raw}")))
    }

    pub fn parse(raw: &str) -> Option<NaiveDate> {
        let raw = raw.trim();
        if let Ok(date) = NaiveDate::parse_from_str(raw, FORMAT) {
            return Some(date);
        }
        if let Ok(instant) = DateTime::parse_from_rfc3339(raw) {
            return Some(instant.with_timezone(&Local).date_naive());
        }
        NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
            .ok()
            .map(|dt| dt.date())
    }

    pub mod option {
        use chrono::NaiveDate;
        use serde::{de, Deserialize, Deserializer, Serializer};

        pub fn serialize<S: Serializer>(
            date: &Option<NaiveDate>,
            serializer: S,
        ) -> Result<S::Ok, S::Error> {
            match date {
                Some(date) => super::serialize(date, serializer),
                None => serializer.serialize_none(),
            }
        }

        pub fn deserialize<'de, D: Deserializer<'de>>(
            deserializer: D,
        ) -> Result<Option<NaiveDate>, D::Error> {
            match Option::<String>::deserialize(deserializer)? {
                Some(raw) => super::parse(&raw)
                    .map(Some)
                    .ok_or_else(|| de::Error::custom(format!("invalid calendar date: {raw}"))),
                None => Ok(None),
            }
        }
    }
}

/// Record ids are UUIDs. Older exports used free-form ids such as
/// `1712345678-abc123def`; those map to a name-based UUID so the same legacy
/// id always loads as the same record.
pub mod record_id {
    use serde::{Deserialize, Deserializer};
    use uuid::Uuid;

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Uuid, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Ok(parse(&raw))
    }

    pub fn parse(raw: &str) -> Uuid {
        Uuid::parse_str(raw).unwrap_or_else(|_| Uuid::new_v5(&Uuid::NAMESPACE_OID, raw.as_bytes()))
    }
}
