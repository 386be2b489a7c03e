//! The surface the UI talks to. Every write goes validate -> store -> reload ->
//! recompute, so prediction and statistics always describe the latest data.

use chrono::{Duration, Local, NaiveDate};
use tracing::{debug, info};
use uuid::Uuid;

use crate::config::TrackerConfig;
use crate::crypto::EncryptedStore;
use crate::error::{Error, Result};
use crate::models::*;
use crate::prediction::{self, PredictionConfig};
use crate::statistics;
use crate::storage::{FileStore, KeyValueStore, StorageError};
use crate::store::HealthStore;
use crate::validation;

fn today() -> NaiveDate {
    Local::now().date_naive()
}

/// Loaded collections plus the views derived from them.
pub struct Tracker<S> {
    store: HealthStore<S>,
    config: PredictionConfig,
    cycles: Vec<CycleRecord>,
    records: Vec<HealthRecord>,
    preferences: Preferences,
    prediction: Option<CyclePrediction>,
    statistics: CycleStatistics,
}

impl Tracker<EncryptedStore<FileStore>> {
    /// Open the on-disk store under `config.data_dir`, sealed with `passphrase`.
    pub fn open_encrypted(config: &TrackerConfig, passphrase: &str) -> Result<Self> {
        let files = FileStore::open(config.data_dir.clone())?;
        let medium = EncryptedStore::open(files, passphrase, &config.kdf)?;
        Self::open(medium, config.prediction)
    }
}

impl<S: KeyValueStore> Tracker<S> {
    pub fn open(medium: S, config: PredictionConfig) -> Result<Self> {
        let mut tracker = Self {
            store: HealthStore::new(medium),
            config,
            cycles: Vec::new(),
            records: Vec::new(),
            preferences: Preferences::default(),
            prediction: None,
            statistics: statistics::calculate_statistics(&[]),
        };
        tracker.refresh()?;
        Ok(tracker)
    }

    /// Re-initialize the store and reload everything.
    pub fn refresh(&mut self) -> Result<()> {
        self.store.initialize()?;
        self.preferences = self.store.get_preferences()?;
        self.reload_records()?;
        self.reload_cycles()
    }

    fn reload_cycles(&mut self) -> Result<()> {
        self.cycles = self.store.get_cycles()?;
        self.prediction = prediction::predict_next(&self.cycles, &self.config);
        self.statistics = statistics::calculate_statistics(&self.cycles);
        debug!(cycles = self.cycles.len(), "recomputed prediction and statistics");
        Ok(())
    }

    fn reload_records(&mut self) -> Result<()> {
        self.records = self.store.get_health_records()?;
        Ok(())
    }

    pub fn store(&self) -> &HealthStore<S> {
        &self.store
    }

    /// Most recent first.
    pub fn cycles(&self) -> &[CycleRecord] {
        &self.cycles
    }

    /// Most recent first.
    pub fn records(&self) -> &[HealthRecord] {
        &self.records
    }

    pub fn preferences(&self) -> &Preferences {
        &self.preferences
    }

    pub fn prediction(&self) -> Option<&CyclePrediction> {
        self.prediction.as_ref()
    }

    pub fn statistics(&self) -> &CycleStatistics {
        &self.statistics
    }

    pub fn add_cycle(&mut self, entry: CycleEntry) -> Result<CycleRecord> {
        let record = CycleRecord::new(entry);
        validation::validate_cycle(&record, today())?;
        let stored = self.store.save_cycle(record)?;
        self.reload_cycles()?;
        Ok(stored)
    }

    pub fn update_cycle(&mut self, id: Uuid, patch: CyclePatch) -> Result<CycleRecord> {
        let updated = self
            .cycles
            .iter()
            .find(|c| c.id == id)
            .ok_or(Error::CycleNotFound(id))?
            .patched(patch);
        validation::validate_cycle(&updated, today())?;
        let stored = self.store.save_cycle(updated)?;
        self.reload_cycles()?;
        Ok(stored)
    }

    pub fn delete_cycle(&mut self, id: Uuid) -> Result<()> {
        self.store.delete_cycle(id)?;
        self.reload_cycles()
    }

    pub fn save_record(&mut self, entry: HealthEntry) -> Result<HealthRecord> {
        let record = HealthRecord::new(entry);
        validation::validate_health_record(&record, today())?;
        let stored = self.store.save_health_record(record)?;
        self.reload_records()?;
        Ok(stored)
    }

    pub fn record_by_date(&self, date: NaiveDate) -> Result<Option<HealthRecord>> {
        Ok(self.store.get_health_record_by_date(date)?)
    }

    pub fn delete_record(&mut self, id: Uuid) -> Result<()> {
        self.store.delete_health_record(id)?;
        self.reload_records()
    }

    pub fn update_preferences(&mut self, update: PreferencesUpdate) -> Result<&Preferences> {
        validation::validate_preferences_update(&update)?;
        self.preferences = self.store.save_preferences(&update)?;
        Ok(&self.preferences)
    }

    pub fn reset_preferences(&mut self) -> Result<&Preferences> {
        self.update_preferences(PreferencesUpdate::from(&Preferences::default()))
    }

    pub fn toggle_notifications(&mut self) -> Result<&Preferences> {
        let enabled = !self.preferences.enable_notifications;
        self.update_preferences(PreferencesUpdate {
            enable_notifications: Some(enabled),
            ..Default::default()
        })
    }

    pub fn set_theme(&mut self, theme: Theme) -> Result<&Preferences> {
        self.update_preferences(PreferencesUpdate {
            theme: Some(theme),
            ..Default::default()
        })
    }

    pub fn set_cycle_length(&mut self, length: u32) -> Result<&Preferences> {
        self.update_preferences(PreferencesUpdate {
            cycle_length: Some(length),
            ..Default::default()
        })
    }

    pub fn set_period_length(&mut self, length: u32) -> Result<&Preferences> {
        self.update_preferences(PreferencesUpdate {
            period_length: Some(length),
            ..Default::default()
        })
    }

    pub fn set_notification_time(&mut self, time: &str) -> Result<&Preferences> {
        self.update_preferences(PreferencesUpdate {
            notification_time: Some(time.to_string()),
            ..Default::default()
        })
    }

    /// Phase of `date` relative to the latest recorded cycle. Uses the
    /// predicted cycle length, or the preferred one when nothing is predicted.
    pub fn current_phase(&self, date: NaiveDate) -> Option<CyclePhase> {
        let last_start = self.cycles.iter().map(|c| c.start_date).max()?;
        let length = self
            .prediction
            .as_ref()
            .map_or(self.preferences.cycle_length, |p| p.cycle_length);
        Some(prediction::current_phase(date, last_start, length))
    }

    /// Predicted markers, minus the kinds the user has hidden.
    pub fn calendar_events(&self) -> Vec<CalendarEvent> {
        let Some(prediction) = &self.prediction else {
            return Vec::new();
        };
        prediction::to_calendar_events(prediction)
            .into_iter()
            .filter(|e| match e.kind {
                CalendarEventKind::FertileWindowStart | CalendarEventKind::FertileWindowEnd => {
                    self.preferences.show_fertility_window
                }
                CalendarEventKind::Ovulation => self.preferences.show_ovulation_prediction,
                CalendarEventKind::PeriodStart | CalendarEventKind::PeriodEnd => true,
            })
            .collect()
    }

    /// Everything a month grid needs. `None` for an invalid year/month.
    pub fn month(&self, year: i32, month: u32) -> Option<MonthView> {
        let first_day = NaiveDate::from_ymd_opt(year, month, 1)?;
        let last_day = if month == 12 {
            NaiveDate::from_ymd_opt(year + 1, 1, 1)
        } else {
            NaiveDate::from_ymd_opt(year, month + 1, 1)
        }? - Duration::days(1);
        let in_month = |date: NaiveDate| date >= first_day && date <= last_day;

        Some(MonthView {
            year,
            month,
            cycles: self
                .cycles
                .iter()
                .filter(|c| in_month(c.start_date))
                .cloned()
                .collect(),
            records: self
                .records
                .iter()
                .filter(|r| in_month(r.date))
                .cloned()
                .collect(),
            events: self
                .calendar_events()
                .into_iter()
                .filter(|e| in_month(e.date))
                .collect(),
            prediction: self.prediction.clone(),
            statistics: self.statistics.clone(),
        })
    }

    pub fn analytics(&self, today: NaiveDate) -> HealthAnalytics {
        HealthAnalytics {
            cycle_stats: self.statistics.clone(),
            mood_trend: statistics::mood_trend(&self.records, today),
            recent_mood_average: statistics::recent_mood_average(&self.records, today),
            symptom_frequency: statistics::symptom_frequency(&self.records),
            cycle_length_trend: statistics::cycle_length_trend(&self.cycles),
            period_length_trend: statistics::period_length_trend(&self.cycles),
        }
    }

    pub fn export_json(&self) -> Result<String> {
        let snapshot = self.store.export_all()?;
        Ok(serde_json::to_string_pretty(&snapshot).map_err(StorageError::from)?)
    }

    pub fn import_json(&mut self, text: &str) -> Result<()> {
        self.store.import_json(text)?;
        info!("import complete, reloading");
        self.refresh()
    }

    pub fn clear_all(&mut self) -> Result<()> {
        self.store.clear_all()?;
        self.refresh()
    }

    pub fn storage_usage(&self) -> Result<StorageUsage> {
        Ok(self.store.storage_usage()?)
    }
}
