//! Write-time checks. Every write goes through one of these first; a failure
//! means nothing was stored.

use std::collections::BTreeSet;

use chrono::NaiveDate;

use crate::models::{CycleRecord, HealthRecord, PreferencesUpdate, Snapshot};
use crate::symptoms;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("cycle length {0} is outside 1..=100 days")]
    CycleLength(u32),
    #[error("period length {0} is outside 1..=20 days")]
    PeriodLength(u32),
    #[error("date {0} is in the future")]
    FutureDate(NaiveDate),
    #[error("mood {0} is outside 1..=5")]
    Mood(u8),
    #[error("unknown symptom '{0}'")]
    UnknownSymptom(String),
    #[error("preferred cycle length {0} is outside 21..=35 days")]
    PreferredCycleLength(u32),
    #[error("preferred period length {0} is outside 2..=10 days")]
    PreferredPeriodLength(u32),
    #[error("notification time '{0}' is not HH:mm")]
    NotificationTime(String),
    #[error("malformed snapshot: {0}")]
    MalformedSnapshot(String),
}

pub fn validate_cycle(record: &CycleRecord, today: NaiveDate) -> Result<(), ValidationError> {
    if !(1..=100).contains(&record.cycle_length) {
        return Err(ValidationError::CycleLength(record.cycle_length));
    }
    if !(1..=20).contains(&record.period_length) {
        return Err(ValidationError::PeriodLength(record.period_length));
    }
    if record.start_date > today {
        return Err(ValidationError::FutureDate(record.start_date));
    }
    Ok(())
}

pub fn validate_health_record(
    record: &HealthRecord,
    today: NaiveDate,
) -> Result<(), ValidationError> {
    if !(1..=5).contains(&record.mood) {
        return Err(ValidationError::Mood(record.mood));
    }
    if record.date > today {
        return Err(ValidationError::FutureDate(record.date));
    }
    if let Some(unknown) = record.symptoms.iter().find(|s| !symptoms::is_known(s)) {
        return Err(ValidationError::UnknownSymptom(unknown.clone()));
    }
    Ok(())
}

/// Only the fields present in the update are checked.
pub fn validate_preferences_update(update: &PreferencesUpdate) -> Result<(), ValidationError> {
    if let Some(length) = update.cycle_length {
        if !(21..=35).contains(&length) {
            return Err(ValidationError::PreferredCycleLength(length));
        }
    }
    if let Some(length) = update.period_length {
        if !(2..=10).contains(&length) {
            return Err(ValidationError::PreferredPeriodLength(length));
        }
    }
    if let Some(ref time) = update.notification_time {
        if !is_notification_time(time) {
            return Err(ValidationError::NotificationTime(time.clone()));
        }
    }
    Ok(())
}

/// Checks everything an import would write as though each item were saved on
/// its own, and also rejects two items on one calendar day. Every failure is
/// reported as [`ValidationError::MalformedSnapshot`].
pub fn validate_snapshot(snapshot: &Snapshot, today: NaiveDate) -> Result<(), ValidationError> {
    let malformed = |what: String| ValidationError::MalformedSnapshot(what);

    let mut cycle_days = BTreeSet::new();
    for cycle in &snapshot.cycles {
        validate_cycle(cycle, today)
            .map_err(|e| malformed(format!("cycle {}: {e}", cycle.id)))?;
        if !cycle_days.insert(cycle.start_date) {
            let day = cycle.start_date;
            return Err(malformed(format!("more than one cycle starts on {day}")));
        }
    }

    let mut record_days = BTreeSet::new();
    for record in &snapshot.records {
        validate_health_record(record, today)
            .map_err(|e| malformed(format!("record {}: {e}", record.id)))?;
        if !record_days.insert(record.date) {
            return Err(malformed(format!("more than one record on {}", record.date)));
        }
    }

    validate_preferences_update(&PreferencesUpdate::from(&snapshot.preferences))
        .map_err(|e| malformed(format!("preferences: {e}")))
}

/// `H:mm` or `HH:mm`, hours 0-23, minutes 00-59.
pub fn is_notification_time(time: &str) -> bool {
    let Some((hours, minutes)) = time.split_once(':') else {
        return false;
    };
    let all_digits = |s: &str| !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit());
    if !all_digits(hours) || hours.len() > 2 || !all_digits(minutes) || minutes.len() != 2 {
        return false;
    }
    matches!(hours.parse::<u32>(), Ok(h) if h <= 23) && matches!(minutes.parse::<u32>(), Ok(m) if m <= 59)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{CycleEntry, CyclePhase, HealthEntry, Preferences};

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 6, 15).unwrap()
    }

    fn cycle(start: NaiveDate, cycle_length: u32, period_length: u32) -> CycleRecord {
        CycleRecord::new(CycleEntry {
            start_date: start,
            cycle_length,
            period_length,
            symptoms: BTreeSet::new(),
            notes: None,
        })
    }

    fn record(date: NaiveDate, mood: u8, symptoms: &[&str]) -> HealthRecord {
        HealthRecord::new(HealthEntry {
            date,
            cycle_phase: CyclePhase::Follicular,
            symptoms: symptoms.iter().map(|s| s.to_string()).collect(),
            mood,
            medication: vec![],
            notes: String::new(),
            temperature: None,
            weight: None,
        })
    }

    #[test]
    fn cycle_length_boundaries() {
        let day = today();
        assert_eq!(
            validate_cycle(&cycle(day, 0, 5), day),
            Err(ValidationError::CycleLength(0))
        );
        assert_eq!(
            validate_cycle(&cycle(day, 101, 5), day),
            Err(ValidationError::CycleLength(101))
        );
        assert!(validate_cycle(&cycle(day, 1, 1), day).is_ok());
        assert!(validate_cycle(&cycle(day, 100, 5), day).is_ok());
    }

    #[test]
    fn period_length_boundaries() {
        let day = today();
        assert!(validate_cycle(&cycle(day, 28, 0), day).is_err());
        assert!(validate_cycle(&cycle(day, 28, 21), day).is_err());
        assert!(validate_cycle(&cycle(day, 28, 20), day).is_ok());
    }

    #[test]
    fn future_dates_rejected() {
        let tomorrow = today().succ_opt().unwrap();
        assert_eq!(
            validate_cycle(&cycle(tomorrow, 28, 5), today()),
            Err(ValidationError::FutureDate(tomorrow))
        );
        assert_eq!(
            validate_health_record(&record(tomorrow, 3, &[]), today()),
            Err(ValidationError::FutureDate(tomorrow))
        );
    }

    #[test]
    fn health_record_checks() {
        let day = today();
        assert!(validate_health_record(&record(day, 3, &["headache", "anxiety"]), day).is_ok());
        assert_eq!(
            validate_health_record(&record(day, 0, &[]), day),
            Err(ValidationError::Mood(0))
        );
        assert_eq!(
            validate_health_record(&record(day, 6, &[]), day),
            Err(ValidationError::Mood(6))
        );
        assert_eq!(
            validate_health_record(&record(day, 3, &["headache", "sneezing"]), day),
            Err(ValidationError::UnknownSymptom("sneezing".into()))
        );
    }

    #[test]
    fn preferences_only_present_fields_checked() {
        assert!(validate_preferences_update(&PreferencesUpdate::default()).is_ok());
        assert!(validate_preferences_update(&PreferencesUpdate {
            cycle_length: Some(35),
            period_length: Some(2),
            ..Default::default()
        })
        .is_ok());
        assert_eq!(
            validate_preferences_update(&PreferencesUpdate {
                cycle_length: Some(20),
                ..Default::default()
            }),
            Err(ValidationError::PreferredCycleLength(20))
        );
        assert_eq!(
            validate_preferences_update(&PreferencesUpdate {
                period_length: Some(11),
                ..Default::default()
            }),
            Err(ValidationError::PreferredPeriodLength(11))
        );
    }

    #[test]
    fn notification_time_pattern() {
        for ok in ["09:00", "9:00", "00:00", "23:59", "19:30"] {
            assert!(is_notification_time(ok), "{ok}");
        }
        for bad in ["24:00", "12:60", "12:5", "120:00", ":30", "ab:cd", "12-30", "+1:00"] {
            assert!(!is_notification_time(bad), "{bad}");
        }
    }

    fn snapshot(cycles: Vec<CycleRecord>, records: Vec<HealthRecord>) -> Snapshot {
        Snapshot {
            cycles,
            records,
            preferences: Preferences::default(),
            export_date: chrono::Utc::now(),
            schema_version: "1.0.0".into(),
        }
    }

    fn is_malformed(result: Result<(), ValidationError>) -> bool {
        matches!(result, Err(ValidationError::MalformedSnapshot(_)))
    }

    #[test]
    fn snapshot_accepts_valid_history() {
        let day = today();
        let snap = snapshot(
            vec![cycle(day.pred_opt().unwrap(), 28, 5), cycle(day, 30, 4)],
            vec![record(day, 3, &["fatigue"])],
        );
        assert_eq!(validate_snapshot(&snap, day), Ok(()));
    }

    #[test]
    fn snapshot_rejects_bad_items_and_repeated_days() {
        let day = today();
        assert!(is_malformed(validate_snapshot(
            &snapshot(vec![cycle(day, 4_000_000_000, 5)], vec![]),
            day
        )));
        assert!(is_malformed(validate_snapshot(
            &snapshot(vec![cycle(day, 28, 0)], vec![]),
            day
        )));
        assert!(is_malformed(validate_snapshot(
            &snapshot(vec![cycle(day, 28, 5), cycle(day, 30, 5)], vec![]),
            day
        )));
        assert!(is_malformed(validate_snapshot(
            &snapshot(vec![], vec![record(day, 3, &[]), record(day, 4, &[])]),
            day
        )));
        assert!(is_malformed(validate_snapshot(
            &snapshot(vec![], vec![record(day, 0, &[])]),
            day
        )));

        let mut snap = snapshot(vec![], vec![]);
        snap.preferences.cycle_length = 99;
        assert!(is_malformed(validate_snapshot(&snap, day)));
        snap.preferences.cycle_length = 28;
        snap.preferences.notification_time = "99:99".into();
        assert!(is_malformed(validate_snapshot(&snap, day)));
    }
}
