use std::collections::BTreeMap;

use chrono::{Duration, NaiveDate};

use crate::models::{CycleRecord, CycleStatistics, HealthRecord, Regularity, SymptomStat};

/// Days of history considered "recent" for mood analytics.
pub const RECENT_WINDOW_DAYS: i64 = 30;
/// Cycles shown in the length trend lines.
pub const TREND_CYCLES: usize = 6;

/// Compute cycle statistics for the stats view.
pub fn calculate_statistics(cycles: &[CycleRecord]) -> CycleStatistics {
    if cycles.is_empty() {
        return CycleStatistics {
            average_cycle_length: 0.0,
            average_period_length: 0.0,
            cycle_regularity: Regularity::Irregular,
            longest_cycle: 0,
            shortest_cycle: 0,
            total_cycles: 0,
            last_cycle_length: None,
        };
    }

    let mut ordered: Vec<&CycleRecord> = cycles.iter().collect();
    ordered.sort_by_key(|c| c.start_date);

    let cycle_lengths: Vec<u32> = ordered.iter().map(|c| c.cycle_length).collect();
    let period_lengths: Vec<u32> = ordered.iter().map(|c| c.period_length).collect();

    CycleStatistics {
        average_cycle_length: round_tenth(mean(&cycle_lengths)),
        average_period_length: round_tenth(mean(&period_lengths)),
        cycle_regularity: regularity(&cycle_lengths),
        longest_cycle: cycle_lengths.iter().copied().max().unwrap_or(0),
        shortest_cycle: cycle_lengths.iter().copied().min().unwrap_or(0),
        total_cycles: ordered.len(),
        last_cycle_length: cycle_lengths.last().copied(),
    }
}

/// Classify by population standard deviation. Fewer than three samples is
/// not enough evidence to call anything regular.
pub fn regularity(cycle_lengths: &[u32]) -> Regularity {
    if cycle_lengths.len() < 3 {
        return Regularity::Irregular;
    }
    let std_dev = population_std_deviation(cycle_lengths);
    if std_dev <= 2.0 {
        Regularity::VeryRegular
    } else if std_dev <= 4.0 {
        Regularity::Regular
    } else {
        Regularity::Irregular
    }
}

/// Mean mood over the last 30 days, one decimal; 0 when nothing was logged.
pub fn recent_mood_average(records: &[HealthRecord], today: NaiveDate) -> f64 {
    let moods: Vec<u32> = recent(records, today).map(|r| r.mood as u32).collect();
    if moods.is_empty() {
        return 0.0;
    }
    round_tenth(mean(&moods))
}

/// Moods of the last 30 days, oldest first.
pub fn mood_trend(records: &[HealthRecord], today: NaiveDate) -> Vec<u8> {
    let mut window: Vec<&HealthRecord> = recent(records, today).collect();
    window.sort_by_key(|r| r.date);
    window.into_iter().map(|r| r.mood).collect()
}

pub fn symptom_frequency(records: &[HealthRecord]) -> BTreeMap<String, usize> {
    let mut frequency = BTreeMap::new();
    for symptom in records.iter().flat_map(|r| r.symptoms.iter()) {
        *frequency.entry(symptom.clone()).or_insert(0) += 1;
    }
    frequency
}

/// Per-symptom count and share of records (rounded percent).
pub fn symptom_stats(records: &[HealthRecord]) -> BTreeMap<String, SymptomStat> {
    let total = records.len();
    symptom_frequency(records)
        .into_iter()
        .map(|(id, count)| {
            let percentage = ((count as f64 / total as f64) * 100.0).round() as u32;
            (id, SymptomStat { count, percentage })
        })
        .collect()
}

pub fn cycle_length_trend(cycles: &[CycleRecord]) -> Vec<u32> {
    trend(cycles, |c| c.cycle_length)
}

pub fn period_length_trend(cycles: &[CycleRecord]) -> Vec<u32> {
    trend(cycles, |c| c.period_length)
}

fn trend(cycles: &[CycleRecord], field: impl Fn(&CycleRecord) -> u32) -> Vec<u32> {
    let mut ordered: Vec<&CycleRecord> = cycles.iter().collect();
    ordered.sort_by_key(|c| c.start_date);
    let skip = ordered.len().saturating_sub(TREND_CYCLES);
    ordered.into_iter().skip(skip).map(field).collect()
}

fn recent(records: &[HealthRecord], today: NaiveDate) -> impl Iterator<Item = &HealthRecord> {
    let since = today - Duration::days(RECENT_WINDOW_DAYS);
    records.iter().filter(move |r| r.date >= since)
}

pub(crate) fn mean(values: &[u32]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().map(|&v| v as f64).sum::<f64>() / values.len() as f64
}

fn population_std_deviation(values: &[u32]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let avg = mean(values);
    let variance = values
        .iter()
        .map(|&v| (v as f64 - avg).powi(2))
        .sum::<f64>()
        / values.len() as f64;
    variance.sqrt()
}

fn round_tenth(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}
