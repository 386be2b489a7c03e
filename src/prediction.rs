use chrono::{Duration, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::models::{
    CalendarEvent, CalendarEventKind, CyclePhase, CyclePrediction, CycleRecord, Regularity,
};
use crate::statistics;

/// Period length assumed by [`current_phase`], which only knows a start date.
pub const ASSUMED_PERIOD_DAYS: i64 = 5;
pub const MAX_CONFIDENCE: f64 = 0.95;
/// Confidence reported when fewer than three cycles are known.
pub const LOW_DATA_CONFIDENCE: f64 = 0.3;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct PredictionConfig {
    /// Weight multiplier per step back in history. The newest cycle weighs 1.
    pub decay: f64,
    /// Days from ovulation to the next period, taken as fixed.
    pub luteal_days: i64,
    /// Fertile window opens this many days before ovulation.
    pub fertile_days_before: i64,
    /// ...and closes this many days after.
    pub fertile_days_after: i64,
}

impl Default for PredictionConfig {
    fn default() -> Self {
        Self {
            decay: 0.8,
            luteal_days: 14,
            fertile_days_before: 5,
            fertile_days_after: 4,
        }
    }
}

/// Project the next cycle from history. Input order does not matter.
/// `None` for an empty history, or when a projected date would leave the
/// representable calendar.
pub fn predict_next(cycles: &[CycleRecord], config: &PredictionConfig) -> Option<CyclePrediction> {
    let mut history: Vec<&CycleRecord> = cycles.iter().collect();
    history.sort_by_key(|c| c.start_date);
    let last = history.last()?;

    let cycle_lengths: Vec<u32> = history.iter().map(|c| c.cycle_length).collect();
    let period_lengths: Vec<u32> = history.iter().map(|c| c.period_length).collect();

    let cycle_length = weighted_average(&cycle_lengths, config.decay).round() as i64;
    let period_length = weighted_average(&period_lengths, config.decay).round() as i64;

    let next_period_start = add_days(last.start_date, cycle_length)?;
    let next_period_end = add_days(next_period_start, period_length)?;
    let ovulation_date = sub_days(next_period_start, config.luteal_days)?;

    Some(CyclePrediction {
        next_period_start,
        next_period_end,
        ovulation_date,
        fertile_window_start: sub_days(ovulation_date, config.fertile_days_before)?,
        fertile_window_end: add_days(ovulation_date, config.fertile_days_after)?,
        cycle_length: cycle_length.max(0) as u32,
        confidence: confidence(&cycle_lengths),
    })
}

fn add_days(date: NaiveDate, days: i64) -> Option<NaiveDate> {
    date.checked_add_signed(Duration::try_days(days)?)
}

fn sub_days(date: NaiveDate, days: i64) -> Option<NaiveDate> {
    date.checked_sub_signed(Duration::try_days(days)?)
}

/// Exponentially weighted mean, newest sample last. A single sample is
/// returned as is.
pub fn weighted_average(values: &[u32], decay: f64) -> f64 {
    let n = values.len();
    let (weighted_sum, total_weight) = values
        .iter()
        .enumerate()
        .fold((0.0, 0.0), |(sum, total), (i, &v)| {
            let weight = decay.powi((n - i - 1) as i32);
            (sum + v as f64 * weight, total + weight)
        });
    if total_weight == 0.0 {
        return 0.0;
    }
    weighted_sum / total_weight
}

fn confidence(cycle_lengths: &[u32]) -> f64 {
    if cycle_lengths.len() < 3 {
        return LOW_DATA_CONFIDENCE;
    }

    let mut confidence: f64 = 0.5;
    if cycle_lengths.len() >= 6 {
        confidence += 0.2;
    }
    if cycle_lengths.len() >= 12 {
        confidence += 0.1;
    }
    confidence += match statistics::regularity(cycle_lengths) {
        Regularity::VeryRegular => 0.15,
        Regularity::Regular => 0.1,
        Regularity::Irregular => 0.0,
    };

    confidence.min(MAX_CONFIDENCE)
}

/// Phase of `date` within the cycle that began on `last_period_start`.
/// Ovulation is placed mid-cycle; dates before the start count as menstrual.
pub fn current_phase(date: NaiveDate, last_period_start: NaiveDate, cycle_length: u32) -> CyclePhase {
    let day = (date - last_period_start).num_days();
    let ovulation_day = (cycle_length as f64 / 2.0).round() as i64;

    if day < ASSUMED_PERIOD_DAYS {
        CyclePhase::Menstrual
    } else if day < ovulation_day - 1 {
        CyclePhase::Follicular
    } else if day < ovulation_day + 1 {
        CyclePhase::Ovulation
    } else {
        CyclePhase::Luteal
    }
}

/// The five predicted key dates as calendar markers.
pub fn to_calendar_events(prediction: &CyclePrediction) -> Vec<CalendarEvent> {
    [
        (prediction.fertile_window_start, CalendarEventKind::FertileWindowStart),
        (prediction.ovulation_date, CalendarEventKind::Ovulation),
        (prediction.fertile_window_end, CalendarEventKind::FertileWindowEnd),
        (prediction.next_period_start, CalendarEventKind::PeriodStart),
        (prediction.next_period_end, CalendarEventKind::PeriodEnd),
    ]
    .into_iter()
    .map(|(date, kind)| CalendarEvent {
        date,
        kind,
        title: kind.title().to_string(),
        color: kind.color().to_string(),
        is_prediction: true,
    })
    .collect()
}

impl CalendarEventKind {
    pub fn title(&self) -> &'static str {
        match self {
            CalendarEventKind::FertileWindowStart => "Fertile window begins",
            CalendarEventKind::Ovulation => "Ovulation",
            CalendarEventKind::FertileWindowEnd => "Fertile window ends",
            CalendarEventKind::PeriodStart => "Period starts",
            CalendarEventKind::PeriodEnd => "Period ends",
        }
    }

    pub fn color(&self) -> &'static str {
        match self {
            CalendarEventKind::FertileWindowStart | CalendarEventKind::FertileWindowEnd => "#FFD700",
            CalendarEventKind::Ovulation => "#FFA500",
            CalendarEventKind::PeriodStart | CalendarEventKind::PeriodEnd => "#FF6B9D",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::CycleEntry;
    use proptest::prelude::*;
    use std::collections::BTreeSet;

    fn day(n: i64) -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 1, 1).unwrap() + Duration::days(n)
    }

    fn make_cycle(start: NaiveDate, cycle_length: u32, period_length: u32) -> CycleRecord {
        CycleRecord::new(CycleEntry {
            start_date: start,
            cycle_length,
            period_length,
            symptoms: BTreeSet::new(),
            notes: None,
        })
    }

    fn history(lengths: &[u32]) -> Vec<CycleRecord> {
        let mut start = 0;
        lengths
            .iter()
            .map(|&len| {
                let cycle = make_cycle(day(start), len, 5);
                start += len as i64;
                cycle
            })
            .collect()
    }

    #[test]
    fn no_prediction_without_history() {
        assert!(predict_next(&[], &PredictionConfig::default()).is_none());
    }

    #[test]
    fn out_of_calendar_projection_is_none() {
        let cycles = vec![make_cycle(day(0), 4_000_000_000, 5)];
        assert!(predict_next(&cycles, &PredictionConfig::default()).is_none());

        let near_end = vec![make_cycle(NaiveDate::MAX, 28, 5)];
        assert!(predict_next(&near_end, &PredictionConfig::default()).is_none());
    }

    #[test]
    fn single_cycle_projects_its_own_length() {
        let cycles = vec![make_cycle(day(0), 30, 6)];
        let pred = predict_next(&cycles, &PredictionConfig::default()).unwrap();
        assert_eq!(pred.next_period_start, day(30));
        assert_eq!(pred.next_period_end, day(36));
        assert_eq!(pred.cycle_length, 30);
        assert_eq!(pred.confidence, LOW_DATA_CONFIDENCE);
    }

    #[test]
    fn weights_favor_recent_cycles() {
        // (28 * 0.8 + 30) / 1.8 = 29.11 -> 29
        let cycles = vec![make_cycle(day(28), 30, 5), make_cycle(day(0), 28, 5)];
        let pred = predict_next(&cycles, &PredictionConfig::default()).unwrap();
        assert_eq!(pred.cycle_length, 29);
        assert_eq!(pred.next_period_start, day(57));
        assert_eq!(pred.ovulation_date, day(43));
        assert_eq!(pred.fertile_window_start, day(38));
        assert_eq!(pred.fertile_window_end, day(47));
        assert_eq!(pred.next_period_end, day(62));
    }

    #[test]
    fn weighted_average_of_one_value() {
        assert_eq!(weighted_average(&[31], 0.8), 31.0);
        assert_eq!(weighted_average(&[], 0.8), 0.0);
    }

    #[test]
    fn low_data_floor() {
        for lengths in [&[28][..], &[28, 28][..], &[21, 40][..]] {
            let pred = predict_next(&history(lengths), &PredictionConfig::default()).unwrap();
            assert_eq!(pred.confidence, 0.3);
        }
    }

    #[test]
    fn confidence_grows_with_regular_evidence() {
        let config = PredictionConfig::default();
        let regular = predict_next(&history(&[28; 12]), &config).unwrap();
        let irregular = predict_next(&history(&[22, 35, 27]), &config).unwrap();
        assert!(regular.confidence >= irregular.confidence);
        assert!((regular.confidence - MAX_CONFIDENCE).abs() < 1e-9);
        assert!(regular.confidence <= MAX_CONFIDENCE);
        assert!((irregular.confidence - 0.5).abs() < 1e-9);

        let six = predict_next(&history(&[25, 31, 25, 31, 25, 31]), &config).unwrap();
        assert!((six.confidence - 0.8).abs() < 1e-9);
    }

    #[test]
    fn custom_luteal_length() {
        let config = PredictionConfig {
            luteal_days: 12,
            ..Default::default()
        };
        let pred = predict_next(&history(&[28]), &config).unwrap();
        assert_eq!(pred.ovulation_date, day(16));
    }

    #[test]
    fn phase_coverage_for_28_day_cycle() {
        let start = day(0);
        for offset in 0..28 {
            let expected = match offset {
                0..=4 => CyclePhase::Menstrual,
                5..=12 => CyclePhase::Follicular,
                13..=14 => CyclePhase::Ovulation,
                _ => CyclePhase::Luteal,
            };
            assert_eq!(current_phase(day(offset), start, 28), expected, "day {offset}");
        }
    }

    #[test]
    fn phase_before_start_is_menstrual() {
        assert_eq!(current_phase(day(-3), day(0), 28), CyclePhase::Menstrual);
    }

    #[test]
    fn calendar_events_cover_key_dates() {
        let pred = predict_next(&history(&[28, 28, 28]), &PredictionConfig::default()).unwrap();
        let events = to_calendar_events(&pred);
        assert_eq!(events.len(), 5);
        assert!(events.iter().all(|e| e.is_prediction));
        let ovulation = events
            .iter()
            .find(|e| e.kind == CalendarEventKind::Ovulation)
            .unwrap();
        assert_eq!(ovulation.date, pred.ovulation_date);
        assert_eq!(ovulation.color, "#FFA500");
        let start = events
            .iter()
            .find(|e| e.kind == CalendarEventKind::PeriodStart)
            .unwrap();
        assert_eq!(start.date, pred.next_period_start);
    }

    proptest! {
        #[test]
        fn confidence_stays_bounded(lengths in proptest::collection::vec(1u32..=100, 1..30)) {
            let pred = predict_next(&history(&lengths), &PredictionConfig::default()).unwrap();
            prop_assert!(pred.confidence > 0.0);
            prop_assert!(pred.confidence <= MAX_CONFIDENCE);
            if lengths.len() < 3 {
                prop_assert_eq!(pred.confidence, LOW_DATA_CONFIDENCE);
            }
        }

        #[test]
        fn key_dates_keep_fixed_offsets(lengths in proptest::collection::vec(1u32..=100, 1..20)) {
            let pred = predict_next(&history(&lengths), &PredictionConfig::default()).unwrap();
            prop_assert_eq!((pred.next_period_start - pred.ovulation_date).num_days(), 14);
            prop_assert_eq!((pred.ovulation_date - pred.fertile_window_start).num_days(), 5);
            prop_assert_eq!((pred.fertile_window_end - pred.ovulation_date).num_days(), 4);
            prop_assert!(pred.next_period_end > pred.next_period_start);
        }
    }
}
