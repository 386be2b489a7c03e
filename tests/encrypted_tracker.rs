use std::collections::BTreeSet;
use std::fs;

use chrono::NaiveDate;
use cykel_core::crypto::{CryptoError, KdfParams};
use cykel_core::{CycleEntry, Error, StorageError, Theme, Tracker, TrackerConfig};

fn config(dir: &std::path::Path) -> TrackerConfig {
    let mut config = TrackerConfig::new(dir);
    config.kdf = KdfParams {
        memory_kib: 8,
        iterations: 1,
        parallelism: 1,
    };
    config
}

fn entry(start: &str, cycle_length: u32) -> CycleEntry {
    CycleEntry {
        start_date: NaiveDate::parse_from_str(start, "%Y-%m-%d").unwrap(),
        cycle_length,
        period_length: 5,
        symptoms: BTreeSet::from(["abdominal_cramps".to_string()]),
        notes: Some("heavy first day".into()),
    }
}

#[test]
fn data_survives_reopen_and_stays_sealed() {
    let dir = tempfile::tempdir().unwrap();
    let config = config(dir.path());

    {
        let mut tracker = Tracker::open_encrypted(&config, "correct horse").unwrap();
        tracker.add_cycle(entry("2024-03-01", 29)).unwrap();
        tracker.add_cycle(entry("2024-03-30", 27)).unwrap();
        tracker.set_theme(Theme::Dark).unwrap();
    }

    for file in fs::read_dir(dir.path()).unwrap() {
        let bytes = fs::read(file.unwrap().path()).unwrap();
        let text = String::from_utf8_lossy(&bytes);
        assert!(!text.contains("heavy first day"));
        assert!(!text.contains("startDate"));
    }

    let tracker = Tracker::open_encrypted(&config, "correct horse").unwrap();
    assert_eq!(tracker.cycles().len(), 2);
    assert_eq!(tracker.preferences().theme, Theme::Dark);
    let prediction = tracker.prediction().unwrap();
    // (29 * 0.8 + 27) / 1.8 = 27.9 -> 28 days after 2024-03-30
    assert_eq!(
        prediction.next_period_start,
        NaiveDate::from_ymd_opt(2024, 4, 27).unwrap()
    );
}

#[test]
fn wrong_passphrase_is_refused() {
    let dir = tempfile::tempdir().unwrap();
    let config = config(dir.path());
    Tracker::open_encrypted(&config, "right").unwrap();

    let err = Tracker::open_encrypted(&config, "wrong").err().unwrap();
    assert!(matches!(
        err,
        Error::Storage(StorageError::Crypto(CryptoError::Decryption))
    ));
}

#[test]
fn export_from_disk_imports_into_memory() {
    let dir = tempfile::tempdir().unwrap();
    let mut disk = Tracker::open_encrypted(&config(dir.path()), "pw").unwrap();
    disk.add_cycle(entry("2024-01-05", 28)).unwrap();
    let json = disk.export_json().unwrap();

    let mut memory =
        Tracker::open(cykel_core::MemoryStore::new(), Default::default()).unwrap();
    memory.import_json(&json).unwrap();
    assert_eq!(memory.cycles(), disk.cycles());
}
