//! On-device cycle prediction and health record storage.
//!
//! [`Tracker`] is the entry point for a UI: it validates input, persists it
//! through a [`HealthStore`] and keeps the derived [`CyclePrediction`] and
//! [`CycleStatistics`] current.

pub mod config;
pub mod crypto;
pub mod error;
pub mod models;
pub mod prediction;
pub mod statistics;
pub mod storage;
pub mod store;
pub mod symptoms;
pub mod tracker;
pub mod validation;

pub use config::TrackerConfig;
pub use error::{Error, Result};
pub use models::*;
pub use prediction::PredictionConfig;
pub use storage::{FileStore, KeyValueStore, MemoryStore, StorageError};
pub use store::HealthStore;
pub use tracker::Tracker;
pub use validation::ValidationError;
