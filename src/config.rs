use std::env;
use std::ffi::OsString;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::crypto::KdfParams;
use crate::prediction::PredictionConfig;
use crate::storage::StorageError;

/// Overrides the data directory outright.
pub const DATA_DIR_ENV: &str = "CYKEL_DATA_DIR";
/// Set to `dev` to keep development data apart from real data.
pub const ENV_ENV: &str = "CYKEL_ENV";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TrackerConfig {
    pub data_dir: PathBuf,
    #[serde(default)]
    pub prediction: PredictionConfig,
    #[serde(default)]
    pub kdf: KdfParams,
}

impl TrackerConfig {
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
            prediction: PredictionConfig::default(),
            kdf: KdfParams::default(),
        }
    }

    pub fn from_env() -> Result<Self, StorageError> {
        Ok(Self::new(data_dir()?))
    }
}

/// `$CYKEL_DATA_DIR` if set, otherwise `<local data dir>/cykel`
/// (`cykel-dev` when `CYKEL_ENV=dev`).
pub fn data_dir() -> Result<PathBuf, StorageError> {
    resolve_data_dir(
        env::var_os(DATA_DIR_ENV),
        env::var(ENV_ENV).ok().as_deref(),
        dirs::data_local_dir(),
    )
}

fn resolve_data_dir(
    override_dir: Option<OsString>,
    env_name: Option<&str>,
    local_data: Option<PathBuf>,
) -> Result<PathBuf, StorageError> {
    if let Some(dir) = override_dir.filter(|d| !d.is_empty()) {
        return Ok(PathBuf::from(dir));
    }
    let name = match env_name {
        Some("dev") => "cykel-dev",
        _ => "cykel",
    };
    Ok(local_data.ok_or(StorageError::NoDataDir)?.join(name))
}
