use std::fs;
use std::path::{Path, PathBuf};

use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::{debug, info, warn};

use crate::io::lock::{FileLock, LockError};
use crate::io::recovery::{self, RecoveryEntry};
use crate::model::config::KpiConfig;
use crate::model::dataset::Dataset;
use crate::model::entry::{EntryKey, EntryRecord, EntrySheet};

pub const DATA_DIR: &str = "kpi";
pub const CONFIG_FILE: &str = "kpi.toml";
pub const INDICATORS_FILE: &str = "indicators.json";
pub const PERIODS_FILE: &str = "periods.json";
pub const CATEGORIES_FILE: &str = "categories.json";
pub const ENTRIES_FILE: &str = "entries.json";

/// Error type for dataset I/O operations
#[derive(Debug, thiserror::Error)]
pub enum DatasetError {
    #[error("not a kpi dataset: no kpi/kpi.toml found")]
    NotADataset,
    #[error("could not read {path}: {source}")]
    ReadError {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("could not write {path}: {source}")]
    WriteError {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("could not parse {path}: {source}")]
    JsonError {
        path: PathBuf,
        source: serde_json::Error,
    },
    #[error("could not parse kpi.toml: {0}")]
    ConfigParseError(#[from] toml::de::Error),
    #[error("{0}")]
    Lock(#[from] LockError),
}

/// Discover the dataset by walking up from the given directory, looking for
/// a `kpi/` subdirectory holding `kpi.toml`.
pub fn discover_dataset(start: &Path) -> Result<PathBuf, DatasetError> {
    let mut current = start.to_path_buf();
    loop {
        let data_dir = current.join(DATA_DIR);
        if data_dir.is_dir() && data_dir.join(CONFIG_FILE).exists() {
            return Ok(current);
        }
        if !current.pop() {
            return Err(DatasetError::NotADataset);
        }
    }
}

fn read_text(path: &Path) -> Result<String, DatasetError> {
    fs::read_to_string(path).map_err(|e| DatasetError::ReadError {
        path: path.to_path_buf(),
        source: e,
    })
}

/// Read a JSON array. Optional files that don't exist read as empty.
fn read_json_list<T: DeserializeOwned>(path: &Path, required: bool) -> Result<Vec<T>, DatasetError> {
    if !required && !path.exists() {
        return Ok(Vec::new());
    }
    let text = read_text(path)?;
    serde_json::from_str(&text).map_err(|e| DatasetError::JsonError {
        path: path.to_path_buf(),
        source: e,
    })
}

fn write_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<(), DatasetError> {
    let mut content = serde_json::to_string_pretty(value).map_err(|e| DatasetError::JsonError {
        path: path.to_path_buf(),
        source: e,
    })?;
    content.push('\n');
    recovery::atomic_write(path, content.as_bytes()).map_err(|e| DatasetError::WriteError {
        path: path.to_path_buf(),
        source: e,
    })
}

pub fn read_config(data_dir: &Path) -> Result<KpiConfig, DatasetError> {
    let text = read_text(&data_dir.join(CONFIG_FILE))?;
    Ok(toml::from_str(&text)?)
}

/// Load a complete dataset from the given root directory.
pub fn load_dataset(root: &Path) -> Result<Dataset, DatasetError> {
    let data_dir = root.join(DATA_DIR);
    if !data_dir.is_dir() {
        return Err(DatasetError::NotADataset);
    }

    let config = read_config(&data_dir)?;
    let indicators = read_json_list(&data_dir.join(INDICATORS_FILE), false)?;
    let periods = read_json_list(&data_dir.join(PERIODS_FILE), false)?;
    let categories = read_json_list(&data_dir.join(CATEGORIES_FILE), false)?;
    let records: Vec<EntryRecord> = read_json_list(&data_dir.join(ENTRIES_FILE), false)?;

    let dataset = Dataset {
        root: root.to_path_buf(),
        data_dir,
        config,
        indicators,
        periods,
        categories,
        entries: EntrySheet::from_records(&records),
    };
    debug!(
        indicators = dataset.indicators.len(),
        periods = dataset.periods.len(),
        entries = dataset.entries.len(),
        "dataset loaded"
    );
    Ok(dataset)
}

/// Save the period list back to disk
pub fn save_periods(dataset: &Dataset) -> Result<(), DatasetError> {
    let _lock = FileLock::acquire_default(&dataset.data_dir)?;
    write_json(&dataset.data_dir.join(PERIODS_FILE), &dataset.periods)?;
    info!(count = dataset.periods.len(), "periods saved");
    Ok(())
}

/// Persist every dirty entry and clear its dirty flag.
///
/// The stored file is re-read under the lock and only the dirty cells are
/// merged in, so cells written by another process since load survive. If the
/// write fails the dirty values go to the recovery log and stay dirty.
pub fn save_entries(dataset: &mut Dataset) -> Result<Vec<EntryKey>, DatasetError> {
    if !dataset.entries.has_unsaved() {
        debug!("no unsaved entries");
        return Ok(Vec::new());
    }
    let dirty = dataset.entries.dirty_keys();
    save_keys(dataset, &dirty)?;
    Ok(dirty)
}

/// Persist a single entry
pub fn save_entry(dataset: &mut Dataset, key: EntryKey) -> Result<(), DatasetError> {
    save_keys(dataset, &[key])
}

fn save_keys(dataset: &mut Dataset, keys: &[EntryKey]) -> Result<(), DatasetError> {
    if keys.is_empty() {
        return Ok(());
    }
    let _lock = FileLock::acquire_default(&dataset.data_dir)?;
    let path = dataset.data_dir.join(ENTRIES_FILE);

    let stored: Vec<EntryRecord> = read_json_list(&path, false)?;
    let mut merged = EntrySheet::from_records(&stored);
    for key in keys {
        if let Some(entry) = dataset.entries.get(*key) {
            merged.set_value(*key, entry.actual_value.clone());
        }
    }
    let records = merged.to_records();

    if let Err(e) = write_json(&path, &records) {
        let pending: Vec<EntryRecord> = records
            .into_iter()
            .filter(|r| keys.contains(&EntryKey::new(r.indicator_id, r.period_id)))
            .collect();
        warn!(error = %e, pending = pending.len(), "entry save failed");
        recovery::log_recovery(
            &dataset.data_dir,
            RecoveryEntry {
                timestamp: chrono::Utc::now(),
                description: "entries write failed".to_string(),
                fields: vec![
                    ("Target".to_string(), ENTRIES_FILE.to_string()),
                    ("Error".to_string(), e.to_string()),
                ],
                body: serde_json::to_string_pretty(&pending).unwrap_or_default(),
            },
        );
        return Err(e);
    }

    dataset.entries.mark_saved(keys);
    info!(saved = keys.len(), "entries saved");
    Ok(())
}
