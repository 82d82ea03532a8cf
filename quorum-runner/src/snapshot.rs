//! Engine snapshots — JSON persistence of selection state and performance.
//!
//! A snapshot carries the configuration fingerprint it was taken under;
//! restoring under a different configuration is allowed but logged.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use quorum_core::domain::{StrategyId, StrategyPerformance};

use crate::config::EngineConfig;
use crate::engine::EngineStateView;

pub const SNAPSHOT_VERSION: u32 = 1;

#[derive(Debug, Error)]
pub enum SnapshotError {
    #[error("snapshot I/O at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("snapshot JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("unsupported snapshot version {found} (expected {SNAPSHOT_VERSION})")]
    Version { found: u32 },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineSnapshot {
    pub version: u32,
    pub config_fingerprint: String,
    pub saved_at: DateTime<Utc>,
    pub authoritative: Option<StrategyId>,
    pub last_switch: Option<DateTime<Utc>>,
    pub inverse_mode: bool,
    pub performances: Vec<StrategyPerformance>,
}

impl EngineSnapshot {
    pub fn new(config: &EngineConfig, state: EngineStateView, saved_at: DateTime<Utc>) -> Self {
        Self {
            version: SNAPSHOT_VERSION,
            config_fingerprint: config.fingerprint(),
            saved_at,
            authoritative: state.authoritative,
            last_switch: state.last_switch,
            inverse_mode: state.inverse_mode,
            performances: state.performances,
        }
    }
}

/// Write `snapshot` as pretty JSON, creating parent directories.
///
/// The file is written to a sibling temp path and renamed into place.
pub fn save_snapshot(path: &Path, snapshot: &EngineSnapshot) -> Result<(), SnapshotError> {
    let io_err = |source| SnapshotError::Io {
        path: path.to_path_buf(),
        source,
    };
    let json = serde_json::to_string_pretty(snapshot)?;
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent).map_err(io_err)?;
        }
    }
    let tmp = path.with_extension("json.tmp");
    fs::write(&tmp, json).map_err(io_err)?;
    fs::rename(&tmp, path).map_err(io_err)?;
    Ok(())
}

/// Read a snapshot. A missing file is `Ok(None)`.
pub fn load_snapshot(path: &Path) -> Result<Option<EngineSnapshot>, SnapshotError> {
    let content = match fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
        Err(source) => {
            return Err(SnapshotError::Io {
                path: path.to_path_buf(),
                source,
            })
        }
    };
    let snapshot: EngineSnapshot = serde_json::from_str(&content)?;
    if snapshot.version != SNAPSHOT_VERSION {
        return Err(SnapshotError::Version {
            found: snapshot.version,
        });
    }
    Ok(Some(snapshot))
}
