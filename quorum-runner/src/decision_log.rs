//! Decision log — append-only JSONL, one `Decision` per line.
//!
//! Each line is an independent JSON object, so a torn final write loses at
//! most that line.

use std::fs::{self, OpenOptions};
use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::engine::Decision;

#[derive(Debug, Error)]
pub enum DecisionLogError {
    #[error("decision log I/O: {0}")]
    Io(#[from] io::Error),
    #[error("decision log JSON: {0}")]
    Json(#[from] serde_json::Error),
}

pub struct DecisionLog {
    path: PathBuf,
}

impl DecisionLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn append(&self, decision: &Decision) -> Result<(), DecisionLogError> {
        let json = serde_json::to_string(decision)?;

        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        writeln!(file, "{json}")?;
        file.flush()?;
        Ok(())
    }

    /// Every readable decision in file order. Malformed lines are skipped.
    pub fn read_all(&self) -> Result<Vec<Decision>, DecisionLogError> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }

        let reader = io::BufReader::new(fs::File::open(&self.path)?);
        let mut decisions = Vec::new();
        for line in reader.lines() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            if let Ok(decision) = serde_json::from_str::<Decision>(&line) {
                decisions.push(decision);
            }
        }
        Ok(decisions)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}
