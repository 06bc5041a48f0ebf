use std::{
    collections::HashSet,
    path::{Path, PathBuf},
    str::FromStr,
};

use crate::error::{AppError, Result};

/// A mutation applied to the booked-dates set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DateAction {
    /// Replace the set.
    Set,
    /// Union with the given dates.
    Add,
    /// Remove the given dates.
    Remove,
}

impl FromStr for DateAction {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "set" => Ok(DateAction::Set),
            "add" => Ok(DateAction::Add),
            "remove" => Ok(DateAction::Remove),
            _ => Err(AppError::Validation("Invalid action".to_string())),
        }
    }
}

/// The JSON file holding booked dates.
///
/// Concurrent writers race at the read-modify-write granularity; the last
/// writer wins.
#[derive(Debug, Clone)]
pub struct BookedDates {
    path: PathBuf,
}

impl BookedDates {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Creates the parent directory of the ledger file.
    pub async fn ensure_parent(&self) -> Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }
        Ok(())
    }

    /// Reads the current dates. A missing or unparsable file reads as empty.
    pub async fn read(&self) -> Vec<String> {
        let raw = match tokio::fs::read_to_string(&self.path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Vec::new(),
            Err(e) => {
                tracing::warn!("⚠️ Could not read {}: {}", self.path.display(), e);
                return Vec::new();
            }
        };

        parse_dates(&raw)
    }

    /// Applies `action` and writes the de-duplicated result back.
    pub async fn apply(&self, action: DateAction, dates: Vec<String>) -> Result<Vec<String>> {
        let existing = self.read().await;
        let next = match action {
            DateAction::Set => dates,
            DateAction::Add => existing.into_iter().chain(dates).collect(),
            DateAction::Remove => {
                let removed: HashSet<String> = dates.into_iter().collect();
                existing.into_iter().filter(|d| !removed.contains(d)).collect()
            }
        };

        self.write(next).await
    }

    async fn write(&self, dates: Vec<String>) -> Result<Vec<String>> {
        let deduped = dedup(dates);
        let json = sonic_rs::to_string_pretty(&deduped)
            .map_err(|e| AppError::Internal(format!("Booked dates serialization failed: {}", e)))?;

        self.ensure_parent().await?;
        tokio::fs::write(&self.path, json).await?;

        tracing::info!("📅 Booked dates saved: {} entries", deduped.len());
        Ok(deduped)
    }
}

/// Parses the ledger file. Non-string entries are kept in their JSON form.
fn parse_dates(raw: &str) -> Vec<String> {
    if raw.trim().is_empty() {
        return Vec::new();
    }

    let values: Vec<sonic_rs::Value> = match sonic_rs::from_str(raw) {
        Ok(values) => values,
        Err(e) => {
            tracing::warn!("⚠️ Booked dates file is not a JSON array: {}", e);
            return Vec::new();
        }
    };

    stringify_dates(&values)
}

/// Strings stay as they are; any other JSON value becomes its JSON text.
pub fn stringify_dates(values: &[sonic_rs::Value]) -> Vec<String> {
    use sonic_rs::JsonValueTrait;

    values
        .iter()
        .map(|v| match v.as_str() {
            Some(s) => s.to_string(),
            None => sonic_rs::to_string(v).unwrap_or_default(),
        })
        .collect()
}

/// Drops repeated dates, keeping the first occurrence.
fn dedup(dates: Vec<String>) -> Vec<String> {
    let mut seen = HashSet::new();
    dates.into_iter().filter(|d| seen.insert(d.clone())).collect()
}
