//! Measurement persistence
//!
//! Stores keep measurement history plus a single configuration row. The
//! layout follows a relational shape: measurement headers (id, timestamp)
//! and one-to-many value rows keyed by measurement id, with numeric fields
//! stored as nullable reals.

use crate::config::Configuration;
use crate::error::{Result, SimError};
use crate::measurement::{iso_millis, MeasuredValue, Measurement};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, VecDeque};
use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

/// Backing store for measurements and configuration
pub trait MeasurementStore: Send {
    /// Persist one measurement with all of its values
    fn insert(&mut self, measurement: &Measurement) -> Result<()>;

    /// Up to `limit` most recent measurements, oldest first
    fn recent(&self, limit: usize) -> Result<Vec<Measurement>>;

    /// Remove every measurement
    fn clear(&mut self) -> Result<()>;

    fn save_configuration(&mut self, config: &Configuration) -> Result<()>;

    fn load_configuration(&self) -> Result<Option<Configuration>>;

    /// Identifier following the largest stored one (0 when empty)
    fn next_id(&self) -> Result<u64>;

    /// Short name for logs
    fn kind(&self) -> &'static str;
}

/// Measurements kept by a [`MemoryStore`] unless told otherwise
pub const DEFAULT_MEMORY_RETENTION: usize = 1000;

/// Volatile store, lost on restart
///
/// Holds at most `retention` of the newest measurements. The identifier
/// sequence is tracked separately so it survives eviction.
#[derive(Debug)]
pub struct MemoryStore {
    measurements: VecDeque<Measurement>,
    retention: usize,
    next_id: u64,
    configuration: Option<Configuration>,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::with_retention(DEFAULT_MEMORY_RETENTION)
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store keeping only the newest `retention` measurements (at least one)
    pub fn with_retention(retention: usize) -> Self {
        let retention = retention.max(1);
        Self {
            measurements: VecDeque::with_capacity(retention),
            retention,
            next_id: 0,
            configuration: None,
        }
    }

    pub fn len(&self) -> usize {
        self.measurements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.measurements.is_empty()
    }

    pub fn retention(&self) -> usize {
        self.retention
    }
}

impl MeasurementStore for MemoryStore {
    fn insert(&mut self, measurement: &Measurement) -> Result<()> {
        self.measurements.push_back(measurement.clone());
        while self.measurements.len() > self.retention {
            self.measurements.pop_front();
        }
        self.next_id = self.next_id.max(measurement.id + 1);
        Ok(())
    }

    fn recent(&self, limit: usize) -> Result<Vec<Measurement>> {
        let skip = self.measurements.len().saturating_sub(limit);
        Ok(self.measurements.iter().skip(skip).cloned().collect())
    }

    fn clear(&mut self) -> Result<()> {
        self.measurements.clear();
        self.next_id = 0;
        Ok(())
    }

    fn save_configuration(&mut self, config: &Configuration) -> Result<()> {
        self.configuration = Some(config.clone());
        Ok(())
    }

    fn load_configuration(&self) -> Result<Option<Configuration>> {
        Ok(self.configuration.clone())
    }

    fn next_id(&self) -> Result<u64> {
        Ok(self.next_id)
    }

    fn kind(&self) -> &'static str {
        "memory"
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct MeasurementRow {
    id: u64,
    timestamp: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct ValueRow {
    measurement_id: u64,
    pos_voltage: Option<f64>,
    pos_current: Option<f64>,
    neg_voltage: Option<f64>,
    neg_current: Option<f64>,
}

impl ValueRow {
    fn new(measurement_id: u64, value: &MeasuredValue) -> Self {
        Self {
            measurement_id,
            pos_voltage: value.pos_voltage.map(|v| v as f64),
            pos_current: value.pos_current.map(|v| v as f64),
            neg_voltage: value.neg_voltage.map(|v| v as f64),
            neg_current: value.neg_current.map(|v| v as f64),
        }
    }

    fn to_value(&self) -> MeasuredValue {
        let field = |v: Option<f64>| v.map(|v| v.round() as i64);
        MeasuredValue {
            pos_voltage: field(self.pos_voltage),
            pos_current: field(self.pos_current),
            neg_voltage: field(self.neg_voltage),
            neg_current: field(self.neg_current),
        }
    }
}

/// One journal line, tagged with the table it belongs to
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "table", rename_all = "snake_case")]
enum Record {
    Configuration(Configuration),
    Measurements(MeasurementRow),
    MeasurementValues(ValueRow),
}

fn push_line(buf: &mut String, record: &Record) -> Result<()> {
    buf.push_str(&serde_json::to_string(record)?);
    buf.push('\n');
    Ok(())
}

/// Durable store backed by an append-only JSON-lines journal
///
/// Inserts and configuration changes append rows; the last configuration
/// row wins. Only the configuration and the identifier sequence are held
/// in memory. Clearing rewrites the journal through a temp file and a
/// rename, so a crash leaves either the old or the new contents on disk.
#[derive(Debug)]
pub struct JsonFileStore {
    path: PathBuf,
    file: File,
    configuration: Option<Configuration>,
    next_id: u64,
    len: usize,
}

impl JsonFileStore {
    /// Open the store at `path`, creating parent directories if needed
    ///
    /// A missing file starts an empty store. An unreadable file or any
    /// unparsable row is an error.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let mut configuration = None;
        let mut next_id = 0;
        let mut len = 0;
        for record in read_records(&path)? {
            match record {
                Record::Configuration(config) => configuration = Some(config),
                Record::Measurements(row) => {
                    next_id = next_id.max(row.id + 1);
                    len += 1;
                }
                Record::MeasurementValues(_) => {}
            }
        }

        let file = OpenOptions::new().create(true).append(true).open(&path)?;
        tracing::info!(
            path = %path.display(),
            measurements = len,
            "Opened measurement store"
        );
        Ok(Self {
            path,
            file,
            configuration,
            next_id,
            len,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Number of stored measurements
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    fn storage_error(&self, e: impl std::fmt::Display) -> SimError {
        SimError::Storage(format!("{}: {e}", self.path.display()))
    }

    /// Append pre-rendered lines in a single write
    fn append(&mut self, lines: &str) -> Result<()> {
        self.file
            .write_all(lines.as_bytes())
            .and_then(|_| self.file.flush())
            .map_err(|e| self.storage_error(e))
    }
}

/// Parse every row of the journal at `path` (empty when missing)
fn read_records(path: &Path) -> Result<Vec<Record>> {
    if !path.exists() {
        return Ok(Vec::new());
    }
    let reader = BufReader::new(File::open(path)?);
    let mut records = Vec::new();
    for line in reader.lines() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        records.push(serde_json::from_str(&line)?);
    }
    Ok(records)
}

impl MeasurementStore for JsonFileStore {
    fn insert(&mut self, measurement: &Measurement) -> Result<()> {
        let mut lines = String::new();
        push_line(
            &mut lines,
            &Record::Measurements(MeasurementRow {
                id: measurement.id,
                timestamp: iso_millis::format(&measurement.timestamp),
            }),
        )?;
        for value in &measurement.measured_values {
            push_line(
                &mut lines,
                &Record::MeasurementValues(ValueRow::new(measurement.id, value)),
            )?;
        }

        self.append(&lines)?;
        self.next_id = self.next_id.max(measurement.id + 1);
        self.len += 1;
        Ok(())
    }

    fn recent(&self, limit: usize) -> Result<Vec<Measurement>> {
        let mut headers = Vec::new();
        let mut values: HashMap<u64, Vec<MeasuredValue>> = HashMap::new();
        for record in read_records(&self.path)? {
            match record {
                Record::Measurements(row) => headers.push(row),
                Record::MeasurementValues(row) => values
                    .entry(row.measurement_id)
                    .or_default()
                    .push(row.to_value()),
                Record::Configuration(_) => {}
            }
        }

        // Newest first, then reversed back to insertion order
        headers.sort_by(|a, b| b.id.cmp(&a.id));
        headers.truncate(limit);
        headers.reverse();

        headers
            .into_iter()
            .map(|row| {
                let timestamp = chrono::DateTime::parse_from_rfc3339(&row.timestamp)
                    .map_err(|e| {
                        SimError::Storage(format!("bad timestamp for measurement {}: {e}", row.id))
                    })?
                    .with_timezone(&chrono::Utc);
                Ok(Measurement {
                    id: row.id,
                    timestamp,
                    measured_values: values.remove(&row.id).unwrap_or_default(),
                })
            })
            .collect()
    }

    fn clear(&mut self) -> Result<()> {
        let mut lines = String::new();
        if let Some(ref config) = self.configuration {
            push_line(&mut lines, &Record::Configuration(config.clone()))?;
        }

        let tmp = self.path.with_extension("tmp");
        std::fs::write(&tmp, &lines)
            .and_then(|_| std::fs::rename(&tmp, &self.path))
            .map_err(|e| self.storage_error(e))?;
        self.file = OpenOptions::new()
            .append(true)
            .open(&self.path)
            .map_err(|e| self.storage_error(e))?;

        self.next_id = 0;
        self.len = 0;
        Ok(())
    }

    fn save_configuration(&mut self, config: &Configuration) -> Result<()> {
        let mut lines = String::new();
        push_line(&mut lines, &Record::Configuration(config.clone()))?;
        self.append(&lines)?;
        self.configuration = Some(config.clone());
        Ok(())
    }

    fn load_configuration(&self) -> Result<Option<Configuration>> {
        Ok(self.configuration.clone())
    }

    fn next_id(&self) -> Result<u64> {
        Ok(self.next_id)
    }

    fn kind(&self) -> &'static str {
        "json"
    }
}
