//! Factor matrix persistence
//!
//! Two layouts:
//! - [`TsvFactorStore`]: `u_fac.tmp` and `i_fac.tmp`, one tab-separated row per
//!   user / item
//! - [`SnapshotFactorStore`]: a single bincode file with shapes, flattened data,
//!   the training config and a timestamp

use crate::matrix_factorization::{ALSConfig, Factors};
use chrono::{DateTime, Utc};
use implicit_rec_core::{RecError, Result};
use ndarray::Array2;
use serde::{Deserialize, Serialize};
use std::fs::{self, File};
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

pub const USER_FACTORS_FILE: &str = "u_fac.tmp";
pub const ITEM_FACTORS_FILE: &str = "i_fac.tmp";
pub const SNAPSHOT_FILE: &str = "factors.bin";

/// Persists and reloads (U, V)
pub trait FactorStore {
    fn save(&self, factors: &Factors) -> Result<()>;

    /// `Ok(None)` when nothing has been saved yet
    fn load(&self) -> Result<Option<Factors>>;

    /// Human-readable location, for logs
    fn location(&self) -> String;
}

/// Tab-separated text files in a directory
#[derive(Debug, Clone)]
pub struct TsvFactorStore {
    dir: PathBuf,
}

impl TsvFactorStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn user_path(&self) -> PathBuf {
        self.dir.join(USER_FACTORS_FILE)
    }

    pub fn item_path(&self) -> PathBuf {
        self.dir.join(ITEM_FACTORS_FILE)
    }
}

fn write_tsv(path: &Path, matrix: &Array2<f64>) -> Result<()> {
    let file =
        File::create(path).map_err(|e| RecError::io(format!("creating {}", path.display()), e))?;
    let mut writer = BufWriter::new(file);

    for row in matrix.rows() {
        let line = row
            .iter()
            .map(|v| v.to_string())
            .collect::<Vec<_>>()
            .join("\t");
        writeln!(writer, "{}", line)
            .map_err(|e| RecError::io(format!("writing {}", path.display()), e))?;
    }

    writer
        .flush()
        .map_err(|e| RecError::io(format!("writing {}", path.display()), e))
}

fn read_tsv(path: &Path) -> Result<Array2<f64>> {
    let file =
        File::open(path).map_err(|e| RecError::io(format!("opening {}", path.display()), e))?;
    let reader = BufReader::new(file);

    let mut data = Vec::new();
    let mut cols: Option<usize> = None;
    let mut rows = 0;

    for (line_idx, line) in reader.lines().enumerate() {
        let line = line.map_err(|e| RecError::io(format!("reading {}", path.display()), e))?;
        if line.trim().is_empty() {
            continue;
        }

        let values = line
            .split('\t')
            .map(|field| field.trim().parse::<f64>())
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(|e| {
                RecError::invalid_input(format!(
                    "{} line {}: {}",
                    path.display(),
                    line_idx + 1,
                    e
                ))
            })?;

        match cols {
            Some(expected) if expected != values.len() => {
                return Err(RecError::invalid_input(format!(
                    "{} line {}: expected {} columns, found {}",
                    path.display(),
                    line_idx + 1,
                    expected,
                    values.len()
                )));
            }
            _ => cols = Some(values.len()),
        }

        data.extend(values);
        rows += 1;
    }

    let cols = cols.ok_or_else(|| {
        RecError::invalid_input(format!("{} contains no factor rows", path.display()))
    })?;

    Array2::from_shape_vec((rows, cols), data)
        .map_err(|e| RecError::invalid_input(format!("{}: {}", path.display(), e)))
}

impl FactorStore for TsvFactorStore {
    fn save(&self, factors: &Factors) -> Result<()> {
        fs::create_dir_all(&self.dir)
            .map_err(|e| RecError::io(format!("creating {}", self.dir.display()), e))?;

        write_tsv(&self.user_path(), &factors.user_factors)?;
        write_tsv(&self.item_path(), &factors.item_factors)?;

        tracing::info!(
            dir = %self.dir.display(),
            users = factors.num_users(),
            items = factors.num_items(),
            "Saved factors"
        );
        Ok(())
    }

    fn load(&self) -> Result<Option<Factors>> {
        let user_path = self.user_path();
        let item_path = self.item_path();

        match (user_path.is_file(), item_path.is_file()) {
            (false, false) => return Ok(None),
            (true, true) => {}
            _ => {
                return Err(RecError::invalid_input(format!(
                    "incomplete factor files in {}: need both {} and {}",
                    self.dir.display(),
                    USER_FACTORS_FILE,
                    ITEM_FACTORS_FILE
                )))
            }
        }

        let factors = Factors::new(read_tsv(&user_path)?, read_tsv(&item_path)?)?;
        tracing::info!(dir = %self.dir.display(), "Loaded factors");
        Ok(Some(factors))
    }

    fn location(&self) -> String {
        self.dir.display().to_string()
    }
}

/// Serializable representation of trained factors for storage
#[derive(Debug, Clone, Serialize, Deserialize)]
struct SerializableFactors {
    user_shape: (usize, usize),
    user_data: Vec<f64>,
    item_shape: (usize, usize),
    item_data: Vec<f64>,
    config: Option<ALSConfig>,
    trained_at: DateTime<Utc>,
}

impl SerializableFactors {
    fn from_factors(factors: &Factors, config: Option<ALSConfig>) -> Self {
        Self {
            user_shape: factors.user_factors.dim(),
            user_data: factors.user_factors.iter().copied().collect(),
            item_shape: factors.item_factors.dim(),
            item_data: factors.item_factors.iter().copied().collect(),
            config,
            trained_at: Utc::now(),
        }
    }

    fn into_snapshot(self) -> Result<FactorSnapshot> {
        let user_factors = Array2::from_shape_vec(self.user_shape, self.user_data)
            .map_err(|e| RecError::Serialization(format!("user factors: {}", e)))?;
        let item_factors = Array2::from_shape_vec(self.item_shape, self.item_data)
            .map_err(|e| RecError::Serialization(format!("item factors: {}", e)))?;

        Ok(FactorSnapshot {
            factors: Factors::new(user_factors, item_factors)?,
            config: self.config,
            trained_at: self.trained_at,
        })
    }
}

/// Factors plus the metadata stored alongside them
#[derive(Debug, Clone, PartialEq)]
pub struct FactorSnapshot {
    pub factors: Factors,
    pub config: Option<ALSConfig>,
    pub trained_at: DateTime<Utc>,
}

/// Single-file bincode snapshot
#[derive(Debug, Clone)]
pub struct SnapshotFactorStore {
    path: PathBuf,
    config: Option<ALSConfig>,
}

impl SnapshotFactorStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            config: None,
        }
    }

    /// Record the training configuration in saved snapshots
    pub fn with_config(mut self, config: ALSConfig) -> Self {
        self.config = Some(config);
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load factors together with their metadata
    pub fn load_snapshot(&self) -> Result<Option<FactorSnapshot>> {
        if !self.path.is_file() {
            return Ok(None);
        }

        let bytes = fs::read(&self.path)
            .map_err(|e| RecError::io(format!("reading {}", self.path.display()), e))?;
        let serializable: SerializableFactors = bincode::deserialize(&bytes)
            .map_err(|e| RecError::Serialization(format!("{}: {}", self.path.display(), e)))?;

        let snapshot = serializable.into_snapshot()?;
        tracing::info!(
            path = %self.path.display(),
            trained_at = %snapshot.trained_at,
            "Loaded factor snapshot"
        );
        Ok(Some(snapshot))
    }
}

impl FactorStore for SnapshotFactorStore {
    fn save(&self, factors: &Factors) -> Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .map_err(|e| RecError::io(format!("creating {}", parent.display()), e))?;
        }

        let serializable = SerializableFactors::from_factors(factors, self.config.clone());
        let bytes = bincode::serialize(&serializable)
            .map_err(|e| RecError::Serialization(format!("Failed to serialize factors: {}", e)))?;

        fs::write(&self.path, &bytes)
            .map_err(|e| RecError::io(format!("writing {}", self.path.display()), e))?;

        tracing::info!(
            path = %self.path.display(),
            size_bytes = bytes.len(),
            "Saved factor snapshot"
        );
        Ok(())
    }

    fn load(&self) -> Result<Option<Factors>> {
        Ok(self.load_snapshot()?.map(|snapshot| snapshot.factors))
    }

    fn location(&self) -> String {
        self.path.display().to_string()
    }
}
