//! Interaction sources
//!
//! Loads user-item interactions and maps external entity ids to dense matrix
//! indices.

use crate::matrix::InteractionMatrix;
use implicit_rec_core::{RecError, Result};
use std::collections::{BTreeSet, HashMap};
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

/// Bidirectional mapping between external ids and matrix indices
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IdMap {
    ids: Vec<u64>,
    index: HashMap<u64, usize>,
}

impl IdMap {
    /// Indices follow ascending id order; duplicates collapse
    pub fn from_ids<I: IntoIterator<Item = u64>>(ids: I) -> Self {
        let ids: Vec<u64> = ids.into_iter().collect::<BTreeSet<_>>().into_iter().collect();
        let index = ids.iter().enumerate().map(|(idx, &id)| (id, idx)).collect();
        Self { ids, index }
    }

    /// `len` consecutive ids starting at `first_id`
    pub fn sequential(len: usize, first_id: u64) -> Self {
        Self::from_ids((0..len as u64).map(|offset| first_id + offset))
    }

    pub fn index_of(&self, id: u64) -> Option<usize> {
        self.index.get(&id).copied()
    }

    pub fn id_of(&self, index: usize) -> Option<u64> {
        self.ids.get(index).copied()
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    pub fn ids(&self) -> &[u64] {
        &self.ids
    }
}

/// Interaction matrix plus the id mappings for its rows and columns
#[derive(Debug, Clone, PartialEq)]
pub struct InteractionData {
    pub matrix: InteractionMatrix,
    pub users: IdMap,
    pub items: IdMap,
}

impl InteractionData {
    pub fn new(matrix: InteractionMatrix, users: IdMap, items: IdMap) -> Result<Self> {
        if users.len() != matrix.num_users() || items.len() != matrix.num_items() {
            return Err(RecError::invalid_input(format!(
                "id maps cover {} users / {} items but the matrix is {}x{}",
                users.len(),
                items.len(),
                matrix.num_users(),
                matrix.num_items()
            )));
        }
        Ok(Self {
            matrix,
            users,
            items,
        })
    }

    /// Matrix index of an external user id
    pub fn user_index(&self, user_id: u64) -> Result<usize> {
        self.users
            .index_of(user_id)
            .ok_or_else(|| RecError::invalid_input(format!("unknown user id {}", user_id)))
    }
}

/// Supplies the interaction matrix and entity id mapping
pub trait InteractionStore {
    fn load(&self) -> Result<InteractionData>;
}

/// Prebuilt interactions held in memory
///
/// Rows and columns get sequential 1-based ids.
#[derive(Debug, Clone)]
pub struct InMemoryInteractionStore {
    data: InteractionData,
}

impl InMemoryInteractionStore {
    pub fn new(matrix: InteractionMatrix) -> Self {
        let users = IdMap::sequential(matrix.num_users(), 1);
        let items = IdMap::sequential(matrix.num_items(), 1);
        Self {
            data: InteractionData {
                matrix,
                users,
                items,
            },
        }
    }

    pub fn from_data(data: InteractionData) -> Self {
        Self { data }
    }
}

impl InteractionStore for InMemoryInteractionStore {
    fn load(&self) -> Result<InteractionData> {
        Ok(self.data.clone())
    }
}

/// Tab-separated ratings file: `user_id  item_id  rating  [timestamp]`
///
/// This is the MovieLens `u.data` layout. When a user-item pair occurs more
/// than once the record with the latest timestamp wins.
#[derive(Debug, Clone)]
pub struct RatingsFileStore {
    path: PathBuf,
}

#[derive(Debug, Clone, Copy)]
struct RatingRecord {
    user_id: u64,
    item_id: u64,
    rating: f64,
    timestamp: i64,
}

impl RatingsFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn parse_line(line: &str, line_no: usize) -> Result<RatingRecord> {
        let fields: Vec<&str> = line.split_whitespace().collect();
        if fields.len() < 3 {
            return Err(RecError::invalid_input(format!(
                "line {}: expected at least 3 fields, found {}",
                line_no,
                fields.len()
            )));
        }

        let field_error = |name: &str, value: &str| {
            RecError::invalid_input(format!("line {}: invalid {} '{}'", line_no, name, value))
        };

        let user_id = fields[0]
            .parse::<u64>()
            .map_err(|_| field_error("user id", fields[0]))?;
        let item_id = fields[1]
            .parse::<u64>()
            .map_err(|_| field_error("item id", fields[1]))?;
        let rating = fields[2]
            .parse::<f64>()
            .map_err(|_| field_error("rating", fields[2]))?;
        if !rating.is_finite() || rating < 0.0 {
            return Err(field_error("rating", fields[2]));
        }
        let timestamp = match fields.get(3) {
            Some(&raw) => raw
                .parse::<i64>()
                .map_err(|_| field_error("timestamp", raw))?,
            None => 0,
        };

        Ok(RatingRecord {
            user_id,
            item_id,
            rating,
            timestamp,
        })
    }
}

impl InteractionStore for RatingsFileStore {
    fn load(&self) -> Result<InteractionData> {
        let file = File::open(&self.path)
            .map_err(|e| RecError::io(format!("opening {}", self.path.display()), e))?;
        let reader = BufReader::new(file);

        let mut latest: HashMap<(u64, u64), RatingRecord> = HashMap::new();
        for (line_idx, line) in reader.lines().enumerate() {
            let line = line
                .map_err(|e| RecError::io(format!("reading {}", self.path.display()), e))?;
            if line.trim().is_empty() {
                continue;
            }

            let record = Self::parse_line(&line, line_idx + 1)?;
            latest
                .entry((record.user_id, record.item_id))
                .and_modify(|existing| {
                    if record.timestamp >= existing.timestamp {
                        *existing = record;
                    }
                })
                .or_insert(record);
        }

        if latest.is_empty() {
            return Err(RecError::invalid_input(format!(
                "{} contains no interactions",
                self.path.display()
            )));
        }

        let users = IdMap::from_ids(latest.keys().map(|&(user_id, _)| user_id));
        let items = IdMap::from_ids(latest.keys().map(|&(_, item_id)| item_id));

        let mut entries = Vec::with_capacity(latest.len());
        for record in latest.values() {
            // Both ids were inserted into the maps above
            if let (Some(u), Some(i)) = (
                users.index_of(record.user_id),
                items.index_of(record.item_id),
            ) {
                entries.push((u, i, record.rating));
            }
        }

        let matrix = InteractionMatrix::from_entries(users.len(), items.len(), entries)?;

        tracing::info!(
            path = %self.path.display(),
            users = users.len(),
            items = items.len(),
            interactions = latest.len(),
            "Loaded interactions"
        );

        InteractionData::new(matrix, users, items)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn write_ratings(contents: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file.flush().unwrap();
        file
    }

    #[test]
    fn test_id_map_sorted_and_deduplicated() {
        let map = IdMap::from_ids(vec![30, 10, 20, 10]);
        assert_eq!(map.ids(), &[10, 20, 30]);
        assert_eq!(map.index_of(20), Some(1));
        assert_eq!(map.id_of(2), Some(30));
        assert_eq!(map.index_of(15), None);
        assert_eq!(map.id_of(3), None);
        assert_eq!(map.len(), 3);
    }

    #[test]
    fn test_sequential_id_map() {
        let map = IdMap::sequential(3, 1);
        assert_eq!(map.ids(), &[1, 2, 3]);
        assert_eq!(map.index_of(1), Some(0));
    }

    #[test]
    fn test_load_ratings_file() {
        let file = write_ratings("1\t10\t5\t881250949\n1\t20\t3\t881250950\n\n2\t10\t4\t881250951\n");
        let data = RatingsFileStore::new(file.path()).load().unwrap();

        assert_eq!(data.matrix.num_users(), 2);
        assert_eq!(data.matrix.num_items(), 2);
        assert_eq!(data.matrix.get(0, 0), 5.0);
        assert_eq!(data.matrix.get(0, 1), 3.0);
        assert_eq!(data.matrix.get(1, 0), 4.0);
        assert_eq!(data.matrix.get(1, 1), 0.0);
        assert_eq!(data.user_index(2).unwrap(), 1);
        assert_eq!(data.items.id_of(1), Some(20));
    }

    #[test]
    fn test_latest_timestamp_wins() {
        let file = write_ratings("1\t10\t2\t200\n1\t10\t5\t100\n1\t11\t1\t100\n1\t11\t4\t300\n");
        let data = RatingsFileStore::new(file.path()).load().unwrap();

        assert_eq!(data.matrix.get(0, 0), 2.0);
        assert_eq!(data.matrix.get(0, 1), 4.0);
    }

    #[test]
    fn test_malformed_line_reports_line_number() {
        let file = write_ratings("1\t10\t5\t1\n1\tabc\t5\t1\n");
        let err = RatingsFileStore::new(file.path()).load().unwrap_err();
        assert!(err.is_invalid_input());
        assert!(err.to_string().contains("line 2"), "{err}");
    }

    #[test]
    fn test_negative_rating_rejected() {
        let file = write_ratings("1\t10\t-1\t1\n");
        let err = RatingsFileStore::new(file.path()).load().unwrap_err();
        assert!(err.is_invalid_input());
    }

    #[test]
    fn test_empty_file_rejected() {
        let file = write_ratings("\n\n");
        assert!(RatingsFileStore::new(file.path())
            .load()
            .unwrap_err()
            .is_invalid_input());
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let err = RatingsFileStore::new("/nonexistent/u.data").load().unwrap_err();
        assert!(matches!(err, RecError::Io { .. }));
    }

    #[test]
    fn test_unknown_user_id() {
        let matrix = InteractionMatrix::from_rows(&[[1.0, 0.0]]).unwrap();
        let data = InMemoryInteractionStore::new(matrix).load().unwrap();
        assert_eq!(data.user_index(1).unwrap(), 0);
        assert!(data.user_index(2).unwrap_err().is_invalid_input());
    }
}
