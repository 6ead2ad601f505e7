//! Item display metadata

use implicit_rec_core::{RecError, Result};
use std::collections::HashMap;
use std::fs;
use std::path::Path;

/// Maps an external item id to its display title
pub trait CatalogLookup {
    fn title(&self, item_id: u64) -> Option<&str>;
}

impl CatalogLookup for HashMap<u64, String> {
    fn title(&self, item_id: u64) -> Option<&str> {
        self.get(&item_id).map(String::as_str)
    }
}

/// Item titles keyed by external id
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ItemCatalog {
    titles: HashMap<u64, String>,
}

impl ItemCatalog {
    pub fn from_pairs<I, S>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (u64, S)>,
        S: Into<String>,
    {
        Self {
            titles: pairs
                .into_iter()
                .map(|(id, title)| (id, title.into()))
                .collect(),
        }
    }

    /// Read a pipe-separated catalog (`id|title|...`), MovieLens `u.item` style
    ///
    /// The file is decoded as Latin-1, so every byte maps to one character.
    pub fn from_pipe_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let bytes =
            fs::read(path).map_err(|e| RecError::io(format!("reading {}", path.display()), e))?;
        let text: String = bytes.iter().map(|&b| b as char).collect();

        let catalog = Self::parse_pipe_text(&text)
            .map_err(|e| RecError::invalid_input(format!("{}: {}", path.display(), e)))?;

        tracing::info!(path = %path.display(), items = catalog.len(), "Loaded item catalog");
        Ok(catalog)
    }

    fn parse_pipe_text(text: &str) -> std::result::Result<Self, String> {
        let mut titles = HashMap::new();

        for (line_idx, line) in text.lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }

            let mut fields = line.split('|');
            let id_field = fields.next().unwrap_or_default().trim();
            let id = id_field
                .parse::<u64>()
                .map_err(|_| format!("line {}: invalid item id '{}'", line_idx + 1, id_field))?;
            let title = fields
                .next()
                .ok_or_else(|| format!("line {}: missing title", line_idx + 1))?;

            titles.insert(id, title.trim().to_string());
        }

        Ok(Self { titles })
    }

    pub fn len(&self) -> usize {
        self.titles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.titles.is_empty()
    }
}

impl CatalogLookup for ItemCatalog {
    fn title(&self, item_id: u64) -> Option<&str> {
        self.titles.get(&item_id).map(String::as_str)
    }
}
