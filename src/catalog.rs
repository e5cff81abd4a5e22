//! Thread catalog access.
//!
//! The catalog is a SQLite table of named reference colors. Entries are
//! returned in table order so that palette indices, and therefore the
//! nearest-match tie-break, are stable between runs.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::path::Path;

use rusqlite::{params, params_from_iter, Connection};
use serde::{Deserialize, Serialize};

use crate::error::{PatternError, Result};

const TABLE: &str = "dmc_colors";

/// One catalog color
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PaletteEntry {
    pub code: String,
    pub rgb: [u8; 3],
    pub hex: String,
}

impl PaletteEntry {
    pub fn new(code: impl Into<String>, rgb: [u8; 3], hex: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            rgb,
            hex: hex.into(),
        }
    }
}

/// Ordered, index-addressable set of catalog entries.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PaletteSet {
    entries: Vec<PaletteEntry>,
}

impl PaletteSet {
    pub fn new(entries: Vec<PaletteEntry>) -> Self {
        Self { entries }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&PaletteEntry> {
        self.entries.get(index)
    }

    pub fn iter(&self) -> impl Iterator<Item = &PaletteEntry> {
        self.entries.iter()
    }

    pub fn entries(&self) -> &[PaletteEntry] {
        &self.entries
    }

    pub fn find(&self, code: &str) -> Option<&PaletteEntry> {
        self.entries.iter().find(|e| e.code == code)
    }
}

/// SQLite-backed catalog.
pub struct PaletteStore {
    conn: Connection,
}

impl PaletteStore {
    pub fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)?;
        tracing::debug!(path = %path.display(), "Opened palette catalog");
        Ok(Self { conn })
    }

    /// Empty in-memory catalog, to be filled with [`PaletteStore::insert_entry`].
    pub fn in_memory() -> Result<Self> {
        let store = Self {
            conn: Connection::open_in_memory()?,
        };
        store.create_schema()?;
        Ok(store)
    }

    pub fn create_schema(&self) -> Result<()> {
        self.conn.execute_batch(&format!(
            "CREATE TABLE IF NOT EXISTS {TABLE} (
                DMC_CODE TEXT NOT NULL,
                HEX TEXT NOT NULL,
                R INTEGER NOT NULL,
                G INTEGER NOT NULL,
                B INTEGER NOT NULL
            )"
        ))?;
        Ok(())
    }

    pub fn insert_entry(&self, entry: &PaletteEntry) -> Result<()> {
        let [r, g, b] = entry.rgb;
        self.conn.execute(
            &format!("INSERT INTO {TABLE} (DMC_CODE, HEX, R, G, B) VALUES (?1, ?2, ?3, ?4, ?5)"),
            params![entry.code, entry.hex, r, g, b],
        )?;
        Ok(())
    }

    /// Number of rows in the catalog.
    pub fn len(&self) -> Result<usize> {
        let count: i64 = self
            .conn
            .query_row(&format!("SELECT COUNT(*) FROM {TABLE}"), [], |row| row.get(0))?;
        Ok(count as usize)
    }

    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }

    /// Every catalog entry, in table order.
    pub fn load_all(&self) -> Result<PaletteSet> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT DMC_CODE, HEX, R, G, B FROM {TABLE} ORDER BY rowid"
        ))?;
        let rows = stmt
            .query_map([], |row| {
                Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?, row.get(4)?))
            })?
            .collect::<rusqlite::Result<Vec<RawRow>>>()?;
        let entries = collect_entries(rows)?;
        tracing::debug!(entries = entries.len(), "Loaded full catalog");
        Ok(PaletteSet::new(entries))
    }

    /// Entries whose code is in `codes`, in table order.
    ///
    /// Fails with [`PatternError::MissingCodes`] naming every requested code
    /// absent from the catalog; no partial palette is returned.
    pub fn load_subset(&self, codes: &[String]) -> Result<PaletteSet> {
        let (entries, missing) = self.find_codes(codes)?;
        if !missing.is_empty() {
            tracing::warn!(?missing, "Requested palette codes not in catalog");
            return Err(PatternError::MissingCodes(missing));
        }
        tracing::debug!(
            requested = codes.len(),
            entries = entries.len(),
            "Loaded catalog subset"
        );
        Ok(PaletteSet::new(entries))
    }

    /// Look up `codes`, returning the found entries and the codes that are
    /// absent (deduplicated, in request order).
    fn find_codes(&self, codes: &[String]) -> Result<(Vec<PaletteEntry>, Vec<String>)> {
        let requested = dedup_in_order(codes);
        if requested.is_empty() {
            return Ok((Vec::new(), Vec::new()));
        }

        let placeholders = vec!["?"; requested.len()].join(", ");
        let mut stmt = self.conn.prepare(&format!(
            "SELECT DMC_CODE, HEX, R, G, B FROM {TABLE} WHERE DMC_CODE IN ({placeholders}) ORDER BY rowid"
        ))?;
        let rows = stmt
            .query_map(params_from_iter(requested.iter()), |row| {
                Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?, row.get(4)?))
            })?
            .collect::<rusqlite::Result<Vec<RawRow>>>()?;
        let entries = collect_entries(rows)?;

        let found: HashSet<&str> = entries.iter().map(|e| e.code.as_str()).collect();
        let missing = requested
            .into_iter()
            .filter(|code| !found.contains(code.as_str()))
            .collect();
        Ok((entries, missing))
    }
}

type RawRow = (String, String, i64, i64, i64);

fn collect_entries(rows: Vec<RawRow>) -> Result<Vec<PaletteEntry>> {
    let mut seen = HashSet::new();
    let mut entries = Vec::with_capacity(rows.len());
    for (code, hex, r, g, b) in rows {
        let channel = |value: i64| {
            u8::try_from(value).map_err(|_| PatternError::CorruptEntry {
                code: code.clone(),
                reason: format!("channel value {value} outside 0..=255"),
            })
        };
        let rgb = [channel(r)?, channel(g)?, channel(b)?];
        if !seen.insert(code.clone()) {
            return Err(PatternError::CorruptEntry {
                code,
                reason: "duplicate catalog code".to_string(),
            });
        }
        entries.push(PaletteEntry { code, rgb, hex });
    }
    Ok(entries)
}

fn dedup_in_order(codes: &[String]) -> Vec<String> {
    let mut seen = HashSet::new();
    codes
        .iter()
        .filter(|code| seen.insert(*code))
        .cloned()
        .collect()
}

/// Caller-supplied overrides: a matched source code is reported and rendered
/// as its target entry.
#[derive(Debug, Clone, Default)]
pub struct SubstitutionMap {
    targets: HashMap<String, PaletteEntry>,
}

impl SubstitutionMap {
    /// Validate `pairs` (source code -> target code) against the catalog and
    /// fetch the target entries.
    ///
    /// Both sides must exist in the catalog; any gap fails with
    /// [`PatternError::MissingCodes`].
    pub fn resolve(store: &PaletteStore, pairs: &BTreeMap<String, String>) -> Result<Self> {
        if pairs.is_empty() {
            return Ok(Self::default());
        }

        for (source, target) in pairs {
            if source.is_empty() || target.is_empty() {
                return Err(PatternError::invalid(
                    "substitutions",
                    format!("{source:?} -> {target:?}"),
                ));
            }
        }

        let mut codes: Vec<String> = pairs.keys().cloned().collect();
        codes.extend(pairs.values().cloned());
        let (entries, missing) = store.find_codes(&codes)?;
        if !missing.is_empty() {
            tracing::warn!(?missing, "Substitution codes not in catalog");
            return Err(PatternError::MissingCodes(missing));
        }

        let by_code: HashMap<&str, &PaletteEntry> =
            entries.iter().map(|e| (e.code.as_str(), e)).collect();
        let mut map = Self::default();
        for (source, target) in pairs {
            // find_codes reported no gaps, so every target is present
            if let Some(entry) = by_code.get(target.as_str()) {
                map.insert(source, (*entry).clone());
            }
        }
        tracing::debug!(substitutions = map.len(), "Resolved substitutions");
        Ok(map)
    }

    pub(crate) fn insert(&mut self, source: &str, target: PaletteEntry) {
        self.targets.insert(source.to_string(), target);
    }

    pub fn target_for(&self, code: &str) -> Option<&PaletteEntry> {
        self.targets.get(code)
    }

    pub fn len(&self) -> usize {
        self.targets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.targets.is_empty()
    }
}
