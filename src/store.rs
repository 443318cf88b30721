//! Persistent JSON stores: keyed result ledgers and the final directory.
//!
//! A [`Ledger`] is a JSON object on disk mirrored by an in-memory map. Every
//! insert rewrites the file (write to a sibling temp file, then rename), so an
//! interrupted run loses at most the unit of work that was in flight and a
//! re-run can skip every key already present.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::error::{StoreError, StoreResult};
use crate::model::{ArticleId, CanonicalEntity, Mention, MentionRecord};

/// Keyed, incrementally flushed result accumulator.
#[derive(Debug)]
pub struct Ledger<K, V> {
    path: PathBuf,
    entries: BTreeMap<K, V>,
}

/// Extraction cache: article id → mention records the source returned for it.
pub type ExtractCache = Ledger<ArticleId, Vec<MentionRecord>>;

/// Merge progress: grouping key → collaborator-merged canonical entity.
pub type MergeProgress = Ledger<String, CanonicalEntity>;

impl<K, V> Ledger<K, V>
where
    K: Ord + Serialize + DeserializeOwned,
    V: Serialize + DeserializeOwned,
{
    /// Open the ledger at `path`, starting empty if the file does not exist.
    pub fn open(path: &Path) -> StoreResult<Self> {
        let entries = if path.exists() {
            let data = std::fs::read_to_string(path).map_err(|e| StoreError::io(path, e))?;
            serde_json::from_str(&data).map_err(|e| StoreError::Parse {
                path: path.display().to_string(),
                message: e.to_string(),
            })?
        } else {
            BTreeMap::new()
        };
        Ok(Self {
            path: path.to_path_buf(),
            entries,
        })
    }

    /// Insert (or replace) one result and flush the whole ledger to disk.
    pub fn insert(&mut self, key: K, value: V) -> StoreResult<()> {
        self.entries.insert(key, value);
        self.flush()
    }

    pub fn contains(&self, key: &K) -> bool {
        self.entries.contains_key(key)
    }

    pub fn get(&self, key: &K) -> Option<&V> {
        self.entries.get(key)
    }

    /// Entries in key order.
    pub fn iter(&self) -> impl Iterator<Item = (&K, &V)> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn flush(&self) -> StoreResult<()> {
        write_json_atomic(&self.path, &self.entries)
    }
}

impl ExtractCache {
    /// Open the extraction cache, skipping records that no longer deserialize.
    ///
    /// A file that is not a JSON object of arrays is still a parse error; a
    /// single foreign record (an unknown `type`, say) only costs that record.
    pub fn open_tolerant(path: &Path) -> StoreResult<Self> {
        let raw: Ledger<ArticleId, Vec<serde_json::Value>> = Ledger::open(path)?;
        let mut entries = BTreeMap::new();
        for (article, values) in raw.entries {
            let mut records = Vec::with_capacity(values.len());
            for value in values {
                match serde_json::from_value::<MentionRecord>(value) {
                    Ok(record) => records.push(record),
                    Err(e) => tracing::warn!(
                        article = %article,
                        error = %e,
                        "skipping unreadable cached mention"
                    ),
                }
            }
            entries.insert(article, records);
        }
        Ok(Self {
            path: raw.path,
            entries,
        })
    }

    /// All cached mentions, tagged with their article, in article-id order.
    pub fn mentions(&self) -> Vec<Mention> {
        self.entries
            .iter()
            .flat_map(|(article, records)| {
                records.iter().map(move |record| Mention {
                    article: article.clone(),
                    record: record.clone(),
                })
            })
            .collect()
    }

    /// Total number of cached mention records.
    pub fn mention_count(&self) -> usize {
        self.entries.values().map(Vec::len).sum()
    }
}

/// Load the final directory; a missing file is an empty directory.
pub fn load_directory(path: &Path) -> StoreResult<Vec<CanonicalEntity>> {
    if !path.exists() {
        return Ok(Vec::new());
    }
    let data = std::fs::read_to_string(path).map_err(|e| StoreError::io(path, e))?;
    serde_json::from_str(&data).map_err(|e| StoreError::Parse {
        path: path.display().to_string(),
        message: e.to_string(),
    })
}

/// Write the final directory.
pub fn save_directory(path: &Path, entities: &[CanonicalEntity]) -> StoreResult<()> {
    write_json_atomic(path, entities)
}

fn write_json_atomic<T: Serialize + ?Sized>(path: &Path, value: &T) -> StoreResult<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent).map_err(|e| StoreError::io(parent, e))?;
        }
    }
    let json = serde_json::to_string_pretty(value).map_err(|e| StoreError::Serialize {
        path: path.display().to_string(),
        message: e.to_string(),
    })?;

    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    let tmp = PathBuf::from(tmp);
    std::fs::write(&tmp, json).map_err(|e| StoreError::io(&tmp, e))?;
    std::fs::rename(&tmp, path).map_err(|e| StoreError::io(path, e))?;
    Ok(())
}
