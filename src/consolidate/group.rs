//! Exact-key grouping of mentions.

use std::collections::HashMap;

use unicode_normalization::UnicodeNormalization;

use crate::model::{Mention, Source, dedup_sources};

/// Normalized grouping key: NFC, lowercased, surrounding whitespace trimmed.
pub fn grouping_key(name: &str) -> String {
    name.trim().nfc().collect::<String>().to_lowercase()
}

/// All mentions sharing one grouping key, in encounter order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Bucket {
    pub key: String,
    pub mentions: Vec<Mention>,
}

impl Bucket {
    pub fn is_single(&self) -> bool {
        self.mentions.len() == 1
    }

    /// Sources of every mention, deduplicated by article (first wins).
    pub fn sources(&self) -> Vec<Source> {
        dedup_sources(self.mentions.iter().map(Mention::source))
    }

    /// Collaborator payload: one `[article]: {json}` block per mention,
    /// separated by a blank line.
    pub fn merge_payload(&self) -> String {
        self.mentions
            .iter()
            .map(|m| {
                let json = serde_json::to_string(&m.record).unwrap_or_default();
                format!("[{}]: {json}", m.article)
            })
            .collect::<Vec<_>>()
            .join("\n\n")
    }
}

/// Partition mentions into buckets; bucket order follows first appearance.
pub fn group_mentions(mentions: impl IntoIterator<Item = Mention>) -> Vec<Bucket> {
    let mut index: HashMap<String, usize> = HashMap::new();
    let mut buckets: Vec<Bucket> = Vec::new();

    for mention in mentions {
        let key = grouping_key(&mention.record.name);
        match index.get(&key) {
            Some(&i) => buckets[i].mentions.push(mention),
            None => {
                index.insert(key.clone(), buckets.len());
                buckets.push(Bucket {
                    key,
                    mentions: vec![mention],
                });
            }
        }
    }

    buckets
}
