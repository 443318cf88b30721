//! Core data types: articles, mentions, sources and canonical entities.
//!
//! Collaborator payloads are loosely shaped JSON. Everything here is strictly
//! typed: `Gender` and `Religion` carry an explicit `Unknown` variant, and the
//! "fill if unknown" rules of the consolidation passes are total functions on
//! these types.

use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

// ---------------------------------------------------------------------------
// Articles
// ---------------------------------------------------------------------------

/// Identifier of an article: `<chapter tag>/<ordinal>-<slug>`, e.g. `14-red/01-АТЕХ`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ArticleId(String);

impl ArticleId {
    /// Build the id of the `ordinal`-th article (1-based) of a chapter.
    pub fn new(chapter_tag: &str, ordinal: usize, slug: &str) -> Self {
        Self(format!("{chapter_tag}/{}", file_stem(ordinal, slug)))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The chapter tag part of the id.
    pub fn chapter_tag(&self) -> &str {
        self.0.split_once('/').map_or("", |(tag, _)| tag)
    }
}

impl From<&str> for ArticleId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for ArticleId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl fmt::Display for ArticleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// File stem of an article inside its chapter directory: `<2-digit ordinal>-<slug>`.
pub fn file_stem(ordinal: usize, slug: &str) -> String {
    format!("{ordinal:02}-{slug}")
}

/// One addressable unit of a chapter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Article {
    /// Chapter tag, e.g. `14-red`.
    pub chapter_tag: String,
    /// Position inside the chapter, starting at 1.
    pub ordinal: usize,
    /// Name derived from the heading line, e.g. `АТЕХ`.
    pub slug: String,
    /// Original lines joined by `\n`, heading line first.
    pub text: String,
}

impl Article {
    pub fn id(&self) -> ArticleId {
        ArticleId::new(&self.chapter_tag, self.ordinal, &self.slug)
    }

    /// File name inside the chapter directory.
    pub fn file_name(&self) -> String {
        format!("{}.txt", file_stem(self.ordinal, &self.slug))
    }

    /// First line of the article with surrounding whitespace removed.
    pub fn heading(&self) -> &str {
        self.text.lines().next().map_or("", str::trim)
    }
}

// ---------------------------------------------------------------------------
// Enumerated attributes
// ---------------------------------------------------------------------------

/// Kind of a named entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntityKind {
    Person,
    Historical,
    Mythical,
    Concept,
}

impl EntityKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Person => "person",
            Self::Historical => "historical",
            Self::Mythical => "mythical",
            Self::Concept => "concept",
        }
    }

    /// Parse a collaborator-provided kind. Case and surrounding space are ignored.
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "person" => Some(Self::Person),
            "historical" => Some(Self::Historical),
            "mythical" => Some(Self::Mythical),
            "concept" => Some(Self::Concept),
            _ => None,
        }
    }
}

impl Serialize for EntityKind {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for EntityKind {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Self::parse(&raw).ok_or_else(|| {
            <D::Error as serde::de::Error>::unknown_variant(
                &raw,
                &["person", "historical", "mythical", "concept"],
            )
        })
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Gender of an entity. Anything unrecognised is `Unknown`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Gender {
    Male,
    Female,
    #[default]
    Unknown,
}

impl Gender {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Male => "male",
            Self::Female => "female",
            Self::Unknown => "unknown",
        }
    }

    pub fn parse(s: &str) -> Self {
        match s.trim().to_lowercase().as_str() {
            "male" => Self::Male,
            "female" => Self::Female,
            _ => Self::Unknown,
        }
    }

    pub fn is_known(&self) -> bool {
        !matches!(self, Self::Unknown)
    }

    /// Keep `self` when known, otherwise take `other`.
    pub fn or(self, other: Gender) -> Gender {
        if self.is_known() { self } else { other }
    }
}

impl Serialize for Gender {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for Gender {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = Option::<String>::deserialize(deserializer)?;
        Ok(raw.as_deref().map_or(Self::Unknown, Self::parse))
    }
}

/// Religious affiliation. Empty, missing and `"unknown"` all mean `Unknown`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub enum Religion {
    Known(String),
    #[default]
    Unknown,
}

impl Religion {
    pub fn parse(s: &str) -> Self {
        let trimmed = s.trim();
        if trimmed.is_empty() || trimmed.eq_ignore_ascii_case("unknown") {
            Self::Unknown
        } else {
            Self::Known(trimmed.to_string())
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::Known(name) => name,
            Self::Unknown => "unknown",
        }
    }

    pub fn is_known(&self) -> bool {
        matches!(self, Self::Known(_))
    }

    /// Keep `self` when known, otherwise take `other`.
    pub fn or(self, other: Religion) -> Religion {
        if self.is_known() { self } else { other }
    }
}

impl Serialize for Religion {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for Religion {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = Option::<String>::deserialize(deserializer)?;
        Ok(raw.as_deref().map_or(Self::Unknown, Self::parse))
    }
}

/// Epoch strings: blank or null read as `None`, `None` is written as `""`.
mod epoch {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Option<String>, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(value.as_deref().unwrap_or(""))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Option<String>, D::Error> {
        let raw = Option::<String>::deserialize(d)?;
        Ok(raw
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty()))
    }
}

/// Null-tolerant string list, for `aliases` which collaborators sometimes send as `null`.
fn null_as_empty<'de, D: Deserializer<'de>>(d: D) -> Result<BTreeSet<String>, D::Error> {
    let raw = Option::<Vec<String>>::deserialize(d)?;
    Ok(raw
        .unwrap_or_default()
        .into_iter()
        .map(|a| a.trim().to_string())
        .filter(|a| !a.is_empty())
        .collect())
}

/// Null-tolerant text field: `null` reads as an empty string.
fn null_as_empty_text<'de, D: Deserializer<'de>>(d: D) -> Result<String, D::Error> {
    Ok(Option::<String>::deserialize(d)?.unwrap_or_default())
}

// ---------------------------------------------------------------------------
// Mentions
// ---------------------------------------------------------------------------

/// One extraction of an entity from a single article, as the mention source
/// returns it. This is the shape stored in the extraction cache.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MentionRecord {
    pub name: String,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub aliases: BTreeSet<String>,
    #[serde(rename = "type")]
    pub kind: EntityKind,
    #[serde(default, with = "epoch")]
    pub epoch: Option<String>,
    #[serde(default)]
    pub gender: Gender,
    #[serde(default)]
    pub religion: Religion,
    #[serde(default, deserialize_with = "null_as_empty_text")]
    pub description: String,
    #[serde(default, deserialize_with = "null_as_empty_text")]
    pub quote: String,
}

/// A mention together with the article it was extracted from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mention {
    pub article: ArticleId,
    pub record: MentionRecord,
}

impl Mention {
    pub fn source(&self) -> Source {
        Source {
            article: self.article.clone(),
            quote: self.record.quote.clone(),
        }
    }
}

/// Field set a merge collaborator returns for a multi-mention bucket.
///
/// There is no `sources` field: if the collaborator sends one it is ignored,
/// provenance is always computed by the pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MergedRecord {
    pub name: String,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub aliases: BTreeSet<String>,
    #[serde(rename = "type")]
    pub kind: EntityKind,
    #[serde(default, with = "epoch")]
    pub epoch: Option<String>,
    #[serde(default)]
    pub gender: Gender,
    #[serde(default)]
    pub religion: Religion,
    #[serde(default, deserialize_with = "null_as_empty_text")]
    pub description: String,
}

// ---------------------------------------------------------------------------
// Canonical entities
// ---------------------------------------------------------------------------

/// Evidence linking a canonical entity back to an article.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Source {
    pub article: ArticleId,
    #[serde(default, deserialize_with = "null_as_empty_text")]
    pub quote: String,
}

/// The consolidated record of one entity across all its mentions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CanonicalEntity {
    pub name: String,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub aliases: BTreeSet<String>,
    #[serde(rename = "type")]
    pub kind: EntityKind,
    #[serde(default, with = "epoch")]
    pub epoch: Option<String>,
    #[serde(default)]
    pub gender: Gender,
    #[serde(default)]
    pub religion: Religion,
    #[serde(default, deserialize_with = "null_as_empty_text")]
    pub description: String,
    #[serde(default)]
    pub sources: Vec<Source>,
}

impl CanonicalEntity {
    /// Build an entity from a single mention record and an explicit sources list.
    ///
    /// Fields are copied as they are, except that surrounding whitespace is
    /// trimmed from the name.
    pub fn from_record(record: &MentionRecord, sources: Vec<Source>) -> Self {
        let mut entity = Self {
            name: record.name.trim().to_string(),
            aliases: record.aliases.clone(),
            kind: record.kind,
            epoch: record.epoch.clone(),
            gender: record.gender,
            religion: record.religion.clone(),
            description: record.description.clone(),
            sources,
        };
        entity.drop_self_alias();
        entity
    }

    /// Build an entity from a collaborator-merged field set.
    pub fn from_merged(merged: MergedRecord, sources: Vec<Source>) -> Self {
        let mut entity = Self {
            name: merged.name.trim().to_string(),
            aliases: merged.aliases,
            kind: merged.kind,
            epoch: merged.epoch,
            gender: merged.gender,
            religion: merged.religion,
            description: merged.description,
            sources,
        };
        entity.drop_self_alias();
        entity
    }

    /// Remove the entity's own name from its alias set.
    pub fn drop_self_alias(&mut self) {
        let name = self.name.clone();
        self.aliases.remove(&name);
    }

    /// Append sources, skipping any whose article is already present.
    pub fn absorb_sources<'a>(&mut self, sources: impl IntoIterator<Item = &'a Source>) {
        for source in sources {
            if !self.sources.iter().any(|s| s.article == source.article) {
                self.sources.push(source.clone());
            }
        }
    }
}

/// Deduplicate sources by article id, first occurrence wins.
pub fn dedup_sources(sources: impl IntoIterator<Item = Source>) -> Vec<Source> {
    let mut out: Vec<Source> = Vec::new();
    for source in sources {
        if !out.iter().any(|s| s.article == source.article) {
            out.push(source);
        }
    }
    out
}
