//! Manual-group consolidation: merge hand-identified duplicates.
//!
//! After the primary pass, some entities are still the same person under two
//! spellings (`Атех` / `принцесса Атех`). These are listed by hand in
//! `merge-groups.toml` as groups of snapshot indices; the first index of a
//! group is the canonical slot, the rest are folded into it and removed.
//!
//! ```toml
//! # Entity count of the primary.json snapshot the indices refer to.
//! snapshot_len = 412
//!
//! [[group]]
//! note = "Ateh"
//! members = [12, { index = 40, name = "принцесса Атех" }, 41]
//! ```
//!
//! Index ownership is settled once, up front, from the authored list alone:
//! an index goes to the first group that keeps at least two members, and is
//! dropped from every later group. Indices that do not resolve against the
//! directory are reported as [`MissingReference`]s and skipped.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::path::Path;

use miette::Diagnostic;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::collate;
use crate::model::CanonicalEntity;

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error, Diagnostic)]
pub enum GroupsError {
    #[error("failed to read merge groups: {path}")]
    #[diagnostic(
        code(lexicon::groups::read),
        help("Check that the merge-groups file is readable, or remove it to skip the manual pass.")
    )]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse merge groups {path}: {message}")]
    #[diagnostic(
        code(lexicon::groups::parse),
        help(
            "Each [[group]] needs `members = [...]`, where a member is an index or \
             `{{ index = N, name = \"...\" }}`."
        )
    )]
    Parse { path: String, message: String },
}

pub type GroupsResult<T> = std::result::Result<T, GroupsError>;

/// A group member that does not resolve against the directory.
#[derive(Debug, Clone, PartialEq, Eq, Error, Diagnostic)]
#[error("group {group}: index {index} {reason}")]
#[diagnostic(
    code(lexicon::groups::missing_reference),
    help("The directory changed since the groups were written; re-check the indices.")
)]
pub struct MissingReference {
    /// Position of the group in the authored list.
    pub group: usize,
    pub index: usize,
    pub reason: MissingReason,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MissingReason {
    OutOfRange { len: usize },
    NameMismatch { expected: String, found: String },
}

impl fmt::Display for MissingReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::OutOfRange { len } => write!(f, "is out of range (directory has {len} entries)"),
            Self::NameMismatch { expected, found } => {
                write!(f, "names \"{found}\", expected \"{expected}\"")
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Group data
// ---------------------------------------------------------------------------

/// One member reference: a bare index, or an index with the expected name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum GroupMember {
    Index(usize),
    Named { index: usize, name: String },
}

impl GroupMember {
    pub fn index(&self) -> usize {
        match self {
            Self::Index(i) | Self::Named { index: i, .. } => *i,
        }
    }

    pub fn expected_name(&self) -> Option<&str> {
        match self {
            Self::Index(_) => None,
            Self::Named { name, .. } => Some(name),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MergeGroup {
    pub members: Vec<GroupMember>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

/// The hand-authored group list.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManualGroups {
    /// Entity count of the directory the indices were written against.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub snapshot_len: Option<usize>,
    #[serde(default, rename = "group")]
    pub groups: Vec<MergeGroup>,
}

impl ManualGroups {
    pub fn from_toml(text: &str, origin: &str) -> GroupsResult<Self> {
        toml::from_str(text).map_err(|e| GroupsError::Parse {
            path: origin.to_string(),
            message: e.to_string(),
        })
    }

    /// Load groups from `path`; a missing file means no groups.
    pub fn load(path: &Path) -> GroupsResult<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let text = std::fs::read_to_string(path).map_err(|e| GroupsError::Read {
            path: path.display().to_string(),
            source: e,
        })?;
        Self::from_toml(&text, &path.display().to_string())
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }
}

/// A group after ownership resolution: only the members it owns.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedGroup {
    pub id: usize,
    pub members: Vec<GroupMember>,
}

/// Decide which group owns each index.
///
/// Groups are visited in authored order. A group keeps the indices no earlier
/// group owns (each once); if at least two remain it claims them all,
/// otherwise it is dropped and claims nothing.
pub fn ownership_map(groups: &ManualGroups) -> BTreeMap<usize, usize> {
    let mut owner: BTreeMap<usize, usize> = BTreeMap::new();
    for (id, group) in groups.groups.iter().enumerate() {
        let mut kept = BTreeSet::new();
        for member in &group.members {
            if !owner.contains_key(&member.index()) {
                kept.insert(member.index());
            }
        }
        if kept.len() >= 2 {
            owner.extend(kept.into_iter().map(|i| (i, id)));
        }
    }
    owner
}

/// Surviving groups with the members each one owns, in authored order.
pub fn resolve_groups(groups: &ManualGroups) -> Vec<ResolvedGroup> {
    let owner = ownership_map(groups);
    let mut resolved = Vec::new();
    for (id, group) in groups.groups.iter().enumerate() {
        let mut seen = BTreeSet::new();
        let members: Vec<GroupMember> = group
            .members
            .iter()
            .filter(|m| owner.get(&m.index()) == Some(&id) && seen.insert(m.index()))
            .cloned()
            .collect();
        if members.len() >= 2 {
            resolved.push(ResolvedGroup { id, members });
        }
    }
    resolved
}

// ---------------------------------------------------------------------------
// Merging
// ---------------------------------------------------------------------------

/// Fold `member` into `canonical` with the field-precedence rules.
pub fn merge_into(canonical: &mut CanonicalEntity, member: &CanonicalEntity) {
    canonical.aliases.insert(member.name.clone());
    canonical.aliases.extend(member.aliases.iter().cloned());
    canonical.absorb_sources(&member.sources);

    if member.description.chars().count() > canonical.description.chars().count() {
        canonical.description = member.description.clone();
    }
    if canonical.epoch.is_none() {
        canonical.epoch = member.epoch.clone();
    }
    canonical.gender = canonical.gender.or(member.gender);
    canonical.religion = std::mem::take(&mut canonical.religion).or(member.religion.clone());

    canonical.drop_self_alias();
}

/// Outcome of one manual pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ManualMergeReport {
    pub groups_applied: usize,
    pub groups_skipped: usize,
    pub entities_removed: usize,
    pub missing: Vec<MissingReference>,
    /// `(expected, actual)` when the snapshot length guard skipped the pass.
    pub snapshot_mismatch: Option<(usize, usize)>,
}

/// Apply the manual groups to an index-addressable directory.
///
/// Returns the merged directory sorted by name. Never fails: unresolved
/// members are reported, and a directory whose length differs from
/// `snapshot_len` is returned sorted but otherwise untouched.
pub fn apply_manual_groups(
    entities: Vec<CanonicalEntity>,
    groups: &ManualGroups,
) -> (Vec<CanonicalEntity>, ManualMergeReport) {
    let mut report = ManualMergeReport::default();
    let mut entities = entities;

    if let Some(expected) = groups.snapshot_len {
        if !groups.is_empty() && expected != entities.len() {
            tracing::warn!(
                expected,
                actual = entities.len(),
                "snapshot length does not match merge-groups snapshot_len, skipping manual pass"
            );
            report.snapshot_mismatch = Some((expected, entities.len()));
            collate::sort_by_name(&mut entities, |e| e.name.as_str());
            return (entities, report);
        }
    }

    let mut removed: BTreeSet<usize> = BTreeSet::new();
    for group in resolve_groups(groups) {
        let mut slots = Vec::with_capacity(group.members.len());
        for member in &group.members {
            match check_member(&entities, group.id, member) {
                Ok(index) => slots.push(index),
                Err(missing) => {
                    tracing::warn!(error = %missing, "skipping group member");
                    report.missing.push(missing);
                }
            }
        }
        if slots.len() < 2 {
            report.groups_skipped += 1;
            continue;
        }

        let (head, rest) = (slots[0], &slots[1..]);
        let mut canonical = entities[head].clone();
        for &slot in rest {
            merge_into(&mut canonical, &entities[slot]);
        }
        tracing::info!(
            group = group.id,
            canonical = %canonical.name,
            absorbed = ?rest.iter().map(|&s| entities[s].name.as_str()).collect::<Vec<_>>(),
            "merged group"
        );
        entities[head] = canonical;
        removed.extend(rest.iter().copied());
        report.groups_applied += 1;
    }

    report.entities_removed = removed.len();
    let mut result: Vec<CanonicalEntity> = entities
        .into_iter()
        .enumerate()
        .filter(|(i, _)| !removed.contains(i))
        .map(|(_, e)| e)
        .collect();
    collate::sort_by_name(&mut result, |e| e.name.as_str());
    (result, report)
}

fn check_member(
    entities: &[CanonicalEntity],
    group: usize,
    member: &GroupMember,
) -> Result<usize, MissingReference> {
    let index = member.index();
    let Some(entity) = entities.get(index) else {
        return Err(MissingReference {
            group,
            index,
            reason: MissingReason::OutOfRange {
                len: entities.len(),
            },
        });
    };
    match member.expected_name() {
        Some(expected) if expected.trim() != entity.name => Err(MissingReference {
            group,
            index,
            reason: MissingReason::NameMismatch {
                expected: expected.to_string(),
                found: entity.name.clone(),
            },
        }),
        _ => Ok(index),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{EntityKind, Gender, Religion, Source};

    fn entity(name: &str, article: &str) -> CanonicalEntity {
        CanonicalEntity {
            name: name.into(),
            aliases: Default::default(),
            kind: EntityKind::Person,
            epoch: None,
            gender: Gender::Unknown,
            religion: Religion::Unknown,
            description: String::new(),
            sources: vec![Source {
                article: article.into(),
                quote: format!("{name} quote"),
            }],
        }
    }

    fn groups(lists: &[&[usize]]) -> ManualGroups {
        ManualGroups {
            snapshot_len: None,
            groups: lists
                .iter()
                .map(|l| MergeGroup {
                    members: l.iter().map(|&i| GroupMember::Index(i)).collect(),
                    note: None,
                })
                .collect(),
        }
    }

    fn directory() -> Vec<CanonicalEntity> {
        vec![
            entity("A", "c/01-A"),
            entity("B", "c/02-B"),
            entity("C", "c/03-C"),
            entity("D", "c/04-D"),
        ]
    }

    #[test]
    fn earlier_group_claims_shared_index() {
        let g = groups(&[&[0, 1, 2], &[1, 3]]);
        let owner = ownership_map(&g);
        assert_eq!(owner.get(&1), Some(&0));
        assert_eq!(owner.get(&3), None);

        let resolved = resolve_groups(&g);
        assert_eq!(resolved.len(), 1);
        assert_eq!(resolved[0].members.len(), 3);
    }

    #[test]
    fn overlapping_groups_leave_loser_unmerged() {
        let (out, report) = apply_manual_groups(directory(), &groups(&[&[0, 1, 2], &[1, 3]]));
        let names: Vec<_> = out.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, ["A", "D"]);
        assert_eq!(out[0].sources.len(), 3);
        assert!(out[0].aliases.contains("B") && out[0].aliases.contains("C"));
        assert_eq!(out[1].sources.len(), 1);
        assert_eq!(report.groups_applied, 1);
        assert_eq!(report.entities_removed, 2);
    }

    #[test]
    fn dropped_group_claims_nothing() {
        // [0, 1] claims both; [1, 2] keeps only 2 and is dropped; [2, 3] survives.
        let resolved = resolve_groups(&groups(&[&[0, 1], &[1, 2], &[2, 3]]));
        let ids: Vec<_> = resolved.iter().map(|g| g.id).collect();
        assert_eq!(ids, [0, 2]);
    }

    #[test]
    fn longer_description_wins() {
        let mut canonical = entity("A", "c/01-A");
        canonical.description = "short".into();
        let mut member = entity("B", "c/02-B");
        member.description = "a longer description here".into();
        merge_into(&mut canonical, &member);
        assert_eq!(canonical.description, "a longer description here");

        let mut shorter = entity("C", "c/03-C");
        shorter.description = "tiny".into();
        merge_into(&mut canonical, &shorter);
        assert_eq!(canonical.description, "a longer description here");
    }

    #[test]
    fn unknowns_are_filled_but_knowns_kept() {
        let mut canonical = entity("A", "c/01-A");
        canonical.gender = Gender::Female;
        let mut member = entity("B", "c/02-B");
        member.gender = Gender::Male;
        member.religion = Religion::Known("ислам".into());
        member.epoch = Some("X век".into());
        merge_into(&mut canonical, &member);

        assert_eq!(canonical.gender, Gender::Female);
        assert_eq!(canonical.religion, Religion::Known("ислам".into()));
        assert_eq!(canonical.epoch.as_deref(), Some("X век"));
    }

    #[test]
    fn member_aliases_never_include_canonical_name() {
        let mut canonical = entity("A", "c/01-A");
        let mut member = entity("B", "c/02-B");
        member.aliases = ["A".to_string(), "Bee".to_string()].into();
        merge_into(&mut canonical, &member);
        assert_eq!(canonical.aliases.len(), 2);
        assert!(!canonical.aliases.contains("A"));
    }

    #[test]
    fn same_article_sources_are_not_duplicated() {
        let mut canonical = entity("A", "c/01-A");
        let member = entity("B", "c/01-A");
        merge_into(&mut canonical, &member);
        assert_eq!(canonical.sources.len(), 1);
        assert_eq!(canonical.sources[0].quote, "A quote");
    }

    #[test]
    fn second_run_on_own_output_is_noop() {
        let mut g = groups(&[&[0, 1], &[2, 3]]);
        g.snapshot_len = Some(4);
        let (first, _) = apply_manual_groups(directory(), &g);
        let (second, report) = apply_manual_groups(first.clone(), &g);
        assert_eq!(first, second);
        assert_eq!(report.snapshot_mismatch, Some((4, 2)));
    }

    #[test]
    fn named_members_guard_against_shifted_indices() {
        let g = ManualGroups {
            snapshot_len: None,
            groups: vec![MergeGroup {
                members: vec![
                    GroupMember::Named { index: 0, name: "A".into() },
                    GroupMember::Named { index: 1, name: "Z".into() },
                ],
                note: None,
            }],
        };
        let (out, report) = apply_manual_groups(directory(), &g);
        assert_eq!(out.len(), 4);
        assert_eq!(report.groups_skipped, 1);
        assert!(matches!(
            report.missing[0].reason,
            MissingReason::NameMismatch { .. }
        ));
    }

    #[test]
    fn out_of_range_member_is_skipped() {
        let (out, report) = apply_manual_groups(directory(), &groups(&[&[0, 1, 99]]));
        assert_eq!(out.len(), 3);
        assert_eq!(report.groups_applied, 1);
        assert_eq!(report.missing.len(), 1);
        assert_eq!(report.missing[0].index, 99);
        assert_eq!(
            report.missing[0].reason,
            MissingReason::OutOfRange { len: 4 }
        );
    }

    #[test]
    fn entity_count_never_grows() {
        let (out, _) = apply_manual_groups(directory(), &groups(&[&[3, 2, 1, 0]]));
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].name, "D");
        assert_eq!(out[0].sources[0].article.as_str(), "c/04-D");
    }

    #[test]
    fn parses_mixed_member_forms() {
        let text = r#"
            snapshot_len = 4

            [[group]]
            note = "Ateh"
            members = [0, { index = 2, name = "C" }]
        "#;
        let g = ManualGroups::from_toml(text, "inline").unwrap();
        assert_eq!(g.snapshot_len, Some(4));
        assert_eq!(g.groups[0].members[0], GroupMember::Index(0));
        assert_eq!(g.groups[0].members[1].expected_name(), Some("C"));
        assert_eq!(g.groups[0].note.as_deref(), Some("Ateh"));
    }

    #[test]
    fn missing_file_means_no_groups() {
        let dir = tempfile::TempDir::new().unwrap();
        let g = ManualGroups::load(&dir.path().join("merge-groups.toml")).unwrap();
        assert!(g.is_empty());
    }

    #[test]
    fn bad_toml_is_parse_error() {
        let err = ManualGroups::from_toml("[[group]]\nmembers = \"x\"", "inline").unwrap_err();
        assert!(matches!(err, GroupsError::Parse { .. }));
    }
}
