//! Primary consolidation pass: one canonical entity per grouping bucket.
//!
//! Singleton buckets are taken verbatim. Larger buckets go to the merge
//! collaborator as one tagged payload; whatever it returns, sources are always
//! the pipeline-computed list. If the collaborator keeps failing, the bucket's
//! first mention is used instead, so every bucket yields exactly one record.
//!
//! Collaborator results are written to the merge-progress ledger as they
//! arrive. A stored result is reused on a later run only while its sources
//! still match the bucket's.

use crate::collate;
use crate::error::StoreResult;
use crate::llm::{MergeCollaborator, RequestQueue, RetryOn};
use crate::model::{CanonicalEntity, Mention};
use crate::store::MergeProgress;

use super::group::{Bucket, group_mentions};

/// Counters for one primary pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConsolidationReport {
    /// Buckets taken verbatim from their only mention.
    pub singles: usize,
    /// Buckets merged by the collaborator in this run.
    pub merged: usize,
    /// Buckets whose stored merge result was reused.
    pub reused: usize,
    /// Grouping keys that fell back to their first mention.
    pub fallbacks: Vec<String>,
}

impl ConsolidationReport {
    pub fn buckets(&self) -> usize {
        self.singles + self.merged + self.reused + self.fallbacks.len()
    }
}

/// Group `mentions` and resolve every bucket into a canonical entity.
///
/// The result is sorted by name. Only ledger I/O can fail.
pub fn consolidate_mentions<M: MergeCollaborator + ?Sized>(
    mentions: Vec<Mention>,
    merger: &M,
    progress: &mut MergeProgress,
    queue: &mut RequestQueue,
) -> StoreResult<(Vec<CanonicalEntity>, ConsolidationReport)> {
    let buckets = group_mentions(mentions);
    let mut report = ConsolidationReport::default();
    let mut entities = Vec::with_capacity(buckets.len());

    for bucket in &buckets {
        entities.push(resolve_bucket(bucket, merger, progress, queue, &mut report)?);
    }

    collate::sort_by_name(&mut entities, |e| e.name.as_str());
    tracing::info!(
        entities = entities.len(),
        singles = report.singles,
        merged = report.merged,
        reused = report.reused,
        fallbacks = report.fallbacks.len(),
        "primary consolidation finished"
    );
    Ok((entities, report))
}

fn resolve_bucket<M: MergeCollaborator + ?Sized>(
    bucket: &Bucket,
    merger: &M,
    progress: &mut MergeProgress,
    queue: &mut RequestQueue,
    report: &mut ConsolidationReport,
) -> StoreResult<CanonicalEntity> {
    let sources = bucket.sources();
    let first = &bucket.mentions[0].record;

    if bucket.is_single() {
        report.singles += 1;
        return Ok(CanonicalEntity::from_record(first, sources));
    }

    if let Some(stored) = progress.get(&bucket.key) {
        if stored.sources == sources {
            tracing::debug!(key = %bucket.key, "reusing stored merge");
            report.reused += 1;
            return Ok(stored.clone());
        }
    }

    let payload = bucket.merge_payload();
    match queue.submit(&bucket.key, RetryOn::RateLimitOrMalformed, || merger.merge(&payload)) {
        Ok(merged) => {
            let entity = CanonicalEntity::from_merged(merged, sources);
            tracing::info!(
                key = %bucket.key,
                mentions = bucket.mentions.len(),
                name = %entity.name,
                "merged bucket"
            );
            progress.insert(bucket.key.clone(), entity.clone())?;
            report.merged += 1;
            Ok(entity)
        }
        Err(e) => {
            tracing::warn!(
                key = %bucket.key,
                mentions = bucket.mentions.len(),
                error = %e,
                "merge failed, keeping first mention"
            );
            report.fallbacks.push(bucket.key.clone());
            Ok(CanonicalEntity::from_record(first, sources))
        }
    }
}
