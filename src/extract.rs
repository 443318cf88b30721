//! Mention extraction stage.
//!
//! Walks articles in order, asks the mention source for each one that is not
//! yet in the extraction cache, and flushes the cache after every article.
//! A collaborator failure skips that article only; storage failures abort.

use crate::error::StoreResult;
use crate::llm::{MentionSource, RequestQueue, RetryOn};
use crate::model::{Article, ArticleId};
use crate::store::ExtractCache;

/// Outcome of one extraction run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExtractReport {
    /// Articles newly extracted and cached in this run.
    pub processed: usize,
    /// Articles already present in the cache.
    pub skipped: usize,
    /// Mentions added to the cache in this run.
    pub mentions: usize,
    /// Articles whose extraction failed; they stay absent from the cache.
    pub failed: Vec<ArticleId>,
}

/// Extract mentions for every article not already cached.
pub fn extract_articles<S: MentionSource + ?Sized>(
    articles: &[Article],
    source: &S,
    cache: &mut ExtractCache,
    queue: &mut RequestQueue,
) -> StoreResult<ExtractReport> {
    let mut report = ExtractReport::default();

    for article in articles {
        let id = article.id();
        if cache.contains(&id) {
            tracing::debug!(article = %id, "already extracted, skipping");
            report.skipped += 1;
            continue;
        }

        match queue.submit(id.as_str(), RetryOn::RateLimit, || source.extract(&article.text)) {
            Ok(records) => {
                tracing::info!(article = %id, mentions = records.len(), "extracted");
                report.processed += 1;
                report.mentions += records.len();
                cache.insert(id, records)?;
            }
            Err(e) => {
                tracing::warn!(article = %id, error = %e, "extraction failed, article skipped");
                report.failed.push(id);
            }
        }
    }

    Ok(report)
}
