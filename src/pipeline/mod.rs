//! Processing pipeline: split → extract → consolidate → manual merge.
//!
//! Each stage reads the artifacts of the previous one from the book directory
//! and writes its own, so stages can be run one at a time from the CLI or all
//! together with [`Pipeline::run`]. Collaborator calls from every stage share
//! one [`RequestQueue`], so pacing holds across stage boundaries.

use std::fmt;

use crate::config::PipelineConfig;
use crate::consolidate::{
    ConsolidationReport, ManualGroups, ManualMergeReport, apply_manual_groups,
    consolidate_mentions,
};
use crate::error::LexiconResult;
use crate::extract::{ExtractReport, extract_articles};
use crate::llm::{MentionSource, MergeCollaborator, RequestQueue};
use crate::model::Article;
use crate::paths::BookPaths;
use crate::segment::{self, load_chapter, read_chapter_text, write_chapter};
use crate::store::{self, ExtractCache, MergeProgress};

/// Named processing stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Split,
    Extract,
    Consolidate,
    ManualMerge,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Split => write!(f, "split"),
            Self::Extract => write!(f, "extract"),
            Self::Consolidate => write!(f, "consolidate"),
            Self::ManualMerge => write!(f, "merge-groups"),
        }
    }
}

/// Per-chapter outcome of the split stage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChapterSplit {
    pub tag: String,
    pub articles: usize,
    pub discarded_lines: usize,
}

/// Outcome of a full run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunReport {
    pub split: Vec<ChapterSplit>,
    pub extract: ExtractReport,
    pub consolidate: ConsolidationReport,
    pub manual: ManualMergeReport,
    pub entities: usize,
}

/// Snapshot of what is on disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineStatus {
    pub chapters: Vec<ChapterStatus>,
    pub extracted_articles: usize,
    pub cached_mentions: usize,
    pub stored_merges: usize,
    pub directory_entities: Option<usize>,
    pub manual_groups: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChapterStatus {
    pub tag: String,
    pub source_present: bool,
    /// `None` until the chapter has been split.
    pub articles: Option<usize>,
    /// Split articles with no extraction result yet.
    pub pending: usize,
}

impl fmt::Display for PipelineStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Chapters:")?;
        for ch in &self.chapters {
            let source = if ch.source_present { "" } else { " (source missing)" };
            match ch.articles {
                Some(n) => writeln!(f, "  {}: {n} articles, {} pending{source}", ch.tag, ch.pending)?,
                None => writeln!(f, "  {}: not split{source}", ch.tag)?,
            }
        }
        writeln!(
            f,
            "Extraction cache: {} articles, {} mentions",
            self.extracted_articles, self.cached_mentions
        )?;
        writeln!(f, "Merge progress: {} buckets", self.stored_merges)?;
        match self.directory_entities {
            Some(n) => writeln!(f, "Directory: {n} entities")?,
            None => writeln!(f, "Directory: not built")?,
        }
        write!(f, "Manual groups: {}", self.manual_groups)
    }
}

/// The pipeline over one book directory.
#[derive(Debug)]
pub struct Pipeline {
    config: PipelineConfig,
    paths: BookPaths,
    queue: RequestQueue,
}

impl Pipeline {
    pub fn new(config: PipelineConfig) -> LexiconResult<Self> {
        config.validate()?;
        let paths = BookPaths::resolve(&config);
        let queue = RequestQueue::new(&config.queue);
        Ok(Self {
            config,
            paths,
            queue,
        })
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn paths(&self) -> &BookPaths {
        &self.paths
    }

    /// Collaborator requests issued by this pipeline so far.
    pub fn requests_sent(&self) -> u64 {
        self.queue.requests_sent()
    }

    /// Segment every configured chapter and rewrite its article directory.
    pub fn split(&self) -> LexiconResult<Vec<ChapterSplit>> {
        tracing::info!(stage = %Stage::Split, "stage started");
        let mut report = Vec::with_capacity(self.config.chapters.len());
        for chapter in &self.config.chapters {
            let text = read_chapter_text(&self.paths.chapter_file(chapter))?;
            let segmentation = segment::segment_chapter(&chapter.tag, &text);
            write_chapter(&self.paths.chapter_dir(&chapter.tag), &segmentation)?;
            tracing::info!(
                chapter = %chapter.tag,
                articles = segmentation.articles.len(),
                "chapter split"
            );
            report.push(ChapterSplit {
                tag: chapter.tag.clone(),
                articles: segmentation.articles.len(),
                discarded_lines: segmentation.discarded_lines,
            });
        }
        Ok(report)
    }

    /// All articles of every configured chapter, chapter by chapter.
    pub fn load_articles(&self) -> LexiconResult<Vec<Article>> {
        let mut articles = Vec::new();
        for chapter in &self.config.chapters {
            articles.extend(load_chapter(&self.paths.chapter_dir(&chapter.tag), &chapter.tag)?);
        }
        Ok(articles)
    }

    /// Extract mentions for every article not yet in the extraction cache.
    pub fn extract<S: MentionSource + ?Sized>(&mut self, source: &S) -> LexiconResult<ExtractReport> {
        tracing::info!(stage = %Stage::Extract, "stage started");
        let articles = self.load_articles()?;
        let mut cache = ExtractCache::open_tolerant(&self.paths.extract_cache)?;
        let report = extract_articles(&articles, source, &mut cache, &mut self.queue)?;
        tracing::info!(
            processed = report.processed,
            skipped = report.skipped,
            failed = report.failed.len(),
            "extraction finished"
        );
        Ok(report)
    }

    /// Build the canonical directory from the extraction cache.
    ///
    /// The result is written twice: as the pass-1 snapshot that manual merge
    /// runs start from, and as the directory itself.
    pub fn consolidate<M: MergeCollaborator + ?Sized>(
        &mut self,
        merger: &M,
    ) -> LexiconResult<ConsolidationReport> {
        tracing::info!(stage = %Stage::Consolidate, "stage started");
        let cache = ExtractCache::open_tolerant(&self.paths.extract_cache)?;
        let mut progress = MergeProgress::open(&self.paths.merge_cache)?;
        let (entities, report) =
            consolidate_mentions(cache.mentions(), merger, &mut progress, &mut self.queue)?;
        store::save_directory(&self.paths.primary, &entities)?;
        store::save_directory(&self.paths.directory, &entities)?;
        Ok(report)
    }

    /// Rebuild the directory by applying the manual merge groups to the
    /// pass-1 snapshot.
    ///
    /// Group indices always refer to the snapshot, never to a directory an
    /// earlier run already folded, so repeated runs write the same result.
    pub fn merge_groups(&self) -> LexiconResult<ManualMergeReport> {
        tracing::info!(stage = %Stage::ManualMerge, "stage started");
        if !self.paths.primary.exists() {
            tracing::warn!(
                path = %self.paths.primary.display(),
                "no consolidation snapshot, run consolidate first"
            );
            return Ok(ManualMergeReport::default());
        }
        let groups = ManualGroups::load(&self.paths.groups)?;
        if groups.is_empty() {
            tracing::info!(path = %self.paths.groups.display(), "no manual merge groups");
        }
        let entities = store::load_directory(&self.paths.primary)?;
        let before = entities.len();
        let (entities, report) = apply_manual_groups(entities, &groups);
        store::save_directory(&self.paths.directory, &entities)?;
        tracing::info!(
            before,
            after = entities.len(),
            applied = report.groups_applied,
            missing = report.missing.len(),
            "manual merge finished"
        );
        Ok(report)
    }

    /// Run every stage in order.
    pub fn run<S, M>(&mut self, source: &S, merger: &M) -> LexiconResult<RunReport>
    where
        S: MentionSource + ?Sized,
        M: MergeCollaborator + ?Sized,
    {
        let split = self.split()?;
        let extract = self.extract(source)?;
        let consolidate = self.consolidate(merger)?;
        let manual = self.merge_groups()?;
        let entities = store::load_directory(&self.paths.directory)?.len();
        Ok(RunReport {
            split,
            extract,
            consolidate,
            manual,
            entities,
        })
    }

    /// Inspect the artifacts on disk without calling any collaborator.
    pub fn status(&self) -> LexiconResult<PipelineStatus> {
        let cache = ExtractCache::open_tolerant(&self.paths.extract_cache)?;
        let progress = MergeProgress::open(&self.paths.merge_cache)?;

        let mut chapters = Vec::with_capacity(self.config.chapters.len());
        for chapter in &self.config.chapters {
            let dir = self.paths.chapter_dir(&chapter.tag);
            let articles = if dir.is_dir() {
                Some(load_chapter(&dir, &chapter.tag)?)
            } else {
                None
            };
            chapters.push(ChapterStatus {
                tag: chapter.tag.clone(),
                source_present: self.paths.chapter_file(chapter).is_file(),
                pending: articles
                    .iter()
                    .flatten()
                    .filter(|a| !cache.contains(&a.id()))
                    .count(),
                articles: articles.as_ref().map(Vec::len),
            });
        }

        let directory_entities = if self.paths.directory.exists() {
            Some(store::load_directory(&self.paths.directory)?.len())
        } else {
            None
        };

        Ok(PipelineStatus {
            chapters,
            extracted_articles: cache.len(),
            cached_mentions: cache.mention_count(),
            stored_merges: progress.len(),
            directory_entities,
            manual_groups: ManualGroups::load(&self.paths.groups)?.groups.len(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ChapterSpec, QueueConfig};
    use crate::model::{CanonicalEntity, EntityKind, Gender, Religion, Source};

    const CHAPTER: &str = "ПРЕДИСЛОВИЕ\n\n\n     АТЕХ\nпервая статья\n\n\n     КАГАН\nвторая статья\n";

    fn pipeline(dir: &tempfile::TempDir) -> Pipeline {
        std::fs::write(dir.path().join("red.txt"), CHAPTER).unwrap();
        let config = PipelineConfig {
            book_dir: dir.path().to_path_buf(),
            chapters: vec![ChapterSpec::new("red.txt", "14-red")],
            queue: QueueConfig::immediate(3),
            ..Default::default()
        };
        Pipeline::new(config).unwrap()
    }

    #[test]
    fn split_writes_layout() {
        let dir = tempfile::TempDir::new().unwrap();
        let p = pipeline(&dir);
        let report = p.split().unwrap();
        assert_eq!(report[0].articles, 2);
        assert_eq!(report[0].discarded_lines, 3);
        assert!(dir.path().join("14-red").join("01-АТЕХ.txt").is_file());

        let articles = p.load_articles().unwrap();
        assert_eq!(articles[1].id().as_str(), "14-red/02-КАГАН");
    }

    #[test]
    fn status_before_and_after_split() {
        let dir = tempfile::TempDir::new().unwrap();
        let p = pipeline(&dir);

        let status = p.status().unwrap();
        assert_eq!(status.chapters[0].articles, None);
        assert!(status.chapters[0].source_present);
        assert_eq!(status.directory_entities, None);

        p.split().unwrap();
        let status = p.status().unwrap();
        assert_eq!(status.chapters[0].articles, Some(2));
        assert_eq!(status.chapters[0].pending, 2);
        assert!(status.to_string().contains("14-red: 2 articles, 2 pending"));
    }

    #[test]
    fn missing_chapter_file_is_an_error() {
        let dir = tempfile::TempDir::new().unwrap();
        let config = PipelineConfig {
            book_dir: dir.path().to_path_buf(),
            chapters: vec![ChapterSpec::new("absent.txt", "x")],
            ..Default::default()
        };
        let p = Pipeline::new(config).unwrap();
        assert!(p.split().is_err());
    }

    #[test]
    fn invalid_config_is_rejected() {
        let config = PipelineConfig {
            chapters: vec![],
            ..Default::default()
        };
        assert!(Pipeline::new(config).is_err());
    }

    #[test]
    fn merge_groups_without_file_is_noop() {
        let dir = tempfile::TempDir::new().unwrap();
        let p = pipeline(&dir);
        let report = p.merge_groups().unwrap();
        assert_eq!(report, ManualMergeReport::default());
        assert!(!p.paths().directory.exists());
    }

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
                quote: String::new(),
            }],
        }
    }

    #[test]
    fn merge_groups_reruns_from_snapshot() {
        let dir = tempfile::TempDir::new().unwrap();
        let p = pipeline(&dir);
        let snapshot = vec![
            entity("A", "c/01-A"),
            entity("B", "c/02-B"),
            entity("C", "c/03-C"),
            entity("D", "c/04-D"),
        ];
        store::save_directory(&p.paths().primary, &snapshot).unwrap();
        std::fs::write(&p.paths().groups, "[[group]]\nmembers = [0, 1]\n").unwrap();

        let report = p.merge_groups().unwrap();
        assert_eq!(report.groups_applied, 1);
        let first = store::load_directory(&p.paths().directory).unwrap();
        let names: Vec<_> = first.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, ["A", "C", "D"]);

        let report = p.merge_groups().unwrap();
        assert_eq!(report.groups_applied, 1);
        let second = store::load_directory(&p.paths().directory).unwrap();
        assert_eq!(first, second);
        assert_eq!(second[0].aliases.len(), 1);
        assert!(second[0].aliases.contains("B"));

        // The snapshot itself is never rewritten.
        assert_eq!(store::load_directory(&p.paths().primary).unwrap(), snapshot);
    }

    #[test]
    fn removing_groups_restores_snapshot() {
        let dir = tempfile::TempDir::new().unwrap();
        let p = pipeline(&dir);
        let snapshot = vec![entity("A", "c/01-A"), entity("B", "c/02-B")];
        store::save_directory(&p.paths().primary, &snapshot).unwrap();
        std::fs::write(&p.paths().groups, "[[group]]\nmembers = [0, 1]\n").unwrap();
        p.merge_groups().unwrap();
        assert_eq!(store::load_directory(&p.paths().directory).unwrap().len(), 1);

        std::fs::remove_file(&p.paths().groups).unwrap();
        let report = p.merge_groups().unwrap();
        assert_eq!(report, ManualMergeReport::default());
        assert_eq!(store::load_directory(&p.paths().directory).unwrap(), snapshot);
    }

    #[test]
    fn stage_names() {
        assert_eq!(Stage::ManualMerge.to_string(), "merge-groups");
        assert_eq!(Stage::Split.to_string(), "split");
    }
}
