//! On-disk article layout: one directory per chapter tag, one file per article.
//!
//! ```text
//! book/
//!   14-red/
//!     01-АТЕХ.txt
//!     02-БРАНКОВИЧ-АВРАМ.txt
//! ```
//!
//! File content is the article's original lines with trailing whitespace
//! trimmed and exactly one trailing newline.

use std::path::{Path, PathBuf};

use super::{SegmentError, SegmentResult, Segmentation};
use crate::model::Article;

/// Read a raw chapter file.
pub fn read_chapter_text(path: &Path) -> SegmentResult<String> {
    std::fs::read_to_string(path).map_err(|source| SegmentError::ChapterRead {
        path: path.display().to_string(),
        source,
    })
}

/// Content written for an article file.
pub fn article_file_content(article: &Article) -> String {
    let mut content = article.text.trim_end().to_string();
    content.push('\n');
    content
}

/// Write a chapter's articles into `chapter_dir`, replacing whatever was there.
///
/// Returns the written file paths in chapter order.
pub fn write_chapter(chapter_dir: &Path, segmentation: &Segmentation) -> SegmentResult<Vec<PathBuf>> {
    let write_err = |path: &Path, source: std::io::Error| SegmentError::LayoutWrite {
        path: path.display().to_string(),
        source,
    };

    if chapter_dir.exists() {
        std::fs::remove_dir_all(chapter_dir).map_err(|e| write_err(chapter_dir, e))?;
    }
    std::fs::create_dir_all(chapter_dir).map_err(|e| write_err(chapter_dir, e))?;

    let mut written = Vec::with_capacity(segmentation.articles.len());
    for article in &segmentation.articles {
        let path = chapter_dir.join(article.file_name());
        let content = article_file_content(article);
        std::fs::write(&path, &content).map_err(|e| write_err(&path, e))?;
        tracing::debug!(
            file = %path.display(),
            chars = content.chars().count(),
            "wrote article"
        );
        written.push(path);
    }
    Ok(written)
}

/// Load a chapter's articles back from `chapter_dir`, in ordinal order.
pub fn load_chapter(chapter_dir: &Path, chapter_tag: &str) -> SegmentResult<Vec<Article>> {
    let entries = std::fs::read_dir(chapter_dir).map_err(|_| SegmentError::LayoutMissing {
        tag: chapter_tag.to_string(),
        path: chapter_dir.display().to_string(),
    })?;

    let mut files = Vec::new();
    for path in entries
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .filter(|p| p.extension().is_some_and(|ext| ext == "txt"))
    {
        let (ordinal, slug) = parse_file_stem(&path)?;
        files.push((ordinal, slug, path));
    }
    // Ordinals can exceed two digits.
    files.sort_by_key(|(ordinal, _, _)| *ordinal);

    let mut articles = Vec::with_capacity(files.len());
    for (ordinal, slug, path) in files {
        let text = std::fs::read_to_string(&path).map_err(|source| SegmentError::ChapterRead {
            path: path.display().to_string(),
            source,
        })?;
        articles.push(Article {
            chapter_tag: chapter_tag.to_string(),
            ordinal,
            slug,
            text,
        });
    }
    Ok(articles)
}

/// Split `07-КАГАН.txt` into `(7, "КАГАН")`.
fn parse_file_stem(path: &Path) -> SegmentResult<(usize, String)> {
    let bad = || SegmentError::BadFileName {
        path: path.display().to_string(),
    };
    let stem = path.file_stem().and_then(|s| s.to_str()).ok_or_else(bad)?;
    let (ordinal, slug) = stem.split_once('-').ok_or_else(bad)?;
    let ordinal: usize = ordinal.parse().map_err(|_| bad())?;
    if ordinal == 0 || slug.is_empty() {
        return Err(bad());
    }
    Ok((ordinal, slug.to_string()))
}
