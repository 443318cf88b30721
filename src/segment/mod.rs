//! Article segmentation: split raw chapter text into ordered articles.
//!
//! The segmenter is a line-oriented state machine. A heading candidate
//! (see [`heading::is_heading_candidate`]) only opens a new article when at
//! least two blank lines came right before it; capitalised words that happen to
//! start an indented line mid-paragraph are not article boundaries.
//!
//! Every line after the first boundary lands in exactly one article, verbatim,
//! so joining the article texts with `\n` gives back the chapter from its first
//! heading on. Lines before the first boundary are dropped and counted.

pub mod heading;
pub mod layout;

use miette::Diagnostic;
use thiserror::Error;

use crate::model::Article;

pub use heading::{derive_name, is_heading_candidate};
pub use layout::{load_chapter, read_chapter_text, write_chapter};

/// Blank lines required right before a heading candidate.
pub const MIN_BLANK_RUN: usize = 2;

/// Errors from segmentation I/O.
#[derive(Debug, Error, Diagnostic)]
pub enum SegmentError {
    #[error("failed to read chapter file {path}")]
    #[diagnostic(
        code(lexicon::segment::chapter_read),
        help(
            "Check that the chapter file named in the config exists inside the book \
             directory and is UTF-8 text."
        )
    )]
    ChapterRead {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to write article layout at {path}")]
    #[diagnostic(
        code(lexicon::segment::layout_write),
        help("Check that the book directory is writable and the disk is not full.")
    )]
    LayoutWrite {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("article directory for chapter \"{tag}\" not found at {path}")]
    #[diagnostic(
        code(lexicon::segment::layout_missing),
        help("Run `lexicon split` first to produce the article files.")
    )]
    LayoutMissing { tag: String, path: String },

    #[error("unexpected file name in article directory: {path}")]
    #[diagnostic(
        code(lexicon::segment::bad_file_name),
        help(
            "Article files are named `<2-digit ordinal>-<slug>.txt`. Remove stray files \
             from the chapter directory or re-run `lexicon split`."
        )
    )]
    BadFileName { path: String },
}

/// Convenience alias for segmentation results.
pub type SegmentResult<T> = std::result::Result<T, SegmentError>;

/// Result of segmenting one chapter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Segmentation {
    pub chapter_tag: String,
    /// Articles in chapter order; ordinals are 1, 2, 3, …
    pub articles: Vec<Article>,
    /// Lines seen before the first article boundary, not part of any article.
    pub discarded_lines: usize,
}

impl Segmentation {
    /// Previous and next article of the article with the given ordinal.
    pub fn neighbors(&self, ordinal: usize) -> (Option<&Article>, Option<&Article>) {
        let Some(pos) = self.articles.iter().position(|a| a.ordinal == ordinal) else {
            return (None, None);
        };
        let prev = pos.checked_sub(1).and_then(|p| self.articles.get(p));
        (prev, self.articles.get(pos + 1))
    }
}

/// An article that is still receiving lines.
struct OpenArticle {
    slug: String,
    lines: Vec<String>,
}

/// Line-by-line segmentation state machine for a single chapter.
pub struct Segmenter {
    chapter_tag: String,
    current: Option<OpenArticle>,
    blank_run: usize,
    articles: Vec<Article>,
    discarded_lines: usize,
}

impl Segmenter {
    pub fn new(chapter_tag: impl Into<String>) -> Self {
        Self {
            chapter_tag: chapter_tag.into(),
            current: None,
            blank_run: 0,
            articles: Vec::new(),
            discarded_lines: 0,
        }
    }

    /// Feed one line (without its terminating `\n`).
    pub fn push_line(&mut self, line: &str) {
        if line.trim().is_empty() {
            self.blank_run += 1;
            self.absorb(line);
            return;
        }

        if self.blank_run >= MIN_BLANK_RUN && is_heading_candidate(line) {
            self.close_current();
            self.current = Some(OpenArticle {
                slug: derive_name(line),
                lines: vec![line.to_string()],
            });
        } else {
            self.absorb(line);
        }
        self.blank_run = 0;
    }

    /// Flush the open article and return the chapter's articles.
    pub fn finish(mut self) -> Segmentation {
        self.close_current();
        Segmentation {
            chapter_tag: self.chapter_tag,
            articles: self.articles,
            discarded_lines: self.discarded_lines,
        }
    }

    fn absorb(&mut self, line: &str) {
        match self.current.as_mut() {
            Some(open) => open.lines.push(line.to_string()),
            None => self.discarded_lines += 1,
        }
    }

    fn close_current(&mut self) {
        if let Some(open) = self.current.take() {
            self.articles.push(Article {
                chapter_tag: self.chapter_tag.clone(),
                ordinal: self.articles.len() + 1,
                slug: open.slug,
                text: open.lines.join("\n"),
            });
        }
    }
}

/// Segment a whole chapter text.
pub fn segment_chapter(chapter_tag: &str, text: &str) -> Segmentation {
    let mut segmenter = Segmenter::new(chapter_tag);
    for line in text.split('\n') {
        segmenter.push_line(line);
    }
    let segmentation = segmenter.finish();
    if segmentation.discarded_lines > 0 {
        tracing::info!(
            chapter = chapter_tag,
            lines = segmentation.discarded_lines,
            "discarded text before the first article heading"
        );
    }
    segmentation
}
