//! Path resolution for the book directory and its artifacts.
//!
//! All inputs and outputs live under one book directory:
//!
//! ```text
//! book/
//!   14-ХРИСТИАНСКИЕ-ИСТОЧНИКИ-О-ХАЗАРСКОМ-ВОПРОСЕ.txt   chapter input
//!   14-red/01-АТЕХ.txt                                  article layout
//!   raw-extract.json                                    extraction cache
//!   merge-progress.json                                 merge progress
//!   primary.json                                        directory before manual groups
//!   characters.json                                     final directory
//!   merge-groups.toml                                   manual merge groups
//! ```

use std::path::{Path, PathBuf};

use crate::config::{ChapterSpec, PipelineConfig};

/// Resolved locations of every pipeline input and output.
#[derive(Debug, Clone)]
pub struct BookPaths {
    pub root: PathBuf,
    pub extract_cache: PathBuf,
    pub merge_cache: PathBuf,
    /// Consolidation output, the input of every manual merge run.
    pub primary: PathBuf,
    pub directory: PathBuf,
    pub groups: PathBuf,
}

impl BookPaths {
    pub fn resolve(config: &PipelineConfig) -> Self {
        let root = config.book_dir.clone();
        Self {
            extract_cache: root.join(&config.files.extract_cache),
            merge_cache: root.join(&config.files.merge_cache),
            primary: root.join(&config.files.primary),
            directory: root.join(&config.files.directory),
            groups: root.join(&config.files.groups),
            root,
        }
    }

    /// Raw chapter text file.
    pub fn chapter_file(&self, chapter: &ChapterSpec) -> PathBuf {
        self.root.join(&chapter.file)
    }

    /// Directory holding a chapter's article files.
    pub fn chapter_dir(&self, tag: &str) -> PathBuf {
        self.root.join(tag)
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}
