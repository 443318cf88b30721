//! Rich diagnostic error types for the lexicon pipeline.
//!
//! Each subsystem defines its own error type with miette `#[diagnostic]` derives,
//! so a failing stage reports an error code and a hint about what to check.
//! Collaborator failures (rate limits, malformed replies) are recovered per unit
//! of work inside the stages and never reach this top-level type.

use std::path::Path;

use miette::Diagnostic;
use thiserror::Error;

use crate::consolidate::manual::GroupsError;
use crate::llm::LlmError;
use crate::segment::SegmentError;

/// Top-level error type for the lexicon pipeline.
#[derive(Debug, Error, Diagnostic)]
pub enum LexiconError {
    #[error(transparent)]
    #[diagnostic(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Segment(#[from] SegmentError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Llm(#[from] LlmError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Groups(#[from] GroupsError),
}

/// Convenience alias for pipeline-level results.
pub type LexiconResult<T> = std::result::Result<T, LexiconError>;

// ---------------------------------------------------------------------------
// Store errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error, Diagnostic)]
pub enum StoreError {
    #[error("I/O error on {path}: {source}")]
    #[diagnostic(
        code(lexicon::store::io),
        help(
            "A filesystem operation failed. Check that the book directory exists, \
             has correct permissions, and that the disk is not full."
        )
    )]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("cannot parse {path}: {message}")]
    #[diagnostic(
        code(lexicon::store::parse),
        help(
            "The stored JSON is not in the expected shape. If the file was edited by \
             hand, fix the syntax; otherwise delete it and re-run the stage that \
             produces it."
        )
    )]
    Parse { path: String, message: String },

    #[error("cannot serialize {path}: {message}")]
    #[diagnostic(
        code(lexicon::store::serialize),
        help("The in-memory results could not be encoded as JSON. This is a bug.")
    )]
    Serialize { path: String, message: String },
}

impl StoreError {
    pub(crate) fn io(path: &Path, source: std::io::Error) -> Self {
        Self::Io {
            path: path.display().to_string(),
            source,
        }
    }
}

/// Convenience alias for store results.
pub type StoreResult<T> = std::result::Result<T, StoreError>;

// ---------------------------------------------------------------------------
// Config errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error, Diagnostic)]
pub enum ConfigError {
    #[error("failed to read config: {path}")]
    #[diagnostic(
        code(lexicon::config::read),
        help("Ensure the config file exists and is readable, or omit --config.")
    )]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config {path}: {message}")]
    #[diagnostic(
        code(lexicon::config::parse),
        help("Check the TOML syntax. Every key is optional; remove keys you are unsure about.")
    )]
    Parse { path: String, message: String },

    #[error("no chapters configured")]
    #[diagnostic(
        code(lexicon::config::no_chapters),
        help("Add at least one [[chapters]] entry with `file` and `tag` to the config.")
    )]
    NoChapters,

    #[error("duplicate chapter tag \"{tag}\"")]
    #[diagnostic(
        code(lexicon::config::duplicate_tag),
        help("Each chapter needs its own tag; the tag names the output directory.")
    )]
    DuplicateTag { tag: String },
}

pub type ConfigResult<T> = std::result::Result<T, ConfigError>;
