// thiserror's #[error("...{field}...")] format strings reference struct fields,
// but the compiler doesn't see through the derive macro and reports false positives.
#![allow(unused_assignments)]

//! # lexicon
//!
//! Turns a dictionary-novel's chapter texts into addressable articles and
//! consolidates the entity mentions extracted from them into one canonical,
//! source-linked directory.
//!
//! ## Architecture
//!
//! - **Segmentation** (`segment`): heading/blank-line state machine, article layout on disk
//! - **Collaborators** (`llm`): mention extraction and bucket merging over a chat-completions API
//! - **Extraction** (`extract`): resumable per-article mention extraction
//! - **Consolidation** (`consolidate`): exact-key grouping, collaborator merge, manual groups
//! - **Storage** (`store`): incrementally flushed JSON ledgers and the final directory
//! - **Pipeline** (`pipeline`): stage orchestration over one book directory
//!
//! ## Library usage
//!
//! ```no_run
//! use lexicon::config::PipelineConfig;
//! use lexicon::llm::{ChatClient, LlmMentionSource, LlmMerger};
//! use lexicon::pipeline::Pipeline;
//!
//! let config = PipelineConfig::default();
//! let client = ChatClient::from_env(config.llm.clone()).unwrap();
//! let mut pipeline = Pipeline::new(config).unwrap();
//! let report = pipeline
//!     .run(&LlmMentionSource::new(&client), &LlmMerger::new(&client))
//!     .unwrap();
//! println!("{} entities", report.entities);
//! ```

pub mod collate;
pub mod config;
pub mod consolidate;
pub mod error;
pub mod extract;
pub mod llm;
pub mod model;
pub mod paths;
pub mod pipeline;
pub mod segment;
pub mod store;
