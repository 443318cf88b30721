//! External collaborators: mention extraction and bucket merging.
//!
//! The pipeline never interprets text itself. It talks to two collaborators
//! through narrow traits:
//!
//! - [`MentionSource`]: article text → mention records
//! - [`MergeCollaborator`]: tagged mention payloads → one merged field set
//!
//! Both are implemented on top of any [`Completion`] backend (the shipped one
//! is [`client::ChatClient`], an OpenAI-compatible HTTP client). Replies are
//! free-form text and are parsed with the fallible functions in [`parse`].
//! Calls go through the single-worker [`queue::RequestQueue`].

pub mod client;
pub mod parse;
pub mod prompts;
pub mod queue;

use miette::Diagnostic;
use thiserror::Error;

use crate::model::{MentionRecord, MergedRecord};

pub use client::ChatClient;
pub use parse::ParseError;
pub use queue::{RequestQueue, RetryOn};

/// Errors from collaborator calls.
#[derive(Debug, Error, Diagnostic)]
pub enum LlmError {
    #[error("API key not set: environment variable {var} is empty or missing")]
    #[diagnostic(
        code(lexicon::llm::missing_api_key),
        help("Export {var} with a valid key, or point `llm.api_key_env` at another variable.")
    )]
    MissingApiKey { var: String },

    #[error("rate limited by the completion endpoint: {message}")]
    #[diagnostic(
        code(lexicon::llm::rate_limited),
        help(
            "The endpoint's request budget is exhausted. Raise `queue.request_delay_ms` \
             or `queue.backoff_step_ms`, or wait and re-run; finished units are kept."
        )
    )]
    RateLimited { message: String },

    #[error("completion request failed: {message}")]
    #[diagnostic(
        code(lexicon::llm::request_failed),
        help("Check the endpoint URL, the model name and network connectivity.")
    )]
    RequestFailed { message: String },

    #[error("unexpected completion envelope: {message}")]
    #[diagnostic(
        code(lexicon::llm::envelope),
        help("The endpoint did not answer in the chat-completions format. Is `llm.base_url` right?")
    )]
    Envelope { message: String },

    #[error("malformed collaborator output")]
    #[diagnostic(
        code(lexicon::llm::malformed),
        help("The model's reply could not be read as the expected JSON shape.")
    )]
    Malformed(#[from] ParseError),
}

impl LlmError {
    pub fn is_rate_limited(&self) -> bool {
        matches!(self, Self::RateLimited { .. })
    }

    pub fn is_malformed(&self) -> bool {
        matches!(self, Self::Malformed(_))
    }
}

/// Convenience alias for collaborator results.
pub type LlmResult<T> = std::result::Result<T, LlmError>;

/// A text-completion backend: system prompt + user content → reply text.
pub trait Completion {
    fn complete(&self, system: &str, user: &str) -> LlmResult<String>;
}

impl<C: Completion + ?Sized> Completion for &C {
    fn complete(&self, system: &str, user: &str) -> LlmResult<String> {
        (**self).complete(system, user)
    }
}

/// Produces mention records for one article.
pub trait MentionSource {
    fn extract(&self, article_text: &str) -> LlmResult<Vec<MentionRecord>>;
}

/// Merges the tagged payloads of one multi-mention bucket into a single record.
pub trait MergeCollaborator {
    fn merge(&self, payload: &str) -> LlmResult<MergedRecord>;
}

/// [`MentionSource`] backed by a completion model.
#[derive(Debug)]
pub struct LlmMentionSource<C> {
    backend: C,
}

impl<C: Completion> LlmMentionSource<C> {
    pub fn new(backend: C) -> Self {
        Self { backend }
    }
}

impl<C: Completion> MentionSource for LlmMentionSource<C> {
    fn extract(&self, article_text: &str) -> LlmResult<Vec<MentionRecord>> {
        let reply = self.backend.complete(prompts::EXTRACT_SYSTEM, article_text)?;
        Ok(parse::parse_mentions(&reply)?)
    }
}

/// [`MergeCollaborator`] backed by a completion model.
#[derive(Debug)]
pub struct LlmMerger<C> {
    backend: C,
}

impl<C: Completion> LlmMerger<C> {
    pub fn new(backend: C) -> Self {
        Self { backend }
    }
}

impl<C: Completion> MergeCollaborator for LlmMerger<C> {
    fn merge(&self, payload: &str) -> LlmResult<MergedRecord> {
        let reply = self.backend.complete(prompts::MERGE_SYSTEM, payload)?;
        Ok(parse::parse_merged(&reply)?)
    }
}
