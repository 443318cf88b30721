//! Entity consolidation: mentions → canonical directory.
//!
//! Two independent passes:
//!
//! 1. [`primary`]: exact-key grouping ([`group`]) and one canonical entity per
//!    bucket, with the merge collaborator resolving multi-mention buckets.
//! 2. [`manual`]: hand-curated index groups folded together with
//!    deterministic field precedence.

pub mod group;
pub mod manual;
pub mod primary;

pub use group::{Bucket, group_mentions, grouping_key};
pub use manual::{ManualGroups, ManualMergeReport, MissingReference, apply_manual_groups};
pub use primary::{ConsolidationReport, consolidate_mentions};
