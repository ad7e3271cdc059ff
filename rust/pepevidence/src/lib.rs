//! Protein centric aggregation of peptide spectrum matches.
//!
//! Evidence from several search engines and runs is loaded into
//! [`EvidenceSet`]s, one source slot per run, merged column by column, then
//! tagged, counted and filtered before export.

pub mod cache;
pub mod calibration;
pub mod data_sources;
pub mod errors;
pub mod export;
pub mod filtering;
pub mod mapping;
pub mod merge;
pub mod models;
pub mod statistics;
pub mod uniqueness;

pub use crate::errors::{
    PepEvidenceError,
    Result,
};
pub use crate::export::{
    ExportFormat,
    prepare_for_export,
    write_export,
};
pub use crate::filtering::{
    FilterPipeline,
    FilterSettings,
    FilterStage,
    MatchFilter,
    MatchPredicate,
};
pub use crate::merge::{
    merge,
    merge_all,
};
pub use crate::models::{
    EvidenceSet,
    Match,
    PipelineStage,
    Protein,
    Source,
};
pub use crate::uniqueness::tag_uniqueness;
