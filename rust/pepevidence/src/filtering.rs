//! Ordered filter stages over one evidence set.
//!
//! Stages run in the order they were added, every stage only sees what the
//! previous ones left. Any stage that deletes matches also removes the
//! proteins left without a match.

use crate::data_sources::read_word_file;
use crate::errors::EvidenceReadingError;
use crate::models::{
    EvidenceSet,
    Match,
    PipelineStage,
};
use serde::{
    Deserialize,
    Serialize,
};
use std::collections::{
    BTreeMap,
    HashSet,
};
use std::path::PathBuf;
use tracing::{
    debug,
    info,
};

/// A condition that marks a match for deletion.
#[derive(Debug, Clone, PartialEq)]
pub enum MatchPredicate {
    /// At least one missed cleavage. Matches without the count are kept.
    HasMissedCleavage,
    /// No missed cleavage, matches without the count are considered tryptic.
    IsFullyTryptic,
    HasNoModifications,
    /// Numeric attr present and below `min`.
    AttrBelow { key: String, min: f64 },
    /// Numeric attr present and above `max`.
    AttrAbove { key: String, max: f64 },
}

impl MatchPredicate {
    pub fn applies_to(&self, m: &Match) -> bool {
        match self {
            MatchPredicate::HasMissedCleavage => m.missed_cleavages().is_some_and(|x| x > 0.0),
            MatchPredicate::IsFullyTryptic => m.missed_cleavages().is_none_or(|x| x == 0.0),
            MatchPredicate::HasNoModifications => m.modifications.is_empty(),
            MatchPredicate::AttrBelow { key, min } => {
                m.attr.get_number(key).is_some_and(|x| x < *min)
            }
            MatchPredicate::AttrAbove { key, max } => {
                m.attr.get_number(key).is_some_and(|x| x > *max)
            }
        }
    }
}

/// Named peptide filters offered by the configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchFilter {
    #[default]
    None,
    /// Keeps fully tryptic peptides.
    Tryptic,
    /// Keeps peptides with missed cleavages.
    Semitryptic,
    /// Keeps modified peptides.
    Modified,
}

impl MatchFilter {
    pub fn predicate(&self) -> Option<MatchPredicate> {
        match self {
            MatchFilter::None => None,
            MatchFilter::Tryptic => Some(MatchPredicate::HasMissedCleavage),
            MatchFilter::Semitryptic => Some(MatchPredicate::IsFullyTryptic),
            MatchFilter::Modified => Some(MatchPredicate::HasNoModifications),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum FilterStage {
    KeepSeqids(HashSet<String>),
    DropSeqids(HashSet<String>),
    StripSpectra,
    DeleteMatches(MatchPredicate),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FilterReport {
    pub proteins_removed: usize,
    pub matches_removed: usize,
    pub spectra_stripped: usize,
}

impl std::fmt::Display for FilterReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "removed {} proteins and {} matches, stripped {} spectra",
            self.proteins_removed, self.matches_removed, self.spectra_stripped
        )
    }
}

/// Filter options as found in the configuration file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FilterSettings {
    /// Word file of the seqids to keep.
    #[serde(default)]
    pub include_seqids: Option<PathBuf>,
    /// Word file of the seqids to drop.
    #[serde(default)]
    pub exclude_seqids: Option<PathBuf>,
    #[serde(default = "default_include_spectra")]
    pub include_spectra: bool,
    #[serde(default)]
    pub match_filter: MatchFilter,
    /// Matches whose attr is below the value are deleted.
    #[serde(default)]
    pub attr_min: BTreeMap<String, f64>,
    /// Matches whose attr is above the value are deleted.
    #[serde(default)]
    pub attr_max: BTreeMap<String, f64>,
}

fn default_include_spectra() -> bool {
    true
}

impl Default for FilterSettings {
    fn default() -> Self {
        Self {
            include_seqids: None,
            exclude_seqids: None,
            include_spectra: default_include_spectra(),
            match_filter: MatchFilter::None,
            attr_min: BTreeMap::new(),
            attr_max: BTreeMap::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct FilterPipeline {
    stages: Vec<FilterStage>,
}

impl FilterPipeline {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn then(mut self, stage: FilterStage) -> Self {
        self.stages.push(stage);
        self
    }

    pub fn stages(&self) -> &[FilterStage] {
        &self.stages
    }

    /// Seqid lists, then spectrum stripping, then the match filter, then the
    /// attr cutoffs in key order.
    pub fn from_settings(settings: &FilterSettings) -> Result<Self, EvidenceReadingError> {
        let mut pipeline = Self::new();
        if let Some(path) = &settings.include_seqids {
            let seqids = read_word_file(path)?;
            pipeline = pipeline.then(FilterStage::KeepSeqids(seqids.into_iter().collect()));
        }
        if let Some(path) = &settings.exclude_seqids {
            let seqids = read_word_file(path)?;
            pipeline = pipeline.then(FilterStage::DropSeqids(seqids.into_iter().collect()));
        }
        if !settings.include_spectra {
            pipeline = pipeline.then(FilterStage::StripSpectra);
        }
        if let Some(pred) = settings.match_filter.predicate() {
            pipeline = pipeline.then(FilterStage::DeleteMatches(pred));
        }
        for (key, min) in &settings.attr_min {
            pipeline = pipeline.then(FilterStage::DeleteMatches(MatchPredicate::AttrBelow {
                key: key.clone(),
                min: *min,
            }));
        }
        for (key, max) in &settings.attr_max {
            pipeline = pipeline.then(FilterStage::DeleteMatches(MatchPredicate::AttrAbove {
                key: key.clone(),
                max: *max,
            }));
        }
        Ok(pipeline)
    }

    #[cfg_attr(
        feature = "instrumentation",
        tracing::instrument(skip_all, level = "trace")
    )]
    pub fn run(&self, set: &mut EvidenceSet) -> FilterReport {
        let mut report = FilterReport::default();
        for stage in &self.stages {
            match stage {
                FilterStage::KeepSeqids(keep) => {
                    report.proteins_removed += set.retain_proteins(|p| keep.contains(&p.seqid));
                }
                FilterStage::DropSeqids(drop) => {
                    report.proteins_removed += set.retain_proteins(|p| !drop.contains(&p.seqid));
                }
                FilterStage::StripSpectra => {
                    for protein in set.proteins_mut() {
                        for m in protein.matches_mut() {
                            if m.spectrum.take().is_some() {
                                report.spectra_stripped += 1;
                            }
                        }
                    }
                }
                FilterStage::DeleteMatches(pred) => {
                    let removed = delete_matches(set, pred);
                    debug!("{:?} removed {} matches", pred, removed);
                    report.matches_removed += removed;
                    report.proteins_removed += prune_empty_proteins(set);
                }
            }
        }
        info!("Filtering {}", report);
        set.set_stage(PipelineStage::Filtered);
        report
    }
}

/// Deletes every match the predicate applies to, returns how many.
pub fn delete_matches(set: &mut EvidenceSet, pred: &MatchPredicate) -> usize {
    let mut removed = 0;
    for protein in set.proteins_mut() {
        for source in protein.sources.iter_mut() {
            let before = source.matches.len();
            source.matches.retain(|m| !pred.applies_to(m));
            removed += before - source.matches.len();
        }
    }
    removed
}

/// Removes the proteins without a match in any slot, returns how many.
pub fn prune_empty_proteins(set: &mut EvidenceSet) -> usize {
    set.retain_proteins(|p| p.n_matches() > 0)
}
