//! Peptide to protein position mapping and reference sequence backfill.

use crate::data_sources::{
    FastaCatalog,
    IngestSummary,
};
use crate::models::{
    EvidenceSet,
    PipelineStage,
    Protein,
};
use indexmap::IndexMap;
use std::borrow::Cow;
use tracing::{
    debug,
    warn,
};

/// Folds Leucine into Isoleucine, the two are indistinguishable by mass.
fn fold_isomers(sequence: &str, iso_leu: bool) -> Cow<'_, str> {
    if iso_leu && sequence.contains('L') {
        Cow::Owned(sequence.replace('L', "I"))
    } else {
        Cow::Borrowed(sequence)
    }
}

/// Index of the first occurrence of `peptide` in `protein`.
///
/// When the peptide occurs more than once the first index is used, callers
/// rely on a single position per match.
pub fn find_position(protein: &str, peptide: &str, iso_leu: bool) -> Option<usize> {
    if peptide.is_empty() {
        return None;
    }
    let protein = fold_isomers(protein, iso_leu);
    let peptide = fold_isomers(peptide, iso_leu);
    protein.find(peptide.as_ref())
}

/// Resolves the position of every match against its protein sequence.
///
/// Matches that cannot be found are dropped and counted. Proteins without
/// a sequence are left untouched.
#[cfg_attr(
    feature = "instrumentation",
    tracing::instrument(skip_all, level = "trace")
)]
pub fn map_positions(set: &mut EvidenceSet, iso_leu: bool, summary: &mut IngestSummary) {
    let mut n_without_sequence = 0;
    for protein in set.proteins_mut() {
        if protein.sequence.is_empty() {
            if protein.n_matches() > 0 {
                n_without_sequence += 1;
            }
            continue;
        }
        let folded = fold_isomers(&protein.sequence, iso_leu).into_owned();
        for source in protein.sources.iter_mut() {
            source.matches.retain_mut(|m| {
                let peptide = fold_isomers(&m.sequence, iso_leu);
                match folded.find(peptide.as_ref()).filter(|_| !peptide.is_empty()) {
                    Some(i) => {
                        m.position = Some(i);
                        true
                    }
                    None => {
                        debug!("'{}' not found in {}", m.sequence, protein.seqid);
                        summary.unresolved_positions += 1;
                        false
                    }
                }
            });
        }
    }
    if n_without_sequence > 0 {
        warn!(
            "{} proteins with matches have no sequence, their positions stay unresolved",
            n_without_sequence
        );
    }
    set.set_stage(PipelineStage::PositionMapped);
}

/// Keeps the accession of `db|ACCESSION|NAME` style seqids.
pub fn clean_seqid(seqid: &str) -> String {
    match seqid.split('|').nth(1) {
        Some(accession) if seqid.contains('|') => accession.to_string(),
        _ => seqid.to_string(),
    }
}

/// Rewrites primary and alternate seqids with `f`.
///
/// When two proteins collapse onto the same seqid the first one is kept.
pub fn rename_seqids(set: &mut EvidenceSet, f: impl Fn(&str) -> String) {
    let mut renamed: IndexMap<String, Protein> = IndexMap::with_capacity(set.len());
    for protein in set.protein_map().values() {
        let mut protein = protein.clone();
        protein.seqid = f(&protein.seqid);
        let others = std::mem::take(&mut protein.other_seqids);
        for other in others {
            protein.add_other_seqid(f(&other));
        }
        if renamed.contains_key(&protein.seqid) {
            warn!(
                "Seqid {} is ambiguous after renaming, dropping a duplicate",
                protein.seqid
            );
            continue;
        }
        renamed.insert(protein.seqid.clone(), protein);
    }
    let stage = set.stage();
    set.replace_proteins(renamed);
    set.set_stage(stage);
}

/// Fills sequences and descriptions from a reference catalog, then maps positions.
///
/// Proteins missing from the catalog are removed and counted as unknown
/// references. Each kept protein gets a `length` attribute.
#[cfg_attr(
    feature = "instrumentation",
    tracing::instrument(skip_all, level = "trace")
)]
pub fn load_fasta_into_proteins(
    set: &mut EvidenceSet,
    catalog: &FastaCatalog,
    iso_leu: bool,
    summary: &mut IngestSummary,
) {
    let removed = set.retain_proteins(|p| {
        let found = catalog.get(&p.seqid).is_some();
        if !found {
            debug!("{} not found in the reference sequences", p.seqid);
        }
        found
    });
    summary.unknown_references += removed;
    if removed > 0 {
        warn!("Removed {} proteins missing from the reference sequences", removed);
    }

    for protein in set.proteins_mut() {
        if let Some(record) = catalog.get(&protein.seqid) {
            protein.sequence = record.sequence.clone();
            protein.description = record.description.clone();
            protein.attr.insert("length", record.sequence.len());
        }
    }
    map_positions(set, iso_leu, summary);
}
