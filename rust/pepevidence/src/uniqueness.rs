//! Aggregate wide peptide uniqueness.

use crate::models::EvidenceSet;
use std::collections::HashMap;
use tracing::debug;

/// Match attribute listing the other proteins that share the peptide.
pub const OTHER_SEQIDS_ATTR: &str = "other_seqids";

/// Flags every match whose peptide occurs in no other protein of the set.
///
/// Also records, per match, the other seqids sharing its peptide. Must be
/// rerun after any merge or filtering, see [`EvidenceSet::is_uniqueness_current`].
#[cfg_attr(
    feature = "instrumentation",
    tracing::instrument(skip_all, level = "trace")
)]
pub fn tag_uniqueness(set: &mut EvidenceSet) {
    // Peptide -> indices of the proteins containing it, in set order.
    let mut index: HashMap<String, Vec<usize>> = HashMap::new();
    for (i, protein) in set.proteins().enumerate() {
        for m in protein.matches() {
            let owners = index.entry(m.sequence.clone()).or_default();
            if owners.last() != Some(&i) {
                owners.push(i);
            }
        }
    }
    let seqids: Vec<String> = set.seqids().cloned().collect();

    let mut n_unique = 0;
    for (i, protein) in set.proteins_mut().enumerate() {
        for m in protein.matches_mut() {
            let owners = index.get(&m.sequence).map(Vec::as_slice).unwrap_or_default();
            m.is_unique = owners.len() == 1;
            let others: Vec<String> = owners
                .iter()
                .filter(|&&j| j != i)
                .map(|&j| seqids[j].clone())
                .collect();
            if others.is_empty() {
                m.attr.remove(OTHER_SEQIDS_ATTR);
                n_unique += 1;
            } else {
                m.attr.insert(OTHER_SEQIDS_ATTR, others);
            }
        }
    }
    debug!(
        "{} of {} matches are unique over {} peptides",
        n_unique,
        set.n_matches(),
        index.len()
    );
    set.mark_uniqueness_current();
}
