//! Column preserving union of two evidence sets.

use crate::models::{
    EvidenceSet,
    PipelineStage,
    Protein,
    Source,
};
use indexmap::IndexMap;
use tracing::debug;

/// Merges two evidence sets into a new one.
///
/// Source slots of `left` come first, the ones of `right` follow. Proteins
/// present on a single side are padded with empty slots so every protein of
/// the result has `left.n_sources() + right.n_sources()` slots. A protein
/// present on both sides keeps the metadata of `left`, empty fields are
/// filled from `right`. When both sides carry different sequences, the
/// positions of the `right` matches are cleared, as they index a sequence
/// the result no longer has.
///
/// Merging with a set that has neither proteins nor sources returns the
/// other set unchanged.
///
/// # Panics
/// If either input, or the result, violates the source slot alignment.
#[cfg_attr(
    feature = "instrumentation",
    tracing::instrument(skip_all, level = "trace")
)]
pub fn merge(left: &EvidenceSet, right: &EvidenceSet) -> EvidenceSet {
    left.assert_aligned();
    right.assert_aligned();
    if right.is_empty() {
        return left.clone();
    }
    if left.is_empty() {
        return right.clone();
    }

    let n_left = left.n_sources();
    let n_right = right.n_sources();
    let mut proteins: IndexMap<String, Protein> =
        IndexMap::with_capacity(left.len() + right.len());

    for (seqid, protein) in left.protein_map() {
        let mut out = protein.clone();
        match right.get(seqid) {
            Some(other) => {
                let stale = !out.sequence.is_empty()
                    && !other.sequence.is_empty()
                    && out.sequence != other.sequence;
                let first_right = out.sources.len();
                out.sources.extend(other.sources.iter().cloned());
                if stale {
                    debug!("{} has different sequences, dropping right positions", seqid);
                    for source in &mut out.sources[first_right..] {
                        for m in source.matches.iter_mut() {
                            m.position = None;
                        }
                    }
                }
                fill_metadata(&mut out, other);
            }
            None => out
                .sources
                .extend(std::iter::repeat_with(Source::default).take(n_right)),
        }
        proteins.insert(seqid.clone(), out);
    }

    for (seqid, protein) in right.protein_map() {
        if proteins.contains_key(seqid) {
            continue;
        }
        let mut out = protein.clone();
        let mut sources: Vec<Source> = Vec::with_capacity(n_left + n_right);
        sources.extend(std::iter::repeat_with(Source::default).take(n_left));
        sources.append(&mut out.sources);
        out.sources = sources;
        proteins.insert(seqid.clone(), out);
    }

    let mut labels = left.source_labels().to_vec();
    labels.extend(right.source_labels().iter().cloned());
    debug!(
        "Merged {} + {} proteins into {} with {} sources",
        left.len(),
        right.len(),
        proteins.len(),
        labels.len()
    );
    EvidenceSet::from_parts(labels, proteins, PipelineStage::Merged)
}

fn fill_metadata(target: &mut Protein, other: &Protein) {
    if target.sequence.is_empty() {
        target.sequence = other.sequence.clone();
    }
    if target.description.is_empty() {
        target.description = other.description.clone();
    }
    for seqid in &other.other_seqids {
        target.add_other_seqid(seqid.clone());
    }
    for (key, value) in other.attr.iter() {
        if !target.attr.contains_key(key) {
            target.attr.insert(key.clone(), value.clone());
        }
    }
}

/// Left fold of [`merge`] over any number of sets.
pub fn merge_all<'a>(sets: impl IntoIterator<Item = &'a EvidenceSet>) -> EvidenceSet {
    sets.into_iter()
        .fold(EvidenceSet::default(), |acc, x| merge(&acc, x))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Match;

    /// Every `(seqid, peptide)` entry adds a match to the first slot.
    fn set_of(labels: &[&str], entries: &[(&str, &str)]) -> EvidenceSet {
        let mut set = EvidenceSet::new(labels.iter().map(|x| x.to_string()).collect());
        for (seqid, peptide) in entries {
            if !set.contains(seqid) {
                set.insert_protein(Protein::new(*seqid, labels.len()));
            }
            if let Some(protein) = set.get_mut(seqid) {
                protein.sources[0].matches.push(Match::new(*peptide));
            }
        }
        set
    }

    #[test]
    fn test_slots_are_padded_on_both_sides() {
        let a = set_of(&["a1", "a2"], &[("P1", "AAA"), ("P2", "CCC")]);
        let b = set_of(&["b1"], &[("P2", "DDD"), ("P3", "EEE")]);
        let merged = merge(&a, &b);

        assert_eq!(merged.source_labels(), &["a1", "a2", "b1"]);
        assert_eq!(merged.len(), 3);
        assert!(merged.proteins().all(|p| p.sources.len() == 3));

        let p1 = merged.get("P1").unwrap();
        assert!(p1.sources[2].is_empty());
        let p2 = merged.get("P2").unwrap();
        assert_eq!(p2.sources[0].matches[0].sequence, "CCC");
        assert_eq!(p2.sources[2].matches[0].sequence, "DDD");
        let p3 = merged.get("P3").unwrap();
        assert!(p3.sources[0].is_empty() && p3.sources[1].is_empty());
        assert_eq!(p3.sources[2].matches[0].sequence, "EEE");

        // Left order first, then the new seqids of the right side.
        let order: Vec<&String> = merged.seqids().collect();
        assert_eq!(order, vec!["P1", "P2", "P3"]);
        assert_eq!(merged.stage(), PipelineStage::Merged);
    }

    #[test]
    fn test_inputs_are_not_mutated() {
        let a = set_of(&["a1"], &[("P1", "AAA")]);
        let b = set_of(&["b1"], &[("P1", "CCC")]);
        let (a0, b0) = (a.clone(), b.clone());
        let _ = merge(&a, &b);
        assert_eq!(a, a0);
        assert_eq!(b, b0);
    }

    #[test]
    fn test_empty_sides() {
        let a = set_of(&["a1"], &[("P1", "AAA")]);
        let empty = EvidenceSet::default();
        assert_eq!(merge(&a, &empty), a);
        assert_eq!(merge(&empty, &a), a);
    }

    #[test]
    fn test_metadata_is_left_biased() {
        let mut a = set_of(&["a1"], &[("P1", "AAA")]);
        let mut b = set_of(&["b1"], &[("P1", "CCC")]);
        a.get_mut("P1").unwrap().description = "left".into();
        let right = b.get_mut("P1").unwrap();
        right.description = "right".into();
        right.sequence = "XXAAACCC".into();
        right.add_other_seqid("P1-alt");
        let merged = merge(&a, &b);
        let p1 = merged.get("P1").unwrap();
        assert_eq!(p1.description, "left");
        assert_eq!(p1.sequence, "XXAAACCC");
        assert_eq!(p1.other_seqids, vec!["P1-alt".to_string()]);
    }

    #[test]
    fn test_positions_cleared_on_sequence_conflict() {
        let mut a = set_of(&["a1"], &[("P1", "AAA")]);
        let mut b = set_of(&["b1"], &[("P1", "CCC"), ("P2", "DDD")]);
        let left = a.get_mut("P1").unwrap();
        left.sequence = "AAACCC".into();
        left.sources[0].matches[0].position = Some(0);
        let right = b.get_mut("P1").unwrap();
        right.sequence = "XCCC".into();
        right.sources[0].matches[0].position = Some(1);
        b.get_mut("P2").unwrap().sources[0].matches[0].position = Some(4);

        let merged = merge(&a, &b);
        let p1 = merged.get("P1").unwrap();
        assert_eq!(p1.sequence, "AAACCC");
        assert_eq!(p1.sources[0].matches[0].position, Some(0));
        assert_eq!(p1.sources[1].matches[0].position, None);
        // Proteins only on the right keep their positions.
        assert_eq!(merged.get("P2").unwrap().sources[1].matches[0].position, Some(4));

        // Same sequence on both sides keeps every position.
        b.get_mut("P1").unwrap().sequence = "AAACCC".into();
        b.get_mut("P1").unwrap().sources[0].matches[0].position = Some(3);
        let merged = merge(&a, &b);
        assert_eq!(merged.get("P1").unwrap().sources[1].matches[0].position, Some(3));
    }

    #[test]
    fn test_merge_all() {
        let sets = vec![
            set_of(&["a"], &[("P1", "AAA")]),
            set_of(&["b"], &[("P2", "CCC")]),
            set_of(&["c"], &[("P1", "DDD")]),
        ];
        let merged = merge_all(&sets);
        assert_eq!(merged.n_sources(), 3);
        assert_eq!(merged.get("P1").unwrap().n_matches(), 2);
        merged.assert_aligned();
    }
}
