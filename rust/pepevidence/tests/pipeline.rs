use fdrcalib::Distribution;
use pepevidence::calibration::{
    ERROR_ATTR,
    annotate_error_estimates,
};
use pepevidence::data_sources::{
    FastaCatalog,
    FastaReader,
    IngestSummary,
};
use pepevidence::mapping::{
    load_fasta_into_proteins,
    map_positions,
};
use pepevidence::{
    EvidenceSet,
    ExportFormat,
    FilterPipeline,
    FilterStage,
    Match,
    MatchPredicate,
    PipelineStage,
    Protein,
    merge,
    merge_all,
    prepare_for_export,
    tag_uniqueness,
};

fn single(label: &str, seqid: &str, sequence: &str, peptides: &[&str]) -> EvidenceSet {
    let mut set = EvidenceSet::new(vec![label.to_string()]);
    let mut protein = Protein::new(seqid, 1);
    protein.sequence = sequence.to_string();
    for p in peptides {
        protein.sources[0].matches.push(Match::new(*p));
    }
    set.insert_protein(protein);
    set
}

#[test]
fn test_single_match_through_every_stage() {
    let mut set = single("run1", "P1", "XXAAAYY", &[]);
    let mut m = Match::new("AAA");
    m.attr.insert("probability", 0.5);
    m.attr.insert("missed_cleavages", 1.0);
    set.get_mut("P1").unwrap().sources[0].matches.push(m);

    let mut summary = IngestSummary::default();
    map_positions(&mut set, false, &mut summary);
    assert_eq!(set.get("P1").unwrap().sources[0].matches[0].position, Some(2));

    let dist = Distribution::new([(0.0, 1.0), (1.0, 0.0)]).unwrap();
    annotate_error_estimates(&mut set, &dist, &mut summary);
    let fpe = set.get("P1").unwrap().sources[0].matches[0]
        .attr
        .get_number(ERROR_ATTR)
        .unwrap();
    assert!((fpe - 0.5).abs() < 1e-12);
    assert_eq!(summary.calibration_unavailable, 0);

    let mut merged = merge(&set, &EvidenceSet::new(vec!["empty".into()]));
    assert_eq!(merged.get("P1").unwrap().sources.len(), 2);
    assert!(merged.get("P1").unwrap().sources[1].is_empty());

    tag_uniqueness(&mut merged);
    assert!(merged.get("P1").unwrap().sources[0].matches[0].is_unique);

    let report = FilterPipeline::new()
        .then(FilterStage::DeleteMatches(MatchPredicate::HasMissedCleavage))
        .run(&mut merged);
    assert_eq!(report.matches_removed, 1);
    assert!(!merged.contains("P1"));
    assert!(!merged.is_uniqueness_current());
}

#[test]
fn test_shared_peptide_across_sources() {
    let a = single("a", "P1", "ABCDEF", &["ABC"]);
    let b = single("b", "P2", "XABC", &["ABC"]);
    let mut merged = merge(&a, &b);
    tag_uniqueness(&mut merged);
    assert!(merged.matches().all(|(_, m)| !m.is_unique));
}

#[test]
fn test_merge_slot_count_and_staleness() {
    let mut a = EvidenceSet::new(vec!["a1".into(), "a2".into()]);
    a.insert_protein(Protein::new("P1", 2));
    a.get_mut("P1").unwrap().sources[1].matches.push(Match::new("AAA"));
    tag_uniqueness(&mut a);
    assert!(a.is_uniqueness_current());

    let b = single("b1", "P2", "", &["CCC"]);
    let c = single("c1", "P1", "", &["DDD"]);
    let merged = merge_all([&a, &b, &c]);
    assert_eq!(merged.n_sources(), 4);
    assert!(merged.proteins().all(|p| p.sources.len() == 4));
    assert!(!merged.is_uniqueness_current());
    assert_eq!(merged.stage(), PipelineStage::Merged);
}

#[test]
fn test_fasta_backfill_and_export() {
    let mut set = single("run1", "P1", "", &["LLK", "ZZZ"]);
    set.insert_protein(Protein::new("P9", 1));
    set.get_mut("P9").unwrap().sources[0].matches.push(Match::new("AAA"));

    let fasta = ">P1 first protein\nMKIIK\nAAA\n>P2 other\nAAA\n";
    let catalog = FastaCatalog::read(FastaReader::new(fasta.as_bytes())).unwrap();
    let mut summary = IngestSummary::default();
    load_fasta_into_proteins(&mut set, &catalog, true, &mut summary);

    assert!(!set.contains("P9"));
    assert_eq!(summary.unknown_references, 1);
    assert_eq!(summary.unresolved_positions, 1);
    let p1 = set.get("P1").unwrap();
    assert_eq!(p1.sequence, "MKIIKAAA");
    assert_eq!(p1.description, "first protein");
    assert_eq!(p1.sources[0].matches.len(), 1);
    assert_eq!(p1.sources[0].matches[0].position, Some(2));

    prepare_for_export(&mut set);
    let dir = tempfile::tempdir().unwrap();
    let path = pepevidence::write_export(&set, "demo", dir.path(), ExportFormat::Json).unwrap();
    let value: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
    assert_eq!(value["proteins"]["P1"]["attr"]["coverage"], 37.5);
}
