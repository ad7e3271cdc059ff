use super::protein::{
    Match,
    Protein,
    Source,
};
use indexmap::IndexMap;
use serde::{
    Deserialize,
    Serialize,
};

/// Lifecycle of an evidence set.
///
/// `RawIngested -> PositionMapped -> Calibrated -> Merged (0..n) ->
/// UniquenessTagged -> Filtered -> ExportReady`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum PipelineStage {
    #[default]
    RawIngested,
    PositionMapped,
    Calibrated,
    Merged,
    UniquenessTagged,
    Filtered,
    ExportReady,
}

/// Returned when a protein does not carry one slot per declared source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MisalignedSources {
    pub seqid: String,
    pub expected: usize,
    pub found: usize,
}

impl std::fmt::Display for MisalignedSources {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Protein {} has {} source slots, expected {}",
            self.seqid, self.found, self.expected
        )
    }
}

/// Protein-centric aggregate of peptide evidence.
///
/// # Invariants
/// * Every protein has exactly `source_labels.len()` source slots.
/// * Proteins are keyed by their primary seqid and keep insertion order.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct EvidenceSet {
    source_labels: Vec<String>,
    proteins: IndexMap<String, Protein>,
    #[serde(default)]
    stage: PipelineStage,
    #[serde(default)]
    uniqueness_current: bool,
}

impl EvidenceSet {
    pub fn new(source_labels: Vec<String>) -> Self {
        Self {
            source_labels,
            proteins: IndexMap::new(),
            stage: PipelineStage::RawIngested,
            uniqueness_current: false,
        }
    }

    /// Builds a set from parts, panics if the source slots are misaligned.
    pub fn from_parts(
        source_labels: Vec<String>,
        proteins: IndexMap<String, Protein>,
        stage: PipelineStage,
    ) -> Self {
        let out = Self {
            source_labels,
            proteins,
            stage,
            uniqueness_current: false,
        };
        out.assert_aligned();
        out
    }

    /// True when there are neither proteins nor declared sources.
    pub fn is_empty(&self) -> bool {
        self.proteins.is_empty() && self.source_labels.is_empty()
    }

    pub fn len(&self) -> usize {
        self.proteins.len()
    }

    pub fn n_sources(&self) -> usize {
        self.source_labels.len()
    }

    pub fn source_labels(&self) -> &[String] {
        &self.source_labels
    }

    pub fn stage(&self) -> PipelineStage {
        self.stage
    }

    pub fn is_uniqueness_current(&self) -> bool {
        self.uniqueness_current
    }

    pub(crate) fn set_stage(&mut self, stage: PipelineStage) {
        self.stage = stage;
        match stage {
            PipelineStage::UniquenessTagged | PipelineStage::ExportReady => {}
            _ => self.uniqueness_current = false,
        }
    }

    pub(crate) fn mark_uniqueness_current(&mut self) {
        self.stage = PipelineStage::UniquenessTagged;
        self.uniqueness_current = true;
    }

    /// Declares a new source column and gives every protein an empty slot for it.
    /// Returns the index of the new slot.
    pub fn add_source(&mut self, label: impl Into<String>) -> usize {
        self.source_labels.push(label.into());
        for protein in self.proteins.values_mut() {
            protein.sources.push(Source::default());
        }
        self.uniqueness_current = false;
        self.source_labels.len() - 1
    }

    pub fn source_index(&self, label: &str) -> Option<usize> {
        self.source_labels.iter().position(|x| x == label)
    }

    /// Inserts a protein, replacing any protein with the same seqid.
    ///
    /// # Panics
    /// If the protein does not carry one slot per declared source.
    pub fn insert_protein(&mut self, protein: Protein) -> Option<Protein> {
        assert_eq!(
            protein.sources.len(),
            self.n_sources(),
            "Protein {} inserted with a wrong number of source slots",
            protein.seqid
        );
        self.uniqueness_current = false;
        self.proteins.insert(protein.seqid.clone(), protein)
    }

    pub fn get(&self, seqid: &str) -> Option<&Protein> {
        self.proteins.get(seqid)
    }

    pub fn get_mut(&mut self, seqid: &str) -> Option<&mut Protein> {
        self.proteins.get_mut(seqid)
    }

    pub fn contains(&self, seqid: &str) -> bool {
        self.proteins.contains_key(seqid)
    }

    pub fn remove(&mut self, seqid: &str) -> Option<Protein> {
        self.uniqueness_current = false;
        self.proteins.shift_remove(seqid)
    }

    /// Keeps the proteins for which the predicate returns true.
    /// Returns the number of removed proteins.
    pub fn retain_proteins(&mut self, mut keep: impl FnMut(&Protein) -> bool) -> usize {
        let before = self.proteins.len();
        self.proteins.retain(|_, p| keep(p));
        let removed = before - self.proteins.len();
        if removed > 0 {
            self.uniqueness_current = false;
        }
        removed
    }

    pub fn seqids(&self) -> impl Iterator<Item = &String> {
        self.proteins.keys()
    }

    pub fn proteins(&self) -> impl Iterator<Item = &Protein> {
        self.proteins.values()
    }

    /// Mutable access to the proteins.
    ///
    /// Callers must not add or remove source slots, see [`EvidenceSet::add_source`].
    pub fn proteins_mut(&mut self) -> impl Iterator<Item = &mut Protein> {
        self.proteins.values_mut()
    }

    pub(crate) fn protein_map(&self) -> &IndexMap<String, Protein> {
        &self.proteins
    }

    pub(crate) fn replace_proteins(&mut self, proteins: IndexMap<String, Protein>) {
        self.proteins = proteins;
        self.uniqueness_current = false;
        self.assert_aligned();
    }

    /// Iterates over `(seqid, match)` pairs of every slot of every protein.
    pub fn matches(&self) -> impl Iterator<Item = (&str, &Match)> {
        self.proteins
            .iter()
            .flat_map(|(seqid, p)| p.matches().map(move |m| (seqid.as_str(), m)))
    }

    pub fn n_matches(&self) -> usize {
        self.proteins.values().map(Protein::n_matches).sum()
    }

    pub fn check_alignment(&self) -> Result<(), MisalignedSources> {
        let expected = self.n_sources();
        match self.proteins.values().find(|p| p.sources.len() != expected) {
            Some(p) => Err(MisalignedSources {
                seqid: p.seqid.clone(),
                expected,
                found: p.sources.len(),
            }),
            None => Ok(()),
        }
    }

    /// # Panics
    /// If any protein is misaligned; that is a programming error.
    pub fn assert_aligned(&self) {
        if let Err(e) = self.check_alignment() {
            panic!("Source slot invariant violated: {}", e);
        }
    }
}
