use super::attr::Attrs;
use serde::{
    Deserialize,
    Serialize,
};

/// A modification carried by a matched peptide.
///
/// `offset` is relative to the start of the peptide. Negative offsets are
/// N-terminal modifications, offsets at or past the peptide length are
/// C-terminal ones.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Modification {
    pub offset: isize,
    pub mass: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
}

impl Modification {
    pub fn new(offset: isize, mass: f64) -> Self {
        Self {
            offset,
            mass,
            kind: None,
        }
    }

    pub fn with_kind(mut self, kind: impl Into<String>) -> Self {
        self.kind = Some(kind.into());
        self
    }

    pub fn is_n_terminal(&self) -> bool {
        self.offset < 0
    }

    pub fn is_c_terminal(&self, peptide_len: usize) -> bool {
        self.offset >= peptide_len as isize
    }
}

/// Optional per-match spectrum payload (centroided peaks).
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Spectrum {
    pub mz: Vec<f64>,
    pub intensity: Vec<f64>,
}

/// One peptide-to-protein identification.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Match {
    pub sequence: String,
    /// Index of the peptide in the parent protein sequence, `None` until the
    /// position has been resolved.
    #[serde(default)]
    pub position: Option<usize>,
    pub intensity: f64,
    #[serde(default)]
    pub modifications: Vec<Modification>,
    #[serde(default)]
    pub attr: Attrs,
    /// Only meaningful right after a uniqueness pass over the whole aggregate.
    #[serde(default)]
    pub is_unique: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub spectrum: Option<Spectrum>,
}

impl Match {
    pub fn new(sequence: impl Into<String>) -> Self {
        Self {
            sequence: sequence.into(),
            position: None,
            intensity: 1.0,
            modifications: Vec::new(),
            attr: Attrs::new(),
            is_unique: false,
            spectrum: None,
        }
    }

    pub fn len(&self) -> usize {
        self.sequence.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sequence.is_empty()
    }

    /// Residue range covered in the parent protein, if resolved.
    pub fn span(&self) -> Option<std::ops::Range<usize>> {
        self.position.map(|start| start..start + self.len())
    }

    pub fn missed_cleavages(&self) -> Option<f64> {
        self.attr.get_number("missed_cleavages")
    }
}

/// One experimental run's column of matches for a protein.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Source {
    pub matches: Vec<Match>,
}

impl Source {
    pub fn is_empty(&self) -> bool {
        self.matches.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Protein {
    pub seqid: String,
    /// Members of the same ambiguous group, kept in insertion order without duplicates.
    #[serde(default)]
    pub other_seqids: Vec<String>,
    #[serde(default)]
    pub sequence: String,
    #[serde(default)]
    pub description: String,
    pub sources: Vec<Source>,
    #[serde(default)]
    pub attr: Attrs,
}

impl Protein {
    pub fn new(seqid: impl Into<String>, n_sources: usize) -> Self {
        Self {
            seqid: seqid.into(),
            other_seqids: Vec::new(),
            sequence: String::new(),
            description: String::new(),
            sources: vec![Source::default(); n_sources],
            attr: Attrs::new(),
        }
    }

    pub fn add_other_seqid(&mut self, seqid: impl Into<String>) {
        let seqid = seqid.into();
        if seqid != self.seqid && !self.other_seqids.contains(&seqid) {
            self.other_seqids.push(seqid);
        }
    }

    pub fn matches(&self) -> impl Iterator<Item = &Match> {
        self.sources.iter().flat_map(|s| s.matches.iter())
    }

    pub fn matches_mut(&mut self) -> impl Iterator<Item = &mut Match> {
        self.sources.iter_mut().flat_map(|s| s.matches.iter_mut())
    }

    pub fn n_matches(&self) -> usize {
        self.sources.iter().map(|s| s.matches.len()).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_protein_has_empty_slots() {
        let protein = Protein::new("P1", 3);
        assert_eq!(protein.sources.len(), 3);
        assert_eq!(protein.n_matches(), 0);
    }

    #[test]
    fn test_other_seqids_deduplicated() {
        let mut protein = Protein::new("P1", 1);
        protein.add_other_seqid("P2");
        protein.add_other_seqid("P2");
        protein.add_other_seqid("P1");
        assert_eq!(protein.other_seqids, vec!["P2".to_string()]);
    }

    #[test]
    fn test_terminal_modifications() {
        let nterm = Modification::new(-1, 42.01);
        let cterm = Modification::new(5, 0.98);
        assert!(nterm.is_n_terminal());
        assert!(!cterm.is_n_terminal());
        assert!(cterm.is_c_terminal("PEPTK".len()));
        assert!(!Modification::new(4, 15.99).is_c_terminal(5));
    }

    #[test]
    fn test_match_span() {
        let mut m = Match::new("AAA");
        assert_eq!(m.span(), None);
        m.position = Some(2);
        assert_eq!(m.span(), Some(2..5));
    }
}
