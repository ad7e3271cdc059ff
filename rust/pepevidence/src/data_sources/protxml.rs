use super::pepxml::parse_modifications;
use super::xml_stream::{
    SubtreeReader,
    XmlNode,
    XmlStreamEvent,
};
use crate::errors::EvidenceReadingError;
use crate::models::{
    Attrs,
    Modification,
};
use fdrcalib::Distribution;
use std::io::{
    BufRead,
    BufReader,
};
use std::path::Path;
use tracing::debug;

#[derive(Debug, Clone, PartialEq)]
pub struct ProtXmlPeptide {
    pub sequence: String,
    pub modified_sequence: String,
    pub charge: Option<i64>,
    pub nsp_adjusted_probability: Option<f64>,
    pub is_contributing_evidence: bool,
    pub modifications: Vec<Modification>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ProtXmlProtein {
    pub name: String,
    pub group_number: String,
    pub sibling: Option<String>,
    pub probability: f64,
    pub percent_coverage: Option<f64>,
    pub description: String,
    /// Indistinguishable proteins of the same entry.
    pub other_seqids: Vec<String>,
    /// `parameter` name/value pairs, `prot_length` among them.
    pub parameters: Attrs,
    pub peptides: Vec<ProtXmlPeptide>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ProtXmlGroup {
    pub group_number: String,
    pub probability: Option<f64>,
    pub proteins: Vec<ProtXmlProtein>,
}

/// Streams the protein groups of a ProteinProphet protXML document.
pub struct ProtXmlReader<R: BufRead> {
    inner: SubtreeReader<R>,
    distribution: Option<Distribution>,
}

impl ProtXmlReader<BufReader<std::fs::File>> {
    pub fn from_path(path: &Path) -> Result<Self, EvidenceReadingError> {
        Ok(Self {
            inner: SubtreeReader::from_path(path, &[], &Self::RECORD_TAGS)?,
            distribution: None,
        })
    }
}

impl<R: BufRead> ProtXmlReader<R> {
    const RECORD_TAGS: [&'static str; 2] = ["proteinprophet_details", "protein_group"];

    pub fn new(inner: R) -> Self {
        Self {
            inner: SubtreeReader::new(inner, &[], &Self::RECORD_TAGS),
            distribution: None,
        }
    }

    /// Protein error distribution, padded with sentinels.
    pub fn distribution(&self) -> Option<&Distribution> {
        self.distribution.as_ref()
    }
}

impl<R: BufRead> Iterator for ProtXmlReader<R> {
    type Item = Result<ProtXmlGroup, EvidenceReadingError>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let node = match self.inner.next()? {
                Ok(XmlStreamEvent::Record(node)) => node,
                Ok(XmlStreamEvent::Opened(_)) => continue,
                Err(e) => return Some(Err(e)),
            };
            if node.name == "proteinprophet_details" {
                match parse_protein_distribution(&node) {
                    Ok(dist) => {
                        debug!("ProteinProphet distribution with {} points", dist.len());
                        self.distribution = Some(dist);
                    }
                    Err(e) => return Some(Err(e)),
                }
                continue;
            }
            return Some(parse_group(&node));
        }
    }
}

fn parse_protein_distribution(node: &XmlNode) -> Result<Distribution, EvidenceReadingError> {
    let pairs = node
        .children_named("protein_summary_data_filter")
        .map(|p| {
            Ok((
                p.require_parsed::<f64>("false_positive_error_rate")?,
                p.require_parsed::<f64>("min_probability")?,
            ))
        })
        .collect::<Result<Vec<(f64, f64)>, EvidenceReadingError>>()?;
    Ok(Distribution::new(pairs)?.with_sentinels())
}

fn parse_group(node: &XmlNode) -> Result<ProtXmlGroup, EvidenceReadingError> {
    let group_number = node.attr("group_number").unwrap_or_default().to_string();
    let proteins = node
        .children_named("protein")
        .map(|x| parse_protein(x, &group_number))
        .collect::<Result<Vec<_>, _>>()?;
    Ok(ProtXmlGroup {
        probability: node.parse_attr("probability")?,
        group_number,
        proteins,
    })
}

fn parse_protein(node: &XmlNode, group_number: &str) -> Result<ProtXmlProtein, EvidenceReadingError> {
    let mut parameters = Attrs::new();
    for param in node.children_named("parameter") {
        if let (Some(name), Some(value)) = (param.attr("name"), param.attr("value")) {
            parameters.insert_raw(name, value);
        }
    }
    let description = node
        .child("annotation")
        .and_then(|x| x.attr("protein_description"))
        .unwrap_or_default()
        .to_string();
    let other_seqids = node
        .children_named("indistinguishable_protein")
        .filter_map(|x| x.attr("protein_name"))
        .map(str::to_string)
        .collect();
    let peptides = node
        .children_named("peptide")
        .map(parse_peptide)
        .collect::<Result<Vec<_>, _>>()?;

    Ok(ProtXmlProtein {
        name: node.require_attr("protein_name")?.to_string(),
        group_number: group_number.to_string(),
        sibling: node.attr("group_sibling_id").map(str::to_string),
        probability: node.require_parsed("probability")?,
        percent_coverage: node.parse_attr("percent_coverage")?,
        description,
        other_seqids,
        parameters,
        peptides,
    })
}

fn parse_peptide(node: &XmlNode) -> Result<ProtXmlPeptide, EvidenceReadingError> {
    let sequence = node.require_attr("peptide_sequence")?.to_string();
    let mut modified_sequence = sequence.clone();
    let mut modifications = Vec::new();
    for mod_info in node.children_named("modification_info") {
        if let Some(x) = mod_info.attr("modified_peptide") {
            modified_sequence = x.to_string();
        }
        modifications.extend(parse_modifications(mod_info, &sequence)?);
    }
    Ok(ProtXmlPeptide {
        modified_sequence,
        charge: node.parse_attr("charge")?,
        nsp_adjusted_probability: node.parse_attr("nsp_adjusted_probability")?,
        is_contributing_evidence: node.attr("is_contributing_evidence") == Some("Y"),
        modifications,
        sequence,
    })
}
