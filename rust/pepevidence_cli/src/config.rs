use fdrcalib::{
    Distribution,
    DistributionPoint,
};
use pepevidence::ExportFormat;
use pepevidence::FilterSettings;
use pepevidence::data_sources::morpheus::MorpheusParams;
use pepevidence::data_sources::prophet::ProphetParams;
use pepevidence::data_sources::{
    EvidenceJsonSource,
    EvidenceSource,
    MorpheusSource,
    ProphetSource,
};
use serde::{
    Deserialize,
    Serialize,
};
use std::path::PathBuf;

use crate::error::CliError;

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Config {
    pub inputs: Vec<InputConfig>,
    #[serde(default)]
    pub fasta: Option<PathBuf>,
    #[serde(default)]
    pub mapping: MappingConfig,
    #[serde(default)]
    pub filters: FilterSettings,
    pub output: Option<OutputConfig>,
    /// Directory of cached evidence sets, no caching when absent.
    #[serde(default)]
    pub cache: Option<PathBuf>,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(tag = "type")]
pub enum InputConfig {
    #[serde(rename = "prophet")]
    Prophet {
        protxml: PathBuf,
        pepxmls: Vec<PathBuf>,
        #[serde(flatten)]
        params: ProphetParams,
    },
    #[serde(rename = "morpheus")]
    Morpheus {
        protein_groups: PathBuf,
        psms: PathBuf,
        #[serde(default)]
        modifications: Option<PathBuf>,
        #[serde(flatten)]
        params: MorpheusParams,
    },
    /// A previously written evidence set, optionally recalibrated.
    #[serde(rename = "evidence")]
    Evidence {
        path: PathBuf,
        #[serde(default)]
        distribution: Option<Vec<DistributionPoint>>,
    },
}

impl InputConfig {
    pub fn to_source(&self) -> Result<Box<dyn EvidenceSource>, CliError> {
        let source: Box<dyn EvidenceSource> = match self {
            InputConfig::Prophet {
                protxml,
                pepxmls,
                params,
            } => Box::new(ProphetSource::new(protxml.clone(), pepxmls.clone(), *params)),
            InputConfig::Morpheus {
                protein_groups,
                psms,
                modifications,
                params,
            } => Box::new(MorpheusSource {
                protein_groups: protein_groups.clone(),
                psms: psms.clone(),
                modifications: modifications.clone(),
                params: *params,
            }),
            InputConfig::Evidence { path, distribution } => {
                let mut source = EvidenceJsonSource::new(path.clone());
                if let Some(points) = distribution {
                    source = source.with_distribution(Distribution::new(points.iter().copied())?);
                }
                Box::new(source)
            }
        };
        Ok(source)
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct MappingConfig {
    /// Treat L and I as the same residue when locating peptides.
    #[serde(default)]
    pub iso_leu_isomerism: bool,
    /// Reduce `db|ACCESSION|NAME` seqids to the accession.
    #[serde(default)]
    pub clean_seqids: bool,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct OutputConfig {
    pub directory: PathBuf,
    #[serde(default = "default_title")]
    pub title: String,
    #[serde(default)]
    pub format: ExportFormat,
}

fn default_title() -> String {
    "pepevidence".to_string()
}

impl Config {
    /// Sample configuration written by `write-template`.
    pub fn template() -> Self {
        Self {
            inputs: vec![
                InputConfig::Prophet {
                    protxml: "interact.prot.xml".into(),
                    pepxmls: vec!["interact.pep.xml".into()],
                    params: ProphetParams::default(),
                },
                InputConfig::Morpheus {
                    protein_groups: "morpheus/protein_groups.tsv".into(),
                    psms: "morpheus/PSMs.tsv".into(),
                    modifications: Some("morpheus/modifications.tsv".into()),
                    params: MorpheusParams::default(),
                },
            ],
            fasta: Some("proteome.fasta".into()),
            mapping: MappingConfig {
                iso_leu_isomerism: false,
                clean_seqids: true,
            },
            filters: FilterSettings::default(),
            output: Some(OutputConfig {
                directory: "pepevidence_out".into(),
                title: default_title(),
                format: ExportFormat::Json,
            }),
            cache: None,
        }
    }

    /// Checks that the config describes a runnable build.
    pub fn validate(&self) -> Result<&OutputConfig, CliError> {
        if self.inputs.is_empty() {
            return Err(CliError::Config(
                "No inputs provided, please list at least one in the config file".to_string(),
            ));
        }
        self.output.as_ref().ok_or_else(|| {
            CliError::Config(
                "No output directory provided, please provide one in either the config file or with the --output-dir flag".to_string(),
            )
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_template_roundtrips() {
        let text = serde_json::to_string_pretty(&Config::template()).unwrap();
        let config: Config = serde_json::from_str(&text).unwrap();
        assert_eq!(config.inputs.len(), 2);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_minimal_config_uses_defaults() {
        let config: Config = serde_json::from_str(
            r#"{
                "inputs": [
                    {"type": "prophet", "protxml": "a.prot.xml", "pepxmls": ["a.pep.xml"], "peptide_error": 0.05},
                    {"type": "evidence", "path": "old.json", "distribution": [{"error": 0.0, "prob": 1.0}, {"error": 1.0, "prob": 0.0}]}
                ],
                "output": {"directory": "out", "format": "jsonp"}
            }"#,
        )
        .unwrap();
        match &config.inputs[0] {
            InputConfig::Prophet { params, .. } => {
                assert_eq!(params.peptide_error, 0.05);
                assert_eq!(params.cutoff_expect, ProphetParams::default().cutoff_expect);
            }
            other => panic!("Unexpected input {:?}", other),
        }
        assert!(config.inputs[1].to_source().is_ok());
        let output = config.validate().unwrap();
        assert_eq!(output.format, ExportFormat::Jsonp);
        assert_eq!(output.title, "pepevidence");
        assert!(config.filters.include_spectra);
    }

    #[test]
    fn test_missing_inputs_is_an_error() {
        let config: Config =
            serde_json::from_str(r#"{"inputs": [], "output": {"directory": "out"}}"#).unwrap();
        assert!(matches!(config.validate(), Err(CliError::Config(_))));
    }
}
