//! Hand-off of a finished aggregate to the rendering layer.

use crate::errors::ExportError;
use crate::filtering::prune_empty_proteins;
use crate::models::{
    EvidenceSet,
    Match,
    PipelineStage,
    Protein,
};
use crate::statistics::compute_statistics;
use crate::uniqueness::tag_uniqueness;
use indexmap::IndexMap;
use serde::{
    Deserialize,
    Serialize,
};
use std::io::{
    BufWriter,
    Write,
};
use std::path::{
    Path,
    PathBuf,
};
use tracing::info;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExportFormat {
    #[default]
    Json,
    /// `var data = {...}` for a `<script>` include.
    Js,
    /// `load_data({...});`
    Jsonp,
}

impl ExportFormat {
    pub fn file_name(&self) -> &'static str {
        match self {
            ExportFormat::Json => "data.json",
            ExportFormat::Js => "data.js",
            ExportFormat::Jsonp => "data.jsonp",
        }
    }
}

#[derive(Serialize)]
struct ExportBundle<'a> {
    title: &'a str,
    source_labels: &'a [String],
    proteins: &'a IndexMap<String, Protein>,
}

/// Brings a set into its exportable state.
///
/// Drops proteins without matches, re-tags uniqueness over exactly the
/// remaining proteins, recomputes the statistics, annotates modifications
/// and sorts every slot by position then length.
pub fn prepare_for_export(set: &mut EvidenceSet) {
    let pruned = prune_empty_proteins(set);
    if pruned > 0 {
        info!("Dropped {} proteins without matches before export", pruned);
    }
    tag_uniqueness(set);
    compute_statistics(set);
    for protein in set.proteins_mut() {
        for source in protein.sources.iter_mut() {
            for m in source.matches.iter_mut() {
                if let Some(text) = describe_modifications(m) {
                    m.attr.insert("modifications", text);
                }
            }
            source
                .matches
                .sort_by_key(|m| (m.position.unwrap_or(usize::MAX), m.len()));
        }
    }
    set.set_stage(PipelineStage::ExportReady);
}

/// One line per modification: residue, protein and peptide positions
/// (1-based), mass and kind. `None` for unmodified matches.
pub fn describe_modifications(m: &Match) -> Option<String> {
    if m.modifications.is_empty() {
        return None;
    }
    let parts: Vec<String> = m
        .modifications
        .iter()
        .map(|x| {
            let residue = if x.is_n_terminal() {
                "N-term".to_string()
            } else if x.is_c_terminal(m.len()) {
                "C-term".to_string()
            } else {
                m.sequence
                    .chars()
                    .nth(x.offset as usize)
                    .map(String::from)
                    .unwrap_or_else(|| "X".to_string())
            };
            let mut out = match m.position {
                Some(start) => format!(
                    "{}-{}({})",
                    residue,
                    start as isize + x.offset + 1,
                    x.offset + 1
                ),
                None => format!("{}({})", residue, x.offset + 1),
            };
            out.push_str(&format!(" M={:.2}", x.mass));
            if let Some(kind) = &x.kind {
                out.push(' ');
                out.push_str(kind);
            }
            out
        })
        .collect();
    Some(parts.join("; "))
}

/// Serializes the bundle to `writer` in the given format.
pub fn write_export_to<W: Write>(
    set: &EvidenceSet,
    title: &str,
    format: ExportFormat,
    writer: &mut W,
) -> Result<(), ExportError> {
    if set.stage() != PipelineStage::ExportReady {
        return Err(ExportError::NotReady(set.stage()));
    }
    let bundle = ExportBundle {
        title,
        source_labels: set.source_labels(),
        proteins: set.protein_map(),
    };
    let prefix: &[u8] = match format {
        ExportFormat::Json => b"",
        ExportFormat::Js => b"var data = \n",
        ExportFormat::Jsonp => b"load_data(\n",
    };
    let suffix: &[u8] = match format {
        ExportFormat::Json | ExportFormat::Js => b"\n",
        ExportFormat::Jsonp => b"\n);\n",
    };
    writer.write_all(prefix).map_err(io_error)?;
    serde_json::to_writer(&mut *writer, &bundle).map_err(ExportError::Serialization)?;
    writer.write_all(suffix).map_err(io_error)?;
    Ok(())
}

fn io_error(source: std::io::Error) -> ExportError {
    ExportError::Io {
        source,
        path: PathBuf::new(),
    }
}

/// Writes the bundle into `directory`, creating it if needed.
///
/// Returns the path of the written file.
pub fn write_export(
    set: &EvidenceSet,
    title: &str,
    directory: &Path,
    format: ExportFormat,
) -> Result<PathBuf, ExportError> {
    if set.stage() != PipelineStage::ExportReady {
        return Err(ExportError::NotReady(set.stage()));
    }
    std::fs::create_dir_all(directory).map_err(|source| ExportError::Io {
        source,
        path: directory.to_path_buf(),
    })?;
    let path = directory.join(format.file_name());
    let with_path = |source| ExportError::Io {
        source,
        path: path.clone(),
    };
    let file = std::fs::File::create(&path).map_err(with_path)?;
    let mut writer = BufWriter::new(file);
    write_export_to(set, title, format, &mut writer).map_err(|e| match e {
        ExportError::Io { source, .. } => with_path(source),
        other => other,
    })?;
    writer.flush().map_err(with_path)?;
    info!(
        "Wrote {} proteins over {} sources to {}",
        set.len(),
        set.n_sources(),
        path.display()
    );
    Ok(path)
}
