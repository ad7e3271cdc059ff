use indicatif::{
    ProgressIterator,
    ProgressStyle,
};
use pepevidence::cache::{
    DirectoryCache,
    EvidenceCache,
    NoCache,
};
use pepevidence::data_sources::{
    FastaCatalog,
    IngestSummary,
    load_with_cache,
};
use pepevidence::mapping::{
    clean_seqid,
    load_fasta_into_proteins,
    map_positions,
    rename_seqids,
};
use pepevidence::{
    EvidenceSet,
    FilterPipeline,
    merge,
    prepare_for_export,
    write_export,
};
use std::io::BufWriter;
use std::path::Path;
use std::time::Instant;
use tracing::info;
use zstd::stream::write::Encoder;

use crate::config::Config;
use crate::error::CliError;

/// Reads the reference sequences, renamed the same way as the inputs.
pub fn load_catalog(config: &Config) -> Result<Option<FastaCatalog>, CliError> {
    let Some(path) = &config.fasta else {
        return Ok(None);
    };
    info!("Reading reference sequences from {}", path.display());
    let mut catalog = FastaCatalog::from_path(path)?;
    if config.mapping.clean_seqids {
        catalog = catalog.rename(clean_seqid);
    }
    info!("Loaded {} reference sequences", catalog.len());
    Ok(Some(catalog))
}

/// Sequence backfill and position mapping over a single input.
pub fn resolve_positions(
    config: &Config,
    catalog: Option<&FastaCatalog>,
    set: &mut EvidenceSet,
    summary: &mut IngestSummary,
) {
    let iso_leu = config.mapping.iso_leu_isomerism;
    match catalog {
        Some(catalog) => load_fasta_into_proteins(set, catalog, iso_leu, summary),
        None => map_positions(set, iso_leu, summary),
    }
}

/// Loads every input, resolves its positions and folds it into one
/// aggregate, one source at a time.
pub fn load_inputs(
    config: &Config,
    catalog: Option<&FastaCatalog>,
    cache: &dyn EvidenceCache,
) -> Result<(EvidenceSet, IngestSummary), CliError> {
    let style = ProgressStyle::with_template(
        "{spinner:.green} [{elapsed_precise}] [{wide_bar:.cyan/blue}] {pos}/{len} ({eta})",
    )
    .unwrap_or_else(|_| ProgressStyle::default_bar());

    let mut summary = IngestSummary::default();
    let mut aggregate = EvidenceSet::default();
    for input in config.inputs.iter().progress_with_style(style) {
        let source = input.to_source()?;
        let mut set = load_with_cache(source.as_ref(), cache, &mut summary)?;
        if config.mapping.clean_seqids {
            rename_seqids(&mut set, clean_seqid);
        }
        resolve_positions(config, catalog, &mut set, &mut summary);
        aggregate = merge(&aggregate, &set);
    }
    Ok((aggregate, summary))
}

/// Writes the aggregate as zstd compressed JSON, readable as an `evidence` input.
pub fn save_evidence(set: &EvidenceSet, path: &Path) -> Result<(), CliError> {
    let file = std::fs::File::create(path)?;
    let mut writer = BufWriter::new(Encoder::new(file, 3)?);
    serde_json::to_writer(&mut writer, set)?;
    let encoder = writer.into_inner().map_err(|e| e.into_error())?;
    encoder.finish()?;
    info!("Saved merged evidence to {}", path.display());
    Ok(())
}

pub fn run_build(config: &Config) -> Result<(), CliError> {
    let output = config.validate()?;
    let start = Instant::now();
    let cache: Box<dyn EvidenceCache> = match &config.cache {
        Some(dir) => Box::new(DirectoryCache::new(dir.clone())?),
        None => Box::new(NoCache),
    };

    let catalog = load_catalog(config)?;
    let (mut aggregate, summary) = load_inputs(config, catalog.as_ref(), cache.as_ref())?;
    summary.log("All inputs");

    std::fs::create_dir_all(&output.directory)?;
    save_evidence(&aggregate, &output.directory.join("evidence.json.zst"))?;

    FilterPipeline::from_settings(&config.filters)?.run(&mut aggregate);
    prepare_for_export(&mut aggregate);
    let path = write_export(&aggregate, &output.title, &output.directory, output.format)?;

    println!(
        "Wrote {} proteins over {} sources to {}",
        aggregate.len(),
        aggregate.n_sources(),
        path.display()
    );
    println!("Finished in {:?}", start.elapsed());
    Ok(())
}
