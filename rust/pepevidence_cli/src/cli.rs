use clap::{
    Parser,
    Subcommand,
};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Load, merge and filter the evidence, then write the export data.
    Build(BuildArgs),
    /// Write a template configuration file.
    WriteTemplate(WriteTemplateArgs),
}

#[derive(Parser, Debug, Clone)]
pub struct BuildArgs {
    /// Path to the JSON configuration file
    #[arg(short, long)]
    pub config: PathBuf,

    /// Path to the output directory (will over-write the config file)
    #[arg(short, long)]
    pub output_dir: Option<PathBuf>,

    /// Path to a FASTA file used to fill in protein sequences (will over-write the config file)
    #[arg(short, long)]
    pub fasta: Option<PathBuf>,

    /// Title written into the export data (will over-write the config file)
    #[arg(short, long)]
    pub title: Option<String>,
}

#[derive(Parser, Debug)]
pub struct WriteTemplateArgs {
    /// The directory the template is written to.
    #[arg(short, long)]
    pub output_path: PathBuf,
}
