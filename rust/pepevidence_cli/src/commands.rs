use tracing::{
    info,
    instrument,
};

use crate::cli::{
    BuildArgs,
    WriteTemplateArgs,
};
use crate::config::{
    Config,
    OutputConfig,
};
use crate::error::CliError;
use crate::processing::run_build;

/// Main function for the 'build' subcommand.
#[instrument]
pub fn main_build(args: BuildArgs) -> Result<(), CliError> {
    let mut config: Config = serde_json::from_str(&std::fs::read_to_string(&args.config)?)?;

    // Command line arguments take precedence over the config file
    if let Some(fasta) = args.fasta {
        config.fasta = Some(fasta);
    }
    if let Some(directory) = args.output_dir {
        match config.output.as_mut() {
            Some(output) => output.directory = directory,
            None => {
                config.output = Some(OutputConfig {
                    directory,
                    title: "pepevidence".to_string(),
                    format: Default::default(),
                })
            }
        }
    }
    if let (Some(title), Some(output)) = (args.title, config.output.as_mut()) {
        output.title = title;
    }
    config.validate()?;
    info!("Parsed configuration: {:#?}", config);

    run_build(&config)
}

/// Main function for the 'write-template' subcommand.
pub fn main_write_template(args: WriteTemplateArgs) -> Result<(), CliError> {
    let target_dir = args.output_path;
    std::fs::create_dir_all(&target_dir)?;

    let config_path = target_dir.join("pepevidence_config.json");
    std::fs::write(
        &config_path,
        serde_json::to_string_pretty(&Config::template())?,
    )?;
    println!("Wrote config template to: {}", config_path.display());
    Ok(())
}
