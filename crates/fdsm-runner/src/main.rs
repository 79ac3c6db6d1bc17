//! `fdsm`: assemble foundation DSMs from the command line.

use chrono::Utc;
use clap::{Args, Parser, Subcommand};
use fdsm_pipeline::metrics::describe_metrics;
use fdsm_pipeline::{FoundationPipeline, Invocation, PipelineConfig, ScratchDir};
use fdsm_runner::{load_config, run_foundation_step, FsObjectStore, Result};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing::{error, info};
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Parser, Debug)]
#[command(name = "fdsm")]
#[command(about = "Foundation DSM assembly for co-registration")]
struct Cli {
    /// Log level when RUST_LOG is unset
    #[arg(long, global = true, default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Assemble a foundation DSM for a local AOI raster
    Assemble {
        /// AOI raster
        #[arg(long)]
        aoi: PathBuf,

        /// Where to write the foundation raster
        #[arg(long)]
        out: PathBuf,

        #[command(flatten)]
        pipeline: PipelineArgs,

        /// Concurrent tile downloads
        #[arg(long)]
        workers: Option<usize>,
    },

    /// Print the catalog query box for a local AOI raster
    Bbox {
        /// AOI raster
        #[arg(long)]
        aoi: PathBuf,

        #[command(flatten)]
        pipeline: PipelineArgs,
    },

    /// Run the foundation step on a trigger payload against a local store
    Handle {
        /// Trigger payload: inline JSON or a path to a JSON file
        #[arg(long)]
        event: String,

        /// Directory holding one subdirectory per bucket
        #[arg(long)]
        store_root: PathBuf,

        #[command(flatten)]
        pipeline: PipelineArgs,
    },
}

#[derive(Args, Debug)]
struct PipelineArgs {
    /// YAML configuration file
    #[arg(long, env = "FDSM_CONFIG")]
    config: Option<PathBuf>,

    /// Scale applied to the AOI footprint
    #[arg(long)]
    buffer_factor: Option<f64>,
}

impl PipelineArgs {
    fn load(&self, workers: Option<usize>) -> Result<PipelineConfig> {
        let mut config = load_config(self.config.as_deref())?;
        if let Some(factor) = self.buffer_factor {
            config.buffer_factor = factor;
        }
        if let Some(workers) = workers {
            config.download_workers = workers;
        }
        config.validate()?;
        Ok(config)
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cli.log_level));
    fmt().with_env_filter(filter).with_target(true).init();
    describe_metrics();

    match run(cli.command) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %e, "fdsm failed");
            ExitCode::FAILURE
        }
    }
}

fn run(command: Command) -> Result<()> {
    match command {
        Command::Assemble {
            aoi,
            out,
            pipeline,
            workers,
        } => {
            let config = pipeline.load(workers)?;
            let scratch = ScratchDir::new(config.scratch_root.as_deref())?;
            let pipeline = FoundationPipeline::from_config(config)?;

            let foundation = pipeline.assemble(&aoi, &scratch)?;
            std::fs::copy(&foundation.path, &out)?;
            info!(output = %out.display(), "Foundation written");

            println!("bbox: {:?}", foundation.bbox.to_array());
            println!("tiles: {}", foundation.tile_count);
            println!("crs: {}", foundation.crs);
        }
        Command::Bbox { aoi, pipeline } => {
            let config = pipeline.load(None)?;
            let pipeline = FoundationPipeline::from_config(config)?;
            let bbox = pipeline.estimate(&aoi)?;
            println!("{}", serde_json::to_string(&bbox.to_array())?);
        }
        Command::Handle {
            event,
            store_root,
            pipeline,
        } => {
            let config = pipeline.load(None)?;
            let params = Invocation::from_json(&read_payload(&event)?)?.into_params(&config.storage)?;
            let pipeline = FoundationPipeline::from_config(config)?;
            let store = FsObjectStore::new(store_root);

            let record = run_foundation_step(&params, &pipeline, &store, Utc::now())?;
            println!("{}", serde_json::to_string_pretty(&record)?);
        }
    }
    Ok(())
}

fn read_payload(event: &str) -> Result<String> {
    if event.trim_start().starts_with('{') {
        Ok(event.to_string())
    } else {
        Ok(std::fs::read_to_string(Path::new(event))?)
    }
}
