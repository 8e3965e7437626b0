mod config;
mod logging;
mod runner;

use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use scrape_engine::EngineHandle;
use scrape_logging::{parse_level, scrape_info};

use crate::config::{AppConfig, Format};
use crate::logging::LogDestination;

/// Downloads every feature of ArcGIS REST layers and packages each layer as
/// a zipped dataset.
#[derive(Debug, Parser)]
#[command(name = "layer-scrape", version)]
struct Args {
    /// Layer URLs, e.g. https://host/arcgis/rest/services/Name/MapServer/0
    #[arg(required_unless_present = "init_config")]
    layers: Vec<String>,

    /// RON config file; missing files fall back to defaults.
    #[arg(short, long, default_value = "scrape.ron")]
    config: PathBuf,

    /// Write the effective config to this path and exit.
    #[arg(long, value_name = "PATH")]
    init_config: Option<PathBuf>,

    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Batches fetched concurrently per layer.
    #[arg(long)]
    concurrency: Option<usize>,

    #[arg(long, value_enum)]
    format: Option<Format>,

    #[arg(long)]
    log_level: Option<String>,

    #[arg(long, value_enum)]
    log: Option<LogDestination>,

    /// Keep the converted dataset next to the archive.
    #[arg(long)]
    keep_intermediates: bool,

    /// Stop jobs still running after this many seconds.
    #[arg(long, value_name = "SECS")]
    deadline: Option<u64>,
}

impl Args {
    fn apply(&self, config: &mut AppConfig) {
        if let Some(output) = &self.output {
            config.output_folder = output.clone();
        }
        if let Some(concurrency) = self.concurrency {
            config.max_concurrent_batches = concurrency;
        }
        if let Some(format) = self.format {
            config.format = format;
        }
        if let Some(level) = &self.log_level {
            config.log_level = level.clone();
        }
        if let Some(destination) = self.log {
            config.log_destination = destination;
        }
        if self.keep_intermediates {
            config.keep_intermediates = true;
        }
    }
}

fn main() -> Result<ExitCode> {
    let args = Args::parse();
    let mut config = AppConfig::load(&args.config)?;
    args.apply(&mut config);

    if let Some(path) = &args.init_config {
        config.save(path)?;
        return Ok(ExitCode::SUCCESS);
    }

    logging::initialize(config.log_destination, parse_level(&config.log_level));
    scrape_info!("Scraping {} layer(s) into {}", args.layers.len(), config.output_folder.display());

    let engine = EngineHandle::new(config.engine_config()).context("starting engine runtime")?;
    let summary = runner::run_layers(&engine, &args.layers, args.deadline.map(Duration::from_secs));
    scrape_info!("Finished: {:?}", summary);

    Ok(if summary.all_complete() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_flags_override_file_values() {
        let args = Args::parse_from([
            "layer-scrape",
            "--output",
            "/tmp/layers",
            "--concurrency",
            "3",
            "--format",
            "geo-json",
            "--log",
            "terminal",
            "https://host/arcgis/rest/services/A/MapServer/0",
        ]);
        let mut config = AppConfig::default();
        args.apply(&mut config);

        assert_eq!(config.output_folder, PathBuf::from("/tmp/layers"));
        assert_eq!(config.max_concurrent_batches, 3);
        assert_eq!(config.format, Format::GeoJson);
        assert_eq!(config.log_destination, LogDestination::Terminal);
        assert_eq!(args.layers.len(), 1);
    }

    #[test]
    fn layers_are_required_unless_writing_config() {
        assert!(Args::try_parse_from(["layer-scrape"]).is_err());
        let args = Args::try_parse_from(["layer-scrape", "--init-config", "out.ron"]).unwrap();
        assert!(args.layers.is_empty());
    }
}
