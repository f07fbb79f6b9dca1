//! CLI commands for cyclemap

use std::path::PathBuf;
use std::time::Instant;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use log::info;

use crate::config::LayerConfig;
use crate::ingest::{read_route_relations, read_source};
use crate::output::NdjsonTileWriter;
use crate::pipeline::{Pipeline, RenderOptions};
use crate::relations::RouteRelationExtractor;

#[derive(Parser)]
#[command(name = "cyclemap")]
#[command(about = "Cycling infrastructure and POI tile layers from OpenStreetMap", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Enable debug logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Render the cycling layers of a PBF extract into an NDJSON tile dump
    Render {
        /// Input OSM PBF file
        #[arg(short, long)]
        input: PathBuf,

        /// Output file, one JSON record per feature per tile
        #[arg(short, long)]
        output: PathBuf,

        /// Lowest zoom to render (overrides the config file)
        #[arg(long)]
        minzoom: Option<u8>,

        /// Highest zoom to render, at most 14 (overrides the config file)
        #[arg(long)]
        maxzoom: Option<u8>,

        /// YAML layer configuration
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Abort on the first tile that fails instead of skipping it
        #[arg(long)]
        strict: bool,
    },

    /// List the bicycle route relations found in a PBF file
    Routes {
        /// Input OSM PBF file
        #[arg(short, long)]
        input: PathBuf,
    },
}

impl Cli {
    pub fn run(self) -> Result<()> {
        match self.command {
            Commands::Render {
                input,
                output,
                minzoom,
                maxzoom,
                config,
                strict,
            } => {
                let config = match config {
                    Some(path) => LayerConfig::load(&path)
                        .with_context(|| format!("Failed to load config {}", path.display()))?,
                    None => LayerConfig::default(),
                };
                let config = config
                    .with_zoom_range(minzoom, maxzoom)
                    .context("Invalid zoom range")?;

                let start = Instant::now();
                let source = read_source(&input, &RouteRelationExtractor)
                    .with_context(|| format!("Failed to read {}", input.display()))?;

                let pipeline = Pipeline::cycling(&config);
                let classified = pipeline.classify(&source.features, &source.relations);
                info!(
                    "Classified {} of {} features",
                    classified.len(),
                    source.features.len()
                );

                let mut writer = NdjsonTileWriter::create(&output)
                    .with_context(|| format!("Failed to create {}", output.display()))?;
                let stats = pipeline
                    .render(&classified, &RenderOptions::from_config(&config, strict), &mut writer)
                    .context("Rendering failed")?;

                for (layer, count) in &stats.classified {
                    info!("  {layer}: {count} features");
                }
                info!(
                    "Wrote {} features in {} tiles to {} ({} tiles skipped) in {:.1}s",
                    stats.features_written,
                    stats.tiles_written,
                    output.display(),
                    stats.tiles_skipped,
                    start.elapsed().as_secs_f64()
                );
                Ok(())
            }

            Commands::Routes { input } => {
                let index = read_route_relations(&input, &RouteRelationExtractor)
                    .with_context(|| format!("Failed to read {}", input.display()))?;

                println!("{} bicycle route relations", index.len());
                for info in index.sorted() {
                    println!(
                        "{}\t{}\t{}",
                        info.id,
                        info.r#ref.as_deref().unwrap_or("-"),
                        info.name.as_deref().unwrap_or("-")
                    );
                }
                Ok(())
            }
        }
    }
}
