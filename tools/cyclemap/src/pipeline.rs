//! Tile rendering pipeline
//!
//! Classification runs once over all source features. Each zoom level then
//! buckets the classified features into tiles, projects them into tile
//! pixels and hands every (tile, layer) batch to that layer's
//! post-processor. Tiles are independent so both steps run on rayon.

use std::collections::BTreeMap;

use cyclemap_common::{Error, GeometryError, Result};
use geo::{CoordsIter, Geometry};
use log::{debug, info, warn};
use rayon::prelude::*;

use crate::config::LayerConfig;
use crate::feature::{ClassifiedFeature, ElementKind, SourceFeature};
use crate::layers::{
    CyclingInfraLayer, CyclingMergePostProcessor, FeaturePostProcessor, FeatureProcessor, MAX_ZOOM,
};
use crate::output::TileSink;
use crate::relations::RouteRelationIndex;
use crate::tile::{tiles_covering, TileCoord};

/// Pixels around each tile that still receive features
pub const TILE_BUFFER: f64 = 4.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RenderOptions {
    pub min_zoom: u8,
    pub max_zoom: u8,
    /// Abort on the first tile that fails instead of skipping it
    pub strict: bool,
}

impl RenderOptions {
    pub fn from_config(config: &LayerConfig, strict: bool) -> Self {
        Self {
            min_zoom: config.min_zoom,
            max_zoom: config.max_zoom,
            strict,
        }
    }
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct RenderStats {
    /// Classified features per layer name
    pub classified: BTreeMap<String, u64>,
    pub tiles_written: u64,
    pub tiles_skipped: u64,
    /// Features dropped for non-finite coordinates
    pub features_skipped: u64,
    pub features_written: u64,
}

/// Composes feature processors with per-layer post-processors
pub struct Pipeline {
    processors: Vec<Box<dyn FeatureProcessor>>,
    post_processors: Vec<Box<dyn FeaturePostProcessor>>,
}

impl Pipeline {
    pub fn new(
        processors: Vec<Box<dyn FeatureProcessor>>,
        post_processors: Vec<Box<dyn FeaturePostProcessor>>,
    ) -> Self {
        Self {
            processors,
            post_processors,
        }
    }

    /// Cycling infrastructure and POI layers with line merging
    pub fn cycling(config: &LayerConfig) -> Self {
        Self::new(
            vec![Box::new(CyclingInfraLayer), Box::new(config.poi_layer())],
            vec![Box::new(CyclingMergePostProcessor::default())],
        )
    }

    /// Run every processor over every feature.
    ///
    /// `relations` must be complete: classification only reads it.
    pub fn classify(
        &self,
        features: &[SourceFeature],
        relations: &RouteRelationIndex,
    ) -> Vec<ClassifiedFeature> {
        features
            .par_iter()
            .flat_map_iter(|feature| {
                let memberships = match feature.kind {
                    ElementKind::Way => relations.memberships(feature.id),
                    ElementKind::Node => Vec::new(),
                };
                self.processors
                    .iter()
                    .flat_map(|p| p.process_feature(feature, &memberships))
                    .collect::<Vec<_>>()
            })
            .collect()
    }

    fn post_processor(&self, layer: &str) -> Option<&dyn FeaturePostProcessor> {
        self.post_processors
            .iter()
            .find(|p| p.layer_name() == layer)
            .map(|p| p.as_ref())
    }

    /// Render one zoom level into tiles, sorted by (x, y).
    ///
    /// Tiles whose post-processing fails come back as `Err` alongside their
    /// address so the caller decides whether to skip or abort. Features
    /// that cannot be placed at all fail the whole zoom level.
    pub fn render_zoom(
        &self,
        classified: &[ClassifiedFeature],
        zoom: u8,
    ) -> std::result::Result<Vec<(TileCoord, TileResult)>, GeometryError> {
        let placed = classified
            .par_iter()
            .filter(|f| f.min_zoom <= zoom)
            .map(|f| place(f, zoom))
            .collect::<std::result::Result<Vec<_>, _>>()?;

        let mut buckets: BTreeMap<(TileCoord, String), Vec<ClassifiedFeature>> = BTreeMap::new();
        for (tile, feature) in placed.into_iter().flatten() {
            buckets
                .entry((tile, feature.layer.clone()))
                .or_default()
                .push(feature);
        }

        let processed: Vec<_> = buckets
            .into_par_iter()
            .map(|((tile, layer), features)| {
                let result = match self.post_processor(&layer) {
                    Some(post) => post.post_process(zoom, features),
                    None => Ok(features),
                };
                (tile, result)
            })
            .collect();

        let mut tiles: BTreeMap<TileCoord, TileResult> = BTreeMap::new();
        for (tile, result) in processed {
            let entry = tiles.entry(tile).or_insert_with(|| Ok(Vec::new()));
            match result {
                Ok(more) => {
                    if let Ok(features) = entry {
                        features.extend(more);
                    }
                }
                Err(err) => {
                    if entry.is_ok() {
                        *entry = Err(err);
                    }
                }
            }
        }
        Ok(tiles.into_iter().collect())
    }

    /// Render every zoom in `options` into `sink`.
    ///
    /// Features with non-finite coordinates are dropped with a warning, or
    /// abort the run when `strict`.
    pub fn render(
        &self,
        classified: &[ClassifiedFeature],
        options: &RenderOptions,
        sink: &mut dyn TileSink,
    ) -> Result<RenderStats> {
        if options.min_zoom > options.max_zoom {
            return Err(Error::InvalidInput(format!(
                "min zoom {} is greater than max zoom {}",
                options.min_zoom, options.max_zoom
            )));
        }
        if options.max_zoom > MAX_ZOOM {
            return Err(Error::InvalidInput(format!(
                "max zoom {} exceeds {}",
                options.max_zoom, MAX_ZOOM
            )));
        }

        let mut stats = RenderStats::default();
        let mut valid = Vec::with_capacity(classified.len());
        for feature in classified {
            *stats.classified.entry(feature.layer.clone()).or_default() += 1;
            match check_coords(&feature.geometry) {
                Ok(()) => valid.push(feature.clone()),
                Err(err) if options.strict => return Err(err.into()),
                Err(err) => {
                    warn!("Dropping {} feature: {err}", feature.layer);
                    stats.features_skipped += 1;
                }
            }
        }

        for zoom in options.min_zoom..=options.max_zoom {
            let tiles = self.render_zoom(&valid, zoom)?;
            let mut written = 0u64;
            for (tile, result) in tiles {
                match result {
                    Ok(features) if features.is_empty() => {}
                    Ok(features) => {
                        sink.write_tile(tile, &features)?;
                        stats.features_written += features.len() as u64;
                        written += 1;
                    }
                    Err(err) if options.strict => return Err(err.into()),
                    Err(err) => {
                        warn!("Skipping tile {tile}: {err}");
                        stats.tiles_skipped += 1;
                    }
                }
            }
            stats.tiles_written += written;
            info!("Zoom {zoom}: {written} tiles");
        }
        sink.finish()?;

        debug!("Render stats: {stats:?}");
        Ok(stats)
    }
}

/// Post-processed features of one tile, or the error that sank it
pub type TileResult = std::result::Result<Vec<ClassifiedFeature>, GeometryError>;

fn check_coords(geometry: &Geometry<f64>) -> std::result::Result<(), GeometryError> {
    geometry
        .coords_iter()
        .try_for_each(|c| GeometryError::check_finite(c.x, c.y).map(|_| ()))
}

/// Project one feature into every tile its buffered bounds touch
fn place(
    feature: &ClassifiedFeature,
    zoom: u8,
) -> std::result::Result<Vec<(TileCoord, ClassifiedFeature)>, GeometryError> {
    tiles_covering(&feature.geometry, zoom, TILE_BUFFER)?
        .into_iter()
        .map(|tile| Ok((tile, feature.with_geometry(tile.project(&feature.geometry)?))))
        .collect()
}
