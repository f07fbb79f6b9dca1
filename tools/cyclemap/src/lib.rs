//! # cyclemap
//!
//! Cycling map layers for OpenStreetMap vector tiles: bicycle route
//! relations, cycling infrastructure lines and cycling points of interest,
//! merged and simplified per tile.

pub mod cli;
pub mod config;
pub mod feature;
pub mod ingest;
pub mod layers;
pub mod merge;
pub mod output;
pub mod pipeline;
pub mod relations;
pub mod tags;
pub mod tile;

pub use config::LayerConfig;
pub use cyclemap_common::{Error, GeometryError, Result};
pub use feature::{Attrs, ClassifiedFeature, ElementKind, SourceFeature};
pub use layers::{
    CyclingInfraLayer, CyclingMergePostProcessor, CyclingPoiLayer, FeaturePostProcessor,
    FeatureProcessor, RelationPreprocessor,
};
pub use merge::{merge_line_strings, MergeParams};
pub use output::{MemoryTileSink, NdjsonTileWriter, TileSink};
pub use pipeline::{Pipeline, RenderOptions, RenderStats};
pub use relations::{RelationInfo, RouteRelationExtractor, RouteRelationIndex, RouteRelationIndexBuilder};
pub use tags::Tags;
pub use tile::TileCoord;
