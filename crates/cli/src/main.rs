//! CLI for geo2mvt - Render one vector tile from a GeoJSON file
//!
//! This is a thin wrapper around the geo2mvt-core library.

use anyhow::{Context, Result};
use clap::Parser;
use geo2mvt_core::mvt::decode_layer;
use geo2mvt_core::pipeline::{decode_tile, generate_tile_from_slice};
use geo2mvt_core::{Compression, RangePolicy, TileRequest, TilerConfig};
use std::path::{Path, PathBuf};

#[derive(Parser, Debug)]
#[command(
    name = "geo2mvt",
    about = "Render a GeoJSON file into a single Mapbox Vector Tile",
    version
)]
struct Args {
    /// Input GeoJSON file (a FeatureCollection or an object of named FeatureCollections)
    #[arg(value_name = "INPUT")]
    input: PathBuf,

    /// Output tile file
    #[arg(value_name = "OUTPUT")]
    output: PathBuf,

    /// Tile column
    #[arg(short = 'x', default_value_t = 0, allow_negative_numbers = true)]
    x: i64,

    /// Tile row
    #[arg(short = 'y', default_value_t = 0, allow_negative_numbers = true)]
    y: i64,

    /// Zoom level
    #[arg(short = 'z', default_value_t = 0, allow_negative_numbers = true)]
    zoom: i64,

    /// Layer name used when the input is a single FeatureCollection
    #[arg(long, default_value = "default")]
    layer_name: String,

    /// Clip buffer in tile pixels
    #[arg(long, default_value_t = 8)]
    buffer: u32,

    /// Fail instead of writing an empty tile when x or y exceed 2^z - 1
    #[arg(long)]
    reject_out_of_range: bool,

    /// Write raw protobuf instead of gzip
    #[arg(long)]
    no_gzip: bool,

    /// Print a summary of the written tile
    #[arg(long)]
    inspect: bool,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

impl Args {
    fn config(&self) -> TilerConfig {
        let range_policy = if self.reject_out_of_range {
            RangePolicy::Reject
        } else {
            RangePolicy::Allow
        };
        let compression = if self.no_gzip {
            Compression::None
        } else {
            Compression::Gzip
        };

        TilerConfig::new()
            .with_layer_name(&self.layer_name)
            .with_buffer(self.buffer)
            .with_range_policy(range_policy)
            .with_compression(compression)
    }

    fn request(&self) -> TileRequest {
        TileRequest {
            zoom: self.zoom,
            x: self.x,
            y: self.y,
        }
    }
}

/// Print layer names, feature counts and features of an encoded tile.
fn inspect(path: &Path) -> Result<()> {
    let bytes = std::fs::read(path).with_context(|| format!("Failed to read {}", path.display()))?;
    let tile = decode_tile(&bytes).context("Failed to decode tile")?;

    for encoded in &tile.layers {
        let layer = decode_layer(encoded)
            .with_context(|| format!("Failed to decode layer {:?}", encoded.name))?;
        println!(
            "layer {:?}: {} features, extent {}",
            layer.name,
            layer.len(),
            encoded.extent.unwrap_or(4096)
        );
        for feature in &layer.features {
            let id = feature
                .id
                .map(|id| id.to_string())
                .unwrap_or_else(|| "-".to_string());
            let props: Vec<String> = feature
                .properties
                .iter()
                .map(|(k, v)| format!("{}={}", k, v.to_json()))
                .collect();
            println!(
                "  [{}] {} ({} vertices) {}",
                id,
                feature.geometry.type_name(),
                feature.geometry.coords().count(),
                props.join(" ")
            );
        }
    }
    Ok(())
}

fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logging
    let log_level = if args.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(log_level)).init();

    let input = std::fs::read(&args.input)
        .with_context(|| format!("Failed to read {}", args.input.display()))?;

    let request = args.request();
    let tile = generate_tile_from_slice(&input, request, &args.config())
        .with_context(|| format!("Failed to render tile {}/{}/{}", args.zoom, args.x, args.y))?;

    std::fs::write(&args.output, &tile)
        .with_context(|| format!("Failed to write {}", args.output.display()))?;

    log::info!("Wrote {} bytes", tile.len());
    println!(
        "✓ Converted {} to {} (tile {}/{}/{})",
        args.input.display(),
        args.output.display(),
        args.zoom,
        args.x,
        args.y
    );

    if args.inspect {
        inspect(&args.output)?;
    }

    Ok(())
}
