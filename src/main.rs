extern crate log;
pub mod crs;
pub mod geofile;
pub mod heat;
use crate::crs::crs_utils::{spatial_ref_from_epsg, spatial_ref_to_epsg, EpsgCode};
use crate::crs::reproject::{project_boundary, project_collection};
use crate::geofile::feature::Feature;
use crate::geofile::gdal_geofile::{
    layer_type_for_kind, read_features_from_geofile, write_features_to_geofile, GdalDriverType,
};
use crate::geofile::raster::read_raster_from_geofile;
use crate::heat::aggregate::IndexedCollection;
use crate::heat::annotate::annotate;
use crate::heat::error::HeatError;
use crate::heat::feature::{Boundary, FeatureCollection, GeometryKind};
use crate::heat::report::{build_report, slug, AreaReport};
use anyhow::{anyhow, Context};
use clap::Parser;
use serde::Deserialize;
use std::collections::{HashMap, HashSet};
use std::path::PathBuf;
use std::{fs::read_to_string, path::Path};

/// Compute heat exposure statistics of buildings and footways within areas of interest.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to the input config file.
    #[arg(short, long)]
    config_filepath: String,
}

const WGS84_EPSG: EpsgCode = 4326;

#[derive(Deserialize, Debug)]
struct CollectionConfig {
    name: String,
    path: PathBuf,
    kind: Option<GeometryKind>,
}

#[derive(Deserialize, Debug)]
struct BoundaryConfig {
    name: String,
    path: PathBuf,
    #[serde(default)]
    feature_index: usize,
}

#[derive(Deserialize, Debug)]
struct Config {
    raster_path: PathBuf,
    /// CRS all datasets are aligned to. Defaults to the CRS of the raster.
    target_epsg: Option<EpsgCode>,
    collections: Vec<CollectionConfig>,
    boundaries: Vec<BoundaryConfig>,
    output_dir: Option<PathBuf>,
}

fn load_collection(
    collection_config: &CollectionConfig,
    target_epsg: EpsgCode,
) -> anyhow::Result<FeatureCollection> {
    log::info!(
        "Reading '{}' from {:?}",
        collection_config.name,
        collection_config.path
    );
    let (features, spatial_ref) = read_features_from_geofile(&collection_config.path)?;
    let collection = FeatureCollection::from_features(
        &collection_config.name,
        spatial_ref_to_epsg(&spatial_ref)?,
        features,
        collection_config.kind,
    )?;
    log::info!(
        "Read {} {:?} features",
        collection.features.len(),
        collection.kind
    );
    project_collection(collection, target_epsg)
}

fn load_boundary(
    boundary_config: &BoundaryConfig,
    target_epsg: EpsgCode,
) -> anyhow::Result<Boundary> {
    log::info!(
        "Reading boundary '{}' from {:?}",
        boundary_config.name,
        boundary_config.path
    );
    let (features, spatial_ref) = read_features_from_geofile(&boundary_config.path)?;
    if features.len() > 1 {
        log::warn!(
            "Boundary file {:?} holds {} features, using feature {}",
            boundary_config.path,
            features.len(),
            boundary_config.feature_index
        );
    }
    let num_features = features.len();
    let feature = features
        .into_iter()
        .nth(boundary_config.feature_index)
        .ok_or_else(|| {
            anyhow!(
                "Boundary file {:?} has no feature {} ({} features)",
                boundary_config.path,
                boundary_config.feature_index,
                num_features
            )
        })?;
    let boundary = Boundary {
        name: boundary_config.name.clone(),
        epsg: spatial_ref_to_epsg(&spatial_ref)?,
        geometry: feature.geometry,
    };
    project_boundary(boundary, target_epsg)
}

/// Annotate every collection once, then evaluate every boundary against every collection.
fn run(config: &Config) -> anyhow::Result<AreaReport> {
    log::info!("Reading raster {:?}", config.raster_path);
    let grid = read_raster_from_geofile(&config.raster_path)?;
    log::info!(
        "Read {}x{} raster in EPSG:{}, transform {:?}, nodata {:?}",
        grid.rows(),
        grid.cols(),
        grid.epsg(),
        grid.transform().0,
        grid.nodata()
    );
    let target_epsg = config.target_epsg.unwrap_or(grid.epsg());
    if grid.epsg() != target_epsg {
        return Err(HeatError::CoordinateSystemMismatch {
            dataset: config.raster_path.display().to_string(),
            expected: target_epsg,
            found: grid.epsg(),
        })
        .context("Rasters are not reprojected, the raster must already be in the target CRS");
    }

    let mut indexed_collections = Vec::with_capacity(config.collections.len());
    for collection_config in &config.collections {
        let collection = load_collection(collection_config, target_epsg)?;
        let annotated = annotate(collection, &grid)?;
        log::info!(
            "Annotated {} {:?} features of '{}'",
            annotated.features.len(),
            annotated.kind,
            annotated.name
        );
        indexed_collections.push(IndexedCollection::new(annotated));
    }

    let boundaries = config
        .boundaries
        .iter()
        .map(|boundary_config| load_boundary(boundary_config, target_epsg))
        .collect::<anyhow::Result<Vec<Boundary>>>()?;

    let report = build_report(&boundaries, &indexed_collections)?;

    if let Some(output_dir) = &config.output_dir {
        std::fs::create_dir_all(output_dir)
            .with_context(|| format!("Creating output directory {:?}", output_dir))?;
        let spatial_ref = spatial_ref_from_epsg(target_epsg)?;
        for indexed in &indexed_collections {
            let collection = indexed.collection();
            let features: Vec<Feature> = collection.features.iter().map(Feature::from).collect();
            write_features_to_geofile(
                &features,
                &output_dir.join(format!("{}_heat.gpkg", slug(&collection.name))),
                &spatial_ref,
                GdalDriverType::GeoPackage.name(),
                layer_type_for_kind(collection.kind),
            )?;
        }
        // GeoJSON readers expect WGS 84 coordinates.
        let wgs84_boundaries = boundaries
            .iter()
            .map(|boundary| project_boundary(boundary.clone(), WGS84_EPSG))
            .collect::<anyhow::Result<Vec<Boundary>>>()?;
        let stats_filepath = output_dir.join("area_stats.geojson");
        log::info!("Writing area statistics to {:?}", stats_filepath);
        geofile::geojson::write_area_stats_to_geojson(&wgs84_boundaries, &report, &stats_filepath)
            .with_context(|| format!("Writing {:?}", stats_filepath))?;
    }
    Ok(report)
}

fn read_config(config_filepath: &str) -> anyhow::Result<Config> {
    if !Path::new(config_filepath).exists() {
        return Err(anyhow!("Config file {} not found", config_filepath));
    }
    let config_contents = read_to_string(config_filepath)?;
    let config: Config = serde_yaml::from_str(&config_contents)
        .with_context(|| format!("Parsing config file {}", config_filepath))?;
    validate_config(&config).with_context(|| format!("Invalid config file {}", config_filepath))?;
    Ok(config)
}

/// Boundary names and collection slugs name report rows, output files and GeoJSON properties,
/// so they must be unique.
fn validate_config(config: &Config) -> anyhow::Result<()> {
    let mut boundary_names = HashSet::new();
    for boundary_config in &config.boundaries {
        if !boundary_names.insert(boundary_config.name.as_str()) {
            return Err(anyhow!(
                "Boundary name '{}' is used more than once",
                boundary_config.name
            ));
        }
    }
    let mut collection_slugs: HashMap<String, &str> = HashMap::new();
    for collection_config in &config.collections {
        let collection_slug = slug(&collection_config.name);
        if collection_slug.is_empty() {
            return Err(anyhow!(
                "Collection name '{}' has no letters or digits",
                collection_config.name
            ));
        }
        if let Some(other) = collection_slugs.insert(collection_slug, &collection_config.name) {
            return Err(anyhow!(
                "Collection names '{}' and '{}' both map to the output name '{}'",
                other,
                collection_config.name,
                slug(&collection_config.name)
            ));
        }
    }
    Ok(())
}

fn try_main() -> anyhow::Result<()> {
    let args = Args::try_parse()?;
    let config = read_config(&args.config_filepath)?;
    let report = run(&config)?;
    print!("{}", report);
    Ok(())
}

fn main() {
    if std::env::var("RUST_LOG").is_err() {
        std::env::set_var("RUST_LOG", "info")
    }
    env_logger::init();
    if let Err(e) = try_main() {
        eprintln!("Error: {:?}", e);
        std::process::exit(1)
    }
}
