use anyhow::{anyhow, Context};
use std::path::Path;

use crate::{
    crs::crs_utils::spatial_ref_to_epsg,
    heat::grid::{GeoTransform, RasterGrid},
};

/// Read the first band of a raster file into memory.
pub fn read_raster_from_geofile(filepath: &Path) -> anyhow::Result<RasterGrid> {
    gdal::DriverManager::register_all();
    let dataset = gdal::Dataset::open(filepath)
        .with_context(|| format!("Opening raster file {:?}", filepath))?;

    let band_count = dataset.raster_count();
    if band_count == 0 {
        return Err(anyhow!("Raster file {:?} has no bands", filepath));
    }
    if band_count > 1 {
        log::warn!(
            "Raster file {:?} has {} bands, only the first one is used",
            filepath,
            band_count
        );
    }

    let spatial_ref = dataset
        .spatial_ref()
        .with_context(|| format!("Reading spatial reference of {:?}", filepath))?;
    let epsg = spatial_ref_to_epsg(&spatial_ref)?;
    let transform = dataset
        .geo_transform()
        .with_context(|| format!("Reading georeferencing of {:?}", filepath))?;

    let (cols, rows) = dataset.raster_size();
    log::debug!(
        "Raster {:?}: {} rows, {} cols, EPSG:{}, transform {:?}",
        filepath,
        rows,
        cols,
        epsg,
        transform
    );
    let band = dataset.rasterband(1)?;
    let nodata = band.no_data_value();
    let buffer = band.read_as::<f64>((0, 0), (cols, rows), (cols, rows), None)?;

    Ok(RasterGrid::new(
        buffer.data,
        rows,
        cols,
        GeoTransform(transform),
        epsg,
        nodata,
    )?)
}
