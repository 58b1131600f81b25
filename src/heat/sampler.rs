use geo::Centroid;

use super::{error::SampleError, feature::FeatureGeometry, grid::RasterGrid};

/// Derive the heat index of a geometry from the raster.
///
/// Polygons are sampled at their area weighted centroid. Line strings are sampled at every
/// vertex and the samples are averaged, so denser digitized lines get denser sampling.
pub fn sample(geometry: &FeatureGeometry, grid: &RasterGrid) -> Result<f64, SampleError> {
    match geometry {
        FeatureGeometry::Polygon(polygon) => {
            let centroid = polygon.centroid().ok_or(SampleError::EmptyGeometry)?;
            grid.value_at(centroid.into())
        }
        FeatureGeometry::MultiPolygon(polygons) => {
            let centroid = polygons.centroid().ok_or(SampleError::EmptyGeometry)?;
            grid.value_at(centroid.into())
        }
        FeatureGeometry::LineString(line) => sample_vertices(line, grid),
    }
}

fn sample_vertices(line: &geo::LineString, grid: &RasterGrid) -> Result<f64, SampleError> {
    if line.0.is_empty() {
        return Err(SampleError::EmptyGeometry);
    }
    let mut total = 0.0;
    for coord in line.coords() {
        total += grid.value_at(*coord)?;
    }
    Ok(total / line.0.len() as f64)
}
