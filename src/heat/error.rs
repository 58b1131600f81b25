use thiserror::Error;

use crate::crs::crs_utils::EpsgCode;

use super::feature::GeometryKind;

/// Failure to derive a heat index for a single geometry.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum SampleError {
    #[error("geometry has no vertices to sample")]
    EmptyGeometry,

    /// `row` and `col` are the fractional grid position of the coordinate.
    #[error("coordinate ({x}, {y}) maps to grid position (row {row}, col {col}) outside the raster")]
    OutOfBounds { x: f64, y: f64, row: f64, col: f64 },

    #[error("coordinate ({x}, {y}) maps to cell (row {row}, col {col}) which holds the nodata value")]
    NoDataCell { x: f64, y: f64, row: usize, col: usize },
}

#[derive(Debug, Error)]
pub enum HeatError {
    #[error("georeferencing transform {transform:?} is not invertible")]
    Georeferencing { transform: [f64; 6] },

    #[error("invalid raster: {reason}")]
    InvalidRaster { reason: String },

    #[error("CRS mismatch for '{dataset}': expected EPSG:{expected}, found EPSG:{found}")]
    CoordinateSystemMismatch {
        dataset: String,
        expected: EpsgCode,
        found: EpsgCode,
    },

    #[error("feature {feature} of '{collection}' has unsupported geometry type {geometry_type}")]
    UnsupportedGeometry {
        collection: String,
        feature: usize,
        geometry_type: String,
    },

    #[error("feature {feature} of '{collection}' is a {found:?}, but the collection holds {expected:?}s")]
    MixedGeometryKinds {
        collection: String,
        feature: usize,
        expected: GeometryKind,
        found: GeometryKind,
    },

    #[error("could not sample feature {feature} of '{collection}'")]
    Sampling {
        collection: String,
        feature: usize,
        #[source]
        source: SampleError,
    },
}
