use crate::crs::crs_utils::EpsgCode;

use super::error::{HeatError, SampleError};

/// Affine georeferencing transform in GDAL coefficient order:
/// `x = c0 + col * c1 + row * c2`, `y = c3 + col * c4 + row * c5`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GeoTransform(pub [f64; 6]);

/// Integer address of a raster cell. May lie outside the raster.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CellIndex {
    pub row: i64,
    pub col: i64,
}

/// Maps world coordinates to grid positions using the inverse of a `GeoTransform`.
#[derive(Debug, Clone, Copy)]
pub struct GridIndexer {
    origin: geo::Coord,
    // Inverse of the 2x2 linear part, rows map to (col, row).
    inverse: [[f64; 2]; 2],
}

impl GridIndexer {
    pub fn new(transform: &GeoTransform) -> Result<Self, HeatError> {
        let [c0, c1, c2, c3, c4, c5] = transform.0;
        let determinant = c1 * c5 - c2 * c4;
        if determinant == 0.0 || !determinant.is_finite() {
            return Err(HeatError::Georeferencing {
                transform: transform.0,
            });
        }
        Ok(Self {
            origin: geo::Coord { x: c0, y: c3 },
            inverse: [
                [c5 / determinant, -c2 / determinant],
                [-c4 / determinant, c1 / determinant],
            ],
        })
    }

    /// Fractional (row, col) position of a world coordinate.
    pub fn position(&self, coord: geo::Coord) -> (f64, f64) {
        let dx = coord.x - self.origin.x;
        let dy = coord.y - self.origin.y;
        let col = self.inverse[0][0] * dx + self.inverse[0][1] * dy;
        let row = self.inverse[1][0] * dx + self.inverse[1][1] * dy;
        (row, col)
    }

    /// Cell containing a world coordinate. Out of extent coordinates are not rejected. The cell of a
    /// non-finite coordinate is meaningless, use `position` to inspect those.
    pub fn index(&self, coord: geo::Coord) -> CellIndex {
        let (row, col) = self.position(coord);
        CellIndex {
            row: row.floor() as i64,
            col: col.floor() as i64,
        }
    }
}

/// Single band raster held in memory, row-major, together with its georeferencing.
///
/// Cells are half-open, except along the far edges of the raster: a position exactly on the
/// last row or column boundary belongs to the last cell. The whole declared extent is thus
/// sampleable.
#[derive(Debug, Clone)]
pub struct RasterGrid {
    values: Vec<f64>,
    rows: usize,
    cols: usize,
    transform: GeoTransform,
    indexer: GridIndexer,
    epsg: EpsgCode,
    nodata: Option<f64>,
}

impl RasterGrid {
    pub fn new(
        values: Vec<f64>,
        rows: usize,
        cols: usize,
        transform: GeoTransform,
        epsg: EpsgCode,
        nodata: Option<f64>,
    ) -> Result<Self, HeatError> {
        if rows == 0 || cols == 0 {
            return Err(HeatError::InvalidRaster {
                reason: format!("raster has no cells ({} rows, {} cols)", rows, cols),
            });
        }
        if values.len() != rows * cols {
            return Err(HeatError::InvalidRaster {
                reason: format!(
                    "expected {} values for {} rows and {} cols, got {}",
                    rows * cols,
                    rows,
                    cols,
                    values.len()
                ),
            });
        }
        let indexer = GridIndexer::new(&transform)?;
        Ok(Self {
            values,
            rows,
            cols,
            transform,
            indexer,
            epsg,
            nodata,
        })
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    pub fn transform(&self) -> &GeoTransform {
        &self.transform
    }

    pub fn epsg(&self) -> EpsgCode {
        self.epsg
    }

    pub fn nodata(&self) -> Option<f64> {
        self.nodata
    }

    /// Value stored at (row, col), if the cell exists.
    pub fn get(&self, row: usize, col: usize) -> Option<f64> {
        if row >= self.rows || col >= self.cols {
            return None;
        }
        self.values.get(row * self.cols + col).copied()
    }

    /// Value of the cell containing a world coordinate.
    pub fn value_at(&self, coord: geo::Coord) -> Result<f64, SampleError> {
        let (row, col) = self.indexer.position(coord);
        let cell = match (
            clamp_to_extent(row, self.rows),
            clamp_to_extent(col, self.cols),
        ) {
            (Some(row), Some(col)) => self.get(row, col).map(|value| (row, col, value)),
            _ => None,
        };
        let (row, col, value) = cell.ok_or(SampleError::OutOfBounds {
            x: coord.x,
            y: coord.y,
            row,
            col,
        })?;
        if self.is_nodata(value) {
            return Err(SampleError::NoDataCell {
                x: coord.x,
                y: coord.y,
                row,
                col,
            });
        }
        Ok(value)
    }

    /// NaN cells are treated as nodata whether or not the raster declares a nodata value.
    fn is_nodata(&self, value: f64) -> bool {
        value.is_nan() || self.nodata == Some(value)
    }
}

/// Cell index along one axis for a fractional position, with the far edge closed.
fn clamp_to_extent(position: f64, len: usize) -> Option<usize> {
    if position >= 0.0 && position <= len as f64 {
        Some((position.floor() as usize).min(len - 1))
    } else {
        None
    }
}
