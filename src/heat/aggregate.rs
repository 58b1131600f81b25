use geo::{BoundingRect, Intersects};
use rstar::{
    primitives::{GeomWithData, Rectangle},
    RTree, AABB,
};

use super::{
    error::HeatError,
    feature::{AnnotatedCollection, Boundary, FeatureGeometry},
};

/// Bounding box of a feature, tagged with the feature's position in its collection.
type FeatureEnvelope = GeomWithData<Rectangle<[f64; 2]>, usize>;

/// Heat statistics over the features selected by a boundary.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum StatsResult {
    Summary(HeatSummary),
    /// No feature intersects the boundary.
    NoData,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HeatSummary {
    pub count: usize,
    pub mean: f64,
    pub min: f64,
    pub max: f64,
}

/// An annotated collection with an R-tree over feature bounding boxes, built once and queried
/// for every boundary.
pub struct IndexedCollection {
    collection: AnnotatedCollection,
    rtree: RTree<FeatureEnvelope>,
}

impl IndexedCollection {
    pub fn new(collection: AnnotatedCollection) -> Self {
        let envelopes = collection
            .features
            .iter()
            .enumerate()
            .filter_map(|(index, feature)| {
                bounding_rect(&feature.geometry).map(|rect| {
                    FeatureEnvelope::new(
                        Rectangle::from_corners(
                            [rect.min().x, rect.min().y],
                            [rect.max().x, rect.max().y],
                        ),
                        index,
                    )
                })
            })
            .collect();
        Self {
            collection,
            rtree: RTree::bulk_load(envelopes),
        }
    }

    pub fn collection(&self) -> &AnnotatedCollection {
        &self.collection
    }

    /// Indices of the features intersecting the geometry, in collection order.
    pub fn intersecting(&self, geometry: &geo::Geometry) -> Vec<usize> {
        let rect = match geometry.bounding_rect() {
            Some(rect) => rect,
            None => return Vec::new(),
        };
        let envelope =
            AABB::from_corners([rect.min().x, rect.min().y], [rect.max().x, rect.max().y]);
        let mut candidates: Vec<usize> = self
            .rtree
            .locate_in_envelope_intersecting(&envelope)
            .map(|envelope| envelope.data)
            .collect();
        // R-tree traversal order is not collection order.
        candidates.sort_unstable();
        candidates
            .into_iter()
            .filter(|index| {
                geometry_intersects(geometry, &self.collection.features[*index].geometry)
            })
            .collect()
    }
}

fn bounding_rect(geometry: &FeatureGeometry) -> Option<geo::Rect> {
    match geometry {
        FeatureGeometry::Polygon(polygon) => polygon.bounding_rect(),
        FeatureGeometry::MultiPolygon(polygons) => polygons.bounding_rect(),
        FeatureGeometry::LineString(line) => line.bounding_rect(),
    }
}

fn geometry_intersects(boundary: &geo::Geometry, geometry: &FeatureGeometry) -> bool {
    match geometry {
        FeatureGeometry::Polygon(polygon) => boundary.intersects(polygon),
        FeatureGeometry::MultiPolygon(polygons) => boundary.intersects(polygons),
        FeatureGeometry::LineString(line) => boundary.intersects(line),
    }
}

/// Mean, min and max heat index of the features intersecting the boundary. Touching counts as
/// intersecting.
pub fn stats(boundary: &Boundary, indexed: &IndexedCollection) -> Result<StatsResult, HeatError> {
    let collection = indexed.collection();
    if boundary.epsg != collection.epsg {
        return Err(HeatError::CoordinateSystemMismatch {
            dataset: boundary.name.clone(),
            expected: collection.epsg,
            found: boundary.epsg,
        });
    }
    let selected = indexed.intersecting(&boundary.geometry);
    log::debug!(
        "{} of {} features of '{}' intersect '{}'",
        selected.len(),
        collection.features.len(),
        collection.name,
        boundary.name
    );
    Ok(summarize(
        selected
            .into_iter()
            .map(|index| collection.features[index].heat_index),
    ))
}

/// Summarize values in iteration order. Returns `NoData` for an empty iterator.
pub fn summarize(values: impl IntoIterator<Item = f64>) -> StatsResult {
    let mut count = 0;
    let mut total = 0.0;
    let mut min = f64::INFINITY;
    let mut max = f64::NEG_INFINITY;
    for value in values {
        count += 1;
        total += value;
        min = min.min(value);
        max = max.max(value);
    }
    if count == 0 {
        return StatsResult::NoData;
    }
    // Rounding in the running total can push the mean past the extremes.
    let mean = (total / count as f64).clamp(min, max);
    StatsResult::Summary(HeatSummary {
        count,
        mean,
        min,
        max,
    })
}
