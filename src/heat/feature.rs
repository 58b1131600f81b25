use serde::Deserialize;

use crate::{
    crs::crs_utils::EpsgCode,
    geofile::feature::{Feature, FeatureMap},
};

use super::error::HeatError;

/// The geometry kinds a heat index can be sampled for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub enum GeometryKind {
    Polygon,
    LineString,
}

/// Geometry of a sampleable feature. Multi polygons count as polygons.
#[derive(Debug, Clone, PartialEq)]
pub enum FeatureGeometry {
    Polygon(geo::Polygon),
    MultiPolygon(geo::MultiPolygon),
    LineString(geo::LineString),
}

impl FeatureGeometry {
    pub fn kind(&self) -> GeometryKind {
        match self {
            FeatureGeometry::Polygon(_) | FeatureGeometry::MultiPolygon(_) => GeometryKind::Polygon,
            FeatureGeometry::LineString(_) => GeometryKind::LineString,
        }
    }
}

impl From<FeatureGeometry> for geo::Geometry {
    fn from(value: FeatureGeometry) -> Self {
        match value {
            FeatureGeometry::Polygon(polygon) => geo::Geometry::Polygon(polygon),
            FeatureGeometry::MultiPolygon(polygons) => geo::Geometry::MultiPolygon(polygons),
            FeatureGeometry::LineString(line) => geo::Geometry::LineString(line),
        }
    }
}

impl TryFrom<geo::Geometry> for FeatureGeometry {
    /// The geometry is handed back when it cannot be sampled.
    type Error = geo::Geometry;

    fn try_from(value: geo::Geometry) -> Result<Self, Self::Error> {
        match value {
            geo::Geometry::Polygon(polygon) => Ok(FeatureGeometry::Polygon(polygon)),
            geo::Geometry::MultiPolygon(polygons) => Ok(FeatureGeometry::MultiPolygon(polygons)),
            geo::Geometry::LineString(line) => Ok(FeatureGeometry::LineString(line)),
            other => Err(other),
        }
    }
}

pub fn geometry_type_name(geometry: &geo::Geometry) -> &'static str {
    match geometry {
        geo::Geometry::Point(_) => "Point",
        geo::Geometry::Line(_) => "Line",
        geo::Geometry::LineString(_) => "LineString",
        geo::Geometry::Polygon(_) => "Polygon",
        geo::Geometry::MultiPoint(_) => "MultiPoint",
        geo::Geometry::MultiLineString(_) => "MultiLineString",
        geo::Geometry::MultiPolygon(_) => "MultiPolygon",
        geo::Geometry::GeometryCollection(_) => "GeometryCollection",
        geo::Geometry::Rect(_) => "Rect",
        geo::Geometry::Triangle(_) => "Triangle",
    }
}

#[derive(Debug, Clone)]
pub struct HeatFeature {
    pub geometry: FeatureGeometry,
    pub attributes: FeatureMap,
}

/// Named, homogeneous set of features in a single CRS.
#[derive(Debug, Clone)]
pub struct FeatureCollection {
    pub name: String,
    pub epsg: EpsgCode,
    pub kind: GeometryKind,
    pub features: Vec<HeatFeature>,
}

impl FeatureCollection {
    /// Build a collection from features read from a geofile.
    ///
    /// Every geometry must be of the same `GeometryKind`. If `declared_kind` is given, it is
    /// enforced, otherwise the kind of the first feature is used. Empty collections default to
    /// polygons when no kind is declared.
    pub fn from_features(
        name: &str,
        epsg: EpsgCode,
        features: Vec<Feature>,
        declared_kind: Option<GeometryKind>,
    ) -> Result<Self, HeatError> {
        let mut kind = declared_kind;
        let mut heat_features = Vec::with_capacity(features.len());
        for (index, feature) in features.into_iter().enumerate() {
            let geometry = FeatureGeometry::try_from(feature.geometry).map_err(|geometry| {
                HeatError::UnsupportedGeometry {
                    collection: name.to_string(),
                    feature: index,
                    geometry_type: geometry_type_name(&geometry).to_string(),
                }
            })?;
            let expected = *kind.get_or_insert(geometry.kind());
            if geometry.kind() != expected {
                return Err(HeatError::MixedGeometryKinds {
                    collection: name.to_string(),
                    feature: index,
                    expected,
                    found: geometry.kind(),
                });
            }
            heat_features.push(HeatFeature {
                geometry,
                attributes: feature.attributes.unwrap_or_default(),
            });
        }
        Ok(Self {
            name: name.to_string(),
            epsg,
            kind: kind.unwrap_or(GeometryKind::Polygon),
            features: heat_features,
        })
    }
}

/// Query geometry used to select features by intersection.
#[derive(Debug, Clone)]
pub struct Boundary {
    pub name: String,
    pub epsg: EpsgCode,
    pub geometry: geo::Geometry,
}

#[derive(Debug, Clone)]
pub struct AnnotatedFeature {
    pub geometry: FeatureGeometry,
    pub attributes: FeatureMap,
    pub heat_index: f64,
}

/// A `FeatureCollection` after every feature has been assigned a heat index.
#[derive(Debug, Clone)]
pub struct AnnotatedCollection {
    pub name: String,
    pub epsg: EpsgCode,
    pub kind: GeometryKind,
    pub features: Vec<AnnotatedFeature>,
}
