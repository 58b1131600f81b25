use anyhow::anyhow;
use proj::Transform;

use crate::heat::feature::{Boundary, FeatureCollection, FeatureGeometry};

use super::crs_utils::{epsg_code_to_authority_string, EpsgCode};

fn projection(from: EpsgCode, to: EpsgCode) -> anyhow::Result<proj::Proj> {
    proj::Proj::new_known_crs(
        &epsg_code_to_authority_string(from),
        &epsg_code_to_authority_string(to),
        None,
    )
    .map_err(|err| {
        anyhow!(
            "Could not create projection from EPSG:{} to EPSG:{}, {}",
            from,
            to,
            err
        )
    })
}

fn project_feature_geometry(
    geometry: &mut FeatureGeometry,
    projection: &proj::Proj,
) -> Result<(), proj::ProjError> {
    match geometry {
        FeatureGeometry::Polygon(polygon) => polygon.transform(projection),
        FeatureGeometry::MultiPolygon(polygons) => polygons.transform(projection),
        FeatureGeometry::LineString(line) => line.transform(projection),
    }
}

/// Project all features of the collection into `to_crs`. A collection already in `to_crs` is
/// returned untouched.
pub fn project_collection(
    mut collection: FeatureCollection,
    to_crs: EpsgCode,
) -> anyhow::Result<FeatureCollection> {
    if collection.epsg == to_crs {
        return Ok(collection);
    }
    log::info!(
        "Projecting '{}' from {} to {}",
        collection.name,
        epsg_code_to_authority_string(collection.epsg),
        epsg_code_to_authority_string(to_crs)
    );
    let projection = projection(collection.epsg, to_crs)?;
    for (index, feature) in collection.features.iter_mut().enumerate() {
        project_feature_geometry(&mut feature.geometry, &projection).map_err(|err| {
            anyhow!(
                "Could not project feature {} of '{}', {}",
                index,
                collection.name,
                err
            )
        })?;
    }
    collection.epsg = to_crs;
    Ok(collection)
}

pub fn project_boundary(mut boundary: Boundary, to_crs: EpsgCode) -> anyhow::Result<Boundary> {
    if boundary.epsg == to_crs {
        return Ok(boundary);
    }
    log::info!(
        "Projecting boundary '{}' from {} to {}",
        boundary.name,
        epsg_code_to_authority_string(boundary.epsg),
        epsg_code_to_authority_string(to_crs)
    );
    let projection = projection(boundary.epsg, to_crs)?;
    boundary
        .geometry
        .transform(&projection)
        .map_err(|err| anyhow!("Could not project boundary '{}', {}", boundary.name, err))?;
    boundary.epsg = to_crs;
    Ok(boundary)
}

#[cfg(test)]
mod tests {
    use approx::assert_abs_diff_eq;

    use super::{project_boundary, project_collection};
    use crate::{
        geofile::feature::FeatureMap,
        heat::feature::{Boundary, FeatureCollection, FeatureGeometry, GeometryKind, HeatFeature},
    };

    // EPSG 4326 coordinates in Tokyo and their UTM zone 54N (EPSG 32654) counterparts.
    const WGS84_COORDS: [(f64, f64); 3] = [
        (139.7895073, 35.6862101),
        (139.7912979, 35.6870132),
        (139.7919128, 35.6862357),
    ];
    const UTM_COORDS: [(f64, f64); 3] = [
        (390467.986, 3949820.494),
        (390631.113, 3949907.576),
        (390685.694, 3949820.653),
    ];

    // Millimeter tolerance.
    const EPSILON: f64 = 1e-3;

    #[test]
    fn test_project_collection() {
        let collection = FeatureCollection {
            name: "footways".to_string(),
            epsg: 4326,
            kind: GeometryKind::LineString,
            features: vec![HeatFeature {
                geometry: FeatureGeometry::LineString(WGS84_COORDS.to_vec().into()),
                attributes: FeatureMap::new(),
            }],
        };

        let projected = project_collection(collection, 32654).unwrap();

        assert_eq!(32654, projected.epsg);
        let line = match &projected.features[0].geometry {
            FeatureGeometry::LineString(line) => line,
            other => panic!("Expected a LineString, got {:?}", other),
        };
        for (coord, (x, y)) in line.coords().zip(UTM_COORDS) {
            assert_abs_diff_eq!(
                geo::Point::from(*coord),
                geo::Point::new(x, y),
                epsilon = EPSILON
            );
        }
    }

    #[test]
    fn test_project_boundary() {
        let boundary = Boundary {
            name: "triangle".to_string(),
            epsg: 4326,
            geometry: geo::Geometry::Polygon(geo::Polygon::new(
                WGS84_COORDS.to_vec().into(),
                vec![],
            )),
        };

        let projected = project_boundary(boundary, 32654).unwrap();

        assert_eq!(32654, projected.epsg);
        let polygon = match &projected.geometry {
            geo::Geometry::Polygon(polygon) => polygon,
            other => panic!("Expected a Polygon, got {:?}", other),
        };
        for (coord, (x, y)) in polygon.exterior().coords().zip(UTM_COORDS) {
            assert_abs_diff_eq!(
                geo::Point::from(*coord),
                geo::Point::new(x, y),
                epsilon = EPSILON
            );
        }
    }

    #[test]
    fn test_same_crs_is_untouched() {
        let polygon = geo::Polygon::new(UTM_COORDS.to_vec().into(), vec![]);
        let boundary = Boundary {
            name: "already projected".to_string(),
            epsg: 32654,
            geometry: geo::Geometry::Polygon(polygon.clone()),
        };
        let projected = project_boundary(boundary, 32654).unwrap();
        assert_eq!(geo::Geometry::Polygon(polygon), projected.geometry);
    }
}
