use anyhow::{anyhow, Context};
use gdal::vector::LayerAccess;
use indicatif::ProgressBar;
use rayon::prelude::*;
use std::{collections::HashMap, path::Path};

use super::feature::{AttributeValue, Feature, FeatureMap};
use crate::heat::feature::GeometryKind;

pub enum GdalDriverType {
    GeoPackage,
}

impl GdalDriverType {
    pub fn name(&self) -> &'static str {
        match self {
            GdalDriverType::GeoPackage => "GPKG",
        }
    }
}

fn layer_geometry_type(
    geometry: &geo::Geometry,
) -> anyhow::Result<gdal::vector::OGRwkbGeometryType::Type> {
    use gdal::vector::OGRwkbGeometryType::*;
    match geometry {
        geo::Geometry::Point(_) => Ok(wkbPoint),
        geo::Geometry::LineString(_) => Ok(wkbLineString),
        geo::Geometry::Polygon(_) => Ok(wkbPolygon),
        geo::Geometry::MultiPoint(_) => Ok(wkbMultiPoint),
        geo::Geometry::MultiLineString(_) => Ok(wkbMultiLineString),
        geo::Geometry::MultiPolygon(_) => Ok(wkbMultiPolygon),
        _ => Err(anyhow!("Cannot write geometry type {:?} to file.", geometry)),
    }
}

/// Layer type of an empty collection of the given kind.
pub fn layer_type_for_kind(kind: GeometryKind) -> gdal::vector::OGRwkbGeometryType::Type {
    match kind {
        GeometryKind::Polygon => gdal::vector::OGRwkbGeometryType::wkbPolygon,
        GeometryKind::LineString => gdal::vector::OGRwkbGeometryType::wkbLineString,
    }
}

/// Turn the result code of an OGR transaction call into an error naming the output file.
fn check_transaction(
    result: gdal_sys::OGRErr::Type,
    action: &str,
    output_filepath: &Path,
) -> anyhow::Result<()> {
    if result == gdal_sys::OGRErr::OGRERR_NONE {
        Ok(())
    } else {
        Err(anyhow!(
            "Could not {} transaction writing {:?}, OGR error {}",
            action,
            output_filepath,
            result
        ))
    }
}

/// Write features to a new single-layer file, replacing any existing file.
///
/// The layer type is derived from the features. `empty_layer_type` is used when there are none,
/// so that an empty file with a proper layer is still written.
pub fn write_features_to_geofile(
    features: &[Feature],
    output_filepath: &Path,
    crs: &gdal::spatial_ref::SpatialRef,
    driver: &str,
    empty_layer_type: gdal::vector::OGRwkbGeometryType::Type,
) -> anyhow::Result<()> {
    let driver = gdal::DriverManager::get_driver_by_name(driver).context("Getting GDAL driver")?;

    // Mixed layers, e.g. polygons and multi polygons, are written as a generic geometry layer.
    let layer_type = match features.split_first() {
        Some((first, rest)) => {
            let mut layer_type = layer_geometry_type(&first.geometry)?;
            for feature in rest {
                if layer_geometry_type(&feature.geometry)? != layer_type {
                    layer_type = gdal::vector::OGRwkbGeometryType::wkbUnknown;
                }
            }
            layer_type
        }
        None => empty_layer_type,
    };

    let crs_name = crs.name()?;
    log::debug!("Using spatial ref {} for writing geofile", crs_name);

    let mut dataset = driver.create_vector_only(output_filepath)?;
    let layer_name = output_filepath
        .file_stem()
        .and_then(|stem| stem.to_str())
        .unwrap_or("features");
    let layer_options = gdal::LayerOptions {
        name: layer_name,
        srs: Some(crs),
        ty: layer_type,
        options: None,
    };

    let mut layer = dataset.create_layer(layer_options)?;

    // Create the fields based on all attributes of all features.
    log::info!("Setting up fields");
    let field_types = get_field_types(features);
    let mut field_definitions: Vec<(&str, gdal::vector::OGRFieldType::Type)> = field_types
        .iter()
        .map(|(field_name, field_type)| (field_name.as_str(), *field_type))
        .collect();
    field_definitions.sort_by(|a, b| a.0.cmp(b.0));
    layer.create_defn_fields(&field_definitions)?;

    log::info!(
        "Writing {} features to {:?}",
        features.len(),
        output_filepath
    );
    // Start a transaction in case the driver supports transactions, e.g. GeoPackage.
    // Committing all features once as opposed to per-feature is a massive speedup for these drivers.
    let started = unsafe { gdal_sys::OGR_L_StartTransaction(layer.c_layer()) };
    let in_transaction = match check_transaction(started, "start", output_filepath) {
        Ok(()) => true,
        Err(err) => {
            log::debug!("{:#}, writing without a transaction", err);
            false
        }
    };
    let bar = ProgressBar::new(features.len() as u64);
    for feature in features {
        let wkb = wkb::geom_to_wkb(&feature.geometry)
            .map_err(|err| anyhow!("Could not write geometry to WKB, {:?}", err))?;
        let geometry = gdal::vector::Geometry::from_wkb(&wkb)?;

        match &feature.attributes {
            Some(attributes) => {
                let mut field_names = Vec::new();
                let mut values = Vec::new();
                for (key, value) in attributes {
                    field_names.push(key.as_str());
                    values.push(to_field_value(value, field_types[key]));
                }
                layer.create_feature_fields(geometry, &field_names, &values)?;
            }
            None => layer.create_feature(geometry)?,
        }

        bar.inc(1);
    }
    bar.finish_and_clear();
    if in_transaction {
        let committed = unsafe { gdal_sys::OGR_L_CommitTransaction(layer.c_layer()) };
        check_transaction(committed, "commit", output_filepath)?;
    }
    Ok(())
}

/// Field type of every attribute key. A key keeps a numeric type only if all of its values have
/// it, integers mixed with reals become real and anything else becomes a string.
fn get_field_types(features: &[Feature]) -> HashMap<String, gdal::vector::OGRFieldType::Type> {
    features
        .par_iter()
        .filter_map(|feature| feature.attributes.as_ref())
        .flat_map_iter(|attributes| {
            attributes.iter().map(|(key, value)| {
                let field_type = match value {
                    AttributeValue::Integer(_) => gdal::vector::OGRFieldType::OFTInteger64,
                    AttributeValue::Real(_) => gdal::vector::OGRFieldType::OFTReal,
                    AttributeValue::Text(_) => gdal::vector::OGRFieldType::OFTString,
                };
                (key.clone(), field_type)
            })
        })
        .fold(HashMap::new, |mut field_types, (key, field_type)| {
            merge_field_type(&mut field_types, key, field_type);
            field_types
        })
        .reduce(HashMap::new, |mut field_types, other| {
            for (key, field_type) in other {
                merge_field_type(&mut field_types, key, field_type);
            }
            field_types
        })
}

fn merge_field_type(
    field_types: &mut HashMap<String, gdal::vector::OGRFieldType::Type>,
    key: String,
    field_type: gdal::vector::OGRFieldType::Type,
) {
    use gdal::vector::OGRFieldType::*;
    let entry = field_types.entry(key).or_insert(field_type);
    *entry = match (*entry, field_type) {
        (current, new) if current == new => current,
        (OFTInteger64, OFTReal) | (OFTReal, OFTInteger64) => OFTReal,
        _ => OFTString,
    };
}

fn to_field_value(
    value: &AttributeValue,
    field_type: gdal::vector::OGRFieldType::Type,
) -> gdal::vector::FieldValue {
    use gdal::vector::{FieldValue, OGRFieldType};
    match value {
        AttributeValue::Integer(integer) if field_type == OGRFieldType::OFTInteger64 => {
            FieldValue::Integer64Value(*integer)
        }
        AttributeValue::Integer(integer) if field_type == OGRFieldType::OFTReal => {
            FieldValue::RealValue(*integer as f64)
        }
        AttributeValue::Real(real) if field_type == OGRFieldType::OFTReal => {
            FieldValue::RealValue(*real)
        }
        AttributeValue::Integer(integer) => FieldValue::StringValue(integer.to_string()),
        AttributeValue::Real(real) => FieldValue::StringValue(real.to_string()),
        AttributeValue::Text(text) => FieldValue::StringValue(text.to_owned()),
    }
}

fn from_field_value(value: gdal::vector::FieldValue) -> Option<AttributeValue> {
    use gdal::vector::FieldValue::*;
    match value {
        IntegerValue(integer) => Some(AttributeValue::Integer(i64::from(integer))),
        Integer64Value(integer) => Some(AttributeValue::Integer(integer)),
        RealValue(real) => Some(AttributeValue::Real(real)),
        other => other.into_string().map(AttributeValue::Text),
    }
}

/// Read all features of a single-layer vector file together with the layer's spatial reference.
pub fn read_features_from_geofile(
    filepath: &Path,
) -> anyhow::Result<(Vec<Feature>, gdal::spatial_ref::SpatialRef)> {
    gdal::DriverManager::register_all();
    let open_options = gdal::DatasetOptions {
        open_flags: gdal::GdalOpenFlags::GDAL_OF_VECTOR,
        ..Default::default()
    };
    let dataset = gdal::Dataset::open_ex(filepath, open_options)
        .with_context(|| format!("Opening vector file {:?}", filepath))?;

    let layer_count = dataset.layer_count();
    if 0 == layer_count || 1 < layer_count {
        return Err(anyhow!(
            "Found {} layers, only one layer is supported.",
            layer_count
        ));
    }
    let mut layer = dataset.layer(0)?;
    let spatial_ref = layer
        .spatial_ref()
        .map_err(|_| anyhow!("Layer in {:?} has no spatial reference", filepath))?;
    log::debug!("Read spatial ref {} from {:?}", spatial_ref.name()?, filepath);

    let mut features = Vec::new();
    for (index, gdal_feature) in layer.features().enumerate() {
        let wkb = gdal_feature
            .geometry()
            .wkb()
            .with_context(|| format!("Reading geometry of feature {}", index))?;
        let geometry = wkb::wkb_to_geom(&mut wkb.as_slice())
            .map_err(|err| anyhow!("Could not read geometry of feature {}, {:?}", index, err))?;
        let attributes: FeatureMap = gdal_feature
            .fields()
            .filter_map(|(name, value)| Some((name, from_field_value(value?)?)))
            .collect();
        features.push(Feature {
            geometry,
            attributes: Some(attributes),
        });
    }
    Ok((features, spatial_ref))
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use rstest::rstest;
    use testdir::testdir;

    use crate::geofile::{
        feature::{AttributeValue, Feature},
        gdal_geofile::{
            check_transaction, layer_type_for_kind, read_features_from_geofile,
            write_features_to_geofile, GdalDriverType,
        },
    };
    use crate::heat::feature::GeometryKind;

    #[rstest]
    fn test_geofile_write_read_round_trip() {
        let features = vec![
            Feature {
                geometry: geo::Geometry::LineString(
                    vec![(-81.51, 41.07), (-81.50, 41.08)].into(),
                ),
                attributes: Some(HashMap::from([
                    (
                        "highway".to_string(),
                        AttributeValue::Text("footway".to_string()),
                    ),
                    ("heat_index".to_string(), AttributeValue::Real(31.5)),
                    ("osm_id".to_string(), AttributeValue::Integer(9_007_199_254_740_993)),
                    ("lanes".to_string(), AttributeValue::Integer(2)),
                ])),
            },
            Feature {
                geometry: geo::Geometry::LineString(
                    vec![(-81.52, 41.06), (-81.51, 41.07), (-81.50, 41.07)].into(),
                ),
                attributes: Some(HashMap::from([
                    ("heat_index".to_string(), AttributeValue::Real(28.25)),
                    ("osm_id".to_string(), AttributeValue::Integer(-12)),
                    ("lanes".to_string(), AttributeValue::Real(1.5)),
                ])),
            },
        ];

        let test_dir = testdir!();
        let geofile_filepath = test_dir.join("output.gpkg");

        let spatial_ref = gdal::spatial_ref::SpatialRef::from_epsg(4326).unwrap();

        write_features_to_geofile(
            &features,
            &geofile_filepath,
            &spatial_ref,
            GdalDriverType::GeoPackage.name(),
            layer_type_for_kind(GeometryKind::LineString),
        )
        .unwrap();
        let (read_features, read_spatial_ref) =
            read_features_from_geofile(&geofile_filepath).unwrap();

        assert_eq!(4326, read_spatial_ref.auth_code().unwrap());
        assert_eq!(features.len(), read_features.len());
        for (expected, actual) in features.iter().zip(read_features.iter()) {
            assert_eq!(expected.geometry, actual.geometry);
            let actual_attributes = actual.attributes.as_ref().unwrap();
            assert_eq!(
                expected.attributes.as_ref().unwrap().get("osm_id"),
                actual_attributes.get("osm_id")
            );
            assert_eq!(
                expected.attributes.as_ref().unwrap().get("heat_index"),
                actual_attributes.get("heat_index")
            );
        }
        // Integers sharing a field with reals are widened.
        assert_eq!(
            Some(&AttributeValue::Real(2.0)),
            read_features[0].attributes.as_ref().unwrap().get("lanes")
        );
    }

    #[rstest]
    #[case(GeometryKind::Polygon)]
    #[case(GeometryKind::LineString)]
    fn test_write_empty_collection(#[case] kind: GeometryKind) {
        let geofile_filepath = testdir!().join("empty.gpkg");
        let spatial_ref = gdal::spatial_ref::SpatialRef::from_epsg(32617).unwrap();

        write_features_to_geofile(
            &[],
            &geofile_filepath,
            &spatial_ref,
            GdalDriverType::GeoPackage.name(),
            layer_type_for_kind(kind),
        )
        .unwrap();
        let (read_features, read_spatial_ref) =
            read_features_from_geofile(&geofile_filepath).unwrap();

        assert!(read_features.is_empty());
        assert_eq!(32617, read_spatial_ref.auth_code().unwrap());
    }

    #[test]
    fn test_write_replaces_existing_file() {
        let geofile_filepath = testdir!().join("replaced.gpkg");
        let spatial_ref = gdal::spatial_ref::SpatialRef::from_epsg(32617).unwrap();
        let write = |features: &[Feature]| {
            write_features_to_geofile(
                features,
                &geofile_filepath,
                &spatial_ref,
                GdalDriverType::GeoPackage.name(),
                layer_type_for_kind(GeometryKind::Polygon),
            )
            .unwrap()
        };

        write(&[Feature::from(geo::Geometry::Polygon(
            geo::Rect::new((0.0, 0.0), (1.0, 1.0)).to_polygon(),
        ))]);
        write(&[]);

        let (read_features, _) = read_features_from_geofile(&geofile_filepath).unwrap();
        assert!(read_features.is_empty());
    }

    #[rstest]
    #[case(gdal_sys::OGRErr::OGRERR_FAILURE)]
    #[case(gdal_sys::OGRErr::OGRERR_NOT_ENOUGH_MEMORY)]
    fn test_failed_commit_is_an_error(#[case] result: gdal_sys::OGRErr::Type) {
        let output_filepath = std::path::Path::new("out/footways_heat.gpkg");
        let err = check_transaction(result, "commit", output_filepath).unwrap_err();
        assert!(err.to_string().contains("footways_heat.gpkg"));
        assert!(check_transaction(gdal_sys::OGRErr::OGRERR_NONE, "commit", output_filepath).is_ok());
    }

    #[test]
    fn test_read_missing_file_fails() {
        let test_dir = testdir!();
        assert!(read_features_from_geofile(&test_dir.join("missing.gpkg")).is_err());
    }
}
