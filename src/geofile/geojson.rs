use std::{fs, io, path::Path};

use geojson::{JsonObject, JsonValue};

use crate::heat::{
    aggregate::StatsResult,
    feature::Boundary,
    report::{slug, AreaReport},
};

/// Write one GeoJSON feature per boundary, carrying the statistics of every collection as
/// `<collection>_mean`, `_min`, `_max` and `_count` properties. Statistics without data are null.
///
/// `boundaries` must be in report order; the report entries are paired with them by position.
/// Geometries are written as is, so they should already be in WGS 84.
pub fn write_area_stats_to_geojson(
    boundaries: &[Boundary],
    report: &AreaReport,
    output_filepath: &Path,
) -> io::Result<()> {
    let per_boundary = report.entries.len().checked_div(boundaries.len()).unwrap_or(0);
    if per_boundary * boundaries.len() != report.entries.len() {
        return Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            format!(
                "{} report entries cannot be split over {} boundaries",
                report.entries.len(),
                boundaries.len()
            ),
        ));
    }

    let mut features = Vec::with_capacity(boundaries.len());
    for (index, boundary) in boundaries.iter().enumerate() {
        let entries = &report.entries[index * per_boundary..(index + 1) * per_boundary];
        let mut properties = JsonObject::new();
        properties.insert("name".to_string(), JsonValue::from(boundary.name.clone()));
        for entry in entries {
            if entry.boundary != boundary.name {
                return Err(io::Error::new(
                    io::ErrorKind::InvalidInput,
                    format!(
                        "Report entry for '{}' found at the position of boundary '{}'",
                        entry.boundary, boundary.name
                    ),
                ));
            }
            let prefix = slug(&entry.collection);
            let (mean, min, max, count) = match entry.result {
                StatsResult::Summary(summary) => (
                    JsonValue::from(summary.mean),
                    JsonValue::from(summary.min),
                    JsonValue::from(summary.max),
                    JsonValue::from(summary.count),
                ),
                StatsResult::NoData => (
                    JsonValue::Null,
                    JsonValue::Null,
                    JsonValue::Null,
                    JsonValue::from(0),
                ),
            };
            properties.insert(format!("{}_mean", prefix), mean);
            properties.insert(format!("{}_min", prefix), min);
            properties.insert(format!("{}_max", prefix), max);
            properties.insert(format!("{}_count", prefix), count);
        }
        features.push(geojson::Feature {
            bbox: None,
            geometry: Some(geojson::Geometry::new(geojson::Value::from(
                &boundary.geometry,
            ))),
            id: None,
            properties: Some(properties),
            foreign_members: None,
        });
    }
    let feature_collection = geojson::FeatureCollection {
        bbox: None,
        features,
        foreign_members: None,
    };
    let geojson_contents: geojson::GeoJson = geojson::GeoJson::from(feature_collection);
    fs::write(output_filepath, geojson_contents.to_string())
}

#[cfg(test)]
mod tests {
    use geojson::{GeoJson, JsonValue};
    use testdir::testdir;

    use super::write_area_stats_to_geojson;
    use crate::heat::{
        aggregate::{HeatSummary, StatsResult},
        feature::Boundary,
        report::{AreaReport, AreaStats},
    };

    #[test]
    fn test_write_area_stats_to_geojson() {
        let boundaries = vec![Boundary {
            name: "Downtown".to_string(),
            epsg: 32617,
            geometry: geo::Geometry::Polygon(
                geo::Rect::new((0.0, 0.0), (10.0, 10.0)).to_polygon(),
            ),
        }];
        let report = AreaReport {
            entries: vec![
                AreaStats {
                    boundary: "Downtown".to_string(),
                    collection: "Footways".to_string(),
                    result: StatsResult::Summary(HeatSummary {
                        count: 3,
                        mean: 30.5,
                        min: 29.0,
                        max: 33.0,
                    }),
                },
                AreaStats {
                    boundary: "Downtown".to_string(),
                    collection: "Buildings".to_string(),
                    result: StatsResult::NoData,
                },
            ],
        };
        let output_filepath = testdir!().join("area_stats.geojson");

        write_area_stats_to_geojson(&boundaries, &report, &output_filepath).unwrap();

        let contents = std::fs::read_to_string(&output_filepath).unwrap();
        let feature_collection = match contents.parse::<GeoJson>().unwrap() {
            GeoJson::FeatureCollection(feature_collection) => feature_collection,
            other => panic!("Expected a FeatureCollection, got {:?}", other),
        };
        assert_eq!(1, feature_collection.features.len());
        let feature = &feature_collection.features[0];
        assert_eq!(
            Some(&JsonValue::from("Downtown")),
            feature.property("name")
        );
        assert_eq!(Some(&JsonValue::from(30.5)), feature.property("footways_mean"));
        assert_eq!(Some(&JsonValue::from(3)), feature.property("footways_count"));
        assert_eq!(Some(&JsonValue::Null), feature.property("buildings_max"));
        assert_eq!(Some(&JsonValue::from(0)), feature.property("buildings_count"));
    }

    fn footways_stats(boundary: &str, mean: f64) -> AreaStats {
        AreaStats {
            boundary: boundary.to_string(),
            collection: "Footways".to_string(),
            result: StatsResult::Summary(HeatSummary {
                count: 1,
                mean,
                min: mean,
                max: mean,
            }),
        }
    }

    fn boundary(name: &str) -> Boundary {
        Boundary {
            name: name.to_string(),
            epsg: 4326,
            geometry: geo::Geometry::Polygon(
                geo::Rect::new((-81.52, 41.07), (-81.50, 41.08)).to_polygon(),
            ),
        }
    }

    #[test]
    fn test_entries_are_paired_with_boundaries_by_position() {
        let boundaries = vec![boundary("Downtown"), boundary("Downtown")];
        let report = AreaReport {
            entries: vec![
                footways_stats("Downtown", 10.0),
                footways_stats("Downtown", 99.0),
            ],
        };
        let output_filepath = testdir!().join("area_stats.geojson");

        write_area_stats_to_geojson(&boundaries, &report, &output_filepath).unwrap();

        let contents = std::fs::read_to_string(&output_filepath).unwrap();
        let feature_collection = match contents.parse::<GeoJson>().unwrap() {
            GeoJson::FeatureCollection(feature_collection) => feature_collection,
            other => panic!("Expected a FeatureCollection, got {:?}", other),
        };
        let means: Vec<Option<&JsonValue>> = feature_collection
            .features
            .iter()
            .map(|feature| feature.property("footways_mean"))
            .collect();
        assert_eq!(
            vec![Some(&JsonValue::from(10.0)), Some(&JsonValue::from(99.0))],
            means
        );
    }

    #[test]
    fn test_report_not_matching_boundaries_is_rejected() {
        let output_filepath = testdir!().join("area_stats.geojson");
        let report = AreaReport {
            entries: vec![
                footways_stats("Downtown", 10.0),
                footways_stats("Suburbs", 20.0),
                footways_stats("Suburbs", 30.0),
            ],
        };

        let uneven = write_area_stats_to_geojson(
            &[boundary("Downtown"), boundary("Suburbs")],
            &report,
            &output_filepath,
        );
        assert!(uneven.is_err());

        let swapped = write_area_stats_to_geojson(
            &[boundary("Suburbs"), boundary("Downtown"), boundary("Suburbs")],
            &report,
            &output_filepath,
        );
        assert!(swapped.is_err());
        assert!(!output_filepath.exists());
    }
}
