use std::collections::HashMap;

use crate::heat::feature::AnnotatedFeature;

/// Attribute value of a feature. GDAL integer fields are read as `Integer`, real fields as
/// `Real`, all other field types as `Text`.
#[derive(Debug, Clone, PartialEq)]
pub enum AttributeValue {
    Text(String),
    Integer(i64),
    Real(f64),
}

pub type FeatureMap = HashMap<String, AttributeValue>;

#[derive(Debug)]
pub struct Feature {
    pub geometry: geo::Geometry,
    pub attributes: Option<FeatureMap>,
}

impl From<geo::Geometry> for Feature {
    fn from(value: geo::Geometry) -> Self {
        Self {
            geometry: value,
            attributes: None,
        }
    }
}

impl From<&AnnotatedFeature> for Feature {
    fn from(value: &AnnotatedFeature) -> Self {
        let mut attributes = value.attributes.clone();
        attributes.insert(
            "heat_index".to_string(),
            AttributeValue::Real(value.heat_index),
        );
        Self {
            geometry: value.geometry.clone().into(),
            attributes: Some(attributes),
        }
    }
}
