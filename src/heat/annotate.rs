use indicatif::{ParallelProgressIterator, ProgressBar};
use rayon::prelude::*;

use super::{
    error::HeatError,
    feature::{AnnotatedCollection, AnnotatedFeature, FeatureCollection},
    grid::RasterGrid,
    sampler::sample,
};

/// Assign a heat index to every feature of the collection.
///
/// Features are sampled in parallel. If any feature fails to sample, no annotated collection is
/// produced and the failure of the lowest feature index is returned.
pub fn annotate(
    collection: FeatureCollection,
    grid: &RasterGrid,
) -> Result<AnnotatedCollection, HeatError> {
    if collection.epsg != grid.epsg() {
        return Err(HeatError::CoordinateSystemMismatch {
            dataset: collection.name,
            expected: grid.epsg(),
            found: collection.epsg,
        });
    }

    log::info!(
        "Sampling heat index for {} features of '{}'",
        collection.features.len(),
        collection.name
    );
    let bar = ProgressBar::new(collection.features.len() as u64);
    let samples: Vec<_> = collection
        .features
        .par_iter()
        .progress_with(bar)
        .map(|feature| sample(&feature.geometry, grid))
        .collect();

    let mut features = Vec::with_capacity(samples.len());
    for (index, (feature, heat_index)) in collection.features.into_iter().zip(samples).enumerate() {
        let heat_index = heat_index.map_err(|source| HeatError::Sampling {
            collection: collection.name.clone(),
            feature: index,
            source,
        })?;
        features.push(AnnotatedFeature {
            geometry: feature.geometry,
            attributes: feature.attributes,
            heat_index,
        });
    }

    Ok(AnnotatedCollection {
        name: collection.name,
        epsg: collection.epsg,
        kind: collection.kind,
        features,
    })
}
