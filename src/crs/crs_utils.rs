use anyhow::{anyhow, Context};

pub type EpsgCode = u32;

pub fn epsg_code_to_authority_string(code: EpsgCode) -> String {
    format!("EPSG:{}", code)
}

pub fn spatial_ref_from_epsg(code: EpsgCode) -> anyhow::Result<gdal::spatial_ref::SpatialRef> {
    gdal::spatial_ref::SpatialRef::from_epsg(code)
        .map_err(|err| anyhow!("Could not create SpatialRef from EPSG code {}. {}", code, err))
}

/// Authority code of a spatial reference, only if the authority is EPSG.
fn epsg_authority_code(spatial_ref: &gdal::spatial_ref::SpatialRef) -> Option<i32> {
    let authority = spatial_ref.auth_name().ok()?;
    if !authority.eq_ignore_ascii_case("EPSG") {
        log::debug!("Ignoring {} authority code", authority);
        return None;
    }
    spatial_ref.auth_code().ok()
}

/// Resolve the EPSG code of a spatial reference.
///
/// Spatial references read from files do not always carry an EPSG code directly (e.g. a
/// shapefile .prj holds bare WKT, or the code belongs to another authority such as ESRI), so an
/// identification against the EPSG database is attempted before giving up.
pub fn spatial_ref_to_epsg(spatial_ref: &gdal::spatial_ref::SpatialRef) -> anyhow::Result<EpsgCode> {
    if let Some(code) = epsg_authority_code(spatial_ref) {
        return EpsgCode::try_from(code).context("Negative authority code");
    }
    let mut identified = spatial_ref.clone();
    identified
        .auto_identify_epsg()
        .map_err(|err| anyhow!("Could not identify an EPSG code. {}", err))?;
    let code = epsg_authority_code(&identified)
        .ok_or_else(|| anyhow!("Spatial reference has no EPSG authority code"))?;
    EpsgCode::try_from(code).context("Negative authority code")
}
