//! Geolocation tagging for clock entries and incidents.

use super::ModelValidationError;
use serde::{Deserialize, Serialize};

/// Label stored when an incident is logged without a position fix.
pub const LOCATION_UNAVAILABLE: &str = "Location not available";

/// One position fix reported by the host device.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub latitude: f64,
    pub longitude: f64,
}

impl GeoPoint {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }

    /// Builds a point from optional host coordinates.
    ///
    /// Returns `None` unless both values are present.
    pub fn from_parts(latitude: Option<f64>, longitude: Option<f64>) -> Option<Self> {
        match (latitude, longitude) {
            (Some(latitude), Some(longitude)) => Some(Self::new(latitude, longitude)),
            _ => None,
        }
    }

    /// Human-readable label, six decimal places per axis.
    pub fn label(&self) -> String {
        format!("Lat: {:.6}, Lng: {:.6}", self.latitude, self.longitude)
    }

    pub fn validate(&self) -> Result<(), ModelValidationError> {
        if !(-90.0..=90.0).contains(&self.latitude) {
            return Err(ModelValidationError::LatitudeOutOfRange(self.latitude));
        }
        if !(-180.0..=180.0).contains(&self.longitude) {
            return Err(ModelValidationError::LongitudeOutOfRange(self.longitude));
        }
        Ok(())
    }
}

/// Validates a stored optional coordinate pair.
pub(crate) fn validate_coordinates(
    latitude: Option<f64>,
    longitude: Option<f64>,
) -> Result<(), ModelValidationError> {
    match (latitude, longitude) {
        (None, None) => Ok(()),
        (Some(latitude), Some(longitude)) => GeoPoint::new(latitude, longitude).validate(),
        _ => Err(ModelValidationError::PartialCoordinates),
    }
}
