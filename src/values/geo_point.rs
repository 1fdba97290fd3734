use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::core::{DbError, Result};

const EARTH_RADIUS_KM: f64 = 6371.0;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    lat: f64,
    lon: f64,
}

impl GeoPoint {
    pub fn new(lat: f64, lon: f64) -> Self {
        Self { lat, lon }
    }

    pub fn lat(&self) -> f64 {
        self.lat
    }

    pub fn lon(&self) -> f64 {
        self.lon
    }

    /// Great-circle distance in kilometres, rounded to two decimals.
    pub fn distance_km(&self, other: &GeoPoint) -> f64 {
        let (lat1, lat2) = (self.lat.to_radians(), other.lat.to_radians());
        let d_lat = lat2 - lat1;
        let d_lon = (other.lon - self.lon).to_radians();

        let a = (d_lat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (d_lon / 2.0).sin().powi(2);
        let distance = 2.0 * EARTH_RADIUS_KM * a.sqrt().atan2((1.0 - a).sqrt());
        (distance * 100.0).round() / 100.0
    }
}

impl fmt::Display for GeoPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{},{}", self.lat, self.lon)
    }
}

/// Accepts `lat,lon` with or without the surrounding parentheses of the
/// Postgres `point` literal.
impl FromStr for GeoPoint {
    type Err = DbError;

    fn from_str(s: &str) -> Result<Self> {
        let inner = s.trim().trim_start_matches('(').trim_end_matches(')');
        let mut parts = inner.split(',');
        let (Some(lat), Some(lon), None) = (parts.next(), parts.next(), parts.next()) else {
            return Err(DbError::MappingError(format!("Cannot parse point from '{}'", s)));
        };
        let parse = |part: &str| {
            part.trim()
                .parse::<f64>()
                .map_err(|e| DbError::MappingError(format!("Cannot parse point from '{}': {}", s, e)))
        };
        Ok(Self::new(parse(lat)?, parse(lon)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_point_literal() {
        let point: GeoPoint = "(55.75,37.61)".parse().unwrap();
        assert_eq!(point, GeoPoint::new(55.75, 37.61));
        assert_eq!(point.to_string(), "55.75,37.61");
        assert!("55.75".parse::<GeoPoint>().is_err());
        assert!("(a,b)".parse::<GeoPoint>().is_err());
    }

    #[test]
    fn test_distance() {
        let moscow = GeoPoint::new(55.7558, 37.6173);
        let spb = GeoPoint::new(59.9343, 30.3351);
        let distance = moscow.distance_km(&spb);
        assert!((distance - 633.0).abs() < 5.0, "distance was {}", distance);
        assert_eq!(moscow.distance_km(&moscow), 0.0);
    }
}
