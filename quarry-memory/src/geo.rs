//! Point parsing, geohash encoding and great-circle distance.

use quarry::model::GeoPoint;
use quarry::value::coerce;
use quarry::{Error, Result, Value};

const BASE32: &[u8; 32] = b"0123456789bcdefghjkmnpqrstuvwxyz";

/// Mean earth radius in meters
const EARTH_RADIUS_M: f64 = 6_371_008.8;

pub const MAX_PRECISION: usize = 12;

/// Parse one point from a `{lat, lon}` map, a `[lon, lat]` list or a
/// `"lat,lon"` string.
pub fn point(value: &Value) -> Option<GeoPoint> {
    match value {
        Value::Map(map) => Some(GeoPoint {
            lat: coerce::to_double(map.get("lat")?)?,
            lon: coerce::to_double(map.get("lon")?)?,
        }),
        Value::List(items) if is_lon_lat(items) => Some(GeoPoint {
            lat: coerce::to_double(&items[1])?,
            lon: coerce::to_double(&items[0])?,
        }),
        Value::Str(text) => {
            let (lat, lon) = text.split_once(',')?;
            Some(GeoPoint {
                lat: lat.trim().parse().ok()?,
                lon: lon.trim().parse().ok()?,
            })
        }
        _ => None,
    }
}

fn is_lon_lat(items: &[Value]) -> bool {
    items.len() == 2 && items.iter().all(Value::is_number)
}

/// Every point held by a field value. A list is either one `[lon, lat]`
/// pair or a list of points.
pub fn points(value: &Value) -> Vec<GeoPoint> {
    match value {
        Value::List(items) if !is_lon_lat(items) => items.iter().filter_map(point).collect(),
        other => point(other).into_iter().collect(),
    }
}

pub fn geohash(p: GeoPoint, precision: usize) -> Result<String> {
    if precision == 0 || precision > MAX_PRECISION {
        return Err(Error::InvalidQuery(format!(
            "Geohash precision must be between 1 and {}, got {}",
            MAX_PRECISION, precision
        )));
    }

    let (mut lat_lo, mut lat_hi) = (-90.0_f64, 90.0_f64);
    let (mut lon_lo, mut lon_hi) = (-180.0_f64, 180.0_f64);
    let mut hash = String::with_capacity(precision);
    let mut even = true;
    let mut bits = 0;
    let mut index = 0usize;

    while hash.len() < precision {
        if even {
            let mid = (lon_lo + lon_hi) / 2.0;
            if p.lon >= mid {
                index = (index << 1) | 1;
                lon_lo = mid;
            } else {
                index <<= 1;
                lon_hi = mid;
            }
        } else {
            let mid = (lat_lo + lat_hi) / 2.0;
            if p.lat >= mid {
                index = (index << 1) | 1;
                lat_lo = mid;
            } else {
                index <<= 1;
                lat_hi = mid;
            }
        }
        even = !even;
        bits += 1;
        if bits == 5 {
            hash.push(BASE32[index] as char);
            bits = 0;
            index = 0;
        }
    }
    Ok(hash)
}

/// Haversine distance in meters
pub fn distance_m(a: GeoPoint, b: GeoPoint) -> f64 {
    let (lat1, lat2) = (a.lat.to_radians(), b.lat.to_radians());
    let dlat = (b.lat - a.lat).to_radians();
    let dlon = (b.lon - a.lon).to_radians();
    let h = (dlat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (dlon / 2.0).sin().powi(2);
    2.0 * EARTH_RADIUS_M * h.sqrt().min(1.0).asin()
}

/// Meters per distance unit
pub fn unit_meters(unit: Option<&str>) -> Result<f64> {
    match unit.unwrap_or("m") {
        "m" => Ok(1.0),
        "km" => Ok(1000.0),
        "mi" => Ok(1609.344),
        other => Err(Error::InvalidQuery(format!("Unknown distance unit '{}'", other))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    #[test]
    fn test_point_shapes() {
        let mut map = BTreeMap::new();
        map.insert("lat".to_string(), Value::Double(52.5));
        map.insert("lon".to_string(), Value::Double(13.4));
        let expected = GeoPoint { lat: 52.5, lon: 13.4 };

        assert_eq!(point(&Value::Map(map)), Some(expected));
        assert_eq!(
            point(&Value::List(vec![Value::Double(13.4), Value::Double(52.5)])),
            Some(expected)
        );
        assert_eq!(point(&Value::from("52.5, 13.4")), Some(expected));
        assert_eq!(point(&Value::from("nowhere")), None);
        assert_eq!(point(&Value::Long(3)), None);
    }

    #[test]
    fn test_points_from_list_of_strings() {
        let value = Value::List(vec![Value::from("1,2"), Value::from("3,4")]);
        assert_eq!(points(&value).len(), 2);
        assert_eq!(points(&Value::List(vec![Value::Int(2), Value::Int(1)])).len(), 1);
        assert!(points(&Value::Null).is_empty());
    }

    #[test]
    fn test_geohash_known_value() {
        let p = GeoPoint { lat: 57.64911, lon: 10.40744 };
        assert_eq!(geohash(p, 11).unwrap(), "u4pruydqqvj");
        assert_eq!(geohash(p, 5).unwrap(), "u4pru");
        assert!(geohash(p, 0).is_err());
        assert!(geohash(p, 13).is_err());
    }

    #[test]
    fn test_one_degree_of_longitude_at_equator() {
        let d = distance_m(GeoPoint { lat: 0.0, lon: 0.0 }, GeoPoint { lat: 0.0, lon: 1.0 });
        assert!((d - 111_195.0).abs() < 1.0, "got {}", d);
        assert_eq!(unit_meters(Some("km")).unwrap(), 1000.0);
        assert!(unit_meters(Some("parsec")).is_err());
    }
}
