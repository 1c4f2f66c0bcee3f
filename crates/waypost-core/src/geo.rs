//! Spherical geometry for zones and positions
//!
//! Distances follow the nautical convention: one minute of arc is one
//! nautical mile (1852 m), so one degree is 60 nautical miles.
//!
//! - `ZonePoint` - A latitude/longitude/altitude triple
//! - `Distance` / `Bearing` - Unit-aware distance and compass direction
//! - `Boundary` - Polygon or circle outline of a zone

use crate::error::Error;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

const METERS_PER_NAUTICAL_MILE: f64 = 1852.0;
const METERS_PER_MILE: f64 = 1609.344;
const FEET_PER_MILE: f64 = 5280.0;

/// Points closer than this to a circle edge count as on the edge
const EDGE_TOLERANCE_M: f64 = 1e-6;

/// Cross products below this (in squared degrees) count as collinear
const COLLINEAR_EPSILON: f64 = 1e-12;

/// A geographical point
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
pub struct ZonePoint {
    pub latitude: f64,
    pub longitude: f64,
    pub altitude: f64,
}

impl ZonePoint {
    /// Create a new point
    pub fn new(latitude: f64, longitude: f64, altitude: f64) -> Self {
        Self {
            latitude,
            longitude,
            altitude,
        }
    }

    /// Create a point at sea level
    pub fn flat(latitude: f64, longitude: f64) -> Self {
        Self::new(latitude, longitude, 0.0)
    }

    /// Check that both coordinates are finite numbers
    pub fn is_finite(&self) -> bool {
        self.latitude.is_finite() && self.longitude.is_finite()
    }
}

impl fmt::Display for ZonePoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "({:.6}, {:.6}, {:.1})",
            self.latitude, self.longitude, self.altitude
        )
    }
}

/// Units accepted when building or reading a distance
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DistanceUnit {
    Feet,
    Miles,
    Meters,
    Kilometers,
    NauticalMiles,
}

impl DistanceUnit {
    fn meters_per_unit(self) -> f64 {
        match self {
            DistanceUnit::Feet => METERS_PER_MILE / FEET_PER_MILE,
            DistanceUnit::Miles => METERS_PER_MILE,
            DistanceUnit::Meters => 1.0,
            DistanceUnit::Kilometers => 1000.0,
            DistanceUnit::NauticalMiles => METERS_PER_NAUTICAL_MILE,
        }
    }
}

impl FromStr for DistanceUnit {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "feet" | "ft" => Ok(DistanceUnit::Feet),
            "miles" | "mi" => Ok(DistanceUnit::Miles),
            "meters" | "m" => Ok(DistanceUnit::Meters),
            "kilometers" | "km" => Ok(DistanceUnit::Kilometers),
            "nauticalmiles" => Ok(DistanceUnit::NauticalMiles),
            other => Err(Error::InvalidUnit(other.to_string())),
        }
    }
}

/// A distance between two points, stored in meters
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Serialize, Deserialize, Default)]
#[serde(transparent)]
pub struct Distance(f64);

impl Distance {
    /// Zero distance
    pub const ZERO: Distance = Distance(0.0);

    /// Create a distance in meters
    pub fn meters(value: f64) -> Self {
        Self(value)
    }

    /// Create a distance in the given unit
    pub fn new(value: f64, unit: DistanceUnit) -> Self {
        Self(value * unit.meters_per_unit())
    }

    /// Get the distance in meters
    pub fn as_meters(&self) -> f64 {
        self.0
    }

    /// Get the distance in the given unit
    pub fn value_in(&self, unit: DistanceUnit) -> f64 {
        self.0 / unit.meters_per_unit()
    }

    /// Arc length of the given number of degrees
    pub fn from_degrees(degrees: f64) -> Self {
        Self::new(degrees * 60.0, DistanceUnit::NauticalMiles)
    }

    fn from_radians(radians: f64) -> Self {
        Self::from_degrees(radians.to_degrees())
    }

    fn to_radians(self) -> f64 {
        (self.value_in(DistanceUnit::NauticalMiles) / 60.0).to_radians()
    }
}

impl fmt::Display for Distance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.1} m", self.0)
    }
}

/// A compass direction in degrees; 0 is north, 90 is east
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Serialize, Deserialize, Default)]
#[serde(transparent)]
pub struct Bearing(f64);

impl Bearing {
    /// Create a bearing, normalized to `[0, 360)`
    pub fn new(degrees: f64) -> Self {
        Self(degrees.rem_euclid(360.0))
    }

    /// Get the bearing in degrees
    pub fn degrees(&self) -> f64 {
        self.0
    }

    fn radians(self) -> f64 {
        self.0.to_radians()
    }
}

impl fmt::Display for Bearing {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.1}°", self.0)
    }
}

/// Distance and bearing from `from` to `to` along a great circle
pub fn vector_to_point(from: &ZonePoint, to: &ZonePoint) -> (Distance, Bearing) {
    // Same meridian (including identical points): exact and free of atan2 noise
    if from.longitude == to.longitude {
        let distance = Distance::from_degrees((from.latitude - to.latitude).abs());
        let bearing = if from.latitude <= to.latitude { 0.0 } else { 180.0 };
        return (distance, Bearing::new(bearing));
    }

    let lat1 = from.latitude.to_radians();
    let lon1 = from.longitude.to_radians();
    let lat2 = to.latitude.to_radians();
    let lon2 = to.longitude.to_radians();

    // Haversine
    let h = ((lat1 - lat2) / 2.0).sin().powi(2)
        + lat1.cos() * lat2.cos() * ((lon1 - lon2) / 2.0).sin().powi(2);
    let arc = 2.0 * h.sqrt().min(1.0).asin();

    let bearing = ((lon2 - lon1).sin() * lat2.cos()).atan2(
        lat1.cos() * lat2.sin() - lat1.sin() * lat2.cos() * (lon2 - lon1).cos(),
    );

    (Distance::from_radians(arc), Bearing::new(bearing.to_degrees()))
}

/// The point reached by travelling `distance` from `point` along `bearing`
pub fn translate_point(point: &ZonePoint, distance: Distance, bearing: Bearing) -> ZonePoint {
    let d = distance.to_radians();
    let b = bearing.radians();
    let lat1 = point.latitude.to_radians();

    let lat2 = (lat1.sin() * d.cos() + lat1.cos() * d.sin() * b.cos()).asin();
    let dlon = (b.sin() * d.sin() * lat1.cos()).atan2(d.cos() - lat1.sin() * lat2.sin());

    ZonePoint::new(
        lat2.to_degrees(),
        point.longitude + dlon.to_degrees(),
        point.altitude,
    )
}

/// Shortest distance and bearing from `point` to any point of the segment `p1`-`p2`
pub fn vector_to_segment(point: &ZonePoint, p1: &ZonePoint, p2: &ZonePoint) -> (Distance, Bearing) {
    let (d1, b1) = vector_to_point(p1, point);
    let (ds, bs) = vector_to_point(p1, p2);
    if ds.as_meters() == 0.0 {
        return vector_to_point(point, p1);
    }

    let d1 = d1.to_radians();
    let delta = b1.radians() - bs.radians();

    // Projection falls before p1
    if delta.cos() < 0.0 {
        return vector_to_point(point, p1);
    }

    let cross_track = (d1.sin() * delta.sin()).asin();
    let along_track = (d1.cos() / cross_track.cos()).clamp(-1.0, 1.0).acos();
    if along_track >= ds.to_radians() {
        return vector_to_point(point, p2);
    }

    let foot = translate_point(p1, Distance::from_radians(along_track), bs);
    vector_to_point(point, &foot)
}

/// Outline of a zone
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Boundary {
    /// Ordered boundary points; the last point connects back to the first
    Polygon(Vec<ZonePoint>),
    /// Everything within `radius` of `center`
    Circle { center: ZonePoint, radius: Distance },
}

impl Boundary {
    /// Check that the boundary describes a usable area
    ///
    /// Returns the reason when it does not.
    pub fn validate(&self) -> std::result::Result<(), String> {
        match self {
            Boundary::Polygon(points) => {
                if points.len() < 3 {
                    return Err(format!(
                        "polygon needs at least 3 points, got {}",
                        points.len()
                    ));
                }
                if let Some(p) = points.iter().find(|p| !p.is_finite()) {
                    return Err(format!("non-finite boundary point {}", p));
                }
                Ok(())
            }
            Boundary::Circle { center, radius } => {
                if !center.is_finite() {
                    return Err(format!("non-finite center {}", center));
                }
                if !radius.as_meters().is_finite() || radius.as_meters() <= 0.0 {
                    return Err(format!("radius must be positive, got {}", radius));
                }
                Ok(())
            }
        }
    }

    /// Check whether `point` lies inside or on the boundary
    pub fn contains(&self, point: &ZonePoint) -> bool {
        match self {
            Boundary::Polygon(points) => point_in_polygon(point, points),
            Boundary::Circle { center, radius } => {
                let (d, _) = vector_to_point(point, center);
                d.as_meters() <= radius.as_meters() + EDGE_TOLERANCE_M
            }
        }
    }

    /// Shortest distance and bearing from `point` to the zone (zero when inside)
    pub fn vector_from(&self, point: &ZonePoint) -> (Distance, Bearing) {
        match self {
            Boundary::Polygon(points) => {
                if point_in_polygon(point, points) {
                    return (Distance::ZERO, Bearing::new(0.0));
                }
                let n = points.len();
                (0..n)
                    .map(|i| vector_to_segment(point, &points[i], &points[(i + 1) % n]))
                    .fold(None, |best: Option<(Distance, Bearing)>, this| match best {
                        Some(b) if b.0 <= this.0 => Some(b),
                        _ => Some(this),
                    })
                    .unwrap_or((Distance::meters(f64::INFINITY), Bearing::new(0.0)))
            }
            Boundary::Circle { center, radius } => {
                let (d, b) = vector_to_point(point, center);
                let gap = d.as_meters() - radius.as_meters();
                if gap <= EDGE_TOLERANCE_M {
                    (Distance::ZERO, Bearing::new(0.0))
                } else {
                    (Distance::meters(gap), b)
                }
            }
        }
    }

    /// A representative point: the vertex mean of a polygon or a circle's center
    pub fn centroid(&self) -> Option<ZonePoint> {
        match self {
            Boundary::Polygon(points) if !points.is_empty() => {
                let n = points.len() as f64;
                let lat = points.iter().map(|p| p.latitude).sum::<f64>() / n;
                let lon = points.iter().map(|p| p.longitude).sum::<f64>() / n;
                let alt = points.iter().map(|p| p.altitude).sum::<f64>() / n;
                Some(ZonePoint::new(lat, lon, alt))
            }
            Boundary::Polygon(_) => None,
            Boundary::Circle { center, .. } => Some(*center),
        }
    }
}

/// Ray-casting containment test on a local planar projection centred on `point`
///
/// Points on an edge or vertex are inside.
pub fn point_in_polygon(point: &ZonePoint, polygon: &[ZonePoint]) -> bool {
    let n = polygon.len();
    if n < 3 {
        return false;
    }

    let projected: Vec<(f64, f64)> = polygon.iter().map(|p| project(point, p)).collect();
    let mut inside = false;
    for i in 0..n {
        let a = projected[i];
        let b = projected[(i + 1) % n];

        if origin_on_segment(a, b) {
            return true;
        }

        // Cast the ray towards +x from the origin
        if (a.1 > 0.0) != (b.1 > 0.0) {
            let x = a.0 + (0.0 - a.1) * (b.0 - a.0) / (b.1 - a.1);
            if x > 0.0 {
                inside = !inside;
            }
        }
    }
    inside
}

/// Equirectangular projection of `p` around `origin`, in degrees
fn project(origin: &ZonePoint, p: &ZonePoint) -> (f64, f64) {
    let scale = origin.latitude.to_radians().cos();
    let dlon = (p.longitude - origin.longitude + 180.0).rem_euclid(360.0) - 180.0;
    (dlon * scale, p.latitude - origin.latitude)
}

fn origin_on_segment(a: (f64, f64), b: (f64, f64)) -> bool {
    let cross = a.0 * b.1 - a.1 * b.0;
    let dot = a.0 * b.0 + a.1 * b.1;
    cross.abs() <= COLLINEAR_EPSILON && dot <= 0.0
}
