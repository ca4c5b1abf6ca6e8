//! Geo-scoring: great-circle distance, compass direction and proximity.
//!
//! Pure functions, no state. The engine calls these for every incorrect
//! guess; the correct-guess path never reaches them.
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::constants::{
    DEFAULT_MAX_DISTANCE_KM, EARTH_RADIUS_KM, FINE_THRESHOLD_KM, NEAR_THRESHOLD_KM,
    PROXIMITY_AT_NEAR, PROXIMITY_MAX,
};
use crate::numbers::{round_f64_to_u32, round_to_places, u32_to_f64};

const EXACT_HIT_GLYPH: &str = "🎯";

/// A latitude/longitude pair in degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
pub struct Coordinates {
    pub lat: f64,
    pub lng: f64,
}

impl Coordinates {
    #[must_use]
    pub const fn new(lat: f64, lng: f64) -> Self {
        Self { lat, lng }
    }

    /// Great-circle distance to `other`, rounded to whole kilometres.
    #[must_use]
    pub fn distance_to(self, other: Self) -> u32 {
        calculate_distance(self.lat, self.lng, other.lat, other.lng)
    }

    /// Compass octant of the initial bearing from `self` towards `other`.
    #[must_use]
    pub fn direction_to(self, other: Self) -> CompassArrow {
        calculate_direction(self.lat, self.lng, other.lat, other.lng)
    }
}

/// One of the eight 45° compass octants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CompassArrow {
    North,
    NorthEast,
    East,
    SouthEast,
    South,
    SouthWest,
    West,
    NorthWest,
}

const OCTANT_ORDER: [CompassArrow; 8] = [
    CompassArrow::North,
    CompassArrow::NorthEast,
    CompassArrow::East,
    CompassArrow::SouthEast,
    CompassArrow::South,
    CompassArrow::SouthWest,
    CompassArrow::West,
    CompassArrow::NorthWest,
];

impl CompassArrow {
    #[must_use]
    pub const fn glyph(self) -> &'static str {
        match self {
            Self::North => "⬆️",
            Self::NorthEast => "↗️",
            Self::East => "➡️",
            Self::SouthEast => "↘️",
            Self::South => "⬇️",
            Self::SouthWest => "↙️",
            Self::West => "⬅️",
            Self::NorthWest => "↖️",
        }
    }

    /// Bucket a bearing in degrees into its octant.
    ///
    /// Octants are centred on the cardinal and intercardinal directions, so
    /// North covers `[337.5, 360) ∪ [0, 22.5)`.
    #[must_use]
    pub fn from_bearing(bearing: f64) -> Self {
        let normalized = normalize_bearing(bearing);
        let shifted = (normalized + 22.5) % 360.0;
        let index = round_f64_to_u32((shifted / 45.0).floor()) as usize;
        OCTANT_ORDER.get(index).copied().unwrap_or(Self::North)
    }

    #[must_use]
    pub fn all() -> [Self; 8] {
        OCTANT_ORDER
    }
}

impl fmt::Display for CompassArrow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.glyph())
    }
}

/// Feedback direction of a guess.
///
/// `ExactHit` is a sentinel distinct from every compass octant; only the
/// engine's correct-guess path produces it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Direction {
    Compass(CompassArrow),
    ExactHit,
}

impl Direction {
    #[must_use]
    pub const fn glyph(self) -> &'static str {
        match self {
            Self::Compass(arrow) => arrow.glyph(),
            Self::ExactHit => EXACT_HIT_GLYPH,
        }
    }

    #[must_use]
    pub const fn is_exact_hit(self) -> bool {
        matches!(self, Self::ExactHit)
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.glyph())
    }
}

/// Error returned when a persisted glyph is not a known direction.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown direction glyph: {0:?}")]
pub struct UnknownDirection(pub String);

impl FromStr for Direction {
    type Err = UnknownDirection;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s == EXACT_HIT_GLYPH {
            return Ok(Self::ExactHit);
        }
        // Older clients stripped the emoji variation selector.
        let bare = s.trim_end_matches('\u{FE0F}');
        OCTANT_ORDER
            .iter()
            .find(|arrow| arrow.glyph().trim_end_matches('\u{FE0F}') == bare)
            .map(|arrow| Self::Compass(*arrow))
            .ok_or_else(|| UnknownDirection(s.to_string()))
    }
}

impl TryFrom<String> for Direction {
    type Error = UnknownDirection;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Direction> for String {
    fn from(value: Direction) -> Self {
        value.glyph().to_string()
    }
}

fn normalize_bearing(bearing: f64) -> f64 {
    if !bearing.is_finite() {
        return 0.0;
    }
    let wrapped = bearing % 360.0;
    if wrapped < 0.0 { wrapped + 360.0 } else { wrapped }
}

/// Haversine distance in kilometres on a sphere of radius 6371 km, rounded to
/// the nearest kilometre.
#[must_use]
pub fn calculate_distance(lat1: f64, lng1: f64, lat2: f64, lng2: f64) -> u32 {
    let d_lat = (lat2 - lat1).to_radians();
    let d_lng = (lng2 - lng1).to_radians();
    let a = (d_lat / 2.0).sin().powi(2)
        + lat1.to_radians().cos() * lat2.to_radians().cos() * (d_lng / 2.0).sin().powi(2);
    // Float noise can push `a` a hair outside [0, 1] for antipodal points.
    let a = a.clamp(0.0, 1.0);
    let c = 2.0 * a.sqrt().atan2((1.0 - a).sqrt());
    round_f64_to_u32(EARTH_RADIUS_KM * c)
}

/// Initial great-circle bearing from point 1 to point 2, in `[0, 360)`.
#[must_use]
pub fn initial_bearing(lat1: f64, lng1: f64, lat2: f64, lng2: f64) -> f64 {
    let d_lng = (lng2 - lng1).to_radians();
    let (lat1, lat2) = (lat1.to_radians(), lat2.to_radians());
    let y = d_lng.sin() * lat2.cos();
    let x = lat1.cos() * lat2.sin() - lat1.sin() * lat2.cos() * d_lng.cos();
    normalize_bearing(y.atan2(x).to_degrees())
}

/// Compass arrow pointing from the guess (point 1) towards the target
/// (point 2). Coincident points report North.
#[must_use]
pub fn calculate_direction(lat1: f64, lng1: f64, lat2: f64, lng2: f64) -> CompassArrow {
    CompassArrow::from_bearing(initial_bearing(lat1, lng1, lat2, lng2))
}

/// Proximity percentage for a distance, using the default 4000 km horizon.
#[must_use]
pub fn calculate_proximity(distance_km: u32) -> f64 {
    calculate_proximity_with_max(distance_km, DEFAULT_MAX_DISTANCE_KM)
}

/// Two-segment proximity scale.
///
/// 100 at 0 km falling linearly to 95 at 20 km (two decimals up to 5 km),
/// then linearly to 0 at `max_distance_km`. Anything at or past the horizon
/// scores 0, even inside the near band. Non-increasing in distance.
#[must_use]
pub fn calculate_proximity_with_max(distance_km: u32, max_distance_km: u32) -> f64 {
    if distance_km == 0 {
        return PROXIMITY_MAX;
    }
    if distance_km >= max_distance_km {
        return 0.0;
    }

    let distance = u32_to_f64(distance_km);
    let near = u32_to_f64(NEAR_THRESHOLD_KM);

    if distance_km <= NEAR_THRESHOLD_KM {
        let granular = PROXIMITY_MAX - (distance / near) * (PROXIMITY_MAX - PROXIMITY_AT_NEAR);
        let places = if distance_km <= FINE_THRESHOLD_KM { 2 } else { 0 };
        return round_to_places(granular, places);
    }

    let span = u32_to_f64(max_distance_km) - near;
    let proximity = (PROXIMITY_AT_NEAR - (distance - near) / span * PROXIMITY_AT_NEAR).max(0.0);
    round_to_places(proximity, 0)
}
