use serde::{Deserialize, Serialize};
use std::fmt;

/// A point on the map, in decimal degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(from = "[f64; 2]", into = "[f64; 2]")]
pub struct Coords {
    pub lat: f64,
    pub lng: f64,
}

impl Coords {
    pub const fn new(lat: f64, lng: f64) -> Self {
        Self { lat, lng }
    }

    /// Finite and within [-90, 90] x [-180, 180].
    pub fn is_on_map(&self) -> bool {
        (-90.0..=90.0).contains(&self.lat) && (-180.0..=180.0).contains(&self.lng)
    }
}

impl From<[f64; 2]> for Coords {
    fn from([lat, lng]: [f64; 2]) -> Self {
        Self { lat, lng }
    }
}

impl From<Coords> for [f64; 2] {
    fn from(c: Coords) -> Self {
        [c.lat, c.lng]
    }
}

impl fmt::Display for Coords {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.5},{:.5}", self.lat, self.lng)
    }
}

/// Weather at the workout location when it was logged.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Conditions {
    /// Whole degrees Celsius.
    pub temperature: Option<i32>,
    /// URL of the weather icon.
    pub icon: Option<String>,
}

/// Reverse-geocoded place name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Place {
    pub city: String,
    pub country: String,
}

impl Place {
    pub const UNKNOWN: &'static str = "Unknown";

    pub fn unknown() -> Self {
        Self {
            city: Self::UNKNOWN.to_string(),
            country: Self::UNKNOWN.to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WorkoutKindTag {
    Running,
    Cycling,
}

impl WorkoutKindTag {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Running => "running",
            Self::Cycling => "cycling",
        }
    }

    pub fn parse(tag: &str) -> Option<Self> {
        match tag {
            "running" => Some(Self::Running),
            "cycling" => Some(Self::Cycling),
            _ => None,
        }
    }

    /// Emoji used in marker popups and text rows.
    pub const fn emoji(self) -> &'static str {
        match self {
            Self::Running => "\u{1F3C3}",
            Self::Cycling => "\u{1F6B4}",
        }
    }
}

impl fmt::Display for WorkoutKindTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Field a sorted view is ordered by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum SortField {
    Duration,
    Distance,
}

/// Opaque reference to a marker drawn by a map surface. Never persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct MarkerHandle(pub u64);

/// Variant-specific input of a new workout.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum VariantInput {
    Running { cadence: f64 },
    Cycling { elevation_gain: f64 },
}

impl VariantInput {
    pub const fn tag(self) -> WorkoutKindTag {
        match self {
            Self::Running { .. } => WorkoutKindTag::Running,
            Self::Cycling { .. } => WorkoutKindTag::Cycling,
        }
    }

    pub const fn value(self) -> f64 {
        match self {
            Self::Running { cadence } => cadence,
            Self::Cycling { elevation_gain } => elevation_gain,
        }
    }
}

/// Everything the user supplies for a new workout, as read from the form.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NewWorkout {
    pub coords: Coords,
    pub distance: f64,
    pub duration: f64,
    pub variant: VariantInput,
}

/// Replacement values for an existing workout. `variant_value` is the cadence
/// of a running workout or the elevation gain of a cycling one.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WorkoutEdit {
    pub distance: f64,
    pub duration: f64,
    pub variant_value: f64,
}
