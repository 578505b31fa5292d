use crate::types::{
    Conditions, Coords, MarkerHandle, NewWorkout, Place, VariantInput, WorkoutKindTag,
};
use chrono::{DateTime, Datelike, Local, Utc};

const MONTHS: [&str; 12] = [
    "January",
    "February",
    "March",
    "April",
    "May",
    "June",
    "July",
    "August",
    "September",
    "October",
    "November",
    "December",
];

/// Variant payload of a workout together with its derived metric.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum WorkoutKind {
    /// `pace` is min/km.
    Running { cadence: f64, pace: f64 },
    /// `speed` is km/h.
    Cycling { elevation_gain: f64, speed: f64 },
}

impl WorkoutKind {
    pub const fn tag(&self) -> WorkoutKindTag {
        match self {
            Self::Running { .. } => WorkoutKindTag::Running,
            Self::Cycling { .. } => WorkoutKindTag::Cycling,
        }
    }

    /// Cadence or elevation gain, depending on the variant.
    pub const fn variant_value(&self) -> f64 {
        match *self {
            Self::Running { cadence, .. } => cadence,
            Self::Cycling { elevation_gain, .. } => elevation_gain,
        }
    }
}

pub fn calc_pace(distance: f64, duration: f64) -> f64 {
    duration / distance
}

pub fn calc_speed(distance: f64, duration: f64) -> f64 {
    distance / (duration / 60.0)
}

/// A logged workout.
///
/// `distance` and `duration` are only writable through [`Workout::apply_edit`]
/// so the derived pace/speed can never go stale.
#[derive(Debug, Clone)]
pub struct Workout {
    id: String,
    date: DateTime<Utc>,
    coords: Coords,
    distance: f64,
    duration: f64,
    time: String,
    time_unit: String,
    conditions: Conditions,
    place: Place,
    description: String,
    kind: WorkoutKind,
    /// Live map marker. Lives only as long as the map does.
    pub marker: Option<MarkerHandle>,
}

/// Raw fields of a workout as read back from storage.
#[derive(Debug, Clone)]
pub struct WorkoutParts {
    pub id: String,
    pub date: DateTime<Utc>,
    pub coords: Coords,
    pub distance: f64,
    pub duration: f64,
    pub time: String,
    pub time_unit: String,
    pub conditions: Conditions,
    pub place: Place,
    pub description: String,
    pub variant: VariantInput,
}

impl Workout {
    /// Build a running workout. Inputs are not validated here.
    pub fn running(
        id: String,
        created_at: DateTime<Local>,
        coords: Coords,
        distance: f64,
        duration: f64,
        cadence: f64,
    ) -> Self {
        let kind = WorkoutKind::Running {
            cadence,
            pace: calc_pace(distance, duration),
        };
        Self::build(id, created_at, coords, distance, duration, kind)
    }

    /// Build a cycling workout. Inputs are not validated here.
    pub fn cycling(
        id: String,
        created_at: DateTime<Local>,
        coords: Coords,
        distance: f64,
        duration: f64,
        elevation_gain: f64,
    ) -> Self {
        let kind = WorkoutKind::Cycling {
            elevation_gain,
            speed: calc_speed(distance, duration),
        };
        Self::build(id, created_at, coords, distance, duration, kind)
    }

    /// Build whichever variant `input` describes.
    pub fn create(id: String, created_at: DateTime<Local>, input: &NewWorkout) -> Self {
        match input.variant {
            VariantInput::Running { cadence } => Self::running(
                id,
                created_at,
                input.coords,
                input.distance,
                input.duration,
                cadence,
            ),
            VariantInput::Cycling { elevation_gain } => Self::cycling(
                id,
                created_at,
                input.coords,
                input.distance,
                input.duration,
                elevation_gain,
            ),
        }
    }

    fn build(
        id: String,
        created_at: DateTime<Local>,
        coords: Coords,
        distance: f64,
        duration: f64,
        kind: WorkoutKind,
    ) -> Self {
        Self {
            id,
            date: created_at.with_timezone(&Utc),
            coords,
            distance,
            duration,
            time: created_at.format("%I:%M").to_string(),
            time_unit: created_at.format("%p").to_string(),
            conditions: Conditions::default(),
            place: Place::unknown(),
            description: describe(kind.tag(), &created_at),
            kind,
            marker: None,
        }
    }

    /// Rebuild a workout from stored fields. The derived metric is recomputed
    /// rather than trusted.
    pub fn from_parts(parts: WorkoutParts) -> Self {
        let WorkoutParts {
            id,
            date,
            coords,
            distance,
            duration,
            time,
            time_unit,
            conditions,
            place,
            description,
            variant,
        } = parts;

        let kind = match variant {
            VariantInput::Running { cadence } => WorkoutKind::Running { cadence, pace: 0.0 },
            VariantInput::Cycling { elevation_gain } => WorkoutKind::Cycling {
                elevation_gain,
                speed: 0.0,
            },
        };

        let mut w = Self {
            id,
            date,
            coords,
            distance,
            duration,
            time,
            time_unit,
            conditions,
            place,
            description,
            kind,
            marker: None,
        };
        w.recompute_metric();
        w
    }

    #[must_use]
    pub fn with_conditions(mut self, conditions: Conditions) -> Self {
        self.conditions = conditions;
        self
    }

    #[must_use]
    pub fn with_place(mut self, place: Place) -> Self {
        self.place = place;
        self
    }

    /// Re-derive pace or speed from the current distance and duration.
    pub fn recompute_metric(&mut self) {
        match &mut self.kind {
            WorkoutKind::Running { pace, .. } => *pace = calc_pace(self.distance, self.duration),
            WorkoutKind::Cycling { speed, .. } => *speed = calc_speed(self.distance, self.duration),
        }
    }

    /// Overwrite distance, duration and the variant value, then recompute the
    /// derived metric. Identity, description and timestamps are untouched.
    pub fn apply_edit(&mut self, distance: f64, duration: f64, variant_value: f64) {
        self.distance = distance;
        self.duration = duration;
        match &mut self.kind {
            WorkoutKind::Running { cadence, .. } => *cadence = variant_value,
            WorkoutKind::Cycling { elevation_gain, .. } => *elevation_gain = variant_value,
        }
        self.recompute_metric();
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub const fn date(&self) -> DateTime<Utc> {
        self.date
    }

    pub const fn coords(&self) -> Coords {
        self.coords
    }

    pub const fn distance(&self) -> f64 {
        self.distance
    }

    pub const fn duration(&self) -> f64 {
        self.duration
    }

    pub fn time(&self) -> &str {
        &self.time
    }

    pub fn time_unit(&self) -> &str {
        &self.time_unit
    }

    pub const fn conditions(&self) -> &Conditions {
        &self.conditions
    }

    pub const fn place(&self) -> &Place {
        &self.place
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub const fn kind(&self) -> &WorkoutKind {
        &self.kind
    }

    pub const fn tag(&self) -> WorkoutKindTag {
        self.kind.tag()
    }

    /// Pace for running, speed for cycling.
    pub const fn metric(&self) -> f64 {
        match self.kind {
            WorkoutKind::Running { pace, .. } => pace,
            WorkoutKind::Cycling { speed, .. } => speed,
        }
    }

    /// Text shown in the map marker popup.
    pub fn popup_content(&self) -> String {
        format!("{} {}", self.tag().emoji(), self.description)
    }
}

/// `"Running on March 14"`.
fn describe(tag: WorkoutKindTag, created_at: &DateTime<Local>) -> String {
    let kind = tag.as_str();
    let mut chars = kind.chars();
    let capitalized = chars
        .next()
        .map(|c| c.to_uppercase().chain(chars).collect::<String>())
        .unwrap_or_default();
    let month = MONTHS[created_at.month0() as usize];
    format!("{capitalized} on {month} {}", created_at.day())
}
