//! JSON encoding of the workout log for the durable store.
//!
//! Each workout is written as a flat record tagged with `"type"`. On load the
//! tag picks which variant gets rebuilt; records that cannot be rebuilt are
//! skipped with a warning instead of failing the whole load.

use crate::collection::{WorkoutLog, validate, validate_coords};
use crate::error::{Result, WorkoutError};
use crate::types::{Conditions, Coords, Place, VariantInput, WorkoutKindTag};
use crate::workout::{Workout, WorkoutKind, WorkoutParts};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

/// Key of the single durable slot.
pub const STORE_KEY: &str = "workouts";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WorkoutRecord {
    #[serde(rename = "type")]
    kind: String,
    id: String,
    date: DateTime<Utc>,
    coords: Coords,
    distance: f64,
    duration: f64,
    time: String,
    tunit: String,
    temp: Option<i32>,
    icon: Option<String>,
    city: String,
    country: String,
    description: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    cadence: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pace: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    elev_gain: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    speed: Option<f64>,
}

impl From<&Workout> for WorkoutRecord {
    fn from(w: &Workout) -> Self {
        let (cadence, pace, elev_gain, speed) = match *w.kind() {
            WorkoutKind::Running { cadence, pace } => (Some(cadence), Some(pace), None, None),
            WorkoutKind::Cycling {
                elevation_gain,
                speed,
            } => (None, None, Some(elevation_gain), Some(speed)),
        };

        Self {
            kind: w.tag().as_str().to_string(),
            id: w.id().to_string(),
            date: w.date(),
            coords: w.coords(),
            distance: w.distance(),
            duration: w.duration(),
            time: w.time().to_string(),
            tunit: w.time_unit().to_string(),
            temp: w.conditions().temperature,
            icon: w.conditions().icon.clone(),
            city: w.place().city.clone(),
            country: w.place().country.clone(),
            description: w.description().to_string(),
            cadence,
            pace,
            elev_gain,
            speed,
        }
    }
}

impl TryFrom<WorkoutRecord> for Workout {
    type Error = WorkoutError;

    fn try_from(r: WorkoutRecord) -> Result<Self> {
        let tag = WorkoutKindTag::parse(&r.kind).ok_or_else(|| {
            WorkoutError::CorruptRecord(format!("id {}: unknown type {:?}", r.id, r.kind))
        })?;

        let variant = match tag {
            WorkoutKindTag::Running => VariantInput::Running {
                cadence: r.cadence.ok_or_else(|| missing(&r.id, "cadence"))?,
            },
            WorkoutKindTag::Cycling => VariantInput::Cycling {
                elevation_gain: r.elev_gain.ok_or_else(|| missing(&r.id, "elevGain"))?,
            },
        };

        validate_coords(r.coords)
            .and_then(|()| validate(tag, r.distance, r.duration, variant.value()))
            .map_err(|e| WorkoutError::CorruptRecord(format!("id {}: {e}", r.id)))?;

        Ok(Self::from_parts(WorkoutParts {
            id: r.id,
            date: r.date,
            coords: r.coords,
            distance: r.distance,
            duration: r.duration,
            time: r.time,
            time_unit: r.tunit,
            conditions: Conditions {
                temperature: r.temp,
                icon: r.icon,
            },
            place: Place {
                city: r.city,
                country: r.country,
            },
            description: r.description,
            variant,
        }))
    }
}

fn missing(id: &str, field: &str) -> WorkoutError {
    WorkoutError::CorruptRecord(format!("id {id}: missing {field}"))
}

/// Result of decoding the durable slot.
#[derive(Debug, Default)]
pub struct Loaded {
    pub log: WorkoutLog,
    /// Records that were dropped because they could not be rebuilt.
    pub skipped: Vec<WorkoutError>,
}

/// Serialize every workout. Marker handles are not part of the record.
pub fn save(log: &WorkoutLog) -> Result<String> {
    let records: Vec<WorkoutRecord> = log.iter().map(WorkoutRecord::from).collect();
    serde_json::to_string(&records).map_err(|e| WorkoutError::CorruptRecord(e.to_string()))
}

/// Decode the durable slot. `None` means nothing was ever saved.
///
/// A payload that is not a JSON array is an error; individual bad records
/// are collected in [`Loaded::skipped`].
pub fn load(raw: Option<&str>) -> Result<Loaded> {
    let Some(raw) = raw.filter(|r| !r.trim().is_empty()) else {
        return Ok(Loaded::default());
    };

    let data: JsonValue =
        serde_json::from_str(raw).map_err(|e| WorkoutError::CorruptRecord(e.to_string()))?;
    let items = match data {
        JsonValue::Null => return Ok(Loaded::default()),
        JsonValue::Array(items) => items,
        other => {
            return Err(WorkoutError::CorruptRecord(format!(
                "expected an array, found {}",
                json_kind(&other)
            )));
        }
    };

    let total = items.len();
    let mut workouts = Vec::with_capacity(total);
    let mut skipped = Vec::new();

    for (idx, item) in items.into_iter().enumerate() {
        let decoded = serde_json::from_value::<WorkoutRecord>(item)
            .map_err(|e| WorkoutError::CorruptRecord(format!("record {idx}: {e}")))
            .and_then(Workout::try_from);

        match decoded {
            Ok(w) => workouts.push(w),
            Err(e) => {
                tracing::warn!(record = idx, err = %e, "skipping persisted workout");
                skipped.push(e);
            }
        }
    }

    let log = WorkoutLog::from_workouts(workouts);
    tracing::info!(total, loaded = log.len(), skipped = skipped.len(), "workouts loaded");

    Ok(Loaded { log, skipped })
}

const fn json_kind(v: &JsonValue) -> &'static str {
    match v {
        JsonValue::Null => "null",
        JsonValue::Bool(_) => "a boolean",
        JsonValue::Number(_) => "a number",
        JsonValue::String(_) => "a string",
        JsonValue::Array(_) => "an array",
        JsonValue::Object(_) => "an object",
    }
}
