use crate::dlog;
use crate::error::{Result, WorkoutError};
use crate::types::{
    Conditions, Coords, NewWorkout, Place, SortField, WorkoutEdit, WorkoutKindTag,
};
use crate::workout::Workout;
use chrono::{DateTime, Local};
use uuid::Uuid;

/// Ordered collection of workouts. Insertion order is creation order.
///
/// The log never knows whether a sorted view is currently shown; that toggle
/// belongs to whoever renders it.
#[derive(Debug, Default)]
pub struct WorkoutLog {
    workouts: Vec<Workout>,
}

impl WorkoutLog {
    pub const fn new() -> Self {
        Self {
            workouts: Vec::new(),
        }
    }

    /// Wrap already-restored workouts, dropping any duplicate ids after the
    /// first occurrence.
    pub fn from_workouts(workouts: Vec<Workout>) -> Self {
        let mut log = Self::new();
        for w in workouts {
            if log.contains(w.id()) {
                tracing::warn!(id = %w.id(), "dropping workout with duplicate id");
                continue;
            }
            log.workouts.push(w);
        }
        log
    }

    /// Validate, build and append a new workout.
    pub fn create(
        &mut self,
        input: &NewWorkout,
        created_at: DateTime<Local>,
        conditions: Conditions,
        place: Place,
    ) -> Result<&mut Workout> {
        validate_new(input)?;

        let id = self.fresh_id();
        let workout = Workout::create(id, created_at, input)
            .with_conditions(conditions)
            .with_place(place);
        dlog!("create id={} kind={}", workout.id(), workout.tag());

        self.workouts.push(workout);
        let last = self.workouts.len() - 1;
        Ok(&mut self.workouts[last])
    }

    /// Replace distance, duration and the variant value of an existing
    /// workout. Nothing is changed when validation fails.
    pub fn edit(&mut self, id: &str, edit: &WorkoutEdit) -> Result<&Workout> {
        let workout = self
            .workouts
            .iter_mut()
            .find(|w| w.id() == id)
            .ok_or_else(|| WorkoutError::NotFound(id.to_string()))?;

        validate(workout.tag(), edit.distance, edit.duration, edit.variant_value)?;

        workout.apply_edit(edit.distance, edit.duration, edit.variant_value);
        dlog!("edit id={id} metric={}", workout.metric());
        Ok(workout)
    }

    /// Remove the workout with `id`. Unknown ids are a no-op.
    pub fn delete(&mut self, id: &str) -> Option<Workout> {
        let idx = self.workouts.iter().position(|w| w.id() == id)?;
        Some(self.workouts.remove(idx))
    }

    /// Remove every workout, returning them in natural order.
    pub fn clear_all(&mut self) -> Vec<Workout> {
        std::mem::take(&mut self.workouts)
    }

    /// Ascending view by `field`. Ties keep natural order; the stored order is
    /// left alone.
    pub fn sorted_by(&self, field: SortField) -> Vec<&Workout> {
        let mut view: Vec<&Workout> = self.workouts.iter().collect();
        match field {
            SortField::Duration => view.sort_by(|a, b| a.duration().total_cmp(&b.duration())),
            SortField::Distance => view.sort_by(|a, b| a.distance().total_cmp(&b.distance())),
        }
        view
    }

    pub fn find_by_id(&self, id: &str) -> Result<&Workout> {
        self.workouts
            .iter()
            .find(|w| w.id() == id)
            .ok_or_else(|| WorkoutError::NotFound(id.to_string()))
    }

    pub fn contains(&self, id: &str) -> bool {
        self.workouts.iter().any(|w| w.id() == id)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Workout> {
        self.workouts.iter()
    }

    pub fn iter_mut(&mut self) -> std::slice::IterMut<'_, Workout> {
        self.workouts.iter_mut()
    }

    pub const fn len(&self) -> usize {
        self.workouts.len()
    }

    pub const fn is_empty(&self) -> bool {
        self.workouts.is_empty()
    }

    fn fresh_id(&self) -> String {
        loop {
            let id = Uuid::new_v4().simple().to_string();
            if !self.contains(&id) {
                return id;
            }
        }
    }
}

impl<'a> IntoIterator for &'a WorkoutLog {
    type Item = &'a Workout;
    type IntoIter = std::slice::Iter<'a, Workout>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// Distance, duration and cadence must be finite and strictly positive.
/// Elevation gain must be finite and may be zero.
pub fn validate(
    tag: WorkoutKindTag,
    distance: f64,
    duration: f64,
    variant_value: f64,
) -> Result<()> {
    let positive = |v: f64| v.is_finite() && v > 0.0;

    if !positive(distance) {
        return Err(WorkoutError::Validation(format!("distance {distance}")));
    }
    if !positive(duration) {
        return Err(WorkoutError::Validation(format!("duration {duration}")));
    }
    match tag {
        WorkoutKindTag::Running if !positive(variant_value) => {
            Err(WorkoutError::Validation(format!("cadence {variant_value}")))
        }
        WorkoutKindTag::Cycling if !(variant_value.is_finite() && variant_value >= 0.0) => Err(
            WorkoutError::Validation(format!("elevation gain {variant_value}")),
        ),
        _ => Ok(()),
    }
}

/// Coordinates that serialize and read back as numbers.
pub fn validate_coords(coords: Coords) -> Result<()> {
    if coords.is_on_map() {
        Ok(())
    } else {
        Err(WorkoutError::Validation(format!("coordinates {},{}", coords.lat, coords.lng)))
    }
}

/// Every check a new workout has to pass before anything is looked up or
/// stored.
pub fn validate_new(input: &NewWorkout) -> Result<()> {
    validate_coords(input.coords)?;
    validate(input.variant.tag(), input.distance, input.duration, input.variant.value())
}
