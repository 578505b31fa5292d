//! Keeps the workout log, the durable store, the map and the rendered list
//! in step. Every mutation goes through here so each surface hears about it
//! exactly once.

use crate::codec::{self, STORE_KEY};
use crate::collection::{WorkoutLog, validate_new};
use crate::dlog;
use crate::error::{Result, WorkoutError};
use crate::lookup::{self, LookupPolicy, PlaceLookup, WeatherLookup};
use crate::storage::{DurableStore, MemoryStore};
use crate::types::{Coords, MarkerHandle, NewWorkout, SortField, WorkoutEdit};
use crate::workout::Workout;
use chrono::Local;

/// Displays workout rows. Holds no state of its own beyond what it is told.
pub trait Renderer {
    fn append_row(&mut self, workout: &Workout);
    fn remove_row(&mut self, id: &str);
    fn replace_row(&mut self, id: &str, workout: &Workout);
    fn clear_rows(&mut self);
    /// Toggle the hint shown when there are no workouts.
    fn set_empty_state(&mut self, empty: bool);
    /// Non-fatal message for the user.
    fn notify(&mut self, message: &str);
}

/// Draws markers. Handles are opaque and must not be persisted.
pub trait MapSurface {
    fn add_marker(&mut self, at: Coords, popup: &str) -> MarkerHandle;
    fn remove_marker(&mut self, handle: MarkerHandle);
    fn fit_to_markers(&mut self, handles: &[MarkerHandle]);
    fn recenter(&mut self, at: Coords);
}

pub struct Coordinator<M, R> {
    log: WorkoutLog,
    store: Box<dyn DurableStore>,
    map: M,
    renderer: R,
    sorted: bool,
    degraded: bool,
}

impl<M: MapSurface, R: Renderer> Coordinator<M, R> {
    /// Restore the log from `store` and draw every workout, in stored order.
    /// Nothing is written back.
    pub fn start(store: Box<dyn DurableStore>, map: M, renderer: R) -> Self {
        let mut this = Self {
            log: WorkoutLog::new(),
            store,
            map,
            renderer,
            sorted: false,
            degraded: false,
        };

        let raw = match this.store.get(STORE_KEY) {
            Ok(raw) => raw,
            Err(e) => {
                this.degrade(&e);
                None
            }
        };

        match codec::load(raw.as_deref()) {
            Ok(loaded) => {
                if !loaded.skipped.is_empty() {
                    this.renderer.notify(&format!(
                        "{} saved workout(s) could not be read and were skipped",
                        loaded.skipped.len()
                    ));
                }
                this.log = loaded.log;
            }
            Err(e) => {
                tracing::error!(err = %e, "saved workouts unreadable; starting empty");
                this.renderer.notify(&e.to_string());
            }
        }

        for w in this.log.iter_mut() {
            this.renderer.append_row(w);
            w.marker = Some(this.map.add_marker(w.coords(), &w.popup_content()));
        }
        this.renderer.set_empty_state(this.log.is_empty());

        this
    }

    /// Validate `input`, look up weather and place, then append, draw and save.
    pub fn create(
        &mut self,
        input: &NewWorkout,
        weather: &dyn WeatherLookup,
        place: &dyn PlaceLookup,
        policy: LookupPolicy,
    ) -> Result<&Workout> {
        validate_new(input)?;

        let annotations = lookup::annotate(weather, place, input.coords, policy)?;
        for notice in &annotations.notices {
            self.renderer.notify(notice);
        }

        let w = self
            .log
            .create(input, Local::now(), annotations.conditions, annotations.place)?;
        w.marker = Some(self.map.add_marker(w.coords(), &w.popup_content()));
        self.renderer.append_row(w);
        let id = w.id().to_string();

        self.renderer.set_empty_state(false);
        self.save();
        tracing::info!(%id, "workout created");

        self.log.find_by_id(&id)
    }

    /// Update an existing workout in place. Its marker stays where it is.
    pub fn edit(&mut self, id: &str, edit: &WorkoutEdit) -> Result<&Workout> {
        let w = self.log.edit(id, edit)?;
        self.renderer.replace_row(id, w);
        self.save();
        tracing::info!(%id, "workout edited");
        self.log.find_by_id(id)
    }

    /// Remove a workout. Returns `false` when no workout has `id`.
    pub fn delete(&mut self, id: &str) -> bool {
        let Some(w) = self.log.delete(id) else {
            dlog!("delete of unknown id={id} ignored");
            return false;
        };
        if let Some(handle) = w.marker {
            self.map.remove_marker(handle);
        }
        self.renderer.remove_row(id);
        if self.log.is_empty() {
            self.renderer.set_empty_state(true);
        }
        self.save();
        tracing::info!(%id, "workout deleted");
        true
    }

    /// Remove every workout and save the empty log.
    pub fn clear_all(&mut self) {
        self.discard_all();
        self.save();
        tracing::info!("all workouts cleared");
    }

    /// Forget the saved state entirely, rather than saving an empty log.
    pub fn reset(&mut self) {
        self.discard_all();
        if let Err(e) = self.store.remove(STORE_KEY) {
            self.degrade(&e);
        }
        tracing::info!("saved workouts reset");
    }

    fn discard_all(&mut self) {
        for handle in self.log.iter().filter_map(|w| w.marker) {
            self.map.remove_marker(handle);
        }
        self.log.clear_all();
        self.renderer.clear_rows();
        self.renderer.set_empty_state(true);
        self.sorted = false;
    }

    /// Show the list sorted by `field`, or go back to natural order if a
    /// sorted view is already showing.
    pub fn sort(&mut self, field: SortField) {
        if self.sorted {
            self.restore_natural_order();
            return;
        }
        self.renderer.clear_rows();
        for w in self.log.sorted_by(field) {
            self.renderer.append_row(w);
        }
        self.sorted = true;
    }

    pub fn restore_natural_order(&mut self) {
        self.renderer.clear_rows();
        for w in &self.log {
            self.renderer.append_row(w);
        }
        self.sorted = false;
    }

    /// Fit the map to every workout marker.
    pub fn show_all(&mut self) {
        let handles: Vec<MarkerHandle> = self.log.iter().filter_map(|w| w.marker).collect();
        self.map.fit_to_markers(&handles);
    }

    /// Center the map on one workout.
    pub fn focus(&mut self, id: &str) -> Result<()> {
        let at = self.log.find_by_id(id)?.coords();
        self.map.recenter(at);
        Ok(())
    }

    pub const fn log(&self) -> &WorkoutLog {
        &self.log
    }

    pub const fn map(&self) -> &M {
        &self.map
    }

    pub const fn renderer(&self) -> &R {
        &self.renderer
    }

    pub const fn is_sorted(&self) -> bool {
        self.sorted
    }

    /// True once the durable store failed and changes only live in memory.
    pub const fn is_degraded(&self) -> bool {
        self.degraded
    }

    /// Overwrite the durable slot with the whole log.
    fn save(&mut self) {
        let raw = match codec::save(&self.log) {
            Ok(raw) => raw,
            Err(e) => {
                tracing::error!(err = %e, "could not encode workouts");
                self.renderer.notify(&e.to_string());
                return;
            }
        };

        if let Err(e) = self.store.set(STORE_KEY, &raw) {
            self.degrade(&e);
            if let Err(e) = self.store.set(STORE_KEY, &raw) {
                tracing::error!(err = %e, "in-memory store rejected write");
            }
        }
    }

    /// Switch to an in-memory store, telling the user once.
    fn degrade(&mut self, err: &WorkoutError) {
        if self.degraded {
            return;
        }
        self.degraded = true;
        tracing::warn!(err = %err, "durable store unavailable; keeping workouts in memory");
        self.renderer.notify(&format!("{err}; changes will only last for this session"));
        self.store = Box::new(MemoryStore::new());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lookup::{OfflinePlace, OfflineWeather};
    use crate::types::VariantInput;
    use std::cell::RefCell;
    use std::collections::BTreeMap;
    use std::rc::Rc;

    #[derive(Default)]
    struct RecordingRenderer {
        calls: Vec<String>,
        rows: Vec<String>,
        empty: Option<bool>,
    }

    impl Renderer for RecordingRenderer {
        fn append_row(&mut self, workout: &Workout) {
            self.calls.push(format!("append:{}", workout.id()));
            self.rows.push(workout.id().to_string());
        }
        fn remove_row(&mut self, id: &str) {
            self.calls.push(format!("remove:{id}"));
            self.rows.retain(|r| r != id);
        }
        fn replace_row(&mut self, id: &str, workout: &Workout) {
            self.calls.push(format!("replace:{id}:{}", workout.metric()));
        }
        fn clear_rows(&mut self) {
            self.calls.push("clear".into());
            self.rows.clear();
        }
        fn set_empty_state(&mut self, empty: bool) {
            self.empty = Some(empty);
        }
        fn notify(&mut self, message: &str) {
            self.calls.push(format!("notify:{message}"));
        }
    }

    #[derive(Default)]
    struct RecordingMap {
        next: u64,
        markers: BTreeMap<MarkerHandle, Coords>,
        added: usize,
        removed: usize,
        fitted: Vec<MarkerHandle>,
        center: Option<Coords>,
    }

    impl MapSurface for RecordingMap {
        fn add_marker(&mut self, at: Coords, _popup: &str) -> MarkerHandle {
            self.next += 1;
            let h = MarkerHandle(self.next);
            self.markers.insert(h, at);
            self.added += 1;
            h
        }
        fn remove_marker(&mut self, handle: MarkerHandle) {
            assert!(self.markers.remove(&handle).is_some(), "unknown marker");
            self.removed += 1;
        }
        fn fit_to_markers(&mut self, handles: &[MarkerHandle]) {
            self.fitted = handles.to_vec();
        }
        fn recenter(&mut self, at: Coords) {
            self.center = Some(at);
        }
    }

    #[derive(Default)]
    struct SlotState {
        value: Option<String>,
        writes: usize,
        broken: bool,
    }

    #[derive(Clone, Default)]
    struct SharedStore(Rc<RefCell<SlotState>>);

    impl DurableStore for SharedStore {
        fn get(&self, _key: &str) -> Result<Option<String>> {
            let s = self.0.borrow();
            if s.broken {
                return Err(WorkoutError::StorageUnavailable("disk gone".into()));
            }
            Ok(s.value.clone())
        }
        fn set(&mut self, key: &str, value: &str) -> Result<()> {
            assert_eq!(key, STORE_KEY);
            let mut s = self.0.borrow_mut();
            if s.broken {
                return Err(WorkoutError::StorageUnavailable("disk gone".into()));
            }
            s.value = Some(value.to_string());
            s.writes += 1;
            Ok(())
        }
        fn remove(&mut self, _key: &str) -> Result<()> {
            self.0.borrow_mut().value = None;
            Ok(())
        }
    }

    type TestCoordinator = Coordinator<RecordingMap, RecordingRenderer>;

    fn start(store: &SharedStore) -> TestCoordinator {
        Coordinator::start(
            Box::new(store.clone()),
            RecordingMap::default(),
            RecordingRenderer::default(),
        )
    }

    fn run(distance: f64, duration: f64, cadence: f64) -> NewWorkout {
        NewWorkout {
            coords: Coords::new(48.11, -1.68),
            distance,
            duration,
            variant: VariantInput::Running { cadence },
        }
    }

    fn ride(distance: f64, duration: f64, elevation_gain: f64) -> NewWorkout {
        NewWorkout {
            coords: Coords::new(47.2, -1.55),
            distance,
            duration,
            variant: VariantInput::Cycling { elevation_gain },
        }
    }

    fn add(c: &mut TestCoordinator, input: &NewWorkout) -> String {
        c.create(input, &OfflineWeather, &OfflinePlace, LookupPolicy::Abort)
            .unwrap()
            .id()
            .to_string()
    }

    #[test]
    fn create_draws_once_on_each_surface_and_saves() {
        let store = SharedStore::default();
        let mut c = start(&store);
        assert_eq!(c.renderer().empty, Some(true));

        let w = c
            .create(&run(5.0, 30.0, 150.0), &OfflineWeather, &OfflinePlace, LookupPolicy::Abort)
            .unwrap();
        assert_eq!(w.metric(), 6.0);
        assert!(w.description().starts_with("Running on "));
        assert!(w.marker.is_some());
        let id = w.id().to_string();

        assert_eq!(c.map().added, 1);
        assert_eq!(c.renderer().calls, vec![format!("append:{id}")]);
        assert_eq!(c.renderer().empty, Some(false));
        assert_eq!(store.0.borrow().writes, 1);
        assert!(!store.0.borrow().value.as_ref().unwrap().contains("marker"));
    }

    #[test]
    fn cycling_scenario_speed() {
        let store = SharedStore::default();
        let mut c = start(&store);
        let w = c
            .create(&ride(20.0, 60.0, 100.0), &OfflineWeather, &OfflinePlace, LookupPolicy::Abort)
            .unwrap();
        assert_eq!(w.metric(), 20.0);
    }

    #[test]
    fn invalid_create_touches_nothing() {
        let store = SharedStore::default();
        let mut c = start(&store);
        let err = c
            .create(&run(5.0, -1.0, 150.0), &OfflineWeather, &OfflinePlace, LookupPolicy::Abort)
            .unwrap_err();
        assert!(matches!(err, WorkoutError::Validation(_)));
        assert!(c.log().is_empty());
        assert_eq!(c.map().added, 0);
        assert!(c.renderer().calls.is_empty());
        assert_eq!(store.0.borrow().writes, 0);
    }

    #[test]
    fn create_rejects_unplottable_coordinates() {
        let store = SharedStore::default();
        let mut c = start(&store);
        let input = NewWorkout {
            coords: Coords::new(f64::NAN, 0.0),
            ..run(5.0, 30.0, 150.0)
        };
        let err = c
            .create(&input, &OfflineWeather, &OfflinePlace, LookupPolicy::Abort)
            .unwrap_err();
        assert!(matches!(err, WorkoutError::Validation(_)));
        assert!(c.log().is_empty());
        assert_eq!(c.map().added, 0);
        assert_eq!(store.0.borrow().writes, 0);
        assert!(store.0.borrow().value.is_none());
    }

    #[test]
    fn edit_replaces_row_and_keeps_marker() {
        let store = SharedStore::default();
        let mut c = start(&store);
        let id = add(&mut c, &run(5.0, 30.0, 150.0));
        let marker = c.log().find_by_id(&id).unwrap().marker;

        let w = c
            .edit(
                &id,
                &WorkoutEdit {
                    distance: 10.0,
                    duration: 50.0,
                    variant_value: 150.0,
                },
            )
            .unwrap();
        assert_eq!(w.metric(), 5.0);
        assert_eq!(w.marker, marker);
        assert_eq!(c.renderer().calls.last().unwrap(), &format!("replace:{id}:5"));
        assert_eq!(c.map().added, 1);
        assert_eq!(store.0.borrow().writes, 2);

        let missing = c.edit(
            "nope",
            &WorkoutEdit {
                distance: 1.0,
                duration: 1.0,
                variant_value: 1.0,
            },
        );
        assert!(matches!(missing, Err(WorkoutError::NotFound(_))));
        assert_eq!(store.0.borrow().writes, 2);
    }

    #[test]
    fn delete_last_restores_empty_state() {
        let store = SharedStore::default();
        let mut c = start(&store);
        let id = add(&mut c, &run(5.0, 30.0, 150.0));

        assert!(!c.delete("unknown"));
        assert_eq!(store.0.borrow().writes, 1);

        assert!(c.delete(&id));
        assert!(c.log().is_empty());
        assert_eq!(c.map().removed, 1);
        assert!(c.map().markers.is_empty());
        assert!(c.renderer().rows.is_empty());
        assert_eq!(c.renderer().empty, Some(true));
        assert_eq!(store.0.borrow().value.as_deref(), Some("[]"));
    }

    #[test]
    fn clear_all_removes_markers_rows_and_saves() {
        let store = SharedStore::default();
        let mut c = start(&store);
        add(&mut c, &run(5.0, 30.0, 150.0));
        add(&mut c, &ride(20.0, 60.0, 100.0));

        c.clear_all();
        assert!(c.log().is_empty());
        assert!(c.map().markers.is_empty());
        assert!(c.renderer().rows.is_empty());
        assert_eq!(c.renderer().empty, Some(true));
        assert_eq!(store.0.borrow().value.as_deref(), Some("[]"));
    }

    #[test]
    fn restart_redraws_without_saving() {
        let store = SharedStore::default();
        let mut c = start(&store);
        let a = add(&mut c, &run(5.0, 30.0, 150.0));
        let b = add(&mut c, &ride(20.0, 60.0, 100.0));
        drop(c);
        let writes = store.0.borrow().writes;

        let mut c = start(&store);
        assert_eq!(c.renderer().rows, vec![a.clone(), b]);
        assert_eq!(c.map().added, 2);
        assert_eq!(c.renderer().empty, Some(false));
        assert_eq!(store.0.borrow().writes, writes);

        let w = c
            .edit(
                &a,
                &WorkoutEdit {
                    distance: 10.0,
                    duration: 50.0,
                    variant_value: 150.0,
                },
            )
            .unwrap();
        assert_eq!(w.metric(), 5.0);
    }

    #[test]
    fn corrupt_record_is_skipped_on_start() {
        let store = SharedStore::default();
        let mut c = start(&store);
        add(&mut c, &run(5.0, 30.0, 150.0));
        add(&mut c, &ride(20.0, 60.0, 100.0));
        drop(c);

        {
            let mut s = store.0.borrow_mut();
            let mut data: serde_json::Value =
                serde_json::from_str(s.value.as_ref().unwrap()).unwrap();
            let mut bogus = data[0].clone();
            bogus["type"] = "rowing".into();
            bogus["id"] = "bogus".into();
            data.as_array_mut().unwrap().push(bogus);
            s.value = Some(data.to_string());
        }

        let c = start(&store);
        assert_eq!(c.log().len(), 2);
        assert_eq!(c.map().added, 2);
        assert!(c.renderer().calls.iter().any(|m| m.starts_with("notify:1 saved workout")));
    }

    #[test]
    fn sort_twice_restores_natural_order() {
        let store = SharedStore::default();
        let mut c = start(&store);
        let a = add(&mut c, &run(5.0, 45.0, 150.0));
        let b = add(&mut c, &ride(30.0, 20.0, 10.0));
        let d = add(&mut c, &run(2.0, 30.0, 160.0));
        let writes = store.0.borrow().writes;

        c.sort(SortField::Duration);
        assert!(c.is_sorted());
        assert_eq!(c.renderer().rows, vec![b.clone(), d.clone(), a.clone()]);

        c.sort(SortField::Duration);
        assert!(!c.is_sorted());
        assert_eq!(c.renderer().rows, vec![a.clone(), b.clone(), d.clone()]);

        c.sort(SortField::Distance);
        assert_eq!(c.renderer().rows, vec![d, a, b]);

        assert_eq!(c.map().added, 3);
        assert_eq!(c.map().removed, 0);
        assert_eq!(store.0.borrow().writes, writes);
    }

    #[test]
    fn broken_store_degrades_once() {
        let store = SharedStore::default();
        store.0.borrow_mut().broken = true;
        let mut c = start(&store);
        assert!(c.is_degraded());

        add(&mut c, &run(5.0, 30.0, 150.0));
        add(&mut c, &run(6.0, 30.0, 150.0));
        let notices = c
            .renderer()
            .calls
            .iter()
            .filter(|m| m.starts_with("notify:"))
            .count();
        assert_eq!(notices, 1);
        assert_eq!(c.log().len(), 2);
    }

    #[test]
    fn store_failing_mid_session_keeps_writes_in_memory() {
        let store = SharedStore::default();
        let mut c = start(&store);
        add(&mut c, &run(5.0, 30.0, 150.0));
        assert!(!c.is_degraded());
        assert_eq!(store.0.borrow().writes, 1);

        store.0.borrow_mut().broken = true;
        add(&mut c, &run(6.0, 30.0, 150.0));
        add(&mut c, &ride(20.0, 60.0, 100.0));
        assert!(c.is_degraded());

        let notices: Vec<&String> = c
            .renderer()
            .calls
            .iter()
            .filter(|m| m.starts_with("notify:"))
            .collect();
        assert_eq!(notices.len(), 1);
        assert!(notices[0].contains("disk gone"));

        assert_eq!(store.0.borrow().writes, 1);
        let raw = c.store.get(STORE_KEY).unwrap();
        let loaded = codec::load(raw.as_deref()).unwrap();
        assert_eq!(loaded.log.len(), 3);
    }

    #[test]
    fn show_all_and_focus() {
        let store = SharedStore::default();
        let mut c = start(&store);
        let a = add(&mut c, &run(5.0, 30.0, 150.0));
        add(&mut c, &ride(20.0, 60.0, 100.0));

        c.show_all();
        assert_eq!(c.map().fitted.len(), 2);

        c.focus(&a).unwrap();
        assert_eq!(c.map().center, Some(Coords::new(48.11, -1.68)));
        assert!(matches!(c.focus("missing"), Err(WorkoutError::NotFound(_))));
    }

    #[test]
    fn reset_removes_saved_slot() {
        let store = SharedStore::default();
        let mut c = start(&store);
        add(&mut c, &run(5.0, 30.0, 150.0));
        c.reset();
        assert!(c.log().is_empty());
        assert!(store.0.borrow().value.is_none());
    }
}
