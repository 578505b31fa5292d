//! Workout log pinned to map locations.
//!
//! [`coordinator::Coordinator`] owns the [`collection::WorkoutLog`] and keeps
//! it in step with a [`storage::DurableStore`], a [`coordinator::MapSurface`]
//! and a [`coordinator::Renderer`].

pub mod cli;
pub mod codec;
pub mod collection;
pub mod coordinator;
pub mod error;
pub mod gpx;
pub mod lookup;
pub mod render;
pub mod storage;
pub mod types;
pub mod utils;
pub mod workout;
