#![deny(
    warnings,
    clippy::all,
    clippy::pedantic,
    clippy::nursery,
    clippy::cargo
)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

use anyhow::{Context, Result};
use clap::Parser;
use mapty::cli::{AddKind, Cli, Cmd};
use mapty::coordinator::Coordinator;
use mapty::gpx::WaypointMap;
use mapty::lookup::{self, FixedPosition, GeolocationProvider};
use mapty::render::{TextRenderer, format_row};
use mapty::storage::{DurableStore, SqliteStore, UnavailableStore};
use mapty::types::{NewWorkout, VariantInput, WorkoutEdit};
use mapty::utils::{format_duration, minutes_to_duration};
use std::io::{self, Write};

#[macro_use]
extern crate mapty;

type App = Coordinator<WaypointMap, TextRenderer>;

fn main() -> Result<()> {
    let cli = Cli::parse();
    mapty::utils::init_logging(cli.verbose, cli.quiet);

    let geolocation = FixedPosition(cli.position());
    let home = match geolocation.position() {
        Ok(at) => Some(at),
        Err(e) => {
            dlog!("{e}");
            None
        }
    };

    let store: Box<dyn DurableStore> = match SqliteStore::open(&cli.store) {
        Ok(store) => Box::new(store),
        Err(e) => {
            tracing::error!(err = %e, "falling back to in-memory storage");
            Box::new(UnavailableStore::new(&e))
        }
    };

    let mut app = Coordinator::start(store, WaypointMap::new(home), TextRenderer::new());
    let outcome = run(&mut app, &cli, &geolocation);

    let mut err = io::stderr().lock();
    for notice in app.renderer().notices() {
        writeln!(err, "\u{1F4A5} {notice} \u{1F4A5}")?;
    }

    outcome
}

fn run(app: &mut App, cli: &Cli, geolocation: &dyn GeolocationProvider) -> Result<()> {
    let mut out = io::stdout().lock();

    match &cli.cmd {
        Cmd::Add { kind } => {
            let (distance, duration, variant, at) = match *kind {
                AddKind::Running {
                    distance,
                    duration,
                    cadence,
                    at,
                } => (distance, duration, VariantInput::Running { cadence }, at),
                AddKind::Cycling {
                    distance,
                    duration,
                    elevation,
                    at,
                } => (
                    distance,
                    duration,
                    VariantInput::Cycling {
                        elevation_gain: elevation,
                    },
                    at,
                ),
            };

            let coords = match at {
                Some(at) => at,
                None => geolocation.position()?,
            };
            let input = NewWorkout {
                coords,
                distance,
                duration,
                variant,
            };

            let cfg = cli.lookup_config();
            let (weather, place) = lookup::from_config(&cfg)?;
            let w = app.create(&input, weather.as_ref(), place.as_ref(), cfg.policy)?;
            writeln!(out, "{}", format_row(w))?;
        }
        Cmd::Edit {
            id,
            distance,
            duration,
            value,
        } => {
            let edit = WorkoutEdit {
                distance: *distance,
                duration: *duration,
                variant_value: *value,
            };
            let w = app.edit(id, &edit)?;
            writeln!(out, "{}", format_row(w))?;
        }
        Cmd::Delete { id } => {
            if app.delete(id) {
                writeln!(out, "deleted {id}")?;
            } else {
                writeln!(out, "nothing to delete for {id}")?;
            }
        }
        Cmd::Clear => {
            let n = app.log().len();
            app.clear_all();
            writeln!(out, "cleared {n} workout(s)")?;
        }
        Cmd::List { sort } => {
            if let Some(field) = *sort {
                app.sort(field);
            }
            app.renderer().print(&mut out)?;
            print_totals(app, &mut out)?;
        }
        Cmd::ShowAll => {
            app.show_all();
            match app.map().view() {
                Some(b) => writeln!(out, "{} .. {}", b.south_west, b.north_east)?,
                None => writeln!(out, "no markers")?,
            }
        }
        Cmd::Focus { id } => {
            app.focus(id)?;
            if let Some(c) = app.map().center() {
                writeln!(out, "{c}")?;
            }
        }
        Cmd::ExportGpx { path } => {
            app.show_all();
            app.map()
                .write_gpx_file(path)
                .with_context(|| format!("exporting markers to {}", path.display()))?;
            writeln!(out, "wrote {} waypoint(s) to {}", app.map().len(), path.display())?;
        }
        Cmd::Reset => {
            app.reset();
            writeln!(out, "saved workouts removed")?;
        }
    }

    Ok(())
}

fn print_totals(app: &App, out: &mut impl Write) -> Result<()> {
    let log = app.log();
    if log.is_empty() {
        return Ok(());
    }
    let distance: f64 = log.iter().map(mapty::workout::Workout::distance).sum();
    let minutes: f64 = log.iter().map(mapty::workout::Workout::duration).sum();
    writeln!(
        out,
        "total\t{} workout(s)\t{distance:.1} km\t{}",
        log.len(),
        format_duration(minutes_to_duration(minutes))
    )?;
    Ok(())
}
