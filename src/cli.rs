use crate::lookup::{LookupConfig, LookupPolicy};
use crate::types::{Coords, SortField};
use clap::{ArgAction, Parser, Subcommand};
use std::path::PathBuf;
use std::time::Duration;

const DEFAULT_STORE: &str = "mapty.sqlite";
const DEFAULT_LOOKUP_TIMEOUT_SECS: u64 = 10;

#[derive(Parser, Debug)]
#[command(
    name = "mapty",
    about = "Log running and cycling workouts pinned to map locations"
)]
pub struct Cli {
    /// SQLite file holding saved workouts.
    #[arg(long, env = "MAPTY_STORE", default_value = DEFAULT_STORE, global = true)]
    pub store: PathBuf,

    /// OpenWeatherMap API key.
    #[arg(long, env = "MAPTY_WEATHER_KEY", hide_env_values = true)]
    pub weather_key: Option<String>,

    /// LocationIQ API key.
    #[arg(long, env = "MAPTY_PLACE_KEY", hide_env_values = true)]
    pub place_key: Option<String>,

    /// Never call the weather or place services.
    #[arg(long, global = true)]
    pub offline: bool,

    /// Seconds to wait for each lookup.
    #[arg(long, default_value_t = DEFAULT_LOOKUP_TIMEOUT_SECS)]
    pub lookup_timeout: u64,

    /// What to do when a weather or place lookup fails.
    #[arg(long, value_enum, default_value_t = LookupPolicy::Substitute)]
    pub on_lookup_failure: LookupPolicy,

    /// Your latitude. New workouts are placed here unless `--at` is given.
    #[arg(
        long,
        value_parser = parse_lat,
        allow_hyphen_values = true,
        requires = "lng",
        global = true
    )]
    pub lat: Option<f64>,

    /// Your longitude.
    #[arg(
        long,
        value_parser = parse_lng,
        allow_hyphen_values = true,
        requires = "lat",
        global = true
    )]
    pub lng: Option<f64>,

    /// Increase log verbosity (-v, -vv). Defaults to INFO.
    #[arg(short = 'v', long, action = ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Decrease log verbosity (-q, -qq). Defaults to INFO.
    #[arg(short = 'q', long, action = ArgAction::Count, global = true)]
    pub quiet: u8,

    #[command(subcommand)]
    pub cmd: Cmd,
}

impl Cli {
    pub fn position(&self) -> Option<Coords> {
        Some(Coords::new(self.lat?, self.lng?))
    }

    pub fn lookup_config(&self) -> LookupConfig {
        LookupConfig {
            weather_key: self.weather_key.clone(),
            place_key: self.place_key.clone(),
            offline: self.offline,
            timeout: Duration::from_secs(self.lookup_timeout),
            policy: self.on_lookup_failure,
        }
    }
}

#[derive(Subcommand, Debug)]
pub enum Cmd {
    /// Log a new workout.
    Add {
        #[command(subcommand)]
        kind: AddKind,
    },

    /// Change distance, duration and cadence/elevation of a workout.
    Edit {
        id: String,
        #[arg(long, allow_hyphen_values = true)]
        distance: f64,
        #[arg(long, allow_hyphen_values = true)]
        duration: f64,
        /// Cadence (running) or elevation gain (cycling).
        #[arg(long, allow_hyphen_values = true)]
        value: f64,
    },

    /// Delete one workout.
    Delete { id: String },

    /// Delete every workout.
    Clear,

    /// List workouts, in the order they were logged unless `--sort` is given.
    List {
        #[arg(long, value_enum)]
        sort: Option<SortField>,
    },

    /// Print the map area covering every workout.
    ShowAll,

    /// Center the map on one workout.
    Focus { id: String },

    /// Write every workout marker to a GPX file.
    ExportGpx { path: PathBuf },

    /// Forget all saved workouts.
    Reset,
}

#[derive(Subcommand, Debug)]
pub enum AddKind {
    Running {
        /// Kilometres.
        #[arg(long, allow_hyphen_values = true)]
        distance: f64,
        /// Minutes.
        #[arg(long, allow_hyphen_values = true)]
        duration: f64,
        /// Steps per minute.
        #[arg(long, allow_hyphen_values = true)]
        cadence: f64,
        /// Workout location as LAT,LNG.
        #[arg(long, value_parser = parse_coords, allow_hyphen_values = true)]
        at: Option<Coords>,
    },
    Cycling {
        /// Kilometres.
        #[arg(long, allow_hyphen_values = true)]
        distance: f64,
        /// Minutes.
        #[arg(long, allow_hyphen_values = true)]
        duration: f64,
        /// Metres climbed.
        #[arg(long, allow_hyphen_values = true)]
        elevation: f64,
        /// Workout location as LAT,LNG.
        #[arg(long, value_parser = parse_coords, allow_hyphen_values = true)]
        at: Option<Coords>,
    },
}

fn parse_coords(s: &str) -> Result<Coords, String> {
    let (lat, lng) = s
        .split_once(',')
        .ok_or_else(|| format!("expected LAT,LNG, got {s:?}"))?;
    Ok(Coords::new(parse_lat(lat)?, parse_lng(lng)?))
}

fn parse_lat(s: &str) -> Result<f64, String> {
    parse_degrees(s, "latitude", 90.0)
}

fn parse_lng(s: &str) -> Result<f64, String> {
    parse_degrees(s, "longitude", 180.0)
}

fn parse_degrees(s: &str, what: &str, limit: f64) -> Result<f64, String> {
    let v: f64 = s.trim().parse().map_err(|e| format!("{what}: {e}"))?;
    if !(-limit..=limit).contains(&v) {
        return Err(format!("{what} {v} is not on the map"));
    }
    Ok(v)
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parses_add_running() {
        let cli = Cli::try_parse_from([
            "mapty",
            "--offline",
            "add",
            "running",
            "--distance",
            "5",
            "--duration",
            "30",
            "--cadence",
            "150",
            "--at",
            "48.1,-1.6",
        ])
        .unwrap();
        match cli.cmd {
            Cmd::Add {
                kind: AddKind::Running { distance, at, .. },
            } => {
                assert_eq!(distance, 5.0);
                assert_eq!(at, Some(Coords::new(48.1, -1.6)));
            }
            other => panic!("unexpected {other:?}"),
        }
        assert!(cli.offline);
    }

    #[test]
    fn coords_must_be_on_the_map() {
        assert!(parse_coords("91,0").is_err());
        assert!(parse_coords("nope").is_err());
        assert!(parse_coords("NaN,0").is_err());
        assert_eq!(parse_coords(" 1.5 , -2 ").unwrap(), Coords::new(1.5, -2.0));
    }

    #[test]
    fn position_flags_must_be_on_the_map() {
        for (lat, lng) in [("NaN", "0"), ("0", "inf"), ("1000", "0"), ("0", "-181")] {
            let parsed = Cli::try_parse_from(["mapty", "--lat", lat, "--lng", lng, "clear"]);
            assert!(parsed.is_err(), "{lat},{lng}");
        }
        let cli =
            Cli::try_parse_from(["mapty", "--lat", "-33.9", "--lng", "18.4", "clear"]).unwrap();
        assert_eq!(cli.position(), Some(Coords::new(-33.9, 18.4)));
    }

    #[test]
    fn edit_accepts_negative_numbers() {
        let cli = Cli::try_parse_from([
            "mapty",
            "edit",
            "abc",
            "--distance",
            "-5",
            "--duration",
            "-1",
            "--value",
            "-2",
        ])
        .unwrap();
        match cli.cmd {
            Cmd::Edit {
                distance, duration, ..
            } => {
                assert_eq!(distance, -5.0);
                assert_eq!(duration, -1.0);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn lat_requires_lng() {
        assert!(Cli::try_parse_from(["mapty", "--lat", "1", "clear"]).is_err());
    }
}
