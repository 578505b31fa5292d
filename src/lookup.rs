use crate::dlog;
use crate::error::{Result, WorkoutError};
use crate::types::{Conditions, Coords, Place};
use reqwest::blocking::Client;
use serde::Deserialize;
use std::thread;
use std::time::Duration;

const WEATHER_URL: &str = "https://api.openweathermap.org/data/2.5/weather";
const WEATHER_ICON_URL: &str = "http://openweathermap.org/img/w";
const PLACE_URL: &str = "https://us1.locationiq.com/v1/reverse.php";
const KELVIN_OFFSET: f64 = 273.15;

pub trait WeatherLookup: Send + Sync {
    fn weather(&self, at: Coords) -> Result<Conditions>;
}

pub trait PlaceLookup: Send + Sync {
    fn place(&self, at: Coords) -> Result<Place>;
}

/// Source of the user's own position.
pub trait GeolocationProvider {
    fn position(&self) -> Result<Coords>;
}

/// What to do when the weather or place lookup fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum LookupPolicy {
    /// Store the workout without weather and with an unknown place.
    #[default]
    Substitute,
    /// Refuse to create the workout.
    Abort,
}

#[derive(Debug, Clone)]
pub struct LookupConfig {
    pub weather_key: Option<String>,
    pub place_key: Option<String>,
    pub offline: bool,
    pub timeout: Duration,
    pub policy: LookupPolicy,
}

impl Default for LookupConfig {
    fn default() -> Self {
        Self {
            weather_key: None,
            place_key: None,
            offline: true,
            timeout: Duration::from_secs(10),
            policy: LookupPolicy::Substitute,
        }
    }
}

/// Weather and place for a new workout, plus anything the user should be told
/// about how they were obtained.
#[derive(Debug, Clone, PartialEq)]
pub struct Annotations {
    pub conditions: Conditions,
    pub place: Place,
    pub notices: Vec<String>,
}

/// Run both lookups concurrently and apply `policy` to failures.
pub fn annotate(
    weather: &dyn WeatherLookup,
    place: &dyn PlaceLookup,
    at: Coords,
    policy: LookupPolicy,
) -> Result<Annotations> {
    let (weather_res, place_res) = thread::scope(|s| {
        let w = s.spawn(|| weather.weather(at));
        let p = s.spawn(|| place.place(at));
        (join(w, "weather"), join(p, "place"))
    });

    let mut notices = Vec::new();

    let conditions = match weather_res {
        Ok(c) => c,
        Err(e) if policy == LookupPolicy::Substitute => {
            tracing::warn!(err = %e, %at, "weather lookup failed; storing without weather");
            notices.push(format!("{e}; weather left blank"));
            Conditions::default()
        }
        Err(e) => return Err(e),
    };

    let place = match place_res {
        Ok(p) => p,
        Err(e) if policy == LookupPolicy::Substitute => {
            tracing::warn!(err = %e, %at, "place lookup failed; storing unknown place");
            notices.push(format!("{e}; place left unknown"));
            Place::unknown()
        }
        Err(e) => return Err(e),
    };

    Ok(Annotations {
        conditions,
        place,
        notices,
    })
}

fn join<T>(handle: thread::ScopedJoinHandle<'_, Result<T>>, what: &str) -> Result<T> {
    handle
        .join()
        .unwrap_or_else(|_| Err(WorkoutError::Lookup(format!("{what} lookup panicked"))))
}

/// Build the lookups described by `cfg`. Missing keys fall back to offline.
pub fn from_config(cfg: &LookupConfig) -> Result<(Box<dyn WeatherLookup>, Box<dyn PlaceLookup>)> {
    if cfg.offline {
        tracing::info!("lookups disabled; running offline");
        return Ok((Box::new(OfflineWeather), Box::new(OfflinePlace)));
    }

    let client = Client::builder()
        .timeout(cfg.timeout)
        .build()
        .map_err(|e| WorkoutError::Lookup(format!("building http client: {e}")))?;

    let weather: Box<dyn WeatherLookup> = match &cfg.weather_key {
        Some(key) => Box::new(OpenWeatherMap::new(client.clone(), key.clone())),
        None => {
            tracing::info!("no weather api key; weather disabled");
            Box::new(OfflineWeather)
        }
    };
    let place: Box<dyn PlaceLookup> = match &cfg.place_key {
        Some(key) => Box::new(LocationIq::new(client, key.clone())),
        None => {
            tracing::info!("no place api key; reverse geocoding disabled");
            Box::new(OfflinePlace)
        }
    };
    Ok((weather, place))
}

/// OpenWeatherMap current weather.
pub struct OpenWeatherMap {
    client: Client,
    api_key: String,
}

#[derive(Debug, Deserialize)]
struct OwmResponse {
    main: OwmMain,
    weather: Vec<OwmWeather>,
}

#[derive(Debug, Deserialize)]
struct OwmMain {
    /// Kelvin.
    temp: f64,
}

#[derive(Debug, Deserialize)]
struct OwmWeather {
    icon: String,
}

impl OpenWeatherMap {
    pub const fn new(client: Client, api_key: String) -> Self {
        Self { client, api_key }
    }
}

impl WeatherLookup for OpenWeatherMap {
    fn weather(&self, at: Coords) -> Result<Conditions> {
        dlog!("weather lookup at={at}");
        let body: OwmResponse = self
            .client
            .get(WEATHER_URL)
            .query(&[
                ("lat", at.lat.to_string()),
                ("lon", at.lng.to_string()),
                ("appid", self.api_key.clone()),
            ])
            .send()
            .and_then(reqwest::blocking::Response::error_for_status)
            .and_then(reqwest::blocking::Response::json)
            .map_err(|e| WorkoutError::Lookup(format!("weather: {e}")))?;

        Ok(conditions_from(&body))
    }
}

fn conditions_from(body: &OwmResponse) -> Conditions {
    Conditions {
        temperature: Some(kelvin_to_celsius(body.main.temp)),
        icon: body
            .weather
            .first()
            .map(|w| format!("{WEATHER_ICON_URL}/{}.png", w.icon)),
    }
}

#[allow(clippy::cast_possible_truncation)]
pub fn kelvin_to_celsius(kelvin: f64) -> i32 {
    (kelvin - KELVIN_OFFSET).round() as i32
}

/// LocationIQ reverse geocoding.
pub struct LocationIq {
    client: Client,
    api_key: String,
}

#[derive(Debug, Deserialize)]
struct LocationIqResponse {
    display_name: String,
}

impl LocationIq {
    pub const fn new(client: Client, api_key: String) -> Self {
        Self { client, api_key }
    }
}

impl PlaceLookup for LocationIq {
    fn place(&self, at: Coords) -> Result<Place> {
        dlog!("place lookup at={at}");
        let body: LocationIqResponse = self
            .client
            .get(PLACE_URL)
            .query(&[
                ("key", self.api_key.clone()),
                ("lat", at.lat.to_string()),
                ("lon", at.lng.to_string()),
                ("normalizeaddress", "1".to_string()),
                ("format", "json".to_string()),
            ])
            .send()
            .and_then(reqwest::blocking::Response::error_for_status)
            .and_then(reqwest::blocking::Response::json)
            .map_err(|e| WorkoutError::Lookup(format!("place: {e}")))?;

        Ok(place_from_display_name(&body.display_name))
    }
}

/// First two comma-separated parts become city and country.
pub fn place_from_display_name(display_name: &str) -> Place {
    let mut parts = display_name
        .split(',')
        .map(str::trim)
        .filter(|p| !p.is_empty());
    let city = parts.next().unwrap_or(Place::UNKNOWN).to_string();
    let country = parts.next().unwrap_or(Place::UNKNOWN).to_string();
    Place { city, country }
}

/// Weather lookup that never touches the network.
pub struct OfflineWeather;

impl WeatherLookup for OfflineWeather {
    fn weather(&self, _at: Coords) -> Result<Conditions> {
        Ok(Conditions::default())
    }
}

/// Place lookup that never touches the network.
pub struct OfflinePlace;

impl PlaceLookup for OfflinePlace {
    fn place(&self, _at: Coords) -> Result<Place> {
        Ok(Place::unknown())
    }
}

/// Position given on the command line, if any.
pub struct FixedPosition(pub Option<Coords>);

impl GeolocationProvider for FixedPosition {
    fn position(&self) -> Result<Coords> {
        self.0
            .ok_or_else(|| WorkoutError::Position("no position given (use --lat and --lng)".into()))
    }
}
