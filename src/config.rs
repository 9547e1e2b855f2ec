use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use anyhow::{anyhow, Context, Result};

use crate::geo::LatLng;
use crate::map::{MAX_ZOOM, MIN_ZOOM};
use crate::places::SearchBias;
use crate::timefmt::TimeDisplay;

const DEFAULT_API_URL: &str = "http://localhost:5000";
const DEFAULT_PLACES_URL: &str = "https://maps.googleapis.com/maps/api";
const DEFAULT_LOCATE_URL: &str = "http://ip-api.com/json";
const DEFAULT_DATA_DIR: &str = "data";
const DEFAULT_LOG_FILE: &str = "marker-map.log";

/// Runtime settings, read once from the environment (and `.env`)
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    /// Marker backend base url
    pub api_url: String,
    /// Places provider key; search is disabled without one
    pub places_api_key: Option<String>,
    pub places_url: String,
    pub search_bias: SearchBias,
    pub max_suggestions: usize,
    pub initial_center: LatLng,
    pub initial_zoom: u8,
    /// Zoom applied by "move to" after search or locate
    pub move_to_zoom: u8,
    pub time_display: TimeDisplay,
    /// Radius drawn around the user location, in meters
    pub user_radius_m: f64,
    /// Fixed "locate me" answer; IP lookup is used when unset
    pub fixed_location: Option<LatLng>,
    pub locate_url: String,
    pub data_dir: PathBuf,
    /// True when the data dir came from the environment and must exist
    pub data_dir_explicit: bool,
    pub http_timeout: Duration,
    pub log_file: PathBuf,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_API_URL.to_string(),
            places_api_key: None,
            places_url: DEFAULT_PLACES_URL.to_string(),
            search_bias: SearchBias {
                location: LatLng::new(40.584221, -73.820343),
                radius_m: 200 * 1000,
            },
            max_suggestions: 5,
            initial_center: LatLng::new(43.0, -80.0),
            initial_zoom: 9,
            move_to_zoom: 16,
            time_display: TimeDisplay::Relative,
            user_radius_m: 1000.0,
            fixed_location: None,
            locate_url: DEFAULT_LOCATE_URL.to_string(),
            data_dir: PathBuf::from(DEFAULT_DATA_DIR),
            data_dir_explicit: false,
            http_timeout: Duration::from_millis(10_000),
            log_file: PathBuf::from(DEFAULT_LOG_FILE),
        }
    }
}

impl Config {
    /// Load `.env` if present, then read `MARKER_MAP_*` variables
    pub fn from_env() -> Result<Self> {
        let _ = dotenvy::dotenv();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build from any key lookup; blank values count as unset
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let get = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };
        let mut config = Config::default();

        if let Some(url) = get("MARKER_MAP_API_URL") {
            config.api_url = url;
        }
        config.places_api_key = get("MARKER_MAP_PLACES_API_KEY")
            .or_else(|| get("GOOGLE_MAPS_API_KEY"))
            .or_else(|| get("REACT_APP_GOOGLE_MAPS_API_KEY"));
        if let Some(url) = get("MARKER_MAP_PLACES_URL") {
            config.places_url = url;
        }
        if let Some(v) = get("MARKER_MAP_SEARCH_BIAS") {
            config.search_bias.location = parse_point("MARKER_MAP_SEARCH_BIAS", &v)?;
        }
        if let Some(v) = get("MARKER_MAP_SEARCH_RADIUS_M") {
            config.search_bias.radius_m = parse("MARKER_MAP_SEARCH_RADIUS_M", &v)?;
        }
        if let Some(v) = get("MARKER_MAP_MAX_SUGGESTIONS") {
            config.max_suggestions = parse("MARKER_MAP_MAX_SUGGESTIONS", &v)?;
        }
        if let Some(v) = get("MARKER_MAP_INITIAL_CENTER") {
            config.initial_center = parse_point("MARKER_MAP_INITIAL_CENTER", &v)?;
        }
        if let Some(v) = get("MARKER_MAP_INITIAL_ZOOM") {
            config.initial_zoom = parse_zoom("MARKER_MAP_INITIAL_ZOOM", &v)?;
        }
        if let Some(v) = get("MARKER_MAP_MOVE_TO_ZOOM") {
            config.move_to_zoom = parse_zoom("MARKER_MAP_MOVE_TO_ZOOM", &v)?;
        }
        if let Some(v) = get("MARKER_MAP_TIME_DISPLAY") {
            config.time_display = v
                .parse()
                .map_err(|e| anyhow!("MARKER_MAP_TIME_DISPLAY: {e}"))?;
        }
        if let Some(v) = get("MARKER_MAP_USER_RADIUS_M") {
            let radius: f64 = parse("MARKER_MAP_USER_RADIUS_M", &v)?;
            if !(radius.is_finite() && radius >= 0.0) {
                return Err(anyhow!("MARKER_MAP_USER_RADIUS_M must be a non-negative number"));
            }
            config.user_radius_m = radius;
        }
        if let Some(v) = get("MARKER_MAP_LOCATION") {
            config.fixed_location = Some(parse_point("MARKER_MAP_LOCATION", &v)?);
        }
        if let Some(url) = get("MARKER_MAP_LOCATE_URL") {
            config.locate_url = url;
        }
        if let Some(dir) = get("MARKER_MAP_DATA_DIR") {
            config.data_dir = PathBuf::from(dir);
            config.data_dir_explicit = true;
        }
        if let Some(v) = get("MARKER_MAP_HTTP_TIMEOUT_MS") {
            config.http_timeout =
                Duration::from_millis(parse("MARKER_MAP_HTTP_TIMEOUT_MS", &v)?);
        }
        if let Some(path) = get("MARKER_MAP_LOG_FILE") {
            config.log_file = PathBuf::from(path);
        }

        Ok(config)
    }

    /// Search needs a places key
    pub fn search_enabled(&self) -> bool {
        self.places_api_key.is_some()
    }
}

fn parse<T>(key: &str, value: &str) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    value
        .parse()
        .with_context(|| format!("{key}: invalid value {value:?}"))
}

fn parse_point(key: &str, value: &str) -> Result<LatLng> {
    LatLng::parse_pair(value).ok_or_else(|| anyhow!("{key}: expected \"lat,lng\", got {value:?}"))
}

fn parse_zoom(key: &str, value: &str) -> Result<u8> {
    let zoom: u8 = parse(key, value)?;
    if !(MIN_ZOOM..=MAX_ZOOM).contains(&zoom) {
        return Err(anyhow!("{key}: zoom must be within {MIN_ZOOM}..={MAX_ZOOM}"));
    }
    Ok(zoom)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn from_pairs(pairs: &[(&str, &str)]) -> Result<Config> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| map.get(key).cloned())
    }

    #[test]
    fn test_defaults() {
        let config = from_pairs(&[]).unwrap();
        assert_eq!(config, Config::default());
        assert_eq!(config.move_to_zoom, 16);
        assert_eq!(config.initial_zoom, 9);
        assert!(!config.search_enabled());
    }

    #[test]
    fn test_overrides() {
        let config = from_pairs(&[
            ("MARKER_MAP_API_URL", "http://backend:8080"),
            ("REACT_APP_GOOGLE_MAPS_API_KEY", "legacy"),
            ("MARKER_MAP_MOVE_TO_ZOOM", "15"),
            ("MARKER_MAP_TIME_DISPLAY", "absolute"),
            ("MARKER_MAP_LOCATION", "43.65,-79.38"),
            ("MARKER_MAP_DATA_DIR", "/srv/natural-earth"),
            ("MARKER_MAP_HTTP_TIMEOUT_MS", "2500"),
        ])
        .unwrap();
        assert_eq!(config.api_url, "http://backend:8080");
        assert_eq!(config.places_api_key.as_deref(), Some("legacy"));
        assert_eq!(config.move_to_zoom, 15);
        assert_eq!(config.time_display, TimeDisplay::Absolute);
        assert_eq!(config.fixed_location, Some(LatLng::new(43.65, -79.38)));
        assert!(config.data_dir_explicit);
        assert_eq!(config.http_timeout, Duration::from_millis(2500));
    }

    #[test]
    fn test_primary_key_wins() {
        let config = from_pairs(&[
            ("MARKER_MAP_PLACES_API_KEY", "primary"),
            ("GOOGLE_MAPS_API_KEY", "fallback"),
        ])
        .unwrap();
        assert_eq!(config.places_api_key.as_deref(), Some("primary"));
    }

    #[test]
    fn test_blank_is_unset() {
        let config = from_pairs(&[("MARKER_MAP_PLACES_API_KEY", "  ")]).unwrap();
        assert!(config.places_api_key.is_none());
    }

    #[test]
    fn test_invalid_values() {
        assert!(from_pairs(&[("MARKER_MAP_MOVE_TO_ZOOM", "42")]).is_err());
        assert!(from_pairs(&[("MARKER_MAP_INITIAL_CENTER", "north")]).is_err());
        assert!(from_pairs(&[("MARKER_MAP_TIME_DISPLAY", "raw")]).is_err());
        assert!(from_pairs(&[("MARKER_MAP_USER_RADIUS_M", "-5")]).is_err());
    }
}
