//! Weather hint support: Open-Meteo decoding, localized labels and a TTL
//! cache owned by the caller.
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use crate::constants::WEATHER_CACHE_TTL_SECS;
use crate::numbers::round_to_places;

/// UI language for weather text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    No,
    #[default]
    En,
}

impl Language {
    #[must_use]
    pub const fn code(self) -> &'static str {
        match self {
            Self::No => "no",
            Self::En => "en",
        }
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl FromStr for Language {
    type Err = WeatherError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "no" | "nb" | "nn" => Ok(Self::No),
            "en" => Ok(Self::En),
            other => Err(WeatherError::UnknownLanguage(other.to_string())),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum WeatherError {
    #[error("JSON parsing error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("response has no current_weather block")]
    MissingCurrentWeather,
    #[error("unsupported language {0:?}")]
    UnknownLanguage(String),
}

/// Current conditions at a fjord, ready for display.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeatherData {
    pub temperature: f64,
    pub windspeed: f64,
    pub winddirection: f64,
    pub conditions: String,
    pub time: String,
}

#[derive(Debug, Deserialize)]
struct OpenMeteoResponse {
    current_weather: Option<CurrentWeather>,
}

#[derive(Debug, Deserialize)]
struct CurrentWeather {
    temperature: f64,
    windspeed: f64,
    winddirection: f64,
    weathercode: u32,
    time: String,
}

impl WeatherData {
    /// Decode an Open-Meteo `current_weather=true` response.
    ///
    /// # Errors
    ///
    /// Returns an error if the JSON is malformed or lacks current weather.
    pub fn from_open_meteo(json: &str, language: Language) -> Result<Self, WeatherError> {
        let response: OpenMeteoResponse = serde_json::from_str(json)?;
        let current = response
            .current_weather
            .ok_or(WeatherError::MissingCurrentWeather)?;
        Ok(Self {
            temperature: round_to_places(current.temperature, 1),
            windspeed: round_to_places(current.windspeed, 1),
            winddirection: current.winddirection,
            conditions: weather_conditions(current.weathercode, language).to_string(),
            time: current.time,
        })
    }

    #[must_use]
    pub fn wind_label(&self, language: Language) -> &'static str {
        wind_direction_label(self.winddirection, language)
    }
}

// WMO code, Norwegian, English.
const WEATHER_CODES: [(u32, &str, &str); 28] = [
    (0, "Klart", "Clear sky"),
    (1, "Hovedsakelig klart", "Mainly clear"),
    (2, "Delvis skyet", "Partly cloudy"),
    (3, "Overskyet", "Overcast"),
    (45, "Tåke", "Fog"),
    (48, "Rimtåke", "Depositing rime fog"),
    (51, "Lett duskregn", "Light drizzle"),
    (53, "Moderat duskregn", "Moderate drizzle"),
    (55, "Tett duskregn", "Dense drizzle"),
    (56, "Lett underkjølt duskregn", "Light freezing drizzle"),
    (57, "Tett underkjølt duskregn", "Dense freezing drizzle"),
    (61, "Lett regn", "Slight rain"),
    (63, "Moderat regn", "Moderate rain"),
    (65, "Kraftig regn", "Heavy rain"),
    (66, "Lett underkjølt regn", "Light freezing rain"),
    (67, "Kraftig underkjølt regn", "Heavy freezing rain"),
    (71, "Lett snøfall", "Slight snow fall"),
    (73, "Moderat snøfall", "Moderate snow fall"),
    (75, "Kraftig snøfall", "Heavy snow fall"),
    (77, "Snøkorn", "Snow grains"),
    (80, "Lett regnbyger", "Slight rain showers"),
    (81, "Moderate regnbyger", "Moderate rain showers"),
    (82, "Kraftige regnbyger", "Violent rain showers"),
    (85, "Lett snøbyger", "Slight snow showers"),
    (86, "Kraftige snøbyger", "Heavy snow showers"),
    (95, "Torden", "Thunderstorm"),
    (96, "Torden med lett hagl", "Thunderstorm with slight hail"),
    (99, "Torden med kraftig hagl", "Thunderstorm with heavy hail"),
];

/// Localized description of a WMO weather code.
#[must_use]
pub fn weather_conditions(code: u32, language: Language) -> &'static str {
    let entry = WEATHER_CODES.iter().find(|(c, _, _)| *c == code);
    match (entry, language) {
        (Some((_, no, _)), Language::No) => *no,
        (Some((_, _, en)), Language::En) => *en,
        (None, Language::No) => "Ukjent",
        (None, Language::En) => "Unknown",
    }
}

const WIND_POINTS: [(&str, &str); 16] = [
    ("N", "N"),
    ("NNØ", "NNE"),
    ("NØ", "NE"),
    ("ØNØ", "ENE"),
    ("Ø", "E"),
    ("ØSØ", "ESE"),
    ("SØ", "SE"),
    ("SSØ", "SSE"),
    ("S", "S"),
    ("SSV", "SSW"),
    ("SV", "SW"),
    ("VSV", "WSW"),
    ("V", "W"),
    ("VNV", "WNW"),
    ("NV", "NW"),
    ("NNV", "NNW"),
];

/// 16-point label for a wind bearing. Each point covers the 22.5° sector
/// starting at its nominal bearing, so 337.5..360 is NNW.
#[must_use]
pub fn wind_direction_label(degrees: f64, language: Language) -> &'static str {
    let normalized = if degrees.is_finite() {
        degrees.rem_euclid(360.0)
    } else {
        0.0
    };
    let index = crate::numbers::round_f64_to_u32((normalized / 22.5).floor()) as usize;
    let (no, en) = WIND_POINTS.get(index % WIND_POINTS.len()).copied().unwrap_or(("N", "N"));
    match language {
        Language::No => no,
        Language::En => en,
    }
}

#[must_use]
pub fn weather_cache_key(fjord_id: u32, language: Language) -> String {
    format!("weather_{fjord_id}_{language}")
}

/// Time source for [`TtlCache`].
pub trait Clock {
    /// Milliseconds since the Unix epoch.
    fn now_ms(&self) -> i64;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_ms(&self) -> i64 {
        chrono::Utc::now().timestamp_millis()
    }
}

/// Default lifetime of a cached weather reading.
#[must_use]
pub fn default_weather_ttl() -> chrono::Duration {
    chrono::Duration::seconds(WEATHER_CACHE_TTL_SECS)
}

#[derive(Debug, Clone)]
struct CacheEntry<V> {
    value: V,
    expires_at_ms: i64,
}

/// Key/value cache with per-entry expiry. An entry is still served at its
/// expiry instant and gone one millisecond later. Expired entries are dropped
/// when read and swept on every insert.
#[derive(Debug, Clone)]
pub struct TtlCache<V, C: Clock = SystemClock> {
    entries: HashMap<String, CacheEntry<V>>,
    clock: C,
}

impl<V> TtlCache<V, SystemClock> {
    #[must_use]
    pub fn new() -> Self {
        Self::with_clock(SystemClock)
    }
}

impl<V> Default for TtlCache<V, SystemClock> {
    fn default() -> Self {
        Self::new()
    }
}

impl<V, C: Clock> TtlCache<V, C> {
    pub fn with_clock(clock: C) -> Self {
        Self {
            entries: HashMap::new(),
            clock,
        }
    }

    pub fn get(&mut self, key: &str) -> Option<&V> {
        let now = self.clock.now_ms();
        if self
            .entries
            .get(key)
            .is_some_and(|entry| entry.expires_at_ms < now)
        {
            self.entries.remove(key);
            log::debug!("cache entry {key} expired");
            return None;
        }
        self.entries.get(key).map(|entry| &entry.value)
    }

    pub fn set(&mut self, key: impl Into<String>, value: V, ttl: chrono::Duration) {
        let now = self.clock.now_ms();
        self.prune_expired(now);
        let expires_at_ms = now.saturating_add(ttl.num_milliseconds());
        self.entries.insert(
            key.into(),
            CacheEntry {
                value,
                expires_at_ms,
            },
        );
    }

    fn prune_expired(&mut self, now: i64) {
        let before = self.entries.len();
        self.entries.retain(|_, entry| entry.expires_at_ms >= now);
        let dropped = before - self.entries.len();
        if dropped > 0 {
            log::debug!("swept {dropped} expired cache entries");
        }
    }

    /// Entries currently held, expired or not.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}
