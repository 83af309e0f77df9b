//! Current weather via Open-Meteo (geocoding + forecast).
//!
//! The city is taken from the text after "à" or "pour". Answers are in
//! French. A forecast that cannot be fetched is reported as a plain answer;
//! only geocoding transport failures surface as errors.

use async_trait::async_trait;
use regex::Regex;
use serde::Deserialize;
use std::sync::LazyLock;
use std::time::Duration;
use tracing::{debug, warn};
use urbanroute_config::WeatherConfig;
use urbanroute_core::{Responder, ResponderError};

static CITY_PATTERN: LazyLock<Option<Regex>> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(?:à|pour)\s+([A-Za-zÀ-ÖØ-öø-ÿ\s\-]+)")
        .map_err(|e| warn!(error = %e, "City pattern rejected"))
        .ok()
});

pub const ASK_FOR_CITY: &str =
    "Veuillez préciser la ville pour laquelle vous souhaitez connaître la météo.";
pub const FORECAST_UNAVAILABLE: &str = "Erreur lors de la récupération des données météo.";

/// Extract the city name following "à" / "pour".
pub fn extract_city(text: &str) -> Option<String> {
    let re = CITY_PATTERN.as_ref()?;
    let city = re.captures(text)?.get(1)?.as_str().trim();
    (!city.is_empty()).then(|| city.to_string())
}

/// First letter upper-case, the rest lower-case.
fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars.flat_map(char::to_lowercase)).collect(),
        None => String::new(),
    }
}

/// French description of a WMO weather code.
pub fn describe_weather_code(code: i64) -> &'static str {
    match code {
        0 => "clair",
        1 => "principalement clair",
        2 => "partiellement nuageux",
        3 => "couvert",
        45 => "brouillard",
        48 => "brouillard givrant",
        51 => "bruine légère",
        53 => "bruine modérée",
        55 => "bruine dense",
        56 => "bruine verglaçante légère",
        57 => "bruine verglaçante dense",
        61 => "pluie légère",
        63 => "pluie modérée",
        65 => "pluie forte",
        66 => "pluie verglaçante légère",
        67 => "pluie verglaçante forte",
        71 => "neige faible",
        73 => "neige modérée",
        75 => "neige forte",
        77 => "neige en grains",
        80 => "averses de pluie légère",
        81 => "averses de pluie modérée",
        82 => "averses de pluie forte",
        85 => "averses de neige légère",
        86 => "averses de neige forte",
        95 => "orage",
        96 => "orage avec grêle légère",
        99 => "orage avec grêle forte",
        _ => "indéterminé",
    }
}

/// Always show one decimal for whole numbers (`5.0`, `12.3`).
fn format_measure(v: f64) -> String {
    if v.fract() == 0.0 {
        format!("{v:.1}")
    } else {
        format!("{v}")
    }
}

#[derive(Debug, Deserialize)]
struct GeocodingResponse {
    #[serde(default)]
    results: Vec<GeocodingResult>,
}

#[derive(Debug, Deserialize)]
struct GeocodingResult {
    latitude: f64,
    longitude: f64,
}

#[derive(Debug, Deserialize)]
struct ForecastResponse {
    current_weather: Option<CurrentWeather>,
}

#[derive(Debug, Deserialize)]
struct CurrentWeather {
    temperature: f64,
    windspeed: f64,
    weathercode: f64,
}

pub struct WeatherResponder {
    client: reqwest::Client,
    geocoding_url: String,
    forecast_url: String,
    timezone: String,
    language: String,
}

impl WeatherResponder {
    pub fn new(config: &WeatherConfig) -> Result<Self, ResponderError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| ResponderError::Network(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            client,
            geocoding_url: config.geocoding_url.clone(),
            forecast_url: config.forecast_url.clone(),
            timezone: config.timezone.clone(),
            language: config.language.clone(),
        })
    }

    async fn coordinates(&self, city: &str) -> Result<Option<(f64, f64)>, ResponderError> {
        let response = self
            .client
            .get(&self.geocoding_url)
            .query(&[
                ("name", city),
                ("count", "1"),
                ("language", self.language.as_str()),
                ("format", "json"),
            ])
            .send()
            .await
            .map_err(|e| ResponderError::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(ResponderError::Api {
                status_code: status.as_u16(),
                message: response.text().await.unwrap_or_default(),
            });
        }

        let body: GeocodingResponse = response
            .json()
            .await
            .map_err(|e| ResponderError::InvalidResponse(format!("geocoding: {e}")))?;

        Ok(body.results.first().map(|r| (r.latitude, r.longitude)))
    }

    async fn current_weather(&self, lat: f64, lon: f64) -> Result<CurrentWeather, ResponderError> {
        let response = self
            .client
            .get(&self.forecast_url)
            .query(&[
                ("latitude", lat.to_string()),
                ("longitude", lon.to_string()),
                ("current_weather", "true".to_string()),
                ("timezone", self.timezone.clone()),
            ])
            .send()
            .await
            .map_err(|e| ResponderError::Network(e.to_string()))?
            .error_for_status()
            .map_err(|e| ResponderError::Api {
                status_code: e.status().map(|s| s.as_u16()).unwrap_or_default(),
                message: e.to_string(),
            })?;

        let body: ForecastResponse = response
            .json()
            .await
            .map_err(|e| ResponderError::InvalidResponse(format!("forecast: {e}")))?;

        body.current_weather
            .ok_or_else(|| ResponderError::InvalidResponse("no current_weather".into()))
    }
}

#[async_trait]
impl Responder for WeatherResponder {
    fn name(&self) -> &str {
        "weather"
    }

    async fn respond(&mut self, text: &str) -> Result<String, ResponderError> {
        let Some(city) = extract_city(text) else {
            return Ok(ASK_FOR_CITY.to_string());
        };

        let Some((lat, lon)) = self.coordinates(&city).await? else {
            return Ok(format!(
                "Impossible de trouver les coordonnées pour la ville {city}."
            ));
        };
        debug!(city = %city, lat, lon, "City geocoded");

        match self.current_weather(lat, lon).await {
            Ok(current) => Ok(format!(
                "À {}, le temps est {}, la température est de {}°C et la vitesse du vent est de {} km/h.",
                capitalize(&city),
                describe_weather_code(current.weathercode as i64),
                format_measure(current.temperature),
                format_measure(current.windspeed),
            )),
            Err(e) => {
                warn!(city = %city, error = %e, "Forecast unavailable");
                Ok(FORECAST_UNAVAILABLE.to_string())
            }
        }
    }
}
