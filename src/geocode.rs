//! Place-name to country resolution.
//!
//! The comparison engine never talks to a geocoding service directly. It
//! receives a [`Geocoder`] handle, asks [`resolve_countries`] for a
//! memoized place-to-country map covering every value it needs, and then
//! reads that map synchronously while evaluating rows.
//!
//! Implementations:
//!
//! - [`NominatimGeocoder`]: OpenStreetMap Nominatim over HTTP, with a
//!   per-request timeout and a minimum spacing between requests.
//! - [`OfflineGazetteer`]: a fixed `place -> country` table, usually loaded
//!   from a CSV file. Tests use it as a deterministic double.
//! - [`DisabledGeocoder`]: fails every lookup.
//! - [`CachingGeocoder`]: wraps any of the above so each distinct place
//!   string reaches the inner geocoder at most once.

use std::{
    collections::HashMap,
    path::Path,
    sync::Mutex,
    thread,
    time::{Duration, Instant},
};

use anyhow::{Context, Result, anyhow};
use log::{debug, warn};
use serde::Deserialize;

use crate::io_utils;

pub const DEFAULT_ENDPOINT: &str = "https://nominatim.openstreetmap.org/search";
pub const DEFAULT_USER_AGENT: &str = concat!("register-crosscheck/", env!("CARGO_PKG_VERSION"));

#[derive(Debug, thiserror::Error)]
pub enum GeocodeError {
    #[error("geocoding request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("geocoding service returned HTTP {status}")]
    Status { status: u16 },
    #[error("geocoding response was malformed: {0}")]
    Malformed(String),
    #[error("geocoding is disabled")]
    Disabled,
}

/// Looks up the country a free-text place name belongs to.
///
/// `Ok(None)` means the service answered but found no place (or no country
/// for it); `Err` means the lookup itself failed. Callers treat both as
/// "no country".
pub trait Geocoder: Send + Sync {
    fn lookup_country(&self, place: &str) -> Result<Option<String>, GeocodeError>;
}

impl<G: Geocoder + ?Sized> Geocoder for Box<G> {
    fn lookup_country(&self, place: &str) -> Result<Option<String>, GeocodeError> {
        (**self).lookup_country(place)
    }
}

pub struct NominatimGeocoder {
    http: reqwest::blocking::Client,
    endpoint: String,
    language: String,
    min_interval: Duration,
    last_request: Mutex<Option<Instant>>,
}

#[derive(Debug, Clone)]
pub struct NominatimOptions {
    pub endpoint: String,
    pub user_agent: String,
    pub language: String,
    pub timeout: Duration,
    pub min_interval: Duration,
}

impl Default for NominatimOptions {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            user_agent: DEFAULT_USER_AGENT.to_string(),
            language: "en".to_string(),
            timeout: Duration::from_secs(10),
            min_interval: Duration::from_millis(1000),
        }
    }
}

#[derive(Debug, Deserialize)]
struct NominatimPlace {
    #[serde(default)]
    address: Option<NominatimAddress>,
}

#[derive(Debug, Deserialize)]
struct NominatimAddress {
    #[serde(default)]
    country: Option<String>,
}

impl NominatimGeocoder {
    pub fn new(options: NominatimOptions) -> Result<Self> {
        let http = reqwest::blocking::Client::builder()
            .timeout(options.timeout)
            .user_agent(options.user_agent.as_str())
            .build()
            .context("Building geocoding HTTP client")?;
        Ok(Self {
            http,
            endpoint: options.endpoint,
            language: options.language,
            min_interval: options.min_interval,
            last_request: Mutex::new(None),
        })
    }

    fn wait_for_slot(&self) {
        let mut last = self
            .last_request
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        if let Some(previous) = *last {
            let elapsed = previous.elapsed();
            if elapsed < self.min_interval {
                thread::sleep(self.min_interval - elapsed);
            }
        }
        *last = Some(Instant::now());
    }
}

impl Geocoder for NominatimGeocoder {
    fn lookup_country(&self, place: &str) -> Result<Option<String>, GeocodeError> {
        self.wait_for_slot();
        let response = self
            .http
            .get(&self.endpoint)
            .query(&[
                ("q", place),
                ("format", "jsonv2"),
                ("addressdetails", "1"),
                ("limit", "1"),
                ("accept-language", self.language.as_str()),
            ])
            .send()?;
        let status = response.status();
        if !status.is_success() {
            return Err(GeocodeError::Status {
                status: status.as_u16(),
            });
        }
        let body = response.text()?;
        country_from_response(&body)
    }
}

/// Pulls the country of the best match out of a `jsonv2` search body.
fn country_from_response(body: &str) -> Result<Option<String>, GeocodeError> {
    let places: Vec<NominatimPlace> =
        serde_json::from_str(body).map_err(|err| GeocodeError::Malformed(err.to_string()))?;
    Ok(places
        .into_iter()
        .next()
        .and_then(|p| p.address)
        .and_then(|a| a.country))
}

/// Fixed place-to-country table. Lookups ignore case and surrounding
/// whitespace; a known country name resolves to itself.
#[derive(Debug, Clone, Default)]
pub struct OfflineGazetteer {
    places: HashMap<String, String>,
}

impl OfflineGazetteer {
    pub fn from_entries<I, P, C>(entries: I) -> Self
    where
        I: IntoIterator<Item = (P, C)>,
        P: AsRef<str>,
        C: Into<String>,
    {
        let mut places = HashMap::new();
        for (place, country) in entries {
            let country = country.into();
            places
                .entry(normalize_place(&country))
                .or_insert_with(|| country.clone());
            places.insert(normalize_place(place.as_ref()), country);
        }
        Self { places }
    }

    /// Loads a two-column CSV with `place` and `country` headers.
    pub fn load(path: &Path) -> Result<Self> {
        let delimiter = io_utils::resolve_input_delimiter(path, None);
        let mut reader = io_utils::open_csv_reader_from_path(path, delimiter)?;
        let headers = io_utils::reader_headers(&mut reader, encoding_rs::UTF_8)?;
        let find = |name: &str| {
            headers
                .iter()
                .position(|h| h.trim().eq_ignore_ascii_case(name))
                .ok_or_else(|| anyhow!("Gazetteer {path:?} is missing a '{name}' column"))
        };
        let place_idx = find("place")?;
        let country_idx = find("country")?;

        let mut entries = Vec::new();
        for (row_idx, record) in reader.byte_records().enumerate() {
            let record =
                record.with_context(|| format!("Reading gazetteer row {}", row_idx + 2))?;
            let decoded = io_utils::decode_record(&record, encoding_rs::UTF_8)?;
            let place = decoded.get(place_idx).map(|s| s.trim()).unwrap_or("");
            let country = decoded.get(country_idx).map(|s| s.trim()).unwrap_or("");
            if place.is_empty() || country.is_empty() {
                continue;
            }
            entries.push((place.to_string(), country.to_string()));
        }
        debug!("Loaded {} gazetteer entr(ies) from {:?}", entries.len(), path);
        Ok(Self::from_entries(entries))
    }

    pub fn len(&self) -> usize {
        self.places.len()
    }

    pub fn is_empty(&self) -> bool {
        self.places.is_empty()
    }
}

impl Geocoder for OfflineGazetteer {
    fn lookup_country(&self, place: &str) -> Result<Option<String>, GeocodeError> {
        Ok(self.places.get(&normalize_place(place)).cloned())
    }
}

fn normalize_place(place: &str) -> String {
    place.trim().to_lowercase()
}

#[derive(Debug, Clone, Copy, Default)]
pub struct DisabledGeocoder;

impl Geocoder for DisabledGeocoder {
    fn lookup_country(&self, _place: &str) -> Result<Option<String>, GeocodeError> {
        Err(GeocodeError::Disabled)
    }
}

/// Memoizes successful lookups by exact place string. Failed lookups are
/// not cached, so a later comparison may retry them.
pub struct CachingGeocoder<G> {
    inner: G,
    cache: Mutex<HashMap<String, Option<String>>>,
}

impl<G: Geocoder> CachingGeocoder<G> {
    pub fn new(inner: G) -> Self {
        Self {
            inner,
            cache: Mutex::new(HashMap::new()),
        }
    }

    pub fn cached_len(&self) -> usize {
        self.cache
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .len()
    }
}

impl<G: Geocoder> Geocoder for CachingGeocoder<G> {
    fn lookup_country(&self, place: &str) -> Result<Option<String>, GeocodeError> {
        if let Some(hit) = self
            .cache
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .get(place)
        {
            debug!("Geocoder cache hit for '{place}'");
            return Ok(hit.clone());
        }
        let resolved = self.inner.lookup_country(place)?;
        self.cache
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .insert(place.to_string(), resolved.clone());
        Ok(resolved)
    }
}

/// Resolved country per place string; `None` when the lookup failed or
/// found nothing.
pub type CountryMap = HashMap<String, Option<String>>;

/// Resolves every place in `places` using at most `concurrency` worker
/// threads. Lookup errors are logged and recorded as `None`.
pub fn resolve_countries(
    geocoder: &dyn Geocoder,
    places: &[String],
    concurrency: usize,
) -> CountryMap {
    if places.is_empty() {
        return CountryMap::new();
    }
    let workers = concurrency.clamp(1, places.len());
    if workers == 1 {
        return places
            .iter()
            .map(|place| (place.clone(), resolve_one(geocoder, place)))
            .collect();
    }

    let chunk_size = places.len().div_ceil(workers);
    thread::scope(|scope| {
        let handles = places
            .chunks(chunk_size)
            .map(|chunk| {
                scope.spawn(move || {
                    chunk
                        .iter()
                        .map(|place| (place.clone(), resolve_one(geocoder, place)))
                        .collect::<Vec<_>>()
                })
            })
            .collect::<Vec<_>>();
        let mut map = CountryMap::with_capacity(places.len());
        for (handle, chunk) in handles.into_iter().zip(places.chunks(chunk_size)) {
            match handle.join() {
                Ok(resolved) => map.extend(resolved),
                Err(_) => {
                    warn!("Geocoding worker panicked; {} place(s) left unresolved", chunk.len());
                    map.extend(chunk.iter().map(|place| (place.clone(), None)));
                }
            }
        }
        map
    })
}

fn resolve_one(geocoder: &dyn Geocoder, place: &str) -> Option<String> {
    match geocoder.lookup_country(place) {
        Ok(Some(country)) => {
            debug!("Resolved '{place}' to '{country}'");
            Some(country)
        }
        Ok(None) => {
            debug!("No country found for '{place}'");
            None
        }
        Err(err) => {
            warn!("Lookup for '{place}' failed: {err}");
            None
        }
    }
}
