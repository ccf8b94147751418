use std::collections::BTreeSet;

use rand::Rng;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use time::macros::format_description;
use time::Date;

use crate::models::region::Region;
use travelog_api_structs::{Coordinates, NewStopPayload, TripStop};

const MAX_ID_SUFFIX: u32 = 9999;
const RANDOM_ID_ATTEMPTS: usize = 16;
/// Upper bound on the stops one visitor's itinerary may hold.
pub const MAX_STOPS: usize = 100;

#[derive(Error, Debug, PartialEq)]
pub enum StopError {
    #[error("{0} is required")]
    MissingField(&'static str),
    #[error("{field} must be a number between -{limit} and {limit}, got {value:?}")]
    InvalidCoordinate {
        field: &'static str,
        limit: f64,
        value: String,
    },
    #[error("date must be formatted as YYYY-MM-DD, got {0:?}")]
    InvalidDate(String),
    #[error("{field} must be http or https URLs, got {value:?}")]
    InvalidUrl { field: &'static str, value: String },
    #[error("no free id left for {0:?}")]
    IdsExhausted(String),
    #[error("an itinerary holds at most {0} stops")]
    TooManyStops(usize),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct TripStats {
    pub countries: usize,
    pub stops: usize,
    pub days: i64,
}

/// The list of stops a visitor is looking at, always ordered by date.
#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
pub struct Itinerary {
    stops: Vec<TripStop>,
}

impl Default for Itinerary {
    fn default() -> Self {
        Itinerary::seeded()
    }
}

fn seed(id: &str, title: &str, date: &str, coords: (f64, f64), story: &str) -> TripStop {
    TripStop {
        id: id.to_string(),
        title: title.to_string(),
        date: date.to_string(),
        coords: Coordinates(coords.0, coords.1),
        story: Some(story.to_string()),
        photos: Vec::new(),
        videos: Vec::new(),
        links: Vec::new(),
    }
}

impl Itinerary {
    pub fn new(mut stops: Vec<TripStop>) -> Self {
        stops.sort_by(|a, b| a.date.cmp(&b.date));
        Itinerary { stops }
    }

    pub fn seeded() -> Self {
        Itinerary::new(vec![
            seed(
                "rome",
                "Rome",
                "2025-09-10",
                (41.9028, 12.4964),
                "Touchdown in Italy. Espresso-fueled wander through Trastevere and a nighttime \
                 Colosseum peek.",
            ),
            seed(
                "naples",
                "Naples",
                "2025-09-13",
                (40.8518, 14.2681),
                "Pizza pilgrimage. Day trip options: Pompeii or Capri if the weather plays nice.",
            ),
            seed(
                "florence",
                "Florence",
                "2025-09-16",
                (43.7696, 11.2558),
                "Renaissance overload. Ponte Vecchio at golden hour; gelato policy: daily.",
            ),
            seed(
                "bern",
                "Bern",
                "2025-09-19",
                (46.948, 7.4474),
                "River float in the Aare (if not freezing) and old-town strolls.",
            ),
            seed(
                "lyon",
                "Lyon",
                "2025-09-22",
                (45.764, 4.8357),
                "France’s food capital. Bouchon crawl and riverside night shots.",
            ),
        ])
    }

    pub fn stops(&self) -> &[TripStop] {
        &self.stops
    }

    pub fn get(&self, id: &str) -> Option<&TripStop> {
        self.stops.iter().find(|stop| stop.id == id)
    }

    /// The stop selected by `id`, or the first stop when nothing (or nothing known) is selected.
    pub fn active(&self, id: Option<&str>) -> Option<&TripStop> {
        id.and_then(|id| self.get(id)).or_else(|| self.stops.first())
    }

    /// Marker positions in stop order; the page draws the route from these.
    pub fn path(&self) -> Vec<Coordinates> {
        self.stops.iter().map(|stop| stop.coords).collect()
    }

    pub fn stats(&self) -> TripStats {
        let countries = self
            .stops
            .iter()
            .map(|stop| Region::locate(stop.coords))
            .collect::<BTreeSet<_>>()
            .len();

        TripStats {
            countries,
            stops: self.stops.len(),
            days: self.days(),
        }
    }

    fn days(&self) -> i64 {
        let mut dates: Vec<&str> = self.stops.iter().map(|stop| stop.date.as_str()).collect();
        dates.sort_unstable();

        let (first, last) = match (dates.first(), dates.last()) {
            (Some(first), Some(last)) => (*first, *last),
            _ => return 0,
        };

        match (parse_date(first), parse_date(last)) {
            (Some(first), Some(last)) => std::cmp::max(1, (last - first).whole_days() + 1),
            _ => 1,
        }
    }

    pub fn add_stop(&mut self, payload: &NewStopPayload) -> Result<&TripStop, StopError> {
        self.add_stop_with_rng(payload, &mut rand::rng())
    }

    /// Validates `payload`, inserts the new stop and re-sorts the itinerary by date.
    ///
    /// On error the itinerary is left untouched.
    pub fn add_stop_with_rng<R: Rng>(
        &mut self,
        payload: &NewStopPayload,
        rng: &mut R,
    ) -> Result<&TripStop, StopError> {
        if self.stops.len() >= MAX_STOPS {
            return Err(StopError::TooManyStops(MAX_STOPS));
        }

        let title = required("title", &payload.title)?;
        let date = required("date", &payload.date)?;
        let lat = required("latitude", &payload.lat)?;
        let lng = required("longitude", &payload.lng)?;

        if parse_date(date).is_none() {
            return Err(StopError::InvalidDate(date.to_string()));
        }
        let coords = Coordinates(
            parse_coordinate("latitude", lat, 90.0)?,
            parse_coordinate("longitude", lng, 180.0)?,
        );

        let photos = split_urls("photos", &payload.photos)?;
        let videos = split_urls("videos", &payload.videos)?;

        let id = self.free_id(&slugify(title), rng)?;

        let story = payload.story.trim();
        let stop = TripStop {
            id,
            title: title.to_string(),
            date: date.to_string(),
            coords,
            story: (!story.is_empty()).then(|| story.to_string()),
            photos,
            videos,
            links: Vec::new(),
        };
        tracing::debug!(id = %stop.id, date = %stop.date, "adding stop");

        self.stops.push(stop);
        self.stops.sort_by(|a, b| a.date.cmp(&b.date));

        // The sort is stable, so the new stop is the last one on its date.
        let index = self.stops.partition_point(|stop| stop.date.as_str() <= date) - 1;
        Ok(&self.stops[index])
    }

    /// A random `slug-N` id not used yet, scanning in order once random draws keep colliding.
    fn free_id<R: Rng>(&self, slug: &str, rng: &mut R) -> Result<String, StopError> {
        let is_free = |candidate: &String| self.get(candidate).is_none();

        (0..RANDOM_ID_ATTEMPTS)
            .map(|_| format!("{}-{}", slug, rng.random_range(0..MAX_ID_SUFFIX)))
            .find(is_free)
            .or_else(|| {
                (0..MAX_ID_SUFFIX)
                    .map(|n| format!("{}-{}", slug, n))
                    .find(is_free)
            })
            .ok_or_else(|| StopError::IdsExhausted(slug.to_string()))
    }
}

fn required<'a>(field: &'static str, value: &'a str) -> Result<&'a str, StopError> {
    match value.trim() {
        "" => Err(StopError::MissingField(field)),
        value => Ok(value),
    }
}

fn parse_coordinate(field: &'static str, value: &str, limit: f64) -> Result<f64, StopError> {
    match value.parse::<f64>() {
        Ok(n) if n.is_finite() && n.abs() <= limit => Ok(n),
        _ => Err(StopError::InvalidCoordinate {
            field,
            limit,
            value: value.to_string(),
        }),
    }
}

fn parse_date(date: &str) -> Option<Date> {
    Date::parse(date, format_description!("[year]-[month]-[day]")).ok()
}

/// Formats a stop date for display, e.g. `Sep 10, 2025`.
pub fn display_date(date: &str) -> String {
    parse_date(date)
        .and_then(|d| {
            d.format(format_description!(
                "[month repr:short] [day padding:none], [year]"
            ))
            .ok()
        })
        .unwrap_or_else(|| date.to_string())
}

fn slugify(title: &str) -> String {
    title
        .to_lowercase()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join("-")
}

fn split_urls(field: &'static str, value: &str) -> Result<Vec<String>, StopError> {
    value
        .split(',')
        .map(str::trim)
        .filter(|url| !url.is_empty())
        .map(|raw| match url::Url::parse(raw) {
            Ok(url) if matches!(url.scheme(), "http" | "https") => Ok(raw.to_string()),
            _ => Err(StopError::InvalidUrl {
                field,
                value: raw.to_string(),
            }),
        })
        .collect()
}
