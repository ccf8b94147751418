use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// A (latitude, longitude) pair, serialized as a two element array.
#[derive(Clone, Copy, Debug, Default, PartialEq, Deserialize, Serialize)]
pub struct Coordinates(pub f64, pub f64);

impl Coordinates {
    pub fn latitude(&self) -> f64 {
        self.0
    }

    pub fn longitude(&self) -> f64 {
        self.1
    }
}

#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
pub struct Link {
    pub label: String,
    pub url: String,
}

#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
pub struct TripStop {
    pub id: String,
    pub title: String,
    /// `YYYY-MM-DD`, ordered lexically.
    pub date: String,
    pub coords: Coordinates,
    #[serde(default)]
    pub story: Option<String>,
    #[serde(default)]
    pub photos: Vec<String>,
    #[serde(default)]
    pub videos: Vec<String>,
    #[serde(default)]
    pub links: Vec<Link>,
}

/// Raw add-stop fields as they arrive from the form or the JSON API.
///
/// Photo and video URLs are comma separated.
#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct NewStopPayload {
    pub title: String,
    pub date: String,
    pub lat: String,
    pub lng: String,
    pub story: String,
    pub photos: String,
    pub videos: String,
}

#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
pub struct AssetLocation {
    pub scheme: String,
    pub hosts: Vec<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AlbumMetadata {
    pub stream_name: Option<String>,
    pub user_first_name: Option<String>,
    pub user_last_name: Option<String>,
    pub stream_ctag: Option<String>,
    pub items_returned: Option<u32>,
    #[serde(default)]
    pub locations: BTreeMap<String, AssetLocation>,
}

#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
pub struct AlbumPhoto {
    pub url: String,
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub caption: String,
    pub id: String,
    #[serde(rename = "ts")]
    pub timestamp: Option<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize)]
pub struct AlbumPayload {
    pub metadata: AlbumMetadata,
    pub photos: Vec<AlbumPhoto>,
}

#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
pub struct ErrorPayload {
    pub error: String,
}
