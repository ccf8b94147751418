//! Client for iCloud shared photo streams.
//!
//! A stream is read in two steps: `webstream` returns the album metadata and one record per
//! photo with its derivatives identified by checksum, and `webasseturls` resolves those
//! checksums to downloadable URLs.

use std::collections::{BTreeMap, HashMap};
use std::time::Duration;

use isahc::prelude::*;
use isahc::{HttpClient, Request};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};
use tracing::{debug, instrument};
use url::Url;

use super::{AlbumError, AlbumSource, Derivative, SharedStream, StreamPhoto};
use travelog_api_structs::{AlbumMetadata, AssetLocation};

const BASE_62_CHARSET: &str = "0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz";
const REDIRECT_STATUS: u16 = 330;
const REDIRECT_HOST_KEY: &str = "X-Apple-MMe-Host";
const ASSET_URL_BATCH: usize = 25;
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug)]
pub struct ICloudSharedAlbum {
    client: HttpClient,
}

impl ICloudSharedAlbum {
    pub fn new() -> Result<Self, isahc::Error> {
        let client = HttpClient::builder().timeout(REQUEST_TIMEOUT).build()?;
        Ok(ICloudSharedAlbum { client })
    }

    async fn post<B, T>(
        &self,
        base: &Url,
        endpoint: &'static str,
        body: &B,
    ) -> Result<Reply<T>, AlbumError>
    where
        B: Serialize + Sync,
        T: DeserializeOwned,
    {
        let url = base.join(endpoint).map_err(|_| AlbumError::InvalidToken)?;
        let request = Request::post(url.as_str())
            .header("content-type", "application/json")
            .body(serde_json::to_vec(body)?)?;

        let mut response = self.client.send_async(request).await?;
        let status = response.status().as_u16();
        let text = response.text().await?;
        debug!(endpoint, status, bytes = text.len(), "album service replied");

        match status {
            REDIRECT_STATUS => {
                let redirect: HashMap<String, serde_json::Value> = serde_json::from_str(&text)?;
                match redirect.get(REDIRECT_HOST_KEY).and_then(|host| host.as_str()) {
                    Some(host) => Ok(Reply::Redirect(host.to_string())),
                    None => Err(AlbumError::Status { endpoint, status }),
                }
            },
            200..=299 => Ok(Reply::Body(serde_json::from_str(&text)?)),
            _ => Err(AlbumError::Status { endpoint, status }),
        }
    }

    async fn webstream(&self, token: &str) -> Result<(Url, WebStream), AlbumError> {
        let body = serde_json::json!({ "streamCtag": null });

        let base = base_url(token)?;
        match self.post(&base, "webstream", &body).await? {
            Reply::Body(stream) => Ok((base, stream)),
            Reply::Redirect(host) => {
                debug!(%host, "following shared stream host redirect");
                let base = redirected_url(&host, token)?;
                match self.post(&base, "webstream", &body).await? {
                    Reply::Body(stream) => Ok((base, stream)),
                    Reply::Redirect(_) => Err(AlbumError::TooManyRedirects),
                }
            },
        }
    }

    async fn asset_urls(
        &self,
        base: &Url,
        guids: &[String],
    ) -> Result<HashMap<String, String>, AlbumError> {
        let mut urls = HashMap::new();

        for batch in guids.chunks(ASSET_URL_BATCH) {
            let body = AssetUrlsRequest { photo_guids: batch };
            let assets: AssetUrls = match self.post(base, "webasseturls", &body).await? {
                Reply::Body(assets) => assets,
                Reply::Redirect(_) => return Err(AlbumError::TooManyRedirects),
            };

            urls.extend(assets.items.into_iter().map(|(checksum, item)| {
                (checksum, format!("https://{}{}", item.url_location, item.url_path))
            }));
        }

        Ok(urls)
    }
}

#[async_trait::async_trait]
impl AlbumSource for ICloudSharedAlbum {
    #[instrument(skip_all)]
    async fn fetch(&self, token: &str) -> Result<SharedStream, AlbumError> {
        let (base, stream) = self.webstream(token).await?;

        let guids: Vec<String> = stream
            .photos
            .iter()
            .filter_map(|photo| photo.photo_guid.clone())
            .collect();
        let urls = self.asset_urls(&base, &guids).await?;

        Ok(stream.into_shared_stream(&urls))
    }
}

enum Reply<T> {
    Body(T),
    Redirect(String),
}

/// Derives the partition host for a token, e.g. `B0z5...` lives on `p61`.
pub fn base_url(token: &str) -> Result<Url, AlbumError> {
    let token = path_token(token);
    let chars: Vec<char> = token.chars().collect();

    let digits = match chars.as_slice() {
        ['A', _, ..] => &chars[1..2],
        [_, _, _, ..] => &chars[1..3],
        _ => return Err(AlbumError::InvalidToken),
    };
    let partition = base62(digits).ok_or(AlbumError::InvalidToken)?;

    Url::parse(&format!(
        "https://p{partition:02}-sharedstreams.icloud.com/{token}/sharedstreams/"
    ))
    .map_err(|_| AlbumError::InvalidToken)
}

fn redirected_url(host: &str, token: &str) -> Result<Url, AlbumError> {
    Url::parse(&format!(
        "https://{host}/{}/sharedstreams/",
        path_token(token)
    ))
    .map_err(|_| AlbumError::InvalidToken)
}

/// Strips the optional `;suffix` from a token.
fn path_token(token: &str) -> &str {
    token.split(';').next().unwrap_or(token)
}

fn base62(digits: &[char]) -> Option<u32> {
    digits.iter().try_fold(0u32, |acc, digit| {
        BASE_62_CHARSET
            .find(*digit)
            .map(|value| acc * 62 + value as u32)
    })
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct AssetUrlsRequest<'a> {
    photo_guids: &'a [String],
}

#[derive(Debug, Deserialize)]
struct AssetUrls {
    #[serde(default)]
    items: HashMap<String, AssetItem>,
}

#[derive(Debug, Deserialize)]
struct AssetItem {
    url_location: String,
    url_path: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WebStream {
    stream_name: Option<String>,
    user_first_name: Option<String>,
    user_last_name: Option<String>,
    stream_ctag: Option<String>,
    #[serde(default, deserialize_with = "lenient_u32")]
    items_returned: Option<u32>,
    #[serde(default)]
    locations: BTreeMap<String, AssetLocation>,
    #[serde(default)]
    photos: Vec<WebStreamPhoto>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WebStreamPhoto {
    photo_guid: Option<String>,
    caption: Option<String>,
    date_created: Option<String>,
    #[serde(default)]
    derivatives: BTreeMap<String, WebStreamDerivative>,
}

#[derive(Debug, Deserialize)]
struct WebStreamDerivative {
    checksum: Option<String>,
    #[serde(default, deserialize_with = "lenient_u32")]
    width: Option<u32>,
    #[serde(default, deserialize_with = "lenient_u32")]
    height: Option<u32>,
}

impl WebStream {
    fn into_shared_stream(self, urls: &HashMap<String, String>) -> SharedStream {
        let photos = self
            .photos
            .into_iter()
            .map(|photo| StreamPhoto {
                guid: photo.photo_guid,
                caption: photo.caption,
                created: photo.date_created,
                derivatives: photo
                    .derivatives
                    .into_iter()
                    .map(|(key, derivative)| {
                        let url = derivative
                            .checksum
                            .as_ref()
                            .and_then(|checksum| urls.get(checksum))
                            .cloned();
                        (
                            key,
                            Derivative {
                                url,
                                width: derivative.width,
                                height: derivative.height,
                            },
                        )
                    })
                    .collect(),
            })
            .collect();

        SharedStream {
            metadata: AlbumMetadata {
                stream_name: self.stream_name,
                user_first_name: self.user_first_name,
                user_last_name: self.user_last_name,
                stream_ctag: self.stream_ctag,
                items_returned: self.items_returned,
                locations: self.locations,
            },
            photos,
        }
    }
}

/// iCloud sends most numbers as strings; accept either.
fn lenient_u32<'de, D>(deserializer: D) -> Result<Option<u32>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum NumberOrString {
        Number(u64),
        Text(String),
    }

    Ok(match Option::<NumberOrString>::deserialize(deserializer)? {
        Some(NumberOrString::Number(n)) => u32::try_from(n).ok(),
        Some(NumberOrString::Text(s)) => s.trim().parse().ok(),
        None => None,
    })
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn test_base_url_two_digit_partition() {
        let url = base_url("B0z5qAGN1JIFd3y").unwrap();
        assert_eq!(
            url.as_str(),
            "https://p61-sharedstreams.icloud.com/B0z5qAGN1JIFd3y/sharedstreams/"
        );
    }

    #[test]
    fn test_base_url_single_digit_partition() {
        let url = base_url("A7GJfsJ8bhVCq1").unwrap();
        assert_eq!(
            url.as_str(),
            "https://p07-sharedstreams.icloud.com/A7GJfsJ8bhVCq1/sharedstreams/"
        );
        assert!(base_url("AfQ").unwrap().as_str().starts_with("https://p41-"));
    }

    #[test]
    fn test_base_url_strips_suffix() {
        let url = base_url("B0z5qAGN;extra").unwrap();
        assert_eq!(
            url.as_str(),
            "https://p61-sharedstreams.icloud.com/B0z5qAGN/sharedstreams/"
        );
    }

    #[test]
    fn test_base_url_rejects_bad_tokens() {
        assert!(matches!(base_url("B"), Err(AlbumError::InvalidToken)));
        assert!(matches!(base_url("B-!x"), Err(AlbumError::InvalidToken)));
    }

    #[test]
    fn test_redirected_url() {
        let url = redirected_url("p123-sharedstreams.icloud.com", "B0z5;x").unwrap();
        assert_eq!(
            url.join("webstream").unwrap().as_str(),
            "https://p123-sharedstreams.icloud.com/B0z5/sharedstreams/webstream"
        );
    }

    #[test]
    fn test_webstream_with_string_numbers() {
        let stream: WebStream = serde_json::from_str(
            r#"{
                "streamName": "Europe 2025",
                "userFirstName": "Ben",
                "streamCtag": "FT;42",
                "itemsReturned": "2",
                "locations": {"cvws.icloud-content.com": {"scheme": "https", "hosts": ["cvws.icloud-content.com"]}},
                "photos": [
                    {
                        "photoGuid": "G1",
                        "caption": "Trastevere",
                        "dateCreated": "2025-09-10T18:00:00Z",
                        "derivatives": {
                            "342": {"checksum": "small", "width": "256", "height": "342", "fileSize": "1000"},
                            "2049": {"checksum": "large", "width": 1536, "height": "2049", "fileSize": "90000"}
                        }
                    },
                    {"photoGuid": "G2", "derivatives": {"342": {"checksum": "unknown"}}}
                ]
            }"#,
        )
        .unwrap();

        let urls: HashMap<String, String> = [(
            "large".to_string(),
            "https://cvws.icloud-content.com/B/large".to_string(),
        )]
        .into_iter()
        .collect();
        let shared = stream.into_shared_stream(&urls);

        assert_eq!(shared.metadata.items_returned, Some(2));
        assert_eq!(shared.metadata.stream_name.as_deref(), Some("Europe 2025"));
        assert_eq!(shared.metadata.locations.len(), 1);
        assert_eq!(shared.photos.len(), 2);

        let large = &shared.photos[0].derivatives["2049"];
        assert_eq!(
            large,
            &Derivative {
                url: Some("https://cvws.icloud-content.com/B/large".to_string()),
                width: Some(1536),
                height: Some(2049),
            }
        );
        assert_eq!(shared.photos[0].derivatives["342"].url, None);
        assert_eq!(shared.photos[1].derivatives["342"].width, None);
    }

    #[test]
    fn test_asset_urls_response() {
        let assets: AssetUrls = serde_json::from_str(
            r#"{
                "items": {"large": {"url_expiry": "2025-09-10T20:00:00Z", "url_location": "cvws.icloud-content.com", "url_path": "/B/large?o=1"}},
                "locations": {}
            }"#,
        )
        .unwrap();
        let item = &assets.items["large"];
        assert_eq!(item.url_location, "cvws.icloud-content.com");
        assert_eq!(item.url_path, "/B/large?o=1");
    }
}
