use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use moka::future::Cache;
use thiserror::Error;

use travelog_api_structs::{AlbumMetadata, AlbumPayload};

pub mod icloud;
pub mod select;

pub const MISSING_TOKEN_MESSAGE: &str = "Missing ICLOUD_SHARED_ALBUM_TOKEN";
const FALLBACK_MESSAGE: &str = "Failed to fetch iCloud album";

#[derive(Error, Debug)]
pub enum AlbumError {
    #[error("{}", MISSING_TOKEN_MESSAGE)]
    MissingToken,
    #[error("invalid shared album token")]
    InvalidToken,
    #[error("album request failed: {0}")]
    Http(#[from] isahc::Error),
    #[error("could not build album request: {0}")]
    Request(#[from] isahc::http::Error),
    #[error("could not read album response: {0}")]
    Io(#[from] std::io::Error),
    #[error("malformed album response: {0}")]
    Json(#[from] serde_json::Error),
    #[error("album service answered {endpoint} with status {status}")]
    Status { endpoint: &'static str, status: u16 },
    #[error("album service redirected more than once")]
    TooManyRedirects,
}

/// The message shown to visitors for a failed album load.
pub fn error_message(err: &AlbumError) -> String {
    let message = err.to_string();
    if message.trim().is_empty() {
        FALLBACK_MESSAGE.to_string()
    } else {
        message
    }
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct Derivative {
    pub url: Option<String>,
    pub width: Option<u32>,
    pub height: Option<u32>,
}

/// A photo record as the provider returns it, derivatives keyed by pixel height.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct StreamPhoto {
    pub guid: Option<String>,
    pub caption: Option<String>,
    pub created: Option<String>,
    pub derivatives: BTreeMap<String, Derivative>,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct SharedStream {
    pub metadata: AlbumMetadata,
    pub photos: Vec<StreamPhoto>,
}

#[async_trait::async_trait]
pub trait AlbumSource: fmt::Debug + Send + Sync {
    async fn fetch(&self, token: &str) -> Result<SharedStream, AlbumError>;
}

/// Fetches the album behind `token` and reshapes it for display.
pub async fn load_album(
    source: &dyn AlbumSource,
    token: Option<&str>,
) -> Result<AlbumPayload, AlbumError> {
    let token = match token {
        Some(token) if !token.is_empty() => token,
        _ => return Err(AlbumError::MissingToken),
    };

    let stream = source.fetch(token).await?;
    let fetched = stream.photos.len();
    let photos: Vec<_> = stream
        .photos
        .iter()
        .filter_map(select::project_photo)
        .collect();
    tracing::info!(fetched, kept = photos.len(), "loaded shared album");

    Ok(AlbumPayload {
        metadata: stream.metadata,
        photos,
    })
}

/// [`load_album`] with the configured token, revalidated every `revalidate`.
pub struct AlbumService {
    source: Arc<dyn AlbumSource>,
    token: Option<String>,
    revalidate: Duration,
    cache: Cache<String, Arc<AlbumPayload>>,
}

impl fmt::Debug for AlbumService {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AlbumService")
            .field("source", &self.source)
            .field("token", &self.token.as_ref().map(|_| "<redacted>"))
            .field("revalidate", &self.revalidate)
            .finish()
    }
}

impl AlbumService {
    pub fn new(source: Arc<dyn AlbumSource>, token: Option<String>, revalidate: Duration) -> Self {
        let cache = Cache::builder()
            .max_capacity(4)
            .time_to_live(revalidate)
            .build();

        AlbumService {
            source,
            token,
            revalidate,
            cache,
        }
    }

    pub fn revalidate(&self) -> Duration {
        self.revalidate
    }

    /// Only successful loads are cached; failures are retried on the next call.
    pub async fn load(&self) -> Result<Arc<AlbumPayload>, Arc<AlbumError>> {
        let token = match self.token.as_deref() {
            Some(token) if !token.is_empty() => token,
            _ => return Err(Arc::new(AlbumError::MissingToken)),
        };

        self.cache
            .try_get_with(token.to_string(), async {
                load_album(self.source.as_ref(), Some(token))
                    .await
                    .map(Arc::new)
            })
            .await
    }
}
