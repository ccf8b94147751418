use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use rand::RngCore;
use structopt::StructOpt;

pub mod album;
pub mod models;
pub mod telemetry;
pub mod web;

const SESSION_SECRET_LEN: usize = 64;
const SESSION_CLEANUP_INTERVAL: Duration = Duration::from_secs(5 * 60);

#[derive(Clone, Debug)]
pub struct State {
    pub args: Arc<Args>,
    pub album: Arc<album::AlbumService>,
    pub tera: Arc<tera::Tera>,
    pub cache_buster: Option<String>,
}

#[derive(Debug)]
pub enum Error {
    TemplateParseError(tera::Error),
    TelemetryInitError(anyhow::Error),
    TemplatePathError(PathBuf, std::io::Error),
    HttpClientError(isahc::Error),
    ListenError(std::io::Error),
    StaticPathError(PathBuf, std::io::Error),
}

impl From<Error> for u8 {
    fn from(error: Error) -> u8 {
        match error {
            Error::TemplateParseError(_) => 3,
            Error::TelemetryInitError(_) => 4,
            Error::TemplatePathError(..) => 5,
            Error::HttpClientError(_) => 6,
            Error::ListenError(_) => 7,
            Error::StaticPathError(..) => 8,
        }
    }
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Error::TemplateParseError(err) => {
                write!(f, "Template parsing error: {}", err)
            },
            Error::TelemetryInitError(err) => {
                write!(f, "Failed to init telemetry: {}", err)
            },
            Error::TemplatePathError(path, err) => {
                write!(f, "Invalid template path {}: {}", path.display(), err)
            },
            Error::HttpClientError(err) => {
                write!(f, "Failed to create album HTTP client: {}", err)
            },
            Error::ListenError(err) => {
                write!(f, "Failed to start server: {}", err)
            },
            Error::StaticPathError(path, err) => {
                write!(f, "Invalid static path {}: {}", path.display(), err)
            },
        }
    }
}

#[derive(Debug, StructOpt)]
pub struct Args {
    /// Host address to bind to.
    #[structopt(long, default_value = "localhost", env = "TRAVELOG_BIND_ADDRESS")]
    address: String,
    /// Port to bind to.
    #[structopt(long, default_value = "8166", env = "TRAVELOG_BIND_PORT")]
    port: u16,

    /// Site base URL, used for canonical links and the sitemap.
    #[structopt(long, env = "TRAVELOG_BASE_URL")]
    base_url: String,

    /// Path to Tera templates directory
    #[structopt(
        long,
        parse(from_os_str),
        default_value = "./templates",
        env = "TRAVELOG_TEMPLATE_PATH"
    )]
    template_path: PathBuf,

    /// Path to the static assets directory, served under `/static`.
    #[structopt(
        long,
        parse(from_os_str),
        default_value = "./static",
        env = "TRAVELOG_STATIC_PATH"
    )]
    static_path: PathBuf,

    /// iCloud shared album token.
    #[structopt(long, env = "ICLOUD_SHARED_ALBUM_TOKEN", hide_env_values = true)]
    album_token: Option<String>,

    /// Seconds a fetched album is served before it is fetched again.
    #[structopt(
        long,
        default_value = "900",
        env = "TRAVELOG_ALBUM_REVALIDATE_SECS"
    )]
    album_revalidate_secs: u64,

    /// Secret used to sign session cookies; a random one is generated if unset.
    #[structopt(long, env = "TRAVELOG_SESSION_SECRET", hide_env_values = true)]
    session_secret: Option<String>,

    /// Seconds an idle visitor session, and the itinerary in it, is kept.
    #[structopt(long, default_value = "86400", env = "TRAVELOG_SESSION_TTL_SECS")]
    session_ttl_secs: u64,

    /// Log output format.
    #[structopt(
        long,
        default_value = "text",
        possible_values = &["text", "json"],
        env = "TRAVELOG_LOG_FORMAT"
    )]
    log_format: telemetry::LogFormat,
}

pub fn load_templates(template_path: &Path) -> Result<tera::Tera, Error> {
    let template_path = template_path
        .canonicalize()
        .map_err(|err| Error::TemplatePathError(template_path.to_path_buf(), err))?;

    tera::Tera::new(&template_path.join("**/*.html").to_string_lossy())
        .map_err(Error::TemplateParseError)
}

/// The first word of the optional `cache-buster` file next to the templates.
pub fn load_cache_buster(template_path: &Path) -> Option<String> {
    match std::fs::read_to_string(template_path.join("cache-buster")) {
        Ok(data) => data.split_whitespace().next().map(String::from),
        Err(err) => {
            tracing::debug!(error = %err, "no cache busting string");
            None
        },
    }
}

fn session_secret(args: &Args) -> Vec<u8> {
    match &args.session_secret {
        Some(secret) if secret.len() >= 32 => secret.as_bytes().to_vec(),
        configured => {
            if configured.is_some() {
                tracing::warn!("session secret is shorter than 32 bytes, using a random one");
            }
            let mut secret = vec![0u8; SESSION_SECRET_LEN];
            rand::rng().fill_bytes(&mut secret);
            secret
        },
    }
}

/// Builds the application with all middleware and routes mounted.
///
/// Visitor sessions live in `sessions`; expired ones are dropped by
/// [`web::session::expire_sessions`].
pub fn server(
    state: State,
    session_secret: &[u8],
    sessions: tide::sessions::MemoryStore,
) -> Result<tide::Server<State>, Error> {
    let session_ttl = Duration::from_secs(state.args.session_ttl_secs);
    let static_path = state.args.static_path.clone();
    let mut app = tide::with_state(state);

    app.with(telemetry::RequestTracing);
    app.with(
        tide::sessions::SessionMiddleware::new(sessions, session_secret)
            .with_session_ttl(Some(session_ttl)),
    );

    web::mount(&mut app);
    app.at("/static")
        .serve_dir(&static_path)
        .map_err(|err| Error::StaticPathError(static_path, err))?;

    Ok(app)
}

pub async fn main() -> Result<(), Error> {
    dotenv::dotenv().ok();
    let args = Arc::new(Args::from_args());

    telemetry::init(args.log_format).map_err(Error::TelemetryInitError)?;

    let tera = load_templates(&args.template_path)?;
    let cache_buster = load_cache_buster(&args.template_path);

    let source = album::icloud::ICloudSharedAlbum::new().map_err(Error::HttpClientError)?;
    let album = album::AlbumService::new(
        Arc::new(source),
        args.album_token.clone(),
        Duration::from_secs(args.album_revalidate_secs),
    );
    if args.album_token.as_deref().map_or(true, str::is_empty) {
        tracing::warn!("ICLOUD_SHARED_ALBUM_TOKEN is not set, the gallery will stay empty");
    }

    let state = State {
        args: args.clone(),
        album: Arc::new(album),
        tera: Arc::new(tera),
        cache_buster,
    };
    let sessions = tide::sessions::MemoryStore::new();
    let app = server(state, &session_secret(&args), sessions.clone())?;
    async_std::task::spawn(web::session::expire_sessions(
        sessions,
        SESSION_CLEANUP_INTERVAL,
    ));

    let address: &str = args.address.as_ref();
    tracing::info!(address, port = args.port, "listening");
    app.listen((address, args.port))
        .await
        .map_err(Error::ListenError)?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scratch_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("travelog-{}-{}", name, std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    #[test]
    fn test_cache_buster_is_first_word_of_file() {
        let dir = scratch_dir("cache-buster");
        std::fs::write(dir.join("cache-buster"), "3f2a9c1\nbuilt by ci\n").unwrap();

        assert_eq!(load_cache_buster(&dir), Some("3f2a9c1".to_string()));
        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn test_cache_buster_is_optional() {
        let dir = scratch_dir("no-cache-buster");

        assert_eq!(load_cache_buster(&dir), None);
        std::fs::remove_dir_all(&dir).unwrap();
    }
}
