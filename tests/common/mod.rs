#![allow(dead_code)]

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use structopt::StructOpt;
use tide::http::{Method, Request, Response, Url};

use travelog::album::{AlbumError, AlbumService, AlbumSource, Derivative, SharedStream, StreamPhoto};
use travelog::{Args, State};
use travelog_api_structs::AlbumMetadata;

pub const TOKEN: &str = "B0z5qAGN1JIFd3y";
pub const BASE_URL: &str = "https://trip.example";
const SESSION_SECRET: &[u8] = b"an-integration-test-session-secret-of-enough-bytes";

/// Serves a fixed two photo album, one of which has no resolvable URL.
#[derive(Debug, Default)]
pub struct FixtureAlbum {
    pub calls: AtomicUsize,
}

impl FixtureAlbum {
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

fn derivative(url: Option<&str>, width: u32, height: u32) -> Derivative {
    Derivative {
        url: url.map(String::from),
        width: Some(width),
        height: Some(height),
    }
}

#[async_trait::async_trait]
impl AlbumSource for FixtureAlbum {
    async fn fetch(&self, _token: &str) -> Result<SharedStream, AlbumError> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        let mut colosseum = BTreeMap::new();
        colosseum.insert(
            "100".to_string(),
            derivative(Some("https://cdn.example/colosseum-100.jpg"), 75, 100),
        );
        colosseum.insert(
            "200".to_string(),
            derivative(Some("https://cdn.example/colosseum-200.jpg"), 150, 200),
        );
        colosseum.insert(
            "400".to_string(),
            derivative(Some("https://cdn.example/colosseum-400.jpg"), 300, 400),
        );

        let mut broken = BTreeMap::new();
        broken.insert("342".to_string(), derivative(None, 256, 342));

        Ok(SharedStream {
            metadata: AlbumMetadata {
                stream_name: Some("Europe 2025".to_string()),
                user_first_name: Some("Ben".to_string()),
                items_returned: Some(2),
                ..Default::default()
            },
            photos: vec![
                StreamPhoto {
                    guid: Some("colosseum".to_string()),
                    caption: Some("Colosseum at night".to_string()),
                    created: Some("2025-09-10T21:04:00Z".to_string()),
                    derivatives: colosseum,
                },
                StreamPhoto {
                    guid: Some("broken".to_string()),
                    derivatives: broken,
                    ..Default::default()
                },
            ],
        })
    }
}

#[derive(Debug)]
pub struct UnreachableAlbum;

#[async_trait::async_trait]
impl AlbumSource for UnreachableAlbum {
    async fn fetch(&self, _token: &str) -> Result<SharedStream, AlbumError> {
        Err(AlbumError::Status {
            endpoint: "webstream",
            status: 503,
        })
    }
}

/// Never answers, like an upstream that stopped responding.
#[derive(Debug)]
pub struct StalledAlbum;

#[async_trait::async_trait]
impl AlbumSource for StalledAlbum {
    async fn fetch(&self, _token: &str) -> Result<SharedStream, AlbumError> {
        async_std::future::pending().await
    }
}

pub const CACHE_BUSTER: &str = "3f2a9c1";

pub fn app(source: Arc<dyn AlbumSource>, token: Option<&str>) -> tide::Server<State> {
    let args = Args::from_iter(["travelog", "--base-url", BASE_URL]);
    let tera = travelog::load_templates(Path::new("templates")).expect("templates should parse");
    let album = AlbumService::new(source, token.map(String::from), Duration::from_secs(900));

    let state = State {
        args: Arc::new(args),
        album: Arc::new(album),
        tera: Arc::new(tera),
        cache_buster: Some(CACHE_BUSTER.to_string()),
    };
    travelog::server(state, SESSION_SECRET, tide::sessions::MemoryStore::new())
        .expect("static directory should exist")
}

pub fn get(path: &str) -> Request {
    Request::new(Method::Get, url(path))
}

pub fn post_form(path: &str, body: &str) -> Request {
    let mut req = Request::new(Method::Post, url(path));
    req.set_body(body);
    req.set_content_type(tide::http::mime::FORM);
    req
}

pub fn post_json(path: &str, body: &serde_json::Value) -> Request {
    let mut req = Request::new(Method::Post, url(path));
    req.set_body(tide::Body::from_json(body).expect("json body"));
    req
}

pub fn with_cookie(mut req: Request, cookie: &str) -> Request {
    req.insert_header("Cookie", cookie);
    req
}

/// The `name=value` part of the session cookie set by `res`.
pub fn session_cookie(res: &Response) -> String {
    let set_cookie = res
        .header("Set-Cookie")
        .expect("response should set a session cookie");
    set_cookie
        .last()
        .as_str()
        .split(';')
        .next()
        .expect("cookie pair")
        .to_string()
}

fn url(path: &str) -> Url {
    Url::parse("http://localhost")
        .and_then(|base| base.join(path))
        .expect("valid test url")
}
