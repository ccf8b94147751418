use tide::{Request, Response};

use crate::album;
use crate::web::api::utils::{json_error, json_response};

pub mod utils;
pub mod v1;

pub(super) fn mount(mut route: tide::Route<crate::State>) {
    route.at("/icloud").get(icloud_album);
    v1::mount(route.at("/v1"));
}

async fn icloud_album(req: Request<crate::State>) -> tide::Result<Response> {
    let state = req.state();

    match state.album.load().await {
        Ok(album) => {
            let mut res = json_response(tide::http::StatusCode::Ok, &*album)?;
            res.insert_header(
                "Cache-Control",
                format!(
                    "public, s-maxage={}, stale-while-revalidate",
                    state.album.revalidate().as_secs()
                ),
            );
            Ok(res)
        },
        Err(err) => {
            tracing::warn!(error = %err, "shared album unavailable");
            json_error(
                tide::http::StatusCode::InternalServerError,
                album::error_message(&err),
            )
        },
    }
}
