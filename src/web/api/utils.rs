use serde::Serialize;
use tide::http::StatusCode;
use tide::{Body, Response};

use travelog_api_structs::ErrorPayload;

pub fn json_response<T: Serialize>(status: StatusCode, body: &T) -> tide::Result<Response> {
    Ok(Response::builder(status)
        .body(Body::from_json(body)?)
        .build())
}

pub fn json_error(status: StatusCode, error: impl Into<String>) -> tide::Result<Response> {
    json_response(
        status,
        &ErrorPayload {
            error: error.into(),
        },
    )
}
