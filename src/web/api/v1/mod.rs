use tide::http::StatusCode;
use tide::{Request, Response};

use crate::web::api::utils::{json_error, json_response};
use crate::web::session;
use travelog_api_structs::NewStopPayload;

pub(super) fn mount(mut route: tide::Route<crate::State>) {
    route.at("/stops").get(list_stops).post(create_stop);
}

async fn list_stops(req: Request<crate::State>) -> tide::Result<Response> {
    let itinerary = session::itinerary(&req);

    json_response(
        StatusCode::Ok,
        &tide::convert::json!({
            "stops": itinerary.stops(),
            "stats": itinerary.stats(),
        }),
    )
}

async fn create_stop(mut req: Request<crate::State>) -> tide::Result<Response> {
    let payload: NewStopPayload = req.body_json().await?;
    tracing::debug!("Received stop payload: {:?}", payload);

    let mut itinerary = session::itinerary(&req);
    let stop = match itinerary.add_stop(&payload) {
        Ok(stop) => stop.clone(),
        Err(err) => return json_error(StatusCode::UnprocessableEntity, err.to_string()),
    };
    session::store_itinerary(&mut req, &itinerary)?;

    json_response(
        StatusCode::Created,
        &tide::convert::json!({
            "stop": stop,
        }),
    )
}
