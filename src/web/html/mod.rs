use serde::{Deserialize, Serialize};
use tide::http::StatusCode;
use tide::{Redirect, Request, Response};

use crate::models::itinerary::{display_date, Itinerary};
use crate::models::region::Region;
use crate::web::session;
use travelog_api_structs::{NewStopPayload, TripStop};

mod utils;

pub(in super::super) fn mount(route: &mut tide::Server<crate::State>) {
    route.at("/").get(itinerary_page);
    route.at("/stops").post(add_stop);
    route.at("/sitemap.xml").get(sitemap);
}

#[derive(Default, Deserialize, Serialize)]
#[serde(default)]
struct PageQueryParams {
    stop: Option<String>,
}

#[derive(Serialize)]
struct StopView<'a> {
    #[serde(flatten)]
    stop: &'a TripStop,
    display_date: String,
    region: &'static str,
    href: String,
    active: bool,
}

fn stop_href(id: &str) -> Result<String, serde_qs::Error> {
    let qs = serde_qs::to_string(&PageQueryParams {
        stop: Some(id.to_string()),
    })?;
    Ok(format!("/?{}", qs))
}

fn stop_view<'a>(
    stop: &'a TripStop,
    active_id: Option<&str>,
) -> Result<StopView<'a>, serde_qs::Error> {
    Ok(StopView {
        stop,
        display_date: display_date(&stop.date),
        region: Region::locate(stop.coords).name(),
        href: stop_href(&stop.id)?,
        active: active_id == Some(stop.id.as_str()),
    })
}

/// A rejected add-stop submission, echoed back into the form.
struct FormError<'a> {
    payload: &'a NewStopPayload,
    message: String,
}

/// Renders the page without waiting on the album; the gallery loads it from `/api/icloud`.
fn render_itinerary(
    req: &Request<crate::State>,
    itinerary: &Itinerary,
    selected: Option<&str>,
    form_error: Option<FormError<'_>>,
    status: StatusCode,
) -> tide::Result<Response> {
    let state = req.state();
    let active = itinerary.active(selected);
    let active_id = active.map(|stop| stop.id.as_str());

    let stops = itinerary
        .stops()
        .iter()
        .map(|stop| stop_view(stop, active_id))
        .collect::<Result<Vec<_>, _>>()?;

    let mut context = tera::Context::new();
    let canonical_href = match active_id {
        Some(id) if selected.is_some() => format!("{}{}", state.args.base_url, stop_href(id)?),
        _ => format!("{}/", state.args.base_url),
    };
    context.insert("canonical_href", &canonical_href);
    let active_view = active
        .map(|stop| stop_view(stop, active_id))
        .transpose()?;
    match active {
        Some(stop) => context.insert("title", &stop.title),
        None => context.insert("title", "itinerary"),
    }
    context.insert("active", &active_view);
    context.insert("stops", &stops);
    context.insert("stats", &itinerary.stats());
    context.insert("path", &itinerary.path());
    context.insert("cache_buster", &state.cache_buster);
    context.insert("year", &time::OffsetDateTime::now_utc().year());
    match form_error {
        Some(FormError { payload, message }) => {
            context.insert("form", payload);
            context.insert("form_error", &message);
        },
        None => {
            context.insert("form", &NewStopPayload::default());
            context.insert("form_error", &None::<String>);
        },
    }

    utils::html_response(state, status, "itinerary.html", &context)
}

async fn itinerary_page(req: Request<crate::State>) -> tide::Result<Response> {
    let query: PageQueryParams = req.query()?;
    let itinerary = session::itinerary(&req);

    render_itinerary(
        &req,
        &itinerary,
        query.stop.as_deref(),
        None,
        StatusCode::Ok,
    )
}

async fn add_stop(mut req: Request<crate::State>) -> tide::Result<Response> {
    let payload: NewStopPayload = req.body_form().await?;
    tracing::debug!("Received stop form: {:?}", payload);

    let mut itinerary = session::itinerary(&req);
    match itinerary.add_stop(&payload) {
        Ok(stop) => {
            let href = stop_href(&stop.id)?;
            tracing::info!(id = %stop.id, "added stop");
            session::store_itinerary(&mut req, &itinerary)?;
            Ok(Redirect::see_other(href).into())
        },
        Err(err) => {
            tracing::info!(error = %err, "rejected stop");
            let form_error = FormError {
                payload: &payload,
                message: err.to_string(),
            };
            render_itinerary(
                &req,
                &itinerary,
                None,
                Some(form_error),
                StatusCode::UnprocessableEntity,
            )
        },
    }
}

async fn sitemap(req: Request<crate::State>) -> tide::Result<Response> {
    let state = req.state();

    let mut buf = Vec::new();
    let sitemap_writer = sitemap::writer::SiteMapWriter::new(&mut buf);
    let mut urlwriter = sitemap_writer.start_urlset()?;

    urlwriter.url(format!("{}/", state.args.base_url))?;

    for stop in Itinerary::seeded().stops() {
        urlwriter.url(format!("{}{}", state.args.base_url, stop_href(&stop.id)?))?;
    }

    urlwriter.end()?;

    let res = Response::builder(StatusCode::Ok)
        .body(buf)
        .content_type(tide::http::mime::XML)
        .build();
    Ok(res)
}
