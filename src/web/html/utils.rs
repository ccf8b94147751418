use html_minifier::HTMLMinifier;
use tera::Context;
use thiserror::Error;
use tide::http::StatusCode;
use tide::Response;

use crate::State;

#[derive(Error, Debug)]
pub enum TemplateError {
    #[error("rendering error: {0}")]
    Tera(#[from] tera::Error),
    #[error("minifier rejected page: {0}")]
    Minify(String),
    #[error("minified page is not UTF-8: {0}")]
    Utf8(#[from] std::string::FromUtf8Error),
}

fn minify(html: &str) -> Result<String, TemplateError> {
    let mut minifier = HTMLMinifier::new();
    minifier
        .digest(html)
        .map_err(|err| TemplateError::Minify(err.to_string()))?;
    Ok(String::from_utf8(minifier.get_html().to_vec())?)
}

/// Renders `template` and minifies it. A page the minifier chokes on is served as rendered.
pub(super) fn render(
    state: &State,
    template: &'static str,
    context: &Context,
) -> Result<String, TemplateError> {
    let page = state.tera.render(template, context)?;

    Ok(minify(&page).unwrap_or_else(|err| {
        tracing::error!(template, error = %err, "serving unminified page");
        page
    }))
}

pub(super) fn html_response(
    state: &State,
    status: StatusCode,
    template: &'static str,
    context: &Context,
) -> tide::Result<Response> {
    let body = render(state, template, context)?;

    Ok(Response::builder(status)
        .content_type(tide::http::mime::HTML)
        .body(body)
        .build())
}
