use std::io;
use std::str::FromStr;
use std::time::Instant;

use anyhow::{anyhow, Context, Result};
use tracing::{field, info_span, Instrument};
use tracing_subscriber::{
    fmt::{format::FmtSpan, time::UtcTime},
    prelude::__tracing_subscriber_SubscriberExt,
    util::SubscriberInitExt,
    EnvFilter,
};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LogFormat {
    Text,
    Json,
}

impl FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "text" => Ok(LogFormat::Text),
            "json" => Ok(LogFormat::Json),
            other => Err(format!("unknown log format: {other}")),
        }
    }
}

pub(crate) fn init(format: LogFormat) -> Result<()> {
    let env_filter = env_filter_merge_from_environment("info", "TRAVELOG_LOG_LEVEL")?;

    let text_layer = (format == LogFormat::Text).then(|| {
        tracing_subscriber::fmt::layer()
            .with_writer(io::stderr)
            .with_timer(UtcTime::rfc_3339())
            .with_span_events(FmtSpan::NEW | FmtSpan::CLOSE)
    });
    let json_layer = (format == LogFormat::Json).then(|| {
        tracing_subscriber::fmt::layer()
            .json()
            .with_writer(io::stderr)
            .with_timer(UtcTime::rfc_3339())
            .with_span_events(FmtSpan::CLOSE)
    });

    tracing_subscriber::registry()
        .with(env_filter)
        .with(text_layer)
        .with(json_layer)
        .try_init()
        .context("Failed to set global default tracing subscriber")?;

    Ok(())
}

fn env_filter_merge_from_environment(
    default_directives: &'static str,
    env_var: &'static str,
) -> Result<EnvFilter> {
    let mut filter = EnvFilter::builder()
        .parse(default_directives)
        .with_context(|| anyhow!("Default directives were invalid: {default_directives}"))?;

    if let Ok(env_value) = std::env::var(env_var) {
        for env_directive in env_value.split(',').filter(|d| !d.is_empty()) {
            match env_directive.parse() {
                Ok(directive) => filter = filter.add_directive(directive),
                Err(err) => eprintln!("WARN ignoring log directive: {env_directive:?}: {err}"),
            }
        }
    }

    Ok(filter)
}

/// Wraps every request in a span carrying its method, path and final status.
#[derive(Clone, Copy, Debug, Default)]
pub struct RequestTracing;

#[async_trait::async_trait]
impl<State: Clone + Send + Sync + 'static> tide::Middleware<State> for RequestTracing {
    async fn handle(&self, req: tide::Request<State>, next: tide::Next<'_, State>) -> tide::Result {
        let span = info_span!(
            "request",
            method = %req.method(),
            path = %req.url().path(),
            status = field::Empty,
        );
        let start = Instant::now();

        let response = next.run(req).instrument(span.clone()).await;

        let status = response.status();
        span.record("status", &u16::from(status));
        span.in_scope(|| {
            let elapsed_ms = start.elapsed().as_millis() as u64;
            match response.error() {
                Some(err) => tracing::error!(%err, elapsed_ms, "request failed"),
                None if status.is_server_error() => {
                    tracing::warn!(elapsed_ms, "request finished with server error")
                },
                None => tracing::info!(elapsed_ms, "request finished"),
            }
        });

        Ok(response)
    }
}
