//! Process-wide tracing setup.
//!
//! `RUST_LOG` selects levels (default `info` for this workspace) and
//! `LOG_FORMAT=json` switches to one JSON object per line. Records emitted
//! through the `log` facade by dependencies are forwarded into tracing.

use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::{fmt, EnvFilter, Registry};

const DEFAULT_FILTER: &str = "paperdigest=info,paperdigest_server=info,tower_http=info,warn";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Text,
    Json,
}

impl LogFormat {
    pub fn from_env() -> Self {
        match std::env::var("LOG_FORMAT") {
            Ok(value) if value.eq_ignore_ascii_case("json") => LogFormat::Json,
            _ => LogFormat::Text,
        }
    }
}

/// Installs the global subscriber. Returns false if one was already set.
pub fn init(format: LogFormat) -> bool {
    if tracing_log::LogTracer::init().is_err() {
        return false;
    }

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));
    let json = format == LogFormat::Json;

    let subscriber = Registry::default()
        .with(filter)
        .with(json.then(|| fmt::layer().json().with_current_span(true)))
        .with((!json).then(|| fmt::layer().with_target(true)));

    tracing::subscriber::set_global_default(subscriber).is_ok()
}
