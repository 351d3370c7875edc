//! Tracing subscriber setup
//!
//! Both binaries call [`init_tracing`] once at startup. The filter comes from
//! `RUST_LOG` when set, otherwise from the binary's default directive.
//! Setting `LOG_FORMAT=json` switches to one JSON object per line.

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Output format for log lines
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    /// Human readable, colored when attached to a terminal
    Pretty,

    /// Newline-delimited JSON
    Json,
}

impl LogFormat {
    /// Parses the `LOG_FORMAT` value; anything other than `json` is pretty
    pub fn parse(value: Option<&str>) -> Self {
        match value.map(|v| v.trim().to_ascii_lowercase()) {
            Some(v) if v == "json" => LogFormat::Json,
            _ => LogFormat::Pretty,
        }
    }
}

/// Installs the global tracing subscriber
///
/// # Arguments
///
/// * `default_directive` - filter used when `RUST_LOG` is unset,
///   e.g. `"corpnet_api=debug,tower_http=debug"`
pub fn init_tracing(default_directive: &str) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directive));

    let format = LogFormat::parse(std::env::var("LOG_FORMAT").ok().as_deref());

    let registry = tracing_subscriber::registry().with(filter);
    let result = match format {
        LogFormat::Json => registry
            .with(tracing_subscriber::fmt::layer().json())
            .try_init(),
        LogFormat::Pretty => registry.with(tracing_subscriber::fmt::layer()).try_init(),
    };

    if let Err(e) = result {
        // Tests and embedded runtimes may have installed one already
        eprintln!("tracing subscriber already installed: {}", e);
    }
}
