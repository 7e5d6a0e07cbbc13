use tracing_subscriber::EnvFilter;

/// Level actually used when `RUST_LOG` is unset. `DEBUG=1` wins over the flag.
fn effective_level<'a>(log_level: &'a str, debug: Option<&str>) -> &'a str {
    match debug {
        Some("1") | Some("true") => "debug",
        _ => log_level,
    }
}

/// Initialize structured logging with tracing-subscriber.
///
/// Uses the `RUST_LOG` env var if set, otherwise falls back to the provided level.
/// Logs go to stderr so the run summary on stdout stays clean.
pub fn init(log_level: &str) {
    let debug = std::env::var("DEBUG").ok();
    let level = effective_level(log_level, debug.as_deref());
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}
