use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Initialise structured logging.
///
/// JSON lines on stdout; `RUST_LOG` overrides `default_filter`. Records emitted
/// through the `log` facade (`LoggerMiddleware`) are bridged into the same
/// subscriber.
pub fn init_telemetry(default_filter: &str) {
    if let Err(e) = try_init_telemetry(default_filter) {
        eprintln!("Telemetry already initialised: {}", e);
    }
}

/// Same as `init_telemetry` but reports a second initialisation instead of
/// printing it, so tests can call it freely.
pub fn try_init_telemetry(
    default_filter: &str,
) -> Result<(), tracing_subscriber::util::TryInitError> {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));

    let formatting_layer = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stdout)
        .json()
        .with_current_span(true);

    tracing_subscriber::registry()
        .with(env_filter)
        .with(formatting_layer)
        .try_init()
}
