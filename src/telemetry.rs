use tracing_subscriber::{EnvFilter, Registry, layer::SubscriberExt};

/// Initializes the global tracing subscriber for the service.
///
/// Applies an `EnvFilter` from `RUST_LOG` (defaulting to `info`) and a formatted
/// console layer. There is no OTLP collector in this deployment to export spans to,
/// so no OpenTelemetry exporter or `tracing-opentelemetry` bridge is wired in.
pub fn setup_tracing() -> Result<(), String> {
    let subscriber = Registry::default()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer());

    tracing::subscriber::set_global_default(subscriber)
        .map_err(|err| format!("failed to set tracing subscriber: {err:?}"))
}

/// Checks that `host:port` is free before binding a real listener against it, giving a
/// clearer error than the eventual `axum::serve` failure would.
pub fn check_port_availability(host: &str, port: u16) -> Result<std::net::TcpListener, String> {
    let addr = format!("{host}:{port}");
    std::net::TcpListener::bind(&addr)
        .inspect(|_| tracing::debug!(%addr, "port is available"))
        .map_err(|err| format!("port {port} already in use: {err}"))
}
