use std::net::TcpListener;
use token_rotation::configuration::get_configuration;
use token_rotation::startup::{build_session_store, default_token_generator, run, validate_settings};
use token_rotation::telemetry::init_telemetry;

#[tokio::main]
async fn main() -> std::io::Result<()> {
    init_telemetry("info");

    tracing::info!("Starting application");

    let configuration = match get_configuration() {
        Ok(config) => config,
        Err(e) => {
            tracing::error!("Failed to read configuration: {}", e);
            return Err(std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                "Configuration error",
            ));
        }
    };

    if let Err(e) = validate_settings(&configuration) {
        tracing::error!(error = %e, "Invalid configuration");
        return Err(std::io::Error::new(
            std::io::ErrorKind::InvalidInput,
            "Configuration error",
        ));
    }

    let store = build_session_store(&configuration).await.map_err(|e| {
        tracing::error!(error = %e, "Failed to set up session store");
        std::io::Error::new(std::io::ErrorKind::ConnectionRefused, "Session store error")
    })?;
    let generator = default_token_generator(&configuration.rotation);

    let address = format!(
        "{}:{}",
        configuration.application.host, configuration.application.port
    );
    let listener = TcpListener::bind(&address)?;
    tracing::info!("Server listening on: {}", address);

    run(listener, store, generator, configuration.rotation)?.await
}
