use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use landmark_vectors::{api, config, logging, query};
use tokio::net::TcpListener;

#[tokio::main]
async fn main() {
    config::init_config();
    logging::init_tracing();

    let service = query::QueryService::from_env().expect("Failed to initialize query service");
    let shutting_down = Arc::new(AtomicBool::new(false));
    let request_timeout = {
        let config = config::get_config();
        config.embedding_timeout + config.vector_store_timeout
    };
    let app = api::create_router(api::ApiState {
        service: Arc::new(service),
        shutting_down: shutting_down.clone(),
        request_timeout,
    });

    let (listener, port) = bind_listener().await.expect("Failed to bind listener");
    tracing::info!("Listening on http://0.0.0.0:{}", port);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(shutting_down))
        .await
        .unwrap();
}

async fn shutdown_signal(shutting_down: Arc<AtomicBool>) {
    if tokio::signal::ctrl_c().await.is_ok() {
        tracing::info!("Shutdown signal received; draining");
        shutting_down.store(true, Ordering::SeqCst);
    }
}

async fn bind_listener() -> Result<(TcpListener, u16), std::io::Error> {
    use std::net::Ipv4Addr;

    let config = config::get_config();
    if let Some(port) = config.server_port {
        return TcpListener::bind((Ipv4Addr::UNSPECIFIED, port))
            .await
            .map(|listener| (listener, port));
    }

    const PORT_RANGE: std::ops::RangeInclusive<u16> = 8100..=8199;
    for port in PORT_RANGE {
        match TcpListener::bind((Ipv4Addr::UNSPECIFIED, port)).await {
            Ok(listener) => {
                tracing::debug!(port, "Bound server port");
                return Ok((listener, port));
            }
            Err(err) if err.kind() == std::io::ErrorKind::AddrInUse => {
                tracing::debug!(port, "Port already in use; trying next");
                continue;
            }
            Err(err) => return Err(err),
        }
    }

    Err(std::io::Error::new(
        std::io::ErrorKind::AddrNotAvailable,
        "No available port found in range 8100-8199",
    ))
}
