pub mod api;

use crate::cli::Args;
use crate::error::{ RelayError, Result };
use crate::relay::Relay;
use axum_server::Handle;
use log::{ info, warn };
use std::future::Future;
use std::net::SocketAddr;
use std::time::Duration;

/// Grace period for in-flight requests on the TLS listener once shutdown starts.
const TLS_SHUTDOWN_GRACE: Duration = Duration::from_secs(10);

pub struct Server {
    addr: String,
    relay: Relay,
    args: Args,
}

impl Server {
    pub fn new(addr: String, relay: Relay, args: Args) -> Self {
        Self { addr, relay, args }
    }

    pub async fn run(&self) -> Result<()> {
        let addr = self.addr
            .parse::<SocketAddr>()
            .map_err(|e| RelayError::Configuration(format!("Invalid server address '{}': {}", self.addr, e)))?;
        let app = api::router(self.relay.clone());

        if self.args.enable_tls {
            let (Some(cert_path), Some(key_path)) = (&self.args.tls_cert_path, &self.args.tls_key_path) else {
                return Err(
                    RelayError::Configuration(
                        "Both --tls-cert-path and --tls-key-path must be provided to enable TLS.".to_string()
                    )
                );
            };
            info!("TLS enabled. Loading certificate from '{}' and key from '{}'", cert_path, key_path);
            let tls_config = axum_server::tls_rustls::RustlsConfig::from_pem_file(cert_path, key_path).await?;

            let handle = Handle::new();
            shutdown_on(handle.clone(), shutdown_signal());

            info!("HTTPS server listening on: https://{}", addr);
            axum_server::bind_rustls(addr, tls_config)
                .handle(handle)
                .serve(app.into_make_service()).await?;
        } else {
            let listener = tokio::net::TcpListener::bind(addr).await.map_err(|e|
                RelayError::Serve(format!("Failed to bind HTTP server to {}: {}", addr, e))
            )?;
            info!("HTTP server listening on: http://{}", addr);
            axum::serve(listener, app.into_make_service())
                .with_graceful_shutdown(shutdown_signal()).await?;
        }

        Ok(())
    }
}

/// Starts a graceful shutdown of `handle`'s server once `signal` completes.
fn shutdown_on<F>(handle: Handle, signal: F) where F: Future<Output = ()> + Send + 'static {
    tokio::spawn(async move {
        signal.await;
        handle.graceful_shutdown(Some(TLS_SHUTDOWN_GRACE));
    });
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received, stopping server");
}
