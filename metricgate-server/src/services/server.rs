use std::future::Future;
use std::io;
use std::net::{SocketAddr, TcpListener};
use std::sync::Arc;

use axum::Router;
use axum::http::{HeaderValue, header};
use axum_server::Handle;
use metricgate_config::Config;
use metricgate_statsd::metric;
use tokio::net::TcpSocket;
use tower::ServiceBuilder;
use tower_http::set_header::SetResponseHeaderLayer;

use crate::constants;
use crate::endpoints;
use crate::middlewares::{self, CatchPanicLayer};
use crate::service::ServiceState;
use crate::statsd::ServerCounters;

/// Maximum number of pending connections on the listening socket.
const LISTEN_BACKLOG: u32 = 1024;

/// Indicates the type of failure of the server.
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    /// Binding failed.
    #[error("bind to interface failed")]
    BindFailed(#[source] io::Error),

    /// Accepting or serving connections failed.
    #[error("failed to serve requests")]
    Serve(#[source] io::Error),
}

/// Build the axum application with all routes and middleware.
pub fn make_app(service: ServiceState) -> Router {
    // Layers added first are called first for requests and last for responses.
    let middleware = ServiceBuilder::new()
        .layer(CatchPanicLayer::custom(middlewares::handle_panic))
        .layer(SetResponseHeaderLayer::overriding(
            header::SERVER,
            HeaderValue::from_static(constants::SERVER),
        ))
        .layer(middlewares::trace_http_layer());

    endpoints::routes(service.config())
        .layer(middleware)
        .with_state(service)
}

fn listen(addr: SocketAddr) -> io::Result<TcpListener> {
    let socket = match addr {
        SocketAddr::V4(_) => TcpSocket::new_v4(),
        SocketAddr::V6(_) => TcpSocket::new_v6(),
    }?;

    socket.set_reuseaddr(true)?;
    socket.bind(addr)?;
    Ok(socket.listen(LISTEN_BACKLOG)?.into_std()?)
}

/// Resolves once the process receives `SIGINT` or `SIGTERM`.
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(error) = tokio::signal::ctrl_c().await {
            metricgate_log::error!("failed to listen for ctrl-c: {error}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{SignalKind, signal};

        match signal(SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(error) => {
                metricgate_log::error!("failed to listen for SIGTERM: {error}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => metricgate_log::info!("received SIGINT"),
        _ = terminate => metricgate_log::info!("received SIGTERM"),
    }
}

/// The HTTP server of the gateway.
///
/// Hosts all ingestion and internal endpoints. In-flight requests are drained on shutdown for at
/// most `limits.shutdown_timeout`.
pub struct HttpServer {
    config: Arc<Config>,
    service: ServiceState,
    listener: TcpListener,
}

impl HttpServer {
    /// Binds the configured listen address.
    pub fn new(config: Arc<Config>, service: ServiceState) -> Result<Self, ServerError> {
        let listener = listen(config.listen_addr()).map_err(ServerError::BindFailed)?;

        Ok(Self {
            config,
            service,
            listener,
        })
    }

    /// Returns the address the server is bound to.
    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Serves requests until `shutdown` resolves and in-flight requests have drained.
    pub async fn run<F>(self, shutdown: F) -> Result<(), ServerError>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let Self {
            config,
            service,
            listener,
        } = self;

        let addr = listener.local_addr().map_err(ServerError::BindFailed)?;
        let handle = Handle::new();
        let server = axum_server::from_tcp(listener).handle(handle.clone());
        let app = make_app(service.clone());

        let timeout = config.shutdown_timeout();
        tokio::spawn(async move {
            shutdown.await;
            metricgate_log::info!("shutting down HTTP server");
            service.start_shutdown();
            handle.graceful_shutdown(Some(timeout));
        });

        metricgate_log::info!("gateway listening on http://{addr}/");
        metric!(counter(ServerCounters::ServerStarting) += 1);

        server
            .serve(app.into_make_service())
            .await
            .map_err(ServerError::Serve)?;
        metricgate_log::info!("HTTP server stopped");
        Ok(())
    }
}
