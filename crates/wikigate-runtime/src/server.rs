//! HTTP server implementation

use crate::handler::{Dispatcher, RequestHandler};
use crate::shutdown::ShutdownSignal;
use crate::RuntimeState;
use hyper::body::Incoming;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper_util::rt::{TokioIo, TokioTimer};
use hyper_util::server::graceful::GracefulShutdown;
use parking_lot::{Mutex, RwLock};
use std::convert::Infallible;
use std::fmt;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tokio::net::TcpListener;
use wikigate_config::Config;
use wikigate_core::{body, ClientAddr, Error, Result};
use wikigate_middleware::MiddlewareBuilder;
use wikigate_proxy::HttpClient;
use wikigate_router::Router;

/// HTTP server
///
/// Lifecycle: `Starting → Serving → ShuttingDown → Stopped`. [`Server::bind`]
/// may be called ahead of [`Server::run`] to learn the actual address when
/// listening on port 0.
pub struct Server {
    config: Config,
    handler: RequestHandler,
    state: Arc<RwLock<RuntimeState>>,
    shutdown: ShutdownSignal,
    listener: Mutex<Option<TcpListener>>,
    local_addr: RwLock<Option<SocketAddr>>,
    connections: Arc<AtomicUsize>,
}

impl fmt::Debug for Server {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Server")
            .field("listen", &self.config.gateway.listen)
            .field("local_addr", &*self.local_addr.read())
            .field("state", &*self.state.read())
            .field("in_flight", &self.in_flight())
            .field("connections", &self.open_connections())
            .finish()
    }
}

impl Server {
    /// Create a new server builder
    pub fn builder() -> ServerBuilder {
        ServerBuilder::new()
    }

    /// Get the current state
    pub fn state(&self) -> RuntimeState {
        *self.state.read()
    }

    /// Configured listen address
    pub fn listen_addr(&self) -> SocketAddr {
        self.config.gateway.listen
    }

    /// Address actually bound, once [`Server::bind`] or [`Server::run`] has
    /// opened the listener
    pub fn local_addr(&self) -> Option<SocketAddr> {
        *self.local_addr.read()
    }

    /// Get router
    pub fn router(&self) -> &Router {
        self.handler.dispatcher().router()
    }

    /// Requests currently being handled
    pub fn in_flight(&self) -> usize {
        self.handler.in_flight().count()
    }

    /// Client connections currently open
    pub fn open_connections(&self) -> usize {
        self.connections.load(Ordering::SeqCst)
    }

    /// Get shutdown signal
    pub fn shutdown_signal(&self) -> ShutdownSignal {
        self.shutdown.clone()
    }

    /// Bind the listen address without accepting yet
    ///
    /// Idempotent: a second call returns the address already bound.
    pub async fn bind(&self) -> Result<SocketAddr> {
        if let Some(addr) = self.local_addr() {
            return Ok(addr);
        }

        let listen = self.listen_addr();
        let listener = TcpListener::bind(listen)
            .await
            .map_err(|e| Error::Runtime(format!("Failed to bind to {listen}: {e}")))?;
        let addr = listener.local_addr()?;

        *self.listener.lock() = Some(listener);
        *self.local_addr.write() = Some(addr);

        tracing::debug!(listen = %addr, "Listener bound");
        Ok(addr)
    }

    /// Run the server until shutdown is triggered and connections drain
    pub async fn run(&self) -> Result<()> {
        if self.state() != RuntimeState::Starting {
            return Err(Error::Runtime("Server has already been started".to_string()));
        }

        // Take the listener before any await so no lock guard is held across it.
        let bound = self.listener.lock().take();
        let listener = match bound {
            Some(listener) => listener,
            None => {
                self.bind().await?;
                self.listener
                    .lock()
                    .take()
                    .ok_or_else(|| Error::Runtime("Listener not available".to_string()))?
            }
        };
        let local_addr = listener.local_addr()?;

        self.set_state(RuntimeState::Serving);
        tracing::info!(
            listen = %local_addr,
            routes = self.router().len(),
            "Gateway serving"
        );

        let graceful = GracefulShutdown::new();
        let mut http = http1::Builder::new();
        http.timer(TokioTimer::new());

        loop {
            tokio::select! {
                result = listener.accept() => {
                    let (stream, remote) = match result {
                        Ok(accepted) => accepted,
                        Err(e) => {
                            tracing::warn!(error = %e, "Failed to accept connection");
                            continue;
                        }
                    };
                    tracing::trace!(remote = %remote, "Accepted connection");

                    let handler = self.handler.clone();
                    let service = service_fn(move |mut req: hyper::Request<Incoming>| {
                        let handler = handler.clone();
                        async move {
                            req.extensions_mut().insert(ClientAddr(remote));
                            let req = req.map(body::boxed);
                            Ok::<_, Infallible>(handler.handle(req).await)
                        }
                    });

                    let conn = graceful.watch(http.serve_connection(TokioIo::new(stream), service));
                    let connections = Arc::clone(&self.connections);
                    connections.fetch_add(1, Ordering::SeqCst);

                    tokio::spawn(async move {
                        if let Err(e) = conn.await {
                            tracing::debug!(remote = %remote, error = %e, "Connection closed with error");
                        }
                        connections.fetch_sub(1, Ordering::SeqCst);
                    });
                }

                _ = self.shutdown.triggered() => {
                    tracing::info!("Shutdown signal received, no longer accepting connections");
                    break;
                }
            }
        }

        drop(listener);
        self.set_state(RuntimeState::ShuttingDown);

        let shutdown_timeout = self.config.gateway.shutdown_timeout;
        let start = Instant::now();
        tracing::info!(
            timeout_ms = shutdown_timeout.as_millis() as u64,
            in_flight = self.in_flight(),
            connections = self.open_connections(),
            "Waiting for in-flight requests to complete"
        );

        tokio::select! {
            _ = graceful.shutdown() => {
                tracing::info!(
                    elapsed_ms = start.elapsed().as_millis() as u64,
                    "All connections drained"
                );
            }
            _ = tokio::time::sleep(shutdown_timeout) => {
                tracing::warn!(
                    in_flight = self.in_flight(),
                    connections = self.open_connections(),
                    timeout_ms = shutdown_timeout.as_millis() as u64,
                    "Shutdown timeout reached with requests still in flight"
                );
            }
        }

        self.set_state(RuntimeState::Stopped);
        tracing::info!(
            shutdown_duration_ms = start.elapsed().as_millis() as u64,
            "Server stopped"
        );

        Ok(())
    }

    fn set_state(&self, state: RuntimeState) {
        *self.state.write() = state;
    }
}

/// Server builder
#[derive(Debug, Default)]
pub struct ServerBuilder {
    config: Option<Config>,
    http_client: Option<HttpClient>,
    middleware: Option<MiddlewareBuilder>,
    shutdown: Option<ShutdownSignal>,
}

impl ServerBuilder {
    /// Create a new server builder
    pub fn new() -> Self {
        Self::default()
    }

    /// Set configuration
    #[must_use]
    pub fn config(mut self, config: Config) -> Self {
        self.config = Some(config);
        self
    }

    /// Use a specific upstream client instead of one derived from
    /// `gateway.request_timeout`
    #[must_use]
    pub fn http_client(mut self, client: HttpClient) -> Self {
        self.http_client = Some(client);
        self
    }

    /// Use a specific middleware chain instead of the standard one
    #[must_use]
    pub fn middleware(mut self, middleware: MiddlewareBuilder) -> Self {
        self.middleware = Some(middleware);
        self
    }

    /// Share an existing shutdown signal with the server
    #[must_use]
    pub fn shutdown_signal(mut self, signal: ShutdownSignal) -> Self {
        self.shutdown = Some(signal);
        self
    }

    /// Build the server
    pub fn build(self) -> Result<Server> {
        let config = self
            .config
            .ok_or_else(|| Error::Config("Configuration is required".to_string()))?;

        let router = Router::from_config(&config)?;
        let client = self
            .http_client
            .unwrap_or_else(|| HttpClient::with_timeout(config.gateway.request_timeout));
        let dispatcher = Dispatcher::new(router, client)?;

        let middleware = match self.middleware {
            Some(middleware) => middleware,
            None => MiddlewareBuilder::from_config(&config)?,
        };
        tracing::debug!(middleware = middleware.len(), "Middleware chain built");

        Ok(Server {
            handler: RequestHandler::new(dispatcher, middleware.build()),
            state: Arc::new(RwLock::new(RuntimeState::Starting)),
            shutdown: self.shutdown.unwrap_or_default(),
            listener: Mutex::new(None),
            local_addr: RwLock::new(None),
            connections: Arc::new(AtomicUsize::new(0)),
            config,
        })
    }
}
