//! HTTP server lifecycle and shutdown.
//!
//! ```text
//! Server::init ──► Initialized ──run──► Serving(addr) ──interrupt──► ShuttingDown ──► Stopped
//! ```
//!
//! The accept loop runs on a spawned task. On interrupt the single shutdown
//! call stops `accept()`, asks every open connection to finish its current
//! request and close, and waits for all of them. There is no deadline.
//!
//! Two ways to wait for it, selected with [`Server::wait_for_drain`]:
//!
//! - **fire-and-forget** (default): the caller issues the shutdown call, logs
//!   the outcome and returns without joining the accept task.
//! - **drain**: the signal is handled on its own task, which issues the
//!   shutdown call and then fires a completion marker whatever the outcome.
//!   The caller returns only once the accept task has ended *and* the marker
//!   has fired.
//!
//! A serve error other than [`Error::ServerClosed`] is returned at once in
//! both modes; it is fatal for the process.

use std::convert::Infallible;
use std::future::Future;
use std::io::ErrorKind;
use std::net::SocketAddr;
use std::sync::Arc;

use bytes::Bytes;
use http::StatusCode;
use http_body_util::{BodyExt, Full};
use hyper::body::Incoming;
use hyper::service::service_fn;
use hyper_util::rt::{TokioExecutor, TokioIo};
use hyper_util::server::conn::auto::Builder as ConnBuilder;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{oneshot, watch};
use tokio::task::JoinSet;
use tracing::{debug, error, info};

use crate::binder::App;
use crate::config::ServerConfig;
use crate::error::Error;
use crate::method::Method;
use crate::middleware::MiddlewareRegistry;
use crate::request::Request;
use crate::response::Response;
use crate::route::Api;

/// Where the server is in its lifecycle.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum State {
    Initialized,
    Serving(SocketAddr),
    ShuttingDown,
    Stopped,
}

struct Shared {
    stop: watch::Sender<bool>,
    state: watch::Sender<State>,
}

/// The HTTP server: the bound routing tree, its listen address and the
/// shutdown plumbing. Consumed by [`run`](Server::run); it cannot be
/// restarted.
pub struct Server {
    addr: SocketAddr,
    app: Arc<App>,
    wait_for_drain: bool,
    shared: Arc<Shared>,
    drained: watch::Sender<bool>,
}

impl Server {
    /// Builds the middleware registry, binds every route of `api` and resolves
    /// the listen address. Fails on any misconfiguration, before a socket is
    /// opened.
    pub fn init(config: ServerConfig, api: &dyn Api) -> Result<Self, Error> {
        let registry = MiddlewareRegistry::with_builtins(&config, api.auth_middleware())?;
        let app = App::bind(&config, api, &registry)?;
        let addr = config.socket_addr()?;

        let (stop, _) = watch::channel(false);
        let (state, _) = watch::channel(State::Initialized);
        let (drained, _) = watch::channel(false);

        info!(%addr, "server initialized");
        Ok(Self {
            addr,
            app: Arc::new(app),
            wait_for_drain: false,
            shared: Arc::new(Shared { stop, state }),
            drained,
        })
    }

    /// When `true`, [`run`](Server::run) returns only after serving has ended
    /// and the shutdown call has been acknowledged.
    pub fn wait_for_drain(mut self, wait: bool) -> Self {
        self.wait_for_drain = wait;
        self
    }

    pub fn addr(&self) -> SocketAddr { self.addr }
    pub fn app(&self) -> &App { &self.app }

    pub fn shutdown_handle(&self) -> ShutdownHandle {
        ShutdownHandle {
            shared: Arc::clone(&self.shared),
            drained: self.drained.subscribe(),
        }
    }

    /// Serves until Ctrl-C.
    pub async fn run(self) -> Result<(), Error> {
        self.run_until(interrupt()).await
    }

    /// Serves until Ctrl-C, then waits for the drain. Same as
    /// `wait_for_drain(true).run()`.
    pub async fn run_graceful(self) -> Result<(), Error> {
        self.wait_for_drain(true).run().await
    }

    /// Serves until `signal` resolves.
    pub async fn run_until<S>(self, signal: S) -> Result<(), Error>
    where
        S: Future<Output = ()> + Send + 'static,
    {
        let handle = self.shutdown_handle();
        info!(addr = %self.addr, wait_for_drain = self.wait_for_drain, "server starting");

        if !self.wait_for_drain {
            let mut serving = tokio::spawn(self.serve());
            tokio::select! {
                res = &mut serving => return closed(res?),
                () = signal => {}
            }
            shut_down(&handle).await;
            return Ok(());
        }

        let serving = tokio::spawn(self.serve());
        let (done_tx, done_rx) = oneshot::channel();
        tokio::spawn(async move {
            signal.await;
            shut_down(&handle).await;
            let _ = done_tx.send(());
        });

        closed(serving.await?)?;
        let _ = done_rx.await;
        Ok(())
    }

    async fn serve(self) -> Result<(), Error> {
        let Self { addr, app, shared, drained, .. } = self;

        let result = accept_loop(addr, app, &shared).await;
        if let Err(e) = &result {
            if !matches!(e, Error::ServerClosed) {
                error!("serve: {e}");
            }
        }

        shared.state.send_replace(State::Stopped);
        drained.send_replace(true);
        info!("server stopped");
        result
    }
}

/// Controls a running [`Server`] from elsewhere.
#[derive(Clone)]
pub struct ShutdownHandle {
    shared: Arc<Shared>,
    drained: watch::Receiver<bool>,
}

impl ShutdownHandle {
    /// Stops accepting, lets open connections finish and waits until all of
    /// them have. Only the first call does anything; later calls return
    /// [`Error::ServerClosed`].
    pub async fn shutdown(&self) -> Result<(), Error> {
        if self.shared.stop.send_replace(true) {
            return Err(Error::ServerClosed);
        }
        self.shared.state.send_if_modified(|state| {
            if *state == State::Stopped {
                return false;
            }
            *state = State::ShuttingDown;
            true
        });

        // An Err means the server was dropped or its task is gone: nothing to drain.
        let mut drained = self.drained.clone();
        let _ = drained.wait_for(|done| *done).await;
        Ok(())
    }

    pub fn state(&self) -> State {
        *self.shared.state.borrow()
    }

    /// Waits until the listener is bound and returns its address. `None` if
    /// the server stopped (or started shutting down) first.
    pub async fn serving(&self) -> Option<SocketAddr> {
        let mut state = self.shared.state.subscribe();
        let seen = *state.wait_for(|s| *s != State::Initialized).await.ok()?;
        match seen {
            State::Serving(addr) => Some(addr),
            _ => None,
        }
    }
}

// ── Accept loop ───────────────────────────────────────────────────────────────

async fn accept_loop(addr: SocketAddr, app: Arc<App>, shared: &Shared) -> Result<(), Error> {
    let listener = TcpListener::bind(addr).await?;
    let local = listener.local_addr()?;
    shared.state.send_if_modified(|state| {
        if *state != State::Initialized {
            return false;
        }
        *state = State::Serving(local);
        true
    });
    info!(addr = %local, "listening");

    let mut stop = shared.stop.subscribe();
    let mut tasks = JoinSet::new();

    loop {
        tokio::select! {
            biased;

            () = stopped(&mut stop) => {
                info!(in_flight = tasks.len(), "shutdown requested, draining connections");
                break;
            }

            res = listener.accept() => {
                let (stream, peer) = match res {
                    Ok(v) => v,
                    Err(e) => {
                        accept_failed(e)?;
                        continue;
                    }
                };
                tasks.spawn(connection(stream, peer, Arc::clone(&app), shared.stop.subscribe()));
            }

            Some(_) = tasks.join_next(), if !tasks.is_empty() => {}
        }
    }

    drop(listener);
    while tasks.join_next().await.is_some() {}
    Err(Error::ServerClosed)
}

async fn connection(
    stream: TcpStream,
    peer: SocketAddr,
    app: Arc<App>,
    mut stop: watch::Receiver<bool>,
) {
    let svc = service_fn(move |req| {
        let app = Arc::clone(&app);
        async move { Ok::<_, Infallible>(dispatch(&app, req).await) }
    });

    let builder = ConnBuilder::new(TokioExecutor::new());
    let conn = builder.serve_connection(TokioIo::new(stream), svc);
    tokio::pin!(conn);

    let res = tokio::select! {
        res = conn.as_mut() => res,
        () = stopped(&mut stop) => {
            conn.as_mut().graceful_shutdown();
            conn.as_mut().await
        }
    };
    if let Err(e) = res {
        debug!(%peer, "connection error: {e}");
    }
}

/// Converts at the transport boundary and routes the request.
async fn dispatch(app: &App, req: hyper::Request<Incoming>) -> http::Response<Full<Bytes>> {
    let (parts, body) = req.into_parts();
    let Some(method) = Method::from_http(&parts.method) else {
        return app.unroutable(parts.uri.path()).into_inner();
    };
    let body = match body.collect().await {
        Ok(collected) => collected.to_bytes(),
        Err(e) => {
            debug!("request body: {e}");
            return Response::status(StatusCode::BAD_REQUEST).into_inner();
        }
    };

    let req = Request::new(method, parts.uri, parts.headers, body);
    app.dispatch(req).await.into_inner()
}

// ── Shutdown ──────────────────────────────────────────────────────────────────

/// Shutdown-call failures are logged and otherwise ignored.
async fn shut_down(handle: &ShutdownHandle) {
    info!("shutdown by interrupt signal");
    if let Err(e) = handle.shutdown().await {
        info!("shutdown: {e}");
    }
}

/// A normal stop is not an error.
fn closed(result: Result<(), Error>) -> Result<(), Error> {
    match result {
        Ok(()) | Err(Error::ServerClosed) => Ok(()),
        Err(e) => Err(e),
    }
}

async fn stopped(stop: &mut watch::Receiver<bool>) {
    let _ = stop.wait_for(|stop| *stop).await;
}

/// Errors tied to a single connection attempt are skipped; anything else
/// (e.g. running out of file descriptors) ends serving.
fn accept_failed(e: std::io::Error) -> Result<(), Error> {
    match e.kind() {
        ErrorKind::ConnectionAborted
        | ErrorKind::ConnectionReset
        | ErrorKind::Interrupted
        | ErrorKind::WouldBlock => {
            debug!("accept: {e}");
            Ok(())
        }
        _ => Err(e.into()),
    }
}

/// Resolves on Ctrl-C (SIGINT). No other signal is handled.
async fn interrupt() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("failed to listen for interrupt: {e}");
        std::future::pending::<()>().await;
    }
}
