//! # relaymux
//!
//! A configuration-driven HTTP router. You describe the service as a table of
//! paths, methods, handlers and named middleware; relaymux composes one
//! request pipeline per route, mounts everything on a radix tree and serves
//! it until Ctrl-C.
//!
//! - Per-route chains: route middleware in list order, then auth, then the
//!   handler. Auth is picked by name from the shared built-ins or the API's
//!   own set.
//! - Scope middleware from configuration: inner CORS, an inner request
//!   logger, and the API's common middleware around every route.
//! - Radix-tree routing via [`matchit`], HTTP/1.1 and HTTP/2 via hyper.
//! - Shutdown on interrupt, either fire-and-forget or waiting for the drain.
//!
//! ## Quick start
//!
//! ```rust,no_run
//! use std::collections::HashMap;
//!
//! use relaymux::middleware::{Middleware, Next};
//! use relaymux::{Api, Request, Response, Route, RouteTable, Server, ServerConfig};
//! use http::StatusCode;
//!
//! struct Users;
//!
//! impl Api for Users {
//!     fn routes(&self) -> RouteTable {
//!         RouteTable::new()
//!             .on("GET",  "/users/{id}", Route::new(get_user).name("user"))
//!             .on("POST", "/users",      Route::new(create_user).auth("token"))
//!     }
//!
//!     fn auth_middleware(&self) -> HashMap<String, Middleware> {
//!         let token = Middleware::from_fn(|req: Request, next: Next| async move {
//!             match req.header("authorization") {
//!                 Some(_) => next.run(req).await,
//!                 None => Response::status(StatusCode::UNAUTHORIZED),
//!             }
//!         });
//!         HashMap::from([("token".to_owned(), token)])
//!     }
//! }
//!
//! async fn get_user(req: Request) -> Response {
//!     let id = req.param("id").unwrap_or("unknown");
//!     Response::json(format!(r#"{{"id":"{id}"}}"#).into_bytes())
//! }
//!
//! async fn create_user(_req: Request) -> StatusCode {
//!     StatusCode::CREATED
//! }
//!
//! #[tokio::main]
//! async fn main() -> Result<(), relaymux::Error> {
//!     Server::init(ServerConfig::from_env(), &Users)?
//!         .run_graceful()
//!         .await
//! }
//! ```

mod binder;
mod chain;
mod error;
mod files;
mod handler;
mod method;
mod request;
mod response;
mod route;
mod router;
mod server;

pub mod config;
pub mod middleware;

pub use binder::App;
pub use config::ServerConfig;
pub use error::Error;
pub use handler::{BoxedHandler, Handler};
pub use method::Method;
pub use request::Request;
pub use response::{ContentType, IntoResponse, Response, ResponseBuilder};
pub use route::{Api, Route, RouteTable};
pub use server::{Server, ShutdownHandle, State};
