//! Middleware layer.
//!
//! A [`Middleware`] is a decorator: it takes a handler and returns a wrapped
//! handler with the same calling contract. Cross-cutting concerns (auth, CORS,
//! request logging) are all expressed this way and stacked with [`wrap`].
//!
//! ```rust
//! use relaymux::middleware::{Middleware, Next};
//! use relaymux::Request;
//!
//! let tag = Middleware::from_fn(|req: Request, next: Next| async move {
//!     let mut res = next.run(req).await;
//!     res.headers_mut().insert("x-served-by", "relaymux".parse().unwrap());
//!     res
//! });
//! # let _ = tag;
//! ```

use std::fmt;
use std::future::Future;
use std::sync::Arc;

use crate::handler::{BoxFuture, BoxedHandler, ErasedHandler};
use crate::request::Request;
use crate::response::{IntoResponse, Response};

pub mod cors;
pub mod logger;
mod registry;

pub use registry::{MiddlewareRegistry, Source};

type Decorator = dyn Fn(BoxedHandler) -> BoxedHandler + Send + Sync + 'static;

/// A handler decorator. Cheap to clone; the same value may wrap many routes.
#[derive(Clone)]
pub struct Middleware(Arc<Decorator>);

impl Middleware {
    /// Builds a middleware from a raw decorator over [`BoxedHandler`].
    pub fn new<F>(decorate: F) -> Self
    where
        F: Fn(BoxedHandler) -> BoxedHandler + Send + Sync + 'static,
    {
        Self(Arc::new(decorate))
    }

    /// Builds a middleware from an async function that receives the request
    /// and the rest of the chain. Not calling `next` short-circuits it.
    pub fn from_fn<F, Fut, R>(f: F) -> Self
    where
        F: Fn(Request, Next) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = R> + Send + 'static,
        R: IntoResponse + Send + 'static,
    {
        let f = Arc::new(f);
        Self::new(move |inner| {
            Arc::new(FromFn { f: Arc::clone(&f), inner }) as BoxedHandler
        })
    }

    /// Wraps `handler`, returning the decorated handler.
    pub fn apply(&self, handler: BoxedHandler) -> BoxedHandler {
        (self.0)(handler)
    }
}

impl fmt::Debug for Middleware {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Middleware")
    }
}

/// The remainder of a middleware chain.
pub struct Next(BoxedHandler);

impl Next {
    /// Passes the request to the next layer (or the route handler).
    pub async fn run(self, req: Request) -> Response {
        self.0.call(req).await
    }
}

struct FromFn<F> {
    f: Arc<F>,
    inner: BoxedHandler,
}

impl<F, Fut, R> ErasedHandler for FromFn<F>
where
    F: Fn(Request, Next) -> Fut + Send + Sync,
    Fut: Future<Output = R> + Send + 'static,
    R: IntoResponse + Send + 'static,
{
    fn call(&self, req: Request) -> BoxFuture {
        let fut = (self.f)(req, Next(Arc::clone(&self.inner)));
        Box::pin(async move { fut.await.into_response() })
    }
}

/// Folds `layers` over `handler` in application order: the first layer wraps
/// the handler directly (innermost), the last one ends up outermost and runs
/// first on a request.
pub fn wrap<'a, I>(handler: BoxedHandler, layers: I) -> BoxedHandler
where
    I: IntoIterator<Item = &'a Middleware>,
{
    layers.into_iter().fold(handler, |inner, layer| layer.apply(inner))
}
