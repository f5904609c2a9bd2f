//! Route definitions and the API capability contract.

use std::collections::{BTreeMap, HashMap};

use crate::handler::{BoxedHandler, Handler};
use crate::middleware::Middleware;

/// One route: a handler plus the wrappers selected for it.
///
/// ```rust
/// use relaymux::{Request, Response, Route};
///
/// async fn me(_req: Request) -> Response { Response::text("me") }
///
/// let route = Route::new(me).auth("jwt").name("me");
/// # let _ = route;
/// ```
#[derive(Clone)]
pub struct Route {
    pub(crate) handler: BoxedHandler,
    pub(crate) auth: Option<String>,
    pub(crate) middleware: Vec<Middleware>,
    pub(crate) name: Option<String>,
}

impl Route {
    pub fn new(handler: impl Handler) -> Self {
        Self {
            handler: handler.into_boxed_handler(),
            auth: None,
            middleware: Vec::new(),
            name: None,
        }
    }

    /// Selects the auth wrapper by registry name. An empty name means none.
    pub fn auth(mut self, name: impl Into<String>) -> Self {
        self.auth = Some(name.into());
        self
    }

    /// Appends a route middleware. Middleware runs in the order it is added,
    /// before auth and the handler.
    pub fn middleware(mut self, middleware: Middleware) -> Self {
        self.middleware.push(middleware);
        self
    }

    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub(crate) fn auth_name(&self) -> Option<&str> {
        self.auth.as_deref().filter(|name| !name.is_empty())
    }
}

/// `path → method → Route`. Paths use `{param}` / `{*rest}` segments; methods
/// are uppercase strings and are checked when the table is bound.
#[derive(Clone, Default)]
pub struct RouteTable {
    routes: BTreeMap<String, BTreeMap<String, Route>>,
}

impl RouteTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds (or replaces) the route for `method` on `path`. Returns `self` for
    /// chaining.
    pub fn on(mut self, method: &str, path: &str, route: Route) -> Self {
        self.routes
            .entry(path.to_owned())
            .or_default()
            .insert(method.to_owned(), route);
        self
    }

    pub fn len(&self) -> usize {
        self.routes.values().map(BTreeMap::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }

    pub(crate) fn iter(&self) -> impl Iterator<Item = (&str, &BTreeMap<String, Route>)> {
        self.routes.iter().map(|(path, methods)| (path.as_str(), methods))
    }
}

/// What an application supplies to the server.
pub trait Api: Send + Sync {
    /// The route table.
    fn routes(&self) -> RouteTable;

    /// Middleware wrapping every route, outermost first.
    fn common_middleware(&self) -> Vec<Middleware> {
        Vec::new()
    }

    /// Auth wrappers by name, consulted after the shared built-ins.
    fn auth_middleware(&self) -> HashMap<String, Middleware> {
        HashMap::new()
    }
}
