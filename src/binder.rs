//! Binding the route table onto the path-matching engine.
//!
//! Every route is composed (see [`chain`](crate::chain)), then wrapped once
//! more with the scope middleware shared by all routes, outermost first:
//!
//! 1. `inner-cors` + method advertising, when `USE_INNER_CORS == "true"`
//! 2. `inner-logger`, when `USE_INNER_LOGGER == "true"`
//! 3. the API's common middleware, in the order supplied
//!
//! Routes are mounted under `BACKEND_SERVER_URL_PREFIX` unless it is `/`.
//! Binding is one-shot: there is no way to add or replace a route afterwards.

use std::collections::HashMap;
use std::sync::Arc;

use http::header::{self, HeaderValue};
use http::StatusCode;
use tracing::{debug, info};

use crate::chain::compose;
use crate::config::{self, ServerConfig};
use crate::error::Error;
use crate::files;
use crate::method::Method;
use crate::middleware::{cors, logger, wrap, Middleware, MiddlewareRegistry};
use crate::request::Request;
use crate::response::Response;
use crate::route::Api;
use crate::router::{Lookup, Router};

/// The bound routing tree.
pub struct App {
    router: Router,
    prefix: String,
    names: HashMap<String, (Method, String)>,
    advertise: bool,
}

impl App {
    /// Binds every route of `api` according to `config`. `registry` must
    /// carry the built-ins (see [`MiddlewareRegistry::with_builtins`]).
    pub(crate) fn bind(
        config: &ServerConfig,
        api: &dyn Api,
        registry: &MiddlewareRegistry,
    ) -> Result<Self, Error> {
        let prefix = mount_prefix(config.url_prefix());
        let scope = scope_layers(config, api, registry);
        let mut app = Self {
            router: Router::default(),
            prefix,
            names: HashMap::new(),
            advertise: config.flag(config::USE_INNER_CORS),
        };

        for (path, methods) in api.routes().iter() {
            for (method_name, route) in methods {
                let upper = method_name.to_ascii_uppercase();
                let method: Method = upper.parse().map_err(|()| Error::UnknownMethod {
                    method: method_name.clone(),
                    path: path.to_owned(),
                })?;
                let handler = compose(path, &upper, route, registry)?;
                let mounted = app.mounted(path);

                debug!(%method, path = %mounted, name = route.name.as_deref(), "route bound");
                app.router.insert(method, &mounted, wrap(handler, scope.iter().rev()))?;
                if let Some(name) = &route.name {
                    app.names.insert(name.clone(), (method, mounted));
                }
            }
        }

        let statics = wrap(files::handler(config.static_dir()), scope.iter().rev());
        for path in [files::MOUNT.to_owned(), format!("{}{{*{}}}", files::MOUNT, files::PARAM)] {
            let mounted = app.mounted(&path);
            app.router.insert(Method::Get, &mounted, Arc::clone(&statics))?;
            app.router.insert(Method::Head, &mounted, Arc::clone(&statics))?;
        }

        info!(
            routes = app.router.len(),
            prefix = %config.url_prefix(),
            cors = config.flag(config::USE_INNER_CORS),
            logger = config.flag(config::USE_INNER_LOGGER),
            "routes bound"
        );
        Ok(app)
    }

    /// The method and mounted path of the route registered under `name`.
    pub fn named(&self, name: &str) -> Option<(Method, &str)> {
        self.names.get(name).map(|(m, p)| (*m, p.as_str()))
    }

    /// Routes one request and produces one response.
    pub(crate) async fn dispatch(&self, mut req: Request) -> Response {
        match self.router.lookup(Some(req.method()), req.path()) {
            Lookup::Found { handler, params, allowed } => {
                req.params = params;
                req.allowed = allowed;
                handler.call(req).await
            }
            miss => self.unmatched(miss),
        }
    }

    /// Answers a request whose method no route can ever accept.
    pub(crate) fn unroutable(&self, path: &str) -> Response {
        self.unmatched(self.router.lookup(None, path))
    }

    fn mounted(&self, path: &str) -> String {
        format!("{}{}", self.prefix, path)
    }

    /// `405` lists the path's methods in `Allow` only while inner CORS is on.
    fn unmatched(&self, lookup: Lookup) -> Response {
        match lookup {
            Lookup::MethodNotAllowed(allowed) => {
                let mut res = Response::status(StatusCode::METHOD_NOT_ALLOWED);
                if !self.advertise {
                    return res;
                }
                if let Ok(value) = HeaderValue::from_str(&Method::join(&allowed)) {
                    res.headers_mut().insert(header::ALLOW, value);
                }
                res
            }
            _ => Response::status(StatusCode::NOT_FOUND),
        }
    }
}

/// `/` mounts at the root (empty prefix); anything else loses its trailing `/`.
fn mount_prefix(prefix: &str) -> String {
    if prefix == "/" {
        String::new()
    } else {
        prefix.trim_end_matches('/').to_owned()
    }
}

/// Scope middleware, outermost first.
fn scope_layers(config: &ServerConfig, api: &dyn Api, registry: &MiddlewareRegistry) -> Vec<Middleware> {
    let mut layers = Vec::new();
    if config.flag(config::USE_INNER_CORS) {
        layers.extend(registry.shared(cors::INNER_CORS).cloned());
        layers.push(cors::allow_methods());
    }
    if config.flag(config::USE_INNER_LOGGER) {
        layers.extend(registry.shared(logger::INNER_LOGGER).cloned());
    }
    layers.extend(api.common_middleware());
    layers
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::middleware::testing::{mark, Trace};
    use crate::route::{Route, RouteTable};

    #[derive(Default)]
    struct Fixture {
        routes: RouteTable,
        common: Vec<Middleware>,
        auth: HashMap<String, Middleware>,
    }

    impl Api for Fixture {
        fn routes(&self) -> RouteTable { self.routes.clone() }
        fn common_middleware(&self) -> Vec<Middleware> { self.common.clone() }
        fn auth_middleware(&self) -> HashMap<String, Middleware> { self.auth.clone() }
    }

    fn users(trace: &Trace) -> RouteTable {
        RouteTable::new()
            .on("GET", "/users", Route::new(|_req: Request| async { "list" }).name("users"))
            .on("POST", "/users", Route::new(|_req: Request| async { StatusCode::CREATED }))
            .on(
                "GET",
                "/users/{id}",
                Route::new(|req: Request| async move {
                    format!("user {}", req.param("id").unwrap_or("?"))
                })
                .middleware(mark(trace, "route")),
            )
    }

    fn config(pairs: &[(&'static str, &str)]) -> ServerConfig {
        pairs.iter().map(|&(k, v)| (k, v.to_owned())).collect()
    }

    fn bind(config: &ServerConfig, api: &Fixture) -> Result<App, Error> {
        let registry = MiddlewareRegistry::with_builtins(config, api.auth_middleware())?;
        App::bind(config, api, &registry)
    }

    async fn send(app: &App, method: Method, path: &str) -> Response {
        app.dispatch(Request::with_method(method, path)).await
    }

    #[tokio::test]
    async fn prefix_changes_only_the_visible_path() {
        let trace = Trace::default();
        let api = Fixture { routes: users(&trace), ..Fixture::default() };

        let root = bind(&config(&[]), &api).unwrap();
        let res = send(&root, Method::Get, "/users/7").await;
        assert_eq!(res.body(), b"user 7");
        assert_eq!(root.named("users"), Some((Method::Get, "/users")));

        let nested = bind(&config(&[(config::URL_PREFIX, "/api/")]), &api).unwrap();
        let res = send(&nested, Method::Get, "/api/users/7").await;
        assert_eq!(res.body(), b"user 7");
        assert_eq!(send(&nested, Method::Get, "/users/7").await.status_code(), StatusCode::NOT_FOUND);
        assert_eq!(nested.named("users"), Some((Method::Get, "/api/users")));

        assert_eq!(*trace.lock().unwrap(), ["route", "route"]);
    }

    #[tokio::test]
    async fn cors_headers_only_with_literal_true() {
        let api = Fixture { routes: users(&Trace::default()), ..Fixture::default() };

        let on = bind(&config(&[(config::USE_INNER_CORS, "true")]), &api).unwrap();
        let res = send(&on, Method::Post, "/users").await;
        assert_eq!(res.status_code(), StatusCode::CREATED);
        assert_eq!(res.header("access-control-allow-origin"), Some("*"));
        assert_eq!(res.header("allow"), Some("GET, POST"));
        assert_eq!(res.header("access-control-allow-methods"), Some("GET, POST"));

        for value in [None, Some("TRUE"), Some("1")] {
            let cfg = match value {
                Some(v) => config(&[(config::USE_INNER_CORS, v)]),
                None => config(&[]),
            };
            let off = bind(&cfg, &api).unwrap();
            let res = send(&off, Method::Get, "/users").await;
            assert_eq!(res.body(), b"list");
            assert!(res.header("access-control-allow-origin").is_none());
            assert!(res.header("allow").is_none());
        }
    }

    #[tokio::test]
    async fn common_middleware_wraps_route_chain_in_order() {
        let trace = Trace::default();
        let api = Fixture {
            routes: users(&trace),
            common: vec![mark(&trace, "first"), mark(&trace, "second")],
            ..Fixture::default()
        };
        let cfg = config(&[(config::USE_INNER_LOGGER, "true"), (config::USE_INNER_CORS, "true")]);
        let app = bind(&cfg, &api).unwrap();

        let res = send(&app, Method::Get, "/users/1").await;

        assert_eq!(res.header("allow"), Some("GET"));
        assert_eq!(*trace.lock().unwrap(), ["first", "second", "route"]);
    }

    #[tokio::test]
    async fn unregistered_method_is_405_with_allow_only_under_cors() {
        let api = Fixture { routes: users(&Trace::default()), ..Fixture::default() };

        let on = bind(&config(&[(config::USE_INNER_CORS, "true")]), &api).unwrap();
        let res = send(&on, Method::Delete, "/users").await;
        assert_eq!(res.status_code(), StatusCode::METHOD_NOT_ALLOWED);
        assert_eq!(res.header("allow"), Some("GET, POST"));

        let off = bind(&config(&[]), &api).unwrap();
        let res = send(&off, Method::Delete, "/users").await;
        assert_eq!(res.status_code(), StatusCode::METHOD_NOT_ALLOWED);
        assert!(res.header("allow").is_none());

        assert_eq!(off.unroutable("/users").status_code(), StatusCode::METHOD_NOT_ALLOWED);
        assert_eq!(off.unroutable("/teams").status_code(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn overlapping_patterns_advertise_every_matching_method() {
        let api = Fixture {
            routes: RouteTable::new()
                .on("GET", "/users/{id}", Route::new(|_req: Request| async { "user" }))
                .on("POST", "/users/new", Route::new(|_req: Request| async { StatusCode::CREATED })),
            ..Fixture::default()
        };
        let app = bind(&config(&[(config::USE_INNER_CORS, "true")]), &api).unwrap();

        let res = send(&app, Method::Get, "/users/new").await;
        assert_eq!(res.status_code(), StatusCode::OK);
        assert_eq!(res.body(), b"user");
        assert_eq!(res.header("allow"), Some("GET, POST"));

        let res = send(&app, Method::Put, "/users/new").await;
        assert_eq!(res.status_code(), StatusCode::METHOD_NOT_ALLOWED);
        assert_eq!(res.header("allow"), Some("GET, POST"));

        assert_eq!(send(&app, Method::Get, "/users/7").await.header("allow"), Some("GET"));
    }

    #[tokio::test]
    async fn table_methods_are_case_insensitive() {
        let api = Fixture {
            routes: RouteTable::new()
                .on("get", "/x", Route::new(|_req: Request| async { "x" }).name("x")),
            ..Fixture::default()
        };
        let app = bind(&config(&[]), &api).unwrap();

        assert_eq!(app.named("x"), Some((Method::Get, "/x")));
        assert_eq!(send(&app, Method::Get, "/x").await.body(), b"x");
    }

    #[test]
    fn bad_tables_fail_to_bind() {
        let api = Fixture {
            routes: RouteTable::new().on("FETCH", "/x", Route::new(|_req: Request| async { "x" })),
            ..Fixture::default()
        };
        assert!(matches!(bind(&config(&[]), &api), Err(Error::UnknownMethod { .. })));

        let api = Fixture {
            routes: RouteTable::new().on("GET", "/x", Route::new(|_req: Request| async { "x" }).auth("jwt")),
            ..Fixture::default()
        };
        assert!(matches!(bind(&config(&[]), &api), Err(Error::MissingAuth { .. })));
    }

    #[tokio::test]
    async fn static_files_are_served_under_the_prefix() {
        let dir = std::env::temp_dir().join(format!("relaymux-static-{}", std::process::id()));
        std::fs::create_dir_all(dir.join("css")).unwrap();
        std::fs::write(dir.join("css/site.css"), "body{}").unwrap();
        std::fs::write(dir.join("index.html"), "<h1>hi</h1>").unwrap();

        let api = Fixture::default();
        let cfg = config(&[
            (config::URL_PREFIX, "/api"),
            (config::STATIC_DIR, dir.to_str().unwrap()),
        ]);
        let app = bind(&cfg, &api).unwrap();

        let res = send(&app, Method::Get, "/api/static/css/site.css").await;
        assert_eq!(res.status_code(), StatusCode::OK);
        assert_eq!(res.header("content-type"), Some("text/css"));
        assert_eq!(res.body(), b"body{}");

        let res = send(&app, Method::Head, "/api/static/css/site.css").await;
        assert_eq!(res.status_code(), StatusCode::OK);
        assert!(res.body().is_empty());

        assert_eq!(send(&app, Method::Get, "/api/static/").await.body(), b"<h1>hi</h1>");
        assert_eq!(
            send(&app, Method::Get, "/api/static/missing.js").await.status_code(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            send(&app, Method::Get, "/api/static/../Cargo.toml").await.status_code(),
            StatusCode::BAD_REQUEST
        );

        std::fs::remove_dir_all(dir).unwrap();
    }
}
