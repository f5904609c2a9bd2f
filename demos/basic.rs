//! Minimal relaymux service: a user API with token auth, a timing middleware
//! and graceful shutdown.
//!
//! Run with:
//!   BACKEND_SERVER_PORT=3000 BACKEND_SERVER_URL_PREFIX=/api USE_INNER_CORS=true \
//!   USE_INNER_LOGGER=true RUST_LOG=info cargo run --example basic
//!
//! Try:
//!   curl -i http://localhost:3000/api/users/42
//!   curl -i -X POST http://localhost:3000/api/users -H 'authorization: Bearer x'
//!   curl -i -X POST http://localhost:3000/api/users          # 401
//!   curl -i http://localhost:3000/api/static/                 # ./ui/static/index.html

use std::collections::HashMap;
use std::time::Instant;

use http::{header, HeaderValue, StatusCode};
use relaymux::middleware::{Middleware, Next};
use relaymux::{Api, Request, Response, Route, RouteTable, Server, ServerConfig};
use tracing::error;

struct Users;

impl Api for Users {
    fn routes(&self) -> RouteTable {
        RouteTable::new()
            .on("GET",    "/users/{id}", Route::new(get_user).name("user"))
            .on("DELETE", "/users/{id}", Route::new(delete_user).auth("token"))
            .on("POST",   "/users",      Route::new(create_user).auth("token").middleware(timing()))
    }

    fn common_middleware(&self) -> Vec<Middleware> {
        vec![Middleware::from_fn(|req: Request, next: Next| async move {
            let mut res = next.run(req).await;
            res.headers_mut().insert("x-served-by", HeaderValue::from_static("relaymux"));
            res
        })]
    }

    fn auth_middleware(&self) -> HashMap<String, Middleware> {
        let token = Middleware::from_fn(|req: Request, next: Next| async move {
            match req.header("authorization") {
                Some(v) if v.starts_with("Bearer ") => next.run(req).await,
                _ => Response::status(StatusCode::UNAUTHORIZED),
            }
        });
        HashMap::from([("token".to_owned(), token)])
    }
}

fn timing() -> Middleware {
    Middleware::from_fn(|req: Request, next: Next| async move {
        let started = Instant::now();
        let mut res = next.run(req).await;
        if let Ok(v) = HeaderValue::from_str(&started.elapsed().as_micros().to_string()) {
            res.headers_mut().insert("x-elapsed-us", v);
        }
        res
    })
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt::init();

    let server = match Server::init(ServerConfig::from_env(), &Users) {
        Ok(server) => server,
        Err(e) => {
            error!("(exit) server init: {e}");
            std::process::exit(1);
        }
    };

    if let Err(e) = server.run_graceful().await {
        error!("(exit) server: {e}");
        std::process::exit(1);
    }
}

async fn get_user(req: Request) -> Response {
    let id = req.param("id").unwrap_or("unknown");
    Response::json(format!(r#"{{"id":"{id}","name":"alice"}}"#).into_bytes())
}

async fn create_user(_req: Request) -> Response {
    Response::builder()
        .status(StatusCode::CREATED)
        .header(header::LOCATION, HeaderValue::from_static("/api/users/99"))
        .json(br#"{"id":"99","name":"new_user"}"#.to_vec())
}

async fn delete_user(_req: Request) -> StatusCode {
    StatusCode::NO_CONTENT
}
