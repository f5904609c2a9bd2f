//! Inner request logger, registered as `inner-logger`.

use std::time::Instant;

use tracing::info;

use super::{Middleware, Next};
use crate::request::Request;

/// Registry name of the request logger.
pub const INNER_LOGGER: &str = "inner-logger";

/// One `info` event per request: method, path, status and latency.
pub fn request_logger() -> Middleware {
    Middleware::from_fn(|req: Request, next: Next| async move {
        let method = req.method();
        let path = req.path().to_owned();
        let started = Instant::now();

        let res = next.run(req).await;

        info!(
            %method,
            %path,
            status = res.status_code().as_u16(),
            elapsed_us = started.elapsed().as_micros() as u64,
            "request"
        );
        res
    })
}
