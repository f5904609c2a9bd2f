//! Inner CORS support.
//!
//! Two layers, installed together at scope level when `USE_INNER_CORS` is
//! `"true"`:
//!
//! - [`allow_origin`] (registered as `inner-cors`) stamps the origin and
//!   header allowances on every response.
//! - [`allow_methods`] advertises the methods registered for the matched path
//!   in `Allow` and `Access-Control-Allow-Methods`, and answers `OPTIONS`
//!   preflights itself.

use http::header::{self, HeaderValue};
use http::StatusCode;

use super::{Middleware, Next};
use crate::method::Method;
use crate::request::Request;
use crate::response::Response;

/// Registry name of the origin-allowance middleware.
pub const INNER_CORS: &str = "inner-cors";

const ALLOWED_HEADERS: &str = "Accept, Authorization, Content-Type, X-Requested-With";

/// Adds `Access-Control-Allow-Origin: <origin>` and the allowed request
/// headers to every response.
pub fn allow_origin(origin: HeaderValue) -> Middleware {
    Middleware::from_fn(move |req: Request, next: Next| {
        let origin = origin.clone();
        async move {
            let mut res = next.run(req).await;
            let headers = res.headers_mut();
            headers.insert(header::ACCESS_CONTROL_ALLOW_ORIGIN, origin);
            headers.insert(
                header::ACCESS_CONTROL_ALLOW_HEADERS,
                HeaderValue::from_static(ALLOWED_HEADERS),
            );
            res
        }
    })
}

/// Advertises the path's registered methods. An `OPTIONS` request is answered
/// with `204 No Content` without reaching the route handler.
pub fn allow_methods() -> Middleware {
    Middleware::from_fn(|req: Request, next: Next| async move {
        let allowed = advertised(req.allowed_methods());
        let mut res = if req.method() == Method::Options {
            Response::status(StatusCode::NO_CONTENT)
        } else {
            next.run(req).await
        };
        if let Some(value) = allowed {
            let headers = res.headers_mut();
            headers.insert(header::ALLOW, value.clone());
            headers.insert(header::ACCESS_CONTROL_ALLOW_METHODS, value);
        }
        res
    })
}

fn advertised(methods: &[Method]) -> Option<HeaderValue> {
    if methods.is_empty() {
        return None;
    }
    HeaderValue::from_str(&Method::join(methods)).ok()
}
