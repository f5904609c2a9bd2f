//! Incoming HTTP request type.

use std::collections::HashMap;
use std::sync::Arc;

use bytes::Bytes;
use http::{Extensions, HeaderMap, Uri};

use crate::method::Method;

/// An incoming HTTP request with its body already collected.
///
/// Middleware may add headers or attach typed values through
/// [`extensions_mut`](Request::extensions_mut) before passing the request on;
/// an auth wrapper, for instance, can store the resolved principal there.
pub struct Request {
    pub(crate) method: Method,
    pub(crate) uri: Uri,
    pub(crate) headers: HeaderMap,
    pub(crate) body: Bytes,
    pub(crate) params: HashMap<String, String>,
    pub(crate) allowed: Arc<[Method]>,
    pub(crate) extensions: Extensions,
}

impl Request {
    pub(crate) fn new(
        method: Method,
        uri: Uri,
        headers: HeaderMap,
        body: Bytes,
    ) -> Self {
        Self {
            method,
            uri,
            headers,
            body,
            params: HashMap::new(),
            allowed: Arc::from(Vec::new()),
            extensions: Extensions::new(),
        }
    }

    pub fn method(&self) -> Method { self.method }
    pub fn uri(&self) -> &Uri { &self.uri }
    pub fn path(&self) -> &str { self.uri.path() }
    pub fn query(&self) -> Option<&str> { self.uri.query() }
    pub fn headers(&self) -> &HeaderMap { &self.headers }
    pub fn headers_mut(&mut self) -> &mut HeaderMap { &mut self.headers }
    pub fn body(&self) -> &[u8] { &self.body }
    pub fn extensions(&self) -> &Extensions { &self.extensions }
    pub fn extensions_mut(&mut self) -> &mut Extensions { &mut self.extensions }

    /// Header lookup. Returns `None` for missing or non-UTF-8 values.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    /// Returns a named path parameter.
    ///
    /// For a route `/users/{id}`, `req.param("id")` on `/users/42` returns `Some("42")`.
    pub fn param(&self, key: &str) -> Option<&str> {
        self.params.get(key).map(String::as_str)
    }

    /// Every method registered for the path this request matched, in
    /// registration order.
    pub fn allowed_methods(&self) -> &[Method] {
        &self.allowed
    }

    #[cfg(test)]
    pub(crate) fn get(path: &str) -> Self {
        Self::with_method(Method::Get, path)
    }

    #[cfg(test)]
    pub(crate) fn with_method(method: Method, path: &str) -> Self {
        let uri = path.parse().unwrap_or_else(|e| panic!("bad test uri `{path}`: {e}"));
        Self::new(method, uri, HeaderMap::new(), Bytes::new())
    }
}
