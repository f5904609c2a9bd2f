//! Radix-tree path matching.
//!
//! One tree per HTTP method. A lookup asks every tree whether it matches the
//! path, so it can tell "no such path" (`404`) from "path exists, method not
//! registered" (`405`) and report every method the path accepts, even when a
//! static pattern in one tree overlaps a parameter pattern in another.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use matchit::Router as MatchitRouter;

use crate::error::Error;
use crate::handler::BoxedHandler;
use crate::method::Method;

pub(crate) enum Lookup {
    Found {
        handler: BoxedHandler,
        params: HashMap<String, String>,
        allowed: Arc<[Method]>,
    },
    MethodNotAllowed(Arc<[Method]>),
    NotFound,
}

/// The path-matching engine. Build it once at startup; it is read-only once
/// the server runs.
#[derive(Default)]
pub(crate) struct Router {
    routes: BTreeMap<Method, MatchitRouter<BoxedHandler>>,
    len: usize,
}

impl Router {
    /// Registers `handler` for `method path`.
    pub(crate) fn insert(
        &mut self,
        method: Method,
        path: &str,
        handler: BoxedHandler,
    ) -> Result<(), Error> {
        self.routes
            .entry(method)
            .or_default()
            .insert(path, handler)
            .map_err(|source| Error::Route { path: path.to_owned(), source })?;
        self.len += 1;
        Ok(())
    }

    pub(crate) fn lookup(&self, method: Option<Method>, path: &str) -> Lookup {
        let allowed: Arc<[Method]> = self
            .routes
            .iter()
            .filter(|(_, tree)| tree.at(path).is_ok())
            .map(|(m, _)| *m)
            .collect();
        if allowed.is_empty() {
            return Lookup::NotFound;
        }

        let found = method
            .and_then(|m| self.routes.get(&m))
            .and_then(|tree| tree.at(path).ok());
        match found {
            Some(matched) => Lookup::Found {
                handler: Arc::clone(matched.value),
                params: matched.params.iter()
                    .map(|(k, v)| (k.to_owned(), v.to_owned()))
                    .collect(),
                allowed,
            },
            None => Lookup::MethodNotAllowed(allowed),
        }
    }

    /// Number of registered `(method, path)` pairs.
    pub(crate) fn len(&self) -> usize {
        self.len
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handler::Handler;
    use crate::request::Request;
    use crate::response::Response;

    fn noop() -> BoxedHandler {
        (|_req: Request| async { Response::text("") }).into_boxed_handler()
    }

    fn router() -> Router {
        let mut router = Router::default();
        router.insert(Method::Get, "/users/{id}", noop()).unwrap();
        router.insert(Method::Delete, "/users/{id}", noop()).unwrap();
        router.insert(Method::Post, "/users", noop()).unwrap();
        router
    }

    #[test]
    fn found_carries_params_and_allowed_methods() {
        match router().lookup(Some(Method::Get), "/users/42") {
            Lookup::Found { params, allowed, .. } => {
                assert_eq!(params.get("id").map(String::as_str), Some("42"));
                assert_eq!(&*allowed, &[Method::Delete, Method::Get]);
            }
            _ => panic!("expected a match"),
        }
    }

    #[test]
    fn known_path_wrong_method_is_not_allowed() {
        assert!(matches!(
            router().lookup(Some(Method::Put), "/users/42"),
            Lookup::MethodNotAllowed(allowed) if &*allowed == [Method::Delete, Method::Get]
        ));
        assert!(matches!(router().lookup(None, "/users"), Lookup::MethodNotAllowed(_)));
    }

    #[test]
    fn unknown_path_is_not_found() {
        assert!(matches!(router().lookup(Some(Method::Get), "/teams"), Lookup::NotFound));
        assert_eq!(router().len(), 3);
    }

    #[test]
    fn conflicting_paths_are_rejected() {
        let mut router = router();
        let err = router.insert(Method::Get, "/users/{name}", noop()).unwrap_err();
        assert!(matches!(err, Error::Route { .. }));
    }

    #[test]
    fn overlapping_patterns_report_every_matching_method() {
        let mut router = router();
        router.insert(Method::Post, "/users/new", noop()).unwrap();

        match router.lookup(Some(Method::Get), "/users/new") {
            Lookup::Found { params, allowed, .. } => {
                assert_eq!(params.get("id").map(String::as_str), Some("new"));
                assert_eq!(&*allowed, &[Method::Delete, Method::Get, Method::Post]);
            }
            _ => panic!("expected a match"),
        }
        assert!(matches!(
            router.lookup(Some(Method::Put), "/users/new"),
            Lookup::MethodNotAllowed(allowed)
                if &*allowed == [Method::Delete, Method::Get, Method::Post]
        ));
        assert!(matches!(
            router.lookup(Some(Method::Post), "/users/7"),
            Lookup::MethodNotAllowed(allowed) if &*allowed == [Method::Delete, Method::Get]
        ));
    }
}
