//! Per-route chain composition.
//!
//! Auth wraps the handler first, so it sits innermost and runs right before
//! it. Route middleware is then applied in reverse list order, which leaves
//! the first list entry outermost. For `[A, B, C]` with auth `M` a request
//! runs `A → B → C → M → handler`.

use tracing::debug;

use crate::error::Error;
use crate::handler::BoxedHandler;
use crate::middleware::{wrap, MiddlewareRegistry};
use crate::route::Route;

/// Builds the final handler for `method path`.
///
/// An auth name that resolves in neither registry table is
/// [`Error::MissingAuth`].
pub(crate) fn compose(
    path: &str,
    method: &str,
    route: &Route,
    registry: &MiddlewareRegistry,
) -> Result<BoxedHandler, Error> {
    let mut layers = Vec::with_capacity(route.middleware.len() + 1);

    if let Some(name) = route.auth_name() {
        let (auth, source) = registry.resolve(name).ok_or_else(|| Error::MissingAuth {
            name: name.to_owned(),
            method: method.to_owned(),
            path: path.to_owned(),
        })?;
        debug!(%path, %method, auth = name, ?source, "auth resolved");
        layers.push(auth);
    }
    layers.extend(route.middleware.iter().rev());

    Ok(wrap(route.handler.clone(), layers))
}
