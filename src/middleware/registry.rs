//! Named middleware lookup.
//!
//! Routes refer to their auth wrapper by name. Names resolve against two
//! tables consulted in a fixed order: the shared built-ins first, then the
//! API's own auth set. A name present in both resolves to the shared entry;
//! the API set never overrides it.

use std::collections::HashMap;

use super::{cors, logger, Middleware};
use crate::config::ServerConfig;
use crate::error::Error;

/// Which table a name resolved from.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Source {
    Shared,
    Api,
}

/// The ordered pair of middleware tables.
#[derive(Clone, Debug, Default)]
pub struct MiddlewareRegistry {
    shared: HashMap<String, Middleware>,
    auth: HashMap<String, Middleware>,
}

impl MiddlewareRegistry {
    pub fn new(shared: HashMap<String, Middleware>, auth: HashMap<String, Middleware>) -> Self {
        Self { shared, auth }
    }

    /// The shared built-ins, configured from `config`, paired with the API's
    /// auth set.
    pub fn with_builtins(
        config: &ServerConfig,
        auth: HashMap<String, Middleware>,
    ) -> Result<Self, Error> {
        Ok(Self::new(builtins(config)?, auth))
    }

    /// Resolves `name`, shared table first.
    pub fn resolve(&self, name: &str) -> Option<(&Middleware, Source)> {
        self.shared
            .get(name)
            .map(|m| (m, Source::Shared))
            .or_else(|| self.auth.get(name).map(|m| (m, Source::Api)))
    }

    /// Looks `name` up in the shared table only.
    pub fn shared(&self, name: &str) -> Option<&Middleware> {
        self.shared.get(name)
    }
}

fn builtins(config: &ServerConfig) -> Result<HashMap<String, Middleware>, Error> {
    Ok(HashMap::from([
        (cors::INNER_CORS.to_owned(), cors::allow_origin(config.cors_origin()?)),
        (logger::INNER_LOGGER.to_owned(), logger::request_logger()),
    ]))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handler::BoxedHandler;

    fn named() -> Middleware {
        Middleware::new(|h: BoxedHandler| h)
    }

    #[test]
    fn shared_wins_over_api() {
        let reg = MiddlewareRegistry::new(
            HashMap::from([("jwt".to_owned(), named())]),
            HashMap::from([("jwt".to_owned(), named()), ("basic".to_owned(), named())]),
        );

        assert_eq!(reg.resolve("jwt").map(|(_, s)| s), Some(Source::Shared));
        assert_eq!(reg.resolve("basic").map(|(_, s)| s), Some(Source::Api));
        assert!(reg.resolve("nope").is_none());
    }

    #[test]
    fn builtins_are_shared() {
        let reg = MiddlewareRegistry::with_builtins(&ServerConfig::default(), HashMap::new()).unwrap();

        assert!(reg.shared(cors::INNER_CORS).is_some());
        assert!(reg.shared(logger::INNER_LOGGER).is_some());
        assert!(reg.shared("jwt").is_none());
    }
}
