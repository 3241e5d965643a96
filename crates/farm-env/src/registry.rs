//! Handler registry keyed by env-key prefix
//!
//! A key resolves to the handler registered under its longest matching
//! prefix. Handlers may claim several prefixes; an optional default
//! handler runs ahead of the matched ones for every command.

use crate::handler::EnvHandler;
use std::sync::Arc;

/// Ordered registry of environment handlers
#[derive(Debug, Default, Clone)]
pub struct HandlerRegistry {
    handlers: Vec<Arc<dyn EnvHandler>>,
    prefixes: Vec<(String, usize)>,
    default: Option<Arc<dyn EnvHandler>>,
}

impl HandlerRegistry {
    /// Create an empty registry
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `handler` under its own prefixes
    pub fn register(&mut self, handler: impl EnvHandler + 'static) -> &mut Self {
        let prefixes = handler.prefixes();
        self.register_shared(Arc::new(handler), prefixes)
    }

    /// Register a shared handler under explicit prefixes
    pub fn register_shared(&mut self, handler: Arc<dyn EnvHandler>, prefixes: Vec<String>) -> &mut Self {
        let index = self.handlers.len();
        tracing::debug!(handler = handler.name(), ?prefixes, "registering env handler");
        self.handlers.push(handler);
        for prefix in prefixes {
            // A later registration for the same prefix wins.
            self.prefixes.retain(|(p, _)| *p != prefix);
            self.prefixes.push((prefix, index));
        }
        self
    }

    /// With `handler` registered
    #[must_use]
    pub fn with(mut self, handler: impl EnvHandler + 'static) -> Self {
        self.register(handler);
        self
    }

    /// Handler applied to every command before the matched ones
    #[must_use]
    pub fn with_default(mut self, handler: impl EnvHandler + 'static) -> Self {
        self.default = Some(Arc::new(handler));
        self
    }

    /// Index of the handler for `key`, by longest prefix
    #[must_use]
    pub fn resolve(&self, key: &str) -> Option<usize> {
        self.prefixes
            .iter()
            .filter(|(prefix, _)| key.starts_with(prefix.as_str()))
            .max_by_key(|(prefix, _)| prefix.len())
            .map(|(_, index)| *index)
    }

    /// Handler at `index`
    #[inline]
    #[must_use]
    pub fn handler(&self, index: usize) -> Option<&Arc<dyn EnvHandler>> {
        self.handlers.get(index)
    }

    /// The default handler, if any
    #[inline]
    #[must_use]
    pub fn default_handler(&self) -> Option<&Arc<dyn EnvHandler>> {
        self.default.as_ref()
    }

    /// Registered handler names, in registration order
    #[must_use]
    pub fn names(&self) -> Vec<&str> {
        self.handlers.iter().map(|h| h.name()).collect()
    }

    /// Number of registered handlers
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    /// Check if no handler is registered
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handlers::{MayaHandler, NukeHandler, ProjectHandler};

    #[test]
    fn longest_prefix_wins() {
        let mut registry = HandlerRegistry::new();
        registry.register(NukeHandler::default());
        registry.register_shared(Arc::new(MayaHandler::default()), vec!["nuke9".into()]);

        assert_eq!(registry.resolve("nuke10.5"), Some(0));
        assert_eq!(registry.resolve("nuke9.0v8"), Some(1));
        assert_eq!(registry.resolve("houdini"), None);
    }

    #[test]
    fn one_handler_many_prefixes() {
        let registry = HandlerRegistry::new().with(ProjectHandler::default());
        assert_eq!(registry.len(), 1);
        for key in ["TYPE=user_work", "SHOW=yr3", "PROJECT=shot", "PROJ=shot", "SCENE=a.ma", "SCENENAME=a"] {
            assert_eq!(registry.resolve(key), Some(0), "{key}");
        }
    }

    #[test]
    fn later_prefix_registration_wins() {
        let mut registry = HandlerRegistry::new();
        registry.register(MayaHandler::default());
        registry.register_shared(Arc::new(NukeHandler::default()), vec!["maya".into()]);
        assert_eq!(registry.resolve("maya2016"), Some(1));
        assert_eq!(registry.names(), vec!["maya", "nuke"]);
    }
}
