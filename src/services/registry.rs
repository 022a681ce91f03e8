//! Reaction handler registry.
//!
//! Populated once at process start; the dispatcher resolves handlers by
//! reaction name per execution. A registry miss is deliberately lenient
//! (the execution succeeds with a note) so that partial deployments do
//! not block users.

use std::collections::HashMap;
use std::sync::Arc;

use crate::domain::ports::ReactionHandler;

#[derive(Default)]
pub struct HandlerRegistry {
    handlers: HashMap<&'static str, Arc<dyn ReactionHandler>>,
}

impl HandlerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a handler under its own name. Last registration wins.
    pub fn register(&mut self, handler: Arc<dyn ReactionHandler>) {
        let name = handler.name();
        if self.handlers.insert(name, handler).is_some() {
            tracing::warn!(reaction = name, "Replacing previously registered reaction handler");
        }
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn ReactionHandler>> {
        self.handlers.get(name).cloned()
    }

    pub fn names(&self) -> Vec<&'static str> {
        let mut names: Vec<_> = self.handlers.keys().copied().collect();
        names.sort_unstable();
        names
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}
