//! URL handler trait and routing registry.

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use frontier_core::{QueueEntry, ResultRecord};

/// What a handler decided for a claimed entry.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    /// Processing finished; the record is stored and the entry completed.
    Processed(ResultRecord),
    /// The entry fails acceptance criteria; it is kept and never claimed again.
    Rejected,
    /// Processing was abandoned; the entry goes back to the queue.
    Aborted,
}

/// Result type for URL handlers. An `Err` releases the entry.
pub type HandlerResult = Result<Outcome, String>;

/// Future type for async URL handlers.
pub type HandlerFuture = Pin<Box<dyn Future<Output = HandlerResult> + Send>>;

/// Trait for URL handlers.
///
/// Implement this trait to define how claimed entries are processed.
pub trait UrlHandler: Send + Sync + 'static {
    /// Process an entry and decide its outcome.
    fn handle(&self, entry: &QueueEntry) -> HandlerFuture;
}

/// Registry for URL handlers.
///
/// Maps routing keys to handlers; entries with an unknown or empty
/// routing key go to the fallback handler.
pub struct HandlerRegistry {
    routes: HashMap<String, Arc<dyn UrlHandler>>,
    fallback: Arc<dyn UrlHandler>,
}

impl HandlerRegistry {
    /// Create a registry with the handler used when no route matches.
    pub fn new<H: UrlHandler>(fallback: H) -> Self {
        Self {
            routes: HashMap::new(),
            fallback: Arc::new(fallback),
        }
    }

    /// Register a handler for a routing key.
    pub fn route<H: UrlHandler>(&mut self, routing_key: impl Into<String>, handler: H) {
        self.routes.insert(routing_key.into(), Arc::new(handler));
    }

    /// Get the handler for a routing key.
    pub fn resolve(&self, routing_key: &str) -> Arc<dyn UrlHandler> {
        self.routes
            .get(routing_key)
            .cloned()
            .unwrap_or_else(|| self.fallback.clone())
    }

    /// Check if a dedicated route exists.
    pub fn has_route(&self, routing_key: &str) -> bool {
        self.routes.contains_key(routing_key)
    }

    /// List all routed keys.
    pub fn routing_keys(&self) -> Vec<&str> {
        self.routes.keys().map(|s| s.as_str()).collect()
    }
}

/// A simple function-based URL handler.
pub struct FnHandler<F>
where
    F: Fn(&QueueEntry) -> HandlerFuture + Send + Sync + 'static,
{
    handler: F,
}

impl<F> FnHandler<F>
where
    F: Fn(&QueueEntry) -> HandlerFuture + Send + Sync + 'static,
{
    /// Create a new function-based handler.
    pub fn new(handler: F) -> Self {
        Self { handler }
    }
}

impl<F> UrlHandler for FnHandler<F>
where
    F: Fn(&QueueEntry) -> HandlerFuture + Send + Sync + 'static,
{
    fn handle(&self, entry: &QueueEntry) -> HandlerFuture {
        (self.handler)(entry)
    }
}
