//! Message dispatch.
//!
//! Routes decoded envelopes to per-variant async handlers. Handlers are
//! registered by variant name before the connection starts; variants
//! without a handler fall through to a no-op so every decoded message
//! has somewhere to go.

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use tracing::debug;

use crate::envelope::Envelope;
use crate::error::{CourierError, Result};

/// Boxed future type for async handlers.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// A type-erased per-variant handler.
pub type HandlerFn<E, Ctx> =
    Arc<dyn Fn(E, Arc<Ctx>) -> BoxFuture<'static, ()> + Send + Sync>;

/// Collects handlers before the dispatch table is frozen.
pub struct DispatcherBuilder<E, Ctx> {
    handlers: HashMap<String, HandlerFn<E, Ctx>>,
}

impl<E: Envelope, Ctx: Send + Sync + 'static> DispatcherBuilder<E, Ctx> {
    pub fn new() -> Self {
        Self {
            handlers: HashMap::new(),
        }
    }

    /// Register a handler for the named variant.
    ///
    /// Registering the same variant twice keeps the later handler.
    /// Unknown names are caught at [`build`](Self::build) time.
    pub fn handle<F, Fut>(mut self, variant: &str, handler: F) -> Self
    where
        F: Fn(E, Arc<Ctx>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        self.handlers.insert(
            variant.to_string(),
            Arc::new(move |envelope, ctx| Box::pin(handler(envelope, ctx))),
        );
        self
    }

    /// Freeze the dispatch table.
    ///
    /// # Errors
    ///
    /// Returns [`CourierError::UnknownVariant`] if a handler was
    /// registered for a variant the envelope does not declare.
    pub fn build(self) -> Result<MessageDispatcher<E, Ctx>> {
        for name in self.handlers.keys() {
            if !E::VARIANTS.contains(&name.as_str()) {
                return Err(CourierError::UnknownVariant(name.clone()));
            }
        }

        // Resolve the table once so dispatch is a plain slice index;
        // unregistered variants all share one no-op handler.
        let noop: HandlerFn<E, Ctx> = Arc::new(|_, _| Box::pin(async {}));
        let slots = E::VARIANTS
            .iter()
            .map(|name| {
                self.handlers
                    .get(*name)
                    .cloned()
                    .unwrap_or_else(|| noop.clone())
            })
            .collect();

        Ok(MessageDispatcher { slots })
    }
}

impl<E: Envelope, Ctx: Send + Sync + 'static> Default for DispatcherBuilder<E, Ctx> {
    fn default() -> Self {
        Self::new()
    }
}

/// Frozen dispatch table, one slot per envelope variant.
pub struct MessageDispatcher<E, Ctx> {
    slots: Vec<HandlerFn<E, Ctx>>,
}

impl<E: Envelope, Ctx: Send + Sync + 'static> MessageDispatcher<E, Ctx> {
    /// Route a decoded envelope to its handler.
    ///
    /// Envelopes with no variant set are dropped; variants without a
    /// registered handler are a no-op.
    pub async fn dispatch(&self, envelope: E, ctx: Arc<Ctx>) {
        let Some(variant) = envelope.variant() else {
            debug!("dropping envelope with no message set");
            return;
        };

        // `variant()` only returns names from VARIANTS.
        let index = E::VARIANTS
            .iter()
            .position(|name| *name == variant)
            .unwrap_or_else(|| unreachable!("variant not in VARIANTS: {variant}"));

        (self.slots[index])(envelope, ctx).await;
    }
}
